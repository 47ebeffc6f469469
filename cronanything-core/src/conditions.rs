//! Insert-or-update-by-`type` helper for the standard Kubernetes condition list,
//! shared by the `CronAnything` and `BackupSchedule` status subresources.

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

/// Inserts `condition` into `conditions`, replacing any existing entry with the
/// same `type`. `lastTransitionTime` is only bumped when `status` actually
/// changes, matching the standard Kubernetes convention for condition lists.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) if existing.status == condition.status => {
            condition.last_transition_time = existing.last_transition_time.clone();
            *existing = condition;
        }
        Some(existing) => {
            condition.last_transition_time = Time(Utc::now());
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Time(Utc::now());
            conditions.push(condition);
        }
    }
}

/// Builds a `Ready=True` condition for a healthy reconcile.
pub fn ready(reason: &str, message: impl Into<String>) -> Condition {
    Condition {
        type_: "Ready".to_string(),
        status: "True".to_string(),
        reason: reason.to_string(),
        message: message.into(),
        observed_generation: None,
        last_transition_time: Time(Utc::now()),
    }
}

/// Builds a `Stalled=True` condition for a reconcile that failed in a way that
/// will not resolve itself without a spec change (e.g. a cron or field-path parse error).
pub fn stalled(reason: &str, message: impl Into<String>) -> Condition {
    Condition {
        type_: "Stalled".to_string(),
        status: "True".to_string(),
        reason: reason.to_string(),
        message: message.into(),
        observed_generation: None,
        last_transition_time: Time(Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_new_condition() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, ready("ReconcileSucceeded", "ok"));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].type_, "Ready");
    }

    #[test]
    fn replaces_existing_by_type() {
        let mut conditions = vec![ready("First", "a")];
        set_condition(&mut conditions, ready("Second", "b"));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].reason, "Second");
    }

    #[test]
    fn keeps_transition_time_when_status_unchanged() {
        let mut conditions = vec![ready("First", "a")];
        let original = conditions[0].last_transition_time.clone();
        set_condition(&mut conditions, ready("Second", "b"));
        assert_eq!(conditions[0].last_transition_time, original);
    }
}
