//! The `CronAnything` custom resource: a generic cron-driven resource factory.

use crate::template::ChildTemplate;
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a created child resource is recognized as finished, and therefore
/// eligible for history pruning.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FinishableStrategy {
    /// The child is finished once `fieldPath` holds a non-empty, parseable timestamp.
    TimestampField {
        /// Field path into the child, e.g. `.status.completionTime`.
        field_path: String,
    },
    /// The child is finished once `fieldPath` holds one of `finishedValues`.
    StringField {
        /// Field path into the child, e.g. `.status.phase`.
        field_path: String,
        /// Values of the field that indicate the child is finished.
        finished_values: Vec<String>,
    },
}

/// How to read a finished child's completion time, for age-based retention.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResourceTimestampStrategy {
    /// Use the child's own creation timestamp.
    #[default]
    CreationTimestamp,
    /// Read a timestamp out of an arbitrary field on the child.
    Field {
        /// Field path into the child, e.g. `.status.completionTime`.
        field_path: String,
    },
}

/// History/age-bounded retention of finished children.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// Maximum number of finished children kept; older ones are deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_count_limit: Option<i64>,
    /// Maximum age (seconds) of a finished child before it is deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_time_limit_seconds: Option<i64>,
    /// How to read a finished child's completion time.
    #[serde(default)]
    pub resource_timestamp_strategy: ResourceTimestampStrategy,
}

/// Governs whether a new trigger may fire while unfinished children exist.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConcurrencyPolicy {
    /// Allow concurrently running children.
    #[default]
    Allow,
    /// Skip the new trigger if an unfinished child already exists.
    Forbid,
    /// Delete unfinished children, then create on a later reconcile.
    Replace,
}

/// The outcome recorded for a single trigger attempt.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum TriggerResult {
    /// The child was created successfully.
    CreateSucceeded,
    /// Creating the child failed; will be retried.
    CreateFailed,
    /// Skipped: an unfinished child already exists and policy is `Forbid`.
    ForbidConcurrent,
    /// Skipped: `totalResourceLimit` was already reached.
    ResourceLimitReached,
    /// Skipped: the tick was older than `triggerDeadlineSeconds` allows.
    DeadlineExceeded,
    /// A tick other than the most recent one in a catch-up batch; not individually fired.
    Missed,
}

/// One entry in the bounded `triggerHistory` FIFO.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerHistoryEntry {
    /// The cron tick this entry reports on.
    pub schedule_time: DateTime<Utc>,
    /// When the reconcile that produced this entry ran.
    pub creation_timestamp: DateTime<Utc>,
    /// The outcome of that tick.
    pub result: TriggerResult,
}

/// An attempt whose outcome was not yet durably observed as a history entry.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingTrigger {
    /// The tick this attempt is for.
    pub schedule_time: DateTime<Utc>,
    /// The observed (possibly retryable) outcome.
    pub result: TriggerResult,
}

/// Maximum number of entries kept in `status.triggerHistory` (invariant I4).
pub const TRIGGER_HISTORY_LIMIT: usize = 10;

/// Desired state of a `CronAnything`.
#[derive(Clone, Debug, CustomResource, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "database.oracle.com",
    version = "v1alpha1",
    kind = "CronAnything",
    namespaced,
    status = "CronAnythingStatus",
    shortname = "crany",
    printcolumn = r#"{"name":"Schedule", "type":"string", "jsonPath":".spec.schedule"}"#,
    printcolumn = r#"{"name":"Suspend", "type":"boolean", "jsonPath":".spec.suspend"}"#,
    printcolumn = r#"{"name":"LastSchedule", "type":"string", "jsonPath":".status.lastScheduleTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CronAnythingSpec {
    /// Cron expression: standard 5-field, with fallback to 6-field (with seconds).
    pub schedule: String,
    /// The child resource template to instantiate on every tick.
    pub template: ChildTemplate,
    /// Maximum lateness (seconds) tolerated before a tick is skipped rather than fired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_deadline_seconds: Option<i64>,
    /// How to handle overlapping unfinished children.
    #[serde(default)]
    pub concurrency_policy: ConcurrencyPolicy,
    /// When true, no new triggers fire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend: Option<bool>,
    /// How to decide whether a created child has finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finishable_strategy: Option<FinishableStrategy>,
    /// Bounds on how much finished-child history is kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<RetentionPolicy>,
    /// Cap on total live (finished + unfinished) child count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_resource_limit: Option<i64>,
    /// Prefix for generated child names; defaults to this CronAnything's name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_base_name: Option<String>,
    /// Time-format layout applied to the scheduled time to form the child name
    /// suffix; defaults to Unix seconds when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_timestamp_format: Option<String>,
    /// When true, created children carry an owner reference back to this CronAnything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade_delete: Option<bool>,
}

/// Observed state of a `CronAnything`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CronAnythingStatus {
    /// The highest trigger time ever processed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_schedule_time: Option<DateTime<Utc>>,
    /// The last attempt whose outcome is not yet reflected as a terminal history entry.
    ///
    /// Deliberately serialized even when `None`: status is written back with a JSON merge
    /// patch (RFC 7386), and a merge patch can only clear a previously-set field by sending
    /// an explicit `null`, never by omitting the key.
    pub pending_trigger: Option<PendingTrigger>,
    /// Bounded FIFO (newest first, max `TRIGGER_HISTORY_LIMIT`) of past trigger outcomes.
    #[serde(default)]
    pub trigger_history: Vec<TriggerHistoryEntry>,
    /// Standard condition list (`Ready`, `Stalled`).
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl CronAnythingStatus {
    /// Prepends `entry` to `trigger_history`, truncating to `TRIGGER_HISTORY_LIMIT`
    /// (invariant I4).
    pub fn push_history(&mut self, entry: TriggerHistoryEntry) {
        self.trigger_history.insert(0, entry);
        self.trigger_history.truncate(TRIGGER_HISTORY_LIMIT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(secs: i64, result: TriggerResult) -> TriggerHistoryEntry {
        TriggerHistoryEntry {
            schedule_time: DateTime::from_timestamp(secs, 0).unwrap(),
            creation_timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
            result,
        }
    }

    #[test]
    fn history_is_bounded_and_newest_first() {
        let mut status = CronAnythingStatus::default();
        for i in 0..15 {
            status.push_history(entry(i, TriggerResult::CreateSucceeded));
        }
        assert_eq!(status.trigger_history.len(), TRIGGER_HISTORY_LIMIT);
        assert_eq!(status.trigger_history[0].schedule_time.timestamp(), 14);
        assert_eq!(status.trigger_history[9].schedule_time.timestamp(), 5);
    }

    #[test]
    fn concurrency_policy_defaults_to_allow() {
        assert_eq!(ConcurrencyPolicy::default(), ConcurrencyPolicy::Allow);
    }
}
