//! The `BackupSchedule` custom resource and the opaque `Backup` child it drives.

use chrono::{DateTime, Utc};
use cronanything_core::ChildTemplate;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default for `spec.startingDeadlineSeconds`.
pub const DEFAULT_STARTING_DEADLINE_SECONDS: i64 = 30;
/// Default for `spec.backupRetentionPolicy.backupRetention`.
pub const DEFAULT_BACKUP_RETENTION: i64 = 7;
/// Upper bound accepted for `backupRetention` (enforced by the CRD schema, not the reducer).
pub const MAX_BACKUP_RETENTION: i64 = 512;
/// Maximum number of entries kept in `status.backupHistory`.
pub const BACKUP_HISTORY_LIMIT: usize = 7;

/// How many successful backups to keep before pruning older ones.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupRetentionPolicy {
    /// Maximum successful backups retained; 0 disables count-based pruning. Default 7, max 512.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_retention: Option<i64>,
}

impl BackupRetentionPolicy {
    pub fn backup_retention(&self) -> i64 {
        self.backup_retention.unwrap_or(DEFAULT_BACKUP_RETENTION)
    }
}

/// One entry in the bounded `status.backupHistory` list.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupHistoryEntry {
    pub backup_name: String,
    pub creation_time: DateTime<Utc>,
    pub phase: String,
}

/// Desired state of a `BackupSchedule`.
#[derive(Clone, Debug, CustomResource, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "database.oracle.com",
    version = "v1alpha1",
    kind = "BackupSchedule",
    namespaced,
    status = "BackupScheduleStatus",
    shortname = "bsched",
    printcolumn = r#"{"name":"Schedule", "type":"string", "jsonPath":".spec.schedule"}"#,
    printcolumn = r#"{"name":"LastBackup", "type":"string", "jsonPath":".status.lastBackupTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupScheduleSpec {
    /// Cron expression governing backup cadence.
    pub schedule: String,
    /// When true, no new backups are triggered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend: Option<bool>,
    /// Lateness (seconds) tolerated before a tick is skipped; defaults to 30.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_deadline_seconds: Option<i64>,
    /// How many successful backups to retain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_retention_policy: Option<BackupRetentionPolicy>,
    /// The opaque Backup resource template instantiated on each trigger.
    pub backup_template: ChildTemplate,
}

impl BackupScheduleSpec {
    pub fn starting_deadline_seconds(&self) -> i64 {
        self.starting_deadline_seconds.unwrap_or(DEFAULT_STARTING_DEADLINE_SECONDS)
    }

    pub fn backup_retention(&self) -> i64 {
        self.backup_retention_policy
            .as_ref()
            .map(BackupRetentionPolicy::backup_retention)
            .unwrap_or(DEFAULT_BACKUP_RETENTION)
    }
}

/// Observed state of a `BackupSchedule`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupScheduleStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub backup_total: i64,
    #[serde(default)]
    pub backup_history: Vec<BackupHistoryEntry>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// The name of the CronAnything paired to a BackupSchedule named `name`.
pub fn cronanything_name(backup_schedule_name: &str) -> String {
    format!("{backup_schedule_name}-cron")
}

/// `Backup.status.phase` values the core understands (everything else is opaque).
pub mod phase {
    pub const PENDING: &str = "Pending";
    pub const IN_PROGRESS: &str = "InProgress";
    pub const SUCCEEDED: &str = "Succeeded";
    pub const FAILED: &str = "Failed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_defaults_to_seven() {
        let policy = BackupRetentionPolicy::default();
        assert_eq!(policy.backup_retention(), DEFAULT_BACKUP_RETENTION);
    }

    #[test]
    fn cronanything_name_appends_suffix() {
        assert_eq!(cronanything_name("nightly"), "nightly-cron");
    }
}
