//! Shared types, opaque-template handling, field-path evaluation, cron-schedule
//! evaluation, and status-condition helpers for the CronAnything scheduler family.
//!
//! This crate carries no Kubernetes-client or async dependencies beyond what's
//! needed to derive the CRD types (`kube`'s `CustomResource` derive and
//! `schemars::JsonSchema`) — everything in here is pure and independently
//! testable, which is what lets `cronanything-runtime` and `backupschedule` stay
//! thin wrappers around it.

pub mod clock;
pub mod conditions;
pub mod schedule;
pub mod template;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use schedule::{Schedule, ScheduleParseError};
pub use template::{ChildTemplate, FieldPath, FieldPathParseError, TemplateError};
pub use types::{
    ConcurrencyPolicy, CronAnything, CronAnythingSpec, CronAnythingStatus, FinishableStrategy,
    PendingTrigger, ResourceTimestampStrategy, RetentionPolicy, TriggerHistoryEntry, TriggerResult,
    TRIGGER_HISTORY_LIMIT,
};

/// Label key stamped on every child created by a CronAnything (invariant I3).
pub const LABEL_CREATED_BY: &str = "database.oracle.com/created-by";
/// Label key stamped with the Unix-seconds scheduled trigger time (invariant I3).
pub const LABEL_SCHEDULE_TIME: &str = "database.oracle.com/schedule-time";
