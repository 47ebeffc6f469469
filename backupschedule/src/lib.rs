//! BackupSchedule: the thin CronAnything specialization that drives periodic
//! database backups. Built on `cronanything-core`'s types and
//! `cronanything-runtime`'s resource resolver.

pub mod controller;
pub mod error;
pub mod reducer;
pub mod types;

pub use controller::Context;
pub use error::Error;
pub use reducer::{reconcile, report_condition, ReconcileOutcome, ReducerDeps};
pub use types::{BackupSchedule, BackupScheduleSpec, BackupScheduleStatus};
