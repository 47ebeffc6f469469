//! The CronAnything/BackupSchedule reconcile-error taxonomy, modeled the way
//! the reference client library models its own errors: one `thiserror` variant
//! per failure mode, wrapping the underlying cause with `#[source]`.

use cronanything_core::{FieldPathParseError, ScheduleParseError, TemplateError};
use kube::core::GroupVersionKind;
use thiserror::Error;

/// Everything that can make a CronAnything (or BackupSchedule) reconcile fail.
#[derive(Debug, Error)]
pub enum Error {
    /// A Kubernetes API call failed (transient: not-found, conflict, timeout, ...).
    #[error("kubernetes api call failed: {0}")]
    Api(#[source] kube::Error),

    /// `spec.schedule` didn't parse under either cron grammar. Not retried on a
    /// timer — only a spec change re-triggers reconciliation.
    #[error("cron schedule parse error: {0}")]
    CronParse(#[from] ScheduleParseError),

    /// A `fieldPath` in a finishable/timestamp strategy was malformed.
    #[error("field path parse error: {0}")]
    FieldPath(#[from] FieldPathParseError),

    /// `spec.template` could not be read as a child resource declaration.
    #[error("template decode error: {0}")]
    TemplateDecode(#[from] TemplateError),

    /// The child template's kind has not (yet) been discovered by the resource
    /// resolver. Transient: the background discovery refresh will eventually
    /// populate it.
    #[error("child kind not yet resolvable: {0:?}")]
    KindUnresolved(GroupVersionKind),

    /// A required object-identity field (name/namespace/uid) was absent.
    #[error("object is missing required field: {0}")]
    MissingObjectKey(&'static str),

    /// The object disappeared between being listed and being read/mutated.
    #[error("object {0} vanished mid-reconcile")]
    VanishedDuringReconcile(String),
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::Api(e)
    }
}

/// Convenience alias used throughout the reducer.
pub type Result<T, E = Error> = std::result::Result<T, E>;
