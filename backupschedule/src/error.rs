//! Reconcile-error taxonomy for the BackupSchedule reducer, mirroring
//! `cronanything_runtime::error::Error`'s shape.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("kubernetes api call failed: {0}")]
    Api(#[source] kube::Error),

    #[error("backup template decode error: {0}")]
    TemplateDecode(#[from] cronanything_core::TemplateError),

    #[error("a required object-identity field is missing: {0}")]
    MissingObjectKey(&'static str),
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::Api(e)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
