//! The CronAnything controller runtime: reconcile logic, child-kind resolution,
//! and `kube_runtime::Controller` wiring, built on the pure types in
//! `cronanything-core`.

pub mod controller;
pub mod error;
pub mod reducer;
pub mod resolver;

pub use controller::Context;
pub use error::Error;
pub use reducer::{reconcile, report_condition, ReconcileOutcome, ReducerDeps};
pub use resolver::ResourceResolver;
