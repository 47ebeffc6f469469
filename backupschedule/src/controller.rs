//! Controller wiring for BackupSchedule, mirroring
//! `cronanything_runtime::controller`'s shape.

use crate::{
    error::Error,
    reducer::{self, ReducerDeps},
    types::BackupSchedule,
};
use cronanything_runtime::resolver::ResourceResolver;
use futures::StreamExt;
use kube::{
    runtime::{
        controller::{Action, Controller},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

pub struct Context {
    pub client: Client,
    pub resolver: ResourceResolver,
}

impl Context {
    pub fn new(client: Client, resolver: ResourceResolver) -> Arc<Self> {
        Arc::new(Context { client, resolver })
    }
}

/// Runs the BackupSchedule controller until shut down by a signal.
pub async fn run(ctx: Arc<Context>) {
    let api: Api<BackupSchedule> = Api::all(ctx.client.clone());

    if let Err(e) = api.list(&Default::default()).await {
        error!(error = %e, "BackupSchedule CRD not installed, not starting controller");
        return;
    }

    // The owned Backup kind is opaque (chosen per-instance by `spec.backupTemplate`),
    // so unlike a typed child this controller cannot `.owns()` it at compile time;
    // the periodic requeue in `reconcile` below is what observes Backup state changes.
    info!("starting backupschedule controller");
    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    info!(name = %obj.name, namespace = obj.namespace.as_deref().unwrap_or(""), ?action, "reconciled backupschedule");
                }
                Err(err) => warn!(error = %err, "backupschedule reconcile failed, controller will retry"),
            }
        })
        .await;
}

async fn reconcile(backup_schedule: Arc<BackupSchedule>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = backup_schedule.name_any();
    let namespace = backup_schedule.namespace().unwrap_or_default();
    let api: Api<BackupSchedule> = Api::namespaced(ctx.client.clone(), &namespace);
    let deps = ReducerDeps {
        client: ctx.client.clone(),
        resolver: ctx.resolver.clone(),
    };
    let result = reducer::reconcile(backup_schedule, &deps).await;
    match &result {
        Ok(_) => {
            let condition = cronanything_core::conditions::ready("ReconcileSucceeded", "reconcile completed");
            if let Err(e) = reducer::report_condition(&api, &name, condition).await {
                warn!(name = %name, error = %e, "failed to report Ready condition");
            }
        }
        Err(Error::TemplateDecode(_)) => {
            let err = result.as_ref().err().unwrap();
            let condition = cronanything_core::conditions::stalled("ReconcileFailed", err.to_string());
            if let Err(e) = reducer::report_condition(&api, &name, condition).await {
                warn!(name = %name, error = %e, "failed to report Stalled condition");
            }
        }
        Err(_) => {}
    }
    let outcome = result?;
    Ok(match outcome.requeue_after {
        Some(after) => Action::requeue(after),
        None => Action::requeue(Duration::from_secs(300)),
    })
}

fn error_policy(backup_schedule: Arc<BackupSchedule>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(name = %backup_schedule.name_any(), error = %error, "backupschedule reconcile error, scheduling retry");
    Action::requeue(Duration::from_secs(30))
}
