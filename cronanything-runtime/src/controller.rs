//! Controller wiring for the CronAnything family: turns [`crate::reducer::reconcile`]
//! into the `kube_runtime::controller::Controller` run loop, with a best-effort
//! in-memory next-tick map consulted to elide a redundant requeue when a watch
//! event (typically our own status patch) retriggers reconcile before the
//! previously computed wake-up has actually arrived.

use crate::{
    error::Error,
    reducer::{self, CronAnything, ReducerDeps},
    resolver::ResourceResolver,
};
use chrono::{DateTime, Utc};
use cronanything_core::Clock;
use futures::StreamExt;
use kube::{
    runtime::{
        controller::{Action, Controller},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{error, info, warn};

/// Shared state handed to every reconcile call.
pub struct Context {
    pub client: Client,
    pub resolver: ResourceResolver,
    pub clock: Arc<dyn Clock>,
    /// Namespaced-name -> next scheduled wake-up, so a watch event that changes
    /// nothing relevant doesn't force an earlier-than-necessary reconcile.
    next_tick: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Context {
    pub fn new(client: Client, resolver: ResourceResolver, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Context {
            client,
            resolver,
            clock,
            next_tick: Mutex::new(HashMap::new()),
        })
    }

    /// True if `at` is exactly the wake-up already recorded for `key`. Used to tell a
    /// reconcile triggered by an incidental watch event (e.g. our own status patch)
    /// apart from one that actually needs to re-arm the requeue timer.
    fn already_queued(&self, key: &str, at: DateTime<Utc>) -> bool {
        self.next_tick.lock().get(key) == Some(&at)
    }

    fn remember_next_tick(&self, key: &str, at: Option<DateTime<Utc>>) {
        let mut guard = self.next_tick.lock();
        match at {
            Some(at) => {
                guard.insert(key.to_string(), at);
            }
            None => {
                guard.remove(key);
            }
        }
    }
}

/// Runs the CronAnything controller until shut down by a signal.
pub async fn run(ctx: Arc<Context>) {
    let api: Api<CronAnything> = Api::all(ctx.client.clone());

    if let Err(e) = api.list(&Default::default()).await {
        error!(error = %e, "CronAnything CRD not installed, not starting controller");
        return;
    }

    info!("starting cronanything controller");
    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    info!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or(""),
                        ?action,
                        "reconciled cronanything"
                    );
                }
                Err(err) => warn!(error = %err, "cronanything reconcile failed, controller will retry"),
            }
        })
        .await;
}

async fn reconcile(cron: Arc<CronAnything>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = cron.name_any();
    let namespace = cron.namespace().unwrap_or_default();
    let key = format!("{namespace}/{name}");
    let cron_api: Api<CronAnything> = Api::namespaced(ctx.client.clone(), &namespace);
    let deps = ReducerDeps {
        client: ctx.client.clone(),
        resolver: ctx.resolver.clone(),
        clock: ctx.clock.clone(),
    };
    let result = reducer::reconcile(cron, &deps).await;
    match &result {
        Ok(_) => {
            let condition = cronanything_core::conditions::ready("ReconcileSucceeded", "reconcile completed");
            if let Err(e) = reducer::report_condition(&cron_api, &name, condition).await {
                warn!(name = %name, error = %e, "failed to report Ready condition");
            }
        }
        Err(Error::CronParse(_) | Error::FieldPath(_) | Error::TemplateDecode(_)) => {
            let err = result.as_ref().err().unwrap();
            let condition = cronanything_core::conditions::stalled("ReconcileFailed", err.to_string());
            if let Err(e) = reducer::report_condition(&cron_api, &name, condition).await {
                warn!(name = %name, error = %e, "failed to report Stalled condition");
            }
        }
        Err(_) => {}
    }
    let outcome = result?;
    let now = ctx.clock.now();
    let next_at = outcome.requeue_after.map(|d| now + chrono::Duration::from_std(d).unwrap_or_default());
    let redundant = next_at.is_some_and(|at| ctx.already_queued(&key, at));
    ctx.remember_next_tick(&key, next_at);
    if redundant {
        info!(name = %name, "next tick already queued, skipping redundant requeue");
        return Ok(Action::await_change());
    }
    Ok(match outcome.requeue_after {
        Some(after) => Action::requeue(after),
        None => Action::await_change(),
    })
}

/// Exponential-ish backoff by error category; unresolved child kinds get a
/// short retry since the resolver's background refresh may fix it within seconds.
fn error_policy(cron: Arc<CronAnything>, error: &Error, _ctx: Arc<Context>) -> Action {
    let name = cron.name_any();
    error!(name = %name, error = %error, "cronanything reconcile error, scheduling retry");
    let backoff = match error {
        Error::KindUnresolved(_) => Duration::from_secs(5),
        Error::CronParse(_) | Error::FieldPath(_) | Error::TemplateDecode(_) => Duration::from_secs(300),
        Error::Api(_) | Error::MissingObjectKey(_) | Error::VanishedDuringReconcile(_) => Duration::from_secs(15),
    };
    Action::requeue(backoff)
}
