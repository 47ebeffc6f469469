//! Owns the `Client`, wires up both controllers and the resource resolver's
//! background refresh task, and drives everything to completion concurrently.

use crate::cli::Cli;
use cronanything_core::SystemClock;
use cronanything_runtime::{controller as cronanything_controller, resolver::ResourceResolver};
use kube::{Client, Config};
use std::sync::Arc;
use tracing::info;

pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = Config::infer().await?;
    if let Some(ns) = &cli.namespace {
        config.default_namespace = ns.clone();
    }
    let client = Client::try_from(config)?;

    let (resolver, refresh_task) = ResourceResolver::new(client.clone()).await?;
    info!("resource resolver primed");
    // The refresh loop runs for the lifetime of the process; it has no natural
    // end, so it is spawned rather than joined with the (shutdown-aware) controllers.
    tokio::spawn(refresh_task);

    let cron_ctx = cronanything_controller::Context::new(client.clone(), resolver.clone(), Arc::new(SystemClock));
    let backup_ctx = backupschedule::controller::Context::new(client.clone(), resolver);

    futures::future::join(
        cronanything_controller::run(cron_ctx),
        backupschedule::controller::run(backup_ctx),
    )
    .await;

    Ok(())
}
