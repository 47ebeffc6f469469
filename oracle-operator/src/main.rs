//! Entry point: parses CLI flags, installs a `tracing` subscriber, and hands
//! off to the manager.

mod cli;
mod manager;

use clap::Parser;
use cli::{Cli, LogFormat};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    tracing::info!(
        health_addr = %cli.health_addr,
        metrics_addr = %cli.metrics_addr,
        namespace = cli.namespace.as_deref().unwrap_or("<all>"),
        "starting oracle-operator"
    );

    manager::run(&cli).await
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}
