//! Command-line configuration for the operator binary.

use clap::{Parser, ValueEnum};

/// Runs the CronAnything and BackupSchedule controllers.
#[derive(Parser, Debug)]
#[command(name = "oracle-operator", version, about)]
pub struct Cli {
    /// Address the liveness/readiness probe listens on.
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8080")]
    pub health_addr: String,

    /// Address the Prometheus metrics endpoint listens on.
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8081")]
    pub metrics_addr: String,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Restrict both controllers to a single namespace; unset watches all namespaces.
    #[arg(long, env = "NAMESPACE")]
    pub namespace: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
