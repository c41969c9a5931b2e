//! pagecache command-line entry point.
//!
//! Logging goes to stderr so that cached bodies and JSON reports on stdout
//! stay clean for piping.

use std::process::ExitCode;

use anyhow::Result;
use pagecache_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = commands::parse(&args)?;

    let mut config = AppConfig::load()?;
    invocation.apply(&mut config);
    config.validate()?;

    tracing::debug!(cache_dir = %config.cache_dir.display(), command = ?invocation.command, "running");

    commands::run(invocation, &config).await
}
