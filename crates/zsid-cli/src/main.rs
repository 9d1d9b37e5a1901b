#![doc = include_str!("../README.md")]

mod commands;
mod config;
mod telemetry;

use clap::Parser;
use commands::{build_registry, run};
use config::{AppConfig, CliArgs};
use telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    init_telemetry(config.log_format)?;
    log_startup_info(&config);

    let registry = build_registry(&config)?;
    run(&registry, config.command)
}

fn log_startup_info(config: &AppConfig) {
    if cfg!(debug_assertions) {
        tracing::debug!("starting with full config: {config:#?}");
    } else {
        tracing::debug!(
            domains = config.registry.domains().count(),
            clock = ?config.clock,
            worker_ids = ?config.worker_ids,
            "starting"
        );
    }
}
