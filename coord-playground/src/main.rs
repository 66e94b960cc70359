//! Playground binary for the coordination primitives.
//!
//! Each subcommand runs one small scenario (a shared cache, a guarded counter, a fan-in, a
//! broadcast cancellation, a load-balancing worker pool, and a few receive patterns) and logs
//! what happens. Sizes come from `configuration/` and `APP_` environment variables.

use clap::{Parser, Subcommand};
use coord_config::shared::PlaygroundConfig;
use coord_telemetry::tracing::init_tracing;
use tracing::info;

use crate::config::load_playground_config;

mod config;
mod demos;

#[derive(Parser)]
#[command(name = "coord-playground", about = "Runs coordination primitive scenarios")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tasks write to and read back from a shared cache
    Cache {
        #[arg(long, default_value_t = 10)]
        tasks: u32,
    },
    /// Tasks increment a shared counter under a semaphore
    Counter {
        #[arg(long, default_value_t = 10)]
        tasks: u32,
        #[arg(long, default_value_t = 100)]
        increments: u32,
    },
    /// Two producers merged into one stream
    FanIn,
    /// Workers racing slow work against a broadcast cancellation
    Broadcast {
        #[arg(long, default_value_t = 3)]
        workers: u32,
    },
    /// Jobs balanced across a worker pool
    Pool {
        #[arg(long, default_value_t = 20)]
        jobs: u32,
    },
    /// Receive that gives up after a deadline
    Timeout {
        #[arg(long, default_value_t = 500)]
        timeout_ms: u64,
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
    },
    /// Wait on whichever of two streams delivers first
    Select,
    /// Poll a stream without waiting
    NonBlocking,
}

/// Loads configuration and tracing, then runs the requested scenario on a multi-threaded runtime.
fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_playground_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args.command, config))?;

    Ok(())
}

async fn async_main(command: Command, config: PlaygroundConfig) -> anyhow::Result<()> {
    info!(?config, "playground configuration loaded");

    match command {
        Command::Cache { tasks } => demos::cache::run(tasks).await,
        Command::Counter { tasks, increments } => {
            demos::counter::run(&config.semaphore, tasks, increments).await
        }
        Command::FanIn => demos::fan_in::run(&config.fan_in).await,
        Command::Broadcast { workers } => demos::broadcast::run(workers).await,
        Command::Pool { jobs } => demos::pool::run(&config.worker_pool, jobs).await,
        Command::Timeout {
            timeout_ms,
            delay_ms,
        } => demos::receive::timeout(timeout_ms, delay_ms).await,
        Command::Select => demos::receive::select().await,
        Command::NonBlocking => demos::receive::non_blocking().await,
    }
}
