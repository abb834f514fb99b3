use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod console;
mod control_plane;
mod demo;
mod extract;
mod health;
mod providers;
mod provision;
mod runner;
mod util;
mod workflow;

fn main() -> Result<()> {
    // A missing .env is fine; variables already in the environment win.
    dotenvy::dotenv().ok();
    init_tracing();

    let args = cli::RunArgs::parse();
    workflow::run_quickstart(&args)
}

fn init_tracing() {
    // Default to "warn" if RUST_LOG is not set
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
