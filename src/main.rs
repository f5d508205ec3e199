#![forbid(unsafe_code)]

mod cli;
mod config;
mod constants;
mod daemon;
mod ipc;
mod library;
mod overlay;
mod persistence;
mod scheduler;
mod timer;
mod types;
mod x11;

use clap::Parser;
use tracing::Level as TraceLevel;
use tracing_subscriber::FmtSubscriber;

use cli::Cli;

fn log_level(debug: bool) -> TraceLevel {
    if debug {
        return TraceLevel::DEBUG;
    }
    match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(cli.debug))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    cli::execute(cli)
}
