use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod app;
mod augment;
mod cli;
mod commands;
mod config;
mod host;
mod models;
mod store;
mod watcher;

use cli::{Cli, Commands};
use config::Config;

/// Log to stderr, and additionally to a daily file when `log_dir` is set.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_writer(std::io::stderr);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "atg.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.clone())?;
    let _guard = init_logging(&config);

    match cli.command {
        Commands::Colors(args) => commands::colors::execute(args, config).await,
        Commands::Forget(args) => commands::forget::execute(args, config).await,
        Commands::Replay(args) => commands::replay::execute(args, config).await,
    }
}
