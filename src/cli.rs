use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{colors, forget, replay};

#[derive(Parser)]
#[command(name = "atg")]
#[command(about = "Advanced Tab Groups - close, rename, color and folder controls for tab groups")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to $ATG_CONFIG, then the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the saved group colors
    Colors(colors::Args),

    /// Delete the saved color of one group
    Forget(forget::Args),

    /// Drive an in-memory host through a scripted scenario
    Replay(replay::Args),
}
