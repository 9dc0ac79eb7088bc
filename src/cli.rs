use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

/// The command line interface for serial adapter.
///
/// Connects to a serial port, prints whatever arrives, and sends each line read from stdin.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// The serial port to connect to, e.g. `/dev/ttyACM0` or `COM3`
    #[arg(short, long)]
    pub port: Option<String>,

    /// Bits per second
    #[arg(short, long, default_value_t = 115_200)]
    pub bitrate: u32,

    /// Path to a configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also log to daily rotated files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),
}

/// Helpful examples for users.
#[derive(Subcommand, Clone)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,
}

/// Run a subcommand to completion.
pub fn handle_command(command: Commands) {
    match command {
        Commands::Examples(example) => match example {
            Examples::Config => println!("{}", Config::example().serialize_pretty()),
        },
    }
}
