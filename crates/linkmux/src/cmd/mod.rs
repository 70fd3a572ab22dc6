use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send bytes on one channel.
    Send(SendArgs),
    /// Listen and print received channel data.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Channel to send on (1..=22).
    #[arg(long, short = 'c', default_value = "1")]
    pub channel: u8,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file. Reads stdin when neither --data nor --file
    /// is given.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Maximum time to wait for the link to drain (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub flush_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Channels to print (comma-separated). Default: all 22 channels.
    #[arg(long, value_delimiter = ',')]
    pub channels: Option<Vec<u8>>,
    /// Exit after printing N chunks.
    #[arg(long)]
    pub count: Option<usize>,
    /// Per-channel buffer capacity in bytes.
    #[arg(long, default_value = "4096")]
    pub capacity: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
