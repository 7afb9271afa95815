use std::fmt::Display;
use std::path::PathBuf;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};

const USAGE_LONG: &str = r#"
loadcom moves files between two processes on the same host over a CPU-contention side channel. The processes share no socket, pipe, or file: only the CPU.

Start the receiver first and leave it running:

    loadcom rx

Then, from another process (container, VM sibling, …) on the same host:

    loadcom tx secret.bin

Each verified packet is written to <epoch-nanoseconds>.bin in the receiver's current directory.

Both sides must be built with the same link parameters. Expect seconds per BIT, not bytes per second: a 1023-chip code at a 16 ms chip period spends about 16 seconds on every bit. Keep payloads tiny.

The receiver's demodulator is CPU-hungry by design: measuring the idle tick rate of a core *is* the antenna.
"#;

const ADVANCED: &str = "Advanced Link Options";

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vv for per-bit correlator diagnostics)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print nothing but packet confirmations
    #[arg(short, long)]
    pub quiet: bool,

    /// Cap on PHY worker threads
    ///
    /// Worker count is min(cap, online cores). A cap of 1 confines
    /// the link to a single pinned core instead of loading all of
    /// them. Must match on both ends.
    #[arg(long, value_name = "N")]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub max_threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Transmit one file as a single packet
    Tx {
        /// Payload file, sent in its entirety
        file: PathBuf,
    },

    /// Receive packets forever
    ///
    /// Writes each CRC-verified payload to <epoch-nanoseconds>.bin in
    /// the current directory.
    Rx,
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { 1 } else { 0 };
        CliError::new(err.into(), code)
    }
}
