///
/// strand-stress - Stress driver for strand threads
///
/// Each subcommand starts worker threads through the process-wide registry
/// and exits non-zero when the property it checks is violated:
/// - strand-stress mutex: shared counter under a ticket lock
/// - strand-stress barrier: phase progression across barrier rounds
/// - strand-stress hello: create/join of a batch of greeting threads
/// - strand-stress fifo: lock hand-off follows ticket order
///

mod scenarios;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use strand_sync::Backoff;
use strand_threads::{RegistryConfig, lifecycle};
use tracing::{Level, error};

use scenarios::StressError;

#[derive(Parser)]
#[command(name = "strand-stress")]
#[command(author, version, about = "Stress scenarios for strand threads", long_about = None)]
struct Cli {
    /// Registry configuration file (strand.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Spin policy for locks and barriers (spin, yield, exponential)
    #[arg(long, global = true)]
    backoff: Option<Backoff>,

    /// Log registry activity
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Increment a shared counter under a ticket lock
    Mutex {
        #[arg(long, default_value_t = 8)]
        threads: usize,

        /// Increments per thread
        #[arg(long, default_value_t = 25)]
        iterations: usize,
    },

    /// Run threads through repeated barrier rounds
    Barrier {
        #[arg(long, default_value_t = 16)]
        threads: usize,

        #[arg(long, default_value_t = 8)]
        rounds: usize,
    },

    /// Create a batch of threads that greet and exit
    Hello {
        #[arg(long, default_value_t = 4)]
        threads: usize,
    },

    /// Queue threads on a held lock and check they acquire it in order
    Fifo {
        #[arg(long, default_value_t = 8)]
        threads: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StressError> {
    let mut config = match &cli.config {
        Some(path) => RegistryConfig::load(path)?,
        None => RegistryConfig::default(),
    };
    if let Some(backoff) = cli.backoff {
        config = config.with_backoff(backoff);
    }
    let backoff = config.backoff;
    lifecycle::init_with(config)?;

    match cli.command {
        Commands::Mutex { threads, iterations } => scenarios::mutex(threads, iterations, backoff),
        Commands::Barrier { threads, rounds } => scenarios::barrier(threads, rounds, backoff),
        Commands::Hello { threads } => scenarios::hello(threads),
        Commands::Fifo { threads } => scenarios::fifo(threads, backoff),
    }
}
