/// trickle command-line tool: replay and inspect progressive image data.
///
/// # Command overview
///
/// ```text
/// trickle <COMMAND> [OPTIONS]
///
/// Commands:
///   decode     Replay a Netpbm file as a chunked download through a decode task
///   inspect    Print the header of a Netpbm file
///   help       Print help information
///
/// Global options:
///   -v, --verbose    Log at debug level (RUST_LOG overrides)
///   -h, --help       Print help
///   -V, --version    Print version
/// ```
///
/// # Exit codes
///
/// | Code | Meaning                                         |
/// |------|-------------------------------------------------|
/// | 0    | Success                                         |
/// | 1    | Error (I/O failure, undecodable file, etc.)     |
///
/// Logs and error details go to stderr so stdout can be piped cleanly.
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd_decode;
mod cmd_inspect;

// ── CLI root ──────────────────────────────────────────────────────────────────

/// Progressive decode playground.
#[derive(Parser)]
#[command(name = "trickle", version, about = "Progressive decode CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log task and decoder activity at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
}

// ── Sub-commands ──────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum Commands {
    /// Replay a file as a chunked download and print every outcome.
    Decode(DecodeArgs),
    /// Print the Netpbm header of a file.
    Inspect(InspectArgs),
}

// ── Argument structs ──────────────────────────────────────────────────────────

/// Arguments for `trickle decode`.
///
/// The file is read `--chunk-size` bytes at a time; after each chunk the
/// accumulated bytes are handed to a decode task, exactly as a network
/// download would.
///
/// ```text
/// ┌──────────────────┬─────────────────────────────────────────────────┐
/// │ Flag             │ Effect                                          │
/// ├──────────────────┼─────────────────────────────────────────────────┤
/// │ --chunk-size N   │ Bytes per chunk (default 4096)                  │
/// │ --delay-ms N     │ Pause before each chunk, simulating a slow link │
/// │ --no-progressive │ Decode only the final buffer                    │
/// │ --concurrency N  │ Max decodes running at once (default: #cpus)    │
/// │ --json           │ One JSON object per outcome                     │
/// └──────────────────┴─────────────────────────────────────────────────┘
/// ```
#[derive(clap::Args)]
pub struct DecodeArgs {
    /// Path to a binary PGM (`P5`) or PPM (`P6`) file.
    pub file: PathBuf,

    /// Bytes delivered per chunk.
    #[arg(long, default_value_t = 4096)]
    pub chunk_size: usize,

    /// Delay before each chunk, in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,

    /// Disable progressive previews.
    #[arg(long)]
    pub no_progressive: bool,

    /// Maximum number of decodes running at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Print outcomes as JSON lines.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `trickle inspect`.
#[derive(clap::Args)]
pub struct InspectArgs {
    /// Path to the file to inspect.
    pub file: PathBuf,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Decode(args) => cmd_decode::run(&args),
        Commands::Inspect(args) => cmd_inspect::run(&args),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `-v` selects debug for the trickle crates.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,trickle_task=debug,trickle_decoder=debug,trickle=debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init()
        .ok();
}
