//! caskstore CLI
//!
//! Command-line interface for inspecting and editing a store directory.

use std::path::PathBuf;
use std::process::ExitCode;

use caskstore::config::DEFAULT_MAX_SEGMENT_SIZE;
use caskstore::{CaskError, Config, Store};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// caskstore CLI
#[derive(Parser, Debug)]
#[command(name = "caskstore-cli")]
#[command(about = "CLI for the caskstore Bitcask key-value store")]
#[command(version)]
struct Args {
    /// Store directory
    #[arg(short, long, default_value = "./caskstore_data")]
    dir: PathBuf,

    /// Segment size limit in MiB before rollover [default: 10000 KiB]
    #[arg(short = 'm', long)]
    max_segment_mb: Option<u64>,

    /// fsync after every write
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    #[command(alias = "delete")]
    Del {
        /// The key to delete
        key: String,
    },

    /// List all keys
    List,

    /// Print every key and value, tab separated
    Dump,

    /// Compact the store into a new generation
    Merge,

    /// Show recovery statistics
    Stats,
}

impl Commands {
    fn writes(&self) -> bool {
        matches!(self, Commands::Put { .. } | Commands::Del { .. } | Commands::Merge)
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,caskstore=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> caskstore::Result<ExitCode> {
    let config = Config::builder()
        .data_dir(&args.dir)
        .max_segment_size(segment_size_bytes(args.max_segment_mb)?)
        .read_write(args.command.writes())
        .sync_on_put(args.sync)
        .build();

    let mut store = Store::open(config)?;

    let code = match args.command {
        Commands::Get { key } => match store.get(&key)? {
            Some(value) => {
                println!("{}", value);
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("(not found)");
                ExitCode::from(2)
            }
        },
        Commands::Put { key, value } => {
            store.put(&key, &value)?;
            ExitCode::SUCCESS
        }
        Commands::Del { key } => {
            store.delete(&key)?;
            ExitCode::SUCCESS
        }
        Commands::List => {
            let mut keys = store.list_keys();
            keys.sort();
            for key in keys {
                println!("{}", key);
            }
            ExitCode::SUCCESS
        }
        Commands::Dump => {
            store.fold((), |(), key, value| println!("{}\t{}", key, value))?;
            ExitCode::SUCCESS
        }
        Commands::Merge => {
            let report = store.merge()?;
            println!(
                "generation {} -> {}: {} keys, {} segments, {} files removed",
                report.old_generation,
                report.new_generation,
                report.keys_written,
                report.segments_written,
                report.files_removed
            );
            ExitCode::SUCCESS
        }
        Commands::Stats => {
            let report = store.recovery_report();
            println!("mode:              {:?}", report.mode);
            println!("generation:        {}", store.generation());
            println!("segments:          {}", report.segments);
            println!("stale segments:    {}", report.stale_segments);
            println!("hint files used:   {}", report.hint_files_replayed);
            println!("segments replayed: {}", report.segments_replayed);
            println!("records replayed:  {}", report.records_replayed);
            println!("tombstones:        {}", report.tombstones);
            println!("live keys:         {}", report.live_keys);
            ExitCode::SUCCESS
        }
    };

    store.close()?;
    Ok(code)
}

/// Convert the `--max-segment-mb` flag to bytes
fn segment_size_bytes(max_segment_mb: Option<u64>) -> caskstore::Result<u64> {
    match max_segment_mb {
        Some(mb) => mb.checked_mul(1024 * 1024).ok_or_else(|| {
            CaskError::Config(format!("max segment size of {} MiB overflows", mb))
        }),
        None => Ok(DEFAULT_MAX_SEGMENT_SIZE),
    }
}
