//! splitkv CLI
//!
//! Create and operate a file-backed hash index from the command line.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use splitkv::{FileBlockStore, HashIndex, IndexConfig, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// splitkv CLI
#[derive(Parser, Debug)]
#[command(name = "splitkv")]
#[command(about = "Persistent splitting hash index")]
#[command(version)]
struct Args {
    /// Index file
    #[arg(short, long, default_value = "./splitkv.idx")]
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new index file
    Init {
        /// Requested directory size (rounded up to a power of two)
        #[arg(short, long, default_value = "1024")]
        index_size: usize,

        /// Value length in bytes
        #[arg(short, long, default_value = "8")]
        value_length: usize,

        /// Entries per block
        #[arg(short, long, default_value = "16")]
        entries_per_block: usize,
    },

    /// Get a value by key
    Get {
        key: u64,
    },

    /// Set a key to a value (must be exactly the configured length)
    Put {
        key: u64,
        value: String,
    },

    /// Remove a key
    Remove {
        key: u64,
    },

    /// Remove every entry
    Clear,

    /// Print index statistics
    Stats,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,splitkv=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let store = FileBlockStore::open(&args.path)?;

    match args.command {
        Commands::Init { index_size, value_length, entries_per_block } => {
            let config = IndexConfig::builder()
                .index_size(index_size)
                .value_length(value_length)
                .entries_per_block(entries_per_block)
                .build();

            let mut index = HashIndex::create(store, config)?;
            index.flush()?;
            println!("Created {} ({} slots)", args.path.display(), index.table_size());
            index.close()
        }
        Commands::Get { key } => {
            let index = HashIndex::open(store)?;
            match index.get(key) {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => println!("(not found)"),
            }
            index.close()
        }
        Commands::Put { key, value } => {
            let mut index = HashIndex::open(store)?;
            let replaced = index.put(key, value.as_bytes())?;
            index.flush()?;
            println!("{}", if replaced { "REPLACED" } else { "OK" });
            index.close()
        }
        Commands::Remove { key } => {
            let mut index = HashIndex::open(store)?;
            let removed = index.remove(key);
            index.flush()?;
            println!("{}", if removed.is_some() { "REMOVED" } else { "(not found)" });
            index.close()
        }
        Commands::Clear => {
            let mut index = HashIndex::open(store)?;
            index.clear()?;
            index.flush()?;
            println!("OK");
            index.close()
        }
        Commands::Stats => {
            let index = HashIndex::open(store)?;
            let stats = index.stats();
            println!("entries:         {}", stats.entry_count);
            println!("blocks:          {}", stats.block_count);
            println!("table size:      {}", stats.table_size);
            println!("global depth:    {}", stats.global_depth);
            println!("max local depth: {}", stats.max_local_depth);
            println!("block capacity:  {}", stats.block_capacity);
            println!("fill ratio:      {:.2}", stats.fill_ratio);
            index.close()
        }
    }
}
