//! Hoard CLI
//!
//! Offline tools for looking into a Hoard store directory.
//!
//! # Commands
//!
//! - `inspect` - Record counts, configuration and allocator state
//! - `ids` - List record identifiers
//! - `get` - Print one record
//! - `list` - Print every record of a type
//! - `select` - Run a filter/sort/paginate query

mod commands;

use clap::{Parser, Subcommand};
use hoard_core::Encoding;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Hoard command-line store tools.
#[derive(Parser)]
#[command(name = "hoard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Record encoding of the store (json, cbor)
    #[arg(global = true, short, long, default_value = "json")]
    encoding: Encoding,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display record counts, configuration and allocator state
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List record identifiers
    Ids {
        /// Only identifiers of this type
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,
    },

    /// Print one record as JSON
    Get {
        /// Record identifier, e.g. USER.1A
        id: String,
    },

    /// Print every record of an indexed type
    List {
        /// Type name
        type_name: String,
    },

    /// Filter, sort and paginate the records of a type
    Select {
        /// Type name
        type_name: String,

        /// Filter as a JSON object
        #[arg(short = 'q', long, default_value = "{}")]
        filter: String,

        /// Sort field (repeat for tie-breakers)
        #[arg(short, long)]
        sort: Vec<String>,

        /// First position of the page
        #[arg(long, default_value = "0")]
        start: usize,

        /// Position after the last one of the page
        #[arg(long)]
        end: Option<usize>,

        /// Reverse the order
        #[arg(short, long)]
        descending: bool,

        /// Select from this grouping's bucket instead of the whole type
        #[arg(long, requires = "bucket")]
        grouping: Option<String>,

        /// Bucket value (JSON scalar)
        #[arg(long, requires = "grouping")]
        bucket: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, cli.encoding, &format)?;
        }
        Commands::Ids { type_name } => {
            let path = cli.path.ok_or("Store path required for ids")?;
            commands::ids::run(&path, cli.encoding, type_name.as_deref())?;
        }
        Commands::Get { id } => {
            let path = cli.path.ok_or("Store path required for get")?;
            commands::get::run(&path, cli.encoding, &id)?;
        }
        Commands::List { type_name } => {
            let path = cli.path.ok_or("Store path required for list")?;
            commands::list::run(&path, cli.encoding, &type_name)?;
        }
        Commands::Select {
            type_name,
            filter,
            sort,
            start,
            end,
            descending,
            grouping,
            bucket,
        } => {
            let path = cli.path.ok_or("Store path required for select")?;
            let query = commands::select::Query {
                type_name,
                filter,
                sort,
                start,
                end,
                descending,
                bucket: grouping.zip(bucket),
            };
            commands::select::run(&path, cli.encoding, &query)?;
        }
        Commands::Version => {
            println!("Hoard CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Hoard Core v{}", hoard_core::VERSION);
        }
    }

    Ok(())
}
