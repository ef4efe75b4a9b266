//! chronicle - append-only state ledger CLI
//!
//! Front end over the chronicle-core ledger engine: ingest, query, verify,
//! reconstruct, and export audit bundles.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// chronicle - append-only state ledger
#[derive(Parser, Debug)]
#[command(name = "chronicle")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Ledger root directory (holds ledger.db and artifacts/)
    #[arg(long, default_value = "data")]
    root: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the record store and blob root
    Init,

    /// Append a raw record to the chain
    Append {
        /// Record kind
        #[arg(long)]
        kind: String,

        /// Record source tag
        #[arg(long, default_value = "")]
        source: String,

        /// Unix timestamp in seconds (0 = now)
        #[arg(long, default_value_t = 0)]
        time: i64,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Validate a typed payload and ingest it
    Collect {
        /// Collector kind: code|config|environment|mutation
        kind: String,

        /// Record source tag
        #[arg(long, default_value = "")]
        source: String,

        /// Unix timestamp in seconds (0 = now)
        #[arg(long, default_value_t = 0)]
        time: i64,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Query records, one JSON object per line
    Query {
        /// Fetch a single record by id
        #[arg(long)]
        id: Option<u64>,

        /// Lower time bound, inclusive (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        since: i64,

        /// Upper time bound, inclusive (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        until: i64,

        /// Maximum records returned
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },

    /// Verify the whole chain and print the result as JSON
    Verify,

    /// Print the reconstruction report at a target time
    Snapshot {
        /// Unix timestamp in seconds (0 = now)
        #[arg(long, default_value_t = 0)]
        time: i64,
    },

    /// Print the determinism advisory and explanation at a target time
    Advisory {
        /// Unix timestamp in seconds (0 = now)
        #[arg(long, default_value_t = 0)]
        time: i64,
    },

    /// Export an audit bundle
    Audit {
        /// Unix timestamp in seconds (0 = now)
        #[arg(long, default_value_t = 0)]
        time: i64,

        /// Write the bundle to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Blob store operations
    #[command(subcommand)]
    Artifact(ArtifactCommands),
}

#[derive(Subcommand, Debug)]
enum ArtifactCommands {
    /// Store a file under its content address and print the descriptor
    Put {
        /// File to store
        #[arg(long)]
        file: PathBuf,
    },
}

/// Payload input: inline JSON or a file, exactly one required.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct PayloadArgs {
    /// Payload JSON string
    #[arg(long)]
    payload_json: Option<String>,

    /// Path to a payload file (JSON)
    #[arg(long)]
    payload_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Init => commands::init::run(&cli.root),
        Commands::Append {
            kind,
            source,
            time,
            payload,
        } => commands::append::run(&cli.root, &kind, &source, time, &payload),
        Commands::Collect {
            kind,
            source,
            time,
            payload,
        } => commands::collect::run(&cli.root, &kind, &source, time, &payload),
        Commands::Query {
            id,
            since,
            until,
            limit,
        } => commands::query::run(&cli.root, id, since, until, limit),
        Commands::Verify => commands::verify::run(&cli.root),
        Commands::Snapshot { time } => commands::snapshot::run(&cli.root, time),
        Commands::Advisory { time } => commands::advisory::run(&cli.root, time),
        Commands::Audit { time, out } => commands::audit::run(&cli.root, time, out.as_deref()),
        Commands::Artifact(ArtifactCommands::Put { file }) => {
            commands::artifact::put(&cli.root, &file)
        },
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Logs go to stderr; stdout carries machine-parseable output only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
