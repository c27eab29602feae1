//! Provtrail CLI: record and inspect element-level data provenance.

mod bench;
mod catalog;
mod commands;
mod sample;

use clap::Parser;
use provtrail_core::{Format, ProvenanceError};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Provtrail: element-level provenance for ETL pipelines
#[derive(Parser, Debug)]
#[command(name = "provtrail", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.provtrail/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Provenance database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Keep the catalog in memory for this run
    #[arg(long)]
    in_memory: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Emit stderr logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Load defaults, definitions and events from a catalog manifest
    Load {
        /// Catalog file (TOML)
        catalog: PathBuf,
    },
    /// Print the lineage of one stored value
    Trace {
        /// Destination store name
        store: String,
        /// Destination variable name
        variable: String,
        /// Destination reference (row key)
        reference: String,
        /// Output format: logtext, mermaid_flow, mermaid_w3cprov, fhir
        #[arg(short, long, value_parser = parse_format)]
        format: Option<Format>,
        /// Print the structured lineage as JSON instead of rendering it
        #[arg(long)]
        json: bool,
    },
    /// Run the vital-signs sample pipeline and trace one averaged pulse
    Demo {
        /// Number of patient rows to record
        #[arg(short, long, default_value = "3")]
        rows: usize,
        /// Output format: logtext, mermaid_flow, mermaid_w3cprov, fhir
        #[arg(short, long, value_parser = parse_format)]
        format: Option<Format>,
        /// Write to the configured database instead of memory
        #[arg(long)]
        persist: bool,
    },
    /// Time the sample pipeline against fresh databases
    Bench {
        /// Warehouse sizes (rows) to measure
        #[arg(short, long, value_delimiter = ',', default_value = "1,10,100,1000")]
        sizes: Vec<usize>,
        /// Repeats per size; the minimum is reported
        #[arg(short, long, default_value = "5")]
        repeat: usize,
        /// Keep the database files
        #[arg(long)]
        keep: bool,
    },
    /// Show row counts per entity kind
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the effective configuration
    Show,
}

fn parse_format(raw: &str) -> Result<Format, String> {
    raw.parse()
        .map_err(|e: ProvenanceError| e.to_string())
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over the flags when set
    let stderr_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let stderr_layer = if cli.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(stderr_filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(stderr_filter())
            .boxed()
    };

    let log_dir = directories::ProjectDirs::from("dev", "provtrail", "provtrail")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "provtrail.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut config = provtrail_core::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Apply CLI overrides
    if let Some(database) = cli.database {
        config.database.path = database;
        config.database.in_memory = false;
    }
    if cli.in_memory {
        config.database.in_memory = true;
    }
    let problems = config.validate();
    if !problems.is_empty() {
        anyhow::bail!("Configuration error: {}", problems.join("; "));
    }

    commands::handle_command(cli.command, config, &workspace)
}
