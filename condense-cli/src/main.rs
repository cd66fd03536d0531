//! Condense CLI: compress code search results into one observation.
//!
//! Reads `SearchResult` JSON, runs the synthesis engine, and prints the
//! result as JSON. Also probes provider keys and shows the merged config.

mod commands;

use clap::Parser;
use condense_core::SynthesisMode;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Condense: progressive-disclosure synthesis for code search results
#[derive(Parser, Debug)]
#[command(name = "condense", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (for `.condense/config.toml`)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Synthesize an observation from a JSON array of search results
    Synthesize {
        /// The search query the results answer
        #[arg(long)]
        query: String,

        /// JSON file with the results (reads stdin when omitted)
        #[arg(short, long)]
        results: Option<PathBuf>,

        /// Synthesis mode: auto, algorithmic, llm
        #[arg(long)]
        mode: Option<SynthesisMode>,

        /// LLM provider: anthropic, openai, openrouter
        #[arg(long)]
        provider: Option<String>,

        /// Model override
        #[arg(short, long)]
        model: Option<String>,

        /// Confidence threshold for escalating to the LLM in auto mode
        #[arg(long)]
        threshold: Option<f64>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Check whether a provider accepts an API key
    TestKey {
        /// Provider name
        #[arg(short, long)]
        provider: String,

        /// Key to test (defaults to {PROVIDER}_API_KEY)
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the merged configuration (API key masked)
    Show,
    /// Print the configuration file locations
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)));

    let log_dir = directories::ProjectDirs::from("dev", "condense", "condense")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "condense.log");
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

    commands::handle_command(cli.command, &workspace).await
}
