//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use dramaturg::Provider;
use std::path::PathBuf;

/// Dramaturg - screenplay conflict-chain analysis with LLM stages
#[derive(Parser, Debug)]
#[command(name = "dramaturg")]
#[command(about = "Screenplay conflict-chain analysis with LLM stages", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file (defaults to the layered lookup)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run all three stages on a script
    Analyze {
        /// Path to the script JSON file
        script: PathBuf,

        /// Provider override
        #[arg(long)]
        provider: Option<Provider>,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Write the final state here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Do not append this run to the history file
        #[arg(long)]
        no_history: bool,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Check a script's structure without calling a model
    Validate {
        /// Path to the script JSON file
        script: PathBuf,
    },

    /// Summarise the run history
    Stats {
        /// Only the most recent runs
        #[arg(long)]
        last: Option<usize>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Run the same script under several provider settings
    Compare {
        /// Path to the script JSON file
        script: PathBuf,

        /// TOML file with one `[[variant]]` table per configuration
        #[arg(long)]
        variants: PathBuf,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable summary
    Human,
    /// Pretty-printed JSON
    Json,
}
