use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Reconstruct transaction ledgers from extracted bank-statement pages.
#[derive(Debug, Parser)]
#[command(name = "ledgerline", about, version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full reconstruction pipeline over an extracted document
    Parse {
        /// Path to the extractor dump (JSON with a "pages" array)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Directory used as the object-store bucket
        #[arg(long, default_value = "ledgerline-out")]
        output_dir: PathBuf,

        /// Object-store key of the source PDF (defaults to the input stem)
        #[arg(long)]
        source_key: Option<String>,

        /// Job identifier (defaults to one derived from the file name)
        #[arg(long)]
        job_id: Option<String>,

        /// User identifier; enables the logged-in job backend
        #[arg(long)]
        user_id: Option<String>,

        /// Country override for date-locale detection (e.g. IN, US, UK)
        #[arg(long)]
        country: Option<String>,

        /// Page budget (default: from config, 10)
        #[arg(long)]
        pages: Option<usize>,

        /// Optional TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Detect and canonicalize the table header row
    Headers {
        /// Path to the extractor dump (JSON with a "pages" array)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Page budget (default: 10)
        #[arg(long, default_value_t = 10)]
        pages: usize,
    },

    /// Score a transactions JSONL for balance consistency
    Score {
        /// Path to the transactions JSONL file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// Output format for inspection commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Text,
    /// JSON
    Json,
}
