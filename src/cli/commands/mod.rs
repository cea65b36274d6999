//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod helpers;
mod scrape;
mod serve;
mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "amzspider")]
#[command(about = "Scrape Amazon product pages into a spreadsheet")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding template.xlsx and output.xlsx (overrides config and EXCEL_DIR)
    #[arg(long, short = 'o', global = true)]
    output_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape product pages and append them to the output workbook
    Scrape {
        /// Product page URLs
        urls: Vec<String>,
        /// Read additional URLs from a file (one per line, # comments allowed)
        #[arg(short, long)]
        from_file: Option<PathBuf>,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
        /// Seconds to wait between products (default: from config)
        #[arg(short, long)]
        sleep: Option<f64>,
    },

    /// List the product ASINs linked from a storefront page
    Store {
        /// Storefront URL
        url: String,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Run saved product pages through the extractor without a browser
    Replay {
        /// Saved HTML files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Start the web server
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: 127.0.0.1:3030)
        #[arg(default_value = "127.0.0.1:3030")]
        bind: String,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        output_dir: cli.output_dir,
    };
    let (settings, _config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Scrape {
            urls,
            from_file,
            headed,
            sleep,
        } => scrape::cmd_scrape(&settings, urls, from_file.as_deref(), headed, sleep).await,
        Commands::Store { url, headed } => store::cmd_store(&settings, &url, headed).await,
        Commands::Replay { files } => scrape::cmd_replay(&settings, &files).await,
        Commands::Serve { bind } => serve::cmd_serve(&settings, &bind).await,
    }
}
