//! Lens - HTTP service and CLI for image captioning, object detection, OCR,
//! and caption-driven image search and summaries.
//!
//! # Usage
//!
//! ```bash
//! # Start the HTTP server
//! lens serve --port 8000
//!
//! # Analyze an image or a directory locally
//! lens analyze photo.jpg --capabilities caption,detection
//!
//! # Manage models
//! lens models list
//! lens models download
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;
mod server;

/// Lens - image analysis service.
#[derive(Parser, Debug)]
#[command(name = "lens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load models and start the HTTP server
    Serve(cli::serve::ServeArgs),

    /// Run the analysis pipeline on local files
    Analyze(cli::analyze::AnalyzeArgs),

    /// Manage model files (list, download, etc.)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is normal
    let dotenv = dotenvy::dotenv();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let mut config = match lens_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `lens config path`."
            );
            lens_core::Config::default()
        }
    };
    if let Err(e) = config.apply_env() {
        eprintln!("Warning: Ignoring environment overrides: {e}");
    }
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Lens v{}", lens_core::VERSION);
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    match cli.command {
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Analyze(args) => cli::analyze::execute(args, config).await,
        Commands::Models(args) => cli::models::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
