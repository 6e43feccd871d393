//! # Lost & Found CLI (`lnf`)
//!
//! Catalogue found items with a photo and find them again by text or by
//! taking a picture of the thing you lost.
//!
//! ## Usage
//!
//! ```bash
//! lnf --config ./config/lnf.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lnf init` | Create the SQLite catalogue and the blob directory |
//! | `lnf add --name <n> --category <c> --image <path>` | Catalogue a found item |
//! | `lnf search "<query>"` | Name/category prefix or label match |
//! | `lnf search-image --image <path>` | Label a photo and search by its labels |
//! | `lnf classify --image <path>` | Show the labels for a photo |
//!
//! ## Examples
//!
//! ```bash
//! lnf add --name "Blue backpack" --category Bags --image ./found/IMG_0042.jpg
//! lnf search bag
//! camera-snap | lnf search-image --capture
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lost_found::image_source::CliImageSource;
use lost_found::ops::LostFound;
use lost_found::{classify_cmd, config, migrate, search, submit};
use lost_found_core::LostFoundError;

/// Lost & Found: photo-labelled catalogue search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lnf.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lnf",
    about = "Lost & Found: catalogue found items and search them by text or photo",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lnf.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the catalogue database and blob directory.
    ///
    /// Idempotent; running it again is safe.
    Init,

    /// Catalogue a found item.
    ///
    /// The photo is labelled by the configured classifier; `--label` adds
    /// labels of your own.
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        category: String,

        /// Photo of the item.
        #[arg(long)]
        image: PathBuf,

        /// Extra label (repeatable).
        #[arg(long = "label")]
        labels: Vec<String>,
    },

    /// Search by text: name or category prefix, or exact label.
    Search {
        query: String,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search by photo: classify it, then find items sharing any label.
    SearchImage {
        #[arg(long, conflicts_with = "capture", required_unless_present = "capture")]
        image: Option<PathBuf>,

        /// Read the photo from stdin instead of a file.
        #[arg(long)]
        capture: bool,

        #[arg(long)]
        json: bool,
    },

    /// Print the labels the classifier assigns to a photo.
    Classify {
        #[arg(long, conflicts_with = "capture", required_unless_present = "capture")]
        image: Option<PathBuf>,

        #[arg(long)]
        capture: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<LostFoundError>() {
            Some(user_error) if user_error.is_user_correctable() => {
                eprintln!("{}", user_error);
                std::process::exit(1);
            }
            _ => Err(e),
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        std::fs::create_dir_all(&cfg.blobs.root)?;
        println!("Catalogue initialized successfully.");
        return Ok(());
    }

    let service = LostFound::from_config(&cfg).await?;

    match cli.command {
        Commands::Init => {
            // Handled above (before opening the service)
            unreachable!()
        }
        Commands::Add {
            name,
            category,
            image,
            labels,
        } => {
            submit::run_add(&service, &name, &category, &image, labels).await?;
        }
        Commands::Search { query, json } => {
            search::run_search(&service, &query, json).await?;
        }
        Commands::SearchImage {
            image,
            capture,
            json,
        } => {
            let source = CliImageSource::new(image);
            search::run_search_image(&service, &source, capture, json).await?;
        }
        Commands::Classify { image, capture } => {
            let source = CliImageSource::new(image);
            classify_cmd::run_classify(&service, &source, capture).await?;
        }
    }

    Ok(())
}
