use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docscan_core::Config;
use docscan_ocr::{DocumentPipeline, OcrBackend};
use docscan_storage::RecordStore;
use tokio::sync::mpsc;

mod commands;

#[derive(Parser)]
#[command(name = "docscan")]
#[command(about = "Read beneficiary forms into a CSV record store")]
#[command(version)]
struct Cli {
    /// Config file (TOML). Defaults to docscan.toml in the user config directory, if present.
    #[arg(short, long, env = "DOCSCAN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Record store, overriding `store_path` from the config
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from images and append them to the store
    Process {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Process images as they are dropped into a folder
    Watch { dir: PathBuf },
    /// Print every stored row as JSON
    Rows,
    /// Print the field regions in use
    Fields,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let store = RecordStore::new(cli.store.clone().unwrap_or_else(|| config.store_path.clone()));

    match cli.command {
        Commands::Process { images } => {
            let pipeline = DocumentPipeline::from_config(build_recognizer(&config)?, &config)?;
            let summary = commands::process_paths(&pipeline, &store, &images).await?;
            tracing::info!(stored = summary.stored, failed = summary.failed, "Done");
            if summary.failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Watch { dir } => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create intake directory {}", dir.display()))?;
            let pipeline = DocumentPipeline::from_config(build_recognizer(&config)?, &config)?;

            // The channel bridges the notify watcher thread and the processor.
            let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
            // The watcher must be kept alive for the duration of the run.
            let _watcher = docscan_ocr::pipeline::spawn_intake_watcher(&dir, tx)
                .context("Failed to start intake folder watcher")?;
            tracing::info!("Watching intake folder: {}", dir.display());

            tokio::select! {
                summary = commands::run_intake(&pipeline, &store, &mut rx) => {
                    tracing::info!(stored = summary.stored, failed = summary.failed, "Intake closed");
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, stopping intake");
                }
            }
        }
        Commands::Rows => {
            let rows = commands::list_rows(&store)?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Fields => {
            let fields = commands::describe_fields(&config.field_map()?);
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
    }
    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path).with_context(|| format!("Loading {}", path.display()));
    }
    let default_path = directories::ProjectDirs::from("com", "docscan", "docscan")
        .map(|dirs| dirs.config_dir().join("docscan.toml"));
    match default_path {
        Some(path) if path.exists() => {
            tracing::info!("Using config {}", path.display());
            Ok(Config::load(&path)?)
        }
        _ => Ok(Config::default()),
    }
}

/// Construct the recognition engine. Called once per run; the pipeline keeps it.
fn build_recognizer(config: &Config) -> Result<Box<dyn OcrBackend>> {
    #[cfg(feature = "tesseract")]
    {
        let engine = docscan_ocr::recognizer::tesseract_backend::TesseractRecognizer::new(None, &config.language)?;
        Ok(Box::new(engine))
    }
    #[cfg(not(feature = "tesseract"))]
    {
        let engine = docscan_ocr::TesseractCli::new(&config.language)?;
        Ok(Box::new(engine))
    }
}
