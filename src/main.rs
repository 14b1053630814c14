//! # GIF Size Optimizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione (file + override da CLI)
//! - Validazione del target prima di qualsiasi decodifica
//! - Collegamento di Ctrl-C allo stop delle ricerche in corso
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (input, target, output, workers, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica `~/.gif-optimizer/config.json` (o `--config`) e applica gli override
//! 4. Crea il `BatchOptimizer` e avvia la ricerca per ogni GIF
//!
//! ## Esempio di utilizzo:
//! ```bash
//! gif-optimizer animation.gif --target-mb 1.5 --verbose
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use gif_size_optimizer::batch::Interrupt;
use gif_size_optimizer::config::ResizeFilter;
use gif_size_optimizer::file_manager::FileManager;
use gif_size_optimizer::json_output::JsonMessage;
use gif_size_optimizer::{parse_target_mb, BatchOptimizer, Config};

#[derive(Parser)]
#[command(name = "gif-optimizer")]
#[command(about = "Shrink animated GIFs under a target size with the best quality that fits")]
struct Args {
    /// GIF file, or directory scanned recursively for GIFs
    input: PathBuf,

    /// Target size in megabytes (e.g. 1.5)
    #[arg(short, long)]
    target_mb: Option<String>,

    /// Output directory for optimized files (default: next to each input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum encode attempts per file
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Resampling filter used when scaling frames
    #[arg(long, value_enum)]
    filter: Option<ResizeFilter>,

    /// Number of GIFs optimized in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Configuration file (default: ~/.gif-optimizer/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config file and continue
    #[arg(long)]
    save_config: bool,

    /// Dry run - search but don't write the optimized files
    #[arg(long)]
    dry_run: bool,

    /// Output progress and results as JSON lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; JSON mode keeps stdout for JSON lines only
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    if args.json {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = tracing_subscriber::fmt().with_max_level(level).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let config_path = args.config.clone().or_else(Config::default_path);
    let mut config = match config_path {
        Some(ref path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(ref target) = args.target_mb {
        let target_bytes = parse_target_mb(target)?;
        config.target_mb = target_bytes as f64 / gif_size_optimizer::config::BYTES_PER_MB;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(filter) = args.filter {
        config.resize_filter = filter;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(ref output_dir) = args.output {
        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir)?;
            info!("Created output directory: {}", output_dir.display());
        }
        config.output_path = Some(output_dir.clone());
    }
    config.dry_run |= args.dry_run;
    config.json_output |= args.json;

    if let Err(e) = config.validate() {
        if config.json_output {
            JsonMessage::error("Invalid configuration".to_string(), Some(e.to_string())).emit();
        }
        return Err(e.into());
    }

    if args.save_config {
        if let Some(ref path) = config_path {
            config.save_to_file(path).await?;
            info!("Saved configuration to {}", path.display());
        }
    }

    let optimizer = BatchOptimizer::new(config)?;
    info!("Target size: {}", FileManager::format_size(optimizer.target_bytes()));

    let stop_handle = optimizer.stop_handle();
    tokio::spawn(async move {
        let mut received = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            received += 1;
            match Interrupt::for_signal(received) {
                Interrupt::StopSearches => {
                    warn!("Interrupted, stopping after the current attempt (Ctrl-C again to exit now)");
                    let _ = stop_handle.send(());
                }
                Interrupt::Exit => {
                    warn!("Interrupted again, exiting");
                    std::process::exit(Interrupt::EXIT_CODE);
                }
            }
        }
    });

    let stats = optimizer.run(&args.input).await?;

    let failed = stats.files_unreachable + stats.errors;
    if failed > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} file(s) could not be optimized",
            failed,
            stats.files_processed
        ));
    }

    Ok(())
}
