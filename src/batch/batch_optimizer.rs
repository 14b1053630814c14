//! # Batch Optimizer Module
//!
//! Orchestratore principale: trova i GIF, lancia una ricerca per file con
//! concorrenza limitata, presenta il progresso e raccoglie le statistiche.
//!
//! ## Flusso:
//! 1. Discovery (file singolo oppure directory ricorsiva)
//! 2. Un canale di progresso condiviso, consumato da un solo presenter
//! 3. Un task per file, al massimo `workers` ricerche contemporanee (`Semaphore`)
//! 4. Stop broadcast a tutte le ricerche (Ctrl-C)
//! 5. Riepilogo finale (log oppure JSON)

use super::gif_task::{FileReport, GifTask};
use crate::{
    config::Config,
    error::OptimizeError,
    file_manager::FileManager,
    json_output::JsonMessage,
    optimizer::ProgressEvent,
    progress::{JobProgress, OptimizationStats, ProgressManager},
};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{error, info, warn};

/// What a Ctrl-C does, by how many have arrived so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Running searches stop at their next attempt boundary
    StopSearches,
    /// The process exits without waiting for the current encodes
    Exit,
}

impl Interrupt {
    /// Conventional status for a process ended by SIGINT
    pub const EXIT_CODE: i32 = 130;

    pub fn for_signal(count: u32) -> Self {
        if count <= 1 {
            Interrupt::StopSearches
        } else {
            Interrupt::Exit
        }
    }
}

/// Drives one search per input file
pub struct BatchOptimizer {
    config: Config,
    target_bytes: u64,
    stop_sender: broadcast::Sender<()>,
}

impl BatchOptimizer {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let target_bytes = config.target_bytes()?;
        let (stop_sender, _) = broadcast::channel(1);
        Ok(Self {
            config,
            target_bytes,
            stop_sender,
        })
    }

    /// Handle used to stop every running search at its next attempt boundary
    pub fn stop_handle(&self) -> broadcast::Sender<()> {
        self.stop_sender.clone()
    }

    pub fn target_bytes(&self) -> u64 {
        self.target_bytes
    }

    /// Files to process for `input` (a GIF or a directory of GIFs)
    pub fn collect_inputs(&self, input: &Path) -> Result<Vec<PathBuf>> {
        if input.is_dir() {
            FileManager::find_gif_files(input, &self.config.suffix)
        } else if input.is_file() {
            Ok(vec![input.to_path_buf()])
        } else {
            Err(anyhow::anyhow!("Input does not exist: {}", input.display()))
        }
    }

    pub async fn run(&self, input: &Path) -> Result<OptimizationStats> {
        let start_time = Instant::now();
        let files = self.collect_inputs(input)?;

        if files.is_empty() {
            if self.config.json_output {
                JsonMessage::complete(&OptimizationStats::new(), start_time.elapsed().as_secs_f64()).emit();
            } else {
                info!("No GIF files found in {}", input.display());
            }
            return Ok(OptimizationStats::new());
        }

        info!(
            "Optimizing {} file(s) to at most {} ({} workers)",
            files.len(),
            FileManager::format_size(self.target_bytes),
            self.config.workers
        );

        let bars = if self.config.json_output {
            Vec::new()
        } else {
            let manager = ProgressManager::new();
            files
                .iter()
                .map(|file| manager.add_job(&file.file_name().unwrap_or_default().to_string_lossy()))
                .collect()
        };

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let presenter = tokio::spawn(Self::present(progress_rx, files.clone(), bars.clone(), self.config.json_output));

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let stop_receivers: Vec<_> = files.iter().map(|_| self.stop_sender.subscribe()).collect();
        let mut tasks = Vec::with_capacity(files.len());

        for (job, (file, stop_receiver)) in files.iter().cloned().zip(stop_receivers).enumerate() {
            let permit = semaphore.clone().acquire_owned().await?;
            let task = GifTask::new(self.config.clone(), self.target_bytes);
            let progress_tx = progress_tx.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                task.process_file(&file, job, progress_tx, Some(stop_receiver)).await
            }));
        }
        drop(progress_tx);

        let results = futures::future::join_all(tasks).await;
        presenter.await?;

        let mut stats = OptimizationStats::new();
        for (job, (file, result)) in files.iter().zip(results).enumerate() {
            let bar = bars.get(job);
            match result? {
                Ok(report) => self.record_success(&mut stats, report, bar),
                Err(e) => self.record_failure(&mut stats, file, e, bar).await,
            }
        }

        let duration = start_time.elapsed().as_secs_f64();
        if self.config.json_output {
            JsonMessage::complete(&stats, duration).emit();
        } else {
            info!("{} in {:.1}s", stats.format_summary(), duration);
        }

        Ok(stats)
    }

    /// Single consumer of the shared progress channel
    async fn present(
        mut receiver: mpsc::UnboundedReceiver<(usize, ProgressEvent)>,
        files: Vec<PathBuf>,
        bars: Vec<JobProgress>,
        json_output: bool,
    ) {
        while let Some((job, event)) = receiver.recv().await {
            if json_output {
                if let Some(file) = files.get(job) {
                    JsonMessage::attempt(file.clone(), &event).emit();
                }
            } else if let Some(bar) = bars.get(job) {
                bar.update(&event.message, event.percent);
            }
        }
    }

    fn record_success(&self, stats: &mut OptimizationStats, report: FileReport, bar: Option<&JobProgress>) {
        stats.add_optimized(report.original_size, report.outcome.size);

        if self.config.json_output {
            JsonMessage::file_optimized(
                report.input.clone(),
                report.output.clone(),
                report.original_size,
                &report.outcome,
            )
            .emit();
        }

        if let Some(bar) = bar {
            bar.update(
                &format!(
                    "[OK] {} after {} attempts",
                    FileManager::format_size(report.outcome.size),
                    report.outcome.attempts
                ),
                100.0,
            );
            bar.finish(&format!("[OK] {}", FileManager::format_size(report.outcome.size)));
        }
    }

    async fn record_failure(&self, stats: &mut OptimizationStats, file: &Path, err: anyhow::Error, bar: Option<&JobProgress>) {
        let original_size = FileManager::file_size(file).await.unwrap_or(0);
        let unreachable = err
            .downcast_ref::<OptimizeError>()
            .map(OptimizeError::is_unreachable)
            .unwrap_or(false);

        if unreachable {
            stats.add_unreachable(original_size);
            warn!("{}: {}", file.display(), err);
        } else {
            stats.add_error();
            error!("Failed to optimize {}: {:#}", file.display(), err);
        }

        if self.config.json_output {
            JsonMessage::file_failed(file.to_path_buf(), original_size, format!("{:#}", err)).emit();
        }

        if let Some(bar) = bar {
            let label = if unreachable { "[UNREACHABLE]" } else { "[ERROR]" };
            bar.abandon(&format!("{} {}", label, err));
        }
    }
}
