//! # GIF Task Module
//!
//! Worker per l'ottimizzazione di un singolo GIF: decodifica, ricerca su un
//! thread bloccante dedicato, scrittura atomica del risultato.

use crate::{
    config::Config,
    encoder::GifFrameEncoder,
    error::OptimizeError,
    file_manager::FileManager,
    frames::FrameSequence,
    json_output::JsonMessage,
    optimizer::{ProgressEvent, SearchOutcome, TaggedProgressSink, TargetSizeOptimizer},
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, mpsc::UnboundedSender};
use tracing::{debug, info};

/// Result of one optimized file
#[derive(Debug)]
pub struct FileReport {
    pub input: PathBuf,
    /// None in dry-run mode
    pub output: Option<PathBuf>,
    pub original_size: u64,
    pub outcome: SearchOutcome,
}

/// Worker for a single GIF
#[derive(Clone)]
pub struct GifTask {
    pub config: Config,
    pub target_bytes: u64,
}

impl GifTask {
    pub fn new(config: Config, target_bytes: u64) -> Self {
        Self { config, target_bytes }
    }

    /// Decode, search and persist one file.
    ///
    /// `TargetUnreachable` comes back as an `OptimizeError` inside the anyhow error so
    /// the caller can tell it apart from real failures.
    pub async fn process_file(
        &self,
        input: &Path,
        job: usize,
        progress: UnboundedSender<(usize, ProgressEvent)>,
        stop_receiver: Option<broadcast::Receiver<()>>,
    ) -> Result<FileReport> {
        let original_size = FileManager::file_size(input).await?;
        let frames = FrameSequence::from_gif_file(input)
            .await
            .with_context(|| format!("Failed to decode {}", input.display()))?;

        debug!(
            "Decoded {}: {} frames, {:?}, {}",
            input.display(),
            frames.len(),
            frames.dimensions(),
            FileManager::format_size(original_size)
        );

        if self.config.json_output {
            JsonMessage::start(input.to_path_buf(), original_size, self.target_bytes, frames.len()).emit();
        }

        let outcome = self.search(frames, job, progress, stop_receiver).await?;

        let output = if self.config.dry_run {
            info!(
                "Dry run: {} would shrink to {}",
                input.display(),
                FileManager::format_size(outcome.size)
            );
            None
        } else {
            let output_path = FileManager::output_path_for(input, self.config.output_path.as_deref(), &self.config.suffix);
            FileManager::write_atomic(&output_path, outcome.blob.as_bytes())?;
            info!(
                "Saved {} ({} -> {}, {:.1}% smaller)",
                output_path.display(),
                FileManager::format_size(original_size),
                FileManager::format_size(outcome.size),
                FileManager::calculate_reduction(original_size, outcome.size)
            );
            Some(output_path)
        };

        Ok(FileReport {
            input: input.to_path_buf(),
            output,
            original_size,
            outcome,
        })
    }

    /// Run the synchronous search on the blocking pool
    async fn search(
        &self,
        frames: FrameSequence,
        job: usize,
        progress: UnboundedSender<(usize, ProgressEvent)>,
        stop_receiver: Option<broadcast::Receiver<()>>,
    ) -> Result<SearchOutcome> {
        let encoder = GifFrameEncoder::from_config(&self.config);
        let settings = self.config.search_settings();
        let target_bytes = self.target_bytes;
        let sink = TaggedProgressSink::new(job, progress);

        let result = tokio::task::spawn_blocking(move || -> Result<SearchOutcome, OptimizeError> {
            let mut optimizer = match stop_receiver {
                Some(receiver) => TargetSizeOptimizer::new_with_cancellation(encoder, settings, receiver),
                None => TargetSizeOptimizer::new(encoder, settings),
            };
            optimizer.run(&frames, target_bytes, &sink)
        })
        .await
        .context("Search worker panicked")?;

        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncodeParams, FrameEncoder};
    use crate::frames::test_support::gradient_sequence;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn write_source(dir: &Path) -> (PathBuf, u64) {
        let blob = GifFrameEncoder::default()
            .encode(&gradient_sequence(3, 48, 48), &EncodeParams::new(256, 1.0))
            .unwrap();
        let path = dir.join("clip.gif");
        std::fs::write(&path, blob.as_bytes()).unwrap();
        (path, blob.len())
    }

    #[tokio::test]
    async fn test_process_file_writes_output() {
        let temp_dir = TempDir::new().unwrap();
        let (input, size) = write_source(temp_dir.path());
        let task = GifTask::new(Config::default(), size / 2);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let report = task.process_file(&input, 0, tx, None).await.unwrap();

        let output = report.output.unwrap();
        assert_eq!(output, temp_dir.path().join("clip_optimized.gif"));
        let written = std::fs::read(&output).unwrap();
        assert_eq!(written.len() as u64, report.outcome.size);
        assert!(report.outcome.size <= size / 2);
        assert_eq!(report.original_size, size);

        let mut attempts = 0;
        while let Ok((job, _event)) = rx.try_recv() {
            assert_eq!(job, 0);
            attempts += 1;
        }
        assert_eq!(attempts, report.outcome.attempts);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let (input, size) = write_source(temp_dir.path());
        let config = Config {
            dry_run: true,
            ..Default::default()
        };
        let (tx, _rx) = mpsc::unbounded_channel();

        let report = GifTask::new(config, size).process_file(&input, 0, tx, None).await.unwrap();
        assert!(report.output.is_none());
        assert!(!temp_dir.path().join("clip_optimized.gif").exists());
    }

    #[tokio::test]
    async fn test_unreachable_target_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let (input, _) = write_source(temp_dir.path());
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = GifTask::new(Config::default(), 10).process_file(&input, 0, tx, None).await.unwrap_err();
        let err = err.downcast_ref::<OptimizeError>().unwrap();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_cancelled_task() {
        let temp_dir = TempDir::new().unwrap();
        let (input, size) = write_source(temp_dir.path());
        let (stop_tx, stop_rx) = broadcast::channel(1);
        stop_tx.send(()).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = GifTask::new(Config::default(), size / 2)
            .process_file(&input, 0, tx, Some(stop_rx))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OptimizeError>(),
            Some(OptimizeError::Cancelled { attempts: 0 })
        ));
    }
}
