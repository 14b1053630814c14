//! # Progress Presentation and Statistics Module
//!
//! Questo modulo presenta il progresso delle ricerche e raccoglie le statistiche finali.
//!
//! ## Responsabilità:
//! - Una progress bar `indicatif` per ogni file (scala 0-100, percentuale verso il target)
//! - Messaggio della bar = ultimo tentativo ("Attempt 3: 1.42 MB")
//! - Tracking statistiche (file ottimizzati, irraggiungibili, errori, byte risparmiati)
//! - Riepilogo finale formattato
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:04] [========================>---------------] 61% cat.gif Attempt 3: 1.62 MB
//! ```

use crate::file_manager::FileManager;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Owns one percent bar per file being optimized
#[derive(Clone)]
pub struct ProgressManager {
    multi: MultiProgress,
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressManager {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// Add a bar for one file
    pub fn add_job(&self, label: &str) -> JobProgress {
        let bar = self.multi.add(ProgressBar::new(100));

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {prefix} {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        JobProgress { bar }
    }
}

/// Bar of a single file
#[derive(Clone)]
pub struct JobProgress {
    bar: ProgressBar,
}

impl JobProgress {
    pub fn update(&self, message: &str, percent: f64) {
        self.bar.set_position(percent.clamp(0.0, 100.0).round() as u64);
        self.bar.set_message(message.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

/// Statistics tracker for optimization results
#[derive(Debug, Default)]
pub struct OptimizationStats {
    pub files_processed: usize,
    pub files_optimized: usize,
    pub files_unreachable: usize,
    pub total_bytes_saved: u64,
    pub total_original_size: u64,
    pub errors: usize,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_optimized(&mut self, original_size: u64, new_size: u64) {
        self.files_processed += 1;
        self.files_optimized += 1;
        self.total_original_size += original_size;
        self.total_bytes_saved += original_size.saturating_sub(new_size);
    }

    pub fn add_unreachable(&mut self, original_size: u64) {
        self.files_processed += 1;
        self.files_unreachable += 1;
        self.total_original_size += original_size;
    }

    pub fn add_error(&mut self) {
        self.files_processed += 1;
        self.errors += 1;
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.total_bytes_saved as f64 / self.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Optimized: {} | Unreachable: {} | Errors: {} | Total saved: {} ({:.2}%)",
            self.files_processed,
            self.files_optimized,
            self.files_unreachable,
            self.errors,
            FileManager::format_size(self.total_bytes_saved),
            self.overall_reduction_percent()
        )
    }
}
