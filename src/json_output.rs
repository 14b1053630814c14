//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso programmatico (`--json`).
//!
//! ## Responsabilità:
//! - Emette una riga JSON per ogni evento della ricerca su stdout
//! - Riusa `ProgressEvent` e `SearchOutcome` per i contenuti
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio elaborazione di un file
//! - `attempt`: Un tentativo di encode completato
//! - `file_complete`: Fine elaborazione di un file (ottimizzato o irraggiungibile)
//! - `complete`: Fine processo con statistiche finali
//! - `error`: Errore durante elaborazione

use crate::optimizer::{ProgressEvent, SearchOutcome, Termination};
use crate::progress::OptimizationStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio elaborazione di un file
    #[serde(rename = "start")]
    Start {
        path: PathBuf,
        original_size: u64,
        target_bytes: u64,
        frames: usize,
    },

    /// Tentativo completato
    #[serde(rename = "attempt")]
    Attempt {
        path: PathBuf,
        attempt: u32,
        size: u64,
        colors: u16,
        scale: f64,
        percentage: f64,
        message: String,
    },

    /// Fine elaborazione di un file
    #[serde(rename = "file_complete")]
    FileComplete {
        path: PathBuf,
        output: Option<PathBuf>,
        original_size: u64,
        optimized_size: Option<u64>,
        reduction_percent: f64,
        attempts: u32,
        colors: Option<u16>,
        scale: Option<f64>,
        termination: Option<String>,
        error: Option<String>,
    },

    /// Processo completato
    #[serde(rename = "complete")]
    Complete {
        files_processed: usize,
        files_optimized: usize,
        files_unreachable: usize,
        errors: usize,
        total_bytes_saved: u64,
        average_reduction: f64,
        duration_seconds: f64,
    },

    /// Errore generale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(path: PathBuf, original_size: u64, target_bytes: u64, frames: usize) -> Self {
        Self::Start {
            path,
            original_size,
            target_bytes,
            frames,
        }
    }

    pub fn attempt(path: PathBuf, event: &ProgressEvent) -> Self {
        Self::Attempt {
            path,
            attempt: event.attempt,
            size: event.size,
            colors: event.colors,
            scale: event.scale,
            percentage: event.percent,
            message: event.message.clone(),
        }
    }

    /// Crea un messaggio di completamento per una ricerca riuscita
    pub fn file_optimized(path: PathBuf, output: Option<PathBuf>, original_size: u64, outcome: &SearchOutcome) -> Self {
        Self::FileComplete {
            path,
            output,
            original_size,
            optimized_size: Some(outcome.size),
            reduction_percent: crate::file_manager::FileManager::calculate_reduction(original_size, outcome.size),
            attempts: outcome.attempts,
            colors: Some(outcome.params.palette_size),
            scale: Some(outcome.params.scale),
            termination: Some(termination_name(outcome.termination).to_string()),
            error: None,
        }
    }

    /// Crea un messaggio di completamento per un file non ottimizzato
    pub fn file_failed(path: PathBuf, original_size: u64, error: String) -> Self {
        Self::FileComplete {
            path,
            output: None,
            original_size,
            optimized_size: None,
            reduction_percent: 0.0,
            attempts: 0,
            colors: None,
            scale: None,
            termination: None,
            error: Some(error),
        }
    }

    pub fn complete(stats: &OptimizationStats, duration_seconds: f64) -> Self {
        Self::Complete {
            files_processed: stats.files_processed,
            files_optimized: stats.files_optimized,
            files_unreachable: stats.files_unreachable,
            errors: stats.errors,
            total_bytes_saved: stats.total_bytes_saved,
            average_reduction: stats.overall_reduction_percent(),
            duration_seconds,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

fn termination_name(termination: Termination) -> &'static str {
    match termination {
        Termination::Accepted => "accepted",
        Termination::RolledBack => "rolled_back",
        Termination::BestEffort => "best_effort",
        Termination::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncodedBlob, EncodeParams};

    #[test]
    fn test_attempt_message_shape() {
        let event = ProgressEvent {
            attempt: 2,
            size: 2048,
            colors: 128,
            scale: 0.75,
            message: "Attempt 2: 0.00 MB".to_string(),
            percent: 12.5,
        };
        let json = serde_json::to_value(JsonMessage::attempt(PathBuf::from("a.gif"), &event)).unwrap();

        assert_eq!(json["type"], "attempt");
        assert_eq!(json["attempt"], 2);
        assert_eq!(json["colors"], 128);
        assert_eq!(json["percentage"], 12.5);
    }

    #[test]
    fn test_file_optimized_message() {
        let outcome = SearchOutcome {
            blob: EncodedBlob::new(vec![0; 250]),
            size: 250,
            params: EncodeParams::new(64, 0.5),
            winning_attempt: 3,
            attempts: 4,
            termination: Termination::RolledBack,
        };
        let json = serde_json::to_value(JsonMessage::file_optimized(
            PathBuf::from("a.gif"),
            Some(PathBuf::from("a_optimized.gif")),
            1000,
            &outcome,
        ))
        .unwrap();

        assert_eq!(json["type"], "file_complete");
        assert_eq!(json["optimized_size"], 250);
        assert_eq!(json["reduction_percent"], 75.0);
        assert_eq!(json["termination"], "rolled_back");
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_cancelled_search_still_names_its_result() {
        assert_eq!(termination_name(Termination::Cancelled), "cancelled");
        assert_eq!(termination_name(Termination::BestEffort), "best_effort");
    }
}
