//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri della ricerca
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Converte il target in megabyte nel budget in byte usato dall'optimizer
//!
//! ## Parametri di configurazione:
//! - `target_mb`: Dimensione massima desiderata in MB (default: 1.5)
//! - `max_attempts`: Numero massimo di ri-encode (default: 25)
//! - `min_colors`: Palette minima (default: 8)
//! - `min_resize`: Scala minima prima di arrendersi (default: 0.25)
//! - `accept_ratio`: Frazione del target considerata "abbastanza vicina" (default: 0.85)
//! - `resize_filter`: Filtro di resampling (default: Lanczos)
//! - `quantizer_speed`: Sample factor NeuQuant (1-30, default: 10)
//! - `workers`: Ricerche parallele in modalità batch (default: 4)
//! - `output_path`: Directory di output (default: None = accanto all'input)
//! - `suffix`: Suffisso del file ottimizzato (default: "_optimized")
//!
//! ## File di configurazione:
//! Caricato da `~/.gif-optimizer/config.json` se presente; i flag CLI
//! sovrascrivono i valori del file.
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     target_mb: 2.0,
//!     workers: 8,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::OptimizeError;
use crate::optimizer::SearchSettings;
use anyhow::Result;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bytes in one megabyte as used for the target budget
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Resampling filters available for frame downscaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    /// Lanczos3 - best quality for downscaling
    #[default]
    Lanczos,
    /// Catmull-Rom - sharp, slightly faster
    CatmullRom,
    /// Gaussian - soft result
    Gaussian,
    /// Triangle - fast, acceptable for previews
    Triangle,
    /// Nearest - pixel art
    Nearest,
}

impl ResizeFilter {
    pub fn to_filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Lanczos => FilterType::Lanczos3,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::Nearest => FilterType::Nearest,
        }
    }
}

/// Configuration for target-size optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target size in megabytes
    pub target_mb: f64,
    /// Maximum number of encode attempts per file
    pub max_attempts: u32,
    /// Smallest palette the search may shrink to
    pub min_colors: u16,
    /// Smallest scale factor before the search gives up
    pub min_resize: f64,
    /// Fraction of the target accepted as close enough
    pub accept_ratio: f64,
    /// Resampling filter used when scaling frames
    pub resize_filter: ResizeFilter,
    /// NeuQuant sample factor (1 = best quality, 30 = fastest)
    pub quantizer_speed: i32,
    /// Number of concurrent searches in batch mode
    pub workers: usize,
    /// Output directory for optimized files (None = next to the input)
    pub output_path: Option<PathBuf>,
    /// Suffix appended to the file stem of optimized files
    pub suffix: String,
    /// Dry run - search but don't write results
    pub dry_run: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        let search = SearchSettings::default();
        Self {
            target_mb: 1.5,
            max_attempts: search.max_attempts,
            min_colors: search.min_colors,
            min_resize: search.min_resize,
            accept_ratio: search.accept_ratio,
            resize_filter: ResizeFilter::default(),
            quantizer_speed: 10,
            workers: 4,
            output_path: None,
            suffix: "_optimized".to_string(),
            dry_run: false,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), OptimizeError> {
        parse_target_bytes(self.target_mb)?;

        if self.max_attempts == 0 {
            return Err(OptimizeError::Validation("max_attempts must be greater than 0".into()));
        }

        if self.min_colors < 2 || self.min_colors > 256 {
            return Err(OptimizeError::Validation("min_colors must be between 2 and 256".into()));
        }

        if self.min_resize <= 0.0 || self.min_resize > 1.0 {
            return Err(OptimizeError::Validation("min_resize must be between 0.0 and 1.0".into()));
        }

        if self.accept_ratio <= 0.0 || self.accept_ratio > 1.0 {
            return Err(OptimizeError::Validation("accept_ratio must be between 0.0 and 1.0".into()));
        }

        if !(1..=30).contains(&self.quantizer_speed) {
            return Err(OptimizeError::Validation("quantizer_speed must be between 1 and 30".into()));
        }

        if self.workers == 0 {
            return Err(OptimizeError::Validation("Number of workers must be greater than 0".into()));
        }

        if self.suffix.is_empty() {
            return Err(OptimizeError::Validation("suffix must not be empty".into()));
        }

        if let Some(ref output_path) = self.output_path {
            if output_path.exists() && !output_path.is_dir() {
                return Err(OptimizeError::Validation(format!(
                    "Output path is not a directory: {}",
                    output_path.display()
                )));
            }
        }

        Ok(())
    }

    /// Target budget in bytes
    pub fn target_bytes(&self) -> Result<u64, OptimizeError> {
        parse_target_bytes(self.target_mb)
    }

    /// Search knobs handed to the optimizer
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            max_attempts: self.max_attempts,
            min_colors: self.min_colors,
            min_resize: self.min_resize,
            accept_ratio: self.accept_ratio,
            ..SearchSettings::default()
        }
    }

    /// Default configuration file location (`~/.gif-optimizer/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".gif-optimizer").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Parse a target given as text in megabytes (e.g. "1.5")
pub fn parse_target_mb(input: &str) -> Result<u64, OptimizeError> {
    let trimmed = input.trim();
    let mb: f64 = trimmed
        .parse()
        .map_err(|_| OptimizeError::InvalidTarget(format!("'{}' is not a number", trimmed)))?;
    parse_target_bytes(mb)
}

/// Convert fractional megabytes into a positive byte budget
pub fn parse_target_bytes(mb: f64) -> Result<u64, OptimizeError> {
    if !mb.is_finite() || mb <= 0.0 {
        return Err(OptimizeError::InvalidTarget(format!("{} MB must be a positive number", mb)));
    }

    let bytes = (mb * BYTES_PER_MB).floor() as u64;
    if bytes == 0 {
        return Err(OptimizeError::InvalidTarget(format!("{} MB is smaller than one byte", mb)));
    }
    Ok(bytes)
}
