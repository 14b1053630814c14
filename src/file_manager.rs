//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file attorno alla ricerca.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva di GIF in una directory (modalità batch)
//! - Calcolo del path di output (`<stem>_optimized.gif`)
//! - Scrittura atomica del risultato tramite file temporaneo
//! - Formattazione human-readable delle dimensioni
//!
//! ## Sicurezza operazioni:
//! - Il risultato viene scritto in un `NamedTempFile` nella directory di destinazione
//!   e poi rinominato: un errore a metà non lascia file troncati
//! - I file che hanno già il suffisso di output vengono ignorati nella discovery

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Size of a file in bytes
    pub async fn file_size(path: &Path) -> Result<u64> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to read metadata of {}", path.display()))?;
        Ok(metadata.len())
    }

    /// Find all GIFs under `dir`, skipping outputs of previous runs
    pub fn find_gif_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file() && Self::is_gif(path) && !Self::is_output(path, suffix) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Check if a path has a GIF extension (case-insensitive)
    pub fn is_gif(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("gif"))
            .unwrap_or(false)
    }

    fn is_output(path: &Path, suffix: &str) -> bool {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .map(|stem| stem.ends_with(suffix))
            .unwrap_or(false)
    }

    /// Where the optimized version of `input` goes
    pub fn output_path_for(input: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let file_name = format!("{}{}.gif", stem, suffix);

        match output_dir {
            Some(dir) => dir.join(file_name),
            None => input.with_file_name(file_name),
        }
    }

    /// Write `bytes` to `destination` through a temp file in the same directory
    pub fn write_atomic(destination: &Path, bytes: &[u8]) -> Result<()> {
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(bytes)?;
        temp.flush()?;
        temp.persist(destination)
            .with_context(|| format!("Failed to write {}", destination.display()))?;
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
