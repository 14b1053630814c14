//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti gli errori possibili
//! - Distingue gli errori fatali (encoder, input) dall'esito normale `TargetUnreachable`
//! - Integra con `thiserror` per automatic error conversion
//! - Supporta error chaining per mantenere la causa originale dell'encoder
//!
//! ## Categorie di errori:
//! - `InvalidTarget`: Budget non numerico o non positivo
//! - `EmptyInput`: Sequenza di frame vuota
//! - `EncodeFailure`: L'encoder ha fallito durante un tentativo (abortisce la ricerca)
//! - `TargetUnreachable`: Nessun tentativo è mai rientrato nel budget
//! - `Cancelled`: Segnale di stop ricevuto tra due tentativi
//! - `Decode` / `Io` / `Validation`: Errori lato chiamante (file, configurazione)
//!
//! ## Esempio:
//! ```ignore
//! match optimizer.run(&frames, target_bytes, &sink) {
//!     Err(OptimizeError::TargetUnreachable { closest_size }) => { /* esito normale */ }
//!     Err(e) => return Err(e.into()),
//!     Ok(outcome) => { /* salva il blob */ }
//! }
//! ```

/// Boxed cause carried by encoder failures
pub type EncoderCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Custom error types for target-size optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("Invalid target size: {0}")]
    InvalidTarget(String),

    #[error("Input contains no frames")]
    EmptyInput,

    #[error("Encoder failed on attempt {attempt}: {source}")]
    EncodeFailure {
        attempt: u32,
        #[source]
        source: EncoderCause,
    },

    #[error("Target size unreachable (closest attempt: {})", describe_closest(.closest_size))]
    TargetUnreachable { closest_size: Option<u64> },

    #[error("Search cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    #[error("Image decoding error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

impl OptimizeError {
    /// Wraps an arbitrary encoder error for the given attempt
    pub fn encode_failure<E>(attempt: u32, cause: E) -> Self
    where
        E: Into<EncoderCause>,
    {
        Self::EncodeFailure {
            attempt,
            source: cause.into(),
        }
    }

    /// True for outcomes the caller is expected to handle as a normal result
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::TargetUnreachable { .. })
    }
}

fn describe_closest(closest: &Option<u64>) -> String {
    match closest {
        Some(size) => format!("{} bytes", size),
        None => "none".to_string(),
    }
}
