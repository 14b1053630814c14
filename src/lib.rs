//! # GIF Size Optimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione, validazione e parsing del target
//! - `error`: Tipi di errore custom
//! - `frames`: Sequenza di frame sorgente (decodifica GIF)
//! - `encoder`: Encoder GIF con palette e scala controllate
//! - `optimizer`: La ricerca target-size (il cuore)
//! - `batch`: Chiamante: worker per file e orchestratore batch
//! - `file_manager`: Discovery, path di output, scrittura atomica
//! - `progress`: Progress bar e statistiche
//! - `json_output`: Output JSON per uso programmatico
//!
//! ## Utilizzo:
//! ```ignore
//! use gif_size_optimizer::{EncodeParams, FrameSequence, GifFrameEncoder, NoProgress, SearchSettings, TargetSizeOptimizer};
//!
//! let frames = FrameSequence::from_gif_bytes(&bytes)?;
//! let mut optimizer = TargetSizeOptimizer::new(GifFrameEncoder::default(), SearchSettings::default());
//! let outcome = optimizer.run(&frames, 1_572_864, &NoProgress)?;
//! std::fs::write("out.gif", outcome.blob.as_bytes())?;
//! ```

pub mod batch;
pub mod config;
pub mod encoder;
pub mod error;
pub mod file_manager;
pub mod frames;
pub mod json_output;
pub mod optimizer;
pub mod progress;

pub use batch::BatchOptimizer;
pub use config::{parse_target_mb, Config};
pub use encoder::{EncodeParams, EncodedBlob, FrameEncoder, GifFrameEncoder};
pub use error::OptimizeError;
pub use frames::{Frame, FrameSequence, Repeat};
pub use optimizer::{NoProgress, ProgressEvent, ProgressSink, SearchOutcome, SearchSettings, TargetSizeOptimizer, Termination};
