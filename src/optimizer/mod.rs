//! # Optimizer Module
//!
//! Il cuore della ricerca, separato in sottomoduli:
//! - `size_optimizer`: Loop di ricerca con early accept e rollback
//! - `search_state`: Variabili di controllo e regole di aggiustamento
//! - `progress_tracker`: Eventi di progresso e sink verso il chiamante

pub mod size_optimizer;
pub mod search_state;
pub mod progress_tracker;

pub use size_optimizer::{SearchOutcome, TargetSizeOptimizer, Termination};
pub use search_state::{Attempt, BestUnderTarget, CutTier, SearchSettings, SearchState};
pub use progress_tracker::{size_progress_percent, NoProgress, ProgressEvent, ProgressSink, TaggedProgressSink};
