//! # Batch Module
//!
//! Il chiamante della ricerca, separato in sottomoduli:
//! - `batch_optimizer`: Orchestratore (discovery, concorrenza, presentazione)
//! - `gif_task`: Worker per singoli file

pub mod batch_optimizer;
pub mod gif_task;

pub use batch_optimizer::{BatchOptimizer, Interrupt};
pub use gif_task::{FileReport, GifTask};
