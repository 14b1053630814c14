//! # Progress Tracking Module
//!
//! Canale di progresso dall'optimizer (worker bloccante) verso il chiamante.
//! Un evento per tentativo, consegnato in ordine FIFO su un canale
//! `tokio::sync::mpsc` non limitato: il produttore non si blocca mai.

use tokio::sync::mpsc::UnboundedSender;

/// One progress update, emitted after every attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub attempt: u32,
    pub size: u64,
    pub colors: u16,
    pub scale: f64,
    pub message: String,
    /// Completion towards the target, in [0, 100]
    pub percent: f64,
}

impl ProgressEvent {
    pub fn attempt(attempt: &super::Attempt, percent: f64) -> Self {
        Self {
            attempt: attempt.attempt_index,
            size: attempt.encoded_size,
            colors: attempt.params.palette_size,
            scale: attempt.params.scale,
            message: format!(
                "Attempt {}: {:.2} MB",
                attempt.attempt_index,
                attempt.encoded_size as f64 / 1024.0 / 1024.0
            ),
            percent,
        }
    }
}

/// Fire-and-forget receiver of progress events
pub trait ProgressSink {
    fn report(&self, event: ProgressEvent);
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        // A dropped receiver just means nobody is watching anymore
        let _ = self.send(event);
    }
}

/// Forwards events onto a channel shared by several jobs, tagged with the job index
#[derive(Debug, Clone)]
pub struct TaggedProgressSink {
    job: usize,
    sender: UnboundedSender<(usize, ProgressEvent)>,
}

impl TaggedProgressSink {
    pub fn new(job: usize, sender: UnboundedSender<(usize, ProgressEvent)>) -> Self {
        Self { job, sender }
    }
}

impl ProgressSink for TaggedProgressSink {
    fn report(&self, event: ProgressEvent) {
        let _ = self.sender.send((self.job, event));
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// How far the current size has moved from the source size towards the target.
///
/// Always 100 when the source already fits; otherwise clamped to [0, 100].
pub fn size_progress_percent(start_size: u64, current_size: u64, target_size: u64) -> f64 {
    if start_size <= target_size {
        return 100.0;
    }

    let total_gap = (start_size - target_size) as f64;
    let done_gap = start_size as f64 - current_size as f64;

    ((done_gap / total_gap) * 100.0).clamp(0.0, 100.0)
}
