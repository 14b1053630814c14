//! # Target-Size Optimizer
//!
//! Ricerca hill-climbing limitata su (palette, scala) per portare un GIF sotto
//! un budget in byte con la massima qualità possibile.
//!
//! ## Flusso per tentativo:
//! 1. Controllo stop (solo ai confini tra tentativi, mai durante l'encode);
//!    se un candidato sotto target esiste già viene restituito
//! 2. Encode completo con i parametri correnti (saltato se identici al
//!    tentativo precedente: 256 colori e scala 1.0 non crescono più)
//! 3. Report del progresso
//! 4. Decisione:
//!    - **sotto target, molto margine** → salva come migliore e alza la qualità
//!    - **sotto target, >= 85%** → accetta subito
//!    - **sopra target con un migliore già trovato** → rollback al migliore
//!    - **sopra target senza migliore** → taglio proporzionale all'overshoot
//!
//! Lo stato della ricerca appartiene esclusivamente alla singola chiamata `run`:
//! più ricerche concorrenti non condividono nulla di mutabile.

use super::progress_tracker::{size_progress_percent, ProgressEvent, ProgressSink};
use super::search_state::{Attempt, BestUnderTarget, SearchSettings, SearchState};
use crate::encoder::{EncodedBlob, EncodeParams, FrameEncoder};
use crate::error::OptimizeError;
use crate::frames::FrameSequence;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// How a successful search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Candidate landed close enough under the target
    Accepted,
    /// Overshot after a fit; the best earlier fit was returned
    RolledBack,
    /// Attempts or parameters ran out; the best fit was returned
    BestEffort,
    /// Stopped between attempts; the best fit so far was returned
    Cancelled,
}

/// Result of a successful search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub blob: EncodedBlob,
    pub size: u64,
    pub params: EncodeParams,
    /// Index of the attempt that produced `blob`
    pub winning_attempt: u32,
    /// Attempts performed in total
    pub attempts: u32,
    pub termination: Termination,
}

impl SearchOutcome {
    fn from_best(best: BestUnderTarget, attempts: u32, termination: Termination) -> Self {
        Self {
            blob: best.blob,
            size: best.size,
            params: best.params,
            winning_attempt: best.attempt_index,
            attempts,
            termination,
        }
    }
}

/// Drives the encoder towards a byte budget
pub struct TargetSizeOptimizer<E> {
    encoder: E,
    settings: SearchSettings,
    stop_receiver: Option<broadcast::Receiver<()>>,
}

impl<E: FrameEncoder> TargetSizeOptimizer<E> {
    pub fn new(encoder: E, settings: SearchSettings) -> Self {
        Self {
            encoder,
            settings,
            stop_receiver: None,
        }
    }

    /// Creates an optimizer that stops between attempts once a signal arrives
    pub fn new_with_cancellation(
        encoder: E,
        settings: SearchSettings,
        stop_receiver: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            encoder,
            settings,
            stop_receiver: Some(stop_receiver),
        }
    }

    fn should_stop(&mut self) -> bool {
        if let Some(ref mut receiver) = self.stop_receiver {
            match receiver.try_recv() {
                Ok(_) => {
                    debug!("Stop signal received, cancelling search");
                    return true;
                }
                Err(broadcast::error::TryRecvError::Empty) => return false,
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    debug!("Stop signal was lagged, cancelling search");
                    return true;
                }
                Err(broadcast::error::TryRecvError::Closed) => return false,
            }
        }
        false
    }

    /// Search for the best encoding of `frames` that fits in `target_bytes`.
    ///
    /// # Errors
    /// - `InvalidTarget` / `EmptyInput` before any attempt
    /// - `EncodeFailure` as soon as the encoder fails
    /// - `Cancelled` when a stop signal is seen between attempts before anything fit
    /// - `TargetUnreachable` when no attempt ever fit
    pub fn run(
        &mut self,
        frames: &FrameSequence,
        target_bytes: u64,
        progress: &dyn ProgressSink,
    ) -> Result<SearchOutcome, OptimizeError> {
        if target_bytes == 0 {
            return Err(OptimizeError::InvalidTarget("target must be greater than 0 bytes".into()));
        }
        if frames.is_empty() {
            return Err(OptimizeError::EmptyInput);
        }

        let start_size = frames.source_size();
        let accept_floor = target_bytes as f64 * self.settings.accept_ratio;
        let mut state = SearchState::new(&self.settings);
        let mut best: Option<BestUnderTarget> = None;
        let mut closest_over: Option<u64> = None;
        // Blob of the previous attempt, kept only while relaxing left the parameters unchanged
        let mut unchanged: Option<(EncodeParams, EncodedBlob)> = None;

        while state.attempt < self.settings.max_attempts {
            if self.should_stop() {
                warn!("Search cancelled after {} attempts", state.attempt);
                return match best {
                    Some(best) => Ok(SearchOutcome::from_best(best, state.attempt, Termination::Cancelled)),
                    None => Err(OptimizeError::Cancelled { attempts: state.attempt }),
                };
            }

            let attempt_index = state.begin_attempt();
            let params = state.params();
            let blob = match unchanged.take() {
                Some((previous, blob)) if previous == params => {
                    debug!("Attempt {} reuses the previous encode (parameters at their cap)", attempt_index);
                    blob
                }
                _ => self
                    .encoder
                    .encode(frames, &params)
                    .map_err(|e| OptimizeError::encode_failure(attempt_index, e))?,
            };

            let attempt = Attempt {
                params,
                encoded_size: blob.len(),
                attempt_index,
            };
            let size_now = attempt.encoded_size;
            progress.report(ProgressEvent::attempt(
                &attempt,
                size_progress_percent(start_size, size_now, target_bytes),
            ));

            if size_now <= target_bytes {
                if (size_now as f64) >= accept_floor {
                    info!(
                        "Accepted attempt {}: {} bytes (colors {}, scale {:.3})",
                        attempt_index, size_now, params.palette_size, params.scale
                    );
                    return Ok(SearchOutcome {
                        blob,
                        size: size_now,
                        params,
                        winning_attempt: attempt_index,
                        attempts: attempt_index,
                        termination: Termination::Accepted,
                    });
                }

                state.relax();
                if state.params() == params {
                    unchanged = Some((params, blob.clone()));
                }

                if best.as_ref().map_or(true, |b| size_now > b.size) {
                    best = Some(BestUnderTarget {
                        blob,
                        size: size_now,
                        params,
                        attempt_index,
                    });
                }

                debug!(
                    "Attempt {} fits with headroom ({} <= {}), raising quality to colors {} scale {:.3}",
                    attempt_index, size_now, target_bytes, state.colors, state.resize_factor
                );
                continue;
            }

            closest_over = Some(closest_over.map_or(size_now, |c| c.min(size_now)));

            if let Some(best) = best {
                info!(
                    "Attempt {} overshot ({} bytes), rolling back to attempt {} ({} bytes)",
                    attempt_index, size_now, best.attempt_index, best.size
                );
                return Ok(SearchOutcome::from_best(best, attempt_index, Termination::RolledBack));
            }

            let ratio = size_now as f64 / target_bytes as f64;
            state.tighten(ratio);
            debug!(
                "Attempt {} too large (ratio {:.2}), cutting to colors {} scale {:.3}",
                attempt_index, ratio, state.colors, state.resize_factor
            );

            if state.is_exhausted() {
                debug!("Parameters exhausted after {} attempts", attempt_index);
                break;
            }
        }

        match best {
            Some(best) => {
                info!("Using best result under target ({} bytes)", best.size);
                Ok(SearchOutcome::from_best(best, state.attempt, Termination::BestEffort))
            }
            None => {
                warn!("No attempt fit within {} bytes", target_bytes);
                Err(OptimizeError::TargetUnreachable { closest_size: closest_over })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncodeError, GifFrameEncoder};
    use crate::frames::test_support::gradient_sequence;
    use crate::frames::{Frame, Repeat};
    use crate::optimizer::NoProgress;
    use std::sync::Mutex;

    /// Returns preset sizes in order, repeating the last one; blob bytes carry the attempt index
    struct ScriptedEncoder {
        sizes: Vec<u64>,
        calls: Mutex<Vec<EncodeParams>>,
    }

    impl ScriptedEncoder {
        fn new(sizes: &[u64]) -> Self {
            Self {
                sizes: sizes.to_vec(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<EncodeParams> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl FrameEncoder for ScriptedEncoder {
        fn encode(&self, _frames: &FrameSequence, params: &EncodeParams) -> Result<EncodedBlob, EncodeError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(*params);
            let index = calls.len();
            let size = self.sizes[(index - 1).min(self.sizes.len() - 1)];
            Ok(EncodedBlob::new(vec![index as u8; size as usize]))
        }
    }

    /// Size grows with palette and area, like a real encoder
    struct MonotoneEncoder {
        full_size: f64,
        calls: Mutex<Vec<EncodeParams>>,
    }

    impl FrameEncoder for MonotoneEncoder {
        fn encode(&self, _frames: &FrameSequence, params: &EncodeParams) -> Result<EncodedBlob, EncodeError> {
            self.calls.lock().unwrap().push(*params);
            let palette = (params.palette_size as f64 / 256.0).sqrt();
            let size = self.full_size * palette * params.scale * params.scale;
            Ok(EncodedBlob::new(vec![0; size.max(1.0) as usize]))
        }
    }

    struct FailingEncoder {
        fail_on: usize,
        calls: Mutex<usize>,
    }

    impl FrameEncoder for FailingEncoder {
        fn encode(&self, _frames: &FrameSequence, _params: &EncodeParams) -> Result<EncodedBlob, EncodeError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == self.fail_on {
                return Err(EncodeError::Other("disk full".into()));
            }
            Ok(EncodedBlob::new(vec![0; 2_000_000]))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for RecordingSink {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn frames() -> FrameSequence {
        gradient_sequence(2, 4, 4)
    }

    fn run_scripted(sizes: &[u64], target: u64) -> (Result<SearchOutcome, OptimizeError>, Vec<EncodeParams>) {
        let encoder = ScriptedEncoder::new(sizes);
        let result = TargetSizeOptimizer::new(&encoder, SearchSettings::default()).run(&frames(), target, &NoProgress);
        (result, encoder.calls())
    }

    #[test]
    fn test_large_headroom_keeps_searching() {
        let (result, calls) = run_scripted(&[1_000_000], 1_572_864);
        let outcome = result.unwrap();

        assert_eq!(outcome.attempts, 25);
        assert_eq!(outcome.winning_attempt, 1);
        assert_eq!(outcome.size, 1_000_000);
        assert_eq!(outcome.termination, Termination::BestEffort);
        // Relaxing at 256 colors and full scale changes nothing, so no re-encode happens
        assert_eq!(calls, vec![EncodeParams::new(256, 1.0)]);
    }

    #[test]
    fn test_headroom_raises_quality_below_cap() {
        let (result, calls) = run_scripted(&[5_000_000, 500_000, 900_000], 1_000_000);
        let outcome = result.unwrap();

        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].palette_size, 147);
        assert!((calls[2].scale - 0.7875).abs() < 1e-9);
        assert_eq!(outcome.winning_attempt, 3);
        assert_eq!(outcome.termination, Termination::Accepted);
    }

    #[test]
    fn test_no_encode_repeats_identical_parameters() {
        for target in [400_000u64, 4_000_000] {
            let encoder = MonotoneEncoder {
                full_size: 1_000_000.0,
                calls: Mutex::new(Vec::new()),
            };
            let sink = RecordingSink::default();
            let outcome = TargetSizeOptimizer::new(&encoder, SearchSettings::default())
                .run(&frames(), target, &sink)
                .unwrap();

            let calls = encoder.calls.lock().unwrap();
            for pair in calls.windows(2) {
                assert_ne!(pair[0], pair[1], "target {}", target);
            }
            assert_eq!(sink.events.lock().unwrap().len() as u32, outcome.attempts);
        }
    }

    #[test]
    fn test_close_enough_accepts_first_attempt() {
        let (result, calls) = run_scripted(&[1_450_000], 1_572_864);
        let outcome = result.unwrap();

        assert_eq!(calls.len(), 1);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.blob.as_bytes()[0], 1);
        assert_eq!(outcome.termination, Termination::Accepted);
    }

    #[test]
    fn test_accept_bounds_are_inclusive() {
        let (result, calls) = run_scripted(&[850_000], 1_000_000);
        assert_eq!(calls.len(), 1);
        assert_eq!(result.unwrap().size, 850_000);

        let (result, calls) = run_scripted(&[1_000_000], 1_000_000);
        assert_eq!(calls.len(), 1);
        assert_eq!(result.unwrap().size, 1_000_000);
    }

    #[test]
    fn test_far_overshoot_cuts_aggressively() {
        let (result, calls) = run_scripted(&[5_000_000, 900_000], 1_000_000);

        assert_eq!(calls[0], EncodeParams::new(256, 1.0));
        assert_eq!(calls[1], EncodeParams::new(128, 0.75));
        assert_eq!(result.unwrap().winning_attempt, 2);
    }

    #[test]
    fn test_rollback_returns_best_prior_fit() {
        let (result, calls) = run_scripted(&[5_000_000, 300_000, 500_000, 400_000, 1_200_000, 900_000], 1_000_000);
        let outcome = result.unwrap();

        assert_eq!(calls.len(), 5, "no attempt after the overshoot that follows a fit");
        assert_eq!(outcome.termination, Termination::RolledBack);
        assert_eq!(outcome.winning_attempt, 3);
        assert_eq!(outcome.size, 500_000);
        assert_eq!(outcome.blob.as_bytes()[0], 3);
        assert_eq!(outcome.attempts, 5);
    }

    #[test]
    fn test_never_fitting_exhausts_attempts() {
        let (result, calls) = run_scripted(&[1_000_001], 1_000_000);

        assert_eq!(calls.len(), 25);
        match result {
            Err(OptimizeError::TargetUnreachable { closest_size }) => assert_eq!(closest_size, Some(1_000_001)),
            other => panic!("expected TargetUnreachable, got {:?}", other.map(|o| o.size)),
        }
    }

    #[test]
    fn test_exhausted_parameters_stop_early() {
        let (result, calls) = run_scripted(&[5_000_000, 4_000_000, 3_500_000, 3_200_000, 3_100_000], 1_000_000);

        assert_eq!(calls.len(), 5);
        assert!(matches!(
            result,
            Err(OptimizeError::TargetUnreachable { closest_size: Some(3_100_000) })
        ));
    }

    #[test]
    fn test_best_effort_when_attempts_run_out() {
        let settings = SearchSettings {
            max_attempts: 4,
            ..SearchSettings::default()
        };
        let encoder = ScriptedEncoder::new(&[5_000_000, 100_000, 200_000, 300_000]);
        let outcome = TargetSizeOptimizer::new(&encoder, settings)
            .run(&frames(), 1_000_000, &NoProgress)
            .unwrap();

        assert_eq!(outcome.termination, Termination::BestEffort);
        assert_eq!(outcome.size, 300_000);
        assert_eq!(outcome.winning_attempt, 4);
        assert_eq!(outcome.attempts, 4);
    }

    #[test]
    fn test_encoder_failure_aborts() {
        let encoder = FailingEncoder {
            fail_on: 2,
            calls: Mutex::new(0),
        };
        let result = TargetSizeOptimizer::new(&encoder, SearchSettings::default()).run(&frames(), 1_000_000, &NoProgress);

        match result {
            Err(OptimizeError::EncodeFailure { attempt, source }) => {
                assert_eq!(attempt, 2);
                assert_eq!(source.to_string(), "disk full");
            }
            _ => panic!("expected EncodeFailure"),
        }
        assert_eq!(*encoder.calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_preconditions_checked_before_encoding() {
        let encoder = ScriptedEncoder::new(&[1]);
        let mut optimizer = TargetSizeOptimizer::new(&encoder, SearchSettings::default());

        let empty = FrameSequence::new(Vec::<Frame>::new(), Repeat::Infinite, 0);
        assert!(matches!(optimizer.run(&empty, 1_000, &NoProgress), Err(OptimizeError::EmptyInput)));
        assert!(matches!(
            optimizer.run(&frames(), 0, &NoProgress),
            Err(OptimizeError::InvalidTarget(_))
        ));
        assert!(encoder.calls().is_empty());
    }

    #[test]
    fn test_progress_reported_per_attempt() {
        let encoder = ScriptedEncoder::new(&[3_000_000, 1_500_000, 950_000]);
        let sink = RecordingSink::default();
        let source = FrameSequence::new(frames().frames().to_vec(), Repeat::Infinite, 4_000_000);

        TargetSizeOptimizer::new(&encoder, SearchSettings::default())
            .run(&source, 1_000_000, &sink)
            .unwrap();

        let events = sink.events.lock().unwrap();
        let attempts: Vec<u32> = events.iter().map(|e| e.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
        assert!((events[0].percent - 100.0 / 3.0).abs() < 1e-9);
        assert!((events[1].percent - 250.0 / 3.0).abs() < 1e-9);
        assert_eq!(events[2].percent, 100.0);
        assert_eq!(events[2].message, "Attempt 3: 0.91 MB");
    }

    #[test]
    fn test_source_already_small_reports_full_progress() {
        let encoder = ScriptedEncoder::new(&[400_000, 900_000]);
        let sink = RecordingSink::default();
        let source = FrameSequence::new(frames().frames().to_vec(), Repeat::Infinite, 500_000);

        TargetSizeOptimizer::new(&encoder, SearchSettings::default())
            .run(&source, 1_000_000, &sink)
            .unwrap();

        assert!(sink.events.lock().unwrap().iter().all(|e| e.percent == 100.0));
    }

    #[test]
    fn test_cancellation_checked_before_attempt() {
        let (stop_tx, stop_rx) = broadcast::channel(1);
        stop_tx.send(()).unwrap();

        let encoder = ScriptedEncoder::new(&[5_000_000]);
        let result = TargetSizeOptimizer::new_with_cancellation(&encoder, SearchSettings::default(), stop_rx)
            .run(&frames(), 1_000_000, &NoProgress);

        assert!(matches!(result, Err(OptimizeError::Cancelled { attempts: 0 })));
        assert!(encoder.calls().is_empty());
    }

    /// Raises the stop signal while its first encode is running
    struct StoppingEncoder {
        stop: broadcast::Sender<()>,
        calls: Mutex<usize>,
    }

    impl FrameEncoder for StoppingEncoder {
        fn encode(&self, _frames: &FrameSequence, _params: &EncodeParams) -> Result<EncodedBlob, EncodeError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                let _ = self.stop.send(());
            }
            Ok(EncodedBlob::new(vec![7; 300_000]))
        }
    }

    #[test]
    fn test_cancellation_keeps_best_fit() {
        let (stop_tx, stop_rx) = broadcast::channel(1);
        let encoder = StoppingEncoder {
            stop: stop_tx,
            calls: Mutex::new(0),
        };

        let outcome = TargetSizeOptimizer::new_with_cancellation(&encoder, SearchSettings::default(), stop_rx)
            .run(&frames(), 1_000_000, &NoProgress)
            .unwrap();

        assert_eq!(outcome.termination, Termination::Cancelled);
        assert_eq!(outcome.size, 300_000);
        assert_eq!(outcome.winning_attempt, 1);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(*encoder.calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_parameters_stay_in_bounds() {
        for target in [1_000u64, 50_000, 200_000, 600_000, 950_000, 2_000_000] {
            let encoder = MonotoneEncoder {
                full_size: 1_000_000.0,
                calls: Mutex::new(Vec::new()),
            };
            let _ = TargetSizeOptimizer::new(&encoder, SearchSettings::default()).run(&frames(), target, &NoProgress);

            let calls = encoder.calls.lock().unwrap();
            assert!(!calls.is_empty() && calls.len() <= 25);
            for params in calls.iter() {
                assert!((8..=256).contains(&params.palette_size), "colors {}", params.palette_size);
                assert!(params.scale > 0.0 && params.scale <= 1.0, "scale {}", params.scale);
            }
        }
    }

    #[test]
    fn test_result_never_exceeds_target() {
        for target in [30_000u64, 120_000, 400_000, 700_000] {
            let encoder = MonotoneEncoder {
                full_size: 1_000_000.0,
                calls: Mutex::new(Vec::new()),
            };
            if let Ok(outcome) = TargetSizeOptimizer::new(&encoder, SearchSettings::default()).run(&frames(), target, &NoProgress) {
                assert!(outcome.size <= target);
                assert_eq!(outcome.blob.len(), outcome.size);
            }
        }
    }

    #[test]
    fn test_real_encoder_meets_target() {
        let source = gradient_sequence(4, 64, 64);
        let encoder = GifFrameEncoder::default();
        let full = encoder.encode(&source, &EncodeParams::new(256, 1.0)).unwrap();
        let target = full.len() / 2;

        let outcome = TargetSizeOptimizer::new(&encoder, SearchSettings::default())
            .run(&source, target, &NoProgress)
            .unwrap();

        assert!(outcome.size <= target);
        let decoded = FrameSequence::from_gif_bytes(outcome.blob.as_bytes()).unwrap();
        assert_eq!(decoded.len(), 4);
    }
}
