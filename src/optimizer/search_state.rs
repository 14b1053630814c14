//! # Search State Module
//!
//! Variabili di controllo della ricerca (palette, scala, tentativo) e le regole
//! con cui vengono alzate o tagliate tra un tentativo e l'altro.
//!
//! ## Regole:
//! - **Relax** (sotto target ma lontani): palette ×1.15, scala ×1.05, entrambe con tetto
//! - **Tighten** (sopra target): taglio proporzionale all'overshoot
//!   - ratio > 3: palette /2, scala ×0.75
//!   - 1.5 < ratio <= 3: palette ×0.7, scala ×0.9
//!   - ratio <= 1.5: palette -8, scala ×0.95
//! - **Exhausted**: palette al minimo e scala <= `min_resize`

use crate::encoder::{EncodedBlob, EncodeParams, MAX_PALETTE};

const COLOR_GROWTH: f64 = 1.15;
const SCALE_GROWTH: f64 = 1.05;
const FINE_COLOR_STEP: u16 = 8;

/// Tunable limits of the search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSettings {
    /// Hard ceiling on encode attempts
    pub max_attempts: u32,
    /// Palette floor
    pub min_colors: u16,
    /// Palette ceiling and starting palette
    pub max_colors: u16,
    /// Scale at which the search gives up once the palette is at its floor
    pub min_resize: f64,
    /// Fraction of the target considered close enough to stop
    pub accept_ratio: f64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 25,
            min_colors: 8,
            max_colors: MAX_PALETTE,
            min_resize: 0.25,
            accept_ratio: 0.85,
        }
    }
}

/// Mutable control variables of one running search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    pub colors: u16,
    pub resize_factor: f64,
    pub attempt: u32,
    min_colors: u16,
    max_colors: u16,
    min_resize: f64,
}

impl SearchState {
    pub fn new(settings: &SearchSettings) -> Self {
        let max_colors = settings.max_colors.min(MAX_PALETTE);
        Self {
            colors: max_colors,
            resize_factor: 1.0,
            attempt: 0,
            min_colors: settings.min_colors.min(max_colors),
            max_colors,
            min_resize: settings.min_resize,
        }
    }

    /// Advance the attempt counter and return the new index
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn params(&self) -> EncodeParams {
        EncodeParams::new(self.colors, self.resize_factor)
    }

    /// Push quality up after a fit with plenty of headroom
    pub fn relax(&mut self) {
        let grown = (self.colors as f64 * COLOR_GROWTH) as u16;
        self.colors = grown.min(self.max_colors);
        self.resize_factor = (self.resize_factor * SCALE_GROWTH).min(1.0);
    }

    /// Cut quality after an overshoot, harder the further off the target
    pub fn tighten(&mut self, ratio: f64) {
        let (colors, scale) = match CutTier::for_ratio(ratio) {
            CutTier::Aggressive => (self.colors / 2, 0.75),
            CutTier::Moderate => ((self.colors as f64 * 0.7) as u16, 0.9),
            CutTier::Fine => (self.colors.saturating_sub(FINE_COLOR_STEP), 0.95),
        };
        self.colors = colors.max(self.min_colors);
        self.resize_factor *= scale;
    }

    /// Nothing left to shrink
    pub fn is_exhausted(&self) -> bool {
        self.colors <= self.min_colors && self.resize_factor <= self.min_resize
    }
}

/// Severity of a parameter cut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutTier {
    Aggressive,
    Moderate,
    Fine,
}

impl CutTier {
    pub fn for_ratio(ratio: f64) -> Self {
        if ratio > 3.0 {
            Self::Aggressive
        } else if ratio > 1.5 {
            Self::Moderate
        } else {
            Self::Fine
        }
    }
}

/// One search step, as observed after encoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attempt {
    pub params: EncodeParams,
    pub encoded_size: u64,
    pub attempt_index: u32,
}

/// Largest candidate seen so far that fits the budget
#[derive(Debug, Clone)]
pub struct BestUnderTarget {
    pub blob: EncodedBlob,
    pub size: u64,
    pub params: EncodeParams,
    pub attempt_index: u32,
}
