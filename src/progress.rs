//! Simulated progress.
//!
//! The conversion request exposes no transfer events, so the bar is driven
//! by a ticker adding pseudo-random steps. [`ProgressState`] enforces the
//! display rules: pending values are clamped to the ceiling, 100 is reachable
//! only through [`ProgressState::complete`], and [`ProgressState::reset`]
//! returns to 0 once the bar is hidden.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Displayed (not real) progress, a percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    value: u8,
    ceiling: u8,
}

impl ProgressState {
    pub fn new(ceiling: u8) -> Self {
        Self {
            value: 0,
            ceiling: ceiling.min(99),
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn ceiling(&self) -> u8 {
        self.ceiling
    }

    /// Add a simulated step, never passing the ceiling. Returns the new value.
    pub fn advance(&mut self, step: u8) -> u8 {
        self.value = self.value.saturating_add(step).min(self.ceiling);
        self.value
    }

    /// Jump to 100 on a successful reply.
    pub fn complete(&mut self) {
        self.value = 100;
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }
}

/// Source of pseudo-random tick increments.
#[derive(Debug)]
pub struct StepSource {
    rng: StdRng,
    min: u8,
    max: u8,
}

impl StepSource {
    /// Steps are drawn uniformly from `min..=max`. Pass a seed for
    /// reproducible sequences.
    pub fn new(min: u8, max: u8, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let min = min.max(1);
        Self {
            rng,
            min,
            max: max.max(min),
        }
    }

    pub fn next_step(&mut self) -> u8 {
        self.rng.gen_range(self.min..=self.max)
    }
}
