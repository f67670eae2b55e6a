//! Random - Uniform random source seam for the race engine
//!
//! The engine draws from a `RandomSource` in a fixed lane/phase order,
//! so any source replaying the same values replays the same race.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound (exclusive) of integer probability rolls
pub const ROLL_RANGE: u32 = 10_000;

/// Uniform draws consumed by ability effects
pub trait RandomSource {
    /// Draw from `[0, 1)`
    fn unit(&mut self) -> f64;

    /// Draw from `[0, 10000)` using exactly one `unit` draw
    fn roll(&mut self) -> u32 {
        ((self.unit() * ROLL_RANGE as f64) as u32).min(ROLL_RANGE - 1)
    }
}

/// Adapter over any `rand` generator
#[derive(Debug, Clone)]
pub struct RngSource<R: Rng> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    /// Reproducible source for replays
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Fresh source for live races
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed sequence of unit draws, wrapping around at the end
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    values: Vec<f64>,
    cursor: usize,
    draws: usize,
}

impl ScriptedSource {
    /// Values are clamped into `[0, 1)`; an empty script always yields 0
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0 - f64::EPSILON))
            .collect();
        Self {
            values,
            cursor: 0,
            draws: 0,
        }
    }

    /// Source that always yields the same value
    pub fn constant(value: f64) -> Self {
        Self::new([value])
    }

    /// Number of draws taken so far
    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl RandomSource for ScriptedSource {
    fn unit(&mut self) -> f64 {
        self.draws += 1;
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor];
        self.cursor = (self.cursor + 1) % self.values.len();
        value
    }
}
