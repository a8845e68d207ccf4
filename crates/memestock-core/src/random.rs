//! Sources of uniform random draws for the trend engine.
//!
//! The engine never touches an RNG directly. It asks a [`RandomSource`]
//! for `uniform(min, max)` draws, which lets production runs use a real
//! generator ([`RngSource`]) while tests replay exact values
//! ([`ScriptedSource`]) to hit transition thresholds deterministically.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniformly distributed `f64` draws.
pub trait RandomSource {
    /// Draw a value from the half-open range `[min, max)`.
    ///
    /// A degenerate range (`min >= max`) yields `min`.
    fn uniform(&mut self, min: f64, max: f64) -> f64;
}

/// [`RandomSource`] backed by any [`rand::Rng`].
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    /// Wrap an existing generator.
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    /// Seeded generator for reproducible runs.
    pub fn from_seed(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Generator seeded from operating system entropy.
    pub fn from_os() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn uniform(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        self.rng.random_range(min..max)
    }
}

/// Replays a fixed sequence of draws.
///
/// Each draw is clamped into the requested range. Once the script is
/// exhausted the source returns the midpoint of the requested range.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    values: VecDeque<f64>,
}

impl ScriptedSource {
    /// Create a source that yields `values` in order.
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Number of scripted draws not yet consumed.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl RandomSource for ScriptedSource {
    fn uniform(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        self.values
            .pop_front()
            .map_or_else(|| (min + max) / 2.0, |v| v.clamp(min, max))
    }
}
