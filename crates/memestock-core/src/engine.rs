//! Trend engine: the per-meme price state machine.
//!
//! Every tick each meme draws a percentage change whose distribution
//! depends on its regime:
//!
//! | Regime   | Draw range      | Bookkeeping                                   |
//! |----------|-----------------|-----------------------------------------------|
//! | `Random` | `[-2.0, 2.0)`   | strong moves (beyond ±1%) build a streak      |
//! | `Up`     | `[0.1, 2.0)`    | `trend_count` decrements, expiry at `<= 0`    |
//! | `Down`   | `[-2.0, -0.1)`  | `trend_count` decrements, expiry at `<= 0`    |
//!
//! A streak of three strong moves in one direction locks `Up` or `Down`
//! for `floor(uniform[3, 6))` ticks. Locking and expiry both reset the
//! streak and happen in the same tick as the move that triggers them.
//!
//! The price then moves multiplicatively,
//! `price * (1 + change_percent / 100)`, rounded to cents. The stored
//! `change` is the change percent rounded on its own, so the price is
//! computed from the raw draw rather than the displayed value.
//!
//! Memes never read each other's state; [`TrendEngine::tick`] is just
//! [`TrendEngine::advance`] applied in collection order.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::meme::{Meme, Trend, round_to_cents};
use crate::random::RandomSource;

/// Smallest price a meme can hold after rounding.
pub const MIN_PRICE: f64 = 0.01;

/// A half-open `[min, max)` range of percentage changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentRange {
    /// Inclusive lower bound.
    pub min: f64,
    /// Exclusive upper bound.
    pub max: f64,
}

impl PercentRange {
    /// Construct a range.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Tunables of the trend state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendParams {
    /// Change range while in `Random`.
    #[serde(default = "default_random_range")]
    pub random_range: PercentRange,

    /// Change range while locked `Up`.
    #[serde(default = "default_up_range")]
    pub up_range: PercentRange,

    /// Change range while locked `Down`.
    #[serde(default = "default_down_range")]
    pub down_range: PercentRange,

    /// A `Random` move strictly beyond `±strong_move_pct` counts toward
    /// the streak; anything milder resets it.
    #[serde(default = "default_strong_move_pct")]
    pub strong_move_pct: f64,

    /// Streak magnitude that locks a trend.
    #[serde(default = "default_lock_streak")]
    pub lock_streak: i32,

    /// Range for the locked-trend duration draw (floored).
    #[serde(default = "default_duration_range")]
    pub duration_range: PercentRange,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            random_range: default_random_range(),
            up_range: default_up_range(),
            down_range: default_down_range(),
            strong_move_pct: default_strong_move_pct(),
            lock_streak: default_lock_streak(),
            duration_range: default_duration_range(),
        }
    }
}

const fn default_random_range() -> PercentRange {
    PercentRange::new(-2.0, 2.0)
}

const fn default_up_range() -> PercentRange {
    PercentRange::new(0.1, 2.0)
}

const fn default_down_range() -> PercentRange {
    PercentRange::new(-2.0, -0.1)
}

const fn default_strong_move_pct() -> f64 {
    1.0
}

const fn default_lock_streak() -> i32 {
    3
}

const fn default_duration_range() -> PercentRange {
    PercentRange::new(3.0, 6.0)
}

/// Regime change caused by a single move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The regime did not change.
    None,
    /// A streak locked a new `Up` or `Down` trend.
    Locked(Trend),
    /// A locked trend ran out and reverted to `Random`.
    Expired,
}

/// Outcome of advancing one meme by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemeMove {
    /// The raw (unrounded) percentage change drawn.
    pub change_percent: f64,
    /// Price before the move.
    pub old_price: f64,
    /// Price after the move, rounded to cents.
    pub new_price: f64,
    /// Regime change, if any.
    pub transition: Transition,
}

/// Aggregate of one tick across all memes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    /// Tick number (1-based, counted by the store).
    pub tick: u64,
    /// Number of memes advanced.
    pub memes: usize,
    /// Memes in an `Up` trend after the tick.
    pub up: usize,
    /// Memes in a `Down` trend after the tick.
    pub down: usize,
    /// Trends locked during this tick.
    pub locked: usize,
    /// Trends that expired during this tick.
    pub expired: usize,
}

/// Advances memes through the trend state machine.
#[derive(Debug, Clone)]
pub struct TrendEngine<R> {
    params: TrendParams,
    random: R,
}

impl<R: RandomSource> TrendEngine<R> {
    /// Engine with the default parameters.
    pub fn new(random: R) -> Self {
        Self::with_params(TrendParams::default(), random)
    }

    /// Engine with explicit parameters.
    pub const fn with_params(params: TrendParams, random: R) -> Self {
        Self { params, random }
    }

    /// The parameters in use.
    pub const fn params(&self) -> &TrendParams {
        &self.params
    }

    /// Advance one meme by one tick.
    pub fn advance(&mut self, meme: &mut Meme) -> MemeMove {
        let old_price = meme.price;
        let mut transition = Transition::None;

        let change_percent = match meme.trend {
            Trend::Up | Trend::Down => {
                let range = if meme.trend == Trend::Up {
                    self.params.up_range
                } else {
                    self.params.down_range
                };
                let pct = self.draw(range);
                meme.trend_count = meme.trend_count.saturating_sub(1);
                if meme.trend_count <= 0 {
                    debug!(meme = %meme.key(), trend = ?meme.trend, "Trend expired");
                    meme.trend = Trend::Random;
                    meme.streak = 0;
                    transition = Transition::Expired;
                }
                pct
            }
            Trend::Random => {
                let pct = self.draw(self.params.random_range);
                meme.streak = self.next_streak(meme.streak, pct);

                let lock = self.params.lock_streak;
                let locked = if meme.streak >= lock {
                    Some(Trend::Up)
                } else if meme.streak <= lock.saturating_neg() {
                    Some(Trend::Down)
                } else {
                    None
                };

                if let Some(trend) = locked {
                    meme.trend = trend;
                    meme.trend_count = self.draw_duration();
                    meme.streak = 0;
                    transition = Transition::Locked(trend);
                    debug!(
                        meme = %meme.key(),
                        ?trend,
                        trend_count = meme.trend_count,
                        "Trend locked"
                    );
                }
                pct
            }
        };

        let new_price = round_to_cents(old_price * (1.0 + change_percent / 100.0)).max(MIN_PRICE);
        meme.price = new_price;
        meme.change = round_to_cents(change_percent);

        trace!(meme = %meme.key(), old_price, new_price, change_percent, "Meme moved");

        MemeMove {
            change_percent,
            old_price,
            new_price,
            transition,
        }
    }

    /// Advance every meme by one tick, in order.
    pub fn tick(&mut self, tick: u64, memes: &mut [Meme]) -> TickSummary {
        let mut summary = TickSummary {
            tick,
            memes: memes.len(),
            ..TickSummary::default()
        };

        for meme in memes.iter_mut() {
            match self.advance(meme).transition {
                Transition::Locked(_) => summary.locked = summary.locked.saturating_add(1),
                Transition::Expired => summary.expired = summary.expired.saturating_add(1),
                Transition::None => {}
            }
            match meme.trend {
                Trend::Up => summary.up = summary.up.saturating_add(1),
                Trend::Down => summary.down = summary.down.saturating_add(1),
                Trend::Random => {}
            }
        }

        summary
    }

    fn draw(&mut self, range: PercentRange) -> f64 {
        self.random.uniform(range.min, range.max)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw_duration(&mut self) -> i32 {
        self.draw(self.params.duration_range).floor() as i32
    }

    fn next_streak(&self, streak: i32, pct: f64) -> i32 {
        let threshold = self.params.strong_move_pct;
        if pct > threshold {
            if streak >= 0 { streak.saturating_add(1) } else { 1 }
        } else if pct < -threshold {
            if streak <= 0 { streak.saturating_sub(1) } else { -1 }
        } else {
            0
        }
    }
}
