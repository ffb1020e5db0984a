//! The batched, approximate simulation engine (spec §4.4): advances exactly
//! `B = floor(alpha * sqrt(n))` interactions per block (spec §4.4.1/§4.4.4),
//! split between delimiter-sampled pairs and collision replays.
//!
//! Delimiter sampling draws `2k` agents without replacement from the
//! [`crate::urn::Urn`] and pairs them off, assuming each of the `k` pairs is
//! independent — only an approximation of `k` truly independent uniform
//! draws from the population: the true process could, with small
//! probability, draw the same physical agent into two different pairs
//! within the same block, while a without-replacement draw never can.
//! Collision reconciliation corrects for the missing repeats (spec §4.4.3's
//! own observation that the expected number of such repeats is
//! `O(B^2 / n) = O(1)`) by replaying that many of the block's `B`
//! interactions as ordinary one-at-a-time draws instead of delimiter pairs,
//! so the block still totals exactly `B` interactions: `k = B - C` pairs are
//! delimiter-sampled and `C` are replayed individually.

use crate::rng::Prng;
use crate::state::StateIdx;
use crate::transition_table::TransitionTable;
use crate::urn::Urn;

/// Outcome of one block, fed into the switchover heuristic (spec §4.4.6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchReport {
    /// Parallel time elapsed this block, `B / n` (spec §4.4.4).
    pub parallel_dt: f64,
    /// Number of this block's `B` interactions whose transition entry was
    /// null.
    pub null_interactions: u64,
    /// Total interactions this block actually simulated. Equal to `B`
    /// unless the population ran out mid-block (spec §4.4.7).
    pub interactions: u64,
}

/// The batched engine. Holds no state of its own beyond tuning: the
/// [`Urn`] it operates on belongs to the caller (spec §4.4.1 "operates
/// directly on the shared Urn").
pub struct MultiBatchEngine {
    alpha: f64,
    beta: f64,
}

impl MultiBatchEngine {
    pub fn new(alpha: f64, beta: f64) -> MultiBatchEngine {
        MultiBatchEngine { alpha, beta }
    }

    /// The batch size for a population of `n` agents (spec §4.4.2):
    /// `floor(alpha * sqrt(n))`, clamped to `[1, n / 2]` so `2B` never
    /// exceeds the population (spec §4.4.7 edge cases).
    pub fn batch_size(&self, n: i64) -> i64 {
        let raw = (self.alpha * (n as f64).sqrt()).floor() as i64;
        raw.clamp(1, (n / 2).max(1))
    }

    /// Runs one block against `urn`, mutating it in place. Returns `None`
    /// if fewer than two agents remain or the table has only one state
    /// (spec §4.4.7: `q = 1` and `n < 2` are both no-ops).
    pub fn step(&self, table: &TransitionTable, urn: &mut Urn, rng: &mut Prng) -> Option<BatchReport> {
        let n = urn.total();
        if n < 2 || table.q() <= 1 {
            return None;
        }

        let batch = self.batch_size(n);

        // The block is exactly `batch` interactions (spec §4.4.1/§4.4.4):
        // `collisions` of them are drawn before the delimiter sample so the
        // remaining `untouched` pairs are sampled without replacement, and
        // the two groups together always total `batch`.
        let expected_collisions = (batch * (batch - 1)) as f64 / n as f64;
        let collisions = rng.poisson(expected_collisions).min(batch as u64);
        let untouched = batch as u64 - collisions;

        let drawn_per_state = urn.sample_without_replacement(2 * untouched, rng);

        let mut agents: Vec<StateIdx> =
            Vec::with_capacity((self.beta * (2 * untouched) as f64).ceil().max(2.0 * untouched as f64) as usize);
        for (state, &count) in drawn_per_state.iter().enumerate() {
            for _ in 0..count {
                agents.push(StateIdx::new(state));
            }
            urn.remove(StateIdx::new(state), count);
        }
        rng.shuffle(&mut agents);

        let mut null_interactions = 0u64;
        let mut interactions = 0u64;
        for pair in agents.chunks_exact(2) {
            let (i, j) = (pair[0], pair[1]);
            let entry = table.get(i, j);
            if entry.is_null() {
                null_interactions += 1;
            }
            let (oi, oj) = entry.sample(rng.uniform_unit());
            if oi == oj {
                urn.add(oi, 2);
            } else {
                urn.add(oi, 1);
                urn.add(oj, 1);
            }
            interactions += 1;
        }

        for _ in 0..collisions {
            if urn.total() < 2 {
                break;
            }
            let i = urn.sample(rng);
            urn.remove(i, 1);
            let j = urn.sample(rng);
            urn.remove(j, 1);
            let entry = table.get(i, j);
            if entry.is_null() {
                null_interactions += 1;
            }
            let (oi, oj) = entry.sample(rng.uniform_unit());
            if oi == oj {
                urn.add(oi, 2);
            } else {
                urn.add(oi, 1);
                urn.add(oj, 1);
            }
            interactions += 1;
        }

        Some(BatchReport {
            parallel_dt: interactions as f64 / n as f64,
            null_interactions,
            interactions,
        })
    }
}

/// Tracks the null-interaction fraction across blocks via an exponentially
/// weighted moving average, the signal [`crate::driver::SimulationDriver`]
/// uses to decide when to hand off to [`crate::gillespie::GillespieEngine`]
/// (spec §4.4.6).
#[derive(Debug, Clone)]
pub struct NullFractionTracker {
    decay: f64,
    estimate: f64,
    warmed_up: bool,
}

impl NullFractionTracker {
    pub fn new(decay: f64) -> NullFractionTracker {
        NullFractionTracker {
            decay,
            estimate: 0.0,
            warmed_up: false,
        }
    }

    pub fn observe(&mut self, report: &BatchReport) {
        if report.interactions == 0 {
            return;
        }
        let sample = report.null_interactions as f64 / report.interactions as f64;
        if !self.warmed_up {
            self.estimate = sample;
            self.warmed_up = true;
        } else {
            self.estimate = self.decay * sample + (1.0 - self.decay) * self.estimate;
        }
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }
}
