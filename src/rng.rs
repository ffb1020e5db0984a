//! RNG primitives (spec §2 "RNG primitives"): uniform integers, binomial,
//! hypergeometric and exponential draws, behind one seedable stream per
//! simulation (spec §9 "Per-simulation RNG streams").

use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::{Binomial, Distribution, Exp, Hypergeometric, Poisson};

/// A population protocol's single RNG stream.
///
/// Wraps `SmallRng` rather than a process-wide generator so that distinct
/// `SimulationDriver`s never share state (spec §5 "Shared resources", §9).
#[derive(Debug, Clone)]
pub struct Prng(SmallRng);

impl Prng {
    pub fn from_seed(seed: u64) -> Self {
        Prng(SmallRng::seed_from_u64(seed))
    }

    /// Seeds from OS entropy, for callers that don't care about
    /// reproducibility.
    pub fn from_entropy() -> Self {
        Prng(SmallRng::seed_from_u64(rand::rng().random()))
    }

    /// A uniform integer in `[0, bound)`. `bound` must be positive.
    pub fn uniform_below(&mut self, bound: usize) -> usize {
        debug_assert!(bound > 0, "uniform_below called with a zero bound");
        self.0.random_range(0..bound)
    }

    /// A uniform `f64` in `[0, 1)`, used to walk the Gillespie propensity
    /// tree (which is keyed by `f64` rates, so there is no exact-integer
    /// alternative).
    pub fn uniform_unit(&mut self) -> f64 {
        self.0.random::<f64>()
    }

    /// A uniform `i64` in `[0, bound)`, used to walk the [`crate::urn::Urn`]'s
    /// segment tree exactly (counts are integral, so this avoids the
    /// precision loss a `f64`-scaled draw would have for large populations).
    pub fn uniform_below_i64(&mut self, bound: i64) -> i64 {
        debug_assert!(bound > 0, "uniform_below_i64 called with a non-positive bound");
        self.0.random_range(0..bound)
    }

    /// `Binomial(n, 0.5)`, specialized for small `n` via popcount the way
    /// the teacher's `utils::binomial_05` does, falling back to
    /// `rand_distr::Binomial` above a word's width.
    pub fn binomial_half(&mut self, n: u64) -> u64 {
        if n == 0 {
            0
        } else if n <= 64 {
            (self.0.random::<u64>() >> (64 - n)).count_ones() as u64
        } else {
            self.0.sample(Binomial::new(n, 0.5).unwrap())
        }
    }

    /// `Binomial(n, p)`.
    pub fn binomial(&mut self, n: u64, p: f64) -> u64 {
        if n == 0 || p <= 0.0 {
            return 0;
        }
        if p >= 1.0 {
            return n;
        }
        self.0.sample(Binomial::new(n, p).unwrap())
    }

    /// The number of "successes" (draws landing in the `successes`-sized
    /// sub-population) among `draws` samples taken without replacement from
    /// a population of `total`. This is the primitive behind
    /// [`crate::urn::Urn::sample_without_replacement`]'s recursive split.
    pub fn hypergeometric(&mut self, total: u64, successes: u64, draws: u64) -> u64 {
        debug_assert!(successes <= total);
        debug_assert!(draws <= total);
        if draws == 0 || successes == 0 {
            return 0;
        }
        if successes == total {
            return draws;
        }
        self.0
            .sample(Hypergeometric::new(total, successes, draws).unwrap())
    }

    /// An `Exponential(rate)` draw, used by [`crate::gillespie::GillespieEngine`]
    /// for the waiting time to the next non-null reaction.
    pub fn exponential(&mut self, rate: f64) -> f64 {
        debug_assert!(rate > 0.0, "exponential() called with non-positive rate");
        self.0.sample(Exp::new(rate).unwrap())
    }

    /// A `Poisson(rate)` draw, used by [`crate::multibatch::MultiBatchEngine`]
    /// to estimate the number of same-agent collisions a block's
    /// without-replacement delimiter sample missed. `rate` of exactly `0`
    /// always yields `0`.
    pub fn poisson(&mut self, rate: f64) -> u64 {
        debug_assert!(rate >= 0.0, "poisson() called with a negative rate");
        if rate == 0.0 {
            return 0;
        }
        self.0.sample(Poisson::new(rate).unwrap()) as u64
    }

    /// A Fisher-Yates shuffle, used to turn a multiset of drawn states into a
    /// uniformly random pairing for a `MultiBatchEngine` block (spec
    /// §4.4.3).
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.0.random_range(0..=i);
            slice.swap(i, j);
        }
    }
}
