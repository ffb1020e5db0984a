//! The public façade tying a rule, a configuration, and the two engines
//! together into a single runnable simulation (spec §4.6, §5, §7).

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::error::{SimError, SimResult};
use crate::gillespie::GillespieEngine;
use crate::history::History;
use crate::multibatch::{MultiBatchEngine, NullFractionTracker};
use crate::options::SimulationOptions;
use crate::reachability::ReachabilityBuilder;
use crate::rng::Prng;
use crate::rule::Rule;
use crate::state::{StateIdx, StateTable};
use crate::transition_table::{ReactionDescriptor, TransitionTable};
use crate::urn::Urn;

/// A cooperative stop signal a caller can share across threads and flip from
/// outside the simulation loop (spec §5 "cancellation is cooperative: checked
/// between blocks, not pre-empted mid-block").
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters accumulated across every `run` call on a driver (spec §6 `stats`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub total_interactions: u64,
    pub batches_run: u64,
    pub gillespie_steps: u64,
    pub engine_switches: u64,
}

/// Why a `run` call returned (spec §4.6 "Stop conditions").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller's `stop` predicate returned `true`.
    Predicate,
    /// No non-null transition remains reachable from the current
    /// configuration (spec invariant I5).
    Silence,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOutcome {
    pub stopped_by: StopReason,
    pub parallel_time: f64,
}

/// Which engine is currently advancing the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineMode {
    MultiBatch,
    Gillespie,
}

/// A configurable, resumable simulation over a discovered state space (spec
/// §4.6). Owns the population's [`Urn`], the compiled [`TransitionTable`],
/// both execution engines, and the running [`History`]/[`Stats`].
pub struct SimulationDriver<S> {
    states: StateTable<S>,
    table: TransitionTable,
    urn: Urn,
    rng: Prng,
    options: SimulationOptions,
    null_tracker: NullFractionTracker,
    multibatch: MultiBatchEngine,
    gillespie: Option<GillespieEngine>,
    mode: EngineMode,
    history: History,
    stats: Stats,
    parallel_time: f64,
}

impl<S: Clone + Eq + Hash> SimulationDriver<S> {
    /// Discovers `Q` from `rule` starting at `initial_counts`, builds the
    /// table, and seeds the urn (spec §4.5 then §4.1).
    #[instrument(skip(initial_counts, rule, options))]
    pub fn new(
        initial_counts: Vec<(S, i64)>,
        rule: Rule<S>,
        options: SimulationOptions,
    ) -> SimResult<SimulationDriver<S>> {
        for (_, count) in &initial_counts {
            if *count < 0 {
                return Err(SimError::InvalidConfig {
                    reason: format!("initial count {count} is negative"),
                });
            }
        }

        let initial_values: Vec<S> = initial_counts.iter().map(|(s, _)| s.clone()).collect();
        let (states, table) = ReachabilityBuilder::explore(
            &initial_values,
            &rule,
            options.transition_order,
            options.max_states,
        )?;

        let mut counts = vec![0i64; states.len()];
        for (value, count) in &initial_counts {
            let idx = states
                .get(value)
                .expect("reachability exploration interns every initial state");
            counts[idx.index()] += count;
        }
        let urn = Urn::from_counts(&counts);

        let rng = match options.seed {
            Some(seed) => Prng::from_seed(seed),
            None => Prng::from_entropy(),
        };

        info!(states = states.len(), population = urn.total(), "discovered reachable state space");

        Ok(SimulationDriver {
            states,
            table,
            urn,
            rng,
            null_tracker: NullFractionTracker::new(options.null_fraction_decay),
            multibatch: MultiBatchEngine::new(options.batch_alpha, options.batch_beta),
            gillespie: None,
            mode: EngineMode::MultiBatch,
            history: History::new(counts.len()),
            stats: Stats::default(),
            parallel_time: 0.0,
            options,
        })
    }

    pub fn state_list(&self) -> &[S] {
        self.states.state_list()
    }

    /// Every non-null transition the table contains, regardless of whether
    /// it can currently fire (spec §6 `reactions`).
    pub fn reactions(&self) -> Vec<ReactionDescriptor> {
        self.table.reactions()
    }

    /// The subset of `reactions()` whose input pair has at least one agent
    /// of each state available right now (spec §6 `enabled_reactions`).
    pub fn enabled_reactions(&self) -> Vec<ReactionDescriptor> {
        self.table
            .reactions()
            .into_iter()
            .filter(|r| {
                let (i, j) = r.input;
                if i == j {
                    self.urn.count(i) >= 2
                } else {
                    self.urn.count(i) >= 1 && self.urn.count(j) >= 1
                }
            })
            .collect()
    }

    pub fn config_array(&self) -> Vec<i64> {
        self.urn.to_config()
    }

    pub fn config_dict(&self) -> Vec<(S, i64)> {
        self.config_array()
            .into_iter()
            .enumerate()
            .filter(|(_, count)| *count != 0)
            .map(|(i, count)| (self.states.value(StateIdx::new(i)).clone(), count))
            .collect()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn parallel_time(&self) -> f64 {
        self.parallel_time
    }

    /// Replaces the current configuration in place, over the same discovered
    /// state space, and clears the history and engine-switch state (spec §6
    /// `reset`).
    pub fn reset(&mut self, new_counts: Vec<(S, i64)>) -> SimResult<()> {
        let mut counts = vec![0i64; self.states.len()];
        for (value, count) in &new_counts {
            if *count < 0 {
                return Err(SimError::InvalidConfig {
                    reason: format!("reset count {count} is negative"),
                });
            }
            let idx = self.states.get(value).ok_or_else(|| SimError::InvalidConfig {
                reason: "reset() introduced a state outside the originally discovered space"
                    .to_string(),
            })?;
            counts[idx.index()] += count;
        }
        self.urn = Urn::from_counts(&counts);
        self.history = History::new(counts.len());
        self.gillespie = None;
        self.mode = EngineMode::MultiBatch;
        self.null_tracker = NullFractionTracker::new(self.options.null_fraction_decay);
        self.parallel_time = 0.0;
        Ok(())
    }

    fn active_states(&self) -> Vec<StateIdx> {
        (0..self.states.len())
            .map(StateIdx::new)
            .filter(|&i| self.urn.count(i) > 0)
            .collect()
    }

    /// Whether no non-null interaction remains reachable from the current
    /// configuration (spec invariant I5).
    fn is_silent(&self) -> bool {
        let active = self.active_states();
        for (k, &i) in active.iter().enumerate() {
            for &j in &active[k..] {
                if i == j && self.urn.count(i) < 2 {
                    continue;
                }
                if !self.table.get(i, j).is_null() || !self.table.get(j, i).is_null() {
                    return false;
                }
            }
        }
        true
    }

    /// Runs blocks/steps until `stop` returns `true`, silence is reached, the
    /// optional deadline elapses, or `cancel` is flipped (spec §4.6, §5, §7).
    ///
    /// `record_every` is a parallel-time interval: a snapshot is appended to
    /// [`Self::history`] whenever at least that much parallel time has
    /// elapsed since the last one. `None` records only the final state.
    #[instrument(skip(self, stop, cancel))]
    pub fn run(
        &mut self,
        mut stop: impl FnMut(&[i64]) -> bool,
        record_every: Option<f64>,
        deadline: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> SimResult<RunOutcome> {
        let start = Instant::now();
        let mut last_recorded = self.parallel_time;
        if self.history.is_empty() {
            self.history
                .record(self.parallel_time, self.stats.total_interactions, &self.config_array());
        }

        let reason = loop {
            if stop(&self.urn.to_config()) {
                break StopReason::Predicate;
            }
            if self.is_silent() {
                break StopReason::Silence;
            }
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(SimError::Cancelled);
                }
            }
            if let Some(limit) = deadline {
                if start.elapsed() > limit {
                    return Err(SimError::Timeout {
                        deadline_secs: limit.as_secs_f64(),
                    });
                }
            }

            self.advance_one_block();

            if let Some(interval) = record_every {
                if self.parallel_time - last_recorded >= interval {
                    self.history.record(
                        self.parallel_time,
                        self.stats.total_interactions,
                        &self.config_array(),
                    );
                    last_recorded = self.parallel_time;
                }
            }
        };

        // Skip the final snapshot if nothing has changed since the last one
        // recorded (e.g. a run that is silent, or stopped by a predicate,
        // before a single block executes) — otherwise a no-op `run()` call
        // would duplicate the row `is_empty()` already recorded above (spec
        // §8 scenario 6: a trivial rule's `run()` leaves history length 1).
        if self.parallel_time > last_recorded {
            self.history
                .record(self.parallel_time, self.stats.total_interactions, &self.config_array());
        }

        Ok(RunOutcome {
            stopped_by: reason,
            parallel_time: self.parallel_time,
        })
    }

    /// Picks an engine per the EWMA switchover heuristic (spec §4.4.6) and
    /// advances it by one unit of work.
    fn advance_one_block(&mut self) {
        let should_switch = self.null_tracker.estimate() >= self.options.gillespie_switch_threshold;
        let target_mode = if should_switch {
            EngineMode::Gillespie
        } else {
            EngineMode::MultiBatch
        };

        if target_mode != self.mode {
            debug!(from = ?self.mode, to = ?target_mode, null_fraction = self.null_tracker.estimate(), "switching engine");
            self.stats.engine_switches += 1;
            self.mode = target_mode;
            if target_mode == EngineMode::Gillespie {
                self.gillespie = Some(GillespieEngine::new(&self.table, &self.urn));
            } else {
                self.gillespie = None;
            }
        }

        match self.mode {
            EngineMode::MultiBatch => {
                if let Some(report) = self.multibatch.step(&self.table, &mut self.urn, &mut self.rng) {
                    self.null_tracker.observe(&report);
                    self.parallel_time += report.parallel_dt;
                    self.stats.total_interactions += report.interactions;
                    self.stats.batches_run += 1;
                }
            }
            EngineMode::Gillespie => {
                let engine = self
                    .gillespie
                    .as_mut()
                    .expect("gillespie engine is built when entering Gillespie mode");
                if let Some(dt) = engine.step(&self.table, &mut self.urn, &mut self.rng) {
                    self.parallel_time += dt;
                    self.stats.total_interactions += 1;
                    self.stats.gillespie_steps += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap as Map;

    fn majority_rule() -> Rule<&'static str> {
        let mut explicit = Map::default();
        explicit.insert(("A", "B"), ("U", "U"));
        explicit.insert(("A", "U"), ("A", "A"));
        explicit.insert(("B", "U"), ("B", "B"));
        Rule::Explicit(explicit)
    }

    #[test]
    fn driver_discovers_states_and_conserves_population() {
        let initial = vec![("A", 30i64), ("B", 20), ("U", 0)];
        let mut driver =
            SimulationDriver::new(initial, majority_rule(), SimulationOptions::builder().seed(Some(5)).build())
                .unwrap();
        assert_eq!(driver.state_list().len(), 3);
        let total_before: i64 = driver.config_array().iter().sum();

        let outcome = driver.run(|_| false, None, None, None).unwrap();
        assert_eq!(outcome.stopped_by, StopReason::Silence);

        let total_after: i64 = driver.config_array().iter().sum();
        assert_eq!(total_before, total_after);
    }

    #[test]
    fn stop_predicate_halts_before_silence() {
        let initial = vec![("A", 1000i64), ("B", 1000)];
        let mut driver =
            SimulationDriver::new(initial, majority_rule(), SimulationOptions::builder().seed(Some(9)).build())
                .unwrap();
        // The initial configuration already satisfies this predicate, so the
        // run should stop immediately with no blocks executed.
        let outcome = driver
            .run(|config| config.iter().sum::<i64>() == 2000, None, None, None)
            .unwrap();
        assert_eq!(outcome.stopped_by, StopReason::Predicate);
        assert_eq!(driver.stats().batches_run, 0);
    }

    #[test]
    fn history_records_at_least_the_initial_and_final_rows() {
        let initial = vec![("A", 5i64), ("B", 5)];
        let mut driver =
            SimulationDriver::new(initial, majority_rule(), SimulationOptions::builder().seed(Some(1)).build())
                .unwrap();
        driver.run(|_| false, Some(0.01), None, None).unwrap();
        assert!(driver.history().len() >= 2);
    }

    #[test]
    fn reset_reuses_the_discovered_state_space() {
        let initial = vec![("A", 5i64), ("B", 5)];
        let mut driver =
            SimulationDriver::new(initial, majority_rule(), SimulationOptions::builder().seed(Some(2)).build())
                .unwrap();
        driver.run(|_| false, None, None, None).unwrap();
        driver.reset(vec![("A", 3), ("B", 7)]).unwrap();
        assert_eq!(driver.config_array().iter().sum::<i64>(), 10);
        assert_eq!(driver.history().len(), 0);
    }

    #[test]
    fn cancellation_token_stops_a_run() {
        let initial = vec![("A", 10_000i64), ("B", 10_000)];
        let mut driver =
            SimulationDriver::new(initial, majority_rule(), SimulationOptions::builder().seed(Some(3)).build())
                .unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = driver.run(|_| false, None, None, Some(&token)).unwrap_err();
        assert_eq!(err, SimError::Cancelled);
    }
}
