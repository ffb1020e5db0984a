//! A stochastic simulator for population protocols: anonymous, finite-state
//! agents that evolve a global configuration through repeated uniformly
//! random pairwise interactions.
//!
//! [`driver::SimulationDriver`] is the entry point. Give it an initial
//! configuration and a transition rule (any of the three shapes in
//! [`rule::Rule`]), and it discovers the reachable state space
//! ([`reachability::ReachabilityBuilder`]), compiles it into a dense lookup
//! table ([`transition_table::TransitionTable`]), and runs it forward with
//! whichever of the two engines currently fits the population's null-rate:
//! the batched, approximate [`multibatch::MultiBatchEngine`] for the common
//! case, or the exact, event-driven [`gillespie::GillespieEngine`] once
//! interactions become too sparse for batching to pay for itself.

pub mod driver;
pub mod error;
mod gillespie;
pub mod history;
mod indexed_vec;
mod multibatch;
pub mod options;
mod reachability;
mod rng;
pub mod rule;
pub mod state;
pub mod transition_table;
mod urn;

#[cfg(test)]
mod tests;

pub use driver::{CancellationToken, RunOutcome, SimulationDriver, Stats, StopReason};
pub use error::{SimError, SimResult};
pub use options::{SimulationOptions, TransitionOrder};
pub use rule::{Rule, RuleOutput};
pub use state::StateIdx;
pub use transition_table::ReactionDescriptor;
