use thiserror::Error;

/// The error kinds surfaced by this crate (spec §7).
///
/// None of these are ever recovered from silently: a caller that sees one
/// either fixes its input (`InvalidRule`/`InvalidConfig`), raises its
/// reachability bound (`Unreachable`), or simply stops (`Cancelled`/`Timeout`).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// The rule's probabilities did not sum to 1 within tolerance, produced a
    /// value that was not a pair, or referenced an output state that was
    /// never declared.
    #[error("invalid transition rule: {reason}")]
    InvalidRule { reason: String },

    /// The initial configuration had a negative count, or its total did not
    /// fit the population size the caller declared.
    #[error("invalid initial configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Reachability exploration discovered more states than `max_states`
    /// allows before terminating; the rule likely produces an unbounded
    /// state set.
    #[error("reachability exploration exceeded the bound of {limit} states (found at least {explored})")]
    Unreachable { explored: usize, limit: usize },

    /// The run was stopped by a cooperative cancellation token.
    #[error("simulation cancelled")]
    Cancelled,

    /// The run exceeded its wall-clock deadline.
    #[error("simulation exceeded its deadline of {deadline_secs}s")]
    Timeout { deadline_secs: f64 },
}

/// The crate's sole fallible-result alias.
pub type SimResult<T> = Result<T, SimError>;
