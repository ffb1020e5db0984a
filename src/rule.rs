//! The shape of a user-supplied transition rule (spec §6 "Input: `rule`").
//!
//! This module only declares the *shape* of the input a façade would build
//! (spec §1's "rule authoring conveniences ... we specify only the shape of
//! the input these produce"); discovering `Q` from it is
//! [`crate::reachability::ReachabilityBuilder`]'s job, and compiling it into
//! a lookup table is [`crate::transition_table::TransitionTable`]'s.

use rustc_hash::FxHashMap;
use std::hash::Hash;

/// What a rule returns for one ordered pair: a single deterministic outcome,
/// or a probability distribution over outcomes (spec §4.1 "Randomized
/// rules").
#[derive(Debug, Clone)]
pub enum RuleOutput<S> {
    Deterministic((S, S)),
    Distribution(Vec<(f64, (S, S))>),
}

impl<S: Clone> RuleOutput<S> {
    /// Normalizes to the distribution form, so callers need only handle one
    /// shape.
    pub fn into_branches(self) -> Vec<(f64, (S, S))> {
        match self {
            RuleOutput::Deterministic(pair) => vec![(1.0, pair)],
            RuleOutput::Distribution(branches) => branches,
        }
    }
}

/// The three input shapes spec §6 allows: an explicit deterministic
/// mapping, an explicit probabilistic mapping, or an arbitrary callable.
pub enum Rule<S> {
    /// (a) `(x, y) -> (x', y')`. Pairs absent from the map are null
    /// (resolved design decision: an omitted pair never changes state).
    Explicit(FxHashMap<(S, S), (S, S)>),
    /// (c) `(x, y) -> [(probability, (x', y'))]`.
    ProbabilityTable(FxHashMap<(S, S), Vec<(f64, (S, S))>>),
    /// (b) an arbitrary callable returning either shape.
    Callable(Box<dyn Fn(&S, &S) -> RuleOutput<S>>),
}

impl<S: Clone + Eq + Hash> Rule<S> {
    /// Applies the rule to one ordered pair, exactly as
    /// `ReachabilityBuilder` calls it while exploring.
    pub fn apply(&self, x: &S, y: &S) -> RuleOutput<S> {
        match self {
            Rule::Explicit(map) => match map.get(&(x.clone(), y.clone())) {
                Some(pair) => RuleOutput::Deterministic(pair.clone()),
                None => RuleOutput::Deterministic((x.clone(), y.clone())),
            },
            Rule::ProbabilityTable(map) => match map.get(&(x.clone(), y.clone())) {
                Some(branches) => RuleOutput::Distribution(branches.clone()),
                None => RuleOutput::Deterministic((x.clone(), y.clone())),
            },
            Rule::Callable(f) => f(x, y),
        }
    }

    /// Whether the rule has an explicit entry for the ordered pair `(x, y)`,
    /// as opposed to `apply` defaulting to the identity because the pair is
    /// absent from the map.
    ///
    /// `ReachabilityBuilder` needs this to implement spec §4.1's symmetric
    /// mode correctly: "if user provided only `(i,j)` but not `(j,i)`, copy
    /// the entry to `(j,i)`" means the *caller's* chosen direction, not
    /// whichever of `(i,j)`/`(j,i)` a state happens to get the smaller
    /// index — `apply` alone can't tell "explicitly maps to identity" apart
    /// from "absent, defaulted to identity", so this reports presence
    /// directly. A callable rule has no absent/default distinction to
    /// report (every pair it is asked about is answered, not looked up), so
    /// it always reports `true`.
    pub fn is_defined(&self, x: &S, y: &S) -> bool {
        match self {
            Rule::Explicit(map) => map.contains_key(&(x.clone(), y.clone())),
            Rule::ProbabilityTable(map) => map.contains_key(&(x.clone(), y.clone())),
            Rule::Callable(_) => true,
        }
    }
}
