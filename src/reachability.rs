//! Enumerating `Q` from a rule and an initial configuration (spec §4.5).

use std::collections::VecDeque;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::error::{SimError, SimResult};
use crate::options::TransitionOrder;
use crate::rule::{Rule, RuleOutput};
use crate::state::{StateIdx, StateTable};
use crate::transition_table::TransitionTable;

/// Breadth-first enumeration of every state reachable from an initial
/// configuration under a rule, and the [`TransitionTable`] built from the
/// transitions discovered along the way.
///
/// Deterministic termination is a precondition on the caller's rule (spec
/// §4.5): `|Q|` must be finite. Since nothing here can detect an infinite
/// state set by construction, exploration is capped at `max_states` and
/// fails with [`SimError::Unreachable`] rather than looping forever (spec §9
/// "Reachability on infinite state sets").
pub struct ReachabilityBuilder;

impl ReachabilityBuilder {
    pub fn explore<S: Clone + Eq + Hash>(
        initial_states: &[S],
        rule: &Rule<S>,
        order: TransitionOrder,
        max_states: usize,
    ) -> SimResult<(StateTable<S>, TransitionTable)> {
        let mut table: StateTable<S> = StateTable::new();
        let mut worklist: VecDeque<StateIdx> = VecDeque::new();
        let mut known: Vec<StateIdx> = Vec::new();
        let mut raw: FxHashMap<(StateIdx, StateIdx), Vec<(f64, (StateIdx, StateIdx))>> =
            FxHashMap::default();

        let mut intern = |table: &mut StateTable<S>, value: S| -> SimResult<StateIdx> {
            table.intern(value, max_states).ok_or(SimError::Unreachable {
                explored: table.len(),
                limit: max_states,
            })
        };

        for s in initial_states {
            let idx = intern(&mut table, s.clone())?;
            if !known.contains(&idx) {
                known.push(idx);
                worklist.push_back(idx);
            }
        }

        while let Some(subject) = worklist.pop_front() {
            // `known` already contains `subject` (added when it was first
            // interned), so this also evaluates the self-pair (subject, subject).
            //
            // Every pair involving `subject` is evaluated here, the moment
            // `subject` is discovered, against the full set known *at this
            // instant* (which includes states discovered after `subject`
            // itself, since `subject` can still be sitting in the worklist
            // when they appear). Each state is dequeued exactly once, so
            // this is the only chance to pair it against states discovered
            // after it.
            let others: Vec<StateIdx> = known.clone();
            for &other in &others {
                let mut pairs: Vec<(StateIdx, StateIdx)> = Vec::new();
                match order {
                    TransitionOrder::Symmetric => {
                        // Spec §4.1: "if user provided only (i,j) but not
                        // (j,i), copy the entry to (j,i)". The direction a
                        // caller actually defined has nothing to do with
                        // which of `subject`/`other` happened to get the
                        // smaller `StateIdx` during discovery, so that can't
                        // be the tie-break: query both directions and use
                        // whichever the rule actually defines, falling back
                        // to index order only when both (or neither) are.
                        let chosen = if subject == other {
                            (subject, other)
                        } else {
                            let x = table.value(subject).clone();
                            let y = table.value(other).clone();
                            let forward = rule.is_defined(&x, &y);
                            let backward = rule.is_defined(&y, &x);
                            if forward != backward {
                                if forward {
                                    (subject, other)
                                } else {
                                    (other, subject)
                                }
                            } else if subject.index() <= other.index() {
                                (subject, other)
                            } else {
                                (other, subject)
                            }
                        };
                        pairs.push(chosen);
                    }
                    TransitionOrder::Asymmetric | TransitionOrder::Both => {
                        pairs.push((subject, other));
                        if subject != other {
                            pairs.push((other, subject));
                        }
                    }
                }
                for (i, j) in pairs {
                    if raw.contains_key(&(i, j)) {
                        continue;
                    }
                    let x = table.value(i).clone();
                    let y = table.value(j).clone();
                    let output = rule.apply(&x, &y);
                    let branches = Self::intern_branches(&mut table, output, max_states)?;
                    for &(_, (oi, oj)) in &branches {
                        for discovered in [oi, oj] {
                            if !known.contains(&discovered) {
                                known.push(discovered);
                                worklist.push_back(discovered);
                            }
                        }
                    }
                    raw.insert((i, j), branches);
                }
            }
        }

        let q = table.len();
        let transition_table = TransitionTable::build(q, order, raw)?;
        Ok((table, transition_table))
    }

    fn intern_branches<S: Clone + Eq + Hash>(
        table: &mut StateTable<S>,
        output: RuleOutput<S>,
        max_states: usize,
    ) -> SimResult<Vec<(f64, (StateIdx, StateIdx))>> {
        output
            .into_branches()
            .into_iter()
            .map(|(p, (a, b))| {
                let ai = table.intern(a, max_states).ok_or(SimError::Unreachable {
                    explored: table.len(),
                    limit: max_states,
                })?;
                let bi = table.intern(b, max_states).ok_or(SimError::Unreachable {
                    explored: table.len(),
                    limit: max_states,
                })?;
                Ok((p, (ai, bi)))
            })
            .collect()
    }
}
