//! The indexed, collision-free encoding of δ (spec §4.1).
//!
//! Branches are kept in a small inline vector (`tinyvec::ArrayVec`), the same
//! idiom the teacher's `Reaction` (`src/reaction.rs`) uses for its
//! stoichiometry: a transition's distribution rarely has more than a
//! handful of outcomes, so the common case never touches the heap.

use rustc_hash::FxHashMap;
use tinyvec::ArrayVec;

use crate::error::{SimError, SimResult};
use crate::options::TransitionOrder;
use crate::state::StateIdx;

/// Maximum distinct outcomes a single `(i, j)` pair may have after merging
/// duplicates. Generous for any rule a human would hand-author; a rule that
/// legitimately needs more should be flagged, not silently truncated.
pub const MAX_BRANCHES: usize = 8;

const PROBABILITY_TOLERANCE: f64 = 1e-12;

/// One `(i, j)` entry of the table: its outcomes, their probabilities, and
/// whether it is null (spec §3 "Delta entries").
#[derive(Debug, Clone)]
pub struct TransitionEntry {
    outputs: ArrayVec<[(StateIdx, StateIdx); MAX_BRANCHES]>,
    probs: ArrayVec<[f64; MAX_BRANCHES]>,
    is_null: bool,
}

impl TransitionEntry {
    pub fn outputs(&self) -> &[(StateIdx, StateIdx)] {
        &self.outputs
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    pub fn is_null(&self) -> bool {
        self.is_null
    }

    /// Picks an outcome according to the entry's distribution. `u` must be
    /// uniform in `[0, 1)`; deterministic entries ignore it.
    pub fn sample(&self, u: f64) -> (StateIdx, StateIdx) {
        let mut acc = 0.0;
        for (p, out) in self.probs.iter().zip(self.outputs.iter()) {
            acc += p;
            if u < acc {
                return *out;
            }
        }
        // Floating-point rounding can leave `u` a hair past the last
        // cumulative boundary; fall back to the last outcome rather than
        // panicking.
        *self.outputs.last().expect("a transition entry is never empty")
    }

    fn identity(i: StateIdx, j: StateIdx) -> TransitionEntry {
        let mut outputs = ArrayVec::new();
        outputs.push((i, j));
        let mut probs = ArrayVec::new();
        probs.push(1.0);
        TransitionEntry {
            outputs,
            probs,
            is_null: true,
        }
    }

    fn swapped(&self) -> TransitionEntry {
        TransitionEntry {
            outputs: self.outputs.iter().map(|&(a, b)| (b, a)).collect(),
            probs: self.probs.clone(),
            is_null: self.is_null,
        }
    }

    /// Builds and validates one entry from raw `(probability, (i', j'))`
    /// branches: merges duplicate outcomes, drops zero-probability ones, and
    /// checks the remainder sums to 1 within tolerance.
    fn build(i: StateIdx, j: StateIdx, branches: Vec<(f64, (StateIdx, StateIdx))>) -> SimResult<Self> {
        let mut merged: Vec<(StateIdx, StateIdx, f64)> = Vec::new();
        for (p, out) in branches {
            if p < 0.0 {
                return Err(SimError::InvalidRule {
                    reason: format!("transition ({}, {}) has a negative probability {p}", i.index(), j.index()),
                });
            }
            if p == 0.0 {
                continue;
            }
            if let Some(existing) = merged.iter_mut().find(|(a, b, _)| (*a, *b) == out) {
                existing.2 += p;
            } else {
                merged.push((out.0, out.1, p));
            }
        }
        if merged.is_empty() {
            // A rule that assigns zero probability to every branch is
            // equivalent to the identity (spec §4.4.7 "probability 0 ...
            // dropped at table build; never sampled").
            return Ok(TransitionEntry::identity(i, j));
        }
        let total: f64 = merged.iter().map(|(_, _, p)| p).sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(SimError::InvalidRule {
                reason: format!(
                    "transition ({}, {})'s probabilities sum to {total}, not 1",
                    i.index(),
                    j.index()
                ),
            });
        }
        if merged.len() > MAX_BRANCHES {
            return Err(SimError::InvalidRule {
                reason: format!(
                    "transition ({}, {}) has {} distinct outcomes, more than the {MAX_BRANCHES} supported",
                    i.index(),
                    j.index(),
                    merged.len()
                ),
            });
        }
        let is_null = merged.len() == 1 && merged[0].0 == i && merged[0].1 == j;
        let outputs = merged.iter().map(|&(a, b, _)| (a, b)).collect();
        let probs = merged.iter().map(|&(_, _, p)| p).collect();
        Ok(TransitionEntry {
            outputs,
            probs,
            is_null,
        })
    }
}

/// The dense `q x q` lookup table hot loops use (spec §4.1 contract
/// `get(i, j) -> (outputs[], probs[], is_null)`).
#[derive(Debug, Clone)]
pub struct TransitionTable {
    q: usize,
    entries: Vec<TransitionEntry>,
}

impl TransitionTable {
    pub fn q(&self) -> usize {
        self.q
    }

    pub fn get(&self, i: StateIdx, j: StateIdx) -> &TransitionEntry {
        &self.entries[i.index() * self.q + j.index()]
    }

    /// Builds the table from raw per-pair branch lists (spec §4.1 "Build"),
    /// applying the symmetric-mode fill-in of spec §4.1 "Symmetric mode".
    ///
    /// `raw` need only contain the entries the caller actually computed:
    /// under [`TransitionOrder::Symmetric`], only `i <= j`; under
    /// [`TransitionOrder::Asymmetric`] or [`TransitionOrder::Both`], every
    /// pair. Pairs missing from `raw` default to null.
    pub fn build(
        q: usize,
        order: TransitionOrder,
        raw: FxHashMap<(StateIdx, StateIdx), Vec<(f64, (StateIdx, StateIdx))>>,
    ) -> SimResult<TransitionTable> {
        let mut entries = Vec::with_capacity(q * q);
        for i in 0..q {
            for j in 0..q {
                entries.push(TransitionEntry::identity(StateIdx::new(i), StateIdx::new(j)));
            }
        }

        for (&(i, j), branches) in &raw {
            let entry = TransitionEntry::build(i, j, branches.clone())?;
            entries[i.index() * q + j.index()] = entry;
        }

        if order == TransitionOrder::Symmetric {
            for i in 0..q {
                for j in (i + 1)..q {
                    let si = StateIdx::new(i);
                    let sj = StateIdx::new(j);
                    if raw.contains_key(&(si, sj)) && !raw.contains_key(&(sj, si)) {
                        let mirrored = entries[i * q + j].swapped();
                        entries[j * q + i] = mirrored;
                    } else if raw.contains_key(&(sj, si)) && !raw.contains_key(&(si, sj)) {
                        let mirrored = entries[j * q + i].swapped();
                        entries[i * q + j] = mirrored;
                    }
                }
            }
        } else if order == TransitionOrder::Both {
            for i in 0..q {
                for j in (i + 1)..q {
                    let si = StateIdx::new(i);
                    let sj = StateIdx::new(j);
                    if raw.contains_key(&(si, sj)) != raw.contains_key(&(sj, si)) {
                        return Err(SimError::InvalidRule {
                            reason: format!(
                                "TransitionOrder::Both requires both ({i}, {j}) and ({j}, {i}) to be given"
                            ),
                        });
                    }
                }
            }
        }

        Ok(TransitionTable { q, entries })
    }

    /// Human-readable enumeration of every non-null transition (spec §6
    /// `reactions`).
    pub fn reactions(&self) -> Vec<ReactionDescriptor> {
        let mut out = Vec::new();
        for i in 0..self.q {
            for j in 0..self.q {
                let entry = self.get(StateIdx::new(i), StateIdx::new(j));
                if entry.is_null() {
                    continue;
                }
                for (&(oi, oj), &p) in entry.outputs().iter().zip(entry.probs()) {
                    out.push(ReactionDescriptor {
                        input: (StateIdx::new(i), StateIdx::new(j)),
                        output: (oi, oj),
                        probability: p,
                    });
                }
            }
        }
        out
    }
}

/// One human-readable non-null transition (spec §3 "Reaction descriptor",
/// spec §6 `reactions`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionDescriptor {
    pub input: (StateIdx, StateIdx),
    pub output: (StateIdx, StateIdx),
    pub probability: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(i: usize) -> StateIdx {
        StateIdx::new(i)
    }

    #[test]
    fn missing_pairs_default_to_null() {
        let table = TransitionTable::build(2, TransitionOrder::Asymmetric, FxHashMap::default()).unwrap();
        let entry = table.get(idx(0), idx(1));
        assert!(entry.is_null());
        assert_eq!(entry.outputs(), &[(idx(0), idx(1))]);
    }

    #[test]
    fn symmetric_mode_mirrors_missing_direction() {
        let mut raw = FxHashMap::default();
        raw.insert((idx(0), idx(1)), vec![(1.0, (idx(2), idx(2)))]);
        let table = TransitionTable::build(3, TransitionOrder::Symmetric, raw).unwrap();
        let mirrored = table.get(idx(1), idx(0));
        assert!(!mirrored.is_null());
        assert_eq!(mirrored.outputs(), &[(idx(2), idx(2))]);
    }

    #[test]
    fn rejects_probabilities_not_summing_to_one() {
        let mut raw = FxHashMap::default();
        raw.insert((idx(0), idx(1)), vec![(0.3, (idx(1), idx(1))), (0.3, (idx(0), idx(0)))]);
        let err = TransitionTable::build(2, TransitionOrder::Asymmetric, raw).unwrap_err();
        assert!(matches!(err, SimError::InvalidRule { .. }));
    }

    #[test]
    fn merges_duplicate_outcomes_and_drops_zero_probability_branches() {
        let mut raw = FxHashMap::default();
        raw.insert(
            (idx(0), idx(1)),
            vec![
                (0.25, (idx(1), idx(1))),
                (0.25, (idx(1), idx(1))),
                (0.5, (idx(0), idx(0))),
                (0.0, (idx(0), idx(1))),
            ],
        );
        let table = TransitionTable::build(2, TransitionOrder::Asymmetric, raw).unwrap();
        let entry = table.get(idx(0), idx(1));
        assert_eq!(entry.outputs().len(), 2);
        let total: f64 = entry.probs().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn both_mode_requires_explicit_reverse_direction() {
        let mut raw = FxHashMap::default();
        raw.insert((idx(0), idx(1)), vec![(1.0, (idx(1), idx(1)))]);
        let err = TransitionTable::build(2, TransitionOrder::Both, raw).unwrap_err();
        assert!(matches!(err, SimError::InvalidRule { .. }));
    }
}
