use rustc_hash::FxHashMap;
use std::hash::Hash;

use crate::indexed_vec::Idx;

/// Marker type for [`Idx`] so a state index can never be mixed up with a
/// plain `usize` or another crate's index type.
#[derive(Debug, Clone, Copy)]
pub struct StateMarker;

/// A dense index into `Q`, assigned in discovery order (spec §3 "State index").
pub type StateIdx = Idx<StateMarker>;

/// The side table mapping state indices back to the user's original,
/// arbitrary-but-hashable state values, and forward (via interning) during
/// reachability exploration.
///
/// Hot-path code never touches `S`; only reporting (`state_list`,
/// human-readable `reactions`) does.
#[derive(Debug, Clone, Default)]
pub struct StateTable<S> {
    by_index: Vec<S>,
    by_value: FxHashMap<S, StateIdx>,
}

impl<S: Clone + Eq + Hash> StateTable<S> {
    pub fn new() -> Self {
        StateTable {
            by_index: Vec::new(),
            by_value: FxHashMap::default(),
        }
    }

    /// Returns the index for `value`, interning it (assigning the next dense
    /// index) if it has not been seen before. Returns `None` if that would
    /// exceed `max_states`.
    pub fn intern(&mut self, value: S, max_states: usize) -> Option<StateIdx> {
        if let Some(&idx) = self.by_value.get(&value) {
            return Some(idx);
        }
        if self.by_index.len() >= max_states {
            return None;
        }
        let idx = StateIdx::new(self.by_index.len());
        self.by_index.push(value.clone());
        self.by_value.insert(value, idx);
        Some(idx)
    }

    /// Looks up the index of an already-interned value without inserting it.
    pub fn get(&self, value: &S) -> Option<StateIdx> {
        self.by_value.get(value).copied()
    }

    pub fn value(&self, idx: StateIdx) -> &S {
        &self.by_index[idx.index()]
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// The ordered list of states, stable-indexed (spec §6 `state_list`).
    pub fn state_list(&self) -> &[S] {
        &self.by_index
    }
}
