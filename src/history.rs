//! An append-only record of configurations sampled over the course of a run
//! (spec §6 "Dataframe history"), in the spirit of the teacher's CLI
//! `--samples` option (`main.rs`'s `samples: Vec<(state, total_reactions,
//! elapsed)>`), but columnar so a caller can pull out one state's trajectory
//! without touching the others.

/// One column per state index, plus a time column, all the same length.
#[derive(Debug, Clone, Default)]
pub struct History {
    time: Vec<f64>,
    interactions: Vec<u64>,
    columns: Vec<Vec<i64>>,
}

impl History {
    /// A history over `q` states, with no rows yet.
    pub fn new(q: usize) -> History {
        History {
            time: Vec::new(),
            interactions: Vec::new(),
            columns: vec![Vec::new(); q],
        }
    }

    /// Appends one snapshot. `config` must have length `q`.
    pub fn record(&mut self, time: f64, interactions: u64, config: &[i64]) {
        debug_assert_eq!(config.len(), self.columns.len());
        self.time.push(time);
        self.interactions.push(interactions);
        for (column, &count) in self.columns.iter_mut().zip(config) {
            column.push(count);
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// The time column (spec §6 `history` "time").
    pub fn times(&self) -> &[f64] {
        &self.time
    }

    /// The cumulative-interactions-simulated column.
    pub fn interaction_counts(&self) -> &[u64] {
        &self.interactions
    }

    /// One state's trajectory across every recorded snapshot.
    pub fn column(&self, state: usize) -> &[i64] {
        &self.columns[state]
    }

    /// The whole history as rows, oldest first: `(time, config)`.
    pub fn rows(&self) -> impl Iterator<Item = (f64, Vec<i64>)> + '_ {
        (0..self.len()).map(|row| {
            let config = self.columns.iter().map(|column| column[row]).collect();
            (self.time[row], config)
        })
    }
}
