//! Excluded-coordinate bookkeeping and candidate sampling.

use rand::Rng;
use rand::seq::index;

/// Tracks which coordinates are still eligible for the working set.
///
/// `eligible` holds the unexcluded coordinates in arbitrary order and
/// `slot[i]` is the position of coordinate i inside it (or `EXCLUDED`).
/// Exclusion is a swap-remove, so both exclusion and sampling stay bounded
/// no matter how few coordinates remain.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    eligible: Vec<usize>,
    slot: Vec<usize>,
}

const EXCLUDED: usize = usize::MAX;

impl CandidateSet {
    /// All of 0..n eligible.
    pub fn new(n: usize) -> Self {
        Self {
            eligible: (0..n).collect(),
            slot: (0..n).collect(),
        }
    }

    /// Number of coordinates still eligible.
    pub fn remaining(&self) -> usize {
        self.eligible.len()
    }

    /// Whether coordinate i has been excluded.
    pub fn is_excluded(&self, i: usize) -> bool {
        self.slot[i] == EXCLUDED
    }

    /// Remove coordinate i from the eligible set.
    pub fn exclude(&mut self, i: usize) {
        let pos = self.slot[i];
        if pos == EXCLUDED {
            return;
        }
        self.eligible.swap_remove(pos);
        if let Some(&moved) = self.eligible.get(pos) {
            self.slot[moved] = pos;
        }
        self.slot[i] = EXCLUDED;
    }

    /// Draw up to `amount` distinct eligible coordinates uniformly at random.
    ///
    /// Returns every eligible coordinate when fewer than `amount` remain.
    pub fn sample<R: Rng + ?Sized>(&self, amount: usize, rng: &mut R) -> Vec<usize> {
        let amount = amount.min(self.eligible.len());
        index::sample(rng, self.eligible.len(), amount)
            .into_iter()
            .map(|k| self.eligible[k])
            .collect()
    }
}
