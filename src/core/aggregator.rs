use crate::domain::model::NumberSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
enum Collection {
    Collecting(Vec<i64>),
    Finalized,
}

/// Single-use, per-request accumulator of number fragments.
///
/// `merge` may be called from any number of tasks; the lock is only held for the append.
/// After `finalize` the aggregator rejects further merges, so late fetches cannot change
/// a result that has already been handed out.
#[derive(Debug)]
pub struct Aggregator {
    state: Mutex<Collection>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Collection::Collecting(Vec::new())),
        }
    }

    // Appends never leave the Vec half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Collection> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 將片段附加到多重集合
    pub fn merge(&self, fragment: NumberSet) {
        let count = fragment.len();
        let mut state = self.lock();
        if let Collection::Collecting(numbers) = &mut *state {
            numbers.extend(fragment.into_vec());
            return;
        }
        drop(state);
        tracing::debug!(count, "Discarding fragment merged after finalize");
    }

    /// 去重並遞增排序；之後不再接受合併
    ///
    /// A second call returns an empty set.
    pub fn finalize(&self) -> NumberSet {
        let mut state = self.lock();
        let previous = std::mem::replace(&mut *state, Collection::Finalized);
        drop(state);

        let Collection::Collecting(collected) = previous else {
            tracing::warn!("Aggregator finalized twice, returning an empty set");
            return NumberSet::new();
        };

        NumberSet::from(sorted_unique(collected))
    }
}

/// Sorts, then drops every value equal to the previously kept one.
fn sorted_unique(mut numbers: Vec<i64>) -> Vec<i64> {
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}
