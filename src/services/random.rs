//! Random reviewer selection.
//!
//! The engine draws through [`RandomSource`] so tests can inject a seeded or
//! scripted generator. [`SharedRng`] is the production source: one `StdRng`
//! behind a mutex that is held only for the duration of a single draw.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// A uniform random-draw capability, safe to share across tasks.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..upper`. Callers never pass `upper == 0`.
    fn next_index(&self, upper: usize) -> usize;
}

/// Mutex-guarded `StdRng`.
pub struct SharedRng {
    inner: Mutex<StdRng>,
}

impl SharedRng {
    /// Seed from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            inner: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SharedRng {
    fn next_index(&self, upper: usize) -> usize {
        // Poisoning is harmless: the generator has no invariants to break.
        let mut rng = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0..upper)
    }
}

impl std::fmt::Debug for SharedRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRng").finish_non_exhaustive()
    }
}

/// Pick up to `max` distinct entries uniformly without replacement.
///
/// Returns the picks in draw order. A pool smaller than `max` is returned
/// whole (shuffled); an empty pool yields an empty vector.
pub fn pick_up_to<T>(rng: &dyn RandomSource, mut pool: Vec<T>, max: usize) -> Vec<T> {
    let take = max.min(pool.len());
    // Partial Fisher-Yates: positions 0..take end up holding the sample.
    for i in 0..take {
        let j = i + rng.next_index(pool.len() - i);
        pool.swap(i, j);
    }
    pool.truncate(take);
    pool
}

/// Pick one entry uniformly, or `None` for an empty pool.
pub fn pick_one<T>(rng: &dyn RandomSource, mut pool: Vec<T>) -> Option<T> {
    if pool.is_empty() {
        return None;
    }
    let idx = rng.next_index(pool.len());
    Some(pool.swap_remove(idx))
}
