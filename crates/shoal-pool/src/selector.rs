use crate::worker::Worker;
use rand::Rng;
use std::sync::Arc;

/// Picks one worker by weighted random draw over the composite scores.
///
/// Only eligible workers (healthy, under their ceiling) participate. The
/// draw is a single uniform sample against the prefix sum of the weights,
/// so no per-call sort is needed. Returns `None` when no worker is
/// eligible.
pub fn pick(workers: &[Arc<Worker>]) -> Option<Arc<Worker>> {
    let eligible: Vec<&Arc<Worker>> = workers.iter().filter(|w| w.is_eligible()).collect();
    if eligible.is_empty() {
        return None;
    }

    let weights: Vec<f64> = eligible.iter().map(|w| w.score()).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        // Scores are floored at a positive epsilon, so this only guards
        // against pathological float input.
        let index = rand::thread_rng().gen_range(0..eligible.len());
        return Some(Arc::clone(eligible[index]));
    }

    let mut remaining = rand::thread_rng().gen_range(0.0..total);
    for (worker, weight) in eligible.iter().zip(&weights) {
        if remaining < *weight {
            return Some(Arc::clone(worker));
        }
        remaining -= weight;
    }

    // Float rounding can leave the cursor past the last bucket.
    eligible.last().map(|w| Arc::clone(w))
}
