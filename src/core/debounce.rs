//! Keyed debounce timers - collapse bursts of changes into one trailing event.
//!
//! When state changes rapidly (scrubbing, zoom drags, typing a filter), we
//! don't want a render per change. Instead each key gets one pending deadline:
//! 1. `schedule()` (re)arms the key's timer; a newer change resets it
//! 2. `due()` in the update loop returns keys whose timer elapsed
//!
//! Re-scheduling IS the cancellation mechanism. There are no tokens.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Delay scaled by track density: `base * max(1, log10(entry_count))`.
///
/// Dense tracks cost more per render, so they get a longer coalescing window.
pub fn density_scaled(base: Duration, entry_count: usize) -> Duration {
    let factor = (entry_count.max(1) as f64).log10();
    if factor <= 1.0 {
        return base;
    }
    base.mul_f64(factor)
}

/// Debounce timers keyed by `K`.
///
/// # Usage
/// ```ignore
/// // On change:
/// timers.schedule((track_id, SignalGroup::Scale), delay);
///
/// // In update loop:
/// for (track_id, group) in timers.due() {
///     dispatch(track_id, group);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Debouncer<K> {
    /// Pending key -> trigger time
    pending: HashMap<K, Instant>,
}

impl<K> Default for Debouncer<K> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone + std::fmt::Debug> Debouncer<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer for `key`
    pub fn schedule(&mut self, key: K, delay: Duration) {
        self.schedule_at(key, delay, Instant::now());
    }

    /// Arm relative to an explicit `now`
    pub fn schedule_at(&mut self, key: K, delay: Duration, now: Instant) {
        log::trace!("Debouncer: scheduled {:?} in {}ms", key, delay.as_millis());
        self.pending.insert(key, now + delay);
    }

    /// Cancel one pending key
    pub fn cancel(&mut self, key: &K) -> bool {
        let cancelled = self.pending.remove(key).is_some();
        if cancelled {
            log::trace!("Debouncer: cancelled {:?}", key);
        }
        cancelled
    }

    /// Cancel every pending key matching `pred`. Returns how many were dropped.
    pub fn cancel_where<F: Fn(&K) -> bool>(&mut self, pred: F) -> usize {
        let before = self.pending.len();
        self.pending.retain(|k, _| !pred(k));
        before - self.pending.len()
    }

    /// Keys whose timers elapsed by now. Clears them.
    pub fn due(&mut self) -> Vec<K> {
        self.due_at(Instant::now())
    }

    /// Keys whose timers elapsed by `now`, earliest deadline first. Clears them.
    pub fn due_at(&mut self, now: Instant) -> Vec<K> {
        let mut ready: Vec<(K, Instant)> = self
            .pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(k, at)| (k.clone(), *at))
            .collect();
        ready.sort_by_key(|(_, at)| *at);
        for (k, _) in &ready {
            self.pending.remove(k);
        }
        ready.into_iter().map(|(k, _)| k).collect()
    }

    /// Take every pending key regardless of deadline
    pub fn drain(&mut self) -> Vec<K> {
        let mut all: Vec<(K, Instant)> = self.pending.drain().collect();
        all.sort_by_key(|(_, at)| *at);
        all.into_iter().map(|(k, _)| k).collect()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest pending deadline (for sleeping the update loop)
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }
}
