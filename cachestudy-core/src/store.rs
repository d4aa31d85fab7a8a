//! Keyed value store with per-entry expiration.
//!
//! Both tiers of the simulated system hold their data in a `TtlStore`.
//! Expiration is lazy: entries are never reaped on a timer, they simply
//! stop being visible to reads once their deadline passes. An expired
//! entry stays in the map until it is overwritten, deleted, or swept by
//! a bulk invalidation.

use std::collections::HashMap;

use crate::clock::{SimRng, SimTime};

/// Keys are plain integers drawn from the workload's key space.
pub type Key = u64;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: SimTime,
}

/// Result of a [`TtlStore::remaining_ttl`] probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemainingTtl {
    /// No entry exists for the key.
    NotFound,
    /// An entry exists but its deadline has passed.
    Expired,
    /// Milliseconds of lifetime left, strictly positive.
    Remaining(f64),
}

/// In-memory map from key to value with per-entry time-to-live.
#[derive(Debug)]
pub struct TtlStore {
    entries: HashMap<Key, Entry>,
    default_ttl_ms: f64,
}

impl TtlStore {
    /// Creates an empty store.
    ///
    /// `default_ttl_ms` applies to writes that pass no explicit TTL; in
    /// practice it is set to outlive the run so such entries never
    /// expire mid-simulation.
    pub fn new(default_ttl_ms: f64) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl_ms,
        }
    }

    /// Returns the live value for `key`, if any.
    ///
    /// An entry is live while `expires_at > now`. At the exact deadline
    /// the entry is already dead.
    pub fn get(&self, key: Key, now: SimTime) -> Option<&str> {
        self.entries
            .get(&key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.as_str())
    }

    /// Inserts or replaces the entry for `key`.
    ///
    /// `ttl_ms` of `None` uses the store default. A write always resets
    /// the deadline, so overwriting an expired entry revives the key.
    pub fn set(&mut self, key: Key, value: String, ttl_ms: Option<f64>, now: SimTime) {
        let ttl = ttl_ms.unwrap_or(self.default_ttl_ms);
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now.after(ttl),
            },
        );
    }

    /// Removes the entry for `key`. Returns whether one was present,
    /// expired or not.
    pub fn delete(&mut self, key: Key) -> bool {
        self.entries.remove(&key).is_some()
    }

    /// Reports the lifetime left for `key` at `now`.
    pub fn remaining_ttl(&self, key: Key, now: SimTime) -> RemainingTtl {
        match self.entries.get(&key) {
            None => RemainingTtl::NotFound,
            Some(entry) if entry.expires_at > now => {
                RemainingTtl::Remaining(entry.expires_at.since(now))
            }
            Some(_) => RemainingTtl::Expired,
        }
    }

    /// Drops each entry independently with probability `fraction`.
    ///
    /// Expired entries participate like live ones. Returns the number
    /// of entries removed.
    pub fn invalidate_fraction(&mut self, fraction: f64, rng: &mut SimRng) -> usize {
        let keys: Vec<Key> = self.entries.keys().copied().collect();
        let mut removed = 0;
        for key in keys {
            if rng.random_bool(fraction) {
                self.entries.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    /// Number of entries in the map, including expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: f64) -> SimTime {
        SimTime::from_millis(ms)
    }

    #[test]
    fn get_returns_live_entry() {
        let mut store = TtlStore::new(1_000.0);
        store.set(1, "hello".to_string(), Some(100.0), at(0.0));

        assert_eq!(store.get(1, at(50.0)), Some("hello"));
        assert_eq!(store.get(2, at(50.0)), None);
    }

    #[test]
    fn entry_dies_exactly_at_deadline() {
        let mut store = TtlStore::new(1_000.0);
        store.set(1, "v".to_string(), Some(100.0), at(0.0));

        assert_eq!(store.get(1, at(99.999)), Some("v"));
        assert_eq!(store.get(1, at(100.0)), None);
        assert_eq!(store.get(1, at(200.0)), None);
    }

    #[test]
    fn overwrite_resets_deadline() {
        let mut store = TtlStore::new(1_000.0);
        store.set(1, "old".to_string(), Some(10.0), at(0.0));
        assert_eq!(store.get(1, at(20.0)), None);

        store.set(1, "new".to_string(), Some(10.0), at(20.0));
        assert_eq!(store.get(1, at(25.0)), Some("new"));
    }

    #[test]
    fn default_ttl_applies_when_unspecified() {
        let mut store = TtlStore::new(500.0);
        store.set(1, "v".to_string(), None, at(0.0));

        assert_eq!(store.get(1, at(499.0)), Some("v"));
        assert_eq!(store.get(1, at(500.0)), None);
    }

    #[test]
    fn delete_removes_expired_entries_too() {
        let mut store = TtlStore::new(1_000.0);
        store.set(1, "v".to_string(), Some(10.0), at(0.0));

        assert!(store.delete(1));
        assert!(!store.delete(1));

        store.set(2, "w".to_string(), Some(10.0), at(0.0));
        // Past the deadline the entry is invisible to get but still present.
        assert_eq!(store.get(2, at(50.0)), None);
        assert!(store.delete(2));
    }

    #[test]
    fn remaining_ttl_distinguishes_absent_expired_live() {
        let mut store = TtlStore::new(1_000.0);
        assert_eq!(store.remaining_ttl(1, at(0.0)), RemainingTtl::NotFound);

        store.set(1, "v".to_string(), Some(100.0), at(0.0));
        assert_eq!(
            store.remaining_ttl(1, at(30.0)),
            RemainingTtl::Remaining(70.0)
        );
        assert_eq!(store.remaining_ttl(1, at(100.0)), RemainingTtl::Expired);
    }

    #[test]
    fn invalidate_fraction_full_sweep() {
        let mut store = TtlStore::new(1_000.0);
        let mut rng = SimRng::from_seed(1);
        for key in 0..100 {
            store.set(key, "v".to_string(), Some(10_000.0), at(0.0));
        }

        let removed = store.invalidate_fraction(1.0, &mut rng);
        assert_eq!(removed, 100);
        assert!(store.is_empty());
    }

    #[test]
    fn invalidate_fraction_zero_is_noop() {
        let mut store = TtlStore::new(1_000.0);
        let mut rng = SimRng::from_seed(1);
        for key in 0..100 {
            store.set(key, "v".to_string(), Some(10_000.0), at(0.0));
        }

        let removed = store.invalidate_fraction(0.0, &mut rng);
        assert_eq!(removed, 0);
        assert_eq!(store.len(), 100);
    }
}
