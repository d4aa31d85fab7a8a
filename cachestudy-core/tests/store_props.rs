//! Property tests for the TTL store.

use proptest::prelude::*;

use cachestudy_core::{RemainingTtl, SimRng, SimTime, TtlStore};

proptest! {
    /// set followed by get at the same instant returns the value, for
    /// any positive TTL.
    #[test]
    fn set_then_get_at_same_time(
        key in 0u64..10_000,
        ttl in 0.001f64..1e9,
        now in 0.0f64..1e9,
    ) {
        let mut store = TtlStore::new(1e12);
        let now = SimTime::from_millis(now);
        store.set(key, "payload".to_string(), Some(ttl), now);
        prop_assert_eq!(store.get(key, now), Some("payload"));
    }

    /// A value is visible strictly before its deadline and invisible
    /// from the deadline on.
    #[test]
    fn visibility_matches_deadline(
        key in 0u64..10_000,
        ttl in 1.0f64..1e6,
        probe_offset in 0.0f64..2e6,
    ) {
        let mut store = TtlStore::new(1e12);
        store.set(key, "payload".to_string(), Some(ttl), SimTime::ZERO);

        let probe = SimTime::from_millis(probe_offset);
        let expected = if probe_offset < ttl { Some("payload") } else { None };
        prop_assert_eq!(store.get(key, probe), expected);
    }

    /// remaining_ttl is NotFound before any set, Remaining(expires - now)
    /// while live, Expired afterwards.
    #[test]
    fn remaining_ttl_three_way(
        key in 0u64..10_000,
        ttl in 1.0f64..1e6,
        probe_offset in 0.0f64..2e6,
    ) {
        let mut store = TtlStore::new(1e12);
        let probe = SimTime::from_millis(probe_offset);
        prop_assert_eq!(store.remaining_ttl(key, probe), RemainingTtl::NotFound);

        store.set(key, "payload".to_string(), Some(ttl), SimTime::ZERO);
        match store.remaining_ttl(key, probe) {
            RemainingTtl::Remaining(left) => {
                prop_assert!(probe_offset < ttl);
                prop_assert!((left - (ttl - probe_offset)).abs() < 1e-9);
            }
            RemainingTtl::Expired => prop_assert!(probe_offset >= ttl),
            RemainingTtl::NotFound => prop_assert!(false, "entry vanished"),
        }
    }

    /// Deleted keys behave as never set.
    #[test]
    fn delete_makes_key_absent(
        key in 0u64..10_000,
        ttl in 1.0f64..1e6,
    ) {
        let mut store = TtlStore::new(1e12);
        store.set(key, "payload".to_string(), Some(ttl), SimTime::ZERO);
        prop_assert!(store.delete(key));

        prop_assert_eq!(store.get(key, SimTime::ZERO), None);
        prop_assert_eq!(store.remaining_ttl(key, SimTime::ZERO), RemainingTtl::NotFound);
    }

    /// invalidate_fraction(0) is a no-op and invalidate_fraction(1)
    /// empties the store, regardless of contents or seed.
    #[test]
    fn invalidate_fraction_extremes(
        population in 0usize..200,
        seed in any::<u64>(),
    ) {
        let mut store = TtlStore::new(1e12);
        let mut rng = SimRng::from_seed(seed);
        for key in 0..population as u64 {
            store.set(key, "payload".to_string(), Some(1e6), SimTime::ZERO);
        }

        prop_assert_eq!(store.invalidate_fraction(0.0, &mut rng), 0);
        prop_assert_eq!(store.len(), population);

        prop_assert_eq!(store.invalidate_fraction(1.0, &mut rng), population);
        prop_assert!(store.is_empty());
    }

    /// The store agrees with a naive model over arbitrary op sequences
    /// at increasing times.
    #[test]
    fn store_matches_model(
        ops in prop::collection::vec(
            (0u64..20, 0.0f64..500.0, prop::bool::ANY),
            1..50,
        ),
    ) {
        let mut store = TtlStore::new(1e12);
        let mut model: std::collections::HashMap<u64, f64> = std::collections::HashMap::new();
        let mut now_ms = 0.0;

        for (key, ttl_or_gap, is_set) in ops {
            now_ms += 1.0;
            let now = SimTime::from_millis(now_ms);
            if is_set {
                let ttl = ttl_or_gap + 0.001;
                store.set(key, format!("v{key}"), Some(ttl), now);
                model.insert(key, now_ms + ttl);
            } else {
                store.delete(key);
                model.remove(&key);
            }

            for probe_key in 0u64..20 {
                let expected_live = model
                    .get(&probe_key)
                    .is_some_and(|expires| *expires > now_ms);
                prop_assert_eq!(
                    store.get(probe_key, now).is_some(),
                    expected_live,
                    "key {} at t={}", probe_key, now_ms
                );
            }
        }
    }
}
