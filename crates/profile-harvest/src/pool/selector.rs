//! Composite scoring and weighted-random selection.
//!
//! ```text
//! score = 0.5 * success_rate
//!       + 0.3 * 1 / (speed + 0.1)
//!       + 0.1 * min(idle_hours, 24)
//!       + 0.1 * origin_priority
//! ```
//!
//! Candidates are ranked by score and one of the top three is drawn uniformly
//! so load spreads instead of hammering the single best entry.

use chrono::{DateTime, Utc};
use rand::Rng;

use super::entry::IdentityEntry;
use super::store::PoolStore;

/// Size of the pool the final pick is drawn from.
pub const TOP_N: usize = 3;

const W_SUCCESS: f64 = 0.5;
const W_SPEED: f64 = 0.3;
const W_IDLE: f64 = 0.1;
const W_ORIGIN: f64 = 0.1;

/// Desirability of an entry; higher is better.
pub fn score(entry: &IdentityEntry, now: DateTime<Utc>) -> f64 {
    W_SUCCESS * entry.success_rate()
        + W_SPEED * (1.0 / (entry.speed + 0.1))
        + W_IDLE * entry.idle_hours(now)
        + W_ORIGIN * entry.origin.priority()
}

impl PoolStore {
    /// Pick an active entry whose address differs from `exclude`.
    ///
    /// The winner's `last_used_at` is stamped before any request is made, so
    /// concurrent selections are nudged away from it while it is in flight.
    pub fn select_best<R: Rng>(
        &mut self,
        exclude: Option<&str>,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Option<IdentityEntry> {
        let mut ranked: Vec<(f64, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.active && exclude.map_or(true, |x| e.address != x))
            .map(|(idx, e)| (score(e, now), idx))
            .collect();

        if ranked.is_empty() {
            tracing::warn!("no active identities available");
            return None;
        }

        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        let top = ranked.len().min(TOP_N);
        let (_, idx) = ranked[rng.gen_range(0..top)];

        let entry = &mut self.entries[idx];
        entry.last_used_at = now;
        if let Some(record) = self.user_records.get_mut(&entry.address) {
            record.last_used_at = now;
        }
        Some(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::entry::Origin;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn store_with(addresses: &[&str]) -> PoolStore {
        let now = Utc::now();
        let mut store = PoolStore::new(100);
        for addr in addresses {
            store.add_entry(addr, 8080, "DE", Origin::SeededStatic, now);
        }
        store
    }

    #[test]
    fn test_score_formula() {
        let now = Utc::now();
        let mut entry = IdentityEntry::new("1.1.1.1", 80, "", Origin::CallerSourced, now);
        entry.success_count = 3;
        entry.failure_count = 1;
        entry.speed = 0.4;
        // 0.5*0.75 + 0.3*2 + 0.1*1 + 0.1*2
        let expected = 0.375 + 0.6 + 0.1 + 0.2;
        assert!((score(&entry, now) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_pool_returns_none() {
        let mut store = PoolStore::new(10);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(store.select_best(None, &mut rng, Utc::now()).is_none());
    }

    #[test]
    fn test_inactive_entries_are_skipped() {
        let mut store = store_with(&["1.1.1.1", "2.2.2.2"]);
        store.entries[0].active = false;
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let picked = store.select_best(None, &mut rng, Utc::now()).unwrap();
            assert_eq!(picked.address, "2.2.2.2");
        }
    }

    #[test]
    fn test_exclude_address_never_returned() {
        let mut store = store_with(&["1.1.1.1", "2.2.2.2", "3.3.3.3"]);
        store.add_entry("1.1.1.1", 3128, "DE", Origin::ExternallyImported, Utc::now());
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let picked = store
                .select_best(Some("1.1.1.1"), &mut rng, Utc::now())
                .unwrap();
            assert_ne!(picked.address, "1.1.1.1");
        }
    }

    #[test]
    fn test_only_excluded_candidate_yields_none() {
        let mut store = store_with(&["1.1.1.1"]);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(store
            .select_best(Some("1.1.1.1"), &mut rng, Utc::now())
            .is_none());
    }

    #[test]
    fn test_selection_stamps_last_used() {
        let now = Utc::now();
        let mut store = PoolStore::new(10);
        store.get_or_create_caller("10.0.0.1", None, now - Duration::hours(2));
        let mut rng = StdRng::seed_from_u64(9);
        let picked = store.select_best(None, &mut rng, now).unwrap();
        assert_eq!(picked.last_used_at, now);
        assert_eq!(store.entries()[0].last_used_at, now);
        assert_eq!(store.user_record("10.0.0.1").unwrap().last_used_at, now);
    }

    #[test]
    fn test_draws_stay_within_top_three() {
        let now = Utc::now();
        let addrs = ["1.1.1.1", "2.2.2.2", "3.3.3.3", "4.4.4.4", "5.5.5.5"];
        let mut base = store_with(&addrs);
        // Distinct speeds give distinct scores; 1.1.1.1 is fastest.
        for (i, entry) in base.entries.iter_mut().enumerate() {
            entry.speed = 0.5 + i as f64;
        }

        let mut rng = StdRng::seed_from_u64(2024);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..1000 {
            // Fresh copy each draw so the recency stamp does not reorder ranks.
            let mut store = base.clone();
            let picked = store.select_best(None, &mut rng, now).unwrap();
            *counts.entry(picked.address).or_default() += 1;
        }

        assert!(counts.keys().all(|a| ["1.1.1.1", "2.2.2.2", "3.3.3.3"].contains(&a.as_str())));
        assert!(counts.values().all(|&c| c < 1000));
        assert_eq!(counts.len(), 3);
    }
}
