//! In-memory identity collection and caller-sourced records.
//!
//! `PoolStore` is plain data: every method is synchronous and expects the
//! caller to hold the pool lock (see [`super::IdentityPool`]).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{pool_key, IdentityEntry, Origin, UserIdentityRecord, CALLER_PORT};

/// Caller-sourced entries idle longer than this are swept.
pub const SWEEP_MAX_IDLE_HOURS: i64 = 24;

/// Caller-sourced entries with more failures than this are swept.
pub const SWEEP_MAX_FAILURES: u64 = 10;

/// Snapshot of pool health.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolStats {
    pub total_entries: usize,
    pub active_entries: usize,
    pub caller_sourced_count: usize,
    pub external_count: usize,
    pub user_record_count: usize,
    pub success_rate_percent: f64,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// All tracked identities plus per-caller bookkeeping.
#[derive(Debug, Clone)]
pub struct PoolStore {
    pub(super) entries: Vec<IdentityEntry>,
    pub(super) user_records: HashMap<String, UserIdentityRecord>,
    max_user_records: usize,
    last_refresh: Option<DateTime<Utc>>,
}

impl PoolStore {
    pub fn new(max_user_records: usize) -> Self {
        Self {
            entries: Vec::new(),
            user_records: HashMap::new(),
            max_user_records,
            last_refresh: None,
        }
    }

    /// Insert a new entry. Uniqueness is the caller's responsibility.
    pub fn add_entry(
        &mut self,
        address: &str,
        port: u16,
        country: &str,
        origin: Origin,
        now: DateTime<Utc>,
    ) -> &IdentityEntry {
        self.entries
            .push(IdentityEntry::new(address, port, country, origin, now));
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[IdentityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, address: &str, port: u16) -> bool {
        self.entries
            .iter()
            .any(|e| e.address == address && e.port == port)
    }

    /// First entry with this address, regardless of origin.
    pub fn find_by_address(&self, address: &str) -> Option<&IdentityEntry> {
        self.entries.iter().find(|e| e.address == address)
    }

    pub fn user_record(&self, address: &str) -> Option<&UserIdentityRecord> {
        self.user_records.get(address)
    }

    pub fn user_record_count(&self) -> usize {
        self.user_records.len()
    }

    fn caller_entry_index(&self, address: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.origin == Origin::CallerSourced && e.address == address)
    }

    /// Return the caller-sourced entry for `address`, creating the entry and
    /// its bookkeeping record on first sight.
    pub fn get_or_create_caller(
        &mut self,
        address: &str,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> IdentityEntry {
        if let Some(idx) = self.caller_entry_index(address) {
            return self.entries[idx].clone();
        }

        self.user_records.insert(
            address.to_string(),
            UserIdentityRecord::new(address, user_agent.unwrap_or(""), now),
        );
        let entry = self
            .add_entry(address, CALLER_PORT, "UserIP", Origin::CallerSourced, now)
            .clone();
        tracing::info!("added caller identity to pool: {address}");

        if self.user_records.len() > self.max_user_records {
            self.cleanup_sweep(now);
            self.enforce_user_capacity(address);
        }

        entry
    }

    /// Add previously unseen `(address, port)` pairs as externally imported.
    /// Returns how many were added.
    pub fn import_external(&mut self, pairs: &[(String, u16)], now: DateTime<Utc>) -> usize {
        let mut known: HashSet<String> = self.entries.iter().map(IdentityEntry::key).collect();
        let mut added = 0;
        for (address, port) in pairs {
            if known.insert(pool_key(address, *port)) {
                self.add_entry(address, *port, "Unknown", Origin::ExternallyImported, now);
                added += 1;
            }
        }
        added
    }

    /// Remove caller-sourced entries idle for more than 24 hours or with more
    /// than 10 failures, along with their records. Returns how many went.
    pub fn cleanup_sweep(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(SWEEP_MAX_IDLE_HOURS);
        let doomed: HashSet<String> = self
            .entries
            .iter()
            .filter(|e| e.origin == Origin::CallerSourced)
            .filter(|e| e.last_used_at < cutoff || e.failure_count > SWEEP_MAX_FAILURES)
            .map(|e| e.address.clone())
            .collect();

        if doomed.is_empty() {
            return 0;
        }

        self.entries
            .retain(|e| !(e.origin == Origin::CallerSourced && doomed.contains(&e.address)));
        for address in &doomed {
            self.user_records.remove(address);
        }

        tracing::info!("cleaned up {} stale caller identities", doomed.len());
        doomed.len()
    }

    /// Evict least recently used caller records until back at capacity,
    /// never touching `keep`.
    fn enforce_user_capacity(&mut self, keep: &str) {
        while self.user_records.len() > self.max_user_records {
            let oldest = self
                .user_records
                .values()
                .filter(|r| r.address != keep)
                .min_by_key(|r| r.last_used_at)
                .map(|r| r.address.clone());

            let Some(address) = oldest else { break };
            self.user_records.remove(&address);
            self.entries
                .retain(|e| !(e.origin == Origin::CallerSourced && e.address == address));
            tracing::debug!("evicted caller identity over capacity: {address}");
        }
    }

    pub fn mark_refreshed(&mut self, now: DateTime<Utc>) {
        self.last_refresh = Some(now);
    }

    pub fn stats(&self) -> PoolStats {
        let total = self.entries.len();
        let active = self.entries.iter().filter(|e| e.active).count();
        let caller = self
            .entries
            .iter()
            .filter(|e| e.origin == Origin::CallerSourced)
            .count();

        let successes: u64 = self.entries.iter().map(|e| e.success_count).sum();
        let attempts: u64 = self
            .entries
            .iter()
            .map(|e| e.success_count + e.failure_count)
            .sum();
        let rate = if attempts > 0 {
            successes as f64 / attempts as f64 * 100.0
        } else {
            0.0
        };

        PoolStats {
            total_entries: total,
            active_entries: active,
            caller_sourced_count: caller,
            external_count: total - caller,
            user_record_count: self.user_records.len(),
            success_rate_percent: (rate * 10.0).round() / 10.0,
            last_refresh: self.last_refresh,
        }
    }
}
