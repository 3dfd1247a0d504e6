//! Adaptive outbound identity pool.
//!
//! One [`PoolStore`] behind one async mutex. Every read-modify-write
//! (insertion, selection, feedback, sweep, import) takes the lock for a short
//! in-memory step; network I/O always happens outside it.

pub mod entry;
pub mod feedback;
pub mod refresher;
pub mod selector;
pub mod store;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::config::PoolConfig;

pub use entry::{IdentityEntry, Origin, UserIdentityRecord};
pub use refresher::{RefreshReport, Refresher};
pub use store::{PoolStats, PoolStore};

/// Cloneable handle to the shared pool.
#[derive(Clone)]
pub struct IdentityPool {
    store: Arc<Mutex<PoolStore>>,
}

impl IdentityPool {
    pub fn new(max_user_records: usize) -> Self {
        Self {
            store: Arc::new(Mutex::new(PoolStore::new(max_user_records))),
        }
    }

    /// Build a pool loaded with the configured seed identities.
    pub fn from_config(config: &PoolConfig) -> Self {
        let mut store = PoolStore::new(config.max_user_records);
        let now = Utc::now();
        for seed in &config.seeds {
            if !store.contains(&seed.address, seed.port) {
                store.add_entry(&seed.address, seed.port, &seed.country, Origin::SeededStatic, now);
            }
        }
        tracing::info!("identity pool initialized with {} seed entries", store.len());
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub async fn add_entry(&self, address: &str, port: u16, country: &str, origin: Origin) {
        let mut store = self.store.lock().await;
        store.add_entry(address, port, country, origin, Utc::now());
    }

    /// Select an identity, or `None` when no active entry qualifies.
    pub async fn get_best(&self, exclude: Option<&str>) -> Option<IdentityEntry> {
        let mut store = self.store.lock().await;
        store.select_best(exclude, &mut rand::thread_rng(), Utc::now())
    }

    pub async fn get_or_create_for_address(
        &self,
        address: &str,
        user_agent: Option<&str>,
    ) -> IdentityEntry {
        let mut store = self.store.lock().await;
        store.get_or_create_caller(address, user_agent, Utc::now())
    }

    pub async fn record_outcome(&self, address: &str, success: bool, latency_secs: f64) {
        let mut store = self.store.lock().await;
        store.record_outcome(address, success, latency_secs, Utc::now());
    }

    pub async fn import_external(&self, pairs: &[(String, u16)]) -> usize {
        let mut store = self.store.lock().await;
        store.import_external(pairs, Utc::now())
    }

    pub async fn cleanup_sweep(&self) -> usize {
        let mut store = self.store.lock().await;
        store.cleanup_sweep(Utc::now())
    }

    pub async fn mark_refreshed(&self) {
        self.store.lock().await.mark_refreshed(Utc::now());
    }

    pub async fn stats(&self) -> PoolStats {
        self.store.lock().await.stats()
    }

    /// Copy of every tracked entry.
    pub async fn snapshot(&self) -> Vec<IdentityEntry> {
        self.store.lock().await.entries().to_vec()
    }

    pub async fn user_record(&self, address: &str) -> Option<UserIdentityRecord> {
        self.store.lock().await.user_record(address).cloned()
    }
}
