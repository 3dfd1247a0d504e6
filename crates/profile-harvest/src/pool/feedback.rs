//! Outcome recording: success/failure counters and latency smoothing.

use chrono::{DateTime, Utc};

use super::entry::Origin;
use super::store::PoolStore;

/// Weight of the previous speed estimate in the moving average.
const SPEED_KEEP: f64 = 0.7;
/// Weight of the newly observed latency.
const SPEED_NEW: f64 = 0.3;

/// Failures above this deactivate an entry that has fewer than
/// [`DEACTIVATE_SUCCESS_FLOOR`] successes.
pub const DEACTIVATE_AFTER_FAILURES: u64 = 5;
pub const DEACTIVATE_SUCCESS_FLOOR: u64 = 3;

impl PoolStore {
    /// Record the result of one use of the identity at `address`.
    ///
    /// Unknown addresses are ignored. A caller-sourced entry wins over other
    /// entries sharing the address, and its caller record is updated in the
    /// same call so both views agree.
    pub fn record_outcome(
        &mut self,
        address: &str,
        success: bool,
        latency_secs: f64,
        now: DateTime<Utc>,
    ) {
        let idx = self
            .entries
            .iter()
            .position(|e| e.origin == Origin::CallerSourced && e.address == address)
            .or_else(|| self.entries.iter().position(|e| e.address == address));

        if let Some(entry) = idx.map(|i| &mut self.entries[i]) {
            if success {
                entry.success_count += 1;
                entry.speed = SPEED_KEEP * entry.speed + SPEED_NEW * latency_secs.max(0.0);
            } else {
                entry.failure_count += 1;
                if entry.active
                    && entry.failure_count > DEACTIVATE_AFTER_FAILURES
                    && entry.success_count < DEACTIVATE_SUCCESS_FLOOR
                {
                    entry.active = false;
                    tracing::info!(
                        "deactivated identity {} after {} failures",
                        entry.key(),
                        entry.failure_count
                    );
                }
            }
            entry.last_used_at = now;
        }

        if let Some(record) = self.user_records.get_mut(address) {
            if success {
                record.success_count += 1;
            } else {
                record.failure_count += 1;
            }
            record.total_requests += 1;
            record.last_used_at = now;
        }
    }
}
