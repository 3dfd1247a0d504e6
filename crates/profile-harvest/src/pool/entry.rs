//! Identity entries and caller-sourced bookkeeping records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Speed (smoothed latency, seconds) assigned to a fresh entry.
pub const INITIAL_SPEED: f64 = 1.0;

/// Port convention for caller-sourced entries, which are keyed by address.
pub const CALLER_PORT: u16 = 80;

/// How an identity entered the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    SeededStatic,
    CallerSourced,
    ExternallyImported,
}

impl Origin {
    /// Selection weight: caller-sourced identities are least likely to be
    /// rate limited globally.
    pub fn priority(self) -> f64 {
        match self {
            Origin::CallerSourced => 2.0,
            Origin::SeededStatic | Origin::ExternallyImported => 1.0,
        }
    }
}

/// An outbound identity tracked with performance statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityEntry {
    pub address: String,
    pub port: u16,
    pub country: String,
    pub origin: Origin,
    pub last_used_at: DateTime<Utc>,
    pub success_count: u64,
    pub failure_count: u64,
    pub active: bool,
    /// Exponential moving average of observed latency, in seconds.
    pub speed: f64,
}

impl IdentityEntry {
    /// A fresh, active entry that looks an hour idle so it is eligible
    /// immediately without appearing artificially fresh.
    pub fn new(address: &str, port: u16, country: &str, origin: Origin, now: DateTime<Utc>) -> Self {
        Self {
            address: address.to_string(),
            port,
            country: country.to_string(),
            origin,
            last_used_at: now - Duration::hours(1),
            success_count: 0,
            failure_count: 0,
            active: true,
            speed: INITIAL_SPEED,
        }
    }

    /// `address:port` deduplication key.
    pub fn key(&self) -> String {
        pool_key(&self.address, self.port)
    }

    /// Fraction of successful uses, in `[0, 1]`.
    pub fn success_rate(&self) -> f64 {
        let attempts = self.success_count + self.failure_count;
        self.success_count as f64 / attempts.max(1) as f64
    }

    /// Hours since last use, clamped to `[0, 24]`.
    pub fn idle_hours(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.last_used_at).num_milliseconds() as f64;
        (millis / 3_600_000.0).clamp(0.0, 24.0)
    }
}

pub fn pool_key(address: &str, port: u16) -> String {
    format!("{address}:{port}")
}

/// Bookkeeping for an identity observed from a caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserIdentityRecord {
    pub address: String,
    pub user_agent: String,
    pub added_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub success_count: u64,
    pub failure_count: u64,
    pub total_requests: u64,
    pub active: bool,
}

impl UserIdentityRecord {
    pub fn new(address: &str, user_agent: &str, now: DateTime<Utc>) -> Self {
        Self {
            address: address.to_string(),
            user_agent: user_agent.to_string(),
            added_at: now,
            last_used_at: now - Duration::hours(1),
            success_count: 0,
            failure_count: 0,
            total_requests: 0,
            active: true,
        }
    }
}
