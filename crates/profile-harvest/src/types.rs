//! Normalized profile records and caller-facing outcome shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Marker used for `used_identity` when no identity was involved.
pub const DIRECT_IDENTITY: &str = "direct";

/// Descriptive fields of a profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileIdentity {
    pub username: String,
    pub full_name: String,
    pub biography: String,
    pub external_url: String,
    pub is_private: bool,
    pub is_verified: bool,
    pub profile_pic_url: String,
}

/// Audience counters of a profile.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileStatistics {
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
}

/// The normalized record every strategy produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub identity: ProfileIdentity,
    pub statistics: ProfileStatistics,
}

/// Successful extraction, annotated by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileResult {
    pub identity: ProfileIdentity,
    pub statistics: ProfileStatistics,
    pub extraction_time_ms: u64,
    pub data_points: usize,
    pub cached: bool,
    pub used_identity: String,
}

/// Failed extraction as reported to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[error("{error}: {message}")]
pub struct ScrapeFailure {
    pub error: ErrorKind,
    pub message: String,
    pub used_identity: String,
}

impl ScrapeFailure {
    pub fn new(error: ErrorKind, message: impl Into<String>, used_identity: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            used_identity: used_identity.into(),
        }
    }
}

/// Result of `scrape_profile`.
pub type ScrapeOutcome = Result<ProfileResult, ScrapeFailure>;

/// Health of the extraction path as seen by a single probe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeStatus {
    Operational,
    Degraded,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionStatus {
    pub status: ProbeStatus,
    pub message: String,
    pub used_identity: String,
    pub timestamp: DateTime<Utc>,
}
