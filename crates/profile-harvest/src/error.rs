//! Error types for the identity pool and the extraction pipeline.

use serde::{Deserialize, Serialize};

/// Typed outcome of a failed extraction step.
///
/// Per-strategy kinds never reach the caller on their own; the pipeline only
/// surfaces [`ErrorKind::ScrapingFailed`] (all strategies exhausted) or
/// [`ErrorKind::NoIdentityAvailable`] (nothing to select).
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[error("request failed")]
    RequestFailed,

    #[error("profile not found")]
    ProfileNotFound,

    #[error("profile is private")]
    PrivateProfile,

    #[error("user not found")]
    UserNotFound,

    #[error("structured endpoint failed")]
    ApiFailed,

    #[error("response could not be parsed")]
    ParseFailed,

    #[error("no active identity available")]
    NoIdentityAvailable,

    #[error("all extraction strategies failed")]
    ScrapingFailed,
}

/// Infrastructure errors: HTTP transport, decoding, configuration.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;
