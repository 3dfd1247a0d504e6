//! HTTP front end and process wiring for profile-harvest.

pub mod http;

pub use http::{HarvestServer, ServerState};
