//! Configuration loading and resolution.
//!
//! Defaults reproduce the fixed constants of the harvester (30 minute refresh,
//! 15 second request timeout, 5 minute result cache). A JSON file can replace
//! any section, and `HARVEST_*` environment variables override single values
//! on top of that.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, HarvestResult};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "HARVEST_CONFIG";

const CWD_CONFIG: &str = "harvest.json";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarvestConfig {
    pub pool: PoolConfig,
    pub extraction: ExtractionConfig,
    pub refresh: RefreshConfig,
    pub cache: CacheConfig,
}

/// Identity pool settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on caller-sourced bookkeeping records.
    pub max_user_records: usize,
    /// Identities loaded at startup.
    pub seeds: Vec<SeedIdentity>,
}

/// A statically configured identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeedIdentity {
    pub address: String,
    pub port: u16,
    #[serde(default = "default_country")]
    pub country: String,
}

impl SeedIdentity {
    fn new(address: &str, port: u16, country: &str) -> Self {
        Self {
            address: address.to_string(),
            port,
            country: country.to_string(),
        }
    }
}

fn default_country() -> String {
    "Unknown".to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_user_records: 1000,
            seeds: vec![
                SeedIdentity::new("154.16.202.22", 3128, "DE"),
                SeedIdentity::new("154.16.202.97", 3128, "DE"),
                SeedIdentity::new("45.95.147.200", 8080, "DE"),
                SeedIdentity::new("43.153.2.120", 3128, "US"),
                SeedIdentity::new("45.95.147.218", 8080, "DE"),
            ],
        }
    }
}

/// Extraction pipeline and request discipline settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Rendered profile page; `{}` is replaced by the target.
    pub page_url_template: String,
    /// Structured-data endpoint; `{}` is replaced by the target.
    pub api_url_template: String,
    pub request_timeout_secs: u64,
    pub throttle_min_secs: f64,
    pub throttle_max_secs: f64,
    /// Target fetched by the connection probe.
    pub probe_target: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            page_url_template: "https://www.instagram.com/{}/".to_string(),
            api_url_template:
                "https://www.instagram.com/api/v1/users/web_profile_info/?username={}".to_string(),
            request_timeout_secs: 15,
            throttle_min_secs: 1.0,
            throttle_max_secs: 2.0,
            probe_target: "instagram".to_string(),
        }
    }
}

impl ExtractionConfig {
    pub fn page_url(&self, target: &str) -> String {
        self.page_url_template.replace("{}", &escape_target(target))
    }

    pub fn api_url(&self, target: &str) -> String {
        self.api_url_template.replace("{}", &escape_target(target))
    }
}

/// Percent-encode a target so it stays inside its path segment or query value.
fn escape_target(target: &str) -> String {
    url::form_urlencoded::byte_serialize(target.as_bytes()).collect()
}

/// Background refresher settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefreshConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub source_timeout_secs: u64,
    /// Newline-delimited `address:port` list endpoints.
    pub sources: Vec<String>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 1800,
            source_timeout_secs: 10,
            sources: vec![
                "https://api.proxyscrape.com/v2/?request=getproxies&protocol=http&timeout=10000&country=all&ssl=all&anonymity=all".to_string(),
                "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt".to_string(),
                "https://raw.githubusercontent.com/clarketm/proxy-list/master/proxy-list-raw.txt".to_string(),
            ],
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: 100,
        }
    }
}

/// Resolve the config file path: explicit, then `HARVEST_CONFIG`, then
/// `./harvest.json` when it exists.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if !env_path.trim().is_empty() {
            return Some(PathBuf::from(env_path.trim()));
        }
    }

    let cwd_config = PathBuf::from(CWD_CONFIG);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    None
}

impl HarvestConfig {
    /// Load from an optional JSON file, apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> HarvestResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file. Missing sections keep their defaults.
    pub fn from_file(path: &Path) -> HarvestResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HarvestError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `HARVEST_*` overrides. Values that do not parse are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string());

        if let Some(v) = read("HARVEST_REFRESH_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.refresh.interval_secs = v;
        }
        if let Some(v) = read("HARVEST_SOURCE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.refresh.source_timeout_secs = v;
        }
        if let Some(v) = read("HARVEST_REFRESH_ENABLED").and_then(|v| parse_bool(&v)) {
            self.refresh.enabled = v;
        }
        if let Some(v) = read("HARVEST_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.extraction.request_timeout_secs = v;
        }
        if let Some(v) = read("HARVEST_THROTTLE_MIN_SECS").and_then(|v| v.parse().ok()) {
            self.extraction.throttle_min_secs = v;
        }
        if let Some(v) = read("HARVEST_THROTTLE_MAX_SECS").and_then(|v| v.parse().ok()) {
            self.extraction.throttle_max_secs = v;
        }
        if let Some(v) = read("HARVEST_CACHE_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.cache.ttl_secs = v;
        }
        if let Some(v) = read("HARVEST_CACHE_MAX_ENTRIES").and_then(|v| v.parse().ok()) {
            self.cache.max_entries = v;
        }
        if let Some(v) = read("HARVEST_MAX_USER_RECORDS").and_then(|v| v.parse().ok()) {
            self.pool.max_user_records = v;
        }
    }

    pub fn validate(&self) -> HarvestResult<()> {
        let ex = &self.extraction;
        for (name, template) in [
            ("page_url_template", &ex.page_url_template),
            ("api_url_template", &ex.api_url_template),
        ] {
            if !template.contains("{}") {
                return Err(HarvestError::Config(format!(
                    "{name} must contain a {{}} placeholder"
                )));
            }
        }
        if !ex.throttle_min_secs.is_finite() || !ex.throttle_max_secs.is_finite() {
            return Err(HarvestError::Config(
                "throttle bounds must be finite".to_string(),
            ));
        }
        if ex.throttle_min_secs < 0.0 || ex.throttle_max_secs < 0.0 {
            return Err(HarvestError::Config(
                "throttle bounds must be non-negative".to_string(),
            ));
        }
        if ex.throttle_min_secs > ex.throttle_max_secs {
            return Err(HarvestError::Config(format!(
                "throttle_min_secs ({}) exceeds throttle_max_secs ({})",
                ex.throttle_min_secs, ex.throttle_max_secs
            )));
        }
        if ex.request_timeout_secs == 0 {
            return Err(HarvestError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.refresh.interval_secs == 0 {
            return Err(HarvestError::Config(
                "refresh interval_secs must be positive".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(HarvestError::Config(
                "cache max_entries must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
