//! Periodic import of external identity lists.
//!
//! Each cycle fetches every configured list source, parses `address:port`
//! lines, adds previously unseen pairs to the pool, then sweeps stale
//! caller-sourced identities. A failing source is logged and skipped; a
//! failing cycle never stops the loop.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use super::IdentityPool;
use crate::config::RefreshConfig;
use crate::error::{HarvestError, HarvestResult};

/// Maximum list sources fetched at once.
const SOURCE_CONCURRENCY: usize = 4;

/// Summary of one refresh cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshReport {
    pub added: usize,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub swept: usize,
}

/// Background importer for externally sourced identities.
#[derive(Clone)]
pub struct Refresher {
    pool: IdentityPool,
    client: reqwest::Client,
    sources: Vec<String>,
    interval: Duration,
}

impl Refresher {
    pub fn new(pool: IdentityPool, config: &RefreshConfig) -> HarvestResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.source_timeout_secs))
            .build()?;

        Ok(Self {
            pool,
            client,
            sources: config.sources.clone(),
            interval: Duration::from_secs(config.interval_secs),
        })
    }

    /// Run one full cycle: fetch all sources, import, sweep.
    pub async fn run_cycle(&self) -> RefreshReport {
        tracing::info!("refreshing identity pool from {} sources", self.sources.len());

        let fetched: Vec<(String, HarvestResult<Vec<(String, u16)>>)> =
            stream::iter(self.sources.iter().cloned())
                .map(|url| {
                    let client = self.client.clone();
                    async move {
                        let result = fetch_source(&client, &url).await;
                        (url, result)
                    }
                })
                .buffer_unordered(SOURCE_CONCURRENCY)
                .collect()
                .await;

        let mut report = RefreshReport::default();
        let mut pairs = Vec::new();
        for (url, result) in fetched {
            match result {
                Ok(mut parsed) => {
                    tracing::debug!("fetched {} identities from {url}", parsed.len());
                    report.sources_ok += 1;
                    pairs.append(&mut parsed);
                }
                Err(e) => {
                    tracing::warn!("failed to fetch identities from {url}: {e}");
                    report.sources_failed += 1;
                }
            }
        }

        report.added = self.pool.import_external(&pairs).await;
        report.swept = self.pool.cleanup_sweep().await;
        self.pool.mark_refreshed().await;

        tracing::info!(
            "refresh added {} new identities ({} sources ok, {} failed, {} swept)",
            report.added,
            report.sources_ok,
            report.sources_failed,
            report.swept
        );
        report
    }

    /// Spawn the refresh loop until `shutdown` is notified.
    ///
    /// The loop sleeps a full interval before each cycle, so cycles never
    /// overlap.
    pub fn spawn(self, shutdown: Arc<Notify>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                "refresher started: interval={}s sources={}",
                self.interval.as_secs(),
                self.sources.len()
            );
            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        tracing::info!("refresher stopping");
                        break;
                    }
                    _ = tokio::time::sleep(self.interval) => {
                        self.run_cycle().await;
                    }
                }
            }
        })
    }
}

async fn fetch_source(client: &reqwest::Client, url: &str) -> HarvestResult<Vec<(String, u16)>> {
    let resp = client.get(url).send().await?;
    let status = resp.status().as_u16();
    if status != 200 {
        return Err(HarvestError::UnexpectedStatus {
            url: url.to_string(),
            status,
        });
    }
    let body = resp.text().await?;
    Ok(parse_address_list(&body))
}

/// Parse newline-delimited `address:port` tokens.
///
/// Only the first two colon-separated fields count. Lines without a colon,
/// with an empty address, or with a non-numeric port are skipped.
pub fn parse_address_list(body: &str) -> Vec<(String, u16)> {
    body.lines()
        .filter_map(|line| {
            let mut fields = line.trim().split(':');
            let address = fields.next()?.trim();
            let port = fields.next()?.trim().parse::<u16>().ok()?;
            if address.is_empty() {
                return None;
            }
            Some((address.to_string(), port))
        })
        .collect()
}
