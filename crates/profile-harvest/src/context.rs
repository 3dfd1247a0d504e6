//! The process-wide harvester context.
//!
//! One [`Harvester`] owns the identity pool, the extraction pipeline and the
//! result cache. It is built once at startup and shared by handle with the
//! request handlers and the background refresher.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::cache::ResultCache;
use crate::config::HarvestConfig;
use crate::error::{ErrorKind, HarvestResult};
use crate::extraction::{default_strategies, ExtractionPipeline, Strategy};
use crate::http_client::HttpClient;
use crate::pool::{IdentityPool, PoolStats, Refresher};
use crate::types::{ConnectionStatus, ProbeStatus, ScrapeFailure, ScrapeOutcome, DIRECT_IDENTITY};

pub struct Harvester {
    pool: IdentityPool,
    pipeline: ExtractionPipeline,
    cache: Mutex<ResultCache>,
    client: HttpClient,
    config: HarvestConfig,
}

impl Harvester {
    /// Build a harvester with the default strategy chain.
    pub fn new(config: HarvestConfig) -> HarvestResult<Self> {
        config.validate()?;
        let client = HttpClient::new(&config.extraction)?;
        let strategies = default_strategies(&client, &config.extraction);
        Self::assemble(config, client, strategies)
    }

    /// Build a harvester around a custom strategy chain.
    pub fn with_strategies(
        config: HarvestConfig,
        strategies: Vec<Box<dyn Strategy>>,
    ) -> HarvestResult<Self> {
        config.validate()?;
        let client = HttpClient::new(&config.extraction)?;
        Self::assemble(config, client, strategies)
    }

    fn assemble(
        config: HarvestConfig,
        client: HttpClient,
        strategies: Vec<Box<dyn Strategy>>,
    ) -> HarvestResult<Self> {
        let pool = IdentityPool::from_config(&config.pool);
        let pipeline = ExtractionPipeline::new(strategies, pool.clone());
        tracing::info!(
            "harvester ready: strategies={:?} cache_ttl={}s",
            pipeline.strategy_names(),
            config.cache.ttl_secs
        );

        Ok(Self {
            cache: Mutex::new(ResultCache::from_config(&config.cache)),
            pool,
            pipeline,
            client,
            config,
        })
    }

    pub fn pool(&self) -> &IdentityPool {
        &self.pool
    }

    /// Extract a profile on behalf of a caller.
    ///
    /// A fresh cached result is returned without touching the pool. Otherwise
    /// the caller's address is registered as an identity, the best identity is
    /// selected, and the pipeline runs. Only successes are cached.
    pub async fn scrape_profile(
        &self,
        target: &str,
        caller_address: &str,
        user_agent: Option<&str>,
    ) -> ScrapeOutcome {
        let target = target.trim();

        if let Some(hit) = self.cache.lock().await.get(target) {
            tracing::debug!("cache hit for {target}");
            return Ok(hit);
        }

        let caller = caller_address.trim();
        if !caller.is_empty() {
            self.pool.get_or_create_for_address(caller, user_agent).await;
        }

        let Some(identity) = self.pool.get_best(None).await else {
            return Err(ScrapeFailure::new(
                ErrorKind::NoIdentityAvailable,
                "identity pool has no active entries",
                DIRECT_IDENTITY,
            ));
        };

        let outcome = self.pipeline.extract(target, &identity, user_agent).await;
        if let Ok(result) = &outcome {
            self.cache.lock().await.put(target, result.clone());
        }
        outcome
    }

    pub async fn pool_stats(&self) -> PoolStats {
        self.pool.stats().await
    }

    /// A refresher bound to this harvester's pool.
    pub fn refresher(&self) -> HarvestResult<Refresher> {
        Refresher::new(self.pool.clone(), &self.config.refresh)
    }

    /// Spawn the refresh loop, or `None` when refreshing is disabled.
    pub fn spawn_refresher(&self, shutdown: Arc<Notify>) -> HarvestResult<Option<JoinHandle<()>>> {
        if !self.config.refresh.enabled {
            tracing::info!("identity refresh disabled");
            return Ok(None);
        }
        Ok(Some(self.refresher()?.spawn(shutdown)))
    }

    /// Issue one page request for the probe target and classify the result.
    pub async fn probe(&self, caller_address: Option<&str>) -> ConnectionStatus {
        let identity = caller_address
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(DIRECT_IDENTITY);
        let url = self.config.extraction.page_url(&self.config.extraction.probe_target);

        let (status, message) = match self.client.get_as(&url, identity, None).await {
            Ok(resp) if resp.status == 200 => {
                (ProbeStatus::Operational, "connection healthy".to_string())
            }
            Ok(resp) => (
                ProbeStatus::Degraded,
                format!("received status {}", resp.status),
            ),
            Err(e) => (ProbeStatus::Offline, format!("connection failed: {e}")),
        };
        tracing::info!("probe via {identity}: {status:?}");

        ConnectionStatus {
            status,
            message,
            used_identity: identity.to_string(),
            timestamp: Utc::now(),
        }
    }
}
