//! The extraction strategies tried by the pipeline, in order.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::parsers::{parse_profile_page, parse_structured_response};
use crate::config::ExtractionConfig;
use crate::error::ErrorKind;
use crate::http_client::HttpClient;
use crate::pool::IdentityEntry;
use crate::types::Profile;

/// What one strategy attempt produced, and how long its request took.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub result: Result<Profile, ErrorKind>,
    pub elapsed: Duration,
}

/// One self-contained request + parse method.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(
        &self,
        target: &str,
        identity: &IdentityEntry,
        user_agent: Option<&str>,
    ) -> StrategyOutcome;
}

/// Fetches the rendered profile page and decodes it.
pub struct PageRenderStrategy {
    client: HttpClient,
    config: ExtractionConfig,
}

impl PageRenderStrategy {
    pub fn new(client: HttpClient, config: ExtractionConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Strategy for PageRenderStrategy {
    fn name(&self) -> &'static str {
        "page_render"
    }

    async fn attempt(
        &self,
        target: &str,
        identity: &IdentityEntry,
        user_agent: Option<&str>,
    ) -> StrategyOutcome {
        self.client.throttle().await;
        let url = self.config.page_url(target);
        let started = Instant::now();
        let response = self.client.get_as(&url, &identity.address, user_agent).await;
        let elapsed = started.elapsed();

        let result = match response {
            Ok(resp) if resp.status == 200 => parse_profile_page(&resp.body, target),
            Ok(resp) => {
                tracing::debug!("page request for {target} returned {}", resp.status);
                Err(ErrorKind::RequestFailed)
            }
            Err(e) => {
                tracing::debug!("page request for {target} failed: {e}");
                Err(ErrorKind::RequestFailed)
            }
        };
        StrategyOutcome { result, elapsed }
    }
}

/// Queries the structured-data endpoint and decodes its user object.
pub struct StructuredEndpointStrategy {
    client: HttpClient,
    config: ExtractionConfig,
}

impl StructuredEndpointStrategy {
    pub fn new(client: HttpClient, config: ExtractionConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Strategy for StructuredEndpointStrategy {
    fn name(&self) -> &'static str {
        "structured_endpoint"
    }

    async fn attempt(
        &self,
        target: &str,
        identity: &IdentityEntry,
        user_agent: Option<&str>,
    ) -> StrategyOutcome {
        self.client.throttle().await;
        let url = self.config.api_url(target);
        let started = Instant::now();
        let response = self.client.get_as(&url, &identity.address, user_agent).await;
        let elapsed = started.elapsed();

        let result = match response {
            Ok(resp) if resp.status == 200 => parse_structured_response(&resp.body, target),
            Ok(resp) => {
                tracing::debug!("endpoint request for {target} returned {}", resp.status);
                Err(ErrorKind::ApiFailed)
            }
            Err(e) => {
                tracing::debug!("endpoint request for {target} failed: {e}");
                Err(ErrorKind::ApiFailed)
            }
        };
        StrategyOutcome { result, elapsed }
    }
}

/// The default chain: rendered page first, structured endpoint second.
pub fn default_strategies(client: &HttpClient, config: &ExtractionConfig) -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(PageRenderStrategy::new(client.clone(), config.clone())),
        Box::new(StructuredEndpointStrategy::new(client.clone(), config.clone())),
    ]
}
