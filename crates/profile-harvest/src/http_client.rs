//! Async HTTP client wrapping reqwest.
//!
//! Every request goes out with browser-like headers, a rotated user agent and
//! the chosen identity's address in the forwarding headers. No retries: one
//! call, one outcome for the scoring model.

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::ExtractionConfig;
use crate::error::HarvestResult;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

const BASE_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.9"),
    ("dnt", "1"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("cache-control", "max-age=0"),
];

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// HTTP client for the extraction strategies.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    throttle: (f64, f64),
}

impl HttpClient {
    pub fn new(config: &ExtractionConfig) -> HarvestResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            throttle: (config.throttle_min_secs, config.throttle_max_secs),
        })
    }

    /// Sleep a uniform random delay within the throttle window.
    pub async fn throttle(&self) {
        if let Some(delay) = self.throttle_delay() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Draw the next delay. `None` for an empty or unusable window.
    fn throttle_delay(&self) -> Option<Duration> {
        let (min, max) = self.throttle;
        if !min.is_finite() || !max.is_finite() || max <= 0.0 {
            return None;
        }
        let min = min.max(0.0);
        let secs = if max > min {
            rand::thread_rng().gen_range(min..max)
        } else {
            min
        };
        Some(Duration::from_secs_f64(secs))
    }

    /// GET `url` on behalf of `identity`.
    ///
    /// The identity address is injected as `X-Forwarded-For` and
    /// `X-Real-IP`. Without an explicit user agent one is drawn at random.
    pub async fn get_as(
        &self,
        url: &str,
        identity: &str,
        user_agent: Option<&str>,
    ) -> HarvestResult<HttpResponse> {
        let headers = request_headers(identity, user_agent);
        let resp = self.client.get(url).headers(headers).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        tracing::debug!("request to {url} via {identity} - status {status}");

        Ok(HttpResponse {
            status,
            body,
        })
    }
}

/// Pick one of the bundled desktop browser user agents.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

fn request_headers(identity: &str, user_agent: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for &(name, value) in BASE_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    let ua = user_agent
        .filter(|ua| !ua.trim().is_empty())
        .and_then(|ua| HeaderValue::from_str(ua).ok())
        .unwrap_or_else(|| HeaderValue::from_static(random_user_agent()));
    headers.insert(reqwest::header::USER_AGENT, ua);

    if let Ok(value) = HeaderValue::from_str(identity) {
        headers.insert(HeaderName::from_static("x-forwarded-for"), value.clone());
        headers.insert(HeaderName::from_static("x-real-ip"), value);
    }

    headers
}
