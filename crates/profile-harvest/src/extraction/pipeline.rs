//! Ordered strategy fallback with per-attempt performance feedback.

use std::time::Instant;

use serde_json::json;

use super::counts::count_data_points;
use super::strategies::Strategy;
use crate::error::ErrorKind;
use crate::pool::{IdentityEntry, IdentityPool};
use crate::types::{Profile, ProfileResult, ScrapeFailure, ScrapeOutcome};

/// Runs strategies in order until one produces a profile.
///
/// Any strategy error, including definitive ones such as a private profile,
/// falls through to the next strategy. Every attempt is reported to the pool
/// under the identity's address.
pub struct ExtractionPipeline {
    strategies: Vec<Box<dyn Strategy>>,
    pool: IdentityPool,
}

impl ExtractionPipeline {
    pub fn new(strategies: Vec<Box<dyn Strategy>>, pool: IdentityPool) -> Self {
        Self { strategies, pool }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn extract(
        &self,
        target: &str,
        identity: &IdentityEntry,
        user_agent: Option<&str>,
    ) -> ScrapeOutcome {
        let started = Instant::now();

        for strategy in &self.strategies {
            let outcome = strategy.attempt(target, identity, user_agent).await;
            let latency = outcome.elapsed.as_secs_f64();

            match outcome.result {
                Ok(profile) => {
                    self.pool.record_outcome(&identity.address, true, latency).await;
                    tracing::debug!(
                        "{} succeeded for {target} via {}",
                        strategy.name(),
                        identity.address
                    );
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    return Ok(annotate(profile, elapsed_ms, &identity.address));
                }
                Err(kind) => {
                    self.pool.record_outcome(&identity.address, false, latency).await;
                    tracing::debug!(
                        "{} failed for {target} via {}: {kind}",
                        strategy.name(),
                        identity.address
                    );
                }
            }
        }

        tracing::info!("all strategies exhausted for {target}");
        Err(ScrapeFailure::new(
            ErrorKind::ScrapingFailed,
            format!("all extraction strategies failed for {target}"),
            identity.address.clone(),
        ))
    }
}

fn annotate(profile: Profile, extraction_time_ms: u64, used_identity: &str) -> ProfileResult {
    let data_points = count_data_points(&json!({
        "identity": profile.identity,
        "statistics": profile.statistics,
        "extraction_time_ms": extraction_time_ms,
    }));

    ProfileResult {
        identity: profile.identity,
        statistics: profile.statistics,
        extraction_time_ms,
        data_points,
        cached: false,
        used_identity: used_identity.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::extraction::strategies::StrategyOutcome;
    use crate::pool::Origin;
    use crate::types::{ProfileIdentity, ProfileStatistics};

    struct Fixed {
        name: &'static str,
        result: Result<Profile, ErrorKind>,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn new(name: &'static str, result: Result<Profile, ErrorKind>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    result,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Strategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt(&self, _: &str, _: &IdentityEntry, _: Option<&str>) -> StrategyOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StrategyOutcome {
                result: self.result.clone(),
                elapsed: Duration::from_millis(200),
            }
        }
    }

    fn profile(username: &str) -> Profile {
        Profile {
            identity: ProfileIdentity {
                username: username.to_string(),
                ..ProfileIdentity::default()
            },
            statistics: ProfileStatistics {
                followers: 10,
                following: 2,
                posts: 1,
            },
        }
    }

    async fn pool_with_identity() -> (IdentityPool, IdentityEntry) {
        let pool = IdentityPool::new(10);
        pool.add_entry("9.9.9.9", 8080, "US", Origin::SeededStatic).await;
        let identity = pool.get_best(None).await.unwrap();
        (pool, identity)
    }

    #[tokio::test]
    async fn test_private_page_falls_through_to_endpoint() {
        let (pool, identity) = pool_with_identity().await;
        let (a, _) = Fixed::new("a", Err(ErrorKind::PrivateProfile));
        let (b, _) = Fixed::new("b", Ok(profile("alice")));
        let pipeline = ExtractionPipeline::new(vec![Box::new(a), Box::new(b)], pool.clone());

        let result = pipeline.extract("alice", &identity, None).await.unwrap();
        assert_eq!(result.identity.username, "alice");
        assert_eq!(result.used_identity, "9.9.9.9");
        assert!(!result.cached);
        assert_eq!(result.data_points, 13);

        let entry = pool.snapshot().await.remove(0);
        assert_eq!(entry.failure_count, 1);
        assert_eq!(entry.success_count, 1);
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let (pool, identity) = pool_with_identity().await;
        let (a, _) = Fixed::new("a", Ok(profile("bob")));
        let (b, b_calls) = Fixed::new("b", Ok(profile("other")));
        let pipeline = ExtractionPipeline::new(vec![Box::new(a), Box::new(b)], pool.clone());

        let result = pipeline.extract("bob", &identity, None).await.unwrap();
        assert_eq!(result.identity.username, "bob");
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);

        let entry = pool.snapshot().await.remove(0);
        assert_eq!(entry.success_count, 1);
        assert!((entry.speed - (0.7 + 0.3 * 0.2)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_selected_identity() {
        let (pool, identity) = pool_with_identity().await;
        let (a, _) = Fixed::new("a", Err(ErrorKind::RequestFailed));
        let (b, _) = Fixed::new("b", Err(ErrorKind::UserNotFound));
        let pipeline = ExtractionPipeline::new(vec![Box::new(a), Box::new(b)], pool.clone());

        let failure = pipeline.extract("ghost", &identity, None).await.unwrap_err();
        assert_eq!(failure.error, ErrorKind::ScrapingFailed);
        assert_eq!(failure.used_identity, "9.9.9.9");
        assert_eq!(pool.snapshot().await[0].failure_count, 2);
    }

    #[test]
    fn test_strategy_names_in_order() {
        let (a, _) = Fixed::new("first", Err(ErrorKind::ParseFailed));
        let (b, _) = Fixed::new("second", Err(ErrorKind::ApiFailed));
        let pipeline = ExtractionPipeline::new(vec![Box::new(a), Box::new(b)], IdentityPool::new(1));
        assert_eq!(pipeline.strategy_names(), vec!["first", "second"]);
    }
}
