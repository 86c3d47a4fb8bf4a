//! Provider health metrics collection and reporting
//!
//! Tracks latency percentiles, success rates and rate-limit hits per provider.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// How a single provider request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Failure,
    RateLimited,
}

/// Metrics for a single provider
#[derive(Debug, Clone)]
pub struct ProviderMetrics {
    /// Name of the provider
    pub provider_name: String,
    /// 50th percentile latency of successful requests in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful requests in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of requests tracked
    pub total_requests: u64,
    /// Number of failed requests, rate-limited ones included
    pub failed_requests: u64,
    /// Number of 429 responses
    pub rate_limited_requests: u64,
}

impl ProviderMetrics {
    /// Creates metrics with no data
    pub fn empty(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            failed_requests: 0,
            rate_limited_requests: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    outcome: RequestOutcome,
}

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    failed: u64,
    rate_limited: u64,
}

/// Collects and computes metrics for one provider
pub struct MetricsCollector {
    provider_name: String,
    samples: RwLock<VecDeque<LatencySample>>,
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    /// Creates a new metrics collector for a provider
    pub fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            samples: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            counters: RwLock::new(Counters::default()),
        }
    }

    /// Records a request with its duration and outcome
    pub async fn record_request(&self, duration: Duration, outcome: RequestOutcome) {
        {
            let mut counters = self.counters.write().await;
            counters.total += 1;
            match outcome {
                RequestOutcome::Success => {}
                RequestOutcome::Failure => counters.failed += 1,
                RequestOutcome::RateLimited => {
                    counters.failed += 1;
                    counters.rate_limited += 1;
                }
            }
        }

        let mut samples = self.samples.write().await;
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            outcome,
        });
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> ProviderMetrics {
        let samples = self.samples.read().await;
        let counters = self.counters.read().await;

        if samples.is_empty() {
            return ProviderMetrics::empty(&self.provider_name);
        }

        let mut latencies: Vec<f64> = samples
            .iter()
            .filter(|s| s.outcome == RequestOutcome::Success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let success_rate = if counters.total > 0 {
            (counters.total - counters.failed) as f64 / counters.total as f64
        } else {
            1.0
        };

        ProviderMetrics {
            provider_name: self.provider_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_requests: counters.total,
            failed_requests: counters.failed,
            rate_limited_requests: counters.rate_limited,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outcomes_are_counted() {
        let collector = MetricsCollector::new("coingecko");

        collector
            .record_request(Duration::from_millis(100), RequestOutcome::Success)
            .await;
        collector
            .record_request(Duration::from_millis(300), RequestOutcome::Success)
            .await;
        collector
            .record_request(Duration::from_millis(20), RequestOutcome::RateLimited)
            .await;
        collector
            .record_request(Duration::from_millis(5000), RequestOutcome::Failure)
            .await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.failed_requests, 2);
        assert_eq!(metrics.rate_limited_requests, 1);
        assert_eq!(metrics.success_rate, 0.5);
        // Failed requests do not skew latency
        assert_eq!(metrics.latency_p99_ms, 300.0);
    }

    #[tokio::test]
    async fn test_empty_collector() {
        let metrics = MetricsCollector::new("moonpay").get_metrics().await;
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.success_rate, 1.0);
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        assert_eq!(percentile(&values, 50.0), 5.0);
        assert_eq!(percentile(&values, 99.0), 9.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }
}
