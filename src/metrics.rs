//! Request metrics and statistics tracking for the scoring API.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept per endpoint
const MAX_SAMPLES: usize = 10_000;

/// Instrumented API endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Predict,
    Info,
    Distribution,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Predict, Endpoint::Info, Endpoint::Distribution];

    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Predict => "predict",
            Endpoint::Info => "info",
            Endpoint::Distribution => "distribution",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Default)]
struct EndpointMetrics {
    requests: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    /// Handling times (in microseconds)
    latencies: RwLock<Vec<u64>>,
}

/// Metrics collector for API traffic
pub struct ApiMetrics {
    endpoints: [EndpointMetrics; 3],
    /// Returned probability distribution buckets (10 points wide)
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

/// Outcome of a handled request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    /// Answered with a 4xx
    Rejected,
    /// Answered with a 5xx
    Failed,
}

impl ApiMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            endpoints: Default::default(),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a handled request
    pub fn record_request(&self, endpoint: Endpoint, elapsed: Duration, outcome: Outcome) {
        let metrics = &self.endpoints[endpoint.index()];
        metrics.requests.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Outcome::Ok => {}
            Outcome::Rejected => {
                metrics.rejected.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failed => {
                metrics.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Ok(mut times) = metrics.latencies.write() {
            times.push(elapsed.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }
    }

    /// Record a returned probability, in percent
    pub fn record_score(&self, probability: f64) {
        let bucket = (probability / 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn requests(&self, endpoint: Endpoint) -> u64 {
        self.endpoints[endpoint.index()]
            .requests
            .load(Ordering::Relaxed)
    }

    pub fn rejected(&self, endpoint: Endpoint) -> u64 {
        self.endpoints[endpoint.index()]
            .rejected
            .load(Ordering::Relaxed)
    }

    pub fn failed(&self, endpoint: Endpoint) -> u64 {
        self.endpoints[endpoint.index()]
            .failed
            .load(Ordering::Relaxed)
    }

    /// Latency statistics of one endpoint
    pub fn latency_stats(&self, endpoint: Endpoint) -> LatencyStats {
        let Ok(times) = self.endpoints[endpoint.index()].latencies.read() else {
            return LatencyStats::default();
        };
        LatencyStats::from_samples(&times)
    }

    /// Total requests per second since startup
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let total: u64 = Endpoint::ALL.iter().map(|&e| self.requests(e)).sum();
        if elapsed > 0.0 {
            total as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Serializable view of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let endpoints = Endpoint::ALL
            .iter()
            .map(|&endpoint| {
                (
                    endpoint.as_str().to_string(),
                    EndpointSnapshot {
                        requests: self.requests(endpoint),
                        rejected: self.rejected(endpoint),
                        failed: self.failed(endpoint),
                        latency_us: self.latency_stats(endpoint),
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            throughput_rps: self.get_throughput(),
            endpoints,
            score_distribution: self.get_score_distribution(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let throughput = self.get_throughput();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              CREDIT SCORING API - METRICS SUMMARY            ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Throughput: {:>8.2} req/s", throughput);
        for endpoint in Endpoint::ALL {
            let stats = self.latency_stats(endpoint);
            info!(
                "║ /{:<13} requests={:>7} rejected={:>6} failed={:>4} p50={:>6}μs p99={:>6}μs",
                endpoint.as_str(),
                self.requests(endpoint),
                self.rejected(endpoint),
                self.failed(endpoint),
                stats.p50_us,
                stats.p99_us
            );
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Default Probability Distribution:");
        let score_dist = self.get_score_distribution();
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:>3}-{:<3}%: {:>6} ({:>5.1}%) {}",
                i * 10,
                (i + 1) * 10,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics, in microseconds
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencyStats {
    fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        Self {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub requests: u64,
    pub rejected: u64,
    pub failed: u64,
    pub latency_us: LatencyStats,
}

/// Body of `/metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub throughput_rps: f64,
    pub endpoints: BTreeMap<String, EndpointSnapshot>,
    pub score_distribution: [u64; 10],
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ApiMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ApiMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
