//! Request metrics and statistics for the prediction service.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept in memory
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector shared by all request handlers
pub struct ServiceMetrics {
    /// Successful predictions
    pub predictions_served: AtomicU64,
    /// Requests that ended in a 500
    pub predictions_failed: AtomicU64,
    /// Predictions whose label is the positive class
    pub positive_predictions: AtomicU64,
    /// Predictions by risk level
    by_risk_level: RwLock<HashMap<String, u64>>,
    /// Request latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Default probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            predictions_failed: AtomicU64::new(0),
            positive_predictions: AtomicU64::new(0),
            by_risk_level: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(
        &self,
        latency: Duration,
        label: i64,
        probability: f64,
        risk_level: &str,
    ) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);
        if label == 1 {
            self.positive_predictions.fetch_add(1, Ordering::Relaxed);
        }

        self.record_latency(latency);

        let bucket = (probability * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }

        if let Ok(mut by_level) = self.by_risk_level.write() {
            *by_level.entry(risk_level.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a failed prediction
    pub fn record_failure(&self, latency: Duration) {
        self.predictions_failed.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
    }

    fn record_latency(&self, latency: Duration) {
        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }
    }

    /// Latency statistics over the current window
    pub fn latency_stats(&self) -> LatencyStats {
        let mut sorted: Vec<u64> = match self.latencies.read() {
            Ok(times) => times.clone(),
            Err(_) => return LatencyStats::default(),
        };
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Current throughput (predictions per second)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|b| *b)
            .unwrap_or_default()
    }

    pub fn by_risk_level(&self) -> HashMap<String, u64> {
        self.by_risk_level
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Point-in-time copy of every metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            predictions_served: self.predictions_served.load(Ordering::Relaxed),
            predictions_failed: self.predictions_failed.load(Ordering::Relaxed),
            positive_predictions: self.positive_predictions.load(Ordering::Relaxed),
            throughput: self.throughput(),
            latency: self.latency_stats(),
            by_risk_level: self.by_risk_level(),
            probability_distribution: self.probability_distribution(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let total = snapshot.predictions_served + snapshot.predictions_failed;
        let failure_rate = if total > 0 {
            (snapshot.predictions_failed as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        info!(
            served = snapshot.predictions_served,
            failed = snapshot.predictions_failed,
            positive = snapshot.positive_predictions,
            failure_rate = format!("{:.1}%", failure_rate),
            throughput = format!("{:.2} req/s", snapshot.throughput),
            mean_us = snapshot.latency.mean_us,
            p95_us = snapshot.latency.p95_us,
            p99_us = snapshot.latency.p99_us,
            "Prediction metrics summary"
        );

        let buckets: u64 = snapshot.probability_distribution.iter().sum();
        if buckets > 0 {
            for (i, &count) in snapshot.probability_distribution.iter().enumerate() {
                let pct = (count as f64 / buckets as f64) * 100.0;
                info!(
                    "  p(default) {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                    i as f64 / 10.0,
                    (i + 1) as f64 / 10.0,
                    count,
                    pct,
                    "█".repeat(((pct / 5.0) as usize).min(20))
                );
            }
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable view served by `GET /metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub predictions_served: u64,
    pub predictions_failed: u64,
    pub positive_predictions: u64,
    pub throughput: f64,
    pub latency: LatencyStats,
    pub by_risk_level: HashMap<String, u64>,
    pub probability_distribution: [u64; 10],
}

/// Logs a metrics summary at a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Run the reporting loop; returns immediately when the interval is 0
    pub async fn start(self) {
        if self.interval_secs == 0 {
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), 0, 0.2, "low");
        metrics.record_prediction(Duration::from_micros(300), 1, 0.85, "critical");
        metrics.record_prediction(Duration::from_micros(200), 1, 1.0, "critical");
        metrics.record_failure(Duration::from_micros(50));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.predictions_served, 3);
        assert_eq!(snapshot.predictions_failed, 1);
        assert_eq!(snapshot.positive_predictions, 2);
        assert_eq!(snapshot.by_risk_level.get("critical"), Some(&2));
        assert_eq!(snapshot.probability_distribution[2], 1);
        assert_eq!(snapshot.probability_distribution[8], 1);
        assert_eq!(snapshot.probability_distribution[9], 1);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.latency_stats(), LatencyStats::default());

        for us in [400, 100, 300, 200] {
            metrics.record_failure(Duration::from_micros(us));
        }

        let stats = metrics.latency_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.p50_us, 300);
        assert_eq!(stats.max_us, 400);
        assert_eq!(stats.p99_us, 400);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let metrics = ServiceMetrics::new();
        for _ in 0..=LATENCY_WINDOW {
            metrics.record_failure(Duration::from_micros(1));
        }
        assert!(metrics.latency_stats().count <= LATENCY_WINDOW as u64);
    }
}
