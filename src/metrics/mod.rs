//! Metrics for the log front-end.
//!
//! A small in-process registry of labeled counters, gauges, and histograms,
//! exported in Prometheus text format on `GET /metrics`. Every HTTP metric
//! is labeled by `(log_id, endpoint)`, responses and latencies additionally
//! by `status`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Metric names used by the front-end.
pub mod metric_names {
    /// Counter: incoming HTTP requests.
    pub const HTTP_REQ: &str = "http_req";
    /// Counter: completed HTTP responses, labeled by status.
    pub const HTTP_RSP: &str = "http_rsp";
    /// Histogram: request-response latency in seconds, labeled by status.
    pub const HTTP_LATENCY: &str = "http_latency";
    /// Gauge: timestamp of the most recently published to-sign tree head.
    pub const LAST_STH_TIMESTAMP: &str = "last_sth_timestamp";
    /// Gauge: tree size of the most recently published to-sign tree head.
    pub const LAST_STH_SIZE: &str = "last_sth_size";
}

/// Label set for dimensional metrics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    pub fn log(self, log_id: &str) -> Self {
        self.with("logid", log_id)
    }

    pub fn endpoint(self, endpoint: &str) -> Self {
        self.with("endpoint", endpoint)
    }

    pub fn status(self, status: u16) -> Self {
        self.with("status", &status.to_string())
    }

    fn to_prometheus(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect();
        format!("{{{}}}", parts.join(","))
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of labeled metrics.
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, HashMap<Labels, Arc<AtomicU64>>>>,
    gauges: RwLock<HashMap<String, HashMap<Labels, Arc<AtomicU64>>>>,
    histograms: RwLock<HashMap<String, HashMap<Labels, Arc<Histogram>>>>,
    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Increment a labeled counter.
    pub async fn inc_counter(&self, name: &str, labels: Labels) {
        let counters = self.counters.read().await;
        if let Some(counter) = counters.get(name).and_then(|m| m.get(&labels)) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        drop(counters);

        let mut counters = self.counters.write().await;
        let counter = counters
            .entry(name.to_string())
            .or_default()
            .entry(labels)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)));
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Set a labeled gauge.
    pub async fn set_gauge(&self, name: &str, labels: Labels, value: u64) {
        let gauges = self.gauges.read().await;
        if let Some(gauge) = gauges.get(name).and_then(|m| m.get(&labels)) {
            gauge.store(value, Ordering::Relaxed);
            return;
        }
        drop(gauges);

        let mut gauges = self.gauges.write().await;
        gauges
            .entry(name.to_string())
            .or_default()
            .insert(labels, Arc::new(AtomicU64::new(value)));
    }

    /// Record a labeled histogram observation.
    pub async fn observe_histogram(&self, name: &str, labels: Labels, value: f64) {
        let histograms = self.histograms.read().await;
        if let Some(histogram) = histograms.get(name).and_then(|m| m.get(&labels)) {
            histogram.observe(value);
            return;
        }
        drop(histograms);

        let mut histograms = self.histograms.write().await;
        let histogram = histograms
            .entry(name.to_string())
            .or_default()
            .entry(labels)
            .or_insert_with(|| Arc::new(Histogram::default()));
        histogram.observe(value);
    }

    /// Read a counter value.
    pub async fn get_counter(&self, name: &str, labels: &Labels) -> u64 {
        let counters = self.counters.read().await;
        counters
            .get(name)
            .and_then(|m| m.get(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Read a gauge value.
    pub async fn get_gauge(&self, name: &str, labels: &Labels) -> u64 {
        let gauges = self.gauges.read().await;
        gauges
            .get(name)
            .and_then(|m| m.get(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export all metrics in Prometheus text format.
    pub async fn to_prometheus(&self) -> String {
        let counters = self.counters.read().await;
        let gauges = self.gauges.read().await;
        let histograms = self.histograms.read().await;

        let mut output = String::new();

        output.push_str("# TYPE log_uptime_seconds gauge\n");
        output.push_str(&format!("log_uptime_seconds {}\n", self.uptime_seconds()));

        for (name, label_map) in counters.iter() {
            output.push_str(&format!("# TYPE {} counter\n", name));
            for (labels, counter) in label_map.iter() {
                output.push_str(&format!(
                    "{}{} {}\n",
                    name,
                    labels.to_prometheus(),
                    counter.load(Ordering::Relaxed)
                ));
            }
        }

        for (name, label_map) in gauges.iter() {
            output.push_str(&format!("# TYPE {} gauge\n", name));
            for (labels, gauge) in label_map.iter() {
                output.push_str(&format!(
                    "{}{} {}\n",
                    name,
                    labels.to_prometheus(),
                    gauge.load(Ordering::Relaxed)
                ));
            }
        }

        for (name, label_map) in histograms.iter() {
            output.push_str(&format!("# TYPE {} histogram\n", name));
            for (labels, histogram) in label_map.iter() {
                output.push_str(&histogram.to_prometheus(name, labels));
            }
        }

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket histogram.
pub struct Histogram {
    buckets: Vec<f64>,
    counts: Vec<AtomicU64>,
    /// Sum of observations in microseconds.
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record an observation.
    pub fn observe(&self, value: f64) {
        self.sum_micros
            .fetch_add((value * 1_000_000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        for (i, bucket) in self.buckets.iter().enumerate() {
            if value <= *bucket {
                self.counts[i].fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
    }

    fn to_prometheus(&self, name: &str, labels: &Labels) -> String {
        let mut output = String::new();
        let mut cumulative = 0u64;
        for (i, bucket) in self.buckets.iter().enumerate() {
            cumulative += self.counts[i].load(Ordering::Relaxed);
            output.push_str(&format!(
                "{}_bucket{} {}\n",
                name,
                labels.clone().with("le", &bucket.to_string()).to_prometheus(),
                cumulative
            ));
        }
        output.push_str(&format!(
            "{}_bucket{} {}\n",
            name,
            labels.clone().with("le", "+Inf").to_prometheus(),
            self.count.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "{}_sum{} {}\n",
            name,
            labels.to_prometheus(),
            self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
        ));
        output.push_str(&format!(
            "{}_count{} {}\n",
            name,
            labels.to_prometheus(),
            self.count.load(Ordering::Relaxed)
        ));
        output
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // Latency buckets in seconds.
        Self::new(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ])
    }
}
