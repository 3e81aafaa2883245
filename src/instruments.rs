//! In-memory query instruments.
//!
//! Each [`HybridSearcher`](crate::HybridSearcher) owns one collector shared by
//! its clones. It tracks:
//!
//! - `queries_total`: every search request
//! - `query_errors_total`: requests that returned an error
//! - `query_partial_total`: hybrid requests answered by one side only
//! - `query_end_to_end_seconds`: wall-clock latency of every request
//! - `retrieval_result_count`: results returned by successful requests
//!
//! Histograms keep the most recent [`MAX_SAMPLES`] observations.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Maximum samples kept per histogram.
pub const MAX_SAMPLES: usize = 1000;

#[derive(Debug, Default)]
struct Histogram {
    samples: VecDeque<f64>,
    /// Observations since the last reset, including evicted ones.
    count: u64,
    sum: f64,
}

impl Histogram {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.samples.push_back(value);
        while self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let quantile = |q: f64| {
            if sorted.is_empty() {
                return 0.0;
            }
            let rank = (q * sorted.len() as f64).ceil() as usize;
            sorted[rank.clamp(1, sorted.len()) - 1]
        };
        HistogramSnapshot {
            count: self.count,
            sum: self.sum,
            mean: if self.count > 0 {
                self.sum / self.count as f64
            } else {
                0.0
            },
            p50: quantile(0.50),
            p95: quantile(0.95),
            max: sorted.last().copied().unwrap_or(0.0),
        }
    }
}

/// Point-in-time view of one histogram. Quantiles cover retained samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub max: f64,
}

/// Point-in-time view of all query instruments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentsSnapshot {
    pub queries_total: u64,
    pub query_errors_total: u64,
    pub query_partial_total: u64,
    pub query_end_to_end_seconds: HistogramSnapshot,
    pub retrieval_result_count: HistogramSnapshot,
}

/// Counters and histograms for search requests.
#[derive(Debug, Default)]
pub struct SearchInstruments {
    queries_total: AtomicU64,
    query_errors_total: AtomicU64,
    query_partial_total: AtomicU64,
    latency: Mutex<Histogram>,
    result_count: Mutex<Histogram>,
}

impl SearchInstruments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request that returned `results` results.
    pub fn record_success(&self, elapsed: Duration, results: usize, partial: bool) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        if partial {
            self.query_partial_total.fetch_add(1, Ordering::Relaxed);
        }
        self.latency.lock().record(elapsed.as_secs_f64());
        self.result_count.lock().record(results as f64);
    }

    /// Record a request that returned an error.
    pub fn record_error(&self, elapsed: Duration) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        self.query_errors_total.fetch_add(1, Ordering::Relaxed);
        self.latency.lock().record(elapsed.as_secs_f64());
    }

    pub fn snapshot(&self) -> InstrumentsSnapshot {
        InstrumentsSnapshot {
            queries_total: self.queries_total.load(Ordering::Relaxed),
            query_errors_total: self.query_errors_total.load(Ordering::Relaxed),
            query_partial_total: self.query_partial_total.load(Ordering::Relaxed),
            query_end_to_end_seconds: self.latency.lock().snapshot(),
            retrieval_result_count: self.result_count.lock().snapshot(),
        }
    }

    /// Zero every counter and drop all samples.
    pub fn reset(&self) {
        self.queries_total.store(0, Ordering::Relaxed);
        self.query_errors_total.store(0, Ordering::Relaxed);
        self.query_partial_total.store(0, Ordering::Relaxed);
        *self.latency.lock() = Histogram::default();
        *self.result_count.lock() = Histogram::default();
    }
}
