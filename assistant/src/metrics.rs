// Turn counters and latency tracking for the session

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latency samples kept for percentiles.
const MAX_SAMPLES: usize = 500;

#[derive(Debug)]
pub struct TurnMetrics {
    started_at: DateTime<Utc>,
    turns_started: AtomicU64,
    turns_completed: AtomicU64,
    turns_failed: AtomicU64,
    rejected: AtomicU64,
    chunks_applied: AtomicU64,
    total_latency_ms: AtomicU64,
    latency_samples: Mutex<VecDeque<u64>>,
}

impl TurnMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            turns_started: AtomicU64::new(0),
            turns_completed: AtomicU64::new(0),
            turns_failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            chunks_applied: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            latency_samples: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record_started(&self) {
        self.turns_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk(&self) {
        self.chunks_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, latency_ms: u64) {
        self.turns_completed.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency_ms);
    }

    pub fn record_failed(&self, latency_ms: u64) {
        self.turns_failed.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency_ms);
    }

    fn record_latency(&self, latency_ms: u64) {
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        if let Ok(mut samples) = self.latency_samples.lock() {
            samples.push_back(latency_ms);
            if samples.len() > MAX_SAMPLES {
                samples.pop_front();
            }
        }
    }

    fn percentile(&self, p: u8) -> u64 {
        let Ok(samples) = self.latency_samples.lock() else {
            return 0;
        };
        if samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();
        let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
        sorted[index]
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let completed = self.turns_completed.load(Ordering::Relaxed);
        let failed = self.turns_failed.load(Ordering::Relaxed);
        let finished = completed + failed;
        let avg_latency_ms = if finished == 0 {
            0.0
        } else {
            self.total_latency_ms.load(Ordering::Relaxed) as f64 / finished as f64
        };

        MetricsSnapshot {
            timestamp: Utc::now(),
            session_started_at: self.started_at,
            turns_started: self.turns_started.load(Ordering::Relaxed),
            turns_completed: completed,
            turns_failed: failed,
            rejected_submissions: self.rejected.load(Ordering::Relaxed),
            chunks_applied: self.chunks_applied.load(Ordering::Relaxed),
            avg_latency_ms,
            p50_latency_ms: self.percentile(50),
            p95_latency_ms: self.percentile(95),
        }
    }
}

impl Default for TurnMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub session_started_at: DateTime<Utc>,
    pub turns_started: u64,
    pub turns_completed: u64,
    pub turns_failed: u64,
    pub rejected_submissions: u64,
    pub chunks_applied: u64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
}
