use crate::config::WorkerConfig;
use crate::dialect::Dialect;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Samples kept in each worker's response-time window.
const RESPONSE_WINDOW: usize = 100;

/// Floor applied to the composite score so every eligible worker stays
/// drawable.
pub(crate) const MIN_WEIGHT: f64 = 0.01;

/// One upstream inference server.
///
/// A worker owns its live counters: the in-flight slot count (the
/// per-worker back-pressure primitive), the health flag written by the
/// prober, cumulative request counters, and a bounded window of recent
/// request durations. All of it is safe under concurrent access from
/// dispatcher tasks, the selector, and the prober; `in_flight` never
/// leaves `0..=ceiling`.
#[derive(Debug)]
pub struct Worker {
    id: String,
    host: String,
    port: u16,
    dialect: Dialect,
    model: String,
    max_concurrent: u32,
    in_flight: AtomicU32,
    healthy: AtomicBool,
    /// Epoch millis of the last failure; zero means never.
    last_error_ms: AtomicU64,
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    window: Mutex<VecDeque<f64>>,
}

impl Worker {
    pub fn from_config(config: WorkerConfig) -> Self {
        Self {
            id: config.id,
            host: config.host,
            port: config.port,
            dialect: config.dialect,
            model: config.model,
            max_concurrent: config.max_concurrent_requests.max(1),
            in_flight: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
            last_error_ms: AtomicU64::new(0),
            total: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            window: Mutex::new(VecDeque::with_capacity(RESPONSE_WINDOW)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_concurrent(&self) -> u32 {
        self.max_concurrent
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn request_url(&self) -> String {
        format!("{}{}", self.base_url(), self.dialect.request_path())
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url(), self.dialect.health_path())
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Flips the health flag. Marking unhealthy also stamps the
    /// last-error timestamp.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
        if !healthy {
            self.stamp_error();
        }
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Healthy and strictly under the concurrency ceiling.
    pub fn is_eligible(&self) -> bool {
        self.is_healthy() && self.in_flight() < self.max_concurrent
    }

    /// Atomically claims a slot iff the worker is under its ceiling.
    ///
    /// Every `true` return must be paired with exactly one
    /// [`Worker::release_slot`], whichever way the dispatch ends.
    pub fn try_acquire_slot(&self) -> bool {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= self.max_concurrent {
                return false;
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn release_slot(&self) {
        let previous = self.in_flight.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "release_slot without matching acquire");
    }

    /// Records a completed dispatch: appends the duration sample and bumps
    /// the counters. Failures stamp the last-error timestamp.
    pub fn record_request(&self, duration_secs: f64, success: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            self.stamp_error();
        }
        self.push_sample(duration_secs);
    }

    /// Appends a duration sample without touching the request counters.
    /// Used by the prober to seed the speed component.
    pub fn record_probe(&self, duration_secs: f64) {
        self.push_sample(duration_secs);
    }

    fn push_sample(&self, duration_secs: f64) {
        let mut window = self.window.lock().unwrap();
        if window.len() == RESPONSE_WINDOW {
            window.pop_front();
        }
        window.push_back(duration_secs);
    }

    fn stamp_error(&self) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last_error_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Mean of the rolling duration window, zero when empty.
    pub fn average_response_time(&self) -> f64 {
        let window = self.window.lock().unwrap();
        if window.is_empty() {
            0.0
        } else {
            window.iter().sum::<f64>() / window.len() as f64
        }
    }

    /// Fraction of completed dispatches that succeeded. A worker that has
    /// never completed one is treated as perfect so new workers get
    /// traffic.
    pub fn success_rate(&self) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            1.0
        } else {
            self.succeeded.load(Ordering::Relaxed) as f64 / total as f64
        }
    }

    /// Composite selection weight in `(0, 1]`.
    ///
    /// 0.4 availability + 0.4 success rate + 0.2 speed, floored at
    /// [`MIN_WEIGHT`]. Speed uses the inverse mean response time and a
    /// neutral 0.5 before any sample exists.
    pub fn score(&self) -> f64 {
        let availability =
            (1.0 - self.in_flight() as f64 / self.max_concurrent as f64).clamp(0.0, 1.0);
        let success = self.success_rate();
        let speed = {
            let window = self.window.lock().unwrap();
            if window.is_empty() {
                0.5
            } else {
                let mean = window.iter().sum::<f64>() / window.len() as f64;
                1.0 / (1.0 + mean)
            }
        };

        (0.4 * availability + 0.4 * success + 0.2 * speed).max(MIN_WEIGHT)
    }

    pub fn status(&self) -> WorkerStatus {
        let in_flight = self.in_flight();
        WorkerStatus {
            id: self.id.clone(),
            host: self.host.clone(),
            port: self.port,
            dialect: self.dialect,
            model: self.model.clone(),
            healthy: self.is_healthy(),
            in_flight,
            max_concurrent: self.max_concurrent,
            load_percent: in_flight as f64 / self.max_concurrent as f64 * 100.0,
            total_requests: self.total.load(Ordering::Relaxed),
            successful_requests: self.succeeded.load(Ordering::Relaxed),
            failed_requests: self.failed.load(Ordering::Relaxed),
            success_rate: self.success_rate(),
            average_response_time: self.average_response_time(),
            last_error_ms: match self.last_error_ms.load(Ordering::Relaxed) {
                0 => None,
                ms => Some(ms),
            },
        }
    }
}

/// Point-in-time view of one worker, for status output and metrics.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub dialect: Dialect,
    pub model: String,
    pub healthy: bool,
    pub in_flight: u32,
    pub max_concurrent: u32,
    pub load_percent: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub average_response_time: f64,
    pub last_error_ms: Option<u64>,
}
