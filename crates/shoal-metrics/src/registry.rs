// Copyright 2025 Shoal Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::snapshot::RequestMetrics;
use std::collections::VecDeque;
use std::sync::RwLock as StdRwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Number of request records retained in the rolling window.
const REQUEST_WINDOW: usize = 1000;

/// One completed dispatch, as observed by the pool.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub started: Instant,
    pub ended: Instant,
    pub worker_id: String,
    pub success: bool,
    /// Stable error tag for failed dispatches (e.g. `"timeout"`).
    pub error_kind: Option<&'static str>,
}

impl RequestRecord {
    pub fn duration_secs(&self) -> f64 {
        self.ended.duration_since(self.started).as_secs_f64()
    }
}

/// Thread-safe registry of recent request outcomes.
///
/// Cumulative counters are lock-free atomics; the rolling record window is
/// guarded by a `RwLock` since writers append single records and readers
/// only take snapshots. Many dispatcher tasks record concurrently.
#[derive(Debug)]
pub struct RequestRegistry {
    enabled: bool,
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    window: StdRwLock<VecDeque<RequestRecord>>,
}

impl RequestRegistry {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            total: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            window: StdRwLock::new(VecDeque::with_capacity(if enabled {
                REQUEST_WINDOW
            } else {
                0
            })),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Appends a record to the rolling window and bumps counters.
    ///
    /// No-op when the registry is disabled.
    pub fn record(&self, record: RequestRecord) {
        if !self.enabled {
            return;
        }

        self.total.fetch_add(1, Ordering::Relaxed);
        if record.success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }

        let mut window = self.window.write().unwrap();
        if window.len() == REQUEST_WINDOW {
            window.pop_front();
        }
        window.push_back(record);
    }

    /// Takes a snapshot of current metrics.
    ///
    /// Returns all zeros when the registry is disabled.
    pub fn snapshot(&self) -> RequestMetrics {
        if !self.enabled {
            return RequestMetrics::default();
        }

        let total = self.total.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);

        let window = self.window.read().unwrap();
        let (mut sum, mut min, mut max) = (0.0f64, f64::INFINITY, 0.0f64);
        let mut earliest_start: Option<Instant> = None;
        let mut latest_end: Option<Instant> = None;

        for record in window.iter() {
            let duration = record.duration_secs();
            sum += duration;
            min = min.min(duration);
            max = max.max(duration);
            earliest_start = Some(match earliest_start {
                Some(t) => t.min(record.started),
                None => record.started,
            });
            latest_end = Some(match latest_end {
                Some(t) => t.max(record.ended),
                None => record.ended,
            });
        }

        let count = window.len();
        let average = if count > 0 { sum / count as f64 } else { 0.0 };
        let min = if count > 0 { min } else { 0.0 };

        // Rate over the span actually covered by retained samples, not
        // process uptime; a single sample has no span.
        let requests_per_second = match (earliest_start, latest_end) {
            (Some(start), Some(end)) if count >= 2 => {
                let span = end.duration_since(start).as_secs_f64();
                if span > 0.0 {
                    count as f64 / span
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        RequestMetrics {
            total_requests: total,
            successful_requests: succeeded,
            failed_requests: failed,
            success_rate: if total > 0 {
                succeeded as f64 / total as f64
            } else {
                0.0
            },
            average_response_time: average,
            min_response_time: min,
            max_response_time: max,
            requests_per_second,
        }
    }
}
