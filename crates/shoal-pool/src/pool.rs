use crate::config::{PoolSettings, WorkerConfig};
use crate::dialect::GenerationParams;
use crate::error::{PoolError, Result};
use crate::health::{HealthProber, ProbeConfig};
use crate::http;
use crate::selector;
use crate::worker::{Worker, WorkerStatus};
use serde::Serialize;
use shoal_metrics::{RequestMetrics, RequestRecord, RequestRegistry};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Slot-acquisition races tolerated within a single attempt before the
/// attempt is charged as contention.
const SLOT_RETRIES: usize = 3;
const SLOT_RETRY_PAUSE: Duration = Duration::from_millis(10);
/// How long `close` waits for in-flight dispatches.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Sleep before the next attempt, after `failed_attempts` have failed:
/// 0.5s, 1s, 2s, ...
fn backoff_delay(failed_attempts: usize) -> Duration {
    Duration::from_secs_f64(0.5 * 2f64.powi(failed_attempts as i32 - 1))
}

/// Normalized result of one successful dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResponse {
    pub worker_id: String,
    pub model: String,
    pub text: String,
    pub duration_secs: f64,
}

/// Outcome slot for one prompt of a batch. Exactly one of `response` /
/// `error` is set, matching `success`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<CompletionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    fn ok(index: usize, response: CompletionResponse) -> Self {
        Self {
            index,
            success: true,
            response: Some(response),
            error_kind: None,
            error: None,
        }
    }

    fn failed(index: usize, error: &PoolError) -> Self {
        Self {
            index,
            success: false,
            response: None,
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
        }
    }
}

/// Combined metrics view: the rolling request registry plus a per-worker
/// status list.
#[derive(Debug, Clone, Serialize)]
pub struct PoolMetrics {
    pub requests: RequestMetrics,
    pub workers: Vec<WorkerStatus>,
}

/// Batch progress callback: `(completed, total, elapsed_secs)`, invoked
/// after every completion, success or error.
pub type ProgressFn = Arc<dyn Fn(usize, usize, f64) + Send + Sync>;

enum Claim {
    Acquired(Arc<Worker>),
    Contended,
    NoneEligible,
}

/// The worker pool: selection, health, dispatch and batch fan-out over a
/// fixed set of upstream inference servers.
///
/// Opening the pool runs one synchronous health probe round (so the first
/// selection sees real flags) and then starts the periodic prober. The
/// pool is cheap to share behind an `Arc`; all operations take `&self`.
/// `close` consumes the pool: it cancels the prober, grants in-flight
/// dispatches a short grace period, and tears down the HTTP client.
pub struct WorkerPool {
    workers: Arc<Vec<Arc<Worker>>>,
    client: reqwest::Client,
    registry: Arc<RequestRegistry>,
    settings: PoolSettings,
    prober: Option<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Builds the pool and brings it into the open state.
    pub async fn open(configs: Vec<WorkerConfig>, settings: PoolSettings) -> Result<Self> {
        let workers: Arc<Vec<Arc<Worker>>> = Arc::new(
            configs
                .into_iter()
                .map(|c| Arc::new(Worker::from_config(c)))
                .collect(),
        );
        let client = http::build_client()?;
        let registry = Arc::new(RequestRegistry::new(settings.enable_metrics));

        let prober = HealthProber::new(
            Arc::clone(&workers),
            client.clone(),
            ProbeConfig {
                interval: settings.probe_interval(),
                ..ProbeConfig::default()
            },
        );
        // Populate the health flags before the first selection.
        prober.run_round().await;
        let prober_handle = if settings.health_check_interval > 0 {
            Some(prober.spawn())
        } else {
            None
        };

        info!(
            workers = workers.len(),
            healthy = workers.iter().filter(|w| w.is_healthy()).count(),
            "worker pool open"
        );

        Ok(Self {
            workers,
            client,
            registry,
            settings,
            prober: prober_handle,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn healthy_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_healthy()).count()
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Dispatches one prompt, retrying across workers on failure.
    ///
    /// Performs at most `max_retries + 1` upstream attempts, sleeping
    /// `0.5 * 2^n` seconds after failed attempt `n`. Selection failure
    /// (no eligible worker) aborts immediately: backing off cannot make
    /// an unhealthy fleet eligible, only the prober can.
    pub async fn process_request(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<CompletionResponse> {
        let params = params.normalized();
        let mut last_error = PoolError::NoWorkersAvailable;
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            match self.claim_worker().await {
                Claim::Acquired(worker) => {
                    match self.dispatch(&worker, prompt, &params).await {
                        Ok(response) => return Ok(response),
                        Err(e) => {
                            warn!(
                                worker = worker.id(),
                                attempt = attempts,
                                error = %e,
                                "dispatch failed"
                            );
                            last_error = e;
                        }
                    }
                }
                Claim::NoneEligible => {
                    last_error = PoolError::NoWorkersAvailable;
                    break;
                }
                Claim::Contended => {
                    last_error = PoolError::SlotContention;
                }
            }

            if attempts > self.settings.max_retries {
                break;
            }
            let delay = backoff_delay(attempts);
            debug!(delay_ms = delay.as_millis() as u64, "backing off before retry");
            tokio::time::sleep(delay).await;
        }

        Err(PoolError::RetriesExhausted {
            attempts,
            source: Box::new(last_error),
        })
    }

    /// Selects a worker and claims one of its slots.
    ///
    /// Losing the slot race (another task filled the worker between
    /// selection and acquisition) is retried a few times without charging
    /// the caller's attempt budget.
    async fn claim_worker(&self) -> Claim {
        for round in 0..SLOT_RETRIES {
            match selector::pick(&self.workers) {
                Some(worker) if worker.try_acquire_slot() => return Claim::Acquired(worker),
                Some(_) => {
                    if round + 1 < SLOT_RETRIES {
                        tokio::time::sleep(SLOT_RETRY_PAUSE).await;
                    }
                }
                None => return Claim::NoneEligible,
            }
        }
        Claim::Contended
    }

    /// One upstream attempt against an already-claimed worker. Always
    /// releases the slot and records the outcome on both the worker and
    /// the metrics registry.
    async fn dispatch(
        &self,
        worker: &Arc<Worker>,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<CompletionResponse> {
        let started = Instant::now();
        let result = self.send_once(worker, prompt, params).await;
        let ended = Instant::now();
        worker.release_slot();

        let duration_secs = ended.duration_since(started).as_secs_f64();
        worker.record_request(duration_secs, result.is_ok());
        self.registry.record(RequestRecord {
            started,
            ended,
            worker_id: worker.id().to_string(),
            success: result.is_ok(),
            error_kind: result.as_ref().err().map(|e| e.kind()),
        });

        result.map(|(model, text)| CompletionResponse {
            worker_id: worker.id().to_string(),
            model,
            text,
            duration_secs,
        })
    }

    async fn send_once(
        &self,
        worker: &Worker,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<(String, String)> {
        let body = worker.dialect().build_body(worker.model(), prompt, params);
        let deadline = self.settings.request_deadline();

        let response = self
            .client
            .post(worker.request_url())
            .json(&body)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| PoolError::from_http(e, deadline))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PoolError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PoolError::MalformedResponse(e.to_string()))?;
        let text = worker.dialect().extract_text(&value).ok_or_else(|| {
            PoolError::MalformedResponse(format!(
                "no completion text in {} response",
                worker.dialect()
            ))
        })?;
        let model = value
            .get("model")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(worker.model())
            .to_string();

        Ok((model, text))
    }

    /// Fans a batch of prompts out through the dispatcher.
    ///
    /// Global concurrency is gated by one semaphore of `max_concurrent`
    /// permits (pool default when `None`); each prompt holds its permit
    /// for its whole lifecycle, retries included. The returned vector has
    /// the same length and order as `prompts`; errors are materialized
    /// per slot, never propagated.
    pub async fn process_batch(
        &self,
        prompts: &[String],
        params: &GenerationParams,
        max_concurrent: Option<usize>,
        on_progress: Option<ProgressFn>,
    ) -> Vec<BatchItem> {
        let limit = max_concurrent
            .unwrap_or(self.settings.max_concurrent_batch)
            .max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let completed = AtomicUsize::new(0);
        let total = prompts.len();
        let started = Instant::now();

        let tasks = prompts.iter().enumerate().map(|(index, prompt)| {
            let semaphore = Arc::clone(&semaphore);
            let completed = &completed;
            let on_progress = on_progress.clone();
            async move {
                // Never closed while tasks run, so acquisition cannot fail.
                let _permit = semaphore.acquire().await.ok();

                let item = match self.process_request(prompt, params).await {
                    Ok(response) => BatchItem::ok(index, response),
                    Err(e) => BatchItem::failed(index, &e),
                };

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(callback) = &on_progress {
                    callback(done, total, started.elapsed().as_secs_f64());
                }
                item
            }
        });

        futures::future::join_all(tasks).await
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            requests: self.registry.snapshot(),
            workers: self.worker_status(),
        }
    }

    pub fn worker_status(&self) -> Vec<WorkerStatus> {
        self.workers.iter().map(|w| w.status()).collect()
    }

    /// Cancels the prober, waits briefly for in-flight dispatches, and
    /// tears down the HTTP client. The pool is gone afterwards.
    pub async fn close(mut self) {
        if let Some(handle) = self.prober.take() {
            handle.abort();
        }

        let deadline = Instant::now() + CLOSE_GRACE;
        while self.workers.iter().any(|w| w.in_flight() > 0) {
            if Instant::now() >= deadline {
                warn!("closing with dispatches still in flight");
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        info!("worker pool closed");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(handle) = self.prober.take() {
            handle.abort();
        }
    }
}
