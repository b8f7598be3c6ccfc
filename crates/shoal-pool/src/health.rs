use crate::worker::Worker;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Health probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Time between probe rounds.
    pub interval: Duration,
    /// Per-probe deadline.
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Background liveness prober.
///
/// Each round issues one GET against every worker's model-listing endpoint
/// in parallel. A 2xx within the deadline marks the worker healthy and
/// feeds the elapsed time into its response-time window; any other outcome
/// marks it unhealthy. The prober is the only writer of the health flag;
/// dispatch failures influence selection through the score, not the flag.
pub struct HealthProber {
    workers: Arc<Vec<Arc<Worker>>>,
    client: reqwest::Client,
    config: ProbeConfig,
}

impl HealthProber {
    pub fn new(workers: Arc<Vec<Arc<Worker>>>, client: reqwest::Client, config: ProbeConfig) -> Self {
        Self {
            workers,
            client,
            config,
        }
    }

    /// Probes every worker once, in parallel.
    pub async fn run_round(&self) {
        let probes = self.workers.iter().map(|worker| {
            let client = self.client.clone();
            let worker = Arc::clone(worker);
            let timeout = self.config.timeout;
            async move {
                Self::probe_worker(&client, &worker, timeout).await;
            }
        });
        futures::future::join_all(probes).await;
    }

    async fn probe_worker(client: &reqwest::Client, worker: &Worker, timeout: Duration) {
        let started = Instant::now();
        match client
            .get(worker.health_url())
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                let elapsed = started.elapsed().as_secs_f64();
                if !worker.is_healthy() {
                    debug!(worker = worker.id(), "worker recovered");
                }
                worker.set_healthy(true);
                worker.record_probe(elapsed);
            }
            Ok(response) => {
                worker.set_healthy(false);
                warn!(
                    worker = worker.id(),
                    status = response.status().as_u16(),
                    "health probe rejected"
                );
            }
            Err(e) => {
                worker.set_healthy(false);
                warn!(worker = worker.id(), error = %e, "health probe failed");
            }
        }
    }

    /// Starts the periodic probe loop. The first tick fires one full
    /// interval after spawn; callers wanting an immediate round run
    /// [`HealthProber::run_round`] themselves first. Abort the returned
    /// handle to cancel.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.config.interval;
            let mut interval = tokio::time::interval_at(start, self.config.interval);
            loop {
                interval.tick().await;
                self.run_round().await;
            }
        })
    }
}
