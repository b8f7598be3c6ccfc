//! # Shoal Pool
//!
//! The core of shoal: a client-side load balancer that fans text-completion
//! requests out across a fleet of locally hosted inference servers.
//!
//! # Architecture
//!
//! The pool coordinates four collaborators around a fixed set of workers:
//!
//! 1. **Workers** ([`Worker`]): one per upstream endpoint, owning live
//!    counters, a bounded response-time window, a health flag, and the
//!    per-worker slot count that provides back-pressure.
//! 2. **Selection** ([`selector`]): weighted random draw over a composite
//!    score blending availability, historical success rate, and inverse
//!    mean response time. Unhealthy or saturated workers never win.
//! 3. **Health probing** ([`HealthProber`]): a background task that hits
//!    each worker's model-listing endpoint on an interval and flips the
//!    health flags the selector reads.
//! 4. **Dispatch** ([`WorkerPool`]): the single-request retry loop and the
//!    order-preserving batch engine with its global concurrency semaphore.
//!
//! Three wire dialects are supported behind one tag ([`Dialect`]):
//! OpenAI-style completions, native generate, and chat completions. The
//! dialect decides URLs, request body layout, and where the completion
//! text lives in the response.
//!
//! # Example
//!
//! ```no_run
//! use shoal_pool::{GenerationParams, PoolSettings, WorkerPool};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let workers = shoal_pool::load_workers("config/workers.json")?;
//! let pool = WorkerPool::open(workers, PoolSettings::default()).await?;
//!
//! let response = pool
//!     .process_request("Why is the sky blue?", &GenerationParams::default())
//!     .await?;
//! println!("{} answered: {}", response.worker_id, response.text);
//!
//! pool.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dialect;
pub mod error;
pub mod health;
pub mod http;
pub mod pool;
pub mod selector;
pub mod worker;

pub use config::{PoolSettings, WorkerConfig, load_workers};
pub use dialect::{Dialect, GenerationParams};
pub use error::{PoolError, Result};
pub use health::{HealthProber, ProbeConfig};
pub use pool::{BatchItem, CompletionResponse, PoolMetrics, ProgressFn, WorkerPool};
pub use worker::{Worker, WorkerStatus};
