use crate::error::{PoolError, Result};
use std::time::Duration;

/// Idle connections kept per upstream host.
const POOL_MAX_IDLE_PER_HOST: usize = 100;
/// Keep-alive for idle pooled connections.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
/// Deadline for establishing a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Deadline for a single socket read.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds the shared connection-pooled HTTP client.
///
/// One client serves every worker; reqwest pools keep-alive connections
/// per host. The total per-request deadline is not set here, since the
/// dispatcher and prober apply their own budgets per call.
pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(READ_TIMEOUT)
        .build()
        .map_err(|e| PoolError::Config(format!("failed to build HTTP client: {e}")))
}
