use std::time::Duration;
use thiserror::Error;

/// Errors produced by the pool while dispatching requests.
#[derive(Error, Debug)]
pub enum PoolError {
    /// No worker was healthy and under its concurrency ceiling at
    /// selection time.
    #[error("no workers available")]
    NoWorkersAvailable,

    /// Eligible workers existed but every slot acquisition lost the race.
    #[error("all eligible workers were at capacity")]
    SlotContention,

    /// Transport failed before a status line was received.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The per-attempt deadline elapsed.
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Upstream answered with a non-2xx status.
    #[error("upstream returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body failed to parse or lacked the completion text.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Every attempt failed; carries the last per-attempt cause.
    #[error("request failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: Box<PoolError>,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl PoolError {
    /// Maps a reqwest error to the taxonomy, attributing timeouts to the
    /// deadline that was in force for the attempt.
    pub fn from_http(err: reqwest::Error, deadline: Duration) -> Self {
        if err.is_timeout() {
            PoolError::Timeout(deadline)
        } else if err.is_connect() {
            PoolError::Connect(err.to_string())
        } else if err.is_decode() {
            PoolError::MalformedResponse(err.to_string())
        } else {
            PoolError::Connect(err.to_string())
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PoolError::RetriesExhausted { .. } | PoolError::Config(_)
        )
    }

    /// Stable tag stored in metrics records.
    pub fn kind(&self) -> &'static str {
        match self {
            PoolError::NoWorkersAvailable => "no_workers",
            PoolError::SlotContention => "slot_contention",
            PoolError::Connect(_) => "connect",
            PoolError::Timeout(_) => "timeout",
            PoolError::HttpStatus { .. } => "http_status",
            PoolError::MalformedResponse(_) => "malformed_response",
            PoolError::RetriesExhausted { .. } => "retries_exhausted",
            PoolError::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
