//! In-process fake inference servers for integration tests.
//!
//! One `FakeUpstream` serves all three dialects on a single port and
//! echoes the prompt back as `echo:<prompt>`, so tests can verify routing
//! and ordering. Failure injection, artificial latency, and concurrency
//! observation are controlled through shared atomics.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use rand::Rng;
use serde_json::{Value, json};
use shoal_pool::{Dialect, WorkerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};

#[derive(Default)]
pub struct UpstreamState {
    /// Completion requests seen (health probes are not counted).
    pub calls: AtomicUsize,
    /// Completion requests left to answer with HTTP 500.
    pub fail_next: AtomicI64,
    /// Answer 200 with a body missing the completion text.
    pub malformed: AtomicBool,
    pub delay_min_ms: AtomicU64,
    pub delay_max_ms: AtomicU64,
    active: AtomicUsize,
    pub peak_active: AtomicUsize,
}

pub struct FakeUpstream {
    pub state: Arc<UpstreamState>,
    addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

impl FakeUpstream {
    pub async fn start() -> Self {
        Self::start_on(0).await
    }

    /// Binds to the given port (0 picks a free one).
    pub async fn start_on(port: u16) -> Self {
        let state = Arc::new(UpstreamState::default());
        let app = axum::Router::new()
            .route("/v1/completions", post(completions))
            .route("/api/generate", post(generate))
            .route("/v1/chat/completions", post(chat))
            .route("/v1/models", get(listing))
            .route("/api/tags", get(listing))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("bind fake upstream");
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            addr,
            _server: server,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn worker(&self, id: &str, dialect: Dialect, ceiling: u32) -> WorkerConfig {
        WorkerConfig {
            id: id.to_string(),
            host: "127.0.0.1".to_string(),
            port: self.port(),
            dialect,
            model: "fake-model".to_string(),
            max_concurrent_requests: ceiling,
        }
    }

    /// The next `n` completion requests answer HTTP 500.
    pub fn fail_next(&self, n: i64) {
        self.state.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn always_fail(&self) {
        self.fail_next(i64::MAX);
    }

    pub fn set_malformed(&self, malformed: bool) {
        self.state.malformed.store(malformed, Ordering::SeqCst);
    }

    pub fn set_delay_ms(&self, min: u64, max: u64) {
        self.state.delay_min_ms.store(min, Ordering::SeqCst);
        self.state.delay_max_ms.store(max, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Highest number of completion requests in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.state.peak_active.load(Ordering::SeqCst)
    }
}

/// Shared completion behavior: concurrency tracking, latency, failure
/// injection. Returns an error response when one was injected.
async fn simulate(state: &UpstreamState) -> Option<(StatusCode, Json<Value>)> {
    let current = state.active.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak_active.fetch_max(current, Ordering::SeqCst);

    let min = state.delay_min_ms.load(Ordering::SeqCst);
    let max = state.delay_max_ms.load(Ordering::SeqCst);
    if max > 0 {
        let ms = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            max
        };
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }

    state.active.fetch_sub(1, Ordering::SeqCst);
    state.calls.fetch_add(1, Ordering::SeqCst);

    if state.fail_next.fetch_sub(1, Ordering::SeqCst) > 0 {
        return Some((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "injected failure"})),
        ));
    }
    None
}

fn echo(prompt: &str) -> String {
    format!("echo:{prompt}")
}

async fn completions(
    State(state): State<Arc<UpstreamState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if let Some(failure) = simulate(&state).await {
        return failure;
    }
    if state.malformed.load(Ordering::SeqCst) {
        return (StatusCode::OK, Json(json!({"unexpected": true})));
    }
    let prompt = body["prompt"].as_str().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{"text": echo(prompt)}],
            "model": "fake-model",
        })),
    )
}

async fn generate(
    State(state): State<Arc<UpstreamState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if let Some(failure) = simulate(&state).await {
        return failure;
    }
    let prompt = body["prompt"].as_str().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "response": echo(prompt),
            "model": "fake-model",
        })),
    )
}

async fn chat(
    State(state): State<Arc<UpstreamState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if let Some(failure) = simulate(&state).await {
        return failure;
    }
    let prompt = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{"message": {"content": echo(prompt)}}],
            "model": "fake-model",
        })),
    )
}

async fn listing() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"data": []})))
}
