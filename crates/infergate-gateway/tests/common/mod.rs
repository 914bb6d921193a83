//! Shared fixtures: a scriptable mock backend and an in-process gateway.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use infergate_gateway::app_state::AppState;
use infergate_gateway::config::GatewayConfig;
use infergate_gateway::obs::HostSampler;
use infergate_gateway::router::build_router;

/// What the mock backend answers on `/invocations`.
#[derive(Debug, Clone)]
pub struct BackendScript {
    pub status: u16,
    pub body: &'static str,
    pub delay: Duration,
}

impl BackendScript {
    pub fn ok(body: &'static str) -> Self {
        Self {
            status: 200,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One request as the backend saw it.
#[derive(Debug, Clone)]
pub struct Received {
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Clone)]
struct MockState {
    script: BackendScript,
    received: Arc<Mutex<Vec<Received>>>,
}

pub struct MockBackend {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Received>>>,
}

impl MockBackend {
    pub async fn start(script: BackendScript) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            script,
            received: Arc::clone(&received),
        };
        let app = Router::new()
            .route("/invocations", post(invocations))
            .layer(DefaultBodyLimit::disable())
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, received }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

async fn invocations(State(state): State<MockState>, headers: HeaderMap, body: Bytes) -> Response {
    state.received.lock().unwrap().push(Received {
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        body,
    });
    if !state.script.delay.is_zero() {
        tokio::time::sleep(state.script.delay).await;
    }
    let status = StatusCode::from_u16(state.script.status).unwrap();
    (status, [(header::CONTENT_TYPE, "application/json")], state.script.body).into_response()
}

/// Address nothing is listening on.
pub async fn dead_backend_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Backend that reads the request, then answers with a truncated body
/// (the header promises 100 bytes) and hangs up.
pub async fn truncating_backend_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                read_request(&mut sock).await;
                let _ = sock
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"a\"")
                    .await;
                let _ = sock.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

/// Consume headers plus a `Content-Length` body.
async fn read_request(sock: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return;
            }
        }
        match sock.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Sampler whose CPU reading takes `delay` to come back.
pub struct SlowSampler {
    pub delay: Duration,
}

#[async_trait]
impl HostSampler for SlowSampler {
    async fn cpu_percent(&self, _window: Duration) -> Option<f64> {
        tokio::time::sleep(self.delay).await;
        Some(5.0)
    }

    async fn memory_percent(&self) -> Option<f64> {
        Some(5.0)
    }
}

/// Sampler that returns a different CPU value on every call.
#[derive(Default)]
pub struct SteppingSampler {
    calls: AtomicU64,
}

#[async_trait]
impl HostSampler for SteppingSampler {
    async fn cpu_percent(&self, _window: Duration) -> Option<f64> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        Some(n as f64 * 10.0)
    }

    async fn memory_percent(&self) -> Option<f64> {
        Some(42.5)
    }
}

/// Sampler for hosts without `/proc`.
pub struct NoSampler;

#[async_trait]
impl HostSampler for NoSampler {
    async fn cpu_percent(&self, _window: Duration) -> Option<f64> {
        None
    }

    async fn memory_percent(&self) -> Option<f64> {
        None
    }
}

pub fn config_for(backend_url: &str) -> GatewayConfig {
    let mut cfg = GatewayConfig::default();
    cfg.gateway.listen = "127.0.0.1:0".into();
    cfg.backend.url = backend_url.to_string();
    cfg
}

pub struct TestGateway {
    pub base: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

impl TestGateway {
    pub async fn start(cfg: GatewayConfig) -> Self {
        Self::start_with_sampler(cfg, Arc::new(SteppingSampler::default())).await
    }

    pub async fn start_with_sampler(cfg: GatewayConfig, sampler: Arc<dyn HostSampler>) -> Self {
        let state = AppState::with_sampler(cfg, sampler).expect("state");
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            state,
            client: reqwest::Client::new(),
        }
    }

    pub async fn predict(&self, body: impl Into<reqwest::Body>) -> reqwest::Response {
        self.client
            .post(format!("{}/predict", self.base))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn scrape(&self) -> (String, String) {
        let resp = self
            .client
            .get(format!("{}/metrics", self.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let ct = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (ct, resp.text().await.unwrap())
    }
}
