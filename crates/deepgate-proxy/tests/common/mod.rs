//! Shared fixtures: a recording mock upstream and an in-process gateway.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::Response,
};
use deepgate_core::UpstreamProfile;
use deepgate_proxy::{ServerConfig, serve};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Key shared by the gateway profile and test clients.
pub const TEST_API_KEY: &str = "sk-test-key";

/// Model id the mock upstream expects.
pub const UPSTREAM_MODEL: &str = "deepseek-chat";

/// What the mock upstream answers with.
#[derive(Debug, Clone)]
pub enum Reply {
    Json {
        status: StatusCode,
        headers: Vec<(&'static str, &'static str)>,
        body: &'static str,
    },
    /// Event-stream chunks, each sent after its delay.
    Stream(Vec<(Duration, &'static str)>),
    /// Event-stream that emits `chunk` every `every` until the reader leaves.
    Endless {
        every: Duration,
        chunk: &'static str,
    },
}

impl Reply {
    pub fn ok_json(body: &'static str) -> Self {
        Self::Json {
            status: StatusCode::OK,
            headers: Vec::new(),
            body,
        }
    }
}

/// One request as the upstream saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("upstream received JSON")
    }
}

#[derive(Clone)]
struct MockState {
    reply: Reply,
    requests: Arc<Mutex<Vec<Recorded>>>,
    reader_left: Arc<AtomicBool>,
}

pub struct MockUpstream {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    reader_left: Arc<AtomicBool>,
}

impl MockUpstream {
    pub async fn start(reply: Reply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let reader_left = Arc::new(AtomicBool::new(false));
        let state = MockState {
            reply,
            requests: Arc::clone(&requests),
            reader_left: Arc::clone(&reader_left),
        };

        let app = Router::new().fallback(answer).with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            reader_left,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Whether the endless stream noticed its reader disconnecting.
    pub fn reader_left(&self) -> bool {
        self.reader_left.load(Ordering::SeqCst)
    }
}

async fn answer(State(state): State<MockState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    state.requests.lock().unwrap().push(Recorded {
        method: parts.method,
        path_and_query: parts
            .uri
            .path_and_query()
            .map(ToString::to_string)
            .unwrap_or_default(),
        headers: parts.headers,
        body,
    });

    match state.reply {
        Reply::Json {
            status,
            headers,
            body,
        } => {
            let mut builder = Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, "application/json");
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            builder.body(Body::from(body)).unwrap()
        }
        Reply::Stream(chunks) => {
            let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(8);
            tokio::spawn(async move {
                for (delay, chunk) in chunks {
                    tokio::time::sleep(delay).await;
                    if tx.send(Ok(Bytes::from_static(chunk.as_bytes()))).await.is_err() {
                        return;
                    }
                }
            });
            event_stream(rx)
        }
        Reply::Endless { every, chunk } => {
            let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(8);
            let reader_left = Arc::clone(&state.reader_left);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(every).await;
                    if tx.send(Ok(Bytes::from_static(chunk.as_bytes()))).await.is_err() {
                        reader_left.store(true, Ordering::SeqCst);
                        return;
                    }
                }
            });
            event_stream(rx)
        }
    }
}

fn event_stream(rx: mpsc::Receiver<Result<Bytes, io::Error>>) -> Response {
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap()
}

/// A gateway serving on an ephemeral port; shut down on drop.
pub struct Gateway {
    pub base_url: String,
    cancel: CancellationToken,
}

impl Gateway {
    pub async fn start(upstream_base: &str, config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let profile = UpstreamProfile::custom(upstream_base, UPSTREAM_MODEL, TEST_API_KEY);

        tokio::spawn(serve(listener, profile, config, cancel.clone()));

        Self {
            base_url: format!("http://{addr}"),
            cancel,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// An address nothing listens on.
pub async fn closed_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub fn chat_body(model: &str, stream: bool) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "stream": stream,
        "messages": [
            {"role": "system", "content": "You are terse."},
            {"role": "user", "content": "Hi"}
        ]
    })
}
