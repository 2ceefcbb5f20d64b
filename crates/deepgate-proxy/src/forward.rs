//! Request forwarding to the configured upstream.
//!
//! One shared `reqwest::Client` carries every upstream call. Error replies
//! are passed through untouched, non-streaming bodies are collected into a
//! pooled buffer and translated, and event-streams are handed to the relay.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use deepgate_core::{UpstreamProfile, translate_response};

use crate::buffer_pool::BufferPool;
use crate::error::GatewayError;
use crate::relay;

/// Default overall upstream timeout, covering streamed bodies too.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Headers that should NOT be forwarded in either direction.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    // Recomputed for the rewritten body
    "content-length",
    "content-encoding",
    // Owned by the client stack
    "host",
    "accept-encoding",
];

/// Check if a header should be forwarded.
fn should_forward_header(name: &str) -> bool {
    !HOP_BY_HOP_HEADERS
        .iter()
        .any(|skipped| skipped.eq_ignore_ascii_case(name))
}

/// Settings for the shared upstream client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
        }
    }
}

/// Build the process-wide upstream client.
///
/// HTTP/2 is negotiated through ALPN when the upstream offers it.
pub fn build_client(config: &ClientConfig) -> reqwest::Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .http2_keep_alive_interval(Duration::from_secs(30))
        .http2_keep_alive_timeout(Duration::from_secs(10))
        .http2_keep_alive_while_idle(true)
        .timeout(config.timeout)
        .build()
}

/// One inbound request, already translated, ready to send upstream.
#[derive(Debug)]
pub struct UpstreamCall<'a> {
    pub method: Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub body: Vec<u8>,
    pub streaming: bool,
}

/// Build the outbound header set for `profile`.
///
/// Inbound headers are copied minus hop-by-hop ones, then the upstream
/// credential and JSON content type overwrite whatever the client sent.
pub fn build_upstream_headers(
    inbound: &HeaderMap,
    profile: &UpstreamProfile,
    streaming: bool,
) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 4);
    for (name, value) in inbound {
        if should_forward_header(name.as_str()) {
            headers.append(name.clone(), value.clone());
        }
    }

    let mut bearer = HeaderValue::try_from(format!("Bearer {}", profile.api_key)).map_err(|_| {
        GatewayError::InternalTranslation("upstream credential is not a valid header value".into())
    })?;
    bearer.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, bearer);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    if streaming {
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
    }

    for &(name, value) in profile.attribution_headers() {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    Ok(headers)
}

/// Send one call upstream. Transport failures are not retried.
pub async fn send_upstream(
    client: &Client,
    profile: &UpstreamProfile,
    call: UpstreamCall<'_>,
) -> Result<reqwest::Response, GatewayError> {
    let url = profile.target_url(call.path, call.query);
    let headers = build_upstream_headers(call.headers, profile, call.streaming)?;
    debug!(
        method = %call.method,
        %url,
        streaming = call.streaming,
        bytes = call.body.len(),
        "Forwarding request upstream"
    );

    client
        .request(call.method, &url)
        .headers(headers)
        .body(call.body)
        .send()
        .await
        .map_err(|e| {
            error!("Failed to reach upstream {url}: {e}");
            GatewayError::UpstreamUnreachable(e.to_string())
        })
}

/// Pass an upstream error reply (status >= 400) through unchanged.
pub async fn forward_error_response(response: reqwest::Response) -> Result<Response, GatewayError> {
    let status = response.status();
    let mut headers = HeaderMap::with_capacity(response.headers().len());
    for (name, value) in response.headers() {
        if should_forward_header(name.as_str()) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    let body = response
        .bytes()
        .await
        .map_err(|e| GatewayError::UpstreamBodyRead(e.to_string()))?;
    warn!(status = status.as_u16(), bytes = body.len(), "Upstream returned an error");

    let mut forwarded = Response::new(Body::from(body));
    *forwarded.status_mut() = status;
    *forwarded.headers_mut() = headers;
    Ok(forwarded)
}

/// Read a complete JSON reply into a pooled buffer and translate it.
pub async fn forward_non_streaming_response(
    response: reqwest::Response,
    buffers: &Arc<BufferPool>,
) -> Result<Response, GatewayError> {
    let status = response.status();
    let mut buf = buffers.acquire(response.content_length());

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| GatewayError::UpstreamBodyRead(e.to_string()))?;
        buf.extend_from_slice(&chunk);
    }
    trace!(body = %String::from_utf8_lossy(&buf), "Upstream response body");

    let translated = translate_response(&buf)?;
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(translated))
        .map_err(|e| GatewayError::InternalTranslation(e.to_string()))
}

/// Start relaying an upstream event-stream and return the client response.
///
/// The relay runs on its own task. Dropping the returned body (client
/// disconnect) or cancelling `cancel` stops it.
pub fn forward_streaming_response(
    response: reqwest::Response,
    heartbeat: Duration,
    cancel: CancellationToken,
) -> Response {
    let status = response.status();
    let (sink, client_stream) = relay::client_channel(cancel.clone());
    tokio::spawn(relay::run(response.bytes_stream(), sink, cancel, heartbeat));

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no") // Disable nginx buffering
        .body(Body::from_stream(client_stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
