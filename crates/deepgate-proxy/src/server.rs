//! Axum HTTP server for the OpenAI-compatible gateway.
//!
//! This module provides the `serve()` function that runs the gateway on a
//! pre-bound `TcpListener`, and `router()` for driving it in-process.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Request, State},
    http::{Method, StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use chrono::Utc;
use reqwest::Client;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use deepgate_core::{CLIENT_MODEL, ChatRequest, ModelsResponse, UpstreamProfile, translate_request};

use crate::buffer_pool::BufferPool;
use crate::error::GatewayError;
use crate::forward::{
    ClientConfig, UpstreamCall, build_client, forward_error_response,
    forward_non_streaming_response, forward_streaming_response, send_upstream,
};
use crate::relay::DEFAULT_HEARTBEAT_INTERVAL;

/// Default cap on a buffered inbound request body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

const HEALTH_PATH: &str = "/health";

/// Runtime tunables for the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub client: ClientConfig,
    /// Interval between keep-alive comments on idle streams.
    pub heartbeat: Duration,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            heartbeat: DEFAULT_HEARTBEAT_INTERVAL,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Shared application state for the gateway.
#[derive(Clone)]
pub struct AppState {
    /// HTTP client for forwarding requests upstream.
    client: Client,
    profile: Arc<UpstreamProfile>,
    buffers: Arc<BufferPool>,
    heartbeat: Duration,
    max_body_bytes: usize,
    /// Parent of every stream's cancellation token.
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        profile: UpstreamProfile,
        config: &ServerConfig,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let client =
            build_client(&config.client).context("Failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            profile: Arc::new(profile),
            buffers: Arc::new(BufferPool::default()),
            heartbeat: config.heartbeat,
            max_body_bytes: config.max_body_bytes,
            shutdown,
        })
    }

    pub fn buffers(&self) -> &Arc<BufferPool> {
        &self.buffers
    }
}

/// Build the gateway router.
///
/// Layer order, outermost first: tracing, CORS (answers preflights),
/// bearer auth, then routing. Unknown paths are authenticated before they
/// are rejected as not found.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health_check))
        .route("/v1/models", any(list_models))
        .route("/v1/{*path}", any(chat_completions))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        .layer(build_cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway with a pre-bound listener.
///
/// Runs until `cancel` is triggered. Active streams are cancelled with it.
pub async fn serve(
    listener: TcpListener,
    profile: UpstreamProfile,
    config: ServerConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let state = AppState::new(profile, &config, cancel.clone())?;

    info!(
        %addr,
        profile = %state.profile.kind,
        upstream = %state.profile.endpoint,
        model = %state.profile.model,
        heartbeat = ?config.heartbeat,
        "Gateway listening"
    );
    info!("Configure clients to use: http://{addr}/v1 with model {CLIENT_MODEL}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("Gateway server error")?;

    info!("Gateway shut down");
    Ok(())
}

/// CORS for browser clients. Credentials are allowed, so the request
/// origin is mirrored instead of answering `*`.
///
/// A request without an `Origin` header gets no CORS headers at all. Browsers
/// always send `Origin` on cross-origin calls, so only non-browser clients
/// (curl, SDKs) land there, and they ignore CORS.
fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .expose_headers([header::CONTENT_LENGTH])
}

/// Auth middleware: the client must present the active profile's key as
/// `Authorization: Bearer <key>`.
///
/// `OPTIONS` requests that are not CORS preflights are answered here with
/// an empty 200.
async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    if req.uri().path() == HEALTH_PATH {
        return next.run(req).await;
    }

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(key) if key == state.profile.api_key => next.run(req).await,
        Some(_) => {
            warn!(path = %req.uri().path(), "Invalid API key provided");
            GatewayError::Unauthorized("Invalid API key").into_response()
        }
        None => {
            debug!(path = %req.uri().path(), "Missing or invalid Authorization header");
            GatewayError::Unauthorized("Missing or invalid Authorization header").into_response()
        }
    }
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

/// Static model list advertised to clients.
async fn list_models() -> Json<ModelsResponse> {
    debug!("Listing models");
    Json(ModelsResponse::advertised(Utc::now().timestamp()))
}

async fn not_found(uri: Uri) -> GatewayError {
    warn!(path = %uri.path(), "Invalid path");
    GatewayError::NotFound(uri.path().to_string())
}

/// Translate a chat completion request, forward it, and relay the reply.
async fn chat_completions(
    State(state): State<AppState>,
    req: Request,
) -> Result<Response, GatewayError> {
    let (parts, body) = req.into_parts();

    let body = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| {
            debug!("Error reading request body: {e}");
            GatewayError::BadRequest("Error reading request".into())
        })?;
    debug!(body = %String::from_utf8_lossy(&body), "Request body");

    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!("Error parsing request JSON: {e}");
        GatewayError::BadRequest("Invalid JSON".into())
    })?;

    let streaming = request.stream;
    info!(
        path = %parts.uri.path(),
        model = %request.model,
        streaming,
        messages = request.messages.len(),
        "Processing chat completion request"
    );

    let upstream_request = translate_request(request, &state.profile)?;
    let payload = serde_json::to_vec(&upstream_request)
        .map_err(|e| GatewayError::InternalTranslation(e.to_string()))?;

    let response = send_upstream(
        &state.client,
        &state.profile,
        UpstreamCall {
            method: parts.method,
            path: parts.uri.path(),
            query: parts.uri.query(),
            headers: &parts.headers,
            body: payload,
            streaming,
        },
    )
    .await?;

    if response.status().as_u16() >= 400 {
        return forward_error_response(response).await;
    }

    if streaming {
        Ok(forward_streaming_response(
            response,
            state.heartbeat,
            state.shutdown.child_token(),
        ))
    } else {
        forward_non_streaming_response(response, &state.buffers).await
    }
}
