//! HTTP adapter for deepgate.
//!
//! Serves the OpenAI chat-completion surface, authenticates clients against
//! the active upstream profile, translates payloads through `deepgate-core`
//! and forwards them upstream. Streamed replies go through [`relay`], which
//! injects heartbeats and tears both sides down together.

#![deny(unsafe_code)]

pub mod buffer_pool;
pub mod error;
pub mod forward;
pub mod relay;
pub mod server;

pub use buffer_pool::{BufferPool, PooledBuffer};
pub use error::{ErrorResponse, GatewayError};
pub use forward::ClientConfig;
pub use relay::{HEARTBEAT_FRAME, RelayEnd, RelayOutcome};
pub use server::{AppState, ServerConfig, router, serve};
