//! Core domain for deepgate: wire types, schema translation and upstream
//! profiles.
//!
//! Nothing in this crate performs I/O. The proxy adapter owns the HTTP
//! server, the upstream client and the streaming relay.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod error;
pub mod models;
pub mod profile;
pub mod translate;

// Re-export commonly used types for convenience
pub use error::{ProfileError, TranslateError};
pub use models::{
    CHAT_COMPLETION_OBJECT, CLIENT_MODEL, ChatChoice, ChatCompletionResponse, ChatRequest,
    Function, Message, ModelInfo, ModelsResponse, Tool, ToolCall, ToolCallFunction, ToolChoice,
    UpstreamRequest, UpstreamToolChoice, Usage,
};
pub use profile::{Credentials, ProfileKind, UpstreamProfile};
pub use translate::{convert_messages, translate_completion, translate_request, translate_response};
