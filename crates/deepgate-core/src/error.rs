//! Core error types.
//!
//! These are transport-agnostic; the proxy adapter maps them onto HTTP
//! statuses.

use thiserror::Error;

/// Errors raised while translating between client and upstream schemas.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The client asked for a model the gateway does not advertise.
    #[error("Model {requested} not supported. Use {accepted} instead.")]
    UnsupportedModel { requested: String, accepted: String },

    /// The upstream success body did not match the chat-completion shape.
    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamBody(String),

    /// Re-encoding a translated payload failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Errors raised while resolving the upstream profile at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    /// No upstream credential was configured at all.
    #[error("Either DEEPSEEK_API_KEY or OPENROUTER_API_KEY environment variable is required")]
    NoCredentials,

    /// The selected profile needs a credential that is not set.
    #[error("{variable} is required for the {profile} profile")]
    MissingCredential {
        profile: &'static str,
        variable: &'static str,
    },
}
