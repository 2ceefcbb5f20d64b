//! Upstream profiles.
//!
//! A profile pins the upstream endpoint, the model id sent upstream and the
//! credential used for it. Exactly one profile is resolved at startup and
//! shared read-only for the lifetime of the process.

use std::fmt;

use crate::error::ProfileError;

pub const DEEPSEEK_ENDPOINT: &str = "https://api.deepseek.com";
pub const DEEPSEEK_BETA_ENDPOINT: &str = "https://api.deepseek.com/beta";
pub const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1";

pub const DEEPSEEK_CHAT_MODEL: &str = "deepseek-chat";
pub const DEEPSEEK_CODER_MODEL: &str = "deepseek-coder";
pub const OPENROUTER_DEEPSEEK_MODEL: &str = "deepseek/deepseek-chat";

/// Attribution headers the aggregator uses to credit the calling app.
const OPENROUTER_ATTRIBUTION: [(&str, &str); 2] = [
    ("http-referer", "https://github.com/deepgate/deepgate"),
    ("x-title", "deepgate"),
];

/// The closed set of selectable upstream targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfileKind {
    /// DeepSeek chat model on the main endpoint.
    #[default]
    Chat,
    /// DeepSeek coder model on the beta endpoint.
    Coder,
    /// DeepSeek chat through the OpenRouter aggregator.
    OpenRouter,
}

impl ProfileKind {
    /// Parse the `--model` selector. Returns `None` for unknown values.
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "chat" => Some(Self::Chat),
            "coder" => Some(Self::Coder),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Coder => "coder",
            Self::OpenRouter => "openrouter",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream API keys available to the process.
#[derive(Clone, Default)]
pub struct Credentials {
    pub deepseek_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
}

impl Credentials {
    /// Build from optional values, treating empty strings as unset.
    pub fn new(deepseek_api_key: Option<String>, openrouter_api_key: Option<String>) -> Self {
        let non_empty = |key: Option<String>| key.filter(|k| !k.is_empty());
        Self {
            deepseek_api_key: non_empty(deepseek_api_key),
            openrouter_api_key: non_empty(openrouter_api_key),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.deepseek_api_key.is_none() && self.openrouter_api_key.is_none()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("deepseek_api_key", &self.deepseek_api_key.as_ref().map(|_| "<redacted>"))
            .field(
                "openrouter_api_key",
                &self.openrouter_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// The resolved upstream target.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamProfile {
    pub kind: ProfileKind,
    /// Base URL; the inbound path is appended verbatim.
    pub endpoint: String,
    /// Model id written into every upstream request.
    pub model: String,
    /// Bearer credential for the upstream, also the key clients must present.
    pub api_key: String,
}

impl UpstreamProfile {
    /// Resolve `kind` against the available credentials.
    pub fn resolve(kind: ProfileKind, credentials: &Credentials) -> Result<Self, ProfileError> {
        if credentials.is_empty() {
            return Err(ProfileError::NoCredentials);
        }

        let (endpoint, model, key, variable) = match kind {
            ProfileKind::Chat => (
                DEEPSEEK_ENDPOINT,
                DEEPSEEK_CHAT_MODEL,
                &credentials.deepseek_api_key,
                "DEEPSEEK_API_KEY",
            ),
            ProfileKind::Coder => (
                DEEPSEEK_BETA_ENDPOINT,
                DEEPSEEK_CODER_MODEL,
                &credentials.deepseek_api_key,
                "DEEPSEEK_API_KEY",
            ),
            ProfileKind::OpenRouter => (
                OPENROUTER_ENDPOINT,
                OPENROUTER_DEEPSEEK_MODEL,
                &credentials.openrouter_api_key,
                "OPENROUTER_API_KEY",
            ),
        };

        let api_key = key.clone().ok_or(ProfileError::MissingCredential {
            profile: kind.as_str(),
            variable,
        })?;

        Ok(Self {
            kind,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    /// Build a profile against an arbitrary endpoint (tests, self-hosted upstreams).
    pub fn custom(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: ProfileKind::Chat,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Whether the profile targets the multi-provider aggregator.
    pub fn is_aggregator(&self) -> bool {
        self.kind == ProfileKind::OpenRouter
    }

    /// Extra headers the upstream expects from this gateway.
    pub fn attribution_headers(&self) -> &'static [(&'static str, &'static str)] {
        if self.is_aggregator() {
            &OPENROUTER_ATTRIBUTION
        } else {
            &[]
        }
    }

    /// Full upstream URL for an inbound path and optional raw query.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}{path}?{q}", self.endpoint),
            _ => format!("{}{path}", self.endpoint),
        }
    }
}

impl fmt::Debug for UpstreamProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamProfile")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
