//! Command-line arguments and their mapping onto gateway configuration.

use std::time::Duration;

use clap::Parser;
use tracing::warn;

use deepgate_core::{Credentials, ProfileKind};
use deepgate_proxy::{ClientConfig, ServerConfig, server::DEFAULT_MAX_BODY_BYTES};

/// OpenAI-compatible gateway in front of DeepSeek models.
///
/// Clients talk to it as if it were the OpenAI API with model `gpt-4o`, and
/// authenticate with the same key the gateway uses upstream.
#[derive(Parser, Debug)]
#[command(name = "deepgate")]
#[command(about = "OpenAI-compatible gateway for DeepSeek models")]
#[command(version)]
pub struct Cli {
    /// Upstream profile: chat, coder or openrouter
    #[arg(long, default_value = "chat")]
    pub model: String,

    /// DeepSeek API key (chat and coder profiles)
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    pub deepseek_api_key: Option<String>,

    /// OpenRouter API key (openrouter profile)
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 9000)]
    pub port: u16,

    /// Overall timeout for one upstream call, streamed bodies included
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    pub upstream_timeout_secs: u64,

    /// Seconds between keep-alive comments on idle streams
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
    pub heartbeat_secs: u64,

    /// Largest accepted request body
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// The selected profile. Unknown names fall back to `chat`.
    pub fn profile_kind(&self) -> ProfileKind {
        ProfileKind::from_flag(&self.model).unwrap_or_else(|| {
            warn!(
                requested = %self.model,
                "Invalid model specified, using default chat profile"
            );
            ProfileKind::default()
        })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.deepseek_api_key.clone(),
            self.openrouter_api_key.clone(),
        )
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            client: ClientConfig {
                timeout: Duration::from_secs(self.upstream_timeout_secs),
                ..ClientConfig::default()
            },
            heartbeat: Duration::from_secs(self.heartbeat_secs),
            max_body_bytes: self.max_body_bytes,
        }
    }
}
