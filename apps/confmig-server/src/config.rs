use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

/// Server configuration, read once from `CONFMIG_*` environment
/// variables at startup. Everything except the management-API token has
/// a default suitable for local development.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub api_base: String,
    pub api_token: Option<String>,
    pub client_origin: String,
    pub refresh: Duration,
    pub stream_buffer: usize,
    pub stream_retries: u32,
    pub cli_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind = env_or("CONFMIG_BIND", "127.0.0.1:8090")
            .parse::<SocketAddr>()
            .context("CONFMIG_BIND is not a valid socket address")?;
        let api_base = env_or("CONFMIG_API_BASE", "https://api.supabase.com");
        let api_token = std::env::var("CONFMIG_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        let client_origin = env_or("CONFMIG_CLIENT_ORIGIN", "http://localhost:5173");
        let refresh = Duration::from_secs(env_parse("CONFMIG_REFRESH_SECS", 60)?);
        let stream_buffer = env_parse("CONFMIG_STREAM_BUFFER", 128)?;
        let stream_retries = env_parse("CONFMIG_STREAM_RETRIES", 5)?;
        let cli_timeout = Duration::from_secs(env_parse("CONFMIG_CLI_TIMEOUT_SECS", 120)?);
        Ok(Self {
            bind,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_token,
            client_origin,
            refresh,
            stream_buffer,
            stream_retries,
            cli_timeout,
        })
    }

    pub fn stream_config(&self) -> confmig_core::stream::StreamConfig {
        confmig_core::stream::StreamConfig {
            refresh: self.refresh,
            buffer: self.stream_buffer,
            max_attempts: self.stream_retries,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8090".parse().expect("static default addr"),
            api_base: "https://api.supabase.com".into(),
            api_token: None,
            client_origin: "http://localhost:5173".into(),
            refresh: Duration::from_secs(60),
            stream_buffer: 128,
            stream_retries: 5,
            cli_timeout: Duration::from_secs(120),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        _ => Ok(default),
    }
}
