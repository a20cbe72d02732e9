//! Configuration management for Rever
//!
//! Parses TOML configuration files and provides typed access to settings.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8000
}

/// Client API keys accepted in `Authorization: Bearer <key>`
#[derive(Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    api_keys: Vec<String>,
}

impl AuthConfig {
    /// Build an auth config from a list of keys (no validation)
    pub fn new(api_keys: Vec<String>) -> Self {
        Self { api_keys }
    }

    /// Check whether `key` is one of the configured client keys
    pub fn accepts(&self, key: &str) -> bool {
        self.api_keys.iter().any(|k| k == key)
    }

    /// Number of configured keys
    pub fn key_count(&self) -> usize {
        self.api_keys.len()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_keys", &format_args!("<{} redacted>", self.api_keys.len()))
            .finish()
    }
}

/// One Retool account (tenant) used to serve completions
///
/// Fields are private so the secret material is only reachable through
/// accessors and never printed by `Debug`.
#[derive(Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    domain_name: String,
    xsrf_token: String,
    access_token: String,
}

impl AccountConfig {
    pub fn new(
        domain_name: impl Into<String>,
        xsrf_token: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            domain_name: domain_name.into(),
            xsrf_token: xsrf_token.into(),
            access_token: access_token.into(),
        }
    }

    /// Get the account domain (e.g. `acme.retool.com`)
    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    /// Get the `x-xsrf-token` header value
    pub fn xsrf_token(&self) -> &str {
        &self.xsrf_token
    }

    /// Get the `accessToken` cookie value
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("domain_name", &self.domain_name)
            .field("xsrf_token", &"<redacted>")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Retool API client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// `https` in production; `http` is accepted for local mocks
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_run_timeout_seconds")]
    pub run_timeout_seconds: u64,
    /// Consecutive failed run-log fetches tolerated before giving up on a run
    #[serde(default = "default_max_poll_errors")]
    pub max_poll_errors: u32,
    /// Timeout applied to each individual HTTP call
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl UpstreamConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            poll_interval_ms: default_poll_interval_ms(),
            run_timeout_seconds: default_run_timeout_seconds(),
            max_poll_errors: default_max_poll_errors(),
            request_timeout_seconds: default_request_timeout_seconds(),
            user_agent: default_user_agent(),
            timezone: default_timezone(),
        }
    }
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_run_timeout_seconds() -> u64 {
    300
}

fn default_max_poll_errors() -> u32 {
    3
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("Rever/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timezone() -> String {
    "Asia/Shanghai".to_string()
}

/// Account pool health thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Error count at which an account enters cool-down
    #[serde(default = "default_max_errors")]
    pub max_errors: u32,
    /// Time since last use after which a cooling account is retried
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

impl PoolConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_errors: default_max_errors(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

fn default_max_errors() -> u32 {
    3
}

fn default_cooldown_seconds() -> u64 {
    300
}

/// Synthesized streaming settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Characters per content chunk
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    /// Pause after each content chunk
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
}

impl StreamingConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: default_chunk_chars(),
            chunk_delay_ms: default_chunk_delay_ms(),
        }
    }
}

fn default_chunk_chars() -> usize {
    5
}

fn default_chunk_delay_ms() -> u64 {
    10
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        let config: Self = toml::from_str(&content).map_err(|source| {
            AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// Called by `from_file()` and `from_str()`; call it explicitly when
    /// building a `Config` by other means.
    pub fn validate(&self) -> AppResult<()> {
        if self.accounts.is_empty() {
            return Err(AppError::Config(
                "no [[accounts]] configured. At least one Retool account is required:\n\n\
                [[accounts]]\n\
                domain_name = \"your-team.retool.com\"\n\
                xsrf_token = \"...\"\n\
                access_token = \"...\""
                    .to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (index, account) in self.accounts.iter().enumerate() {
            let domain = account.domain_name.trim();
            if domain.is_empty() {
                return Err(AppError::Config(format!(
                    "accounts[{}] has an empty domain_name",
                    index
                )));
            }
            if domain.contains("://") || domain.contains('/') {
                return Err(AppError::Config(format!(
                    "accounts[{}] domain_name '{}' must be a bare host (no scheme or path); \
                    set upstream.scheme instead",
                    index, domain
                )));
            }
            if !seen.insert(domain.to_ascii_lowercase()) {
                return Err(AppError::Config(format!(
                    "accounts[{}] duplicates domain_name '{}'",
                    index, domain
                )));
            }
            if account.xsrf_token.trim().is_empty() || account.access_token.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "account '{}' must set both xsrf_token and access_token",
                    domain
                )));
            }
        }

        if self.auth.api_keys.is_empty() {
            return Err(AppError::Config(
                "auth.api_keys is empty; no client could ever authenticate".to_string(),
            ));
        }
        if self.auth.api_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(AppError::Config(
                "auth.api_keys contains an empty key".to_string(),
            ));
        }

        if self.upstream.scheme != "https" && self.upstream.scheme != "http" {
            return Err(AppError::Config(format!(
                "upstream.scheme must be 'https' or 'http', got '{}'",
                self.upstream.scheme
            )));
        }
        if self.upstream.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "upstream.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.upstream.run_timeout_seconds == 0 {
            return Err(AppError::Config(
                "upstream.run_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.upstream.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "upstream.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.pool.max_errors == 0 {
            return Err(AppError::Config(
                "pool.max_errors must be greater than 0".to_string(),
            ));
        }

        if self.streaming.chunk_chars == 0 {
            return Err(AppError::Config(
                "streaming.chunk_chars must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
