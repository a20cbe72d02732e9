//! Command-line interface for Rever

use clap::{Parser, Subcommand};

/// OpenAI-compatible chat completions over a pool of Retool agents
#[derive(Parser)]
#[command(name = "rever")]
#[command(version)]
#[command(about = "OpenAI-compatible chat completions over a pool of Retool agents")]
#[command(
    long_about = "Rever discovers the AI agents of one or more Retool accounts and serves \
    them as OpenAI-compatible models, failing over between accounts when one errors out."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Discover agents on every account and print the resulting models
    Models,
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Rever Configuration
# ===================

# ─────────────────────────────────────────────────────────────────────────────
# SERVER
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"
port = 8000

# ─────────────────────────────────────────────────────────────────────────────
# CLIENT AUTHENTICATION
# ─────────────────────────────────────────────────────────────────────────────
#
# Clients call /v1/* with "Authorization: Bearer <key>".

[auth]
api_keys = ["sk-change-me"]

# ─────────────────────────────────────────────────────────────────────────────
# RETOOL ACCOUNTS
# ─────────────────────────────────────────────────────────────────────────────
#
# Copy the xsrfToken and accessToken cookies from a logged-in browser session.
# Accounts are tried in least-recently-used order; ties go to the one listed first.

[[accounts]]
domain_name = "your-team.retool.com"
xsrf_token = "your-xsrf-token"
access_token = "your-access-token"

# [[accounts]]
# domain_name = "another-team.retool.com"
# xsrf_token = "..."
# access_token = "..."

# ─────────────────────────────────────────────────────────────────────────────
# UPSTREAM (optional, defaults shown)
# ─────────────────────────────────────────────────────────────────────────────

[upstream]
scheme = "https"
# Delay between run-status polls
poll_interval_ms = 1000
# Give up on a run after this long
run_timeout_seconds = 300
# Consecutive failed polls tolerated before the attempt fails
max_poll_errors = 3
# Timeout for each individual HTTP call
request_timeout_seconds = 30
timezone = "Asia/Shanghai"

# ─────────────────────────────────────────────────────────────────────────────
# ACCOUNT POOL (optional, defaults shown)
# ─────────────────────────────────────────────────────────────────────────────

[pool]
# Consecutive failures before an account is rested
max_errors = 3
# How long a failing account rests before it is tried again
cooldown_seconds = 300

# ─────────────────────────────────────────────────────────────────────────────
# SIMULATED STREAMING (optional, defaults shown)
# ─────────────────────────────────────────────────────────────────────────────

[streaming]
chunk_chars = 5
chunk_delay_ms = 10

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
# RUST_LOG overrides this; GET /debug?enable=true switches to debug at runtime
log_level = "info"
"#
}
