//! Configuration resolution for the SSH session server.
//!
//! Values follow a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided tool argument (highest priority)
//! 2. **Environment Variable** - Value from environment variable (or `.env`)
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_DEFAULT_HOST` | localhost | Host used when `ssh_start_session` omits one |
//! | `SSH_DEFAULT_USERNAME` | `$USER` | Username used when omitted |
//! | `SSH_DEFAULT_PASSWORD` | none | Preconfigured secret used when omitted |
//! | `SSH_CONNECT_TIMEOUT` | 30s | Connection timeout in seconds |
//! | `SSH_COMMAND_TIMEOUT` | 180s | Command execution timeout in seconds |
//!
//! Timeouts below one second are raised to one second.
//! | `SSH_COMPRESSION` | true | Enable zlib compression |
//! | `MCP_PORT` | 8000 | HTTP port of the streamable MCP endpoint |

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default host for new sessions
pub(crate) const DEFAULT_HOST: &str = "localhost";

/// Default SSH connection timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default SSH command execution timeout in seconds
pub(crate) const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 180;

/// Smallest accepted timeout; zero would tear every command down at once
pub(crate) const MIN_TIMEOUT_SECS: u64 = 1;

/// Default port of the HTTP MCP endpoint
pub(crate) const DEFAULT_MCP_PORT: u16 = 8000;

pub(crate) const HOST_ENV_VAR: &str = "SSH_DEFAULT_HOST";
pub(crate) const USERNAME_ENV_VAR: &str = "SSH_DEFAULT_USERNAME";
pub(crate) const PASSWORD_ENV_VAR: &str = "SSH_DEFAULT_PASSWORD";
pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "SSH_CONNECT_TIMEOUT";
pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "SSH_COMMAND_TIMEOUT";
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";
pub(crate) const MCP_PORT_ENV_VAR: &str = "MCP_PORT";

fn env_parse<T: FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|value| value.trim().parse().ok())
}

fn env_non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.is_empty())
}

/// Resolve the target host with priority: parameter -> env var -> localhost
pub fn resolve_host(host_param: Option<String>) -> String {
    host_param
        .filter(|h| !h.is_empty())
        .or_else(|| env_non_empty(HOST_ENV_VAR))
        .unwrap_or_else(|| DEFAULT_HOST.to_string())
}

/// Resolve the username with priority: parameter -> env var -> `$USER`
pub fn resolve_username(username_param: Option<String>) -> Option<String> {
    username_param
        .filter(|u| !u.is_empty())
        .or_else(|| env_non_empty(USERNAME_ENV_VAR))
        .or_else(|| env_non_empty("USER"))
}

/// Resolve the secret with priority: parameter -> env var.
///
/// There is no built-in default secret.
pub fn resolve_password(password_param: Option<String>) -> Option<String> {
    password_param.or_else(|| env::var(PASSWORD_ENV_VAR).ok())
}

/// Resolve the connection timeout with priority: parameter -> env var -> default
pub fn resolve_connect_timeout(timeout_param: Option<u64>) -> Duration {
    let secs = timeout_param
        .or_else(|| env_parse(CONNECT_TIMEOUT_ENV_VAR))
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
    Duration::from_secs(secs.max(MIN_TIMEOUT_SECS))
}

/// Resolve the command timeout with priority: parameter -> env var -> default
pub fn resolve_command_timeout(timeout_param: Option<u64>) -> Duration {
    let secs = timeout_param
        .or_else(|| env_parse(COMMAND_TIMEOUT_ENV_VAR))
        .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);
    Duration::from_secs(secs.max(MIN_TIMEOUT_SECS))
}

/// Resolve the compression setting with priority: parameter -> env var -> default (true)
pub fn resolve_compression(compress_param: Option<bool>) -> bool {
    if let Some(compress) = compress_param {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    true
}

/// Resolve the MCP HTTP port: env var -> default
pub fn resolve_mcp_port() -> u16 {
    env_parse(MCP_PORT_ENV_VAR).unwrap_or(DEFAULT_MCP_PORT)
}
