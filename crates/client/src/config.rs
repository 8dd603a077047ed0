// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::channel::ReconnectPolicy;

/// Configuration for the shopwire admin client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL of the admin API.
    #[arg(long, default_value = "http://127.0.0.1:4000/api", env = "SHOPWIRE_API_URL")]
    pub base_url: String,

    /// Realtime channel URL (http/https is rewritten to ws/wss).
    #[arg(long, default_value = "http://127.0.0.1:4000/realtime", env = "SHOPWIRE_WS_URL")]
    pub ws_url: String,

    /// Admin account email for login.
    #[arg(long, env = "SHOPWIRE_EMAIL")]
    pub email: Option<String>,

    /// Admin account password for login.
    #[arg(long, env = "SHOPWIRE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in milliseconds.
    #[arg(long, default_value_t = 30000, env = "SHOPWIRE_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Max consecutive failed channel connect attempts before giving up.
    #[arg(long, default_value_t = 5, env = "SHOPWIRE_RECONNECT_MAX_ATTEMPTS")]
    pub reconnect_max_attempts: u32,

    /// Initial reconnect backoff in milliseconds (doubles per failure).
    #[arg(long, default_value_t = 500, env = "SHOPWIRE_RECONNECT_BASE_MS")]
    pub reconnect_base_ms: u64,

    /// Reconnect backoff ceiling in milliseconds.
    #[arg(long, default_value_t = 10000, env = "SHOPWIRE_RECONNECT_MAX_MS")]
    pub reconnect_max_ms: u64,

    /// State directory for persisted tokens. Defaults to the platform state dir.
    #[arg(long, env = "SHOPWIRE_STATE_DIR")]
    pub state_dir: Option<std::path::PathBuf>,
}

impl ClientConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.reconnect_max_attempts,
            base_backoff: std::time::Duration::from_millis(self.reconnect_base_ms),
            max_backoff: std::time::Duration::from_millis(self.reconnect_max_ms),
        }
    }

    pub fn state_dir(&self) -> std::path::PathBuf {
        self.state_dir.clone().unwrap_or_else(crate::token::state_dir)
    }
}
