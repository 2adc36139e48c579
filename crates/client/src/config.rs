// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Tradehub client configuration structures.

use anyhow::Context;
use tradehub_network::websocket::{
    WebSocketConfig,
    config::{
        DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_RECONNECT_BACKOFF_FACTOR,
        DEFAULT_RECONNECT_DELAY_INITIAL_MS, DEFAULT_RECONNECT_DELAY_MAX_MS,
        DEFAULT_RECONNECT_JITTER_MS,
    },
};

use crate::common::consts::{
    DEFAULT_CATALOG_REFRESH_SECS, DEFAULT_PAGE_SIZE, DEFAULT_POSITIONS_STATE_REFRESH_SECS,
    TRADEHUB_PLATFORM_ID_ENV, TRADEHUB_USER_AGENT, TRADEHUB_WS_URL_ENV,
};

/// Configuration for the tradehub websocket client.
#[derive(Clone, Debug)]
pub struct WsApiClientConfig {
    /// Websocket endpoint URL.
    pub url: String,
    /// Platform identifier sent in the handshake cookie.
    pub platform_id: u32,
    /// Value of the `user-agent` handshake header.
    pub user_agent: String,
    /// Timeout (milliseconds) for each complete connect or reconnect attempt.
    pub connect_timeout_ms: u64,
    /// Initial reconnection delay (milliseconds).
    pub reconnect_delay_initial_ms: u64,
    /// Multiplier applied to the reconnection delay after each failed attempt.
    pub reconnect_backoff_factor: f64,
    /// Maximum reconnection delay (milliseconds) before jitter.
    pub reconnect_delay_max_ms: u64,
    /// Maximum jitter (milliseconds) added to each reconnection delay.
    pub reconnect_jitter_ms: u64,
    /// Consecutive failed reconnection attempts before the session closes.
    /// `None` retries forever.
    pub reconnect_max_attempts: Option<u32>,
    /// Snapshot page size.
    pub page_size: u32,
    /// Interval (seconds) between positions-state resubscriptions.
    pub positions_state_refresh_secs: u64,
    /// Interval (seconds) between underlying catalog re-fetches.
    pub catalog_refresh_secs: u64,
}

impl Default for WsApiClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            platform_id: 0,
            user_agent: TRADEHUB_USER_AGENT.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            reconnect_delay_initial_ms: DEFAULT_RECONNECT_DELAY_INITIAL_MS,
            reconnect_backoff_factor: DEFAULT_RECONNECT_BACKOFF_FACTOR,
            reconnect_delay_max_ms: DEFAULT_RECONNECT_DELAY_MAX_MS,
            reconnect_jitter_ms: DEFAULT_RECONNECT_JITTER_MS,
            reconnect_max_attempts: None,
            page_size: DEFAULT_PAGE_SIZE,
            positions_state_refresh_secs: DEFAULT_POSITIONS_STATE_REFRESH_SECS,
            catalog_refresh_secs: DEFAULT_CATALOG_REFRESH_SECS,
        }
    }
}

impl WsApiClientConfig {
    /// Creates a new [`WsApiClientConfig`] with default timings.
    #[must_use]
    pub fn new(url: impl Into<String>, platform_id: u32) -> Self {
        Self {
            url: url.into(),
            platform_id,
            ..Default::default()
        }
    }

    /// Creates a new [`WsApiClientConfig`] from `TRADEHUB_WS_URL` and `TRADEHUB_PLATFORM_ID`.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is unset or the platform id is not an integer.
    pub fn from_env() -> anyhow::Result<Self> {
        let url = std::env::var(TRADEHUB_WS_URL_ENV)
            .with_context(|| format!("{TRADEHUB_WS_URL_ENV} must be set"))?;
        let platform_id = std::env::var(TRADEHUB_PLATFORM_ID_ENV)
            .with_context(|| format!("{TRADEHUB_PLATFORM_ID_ENV} must be set"))?
            .parse::<u32>()
            .with_context(|| format!("{TRADEHUB_PLATFORM_ID_ENV} must be an integer"))?;

        Ok(Self::new(url, platform_id))
    }

    /// Returns the handshake headers.
    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("cookie".to_string(), format!("platform={}", self.platform_id)),
            ("user-agent".to_string(), self.user_agent.clone()),
        ]
    }

    /// Builds the transport configuration.
    #[must_use]
    pub fn ws_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::new(self.url.clone(), self.headers());
        config.connect_timeout_ms = Some(self.connect_timeout_ms);
        config.reconnect_delay_initial_ms = Some(self.reconnect_delay_initial_ms);
        config.reconnect_delay_max_ms = Some(self.reconnect_delay_max_ms);
        config.reconnect_backoff_factor = Some(self.reconnect_backoff_factor);
        config.reconnect_jitter_ms = Some(self.reconnect_jitter_ms);
        config.reconnect_max_attempts = self.reconnect_max_attempts;
        config
    }
}
