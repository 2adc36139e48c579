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

//! Configuration for websocket connections.
//!
//! # Reconnection Strategy
//!
//! The transport itself never reconnects. The session layer owns the retry loop and reads the
//! `reconnect_*` fields from here. `reconnect_max_attempts: None` retries forever.

use std::{fmt::Debug, time::Duration};

use crate::backoff::ExponentialBackoff;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RECONNECT_DELAY_INITIAL_MS: u64 = 100;
pub const DEFAULT_RECONNECT_DELAY_MAX_MS: u64 = 10_000;
pub const DEFAULT_RECONNECT_BACKOFF_FACTOR: f64 = 2.0;
pub const DEFAULT_RECONNECT_JITTER_MS: u64 = 1_000;

/// Configuration for websocket connections.
#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// The URL to connect to.
    pub url: String,
    /// Headers sent with the handshake request.
    pub headers: Vec<(String, String)>,
    /// The timeout (milliseconds) for the handshake and, at the session layer, for each
    /// complete connect attempt.
    pub connect_timeout_ms: Option<u64>,
    /// The initial reconnection delay (milliseconds).
    pub reconnect_delay_initial_ms: Option<u64>,
    /// The maximum reconnection delay (milliseconds) before jitter.
    pub reconnect_delay_max_ms: Option<u64>,
    /// The exponential backoff factor for reconnection delays.
    pub reconnect_backoff_factor: Option<f64>,
    /// The maximum jitter (milliseconds) added to reconnection delays.
    pub reconnect_jitter_ms: Option<u64>,
    /// The maximum number of consecutive failed reconnection attempts.
    /// - `None`: Unlimited reconnection attempts.
    /// - `Some(n)`: After n failed attempts, the session closes.
    pub reconnect_max_attempts: Option<u32>,
}

impl WebSocketConfig {
    /// Creates a new [`WebSocketConfig`] with default reconnect settings.
    #[must_use]
    pub fn new(url: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            headers,
            connect_timeout_ms: None,
            reconnect_delay_initial_ms: None,
            reconnect_delay_max_ms: None,
            reconnect_backoff_factor: None,
            reconnect_jitter_ms: None,
            reconnect_max_attempts: None,
        }
    }

    /// Returns the connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(
            self.connect_timeout_ms
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
        )
    }

    /// Builds the reconnect backoff described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backoff settings are inconsistent.
    pub fn backoff(&self) -> anyhow::Result<ExponentialBackoff> {
        ExponentialBackoff::new(
            Duration::from_millis(
                self.reconnect_delay_initial_ms
                    .unwrap_or(DEFAULT_RECONNECT_DELAY_INITIAL_MS),
            ),
            Duration::from_millis(
                self.reconnect_delay_max_ms
                    .unwrap_or(DEFAULT_RECONNECT_DELAY_MAX_MS),
            ),
            self.reconnect_backoff_factor
                .unwrap_or(DEFAULT_RECONNECT_BACKOFF_FACTOR),
            self.reconnect_jitter_ms
                .unwrap_or(DEFAULT_RECONNECT_JITTER_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_defaults_applied() {
        let config = WebSocketConfig::new("ws://localhost:1234/echo/websocket", vec![]);
        let backoff = config.backoff().unwrap();

        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(backoff.current_delay(), Duration::from_millis(100));
        assert!(config.reconnect_max_attempts.is_none());
    }

    #[rstest]
    fn test_invalid_backoff_reported() {
        let mut config = WebSocketConfig::new("ws://localhost:1234", vec![]);
        config.reconnect_delay_initial_ms = Some(5_000);
        config.reconnect_delay_max_ms = Some(1_000);

        assert!(config.backoff().is_err());
    }
}
