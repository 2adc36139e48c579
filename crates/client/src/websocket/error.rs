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

//! Error types for the tradehub websocket session.

use thiserror::Error;
use tokio_tungstenite::tungstenite;
use tradehub_network::{SendError, TransportError};

use super::subscriptions::Subscription;

/// Error types for the tradehub websocket session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WsApiError {
    /// No transport is attached to the session.
    #[error("Not connected")]
    NotConnected,
    /// Transport-level error while connecting.
    #[error("Transport error: {0}")]
    Transport(String),
    /// Failed to queue a frame on the transport.
    #[error("Send error: {0}")]
    Send(String),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// Reply carried a server error status.
    #[error("Server error {status}: {message}")]
    Server {
        /// The reply status (at least 4000).
        status: u16,
        /// The error message from the server.
        message: String,
    },
    /// A result wrapper reported `success=false`.
    #[error("Request unsuccessful: {}", reason.as_deref().unwrap_or("no reason given"))]
    Unsuccessful {
        /// The reason from the result wrapper, if any.
        reason: Option<String>,
    },
    /// Authentication failed or was revoked.
    #[error("Authentication error: {0}")]
    Authentication(String),
    /// The session was explicitly disconnected while the request was pending.
    #[error("Session disconnected")]
    Disconnected,
    /// Operation timeout.
    #[error("Timeout: {0}")]
    Timeout(String),
    /// Generic client error.
    #[error("Client error: {0}")]
    ClientError(String),
}

impl From<tungstenite::Error> for WsApiError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for WsApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<TransportError> for WsApiError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<SendError> for WsApiError {
    fn from(error: SendError) -> Self {
        Self::Send(error.to_string())
    }
}

impl From<String> for WsApiError {
    fn from(msg: String) -> Self {
        Self::ClientError(msg)
    }
}

/// Result type alias for tradehub websocket operations.
pub type WsApiResult<T> = Result<T, WsApiError>;

/// Errors returned by `subscribe`.
#[derive(Debug, Clone, Error)]
pub enum SubscribeError {
    /// The subscription could not be registered.
    #[error(transparent)]
    NotRegistered(WsApiError),
    /// The subscription is registered locally but the server rejected the acknowledgement.
    ///
    /// The registration survives and is replayed after reconnects, so the handle is returned
    /// for the caller to keep or unsubscribe.
    #[error("Subscription {subscription} not acknowledged: {source}")]
    NotAcknowledged {
        /// The local registration.
        subscription: Subscription,
        /// Why the acknowledgement failed.
        source: WsApiError,
    },
}

impl SubscribeError {
    /// Returns the local registration if one exists.
    #[must_use]
    pub fn subscription(&self) -> Option<&Subscription> {
        match self {
            Self::NotRegistered(_) => None,
            Self::NotAcknowledged { subscription, .. } => Some(subscription),
        }
    }

    /// Returns the underlying session error.
    #[must_use]
    pub fn error(&self) -> &WsApiError {
        match self {
            Self::NotRegistered(error) | Self::NotAcknowledged { source: error, .. } => error,
        }
    }
}

impl From<WsApiError> for SubscribeError {
    fn from(error: WsApiError) -> Self {
        Self::NotRegistered(error)
    }
}

/// Returns whether a failed request may succeed if retried on a fresh session.
#[must_use]
pub fn should_retry_ws_api_error(error: &WsApiError) -> bool {
    match error {
        WsApiError::Transport(_)
        | WsApiError::Send(_)
        | WsApiError::NotConnected
        | WsApiError::Timeout(_) => true,
        WsApiError::Json(_)
        | WsApiError::Server { .. }
        | WsApiError::Unsuccessful { .. }
        | WsApiError::Authentication(_)
        | WsApiError::Disconnected
        | WsApiError::ClientError(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_server_error_display() {
        let error = WsApiError::Server {
            status: 4003,
            message: "balance not found".to_string(),
        };
        assert_eq!(error.to_string(), "Server error 4003: balance not found");
    }

    #[rstest]
    fn test_unsuccessful_display_without_reason() {
        let error = WsApiError::Unsuccessful { reason: None };
        assert_eq!(error.to_string(), "Request unsuccessful: no reason given");
    }

    #[rstest]
    #[case(WsApiError::NotConnected, true)]
    #[case(WsApiError::Timeout("connect".to_string()), true)]
    #[case(WsApiError::Disconnected, false)]
    #[case(WsApiError::Server { status: 4000, message: String::new() }, false)]
    fn test_should_retry(#[case] error: WsApiError, #[case] expected: bool) {
        assert_eq!(should_retry_ws_api_error(&error), expected);
    }

    #[rstest]
    fn test_send_error_conversion() {
        let error: WsApiError = SendError::Closed.into();
        assert!(matches!(error, WsApiError::Send(_)));
    }
}
