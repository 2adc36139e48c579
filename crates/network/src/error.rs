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

//! Error types for the websocket transport.

use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors raised while establishing a websocket connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URL could not be turned into a client request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// A configured header name or value is invalid.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    /// The websocket handshake failed.
    #[error("Connection failed: {0}")]
    Connect(String),
    /// The handshake did not complete in time.
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),
}

impl From<tungstenite::Error> for TransportError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Connect(error.to_string())
    }
}

/// Errors raised when queueing an outbound frame.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The write task has stopped, the connection is gone.
    #[error("Connection closed")]
    Closed,
}
