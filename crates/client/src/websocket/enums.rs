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

//! Enumerations for the websocket session.

use strum::{AsRefStr, Display, FromRepr};

/// Lifecycle state of a [`WsApiClient`](super::client::WsApiClient) session.
///
/// ```text
/// Disconnected -> Connecting -> Authenticating -> ConfiguringSession -> Ready
///                     ^                                                  |
///                     +------------------ Reconnecting <-----------------+
/// any -> Disconnecting -> Closed
/// ```
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, AsRefStr, Display, FromRepr)]
pub enum SessionState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Authenticating = 2,
    ConfiguringSession = 3,
    Ready = 4,
    Reconnecting = 5,
    Disconnecting = 6,
    Closed = 7,
}

impl SessionState {
    /// Returns the `u8` representation of this state.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Creates a `SessionState` from its `u8` representation.
    ///
    /// Unknown values map to [`SessionState::Closed`].
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        Self::from_repr(value).unwrap_or(Self::Closed)
    }

    /// Returns whether the session is `Ready`.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns whether a connect attempt or live session is in progress.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Connecting
                | Self::Authenticating
                | Self::ConfiguringSession
                | Self::Ready
                | Self::Reconnecting
        )
    }
}

/// Type of an outbound request, used to match frames that carry no correlation id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display)]
pub enum RequestKind {
    Authenticate,
    SetOptions,
    Subscribe,
    Unsubscribe,
    Call,
}
