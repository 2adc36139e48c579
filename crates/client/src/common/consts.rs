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

//! Core constants for the tradehub client.

/// Client identifier used in log targets and the default user agent.
pub const TRADEHUB: &str = "TRADEHUB";

/// Default `user-agent` handshake header.
pub const TRADEHUB_USER_AGENT: &str = concat!("tradehub-client/", env!("CARGO_PKG_VERSION"));

// Environment variables
pub const TRADEHUB_WS_URL_ENV: &str = "TRADEHUB_WS_URL";
pub const TRADEHUB_PLATFORM_ID_ENV: &str = "TRADEHUB_PLATFORM_ID";
pub const TRADEHUB_SSID_ENV: &str = "TRADEHUB_SSID";

// Outbound frame names
pub const MSG_SEND_MESSAGE: &str = "sendMessage";
pub const MSG_SUBSCRIBE: &str = "subscribeMessage";
pub const MSG_UNSUBSCRIBE: &str = "unsubscribeMessage";
pub const MSG_AUTHENTICATE: &str = "authenticate";
pub const MSG_SET_OPTIONS: &str = "setOptions";

// Inbound frame names
pub const MSG_RESULT: &str = "result";
pub const MSG_TIME_SYNC: &str = "timeSync";
pub const MSG_AUTHENTICATED: &str = "authenticated";

/// Protocol revision announced in the `authenticate` frame.
pub const AUTH_PROTOCOL_VERSION: u32 = 3;

/// Replies with a status at or above this value are server errors.
pub const SERVER_ERROR_STATUS: u16 = 4000;

// Reconciliation defaults
pub const DEFAULT_PAGE_SIZE: u32 = 30;
pub const DEFAULT_POSITIONS_STATE_REFRESH_SECS: u64 = 60;
pub const DEFAULT_CATALOG_REFRESH_SECS: u64 = 600;

/// Amount a demo balance is reset to.
pub const DEMO_BALANCE_RESET_AMOUNT: f64 = 10_000.0;
