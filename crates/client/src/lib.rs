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

//! Session client and live state reconciliation for the tradehub websocket API.
//!
//! The `tradehub-client` crate keeps one persistent websocket session to the trading backend and
//! builds two things on top of it:
//!
//! - **Session core** ([`websocket`]): correlated request/response calls, subscription dispatch
//!   keyed by `(service, event)`, server time sync, and automatic reconnection with
//!   exponential backoff that replays every registered subscription.
//! - **Reconciliation** ([`reconcile`]): a generic engine merging paginated snapshots with live
//!   versioned events, promoting terminal entities into a history log.
//!
//! The entity families ([`portfolio`], [`balances`], [`instruments`]) instantiate the
//! reconciler for positions, orders, balances and underlying catalogs.
//!
//! # Environment
//!
//! - `TRADEHUB_WS_URL`: websocket endpoint, usually `wss://ws.trade.<brand>/echo/websocket`.
//! - `TRADEHUB_PLATFORM_ID`: platform identifier sent in the handshake cookie.
//! - `TRADEHUB_SSID`: session token used by [`websocket::auth::SsidAuthMethod`].

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod balances;
pub mod common;
pub mod config;
pub mod instruments;
pub mod portfolio;
pub mod profile;
pub mod reconcile;
pub mod websocket;

pub use crate::{
    config::WsApiClientConfig,
    websocket::{
        client::WsApiClient,
        error::{SubscribeError, WsApiError, WsApiResult},
    },
};
