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

//! Network plumbing shared by the tradehub session client.
//!
//! The `tradehub-network` crate knows nothing about the session protocol. It provides:
//!
//! - A websocket transport split into dedicated read and write tasks.
//! - Exponential backoff with jitter for reconnect scheduling.
//! - TLS configuration backed by `rustls`.
//! - Logging and test helpers used across the workspace.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod backoff;
pub mod error;
pub mod logging;
pub mod testing;
pub mod tls;
pub mod websocket;

pub use backoff::ExponentialBackoff;
pub use error::{SendError, TransportError};
