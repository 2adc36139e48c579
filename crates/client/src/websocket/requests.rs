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

//! Typed request and subscription descriptors.
//!
//! A [`Request`] knows its frame name, its body and how its reply is decoded. A
//! [`SubscribeRequest`] knows its `(service, event)` key and the body that is re-sent verbatim
//! on every subscribe, including replays after reconnects.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use ustr::Ustr;

use super::{enums::RequestKind, messages::RequestResult, subscriptions::SubscriptionKey};
use crate::common::consts::{
    AUTH_PROTOCOL_VERSION, MSG_AUTHENTICATE, MSG_SEND_MESSAGE, MSG_SET_OPTIONS,
};

/// A correlated request.
pub trait Request: Send {
    /// Decoded reply type.
    type Response: DeserializeOwned + Send + 'static;

    /// Outbound frame name.
    fn message_name(&self) -> &'static str {
        MSG_SEND_MESSAGE
    }

    /// Outbound frame body.
    fn message_body(&self) -> Value;

    /// Whether the reply is only a `{success, reason}` wrapper.
    fn result_only(&self) -> bool {
        false
    }

    /// Request type, used to match uncorrelated failure signals.
    fn kind(&self) -> RequestKind {
        RequestKind::Call
    }
}

/// A subscription descriptor.
pub trait SubscribeRequest: Send + Sync {
    /// Decoded event type delivered to callbacks.
    type Event: DeserializeOwned + Send + 'static;

    /// Service that publishes the event, matched against `microserviceName`.
    fn service_name(&self) -> Ustr;

    /// Event name.
    fn event_name(&self) -> Ustr;

    /// Event schema version.
    fn version(&self) -> &'static str;

    /// Routing filters sent as `params.routingFilters`.
    fn routing_filters(&self) -> Option<Value> {
        None
    }

    /// Returns the registry key for this subscription.
    fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(self.service_name(), self.event_name())
    }

    /// Body of the `subscribeMessage`/`unsubscribeMessage` frames.
    fn message_body(&self) -> Value {
        let mut body = json!({
            "name": format!("{}.{}", self.service_name(), self.event_name()),
            "version": self.version(),
        });
        if let Some(filters) = self.routing_filters() {
            body["params"] = json!({ "routingFilters": filters });
        }
        body
    }
}

/// Builds a `sendMessage` body for a service method call.
#[must_use]
pub fn service_message(name: &str, version: &str, body: Value) -> Value {
    json!({
        "name": name,
        "version": version,
        "body": body,
    })
}

/// Session authentication with an SSID token.
#[derive(Clone)]
pub struct Authenticate {
    ssid: String,
}

impl Authenticate {
    /// Creates a new [`Authenticate`] request.
    #[must_use]
    pub fn new(ssid: impl Into<String>) -> Self {
        Self { ssid: ssid.into() }
    }
}

impl std::fmt::Debug for Authenticate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticate")
            .field("ssid", &"<redacted>")
            .finish()
    }
}

impl Request for Authenticate {
    type Response = bool;

    fn message_name(&self) -> &'static str {
        MSG_AUTHENTICATE
    }

    fn message_body(&self) -> Value {
        json!({
            "ssid": self.ssid,
            "protocol": AUTH_PROTOCOL_VERSION,
            "session_id": "",
            "client_session_id": "",
        })
    }

    fn kind(&self) -> RequestKind {
        RequestKind::Authenticate
    }
}

/// Session options sent on every connect.
#[derive(Clone, Copy, Debug)]
pub struct SetOptions {
    pub send_results: bool,
}

impl Request for SetOptions {
    type Response = RequestResult;

    fn message_name(&self) -> &'static str {
        MSG_SET_OPTIONS
    }

    fn message_body(&self) -> Value {
        json!({ "sendResults": self.send_results })
    }

    fn result_only(&self) -> bool {
        true
    }

    fn kind(&self) -> RequestKind {
        RequestKind::SetOptions
    }
}
