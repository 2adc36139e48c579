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

//! Wire frames for the tradehub websocket protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ustr::Ustr;

use super::{error::WsApiError, subscriptions::SubscriptionKey};
use crate::common::{
    consts::{MSG_AUTHENTICATED, MSG_RESULT, MSG_TIME_SYNC},
    parse::deserialize_request_id,
};

/// Outbound frame envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    /// Frame name, e.g. `sendMessage` or `subscribeMessage`.
    pub name: String,
    /// Decimal correlation id.
    pub request_id: String,
    /// Frame body.
    pub msg: Value,
}

impl OutboundFrame {
    /// Creates a new [`OutboundFrame`].
    #[must_use]
    pub fn new(name: impl Into<String>, request_id: u64, msg: Value) -> Self {
        Self {
            name: name.into(),
            request_id: request_id.to_string(),
            msg,
        }
    }
}

/// Inbound frame as received, before classification.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFrame {
    #[serde(default, deserialize_with = "deserialize_request_id")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub name: Option<Ustr>,
    #[serde(default)]
    pub msg: Value,
    #[serde(default, rename = "microserviceName")]
    pub microservice_name: Option<Ustr>,
    #[serde(default)]
    pub status: Option<u16>,
}

/// Boolean success wrapper returned for result-only requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RequestResult {
    /// Converts an unsuccessful result into an error.
    ///
    /// # Errors
    ///
    /// Returns [`WsApiError::Unsuccessful`] if `success` is false.
    pub fn into_result(self) -> Result<Self, WsApiError> {
        if self.success {
            Ok(self)
        } else {
            Err(WsApiError::Unsuccessful {
                reason: self.reason,
            })
        }
    }
}

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum WsApiMessage {
    /// Correlated reply carrying a payload.
    Reply {
        request_id: String,
        status: u16,
        msg: Value,
    },
    /// Correlated `result` acknowledgement.
    Result {
        request_id: String,
        status: u16,
        msg: Value,
    },
    /// Subscription event.
    Event { key: SubscriptionKey, msg: Value },
    /// Server clock in Unix milliseconds.
    TimeSync(u64),
    /// Uncorrelated `authenticated: false` signal.
    AuthenticationFailed,
    /// Anything else; ignored.
    Unknown { name: Option<Ustr> },
}

/// Classifies a raw text frame.
///
/// # Errors
///
/// Returns an error if the text is not a JSON object, or if a `timeSync` frame carries a
/// non-numeric clock.
pub fn parse_raw_message(text: &str) -> Result<WsApiMessage, WsApiError> {
    let frame: RawFrame = serde_json::from_str(text)?;
    classify_frame(frame)
}

fn classify_frame(frame: RawFrame) -> Result<WsApiMessage, WsApiError> {
    let RawFrame {
        request_id,
        name,
        msg,
        microservice_name,
        status,
    } = frame;

    if let Some(request_id) = request_id {
        let status = status.unwrap_or_default();
        return Ok(if name.is_some_and(|n| n == MSG_RESULT) {
            WsApiMessage::Result {
                request_id,
                status,
                msg,
            }
        } else {
            WsApiMessage::Reply {
                request_id,
                status,
                msg,
            }
        });
    }

    match (microservice_name, name) {
        (Some(service), Some(event)) => Ok(WsApiMessage::Event {
            key: SubscriptionKey::new(service, event),
            msg,
        }),
        (None, Some(name)) if name == MSG_TIME_SYNC => msg
            .as_u64()
            .map(WsApiMessage::TimeSync)
            .ok_or_else(|| WsApiError::Json(format!("invalid timeSync payload: {msg}"))),
        (None, Some(name)) if name == MSG_AUTHENTICATED && msg == Value::Bool(false) => {
            Ok(WsApiMessage::AuthenticationFailed)
        }
        (_, name) => Ok(WsApiMessage::Unknown { name }),
    }
}
