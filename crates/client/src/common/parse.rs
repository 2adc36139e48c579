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

//! Serde helpers and conversions for tradehub payloads.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Unsigned(u64),
    Signed(i64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Unsigned(n) => n.to_string(),
            StringOrNumber::Signed(n) => n.to_string(),
        }
    }
}

/// Deserializes an identifier sent either as a JSON string or a JSON number.
///
/// # Errors
///
/// Returns an error if the value is neither a string nor an integer.
pub fn deserialize_string_from_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

/// Deserializes an optional identifier sent either as a JSON string or a JSON number.
///
/// # Errors
///
/// Returns an error if a present value is neither a string nor an integer.
pub fn deserialize_optional_string_from_number<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}

/// Deserializes an optional correlation id. Empty strings and `null` map to `None`.
///
/// # Errors
///
/// Returns an error if the value is neither a string, an integer, nor `null`.
pub fn deserialize_request_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<StringOrNumber> = Option::deserialize(deserializer)?;
    Ok(value.map(String::from).filter(|id| !id.is_empty()))
}

/// Deserializes a Unix millisecond timestamp into a UTC datetime.
///
/// # Errors
///
/// Returns an error if the value is not a representable millisecond timestamp.
pub fn deserialize_millis<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = i64::deserialize(deserializer)?;
    millis_to_datetime(millis)
        .ok_or_else(|| de::Error::custom(format!("invalid millisecond timestamp {millis}")))
}

/// Deserializes an optional Unix millisecond timestamp.
///
/// # Errors
///
/// Returns an error if a present value is not a representable millisecond timestamp.
pub fn deserialize_optional_millis<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<i64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(millis) => millis_to_datetime(millis)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid millisecond timestamp {millis}"))),
    }
}

/// Converts Unix milliseconds into a UTC datetime.
#[must_use]
pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Converts Unix seconds into a UTC datetime.
#[must_use]
pub fn secs_to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Extracts a human readable message from a server error payload.
///
/// Uses `msg.message` when present, otherwise the raw payload text.
#[must_use]
pub fn server_error_message(msg: &Value) -> String {
    match msg.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => match msg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}
