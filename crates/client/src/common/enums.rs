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

//! Enumerations shared by the entity families.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, FromRepr};

/// Instrument families known to the backend.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum InstrumentType {
    BinaryOption,
    DigitalOption,
    TurboOption,
    BlitzOption,
    #[serde(rename = "marginal-forex")]
    #[strum(serialize = "marginal-forex")]
    MarginForex,
    #[serde(rename = "marginal-cfd")]
    #[strum(serialize = "marginal-cfd")]
    MarginCfd,
    #[serde(rename = "marginal-crypto")]
    #[strum(serialize = "marginal-crypto")]
    MarginCrypto,
}

impl InstrumentType {
    /// Every instrument type, in the order the positions snapshot requests them.
    pub const ALL: [Self; 7] = [
        Self::DigitalOption,
        Self::BinaryOption,
        Self::TurboOption,
        Self::BlitzOption,
        Self::MarginCfd,
        Self::MarginCrypto,
        Self::MarginForex,
    ];

    /// Option types covered by the positions history.
    pub const OPTIONS: [Self; 4] = [
        Self::DigitalOption,
        Self::BinaryOption,
        Self::TurboOption,
        Self::BlitzOption,
    ];

    /// Types that carry deferred orders.
    pub const WITH_ORDERS: [Self; 4] = [
        Self::DigitalOption,
        Self::MarginCfd,
        Self::MarginCrypto,
        Self::MarginForex,
    ];

    /// Returns the margin kind for margin instruments.
    #[must_use]
    pub const fn margin_kind(&self) -> Option<MarginInstrumentKind> {
        match self {
            Self::MarginForex => Some(MarginInstrumentKind::Forex),
            Self::MarginCfd => Some(MarginInstrumentKind::Cfd),
            Self::MarginCrypto => Some(MarginInstrumentKind::Crypto),
            _ => None,
        }
    }

    /// Returns the `raw_event` field that carries a position's order ids.
    #[must_use]
    pub const fn position_raw_event_key(&self) -> &'static str {
        match self {
            Self::BinaryOption | Self::TurboOption | Self::BlitzOption => {
                "binary_options_option_changed1"
            }
            Self::DigitalOption => "digital_options_position_changed1",
            Self::MarginCfd => "marginal_cfd_position_changed1",
            Self::MarginForex => "marginal_forex_position_changed1",
            Self::MarginCrypto => "marginal_crypto_position_changed1",
        }
    }

    /// Returns the `raw_event` field that carries an order's id, if this type has orders.
    #[must_use]
    pub const fn order_raw_event_key(&self) -> Option<&'static str> {
        match self {
            Self::DigitalOption => Some("digital_options_order_changed1"),
            Self::MarginCfd => Some("marginal_cfd_order_changed1"),
            Self::MarginForex => Some("marginal_forex_order_changed1"),
            Self::MarginCrypto => Some("marginal_crypto_order_changed1"),
            Self::BinaryOption | Self::TurboOption | Self::BlitzOption => None,
        }
    }
}

/// Margin instrument sub-families, used in service names such as `marginal-forex-instruments`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, EnumString, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MarginInstrumentKind {
    Forex,
    Cfd,
    Crypto,
}

impl MarginInstrumentKind {
    /// Returns the instruments service name for this kind.
    #[must_use]
    pub fn instruments_service(&self) -> String {
        format!("marginal-{self}-instruments")
    }
}

/// Balance types, carried on the wire as numeric ids.
#[repr(u8)]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, FromRepr, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BalanceType {
    Real = 1,
    Demo = 4,
}

impl BalanceType {
    /// Returns the wire id.
    #[must_use]
    pub const fn as_id(self) -> u8 {
        self as u8
    }

    /// Parses a wire id, returning `None` for unsupported types.
    #[must_use]
    pub fn from_id(id: u64) -> Option<Self> {
        u8::try_from(id).ok().and_then(Self::from_repr)
    }
}

/// Lifecycle status of a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PositionStatus {
    Open,
    Closed,
    #[serde(other)]
    Unknown,
}

impl PositionStatus {
    /// Returns whether the position has reached its terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Lifecycle status of a deferred order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    New,
    Open,
    Filled,
    Canceled,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Returns whether the order has reached a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Rejected)
    }
}
