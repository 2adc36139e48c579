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

//! Underlying catalogs for digital options and margin instruments.
//!
//! Each [`UnderlyingCatalog`] loads the underlying list of one instrument family, applies
//! `underlying-list-changed` events as upserts and re-fetches the full list every
//! `catalog_refresh_secs` while the session is `Ready`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use ustr::Ustr;

use crate::{
    common::{enums::MarginInstrumentKind, parse::secs_to_datetime, sync::lock},
    reconcile::{LiveEntity, PeriodicTask, SharedReconciler, registered, shared_reconciler},
    websocket::{
        client::WsApiClient,
        error::WsApiResult,
        requests::{Request, SubscribeRequest, service_message},
        subscriptions::Subscription,
    },
};

const DIGITAL_OPTION_LIST_TYPE: &str = "digital-option";

/// Instrument family served by an underlying catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    DigitalOption,
    Margin(MarginInstrumentKind),
}

impl CatalogKind {
    #[must_use]
    pub fn service(&self) -> String {
        match self {
            Self::DigitalOption => "digital-option-instruments".to_string(),
            Self::Margin(kind) => kind.instruments_service(),
        }
    }

    #[must_use]
    pub const fn version(&self) -> &'static str {
        match self {
            Self::DigitalOption => "3.0",
            Self::Margin(_) => "1.0",
        }
    }

    /// Returns whether a list-changed event tagged `list_type` belongs to this catalog.
    #[must_use]
    pub fn accepts(&self, list_type: Option<&str>) -> bool {
        match self {
            Self::DigitalOption => list_type == Some(DIGITAL_OPTION_LIST_TYPE),
            Self::Margin(_) => true,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct TradingSessionMsg {
    pub open: i64,
    pub close: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UnderlyingMsg {
    pub active_id: u64,
    #[serde(default)]
    pub is_suspended: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schedule: Vec<TradingSessionMsg>,
}

/// Underlying list reply or `underlying-list-changed` payload.
///
/// Digital option lists arrive under `underlying`, margin lists under `items`.
#[derive(Clone, Debug, Deserialize)]
pub struct UnderlyingListMsg {
    #[serde(rename = "type")]
    pub list_type: Option<String>,
    #[serde(default, alias = "items")]
    pub underlying: Vec<UnderlyingMsg>,
}

/// A trading window, inclusive at both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TradingSession {
    pub open: DateTime<Utc>,
    pub close: DateTime<Utc>,
}

impl TradingSession {
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.open <= at && at <= self.close
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Underlying {
    pub active_id: u64,
    pub name: String,
    pub is_suspended: bool,
    pub schedule: Vec<TradingSession>,
}

impl From<UnderlyingMsg> for Underlying {
    fn from(msg: UnderlyingMsg) -> Self {
        let schedule = msg
            .schedule
            .iter()
            .filter_map(|session| {
                Some(TradingSession {
                    open: secs_to_datetime(session.open)?,
                    close: secs_to_datetime(session.close)?,
                })
            })
            .collect();

        Self {
            active_id: msg.active_id,
            name: msg.name,
            is_suspended: msg.is_suspended,
            schedule,
        }
    }
}

impl Underlying {
    /// Returns whether the underlying is tradable at `at`.
    #[must_use]
    pub fn is_available_for_trading_at(&self, at: DateTime<Utc>) -> bool {
        !self.is_suspended && self.schedule.iter().any(|session| session.contains(at))
    }
}

impl LiveEntity for Underlying {
    type Id = u64;

    fn external_id(&self) -> u64 {
        self.active_id
    }
}

/// `<service>.get-underlying-list`.
#[derive(Clone, Copy, Debug)]
pub struct GetUnderlyingList {
    pub kind: CatalogKind,
}

impl Request for GetUnderlyingList {
    type Response = UnderlyingListMsg;

    fn message_body(&self) -> Value {
        let body = match self.kind {
            CatalogKind::DigitalOption => json!({ "filter_suspended": true }),
            CatalogKind::Margin(_) => json!({}),
        };
        service_message(
            &format!("{}.get-underlying-list", self.kind.service()),
            self.kind.version(),
            body,
        )
    }
}

/// `<service>.underlying-list-changed`.
#[derive(Clone, Copy, Debug)]
pub struct UnderlyingListChangedSubscription {
    pub kind: CatalogKind,
}

impl SubscribeRequest for UnderlyingListChangedSubscription {
    type Event = UnderlyingListMsg;

    fn service_name(&self) -> Ustr {
        Ustr::from(self.kind.service().as_str())
    }

    fn event_name(&self) -> Ustr {
        Ustr::from("underlying-list-changed")
    }

    fn version(&self) -> &'static str {
        self.kind.version()
    }
}

fn apply_list(state: &SharedReconciler<Underlying>, msg: UnderlyingListMsg, from_snapshot: bool) {
    let mut state = lock(state);
    for row in msg.underlying {
        let underlying = Underlying::from(row);
        if from_snapshot {
            state.apply_snapshot_row(underlying);
        } else {
            state.apply_event(underlying);
        }
    }
}

/// Underlyings of one instrument family keyed by active id.
#[derive(Debug)]
pub struct UnderlyingCatalog {
    kind: CatalogKind,
    client: WsApiClient,
    state: SharedReconciler<Underlying>,
    subscription: Subscription,
    refresh: PeriodicTask,
}

impl UnderlyingCatalog {
    /// Subscribes to list changes, then loads the current list.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be registered or the list request fails.
    pub async fn create(client: &WsApiClient, kind: CatalogKind) -> WsApiResult<Self> {
        let state = shared_reconciler::<Underlying>();

        let event_state = state.clone();
        let subscription = registered(
            client
                .subscribe(
                    &UnderlyingListChangedSubscription { kind },
                    move |msg: UnderlyingListMsg| {
                        if kind.accepts(msg.list_type.as_deref()) {
                            apply_list(&event_state, msg, false);
                        }
                    },
                )
                .await,
        )?;

        let list = client.request(GetUnderlyingList { kind }).await?;
        tracing::debug!("Loaded {} {} underlyings", list.underlying.len(), kind.service());
        apply_list(&state, list, true);

        let refresh = spawn_refresh(client, kind, &state);

        Ok(Self {
            kind,
            client: client.clone(),
            state,
            subscription,
            refresh,
        })
    }

    #[must_use]
    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    #[must_use]
    pub fn get_underlyings(&self) -> Vec<Underlying> {
        lock(&self.state).active().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, active_id: u64) -> Option<Underlying> {
        lock(&self.state).get(&active_id).cloned()
    }

    /// Returns underlyings tradable at `at`.
    #[must_use]
    pub fn underlyings_available_for_trading_at(&self, at: DateTime<Utc>) -> Vec<Underlying> {
        lock(&self.state)
            .active()
            .filter(|underlying| underlying.is_available_for_trading_at(at))
            .cloned()
            .collect()
    }

    /// Stops the periodic refresh and unsubscribes from list changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the unsubscribe request fails.
    pub async fn close(&self) -> WsApiResult<()> {
        self.refresh.close();
        self.client.unsubscribe(&self.subscription).await.map(|_| ())
    }
}

fn spawn_refresh(
    client: &WsApiClient,
    kind: CatalogKind,
    state: &SharedReconciler<Underlying>,
) -> PeriodicTask {
    let period = Duration::from_secs(client.config().catalog_refresh_secs);
    let task_client = client.clone();
    let state = state.clone();

    PeriodicTask::spawn("underlying-catalog-refresh", period, client.clone(), move || {
        let client = task_client.clone();
        let state = state.clone();
        async move {
            let list = client.request(GetUnderlyingList { kind }).await?;
            apply_list(&state, list, true);
            Ok(())
        }
    })
}
