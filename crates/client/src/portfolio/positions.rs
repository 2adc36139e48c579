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

//! Open positions kept current from the portfolio service.
//!
//! [`Positions`] loads every open position, then follows `position-changed` events and the
//! periodic `positions-state` broadcast. Closed positions move to the shared history, which
//! [`PositionsHistory`] extends with older pages on demand.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tradehub_network::logging::{log_task_started, log_task_stopped};
use ustr::Ustr;

use super::history::PositionsHistory;
use crate::{
    common::{
        enums::{InstrumentType, PositionStatus},
        parse::{deserialize_millis, deserialize_optional_millis, deserialize_string_from_number},
        sync::lock,
    },
    reconcile::{
        Applied, LiveEntity, PeriodicTask, SecondaryKey, SharedReconciler, SnapshotPage,
        SnapshotSource, load_snapshot, registered, shared_reconciler,
    },
    websocket::{
        client::WsApiClient,
        error::WsApiResult,
        messages::RequestResult,
        requests::{Request, SubscribeRequest, service_message},
        subscriptions::Subscription,
    },
};

const POSITION_UPDATES_CAPACITY: usize = 1_024;

/// Position as sent in snapshot pages, history pages and `position-changed` events.
#[derive(Clone, Debug, Deserialize)]
pub struct PositionMsg {
    pub external_id: u64,
    #[serde(rename = "id", deserialize_with = "deserialize_string_from_number")]
    pub internal_id: String,
    pub instrument_type: InstrumentType,
    pub status: PositionStatus,
    pub active_id: Option<u64>,
    pub user_id: Option<u64>,
    pub user_balance_id: Option<u64>,
    pub invest: Option<f64>,
    pub open_quote: Option<f64>,
    #[serde(deserialize_with = "deserialize_millis")]
    pub open_time: DateTime<Utc>,
    pub close_profit: Option<f64>,
    pub close_quote: Option<f64>,
    pub close_reason: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_millis")]
    pub close_time: Option<DateTime<Utc>>,
    pub expected_profit: Option<f64>,
    pub pnl: Option<f64>,
    pub pnl_realized: Option<f64>,
    pub pnl_net: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_millis")]
    pub quote_timestamp: Option<DateTime<Utc>>,
    pub version: Option<u64>,
    pub raw_event: Option<Value>,
}

impl PositionMsg {
    /// Returns the order ids from the instrument-specific raw event, or the external id.
    #[must_use]
    pub fn order_ids(&self) -> Vec<u64> {
        self.raw_event
            .as_ref()
            .and_then(|raw| raw.get(self.instrument_type.position_raw_event_key()))
            .and_then(|changed| changed.get("order_ids"))
            .and_then(|ids| Vec::<u64>::deserialize(ids).ok())
            .unwrap_or_else(|| vec![self.external_id])
    }
}

/// One row of a `positions-state` broadcast.
#[derive(Clone, Debug, Deserialize)]
pub struct PositionStateMsg {
    #[serde(rename = "id", deserialize_with = "deserialize_string_from_number")]
    pub internal_id: String,
    pub instrument_type: InstrumentType,
    pub sell_profit: Option<f64>,
    pub margin: Option<f64>,
    pub current_price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_millis")]
    pub quote_timestamp: Option<DateTime<Utc>>,
    pub pnl: Option<f64>,
    pub pnl_net: Option<f64>,
    pub open_price: Option<f64>,
    pub expected_profit: Option<f64>,
    pub currency_conversion: Option<f64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PositionsStateMsg {
    #[serde(default)]
    pub positions: Vec<PositionStateMsg>,
    pub expires_in: Option<u64>,
    pub user_id: Option<u64>,
    pub subscription_id: Option<u64>,
}

/// A live or historical position.
#[derive(Clone, Debug, PartialEq)]
pub struct Position {
    pub external_id: u64,
    pub internal_id: String,
    pub instrument_type: InstrumentType,
    pub status: PositionStatus,
    pub active_id: Option<u64>,
    pub user_id: Option<u64>,
    pub balance_id: Option<u64>,
    pub invest: Option<f64>,
    pub open_quote: Option<f64>,
    pub open_time: DateTime<Utc>,
    pub close_profit: Option<f64>,
    pub close_quote: Option<f64>,
    pub close_reason: Option<String>,
    pub close_time: Option<DateTime<Utc>>,
    pub expected_profit: Option<f64>,
    pub pnl: Option<f64>,
    pub pnl_net: Option<f64>,
    pub pnl_realized: Option<f64>,
    pub sell_profit: Option<f64>,
    pub current_quote: Option<f64>,
    pub quote_timestamp: Option<DateTime<Utc>>,
    pub current_quote_timestamp: Option<DateTime<Utc>>,
    pub order_ids: Vec<u64>,
    pub version: Option<u64>,
}

impl From<PositionMsg> for Position {
    fn from(msg: PositionMsg) -> Self {
        let order_ids = msg.order_ids();
        Self {
            external_id: msg.external_id,
            internal_id: msg.internal_id,
            instrument_type: msg.instrument_type,
            status: msg.status,
            active_id: msg.active_id,
            user_id: msg.user_id,
            balance_id: msg.user_balance_id,
            invest: msg.invest,
            open_quote: msg.open_quote,
            open_time: msg.open_time,
            close_profit: msg.close_profit,
            close_quote: msg.close_quote,
            close_reason: msg.close_reason,
            close_time: msg.close_time,
            expected_profit: msg.expected_profit,
            pnl: msg.pnl,
            pnl_net: msg.pnl_net,
            pnl_realized: msg.pnl_realized,
            sell_profit: None,
            current_quote: None,
            quote_timestamp: msg.quote_timestamp,
            current_quote_timestamp: None,
            order_ids,
            version: msg.version,
        }
    }
}

impl Position {
    /// Returns whether `order_id` belongs to this position.
    #[must_use]
    pub fn is_order_matching(&self, order_id: u64) -> bool {
        self.order_ids.contains(&order_id)
    }

    /// Applies the live valuation fields of a `positions-state` row.
    pub fn apply_state(&mut self, state: &PositionStateMsg) {
        self.sell_profit = state.sell_profit;
        self.current_quote = state.current_price;
        self.current_quote_timestamp = state.quote_timestamp;
        self.pnl = state.pnl;
        self.pnl_net = state.pnl_net;
        self.expected_profit = state.expected_profit;
    }
}

impl LiveEntity for Position {
    type Id = u64;

    fn external_id(&self) -> u64 {
        self.external_id
    }

    fn secondary_key(&self) -> Option<SecondaryKey> {
        Some((self.instrument_type, self.internal_id.clone()))
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn carry_over(&mut self, previous: &Self) {
        self.version = self.version.or(previous.version);
        self.sell_profit = self.sell_profit.or(previous.sell_profit);
        self.current_quote = self.current_quote.or(previous.current_quote);
        self.current_quote_timestamp = self
            .current_quote_timestamp
            .or(previous.current_quote_timestamp);
        self.pnl_net = self.pnl_net.or(previous.pnl_net);
    }
}

/// `portfolio.get-positions` v4.0.
#[derive(Clone, Debug)]
pub struct GetPositions {
    pub instrument_types: Vec<InstrumentType>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PositionsPage {
    pub limit: u32,
    pub total: Option<u64>,
    #[serde(default)]
    pub positions: Vec<PositionMsg>,
}

impl Request for GetPositions {
    type Response = PositionsPage;

    fn message_body(&self) -> Value {
        service_message(
            "portfolio.get-positions",
            "4.0",
            json!({
                "instrument_types": self.instrument_types,
                "limit": self.limit,
                "offset": self.offset,
            }),
        )
    }
}

/// `portfolio.subscribe-positions` v1.0, asking for frequent valuation of the given ids.
#[derive(Clone, Debug)]
pub struct SubscribePositions {
    pub frequency: &'static str,
    pub ids: Vec<String>,
}

impl SubscribePositions {
    #[must_use]
    pub fn frequent(ids: Vec<String>) -> Self {
        Self {
            frequency: "frequent",
            ids,
        }
    }
}

impl Request for SubscribePositions {
    type Response = RequestResult;

    fn message_body(&self) -> Value {
        service_message(
            "portfolio.subscribe-positions",
            "1.0",
            json!({
                "frequency": self.frequency,
                "ids": self.ids,
            }),
        )
    }

    fn result_only(&self) -> bool {
        true
    }
}

/// `portfolio.position-changed` v3.0 for one user.
#[derive(Clone, Copy, Debug)]
pub struct PositionChangedSubscription {
    pub user_id: u64,
}

impl SubscribeRequest for PositionChangedSubscription {
    type Event = PositionMsg;

    fn service_name(&self) -> Ustr {
        Ustr::from("portfolio")
    }

    fn event_name(&self) -> Ustr {
        Ustr::from("position-changed")
    }

    fn version(&self) -> &'static str {
        "3.0"
    }

    fn routing_filters(&self) -> Option<Value> {
        Some(json!({ "user_id": self.user_id }))
    }
}

/// `portfolio.positions-state` v1.0.
#[derive(Clone, Copy, Debug)]
pub struct PositionsStateSubscription;

impl SubscribeRequest for PositionsStateSubscription {
    type Event = PositionsStateMsg;

    fn service_name(&self) -> Ustr {
        Ustr::from("portfolio")
    }

    fn event_name(&self) -> Ustr {
        Ustr::from("positions-state")
    }

    fn version(&self) -> &'static str {
        "1.0"
    }
}

#[derive(Debug)]
struct PositionsSnapshot {
    client: WsApiClient,
}

#[async_trait]
impl SnapshotSource for PositionsSnapshot {
    type Row = PositionMsg;

    async fn fetch_page(&self, offset: u32, limit: u32) -> WsApiResult<SnapshotPage<PositionMsg>> {
        let page = self
            .client
            .request(GetPositions {
                instrument_types: InstrumentType::ALL.to_vec(),
                limit,
                offset,
            })
            .await?;
        Ok(SnapshotPage {
            items: page.positions,
            limit: page.limit,
        })
    }
}

/// Applies positions and fans changes out to update receivers.
#[derive(Clone, Debug)]
struct PositionsSink {
    state: SharedReconciler<Position>,
    updates_tx: broadcast::Sender<Position>,
    resync_tx: mpsc::UnboundedSender<()>,
}

impl PositionsSink {
    fn ingest(&self, position: Position, from_snapshot: bool) -> Applied {
        let id = position.external_id;
        let (applied, current) = {
            let mut state = lock(&self.state);
            let applied = if from_snapshot {
                state.apply_snapshot_row(position)
            } else {
                state.apply_event(position)
            };
            let current = match applied {
                Applied::Created | Applied::Updated => state.get(&id).cloned(),
                Applied::Terminated => state.history().next().cloned(),
                _ => None,
            };
            (applied, current)
        };

        if applied == Applied::Created {
            let _ = self.resync_tx.send(());
        }
        if let Some(position) = current {
            self.publish(position);
        }
        applied
    }

    fn apply_states(&self, msg: &PositionsStateMsg) {
        for row in &msg.positions {
            let key = (row.instrument_type, row.internal_id.clone());
            let updated = {
                let mut state = lock(&self.state);
                match state.update_by_secondary(&key, |position| position.apply_state(row)) {
                    Applied::Updated => state.get_by_secondary(&key).cloned(),
                    _ => None,
                }
            };
            if let Some(position) = updated {
                self.publish(position);
            }
        }
    }

    fn publish(&self, position: Position) {
        // Err only means nobody is listening
        let _ = self.updates_tx.send(position);
    }

    fn open_internal_ids(&self) -> Vec<String> {
        lock(&self.state)
            .active()
            .filter(|position| position.status == PositionStatus::Open)
            .map(|position| position.internal_id.clone())
            .collect()
    }
}

/// Open positions of one user, kept current from snapshots and live events.
#[derive(Debug)]
pub struct Positions {
    client: WsApiClient,
    sink: PositionsSink,
    history: PositionsHistory,
    position_changed: Subscription,
    positions_state: Arc<Mutex<Option<Subscription>>>,
    state_refresh: PeriodicTask,
    resync_token: CancellationToken,
}

impl Positions {
    /// Loads open positions and starts following their changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded or a subscription cannot be
    /// registered.
    pub async fn create(client: &WsApiClient, user_id: u64) -> WsApiResult<Self> {
        let state = shared_reconciler::<Position>();
        let (updates_tx, _) = broadcast::channel(POSITION_UPDATES_CAPACITY);
        let (resync_tx, resync_rx) = mpsc::unbounded_channel();
        let sink = PositionsSink {
            state: state.clone(),
            updates_tx,
            resync_tx,
        };

        let source = PositionsSnapshot {
            client: client.clone(),
        };
        load_snapshot(&source, client.config().page_size, |msg| {
            sink.ingest(Position::from(msg), true);
        })
        .await?;

        let event_sink = sink.clone();
        let position_changed = registered(
            client
                .subscribe(&PositionChangedSubscription { user_id }, move |msg| {
                    event_sink.ingest(Position::from(msg), false);
                })
                .await,
        )?;

        let positions_state = Arc::new(Mutex::new(Some(
            subscribe_positions_state(client, sink.clone()).await?,
        )));

        let resync_token = CancellationToken::new();
        spawn_resync_worker(client.clone(), sink.clone(), resync_rx, resync_token.clone());
        let _ = sink.resync_tx.send(());

        let state_refresh = spawn_state_refresh(client, &sink, &positions_state);

        Ok(Self {
            client: client.clone(),
            history: PositionsHistory::new(client.clone(), user_id, state),
            sink,
            position_changed,
            positions_state,
            state_refresh,
            resync_token,
        })
    }

    /// Returns all open positions in first-seen order.
    #[must_use]
    pub fn get_all_positions(&self) -> Vec<Position> {
        lock(&self.sink.state).active().cloned().collect()
    }

    /// Returns the open position with the given external id.
    #[must_use]
    pub fn get(&self, external_id: u64) -> Option<Position> {
        lock(&self.sink.state).get(&external_id).cloned()
    }

    #[must_use]
    pub fn history(&self) -> &PositionsHistory {
        &self.history
    }

    /// Returns a receiver for every applied position change.
    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<Position> {
        self.sink.updates_tx.subscribe()
    }

    /// Stops the periodic refresh and unsubscribes from position events.
    ///
    /// # Errors
    ///
    /// Returns the first unsubscribe failure. Local teardown completes regardless.
    pub async fn close(&self) -> WsApiResult<()> {
        self.state_refresh.close();
        self.resync_token.cancel();

        let mut result = self.client.unsubscribe(&self.position_changed).await.map(|_| ());
        let state_subscription = lock(&self.positions_state).take();
        if let Some(subscription) = state_subscription {
            let unsubscribed = self.client.unsubscribe(&subscription).await.map(|_| ());
            result = result.and(unsubscribed);
        }
        result
    }
}

async fn subscribe_positions_state(
    client: &WsApiClient,
    sink: PositionsSink,
) -> WsApiResult<Subscription> {
    registered(
        client
            .subscribe(&PositionsStateSubscription, move |msg| sink.apply_states(&msg))
            .await,
    )
}

fn spawn_state_refresh(
    client: &WsApiClient,
    sink: &PositionsSink,
    current: &Arc<Mutex<Option<Subscription>>>,
) -> PeriodicTask {
    let period = Duration::from_secs(client.config().positions_state_refresh_secs);
    let task_client = client.clone();
    let sink = sink.clone();
    let current = current.clone();

    PeriodicTask::spawn("positions-state-refresh", period, client.clone(), move || {
        let client = task_client.clone();
        let sink = sink.clone();
        let current = current.clone();
        async move {
            let previous = lock(&current).take();
            if let Some(subscription) = previous
                && let Err(e) = client.unsubscribe(&subscription).await
            {
                tracing::warn!("Unsubscribe of {subscription} failed, resubscribing anyway: {e}");
            }
            let subscription = subscribe_positions_state(&client, sink).await?;
            *lock(&current) = Some(subscription);
            Ok(())
        }
    })
}

fn spawn_resync_worker(
    client: WsApiClient,
    sink: PositionsSink,
    mut resync_rx: mpsc::UnboundedReceiver<()>,
    token: CancellationToken,
) {
    const TASK_NAME: &str = "positions-resync";

    tokio::spawn(async move {
        log_task_started(TASK_NAME);

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                signal = resync_rx.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    // Coalesce a burst of new positions into one request
                    while resync_rx.try_recv().is_ok() {}

                    let ids = sink.open_internal_ids();
                    let result = client
                        .request(SubscribePositions::frequent(ids))
                        .await
                        .and_then(RequestResult::into_result);
                    if let Err(e) = result {
                        tracing::warn!("Failed to subscribe positions valuation: {e}");
                    }
                }
            }
        }

        log_task_stopped(TASK_NAME);
    });
}
