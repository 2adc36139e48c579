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

//! Pending orders kept current from the portfolio service.

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use ustr::Ustr;

use super::positions::Position;
use crate::{
    common::{
        enums::{InstrumentType, OrderStatus},
        parse::deserialize_optional_string_from_number,
        sync::lock,
    },
    reconcile::{Applied, LiveEntity, SharedReconciler, registered, shared_reconciler},
    websocket::{
        client::WsApiClient,
        error::WsApiResult,
        requests::{Request, SubscribeRequest, service_message},
        subscriptions::Subscription,
    },
};

const ORDER_UPDATES_CAPACITY: usize = 1_024;

/// Order as sent in `get-orders` replies and `order-changed` events.
#[derive(Clone, Debug, Deserialize)]
pub struct OrderMsg {
    pub instrument_type: InstrumentType,
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string_from_number")]
    pub position_id: Option<String>,
    pub status: OrderStatus,
    pub user_id: Option<u64>,
    pub user_balance_id: Option<u64>,
    pub raw_event: Option<Value>,
}

impl OrderMsg {
    /// Returns the order id carried by the instrument-specific raw event.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        let key = self.instrument_type.order_raw_event_key()?;
        self.raw_event
            .as_ref()?
            .get(key)?
            .get("id")?
            .as_u64()
    }

    /// Converts into an [`Order`], or `None` when the raw event carries no id.
    #[must_use]
    pub fn into_order(self) -> Option<Order> {
        let Some(id) = self.id() else {
            tracing::debug!(
                "Skipping {} order without id in raw event",
                self.instrument_type
            );
            return None;
        };

        Some(Order {
            id,
            instrument_type: self.instrument_type,
            kind: self.kind,
            position_id: self.position_id,
            status: self.status,
            user_id: self.user_id,
            user_balance_id: self.user_balance_id,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub id: u64,
    pub instrument_type: InstrumentType,
    pub kind: Option<String>,
    pub position_id: Option<String>,
    pub status: OrderStatus,
    pub user_id: Option<u64>,
    pub user_balance_id: Option<u64>,
}

impl LiveEntity for Order {
    type Id = u64;

    fn external_id(&self) -> u64 {
        self.id
    }

    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// `portfolio.get-orders` v2.0 for deferred orders on one balance.
#[derive(Clone, Copy, Debug)]
pub struct GetOrders {
    pub user_balance_id: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OrdersPage {
    #[serde(default)]
    pub items: Vec<OrderMsg>,
}

impl Request for GetOrders {
    type Response = OrdersPage;

    fn message_body(&self) -> Value {
        service_message(
            "portfolio.get-orders",
            "2.0",
            json!({
                "user_balance_id": self.user_balance_id,
                "kind": "deferred",
            }),
        )
    }
}

/// `portfolio.order-changed` v2.0 for one user and instrument type.
#[derive(Clone, Copy, Debug)]
pub struct OrderChangedSubscription {
    pub user_id: u64,
    pub instrument_type: InstrumentType,
}

impl SubscribeRequest for OrderChangedSubscription {
    type Event = OrderMsg;

    fn service_name(&self) -> Ustr {
        Ustr::from("portfolio")
    }

    fn event_name(&self) -> Ustr {
        Ustr::from("order-changed")
    }

    fn version(&self) -> &'static str {
        "2.0"
    }

    fn routing_filters(&self) -> Option<Value> {
        Some(json!({
            "user_id": self.user_id,
            "instrument_type": self.instrument_type,
        }))
    }
}

#[derive(Clone, Debug)]
struct OrdersSink {
    state: SharedReconciler<Order>,
    updates_tx: broadcast::Sender<Order>,
}

impl OrdersSink {
    fn ingest(&self, msg: OrderMsg, from_snapshot: bool) -> Applied {
        let Some(order) = msg.into_order() else {
            return Applied::Unknown;
        };

        let id = order.id;
        let (applied, current) = {
            let mut state = lock(&self.state);
            let applied = if from_snapshot {
                state.apply_snapshot_row(order)
            } else {
                state.apply_event(order)
            };
            let current = match applied {
                Applied::Created | Applied::Updated => state.get(&id).cloned(),
                Applied::Terminated => state.history().next().cloned(),
                _ => None,
            };
            (applied, current)
        };

        if let Some(order) = current {
            let _ = self.updates_tx.send(order);
        }
        applied
    }
}

/// Pending orders of one user across the order-capable instrument types.
#[derive(Debug)]
pub struct Orders {
    client: WsApiClient,
    sink: OrdersSink,
    subscriptions: Vec<Subscription>,
}

impl Orders {
    /// Subscribes to order changes, then loads deferred orders for each balance.
    ///
    /// # Errors
    ///
    /// Returns an error if a subscription cannot be registered or an order snapshot fails.
    pub async fn create(client: &WsApiClient, user_id: u64, balance_ids: &[u64]) -> WsApiResult<Self> {
        let (updates_tx, _) = broadcast::channel(ORDER_UPDATES_CAPACITY);
        let sink = OrdersSink {
            state: shared_reconciler(),
            updates_tx,
        };

        let mut subscriptions = Vec::with_capacity(InstrumentType::WITH_ORDERS.len());
        for instrument_type in InstrumentType::WITH_ORDERS {
            let event_sink = sink.clone();
            let request = OrderChangedSubscription {
                user_id,
                instrument_type,
            };
            let subscription = registered(
                client
                    .subscribe(&request, move |msg: OrderMsg| {
                        // Filters are advisory; drop events routed for another type
                        if msg.instrument_type == instrument_type {
                            event_sink.ingest(msg, false);
                        }
                    })
                    .await,
            )?;
            subscriptions.push(subscription);
        }

        for &user_balance_id in balance_ids {
            let page = client.request(GetOrders { user_balance_id }).await?;
            tracing::debug!("Loaded {} orders for balance {user_balance_id}", page.items.len());
            for msg in page.items {
                sink.ingest(msg, true);
            }
        }

        Ok(Self {
            client: client.clone(),
            sink,
            subscriptions,
        })
    }

    /// Returns all pending orders in first-seen order.
    #[must_use]
    pub fn get_all_orders(&self) -> Vec<Order> {
        lock(&self.sink.state).active().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<Order> {
        lock(&self.sink.state).get(&id).cloned()
    }

    /// Returns orders that reached a terminal status during the session, most recent first.
    #[must_use]
    pub fn history(&self) -> Vec<Order> {
        lock(&self.sink.state).history().cloned().collect()
    }

    /// Returns whether `order` opened or belongs to `position`.
    #[must_use]
    pub fn is_position_matching_order(position: &Position, order: &Order) -> bool {
        order.position_id.as_deref() == Some(position.internal_id.as_str())
    }

    /// Returns a receiver for every applied order change.
    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<Order> {
        self.sink.updates_tx.subscribe()
    }

    /// Unsubscribes from order events.
    ///
    /// # Errors
    ///
    /// Returns the first unsubscribe failure.
    pub async fn close(&self) -> WsApiResult<()> {
        let mut result = Ok(());
        for subscription in &self.subscriptions {
            let unsubscribed = self.client.unsubscribe(subscription).await.map(|_| ());
            result = result.and(unsubscribed);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::portfolio::positions::PositionMsg;

    fn order_json(id: Option<u64>, instrument_type: &str, status: &str) -> Value {
        let raw_key = match instrument_type {
            "digital-option" => "digital_options_order_changed1",
            "marginal-cfd" => "marginal_cfd_order_changed1",
            "marginal-forex" => "marginal_forex_order_changed1",
            _ => "marginal_crypto_order_changed1",
        };
        let raw_event = id.map_or(json!({}), |id| json!({ raw_key: { "id": id } }));
        json!({
            "id": "ignored",
            "instrument_type": instrument_type,
            "kind": "deferred",
            "position_id": 555,
            "status": status,
            "user_id": 42,
            "user_balance_id": 7,
            "raw_event": raw_event,
        })
    }

    fn order_msg(id: Option<u64>, instrument_type: &str, status: &str) -> OrderMsg {
        serde_json::from_value(order_json(id, instrument_type, status)).unwrap()
    }

    #[fixture]
    fn sink() -> OrdersSink {
        let (updates_tx, _) = broadcast::channel(16);
        OrdersSink {
            state: shared_reconciler(),
            updates_tx,
        }
    }

    #[rstest]
    #[case("digital-option")]
    #[case("marginal-cfd")]
    #[case("marginal-forex")]
    #[case("marginal-crypto")]
    fn test_id_from_raw_event(#[case] instrument_type: &str) {
        let msg = order_msg(Some(900), instrument_type, "open");

        assert_eq!(msg.id(), Some(900));
        assert_eq!(msg.position_id.as_deref(), Some("555"));
    }

    #[rstest]
    fn test_order_without_id_is_skipped(sink: OrdersSink) {
        assert_eq!(
            sink.ingest(order_msg(None, "marginal-cfd", "open"), true),
            Applied::Unknown
        );
        assert_eq!(lock(&sink.state).active_len(), 0);
    }

    #[rstest]
    #[case("filled")]
    #[case("canceled")]
    #[case("rejected")]
    fn test_terminal_statuses_leave_active_set(sink: OrdersSink, #[case] status: &str) {
        sink.ingest(order_msg(Some(1), "marginal-cfd", "open"), true);

        assert_eq!(
            sink.ingest(order_msg(Some(1), "marginal-cfd", status), false),
            Applied::Terminated
        );
        let state = lock(&sink.state);
        assert!(state.get(&1).is_none());
        assert_eq!(state.history_len(), 1);
    }

    #[rstest]
    fn test_position_matching() {
        let order = order_msg(Some(1), "digital-option", "open").into_order().unwrap();
        let position: Position = serde_json::from_value::<PositionMsg>(json!({
            "external_id": 10,
            "id": 555,
            "instrument_type": "digital-option",
            "status": "open",
            "open_time": 1_700_000_000_000_i64,
        }))
        .unwrap()
        .into();

        assert!(Orders::is_position_matching_order(&position, &order));
    }

    #[rstest]
    fn test_subscription_filters() {
        let request = OrderChangedSubscription {
            user_id: 42,
            instrument_type: InstrumentType::MarginCrypto,
        };

        assert_eq!(
            request.message_body(),
            json!({
                "name": "portfolio.order-changed",
                "version": "2.0",
                "params": {"routingFilters": {"user_id": 42, "instrument_type": "marginal-crypto"}},
            })
        );
    }
}
