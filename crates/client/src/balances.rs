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

//! Real and demo account balances.

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use ustr::Ustr;

use crate::{
    common::{consts::DEMO_BALANCE_RESET_AMOUNT, enums::BalanceType, sync::lock},
    reconcile::{Applied, LiveEntity, SharedReconciler, registered, shared_reconciler},
    websocket::{
        client::WsApiClient,
        error::{WsApiError, WsApiResult},
        messages::RequestResult,
        requests::{Request, SubscribeRequest, service_message},
        subscriptions::Subscription,
    },
};

const BALANCE_UPDATES_CAPACITY: usize = 256;

/// Balance types loaded and followed.
pub const SUPPORTED_BALANCE_TYPES: [BalanceType; 2] = [BalanceType::Real, BalanceType::Demo];

#[derive(Clone, Debug, Deserialize)]
pub struct BalanceMsg {
    pub id: u64,
    #[serde(rename = "type")]
    pub type_id: u64,
    pub amount: f64,
    #[serde(default)]
    pub bonus_amount: f64,
    pub currency: String,
    pub user_id: Option<u64>,
    #[serde(default, rename = "is_marginal")]
    pub is_margin: bool,
}

/// `balances.balance-changed` payload.
#[derive(Clone, Debug, Deserialize)]
pub struct BalanceChangedMsg {
    pub current_balance: BalanceMsg,
    pub user_id: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Balance {
    pub id: u64,
    pub balance_type: BalanceType,
    pub amount: f64,
    pub bonus_amount: f64,
    pub currency: String,
    pub user_id: Option<u64>,
    pub is_margin: bool,
}

impl Balance {
    /// Converts a wire balance, or `None` for an unsupported balance type.
    #[must_use]
    pub fn from_msg(msg: BalanceMsg) -> Option<Self> {
        let balance_type = BalanceType::from_id(msg.type_id)
            .filter(|balance_type| SUPPORTED_BALANCE_TYPES.contains(balance_type))?;
        Some(Self {
            id: msg.id,
            balance_type,
            amount: msg.amount,
            bonus_amount: msg.bonus_amount,
            currency: msg.currency,
            user_id: msg.user_id,
            is_margin: msg.is_margin,
        })
    }
}

impl LiveEntity for Balance {
    type Id = u64;

    fn external_id(&self) -> u64 {
        self.id
    }

    fn carry_over(&mut self, previous: &Self) {
        // Change events do not carry the margin flag
        self.is_margin |= previous.is_margin;
        self.user_id = self.user_id.or(previous.user_id);
    }
}

/// `balances.get-available-balances` v1.0.
#[derive(Clone, Debug)]
pub struct GetAvailableBalances {
    pub types: Vec<BalanceType>,
}

impl Request for GetAvailableBalances {
    type Response = Vec<BalanceMsg>;

    fn message_body(&self) -> Value {
        let types_ids: Vec<u8> = self.types.iter().map(|t| t.as_id()).collect();
        service_message(
            "balances.get-available-balances",
            "1.0",
            json!({ "types_ids": types_ids }),
        )
    }
}

/// `internal-billing.reset-training-balance` v4.0.
#[derive(Clone, Copy, Debug)]
pub struct ResetTrainingBalance {
    pub user_balance_id: u64,
    pub amount: f64,
}

impl Request for ResetTrainingBalance {
    type Response = RequestResult;

    fn message_body(&self) -> Value {
        service_message(
            "internal-billing.reset-training-balance",
            "4.0",
            json!({
                "user_balance_id": self.user_balance_id,
                "amount": self.amount,
            }),
        )
    }

    fn result_only(&self) -> bool {
        true
    }
}

/// `balances.balance-changed` v1.0.
#[derive(Clone, Copy, Debug)]
pub struct BalanceChangedSubscription;

impl SubscribeRequest for BalanceChangedSubscription {
    type Event = BalanceChangedMsg;

    fn service_name(&self) -> Ustr {
        Ustr::from("balances")
    }

    fn event_name(&self) -> Ustr {
        Ustr::from("balance-changed")
    }

    fn version(&self) -> &'static str {
        "1.0"
    }
}

#[derive(Clone, Debug)]
struct BalancesSink {
    state: SharedReconciler<Balance>,
    updates_tx: broadcast::Sender<Balance>,
}

impl BalancesSink {
    fn ingest(&self, msg: BalanceMsg, from_snapshot: bool) -> Applied {
        let Some(balance) = Balance::from_msg(msg) else {
            return Applied::Unknown;
        };

        let id = balance.id;
        let current = {
            let mut state = lock(&self.state);
            let applied = if from_snapshot {
                state.apply_snapshot_row(balance)
            } else {
                state.apply_event(balance)
            };
            (applied, state.get(&id).cloned())
        };

        if let (applied, Some(balance)) = &current
            && applied.is_change()
        {
            let _ = self.updates_tx.send(balance.clone());
        }
        current.0
    }
}

/// Real and demo balances of the authenticated user.
#[derive(Debug)]
pub struct Balances {
    client: WsApiClient,
    sink: BalancesSink,
    subscription: Subscription,
}

impl Balances {
    /// Loads balances and starts following their changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot request fails or the subscription cannot be registered.
    pub async fn create(client: &WsApiClient) -> WsApiResult<Self> {
        let (updates_tx, _) = broadcast::channel(BALANCE_UPDATES_CAPACITY);
        let sink = BalancesSink {
            state: shared_reconciler(),
            updates_tx,
        };

        let rows = client
            .request(GetAvailableBalances {
                types: SUPPORTED_BALANCE_TYPES.to_vec(),
            })
            .await?;
        for row in rows {
            sink.ingest(row, true);
        }

        let event_sink = sink.clone();
        let subscription = registered(
            client
                .subscribe(&BalanceChangedSubscription, move |msg: BalanceChangedMsg| {
                    event_sink.ingest(msg.current_balance, false);
                })
                .await,
        )?;

        Ok(Self {
            client: client.clone(),
            sink,
            subscription,
        })
    }

    #[must_use]
    pub fn get_balances(&self) -> Vec<Balance> {
        lock(&self.sink.state).active().cloned().collect()
    }

    #[must_use]
    pub fn get_balance_by_id(&self, id: u64) -> Option<Balance> {
        lock(&self.sink.state).get(&id).cloned()
    }

    /// Returns a receiver for every applied balance change.
    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<Balance> {
        self.sink.updates_tx.subscribe()
    }

    /// Resets a demo balance to its starting amount.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Self::reset_training_balance`].
    pub async fn reset_demo_balance(&self, id: u64) -> WsApiResult<()> {
        self.reset_training_balance(id, DEMO_BALANCE_RESET_AMOUNT)
            .await
    }

    /// Resets a demo balance to `amount`.
    ///
    /// # Errors
    ///
    /// Returns an error if the balance is unknown or not a demo balance, or the server rejects
    /// the reset.
    pub async fn reset_training_balance(&self, id: u64, amount: f64) -> WsApiResult<()> {
        let balance = self
            .get_balance_by_id(id)
            .ok_or_else(|| WsApiError::ClientError(format!("Balance {id} not found")))?;
        if balance.balance_type != BalanceType::Demo {
            return Err(WsApiError::ClientError(format!(
                "Only demo balances can be reset, {id} is {}",
                balance.balance_type
            )));
        }

        self.client
            .request(ResetTrainingBalance {
                user_balance_id: id,
                amount,
            })
            .await?
            .into_result()?;
        Ok(())
    }

    /// Unsubscribes from balance events.
    ///
    /// # Errors
    ///
    /// Returns an error if the unsubscribe request fails.
    pub async fn close(&self) -> WsApiResult<()> {
        self.client.unsubscribe(&self.subscription).await.map(|_| ())
    }
}
