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

//! Integration tests for positions reconciliation against a mock websocket server.

mod common;

use rstest::rstest;
use serde_json::{Value, json};
use tradehub_client::portfolio::Positions;
use tradehub_network::testing::wait_until_async;

use crate::common::{
    SERVER_TIME_MILLIS, TestServerState, WAIT, connected_client, connected_client_with,
};

const USER_ID: u64 = 42;

fn position_json(external_id: u64, status: &str, version: Option<u64>, pnl: f64) -> Value {
    json!({
        "external_id": external_id,
        "id": format!("int-{external_id}"),
        "instrument_type": "digital-option",
        "status": status,
        "active_id": 76,
        "user_id": USER_ID,
        "user_balance_id": 7,
        "invest": 10.0,
        "open_quote": 1.0842,
        "open_time": 1_700_000_000_000_i64,
        "pnl": pnl,
        "version": version,
    })
}

fn position_changed(position: Value) -> Value {
    json!({"name": "position-changed", "microserviceName": "portfolio", "msg": position})
}

async fn seed_positions(state: &TestServerState, count: u64) {
    *state.positions.lock().await = (1..=count)
        .map(|id| position_json(id, "open", Some(1), 0.0))
        .collect();
}

async fn snapshot_offsets(state: &TestServerState) -> Vec<u64> {
    state
        .calls("portfolio.get-positions")
        .await
        .iter()
        .filter_map(|body| body["offset"].as_u64())
        .collect()
}

#[rstest]
#[tokio::test]
async fn test_snapshot_stops_on_short_page() {
    let (client, state) = connected_client().await;
    seed_positions(&state, 35).await;

    let positions = Positions::create(&client, USER_ID).await.unwrap();

    assert_eq!(positions.get_all_positions().len(), 35);
    assert_eq!(snapshot_offsets(&state).await, vec![0, 30]);

    positions.close().await.unwrap();
    client.disconnect().await;
}

#[rstest]
#[tokio::test]
async fn test_snapshot_follows_echoed_limit() {
    let (client, state) = connected_client().await;
    seed_positions(&state, 25).await;
    *state.echoed_limit.lock().await = Some(10);

    let positions = Positions::create(&client, USER_ID).await.unwrap();

    assert_eq!(positions.get_all_positions().len(), 25);
    assert_eq!(snapshot_offsets(&state).await, vec![0, 10, 20]);

    positions.close().await.unwrap();
    client.disconnect().await;
}

#[rstest]
#[tokio::test]
async fn test_open_positions_requested_for_frequent_updates() {
    let (client, state) = connected_client().await;
    seed_positions(&state, 2).await;

    let positions = Positions::create(&client, USER_ID).await.unwrap();

    wait_until_async(
        || async { !state.calls("portfolio.subscribe-positions").await.is_empty() },
        WAIT,
    )
    .await;
    let body = &state.calls("portfolio.subscribe-positions").await[0];
    assert_eq!(body["frequency"], "frequent");
    assert_eq!(body["ids"], json!(["int-1", "int-2"]));

    let subscribed = state.frames_named("subscribeMessage").await;
    assert!(subscribed.iter().any(|(_, frame)| {
        frame["msg"]
            == json!({
                "name": "portfolio.position-changed",
                "version": "3.0",
                "params": {"routingFilters": {"user_id": USER_ID}},
            })
    }));

    positions.close().await.unwrap();
    client.disconnect().await;
}

#[rstest]
#[tokio::test]
async fn test_stale_event_version_is_dropped() {
    let (client, state) = connected_client().await;
    seed_positions(&state, 2).await;
    let positions = Positions::create(&client, USER_ID).await.unwrap();

    state.push(position_changed(position_json(1, "open", Some(6), 6.0)));
    state.push(position_changed(position_json(1, "open", Some(5), 5.0)));
    state.push(position_changed(position_json(2, "open", Some(2), 2.0)));

    wait_until_async(
        || async { positions.get(2).and_then(|position| position.pnl) == Some(2.0) },
        WAIT,
    )
    .await;

    let position = positions.get(1).unwrap();
    assert_eq!(position.version, Some(6));
    assert_eq!(position.pnl, Some(6.0));

    positions.close().await.unwrap();
    client.disconnect().await;
}

#[rstest]
#[tokio::test]
async fn test_closed_position_moves_to_history() {
    let (client, state) = connected_client().await;
    seed_positions(&state, 2).await;
    let positions = Positions::create(&client, USER_ID).await.unwrap();
    let mut updates = positions.subscribe_updates();

    state.push(position_changed(position_json(2, "closed", Some(2), 1.5)));

    let update = tokio::time::timeout(WAIT, updates.recv()).await.unwrap().unwrap();
    assert_eq!(update.external_id, 2);

    assert!(positions.get(2).is_none());
    assert_eq!(positions.get_all_positions().len(), 1);
    let history = positions.history().positions();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].external_id, 2);

    state.push(position_changed(position_json(2, "open", Some(3), 0.0)));
    state.push(position_changed(position_json(1, "open", Some(2), 9.0)));
    wait_until_async(
        || async { positions.get(1).and_then(|position| position.pnl) == Some(9.0) },
        WAIT,
    )
    .await;
    assert!(positions.get(2).is_none());

    positions.close().await.unwrap();
    client.disconnect().await;
}

#[rstest]
#[tokio::test]
async fn test_history_pages_anchor_on_server_time() {
    let (client, state) = connected_client().await;
    let clock = client.clock();
    wait_until_async(|| async { clock.unix_millis() == SERVER_TIME_MILLIS }, WAIT).await;

    *state.history.lock().await = (100..103)
        .map(|id| position_json(id, "closed", Some(4), 1.0))
        .collect();
    let positions = Positions::create(&client, USER_ID).await.unwrap();
    let history = positions.history();

    assert!(history.has_prev_page().await);
    history.fetch_prev_page().await.unwrap();

    assert!(!history.has_prev_page().await);
    assert_eq!(history.positions().len(), 3);

    let body = &state.calls("portfolio.get-history-positions").await[0];
    assert_eq!(body["end"], 1_700_000_000);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["limit"], 30);
    assert_eq!(body["user_id"], USER_ID);

    positions.close().await.unwrap();
    client.disconnect().await;
}

#[rstest]
#[tokio::test]
async fn test_state_refresh_resubscribes_after_rejected_unsubscribe() {
    let (client, state) =
        connected_client_with(|config| config.positions_state_refresh_secs = 1).await;
    seed_positions(&state, 1).await;
    state
        .fail_unsubscribe
        .store(true, std::sync::atomic::Ordering::Relaxed);
    let positions = Positions::create(&client, USER_ID).await.unwrap();

    let state_frames = |name: &'static str| {
        let state = state.clone();
        async move {
            state
                .frames_named(name)
                .await
                .iter()
                .filter(|(_, frame)| frame["msg"]["name"] == "portfolio.positions-state")
                .count()
        }
    };
    wait_until_async(
        || async {
            state_frames("unsubscribeMessage").await >= 1
                && state_frames("subscribeMessage").await >= 2
        },
        WAIT,
    )
    .await;

    state.push(json!({
        "name": "positions-state",
        "microserviceName": "portfolio",
        "msg": {
            "positions": [
                {"id": "int-1", "instrument_type": "digital-option", "sell_profit": 3.5}
            ],
            "expires_in": 60,
        },
    }));

    wait_until_async(
        || async { positions.get(1).and_then(|position| position.sell_profit) == Some(3.5) },
        WAIT,
    )
    .await;

    assert!(positions.close().await.is_err());
    client.disconnect().await;
}
