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

//! Example binary following balances and open positions over the websocket session.
//!
//! # Environment Variables
//!
//! - `TRADEHUB_WS_URL`: websocket endpoint.
//! - `TRADEHUB_PLATFORM_ID`: platform identifier.
//! - `TRADEHUB_SSID`: session token.
//!
//! Variables may also be placed in a `.env` file.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p tradehub-client --bin tradehub-ws-portfolio
//! ```

use std::sync::Arc;

use tokio::{signal, sync::broadcast::error::RecvError};
use tradehub_client::{
    WsApiClient, WsApiClientConfig,
    balances::Balances,
    portfolio::Positions,
    profile::UserProfile,
    websocket::auth::SsidAuthMethod,
};
use tradehub_network::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("info")?;

    let config = WsApiClientConfig::from_env()?;
    let auth = SsidAuthMethod::from_env()?;

    tracing::info!("Connecting to {}", config.url);
    let client = WsApiClient::new(config, Arc::new(auth))?;
    client.connect().await?;
    tracing::info!("Session ready, server time {}", client.current_time());

    let profile = UserProfile::fetch(&client).await?;
    tracing::info!("Authenticated as user {}", profile.user_id);

    let balances = Balances::create(&client).await?;
    for balance in balances.get_balances() {
        tracing::info!(
            "Balance {} ({}): {} {}",
            balance.id,
            balance.balance_type,
            balance.amount,
            balance.currency
        );
    }

    let positions = Positions::create(&client, profile.user_id).await?;
    tracing::info!("Following {} open positions", positions.get_all_positions().len());

    let mut balance_updates = balances.subscribe_updates();
    let mut position_updates = positions.subscribe_updates();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
            update = balance_updates.recv() => match update {
                Ok(balance) => tracing::info!("Balance {} now {} {}", balance.id, balance.amount, balance.currency),
                Err(RecvError::Lagged(skipped)) => tracing::warn!("Skipped {skipped} balance updates"),
                Err(RecvError::Closed) => break,
            },
            update = position_updates.recv() => match update {
                Ok(position) => tracing::info!(
                    "Position {} {} pnl={:?}",
                    position.external_id,
                    position.status,
                    position.pnl
                ),
                Err(RecvError::Lagged(skipped)) => tracing::warn!("Skipped {skipped} position updates"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    if let Err(e) = positions.close().await {
        tracing::warn!("Failed to close positions: {e}");
    }
    if let Err(e) = balances.close().await {
        tracing::warn!("Failed to close balances: {e}");
    }
    client.disconnect().await;

    Ok(())
}
