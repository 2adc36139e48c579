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

//! Closed positions history, paged backwards from the first fetch.

use serde::Deserialize;
use serde_json::{Value, json};

use super::positions::{Position, PositionMsg};
use crate::{
    common::{enums::InstrumentType, sync::lock},
    reconcile::SharedReconciler,
    websocket::{
        client::WsApiClient,
        error::WsApiResult,
        requests::{Request, service_message},
    },
};

/// `portfolio.get-history-positions` v2.0.
#[derive(Clone, Debug)]
pub struct GetHistoryPositions {
    pub user_id: u64,
    pub instrument_types: Vec<InstrumentType>,
    /// Upper bound on close time, in Unix seconds.
    pub end: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HistoryPositionsPage {
    pub limit: u32,
    #[serde(default)]
    pub positions: Vec<PositionMsg>,
}

impl Request for GetHistoryPositions {
    type Response = HistoryPositionsPage;

    fn message_body(&self) -> Value {
        service_message(
            "portfolio.get-history-positions",
            "2.0",
            json!({
                "instrument_types": self.instrument_types,
                "user_id": self.user_id,
                "end": self.end,
                "limit": self.limit,
                "offset": self.offset,
            }),
        )
    }
}

#[derive(Debug)]
struct HistoryCursor {
    end: Option<u64>,
    offset: u32,
    has_prev_page: bool,
}

/// History of closed option positions.
///
/// Positions closed during the session are prepended by [`super::positions::Positions`];
/// [`Self::fetch_prev_page`] appends older pages. The paging window is anchored at the server
/// time of the first fetch so later closes do not shift the offsets.
#[derive(Debug)]
pub struct PositionsHistory {
    client: WsApiClient,
    user_id: u64,
    limit: u32,
    state: SharedReconciler<Position>,
    cursor: tokio::sync::Mutex<HistoryCursor>,
}

impl PositionsHistory {
    pub(crate) fn new(client: WsApiClient, user_id: u64, state: SharedReconciler<Position>) -> Self {
        let limit = client.config().page_size;
        Self {
            client,
            user_id,
            limit,
            state,
            cursor: tokio::sync::Mutex::new(HistoryCursor {
                end: None,
                offset: 0,
                has_prev_page: true,
            }),
        }
    }

    /// Fetches the next older page and appends it to the history.
    ///
    /// Concurrent calls are serialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. The cursor does not advance.
    pub async fn fetch_prev_page(&self) -> WsApiResult<()> {
        let mut cursor = self.cursor.lock().await;
        let end = *cursor.end.get_or_insert_with(|| self.client.clock().unix_secs());

        let page = self
            .client
            .request(GetHistoryPositions {
                user_id: self.user_id,
                instrument_types: InstrumentType::OPTIONS.to_vec(),
                end,
                limit: self.limit,
                offset: cursor.offset,
            })
            .await?;

        let count = page.positions.len();
        let appended =
            lock(&self.state).extend_history(page.positions.into_iter().map(Position::from));

        if count < page.limit as usize {
            cursor.has_prev_page = false;
        }
        cursor.offset += self.limit;

        tracing::debug!(
            "Fetched {count} history positions ({appended} new), next offset {}",
            cursor.offset
        );
        Ok(())
    }

    /// Returns whether an older page may exist.
    pub async fn has_prev_page(&self) -> bool {
        self.cursor.lock().await.has_prev_page
    }

    /// Returns the history, most recently closed first.
    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        lock(&self.state).history().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_request_body() {
        let request = GetHistoryPositions {
            user_id: 42,
            instrument_types: InstrumentType::OPTIONS.to_vec(),
            end: 1_700_000_000,
            limit: 30,
            offset: 30,
        };

        assert_eq!(
            request.message_body(),
            json!({
                "name": "portfolio.get-history-positions",
                "version": "2.0",
                "body": {
                    "instrument_types": ["digital-option", "binary-option", "turbo-option", "blitz-option"],
                    "user_id": 42,
                    "end": 1_700_000_000,
                    "limit": 30,
                    "offset": 30,
                },
            })
        );
    }
}
