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

//! Sequential paginated snapshot loading.

use async_trait::async_trait;

use crate::websocket::error::WsApiResult;

/// One page of snapshot rows together with the page size echoed by the server.
#[derive(Clone, Debug)]
pub struct SnapshotPage<T> {
    pub items: Vec<T>,
    pub limit: u32,
}

/// A paginated snapshot endpoint.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    type Row: Send;

    /// Fetches the rows starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the page cannot be decoded.
    async fn fetch_page(&self, offset: u32, limit: u32) -> WsApiResult<SnapshotPage<Self::Row>>;
}

/// Fetches every page of `source` in order and feeds each row to `sink`.
///
/// Page N+1 is requested only after page N has been consumed. Loading stops at the first page
/// that is empty or shorter than the limit the server echoed back, which may differ from the
/// requested `page_size`. The offset advances by the rows actually received. Returns the
/// number of rows loaded.
///
/// # Errors
///
/// Returns the first page fetch error. Rows from earlier pages have already been applied.
pub async fn load_snapshot<S, F>(source: &S, page_size: u32, mut sink: F) -> WsApiResult<usize>
where
    S: SnapshotSource + ?Sized,
    F: FnMut(S::Row) + Send,
{
    let mut offset = 0;
    let mut loaded = 0;

    loop {
        let page = source.fetch_page(offset, page_size).await?;
        let count = page.items.len();
        let echoed_limit = page.limit as usize;

        page.items.into_iter().for_each(&mut sink);
        loaded += count;

        if count == 0 || count < echoed_limit {
            break;
        }
        offset += u32::try_from(count).unwrap_or(u32::MAX);
    }

    tracing::debug!("Snapshot loaded: {loaded} rows");
    Ok(loaded)
}
