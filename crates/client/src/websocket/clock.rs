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

//! Server clock updated from `timeSync` frames.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::common::parse::millis_to_datetime;

/// Latest server-reported time, in Unix milliseconds.
///
/// Starts at the local wall clock and is overwritten by every `timeSync` frame. Readers see
/// the last written value, which may be stale by up to one sync interval.
#[derive(Debug)]
pub struct ServerClock {
    unix_millis: AtomicU64,
}

impl Default for ServerClock {
    fn default() -> Self {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        Self::new(now)
    }
}

impl ServerClock {
    /// Creates a new [`ServerClock`] at the given time.
    #[must_use]
    pub fn new(unix_millis: u64) -> Self {
        Self {
            unix_millis: AtomicU64::new(unix_millis),
        }
    }

    pub fn set_unix_millis(&self, unix_millis: u64) {
        self.unix_millis.store(unix_millis, Ordering::Release);
    }

    #[must_use]
    pub fn unix_millis(&self) -> u64 {
        self.unix_millis.load(Ordering::Acquire)
    }

    /// Returns the server time truncated to whole seconds.
    #[must_use]
    pub fn unix_secs(&self) -> u64 {
        self.unix_millis() / 1_000
    }

    /// Returns the server time as a UTC datetime.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        i64::try_from(self.unix_millis())
            .ok()
            .and_then(millis_to_datetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
