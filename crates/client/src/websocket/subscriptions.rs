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

//! Subscription registry keyed by `(service, event)`.
//!
//! One key may hold several entries, each with its own callback and subscribe body. Entries are
//! dispatched in registration order and survive reconnects so they can be replayed; only an
//! explicit unsubscribe or disconnect removes them.

use std::{
    fmt::{Debug, Display},
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use indexmap::IndexMap;
use serde_json::Value;
use ustr::Ustr;

/// Registry key: publishing service plus event name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    service: Ustr,
    event: Ustr,
}

impl SubscriptionKey {
    /// Creates a new [`SubscriptionKey`].
    #[must_use]
    pub fn new(service: impl Into<Ustr>, event: impl Into<Ustr>) -> Self {
        Self {
            service: service.into(),
            event: event.into(),
        }
    }

    #[must_use]
    pub fn service(&self) -> Ustr {
        self.service
    }

    #[must_use]
    pub fn event(&self) -> Ustr {
        self.event
    }
}

impl Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.service, self.event)
    }
}

/// Identity of one registry entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a registered subscription, used to unsubscribe.
#[derive(Clone, Debug, PartialEq)]
pub struct Subscription {
    id: SubscriptionId,
    key: SubscriptionKey,
    body: Value,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[must_use]
    pub fn key(&self) -> SubscriptionKey {
        self.key
    }

    /// Returns the body re-sent on subscribe, unsubscribe and replay.
    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }
}

impl Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.key, self.id)
    }
}

/// Callback invoked with the raw event payload.
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

struct SubscriptionEntry {
    id: SubscriptionId,
    body: Value,
    callback: EventCallback,
}

/// Registered subscriptions, in registration order.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: IndexMap<SubscriptionKey, Vec<SubscriptionEntry>>,
    next_id: u64,
}

impl Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(SubscriptionRegistry))
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .field("len", &self.len())
            .finish()
    }
}

impl SubscriptionRegistry {
    /// Creates a new empty [`SubscriptionRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry under `key` and returns its handle.
    pub fn register(
        &mut self,
        key: SubscriptionKey,
        body: Value,
        callback: EventCallback,
    ) -> Subscription {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);

        self.entries.entry(key).or_default().push(SubscriptionEntry {
            id,
            body: body.clone(),
            callback,
        });

        Subscription { id, key, body }
    }

    /// Removes the entry behind `subscription`. Returns `false` if it was not registered.
    pub fn remove(&mut self, subscription: &Subscription) -> bool {
        let Some(entries) = self.entries.get_mut(&subscription.key) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|entry| entry.id != subscription.id);
        let removed = entries.len() < before;

        if entries.is_empty() {
            self.entries.shift_remove(&subscription.key);
        }

        removed
    }

    /// Invokes every callback registered under `key`, in registration order.
    ///
    /// A panicking callback is logged and does not prevent later callbacks from running.
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self, key: &SubscriptionKey, msg: &Value) -> usize {
        let Some(entries) = self.entries.get(key) else {
            tracing::trace!("No subscription for event {key}");
            return 0;
        };

        for entry in entries {
            let callback = &entry.callback;
            if catch_unwind(AssertUnwindSafe(|| callback(msg))).is_err() {
                tracing::error!("Callback for subscription {key}#{} panicked", entry.id);
            }
        }

        entries.len()
    }

    /// Returns the subscribe body of every entry, in registration order.
    #[must_use]
    pub fn replay_bodies(&self) -> Vec<(SubscriptionKey, Value)> {
        self.entries
            .iter()
            .flat_map(|(key, entries)| entries.iter().map(|entry| (*key, entry.body.clone())))
            .collect()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns whether `subscription` is still registered.
    #[must_use]
    pub fn contains(&self, subscription: &Subscription) -> bool {
        self.entries
            .get(&subscription.key)
            .is_some_and(|entries| entries.iter().any(|entry| entry.id == subscription.id))
    }

    /// Returns the number of registered entries across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
