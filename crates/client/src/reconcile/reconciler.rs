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

//! Merges paginated snapshots and live events into one authoritative collection.

use std::{
    collections::VecDeque,
    fmt::{Debug, Display},
    hash::Hash,
};

use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;

use crate::common::enums::InstrumentType;

/// Secondary identity: an internal id, unique only within its instrument type.
pub type SecondaryKey = (InstrumentType, String);

/// An entity kept live by a [`Reconciler`].
pub trait LiveEntity: Clone + Debug + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + Debug + Display + Send + Sync;

    /// Stable public identity.
    fn external_id(&self) -> Self::Id;

    /// Internal identity used by events that do not carry the external id.
    fn secondary_key(&self) -> Option<SecondaryKey> {
        None
    }

    /// Server-assigned version, increasing per entity.
    fn version(&self) -> Option<u64> {
        None
    }

    fn is_terminal(&self) -> bool {
        false
    }

    /// Fills fields the incoming state does not carry from the state it replaces.
    fn carry_over(&mut self, _previous: &Self) {}
}

/// Outcome of applying a snapshot row or event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// A new entity entered the active set.
    Created,
    /// An active entity was overwritten.
    Updated,
    /// The entity reached a terminal status and moved to history.
    Terminated,
    /// The event version was not newer than the stored one; nothing changed.
    Stale,
    /// The entity already moved to history; nothing changed.
    AlreadyTerminal,
    /// No active entity matched the lookup.
    Unknown,
}

impl Applied {
    /// Returns whether the collection changed.
    #[must_use]
    pub const fn is_change(self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Terminated)
    }
}

/// Active entities by external id, a secondary index, and a most-recent-first history.
///
/// Snapshot rows always overwrite. Events are discarded when both the stored entity and the
/// event carry a version and the event's is not greater. Once terminal, an identity never
/// re-enters the active set.
#[derive(Debug)]
pub struct Reconciler<E: LiveEntity> {
    active: IndexMap<E::Id, E>,
    secondary: AHashMap<SecondaryKey, E::Id>,
    history: VecDeque<E>,
    terminated: AHashSet<E::Id>,
}

impl<E: LiveEntity> Default for Reconciler<E> {
    fn default() -> Self {
        Self {
            active: IndexMap::new(),
            secondary: AHashMap::new(),
            history: VecDeque::new(),
            terminated: AHashSet::new(),
        }
    }
}

impl<E: LiveEntity> Reconciler<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an authoritative snapshot row, ignoring versions.
    pub fn apply_snapshot_row(&mut self, row: E) -> Applied {
        let id = row.external_id();
        if self.terminated.contains(&id) {
            return Applied::AlreadyTerminal;
        }

        let created = self.upsert(id.clone(), row);
        self.settle(&id, created)
    }

    /// Applies a live event carrying the full entity state.
    pub fn apply_event(&mut self, event: E) -> Applied {
        let id = event.external_id();
        if self.terminated.contains(&id) {
            return Applied::AlreadyTerminal;
        }

        if let Some(stored) = self.active.get(&id)
            && let (Some(current), Some(incoming)) = (stored.version(), event.version())
            && incoming <= current
        {
            tracing::trace!("Discarding stale event for {id}: version {incoming} <= {current}");
            return Applied::Stale;
        }

        let created = self.upsert(id.clone(), event);
        self.settle(&id, created)
    }

    /// Applies a partial update to the active entity with the given external id.
    pub fn update<F>(&mut self, id: &E::Id, f: F) -> Applied
    where
        F: FnOnce(&mut E),
    {
        let Some(entity) = self.active.get_mut(id) else {
            return Applied::Unknown;
        };
        f(entity);
        self.settle(id, false)
    }

    /// Applies a partial update to the active entity found through the secondary index.
    pub fn update_by_secondary<F>(&mut self, key: &SecondaryKey, f: F) -> Applied
    where
        F: FnOnce(&mut E),
    {
        match self.secondary.get(key).cloned() {
            Some(id) => self.update(&id, f),
            None => Applied::Unknown,
        }
    }

    #[must_use]
    pub fn get(&self, id: &E::Id) -> Option<&E> {
        self.active.get(id)
    }

    #[must_use]
    pub fn get_by_secondary(&self, key: &SecondaryKey) -> Option<&E> {
        self.secondary.get(key).and_then(|id| self.active.get(id))
    }

    /// Returns active entities in first-seen order.
    pub fn active(&self) -> impl Iterator<Item = &E> {
        self.active.values()
    }

    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Returns history entries, most recent first.
    pub fn history(&self) -> impl Iterator<Item = &E> {
        self.history.iter()
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Appends older entries to the tail of the history.
    ///
    /// Entries already in the history are skipped. Returns the number appended.
    pub fn extend_history<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = E>,
    {
        let mut appended = 0;
        for entry in entries {
            let id = entry.external_id();
            if !self.terminated.insert(id.clone()) {
                tracing::trace!("{id} already in history, skipping");
                continue;
            }
            self.history.push_back(entry);
            appended += 1;
        }
        appended
    }

    #[must_use]
    pub fn is_terminated(&self, id: &E::Id) -> bool {
        self.terminated.contains(id)
    }

    fn upsert(&mut self, id: E::Id, mut entity: E) -> bool {
        if let Some(previous) = self.active.get(&id) {
            entity.carry_over(previous);
        }

        let secondary = entity.secondary_key();
        let previous = self.active.insert(id.clone(), entity);

        if let Some(stale_key) = previous.as_ref().and_then(LiveEntity::secondary_key)
            && Some(&stale_key) != secondary.as_ref()
        {
            self.secondary.remove(&stale_key);
        }
        if let Some(key) = secondary {
            self.secondary.insert(key, id);
        }

        previous.is_none()
    }

    fn settle(&mut self, id: &E::Id, created: bool) -> Applied {
        let terminal = self.active.get(id).is_some_and(LiveEntity::is_terminal);
        if !terminal {
            return if created {
                Applied::Created
            } else {
                Applied::Updated
            };
        }

        if let Some(entity) = self.active.shift_remove(id) {
            if let Some(key) = entity.secondary_key() {
                self.secondary.remove(&key);
            }
            tracing::debug!("{id} reached terminal status, moving to history");
            self.history.push_front(entity);
            self.terminated.insert(id.clone());
        }
        Applied::Terminated
    }
}
