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

//! Snapshot+stream reconciliation shared by every entity family.
//!
//! A family loads its initial state with [`load_snapshot`], feeding rows into a
//! [`Reconciler`], then keeps it current from subscription callbacks. The reconciler sits
//! behind a [`SharedReconciler`] because callbacks run on the session task while readers and
//! snapshot loads run on caller tasks.

pub mod reconciler;
pub mod snapshot;
pub mod timer;

use std::sync::{Arc, Mutex};

use crate::websocket::{
    error::{SubscribeError, WsApiResult},
    subscriptions::Subscription,
};

pub use reconciler::{Applied, LiveEntity, Reconciler, SecondaryKey};
pub use snapshot::{SnapshotPage, SnapshotSource, load_snapshot};
pub use timer::PeriodicTask;

/// A [`Reconciler`] shared between the session task and its owning facade.
pub type SharedReconciler<E> = Arc<Mutex<Reconciler<E>>>;

/// Creates an empty [`SharedReconciler`].
#[must_use]
pub fn shared_reconciler<E: LiveEntity>() -> SharedReconciler<E> {
    Arc::new(Mutex::new(Reconciler::new()))
}

/// Accepts a subscription the server declined to acknowledge.
///
/// The registration stays in place and is replayed after every reconnect, so a family keeps
/// running on a transient rejection. Only a failure to register at all is returned.
pub(crate) fn registered(result: Result<Subscription, SubscribeError>) -> WsApiResult<Subscription> {
    match result {
        Ok(subscription) => Ok(subscription),
        Err(SubscribeError::NotAcknowledged {
            subscription,
            source,
        }) => {
            tracing::warn!("Subscription {subscription} not acknowledged, kept for replay: {source}");
            Ok(subscription)
        }
        Err(SubscribeError::NotRegistered(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;
    use crate::websocket::{
        error::WsApiError,
        subscriptions::{SubscriptionKey, SubscriptionRegistry},
    };

    fn subscription() -> Subscription {
        SubscriptionRegistry::new().register(
            SubscriptionKey::new("portfolio", "position-changed"),
            json!({"name": "portfolio.position-changed", "version": "3.0"}),
            Arc::new(|_| {}),
        )
    }

    #[rstest]
    #[traced_test]
    fn test_unacknowledged_subscription_is_kept() {
        let subscription = subscription();

        let result = registered(Err(SubscribeError::NotAcknowledged {
            subscription: subscription.clone(),
            source: WsApiError::Unsuccessful { reason: None },
        }));

        assert_eq!(result.unwrap().id(), subscription.id());
        assert!(logs_contain("kept for replay"));
    }

    #[rstest]
    fn test_unregistered_subscription_fails() {
        let result = registered(Err(SubscribeError::NotRegistered(WsApiError::NotConnected)));

        assert_eq!(result.unwrap_err(), WsApiError::NotConnected);
    }
}
