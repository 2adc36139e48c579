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

//! Session handler for the tradehub websocket API.
//!
//! The handler runs in a dedicated Tokio task as the single owner of the session state: the
//! live transport, the request correlator and the subscription registry. The client talks to
//! it only through [`HandlerCommand`]s, and inbound frames arrive on the transport event
//! channel. Both are drained by one `select!` loop, so frames are classified and callbacks run
//! strictly in arrival order without any locking.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tradehub_network::websocket::{TransportEvent, WebSocketTransport};

use super::{
    clock::ServerClock,
    correlator::{ReplyOutcome, ReplySender, RequestCorrelator},
    enums::RequestKind,
    error::{WsApiError, WsApiResult},
    messages::{OutboundFrame, WsApiMessage, parse_raw_message},
    subscriptions::{EventCallback, Subscription, SubscriptionKey, SubscriptionRegistry},
};
use crate::common::consts::{MSG_SUBSCRIBE, MSG_UNSUBSCRIBE};

/// Receiver for the reply to an issued frame.
pub type ReplyReceiver = oneshot::Receiver<WsApiResult<Value>>;

/// Commands sent from the client to the handler.
#[allow(missing_debug_implementations)]
pub enum HandlerCommand {
    /// Attach a freshly connected transport.
    SetTransport(WebSocketTransport),
    /// Close the transport, keeping pending requests and subscriptions.
    CloseTransport { done_tx: oneshot::Sender<()> },
    /// Close the transport, discard pending requests and clear subscriptions.
    Disconnect { done_tx: oneshot::Sender<()> },
    /// Send a correlated request.
    Request {
        name: &'static str,
        body: Value,
        kind: RequestKind,
        result_only: bool,
        response_tx: ReplySender,
    },
    /// Register a subscription and send its subscribe frame.
    Subscribe {
        key: SubscriptionKey,
        body: Value,
        callback: EventCallback,
        response_tx: oneshot::Sender<(Subscription, ReplyReceiver)>,
    },
    /// Remove a subscription and send its unsubscribe frame.
    Unsubscribe {
        subscription: Subscription,
        response_tx: ReplySender,
    },
    /// Re-send the subscribe frame of every registered subscription.
    Replay {
        response_tx: oneshot::Sender<Vec<(SubscriptionKey, ReplyReceiver)>>,
    },
}

/// Owner of the session state.
#[allow(missing_debug_implementations)]
pub struct SessionHandler {
    inner: Option<WebSocketTransport>,
    cmd_rx: mpsc::UnboundedReceiver<HandlerCommand>,
    event_rx: mpsc::UnboundedReceiver<TransportEvent>,
    lost_tx: mpsc::UnboundedSender<u64>,
    correlator: RequestCorrelator,
    registry: SubscriptionRegistry,
    clock: Arc<ServerClock>,
    last_closed_generation: u64,
}

impl SessionHandler {
    /// Creates a new [`SessionHandler`].
    ///
    /// The generation of every transport lost without being asked to close is reported on
    /// `lost_tx`.
    #[must_use]
    pub fn new(
        cmd_rx: mpsc::UnboundedReceiver<HandlerCommand>,
        event_rx: mpsc::UnboundedReceiver<TransportEvent>,
        lost_tx: mpsc::UnboundedSender<u64>,
        clock: Arc<ServerClock>,
    ) -> Self {
        Self {
            inner: None,
            cmd_rx,
            event_rx,
            lost_tx,
            correlator: RequestCorrelator::new(),
            registry: SubscriptionRegistry::new(),
            clock,
            last_closed_generation: 0,
        }
    }

    /// Runs until the command channel closes.
    pub async fn run(&mut self) {
        tracing::debug!("Session handler started");

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.process_command(cmd).await,
                    None => break,
                },
                Some(event) = self.event_rx.recv() => self.process_event(event),
            }
        }

        if let Some(transport) = self.inner.take() {
            transport.close().await;
        }

        tracing::debug!("Session handler stopped");
    }

    async fn process_command(&mut self, cmd: HandlerCommand) {
        match cmd {
            HandlerCommand::SetTransport(transport) => self.set_transport(transport),
            HandlerCommand::CloseTransport { done_tx } => {
                self.close_transport().await;
                let _ = done_tx.send(());
            }
            HandlerCommand::Disconnect { done_tx } => {
                self.close_transport().await;
                let discarded = self.correlator.reset();
                let subscriptions = self.registry.len();
                self.registry.clear();
                tracing::debug!(
                    "Session reset: discarded {discarded} pending requests and {subscriptions} subscriptions"
                );
                let _ = done_tx.send(());
            }
            HandlerCommand::Request {
                name,
                body,
                kind,
                result_only,
                response_tx,
            } => self.issue(name, body, kind, result_only, response_tx),
            HandlerCommand::Subscribe {
                key,
                body,
                callback,
                response_tx,
            } => {
                let subscription = self.registry.register(key, body.clone(), callback);
                tracing::debug!("Subscribing {subscription}");
                let ack_rx = self.issue_subscribe(MSG_SUBSCRIBE, body, RequestKind::Subscribe);
                let _ = response_tx.send((subscription, ack_rx));
            }
            HandlerCommand::Unsubscribe {
                subscription,
                response_tx,
            } => {
                if !self.registry.remove(&subscription) {
                    tracing::debug!("Subscription {subscription} was not registered");
                }
                tracing::debug!("Unsubscribing {subscription}");
                self.issue(
                    MSG_UNSUBSCRIBE,
                    subscription.body().clone(),
                    RequestKind::Unsubscribe,
                    true,
                    response_tx,
                );
            }
            HandlerCommand::Replay { response_tx } => {
                let bodies = self.registry.replay_bodies();
                tracing::debug!("Replaying {} subscriptions", bodies.len());
                let acks = bodies
                    .into_iter()
                    .map(|(key, body)| {
                        (
                            key,
                            self.issue_subscribe(MSG_SUBSCRIBE, body, RequestKind::Subscribe),
                        )
                    })
                    .collect();
                let _ = response_tx.send(acks);
            }
        }
    }

    fn set_transport(&mut self, transport: WebSocketTransport) {
        let generation = transport.generation();

        if let Some(previous) = self.inner.take() {
            tracing::debug!(
                "Replacing transport {} with {generation}",
                previous.generation()
            );
        }

        if !transport.is_alive() || generation <= self.last_closed_generation {
            tracing::debug!("Transport {generation} closed before it was attached");
            self.report_lost(generation);
            return;
        }

        tracing::debug!("Transport {generation} attached");
        self.inner = Some(transport);
    }

    async fn close_transport(&mut self) {
        if let Some(transport) = self.inner.take() {
            tracing::debug!("Closing transport {}", transport.generation());
            transport.close().await;
        }
    }

    fn report_lost(&mut self, generation: u64) {
        self.last_closed_generation = self.last_closed_generation.max(generation);
        if self.lost_tx.send(generation).is_err() {
            tracing::trace!("No supervisor listening for lost transport {generation}");
        }
    }

    fn issue_subscribe(&mut self, name: &'static str, body: Value, kind: RequestKind) -> ReplyReceiver {
        let (tx, rx) = oneshot::channel();
        self.issue(name, body, kind, true, tx);
        rx
    }

    fn issue(
        &mut self,
        name: &'static str,
        body: Value,
        kind: RequestKind,
        result_only: bool,
        response_tx: ReplySender,
    ) {
        let Some(transport) = &self.inner else {
            let _ = response_tx.send(Err(WsApiError::NotConnected));
            return;
        };

        let request_id = self.correlator.next_request_id();
        let frame = OutboundFrame::new(name, request_id, body);
        let payload = match serde_json::to_string(&frame) {
            Ok(payload) => payload,
            Err(e) => {
                let _ = response_tx.send(Err(e.into()));
                return;
            }
        };

        self.correlator
            .register(request_id, kind, result_only, response_tx);

        tracing::trace!("Sending frame: {payload}");
        if let Err(e) = transport.send_text(payload) {
            tracing::warn!("Failed to send {kind} request {request_id}: {e}");
            self.correlator.reject(request_id, e.into());
        }
    }

    fn process_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Text { text, .. } => self.handle_text(&text),
            TransportEvent::Closed { generation, reason } => {
                let is_current = self
                    .inner
                    .as_ref()
                    .is_some_and(|transport| transport.generation() == generation);

                if is_current {
                    tracing::warn!("Connection lost (generation {generation}): {reason}");
                    self.inner = None;
                } else {
                    tracing::debug!("Ignoring close of inactive transport {generation}: {reason}");
                }

                if is_current || generation > self.last_closed_generation {
                    self.report_lost(generation);
                }
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        tracing::trace!("Received frame: {text}");

        let message = match parse_raw_message(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Dropping undecodable frame: {e}");
                return;
            }
        };

        match message {
            WsApiMessage::Reply {
                request_id,
                status,
                msg,
            } => {
                if self.correlator.on_reply(&request_id, status, msg) == ReplyOutcome::Unmatched {
                    tracing::debug!("Dropping reply for unknown request {request_id}");
                }
            }
            WsApiMessage::Result {
                request_id,
                status,
                msg,
            } => {
                if self.correlator.on_result(&request_id, status, msg) == ReplyOutcome::Unmatched {
                    tracing::debug!("Dropping result for unknown request {request_id}");
                }
            }
            WsApiMessage::Event { key, msg } => {
                self.registry.dispatch(&key, &msg);
            }
            WsApiMessage::TimeSync(unix_millis) => {
                self.clock.set_unix_millis(unix_millis);
            }
            WsApiMessage::AuthenticationFailed => {
                let rejected = self.correlator.on_authentication_failed();
                tracing::warn!("Server reported authentication failure ({rejected} requests rejected)");
            }
            WsApiMessage::Unknown { name } => {
                tracing::trace!("Ignoring frame {name:?}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rstest::{fixture, rstest};
    use serde_json::json;
    use tokio::sync::oneshot::error::TryRecvError;

    use super::*;

    struct Harness {
        handler: SessionHandler,
        lost_rx: mpsc::UnboundedReceiver<u64>,
        clock: Arc<ServerClock>,
        _cmd_tx: mpsc::UnboundedSender<HandlerCommand>,
        _event_tx: mpsc::UnboundedSender<TransportEvent>,
    }

    #[fixture]
    fn harness() -> Harness {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        let clock = Arc::new(ServerClock::new(0));
        Harness {
            handler: SessionHandler::new(cmd_rx, event_rx, lost_tx, clock.clone()),
            lost_rx,
            clock,
            _cmd_tx: cmd_tx,
            _event_tx: event_tx,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_request_without_transport_fails_fast(mut harness: Harness) {
        let (tx, mut rx) = oneshot::channel();

        harness
            .handler
            .process_command(HandlerCommand::Request {
                name: "sendMessage",
                body: json!({}),
                kind: RequestKind::Call,
                result_only: false,
                response_tx: tx,
            })
            .await;

        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(WsApiError::NotConnected)
        ));
        assert_eq!(harness.handler.correlator.last_request_id(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn test_subscribe_registers_even_without_transport(mut harness: Harness) {
        let (tx, rx) = oneshot::channel();
        let key = SubscriptionKey::new("balances", "balance-changed");

        harness
            .handler
            .process_command(HandlerCommand::Subscribe {
                key,
                body: json!({"name": "balances.balance-changed", "version": "1.0"}),
                callback: Arc::new(|_: &Value| {}),
                response_tx: tx,
            })
            .await;

        let (subscription, mut ack_rx) = rx.await.unwrap();
        assert_eq!(subscription.key(), key);
        assert!(harness.handler.registry.contains(&subscription));
        assert!(matches!(
            ack_rx.try_recv().unwrap(),
            Err(WsApiError::NotConnected)
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn test_disconnect_clears_state(mut harness: Harness) {
        let (reply_tx, mut reply_rx) = oneshot::channel();
        harness.handler.correlator.next_request_id();
        harness
            .handler
            .correlator
            .register(1, RequestKind::Call, false, reply_tx);
        harness.handler.registry.register(
            SubscriptionKey::new("portfolio", "position-changed"),
            json!({}),
            Arc::new(|_: &Value| {}),
        );

        let (done_tx, done_rx) = oneshot::channel();
        harness
            .handler
            .process_command(HandlerCommand::Disconnect { done_tx })
            .await;
        done_rx.await.unwrap();

        assert!(harness.handler.correlator.is_empty());
        assert_eq!(harness.handler.correlator.last_request_id(), 0);
        assert!(harness.handler.registry.is_empty());
        assert!(matches!(reply_rx.try_recv(), Err(TryRecvError::Closed)));
    }

    #[rstest]
    fn test_event_frames_dispatch_in_order(mut harness: Harness) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let key = SubscriptionKey::new("portfolio", "position-changed");
        for tag in ["a", "b"] {
            let seen = seen.clone();
            harness.handler.registry.register(
                key,
                json!({}),
                Arc::new(move |msg: &Value| seen.lock().unwrap().push(format!("{tag}{msg}"))),
            );
        }

        harness
            .handler
            .handle_text(r#"{"microserviceName":"portfolio","name":"position-changed","msg":1}"#);
        harness
            .handler
            .handle_text(r#"{"microserviceName":"portfolio","name":"position-changed","msg":2}"#);

        assert_eq!(*seen.lock().unwrap(), vec!["a1", "b1", "a2", "b2"]);
    }

    #[rstest]
    fn test_time_sync_updates_clock(mut harness: Harness) {
        harness
            .handler
            .handle_text(r#"{"name":"timeSync","msg":1700000000500}"#);

        assert_eq!(harness.clock.unix_millis(), 1_700_000_000_500);
    }

    #[rstest]
    fn test_authenticated_false_rejects_pending_authentication(mut harness: Harness) {
        let (tx, mut rx) = oneshot::channel();
        let id = harness.handler.correlator.next_request_id();
        harness
            .handler
            .correlator
            .register(id, RequestKind::Authenticate, false, tx);

        harness
            .handler
            .handle_text(r#"{"name":"authenticated","msg":false}"#);

        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(WsApiError::Authentication(_))
        ));
    }

    #[rstest]
    fn test_garbage_frames_are_ignored(mut harness: Harness) {
        harness.handler.handle_text("{not json");
        harness.handler.handle_text(r#"{"request_id":"99","msg":{}}"#);

        assert!(harness.handler.correlator.is_empty());
    }

    #[rstest]
    fn test_close_of_unattached_generation_is_reported_once(mut harness: Harness) {
        harness.handler.process_event(TransportEvent::Closed {
            generation: 4,
            reason: "stream ended".to_string(),
        });
        harness.handler.process_event(TransportEvent::Closed {
            generation: 3,
            reason: "stream ended".to_string(),
        });

        assert_eq!(harness.lost_rx.try_recv().unwrap(), 4);
        assert!(harness.lost_rx.try_recv().is_err());
        assert_eq!(harness.handler.last_closed_generation, 4);
    }
}
