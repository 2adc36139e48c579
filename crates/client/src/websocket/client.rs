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

//! WebSocket client for the tradehub API.
//!
//! [`WsApiClient`] is a cheap-to-clone handle. It drives the session state machine and the
//! reconnect supervisor, and forwards every request and subscription to the
//! [`SessionHandler`] task, which owns the transport and all session state.
//!
//! # Reconnection
//!
//! After the first successful [`WsApiClient::connect`], a supervisor task watches for
//! transport loss. Each retry waits for the current backoff delay, then opens a new transport,
//! authenticates, sends session options and replays every registered subscription, all within
//! the connect timeout. Requests that were in flight when the connection dropped are never
//! answered. [`WsApiClient::disconnect`] stops the supervisor and is terminal for automatic
//! reconnection.

use std::{
    fmt::Debug,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tradehub_network::{
    ExponentialBackoff,
    websocket::{TransportEvent, WebSocketConfig, WebSocketTransport},
};

use super::{
    auth::AuthMethod,
    clock::ServerClock,
    enums::SessionState,
    error::{SubscribeError, WsApiError, WsApiResult},
    handler::{HandlerCommand, ReplyReceiver, SessionHandler},
    messages::RequestResult,
    requests::{Request, SetOptions, SubscribeRequest},
    subscriptions::{EventCallback, Subscription},
};
use crate::{common::sync::lock, config::WsApiClientConfig};

type HandlerParts = (
    mpsc::UnboundedReceiver<HandlerCommand>,
    mpsc::UnboundedReceiver<TransportEvent>,
    mpsc::UnboundedSender<u64>,
);

struct ClientInner {
    config: WsApiClientConfig,
    ws_config: WebSocketConfig,
    auth: Arc<dyn AuthMethod>,
    state: AtomicU8,
    generation: AtomicU64,
    clock: Arc<ServerClock>,
    cmd_tx: mpsc::UnboundedSender<HandlerCommand>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    handler_parts: Mutex<Option<HandlerParts>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    lost_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<u64>>,
    supervisor: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
    lifecycle_lock: tokio::sync::Mutex<()>,
}

/// WebSocket client for the tradehub API.
#[derive(Clone)]
pub struct WsApiClient {
    inner: Arc<ClientInner>,
}

impl Debug for WsApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(WsApiClient))
            .field("url", &self.inner.config.url)
            .field("platform_id", &self.inner.config.platform_id)
            .field("state", &self.state())
            .field("generation", &self.inner.generation.load(Ordering::Relaxed))
            .field("auth", &self.inner.auth)
            .finish_non_exhaustive()
    }
}

impl WsApiClient {
    /// Creates a new [`WsApiClient`] instance.
    ///
    /// No connection is opened until [`Self::connect`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the reconnect backoff settings are invalid.
    pub fn new(config: WsApiClientConfig, auth: Arc<dyn AuthMethod>) -> anyhow::Result<Self> {
        let ws_config = config.ws_config();
        ws_config.backoff()?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                ws_config,
                auth,
                state: AtomicU8::new(SessionState::Disconnected.as_u8()),
                generation: AtomicU64::new(0),
                clock: Arc::new(ServerClock::default()),
                cmd_tx,
                event_tx,
                handler_parts: Mutex::new(Some((cmd_rx, event_rx, lost_tx))),
                handler_task: Mutex::new(None),
                lost_rx: tokio::sync::Mutex::new(lost_rx),
                supervisor: Mutex::new(None),
                lifecycle_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &WsApiClientConfig {
        &self.inner.config
    }

    /// Returns the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Returns whether the session is `Ready`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Returns the latest server time.
    #[must_use]
    pub fn current_time(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Returns the shared server clock.
    #[must_use]
    pub fn clock(&self) -> Arc<ServerClock> {
        self.inner.clock.clone()
    }

    /// Opens the session: connect, authenticate, configure.
    ///
    /// On success the session is `Ready` and the reconnect supervisor is running. On failure,
    /// including rejected credentials, nothing is retried and the session returns to
    /// `Disconnected`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The session is not `Disconnected` or `Closed`.
    /// - The transport cannot be opened.
    /// - Authentication fails or session options are rejected.
    /// - The whole sequence does not complete within the connect timeout.
    pub async fn connect(&self) -> WsApiResult<()> {
        let _guard = self.inner.lifecycle_lock.lock().await;

        let state = self.state();
        if !matches!(state, SessionState::Disconnected | SessionState::Closed) {
            return Err(WsApiError::ClientError(format!(
                "Cannot connect while session is {state}"
            )));
        }

        self.ensure_handler();

        let timeout = self.inner.ws_config.connect_timeout();
        let result = tokio::time::timeout(timeout, self.establish_session())
            .await
            .unwrap_or_else(|_| {
                Err(WsApiError::Timeout(format!(
                    "session not established within {timeout:?}"
                )))
            });

        if let Err(e) = result {
            tracing::error!("Connect failed: {e}");
            self.reset_session().await;
            self.set_state(SessionState::Disconnected);
            return Err(e);
        }

        self.set_state(SessionState::Ready);
        self.spawn_supervisor();
        tracing::info!("Connected to {}", self.inner.config.url);
        Ok(())
    }

    /// Closes the session and stops reconnecting.
    ///
    /// Pending requests are discarded and complete with [`WsApiError::Disconnected`]. All
    /// subscriptions are removed and request ids restart from 1 on the next connect.
    pub async fn disconnect(&self) {
        let _guard = self.inner.lifecycle_lock.lock().await;

        self.set_state(SessionState::Disconnecting);

        let supervisor = lock(&self.inner.supervisor).take();
        if let Some((token, handle)) = supervisor {
            token.cancel();
            if let Err(e) = handle.await {
                tracing::debug!("Supervisor task ended abnormally: {e}");
            }
        }

        self.reset_session().await;
        self.set_state(SessionState::Closed);
        tracing::info!("Disconnected from {}", self.inner.config.url);
    }

    /// Sends a correlated request and decodes its reply.
    ///
    /// There is no built-in timeout. A request in flight when the connection drops stays
    /// pending forever; wrap the call in `tokio::time::timeout` if that matters.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The session is not connected.
    /// - The reply carries a server error status or a failed result acknowledgement.
    /// - The reply cannot be decoded into `R::Response`.
    /// - The session is explicitly disconnected before the reply arrives.
    pub async fn request<R: Request>(&self, request: R) -> WsApiResult<R::Response> {
        self.check_usable()?;

        let (response_tx, response_rx) = oneshot::channel();
        self.send_command(HandlerCommand::Request {
            name: request.message_name(),
            body: request.message_body(),
            kind: request.kind(),
            result_only: request.result_only(),
            response_tx,
        })?;

        let value = await_reply(response_rx).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Registers `callback` for the events described by `request` and sends the subscribe
    /// frame.
    ///
    /// Callbacks run on the session task, in registration order, and must not block.
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError::NotRegistered`] if the session is not connected, or
    /// [`SubscribeError::NotAcknowledged`] if the server rejects the subscription. In the
    /// latter case the registration is kept and replayed after reconnects.
    pub async fn subscribe<S, F>(&self, request: &S, callback: F) -> Result<Subscription, SubscribeError>
    where
        S: SubscribeRequest,
        F: Fn(S::Event) + Send + Sync + 'static,
    {
        self.check_usable()?;

        let key = request.key();
        let dispatch: EventCallback = Arc::new(move |msg: &Value| match S::Event::deserialize(msg) {
            Ok(event) => callback(event),
            Err(e) => tracing::warn!("Failed to decode {key} event: {e}"),
        });

        let (response_tx, response_rx) = oneshot::channel();
        self.send_command(HandlerCommand::Subscribe {
            key,
            body: request.message_body(),
            callback: dispatch,
            response_tx,
        })?;

        let (subscription, ack_rx) = response_rx
            .await
            .map_err(|_| WsApiError::Disconnected)?;

        match await_result(ack_rx).await {
            Ok(_) => Ok(subscription),
            Err(source) => Err(SubscribeError::NotAcknowledged {
                subscription,
                source,
            }),
        }
    }

    /// Removes a subscription and sends the unsubscribe frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not connected or the unsubscribe frame is not
    /// acknowledged. The local registration is removed either way.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> WsApiResult<RequestResult> {
        self.check_usable()?;

        let (response_tx, response_rx) = oneshot::channel();
        self.send_command(HandlerCommand::Unsubscribe {
            subscription: subscription.clone(),
            response_tx,
        })?;

        await_result(response_rx).await
    }

    fn check_usable(&self) -> WsApiResult<()> {
        match self.state() {
            SessionState::Disconnected | SessionState::Disconnecting | SessionState::Closed => {
                Err(WsApiError::NotConnected)
            }
            _ => Ok(()),
        }
    }

    fn set_state(&self, state: SessionState) {
        let previous = SessionState::from_u8(self.inner.state.swap(state.as_u8(), Ordering::AcqRel));
        if previous != state {
            tracing::debug!("Session state {previous} -> {state}");
        }
    }

    fn send_command(&self, cmd: HandlerCommand) -> WsApiResult<()> {
        self.inner
            .cmd_tx
            .send(cmd)
            .map_err(|_| WsApiError::ClientError("session handler stopped".to_string()))
    }

    fn ensure_handler(&self) {
        let Some((cmd_rx, event_rx, lost_tx)) = lock(&self.inner.handler_parts).take() else {
            return;
        };

        let mut handler = SessionHandler::new(cmd_rx, event_rx, lost_tx, self.inner.clock.clone());
        let handle = tokio::spawn(async move {
            handler.run().await;
        });
        *lock(&self.inner.handler_task) = Some(handle);
    }

    fn handler_running(&self) -> bool {
        lock(&self.inner.handler_task)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    async fn establish_session(&self) -> WsApiResult<()> {
        self.set_state(SessionState::Connecting);

        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let transport =
            WebSocketTransport::connect(&self.inner.ws_config, generation, self.inner.event_tx.clone())
                .await?;
        self.send_command(HandlerCommand::SetTransport(transport))?;

        self.set_state(SessionState::Authenticating);
        if !self.inner.auth.authenticate(self).await? {
            return Err(WsApiError::Authentication(
                "credentials rejected by server".to_string(),
            ));
        }

        self.set_state(SessionState::ConfiguringSession);
        self.request(SetOptions { send_results: true })
            .await?
            .into_result()?;

        Ok(())
    }

    async fn replay_subscriptions(&self) -> WsApiResult<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send_command(HandlerCommand::Replay { response_tx })?;
        let acks = response_rx.await.map_err(|_| WsApiError::Disconnected)?;

        for (key, ack_rx) in acks {
            if let Err(e) = await_result(ack_rx).await {
                tracing::warn!("Resubscribe to {key} failed: {e}");
            }
        }

        Ok(())
    }

    async fn close_transport(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .send_command(HandlerCommand::CloseTransport { done_tx })
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }

    async fn reset_session(&self) {
        if !self.handler_running() {
            return;
        }

        let (done_tx, done_rx) = oneshot::channel();
        if self
            .send_command(HandlerCommand::Disconnect { done_tx })
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }

    fn spawn_supervisor(&self) {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let client = self.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                () = task_token.cancelled() => {
                    tracing::debug!("Reconnect supervisor cancelled");
                }
                () = client.supervise() => {}
            }
        });

        let previous = lock(&self.inner.supervisor).replace((token, handle));
        if let Some((token, _)) = previous {
            token.cancel();
        }
    }

    async fn supervise(&self) {
        let mut backoff = match self.inner.ws_config.backoff() {
            Ok(backoff) => backoff,
            Err(e) => {
                tracing::error!("Invalid reconnect configuration: {e}");
                return;
            }
        };

        let mut lost_rx = self.inner.lost_rx.lock().await;

        while let Some(generation) = lost_rx.recv().await {
            let current = self.inner.generation.load(Ordering::Acquire);
            if generation != current {
                tracing::debug!("Ignoring loss of stale transport {generation} (current {current})");
                continue;
            }

            self.set_state(SessionState::Reconnecting);
            if !self.reconnect(&mut backoff).await {
                return;
            }
        }
    }

    async fn reconnect(&self, backoff: &mut ExponentialBackoff) -> bool {
        let timeout = self.inner.ws_config.connect_timeout();
        let max_attempts = self.inner.ws_config.reconnect_max_attempts;
        let mut delay = backoff.current_delay();
        let mut attempts: u32 = 0;

        loop {
            tracing::info!("Reconnecting in {delay:?}");
            tokio::time::sleep(delay).await;
            attempts += 1;

            let attempt = async {
                self.establish_session().await?;
                self.replay_subscriptions().await
            };
            let result = tokio::time::timeout(timeout, attempt)
                .await
                .unwrap_or_else(|_| {
                    Err(WsApiError::Timeout(format!(
                        "reconnect not completed within {timeout:?}"
                    )))
                });

            match result {
                Ok(()) => {
                    backoff.reset();
                    self.set_state(SessionState::Ready);
                    tracing::info!("Reconnected after {attempts} attempt(s)");
                    return true;
                }
                Err(e) => {
                    tracing::error!("Reconnect attempt {attempts} failed: {e}");
                    self.close_transport().await;

                    if max_attempts.is_some_and(|max| attempts >= max) {
                        tracing::error!("Giving up after {attempts} reconnect attempts");
                        self.reset_session().await;
                        self.set_state(SessionState::Closed);
                        return false;
                    }

                    self.set_state(SessionState::Reconnecting);
                    delay = backoff.next_duration();
                }
            }
        }
    }
}

async fn await_reply(rx: ReplyReceiver) -> WsApiResult<Value> {
    rx.await.map_err(|_| WsApiError::Disconnected)?
}

async fn await_result(rx: ReplyReceiver) -> WsApiResult<RequestResult> {
    let value = await_reply(rx).await?;
    serde_json::from_value::<RequestResult>(value)?.into_result()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rstest::rstest;

    use super::*;

    #[derive(Debug)]
    struct NoAuth;

    #[async_trait]
    impl AuthMethod for NoAuth {
        async fn authenticate(&self, _client: &WsApiClient) -> WsApiResult<bool> {
            Ok(true)
        }
    }

    fn client() -> WsApiClient {
        let config = WsApiClientConfig::new("ws://127.0.0.1:1/echo/websocket", 1);
        WsApiClient::new(config, Arc::new(NoAuth)).unwrap()
    }

    #[rstest]
    fn test_new_client_is_disconnected() {
        let client = client();

        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(!client.is_ready());
    }

    #[rstest]
    fn test_invalid_backoff_rejected() {
        let mut config = WsApiClientConfig::new("ws://127.0.0.1:1", 1);
        config.reconnect_backoff_factor = 0.5;

        assert!(WsApiClient::new(config, Arc::new(NoAuth)).is_err());
    }

    #[rstest]
    #[tokio::test]
    async fn test_request_before_connect_is_not_connected() {
        let client = client();

        let result = client.request(SetOptions { send_results: true }).await;

        assert!(matches!(result, Err(WsApiError::NotConnected)));
    }

    #[rstest]
    #[tokio::test]
    async fn test_disconnect_before_connect_is_closed() {
        let client = client();

        client.disconnect().await;

        assert_eq!(client.state(), SessionState::Closed);
    }

    #[rstest]
    #[tokio::test]
    async fn test_connect_refused_returns_to_disconnected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = WsApiClientConfig::new(format!("ws://{addr}/echo/websocket"), 1);
        let client = WsApiClient::new(config, Arc::new(NoAuth)).unwrap();

        let result = client.connect().await;

        assert!(matches!(result, Err(WsApiError::Transport(_))));
        assert_eq!(client.state(), SessionState::Disconnected);
    }
}
