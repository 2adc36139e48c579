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

//! Periodic maintenance tasks gated on session readiness.

use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tradehub_network::logging::{log_task_aborted, log_task_started, log_task_stopped};

use crate::websocket::{
    client::WsApiClient,
    error::{WsApiResult, should_retry_ws_api_error},
};

/// A background task that runs `tick` every `period` while the session is `Ready`.
///
/// Ticks that fall due while the session is connecting or reconnecting are skipped, not
/// queued. The first tick fires one full period after spawning.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawns a new [`PeriodicTask`] on the current tokio runtime.
    #[must_use]
    pub fn spawn<F, Fut>(
        name: &'static str,
        period: Duration,
        client: WsApiClient,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = WsApiResult<()>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            log_task_started(name);

            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    _ = interval.tick() => {
                        if !client.is_ready() {
                            tracing::debug!("Skipping '{name}' tick: session is {}", client.state());
                            continue;
                        }

                        tokio::select! {
                            () = task_token.cancelled() => break,
                            result = tick() => match result {
                                Ok(()) => {}
                                Err(e) if should_retry_ws_api_error(&e) => {
                                    tracing::warn!("'{name}' tick failed, retrying next period: {e}");
                                }
                                Err(e) => tracing::error!("'{name}' tick failed: {e}"),
                            },
                        }
                    }
                }
            }

            log_task_stopped(name);
        });

        Self {
            name,
            token,
            handle: Some(handle),
        }
    }

    /// Stops the task. Idempotent.
    pub fn close(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take()
            && !handle.is_finished()
        {
            handle.abort();
            log_task_aborted(self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use rstest::rstest;

    use super::*;
    use crate::{
        config::WsApiClientConfig,
        websocket::{auth::AuthMethod, error::WsApiResult},
    };

    #[derive(Debug)]
    struct NoAuth;

    #[async_trait]
    impl AuthMethod for NoAuth {
        async fn authenticate(&self, _client: &WsApiClient) -> WsApiResult<bool> {
            Ok(true)
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_ticks_skipped_while_not_ready() {
        let config = WsApiClientConfig::new("ws://127.0.0.1:1", 1);
        let client = WsApiClient::new(config, Arc::new(NoAuth)).unwrap();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        let task = PeriodicTask::spawn("test", Duration::from_millis(20), client, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        task.close();
        assert!(task.is_closed());
    }
}
