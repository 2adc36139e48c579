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

//! Websocket transport with split read/write tasks.
//!
//! A [`WebSocketTransport`] represents exactly one physical connection. The write half lives in
//! a task fed by an unbounded channel, so any number of callers may queue frames without
//! awaiting the socket. The read half lives in a second task that forwards text frames as
//! [`TransportEvent::Text`] and emits a single [`TransportEvent::Closed`] when the connection
//! ends for any reason.
//!
//! Every event is tagged with the `generation` the transport was created with. A session that
//! replaces its transport uses the tag to ignore late events from the previous connection.

use std::time::Duration;

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::{HeaderName, HeaderValue},
    },
};

use super::config::WebSocketConfig;
use crate::{
    error::{SendError, TransportError},
    logging::{log_task_aborted, log_task_started, log_task_stopped},
    tls::create_tls_config,
};

type MessageWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type MessageReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 2;

/// Inbound notifications produced by the read task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame received on the connection.
    Text { generation: u64, text: String },
    /// The connection terminated: close frame, read error or end of stream.
    Closed { generation: u64, reason: String },
}

impl TransportEvent {
    /// Returns the generation of the connection that produced this event.
    #[must_use]
    pub fn generation(&self) -> u64 {
        match self {
            Self::Text { generation, .. } | Self::Closed { generation, .. } => *generation,
        }
    }
}

#[derive(Debug)]
enum WriterCommand {
    Send(Message),
    Close,
}

/// One live websocket connection.
#[derive(Debug)]
pub struct WebSocketTransport {
    generation: u64,
    writer_tx: mpsc::UnboundedSender<WriterCommand>,
    read_task: Option<JoinHandle<()>>,
    write_task: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    /// Opens a connection and spawns its read and write tasks.
    ///
    /// Inbound events are pushed into `event_tx`, tagged with `generation`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The URL or a header is invalid.
    /// - The handshake fails or does not complete within the connect timeout.
    pub async fn connect(
        config: &WebSocketConfig,
        generation: u64,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self, TransportError> {
        let mut request = config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let req_headers = request.headers_mut();

        for (key, val) in &config.headers {
            let header_name = key
                .parse::<HeaderName>()
                .map_err(|e| TransportError::InvalidHeader(format!("{key}: {e}")))?;
            let header_value = HeaderValue::from_str(val)
                .map_err(|e| TransportError::InvalidHeader(format!("{key}: {e}")))?;
            req_headers.insert(header_name, header_value);
        }

        let timeout = config.connect_timeout();
        let connector = Connector::Rustls(create_tls_config());

        let (stream, _response) = tokio::time::timeout(
            timeout,
            connect_async_tls_with_config(request, None, true, Some(connector)),
        )
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;

        log::debug!("Connected to {} (generation {generation})", config.url);

        let (writer, reader) = stream.split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel::<WriterCommand>();

        let write_task = Self::spawn_write_task(generation, writer, writer_rx);
        let read_task = Self::spawn_read_task(generation, reader, writer_tx.clone(), event_tx);

        Ok(Self {
            generation,
            writer_tx,
            read_task: Some(read_task),
            write_task: Some(write_task),
        })
    }

    /// Returns the generation tag of this connection.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns whether the read task is still running.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.read_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Queues a text frame for sending.
    ///
    /// # Errors
    ///
    /// Returns an error if the write task has stopped.
    pub fn send_text(&self, text: String) -> Result<(), SendError> {
        self.writer_tx
            .send(WriterCommand::Send(Message::Text(text.into())))
            .map_err(|_| SendError::Closed)
    }

    /// Sends a close frame and stops both tasks.
    pub async fn close(mut self) {
        let _ = self.writer_tx.send(WriterCommand::Close);

        if let Some(mut task) = self.write_task.take() {
            let timeout = Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT_SECS);
            if tokio::time::timeout(timeout, &mut task).await.is_err() {
                log::warn!("Write task did not finish within {timeout:?}");
                task.abort();
                log_task_aborted("write");
            }
        }

        if let Some(task) = self.read_task.take()
            && !task.is_finished()
        {
            task.abort();
            log_task_aborted("read");
        }
    }

    fn spawn_read_task(
        generation: u64,
        mut reader: MessageReader,
        writer_tx: mpsc::UnboundedSender<WriterCommand>,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> JoinHandle<()> {
        tokio::task::spawn(async move {
            log_task_started("read");

            let reason = loop {
                match reader.next().await {
                    Some(Ok(Message::Text(text))) => {
                        log::trace!("Received message: {}", text.as_str());
                        let event = TransportEvent::Text {
                            generation,
                            text: text.as_str().to_owned(),
                        };
                        if event_tx.send(event).is_err() {
                            break "event receiver dropped".to_string();
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        log::trace!("Ignoring binary message: {} bytes", data.len());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = writer_tx.send(WriterCommand::Send(Message::Pong(data)));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break format!("close frame received: {frame:?}");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break format!("read error: {e}"),
                    None => break "stream ended".to_string(),
                }
            };

            log::debug!("Connection {generation} terminated: {reason}");
            let _ = event_tx.send(TransportEvent::Closed { generation, reason });

            log_task_stopped("read");
        })
    }

    fn spawn_write_task(
        generation: u64,
        mut writer: MessageWriter,
        mut writer_rx: mpsc::UnboundedReceiver<WriterCommand>,
    ) -> JoinHandle<()> {
        tokio::task::spawn(async move {
            log_task_started("write");

            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(msg) => {
                        if let Err(e) = writer.send(msg).await {
                            log::error!("Failed to send message on connection {generation}: {e}");
                            break;
                        }
                    }
                    WriterCommand::Close => {
                        // Writer may already be closed by the peer
                        _ = tokio::time::timeout(
                            Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT_SECS),
                            writer.close(),
                        )
                        .await;
                        break;
                    }
                }
            }

            log_task_stopped("write");
        })
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        for task in [self.read_task.take(), self.write_task.take()]
            .into_iter()
            .flatten()
        {
            if !task.is_finished() {
                task.abort();
            }
        }
    }
}
