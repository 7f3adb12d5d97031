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

//! Single-connection WebSocket client.
//!
//! The client splits the connection into read and write halves. The read
//! half runs in a dedicated task forwarding every inbound frame into an
//! unbounded channel; the write half runs in a writer task fed by an mpsc
//! sender so multiple scopes can send without sharing a lock. An optional
//! heartbeat task pings the server on an interval and declares the
//! connection dead when no traffic follows a ping within the pong deadline.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Error, Message,
        client::IntoClientRequest,
        http::{HeaderName, HeaderValue},
    },
};

use super::{WebSocketConfig, WsError};

/// One live WebSocket connection.
///
/// Dropping the connection aborts all of its background tasks. A `None`
/// returned from [`WsConnection::recv`] means the connection is finished,
/// whether by server close, transport error or missed heartbeat; the caller
/// owns the decision to dial again.
#[derive(Debug)]
pub struct WsConnection {
    frame_rx: tokio::sync::mpsc::UnboundedReceiver<Message>,
    writer_tx: tokio::sync::mpsc::UnboundedSender<Message>,
    read_task: tokio::task::JoinHandle<()>,
    write_task: tokio::task::JoinHandle<()>,
    heartbeat_task: Option<tokio::task::JoinHandle<()>>,
    stale_rx: tokio::sync::watch::Receiver<bool>,
}

impl WsConnection {
    /// Dials the server and performs the upgrade handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or headers are malformed, the handshake
    /// is rejected (the HTTP status is surfaced for 4xx upgrades), or the
    /// dial exceeds `config.connect_timeout`.
    pub async fn connect(config: WebSocketConfig) -> Result<Self, WsError> {
        let mut request = config
            .url
            .clone()
            .into_client_request()
            .map_err(|e| WsError::Handshake(e.to_string()))?;

        let req_headers = request.headers_mut();
        for (key, val) in &config.headers {
            let header_name: HeaderName = key
                .parse()
                .map_err(|e| WsError::Handshake(format!("Invalid header '{key}': {e}")))?;
            let header_value = HeaderValue::from_str(val)
                .map_err(|e| WsError::Handshake(format!("Invalid header value: {e}")))?;
            req_headers.insert(header_name, header_value);
        }

        let (stream, _response) =
            tokio::time::timeout(config.connect_timeout, connect_async(request))
                .await
                .map_err(|_| WsError::ConnectTimeout(config.connect_timeout))?
                .map_err(|e| match e {
                    Error::Http(response) => WsError::UpgradeRejected(response.status().as_u16()),
                    other => WsError::Handshake(other.to_string()),
                })?;

        log::debug!("WebSocket connected: {}", config.url);

        let (mut writer, mut reader) = stream.split();

        let connected_at = Instant::now();
        let last_rx_ms = Arc::new(AtomicU64::new(0));
        let (frame_tx, frame_rx) = tokio::sync::mpsc::unbounded_channel::<Message>();
        let (writer_tx, mut writer_rx) = tokio::sync::mpsc::unbounded_channel::<Message>();
        let (stale_tx, stale_rx) = tokio::sync::watch::channel(false);

        let read_last_rx = last_rx_ms.clone();
        let read_task = tokio::spawn(async move {
            while let Some(result) = reader.next().await {
                read_last_rx.store(
                    connected_at.elapsed().as_millis() as u64,
                    Ordering::Relaxed,
                );
                match result {
                    Ok(msg) => {
                        let is_close = matches!(msg, Message::Close(_));
                        if frame_tx.send(msg).is_err() {
                            log::debug!("Frame receiver dropped, stopping read task");
                            break;
                        }
                        if is_close {
                            log::debug!("Close frame received, stopping read task");
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("WebSocket read error: {e}");
                        break;
                    }
                }
            }
            // Dropping `frame_tx` closes the channel and signals disconnect
        });

        let write_task = tokio::spawn(async move {
            while let Some(msg) = writer_rx.recv().await {
                if let Err(e) = writer.send(msg).await {
                    log::warn!("WebSocket write error: {e}");
                    break;
                }
            }
        });

        let heartbeat_task = config.heartbeat_secs.map(|heartbeat_secs| {
            let interval = Duration::from_secs(heartbeat_secs);
            let pong_timeout = Duration::from_secs(config.pong_timeout_secs);
            let ping_tx = writer_tx.clone();
            let hb_last_rx = last_rx_ms.clone();

            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;

                    if ping_tx.send(Message::Ping(vec![].into())).is_err() {
                        log::debug!("Writer gone, stopping heartbeat task");
                        break;
                    }
                    let ping_sent_ms = connected_at.elapsed().as_millis() as u64;

                    tokio::time::sleep(pong_timeout).await;

                    // Any inbound frame after the ping counts as liveness
                    if hb_last_rx.load(Ordering::Relaxed) < ping_sent_ms {
                        log::warn!(
                            "No traffic within {}s of ping, declaring connection dead",
                            pong_timeout.as_secs()
                        );
                        let _ = stale_tx.send(true);
                        break;
                    }
                }
            })
        });

        Ok(Self {
            frame_rx,
            writer_tx,
            read_task,
            write_task,
            heartbeat_task,
            stale_rx,
        })
    }

    /// Receives the next inbound frame.
    ///
    /// Returns `None` once the connection is finished: the server closed,
    /// the transport failed, or the heartbeat declared the peer dead.
    pub async fn recv(&mut self) -> Option<Message> {
        let mut stale_rx = self.stale_rx.clone();
        tokio::select! {
            msg = self.frame_rx.recv() => msg,
            _ = stale_rx.wait_for(|stale| *stale) => {
                log::debug!("Heartbeat staleness ended receive loop");
                None
            }
        }
    }

    /// Sends a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] if the writer task has stopped.
    pub fn send_text(&self, text: String) -> Result<(), WsError> {
        self.writer_tx
            .send(Message::Text(text.into()))
            .map_err(|_| WsError::Closed)
    }

    /// Sends a close frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] if the writer task has stopped.
    pub fn send_close(&self) -> Result<(), WsError> {
        self.writer_tx
            .send(Message::Close(None))
            .map_err(|_| WsError::Closed)
    }

    /// Returns `true` when the heartbeat has declared the connection dead.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        *self.stale_rx.borrow()
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.read_task.abort();
        self.write_task.abort();
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        Router,
        extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade},
        response::Response,
        routing::get,
        serve,
    };

    use super::*;

    async fn echo_socket(mut socket: WebSocket) {
        while let Some(Ok(msg)) = socket.recv().await {
            match msg {
                AxumMessage::Text(text) => {
                    if socket.send(AxumMessage::Text(text)).await.is_err() {
                        break;
                    }
                }
                AxumMessage::Close(_) => break,
                _ => {}
            }
        }
    }

    async fn start_echo_server() -> SocketAddr {
        let router = Router::new().route(
            "/ws",
            get(|ws: WebSocketUpgrade| async move {
                let response: Response = ws.on_upgrade(echo_socket);
                response
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            serve(listener, router).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_connect_and_echo() {
        let addr = start_echo_server().await;
        let config = WebSocketConfig {
            url: format!("ws://{addr}/ws"),
            heartbeat_secs: None,
            ..Default::default()
        };

        let mut connection = WsConnection::connect(config).await.unwrap();
        connection.send_text("hello".to_string()).unwrap();

        let msg = connection.recv().await.unwrap();
        assert_eq!(msg, Message::Text("hello".into()));
    }

    #[tokio::test]
    async fn test_recv_none_after_server_close() {
        let addr = start_echo_server().await;
        let config = WebSocketConfig {
            url: format!("ws://{addr}/ws"),
            heartbeat_secs: None,
            ..Default::default()
        };

        let mut connection = WsConnection::connect(config).await.unwrap();
        connection.send_close().unwrap();

        // The close frame (if surfaced) is followed by end-of-stream
        loop {
            match connection.recv().await {
                Some(Message::Close(_)) | None => break,
                Some(_) => {}
            }
        }
    }

    #[tokio::test]
    async fn test_connect_invalid_url() {
        let config = WebSocketConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        let result = WsConnection::connect(config).await;
        assert!(matches!(result, Err(WsError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let config = WebSocketConfig {
            url: "ws://127.0.0.1:1/ws".to_string(),
            connect_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let result = WsConnection::connect(config).await;
        assert!(result.is_err());
    }
}
