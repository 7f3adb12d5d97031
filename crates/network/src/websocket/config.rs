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

//! WebSocket connection configuration.

use std::time::Duration;

/// Configuration for a single WebSocket connection.
///
/// Reconnect policy is deliberately absent: a [`super::WsConnection`]
/// represents exactly one dial, and the owning protocol layer decides when
/// and how to dial again (it may need to refresh authentication first).
#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// The server URL (`ws://` or `wss://`).
    pub url: String,
    /// Additional headers for the upgrade request.
    pub headers: Vec<(String, String)>,
    /// Interval between outbound pings; `None` disables the heartbeat.
    pub heartbeat_secs: Option<u64>,
    /// How long after a ping the connection may stay silent before it is
    /// declared dead. Any inbound frame counts as liveness.
    pub pong_timeout_secs: u64,
    /// Deadline for the dial plus upgrade handshake.
    pub connect_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headers: Vec::new(),
            heartbeat_secs: Some(30),
            pong_timeout_secs: 10,
            connect_timeout: Duration::from_secs(15),
        }
    }
}
