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

//! WebSocket transport error types.

use thiserror::Error;

/// Errors produced by the WebSocket transport layer.
#[derive(Debug, Error)]
pub enum WsError {
    /// The dial or upgrade handshake failed.
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// The dial exceeded its deadline.
    #[error("Connect timeout after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// The upgrade was rejected with an HTTP status (e.g. 401 on an
    /// expired session).
    #[error("Upgrade rejected with status {0}")]
    UpgradeRejected(u16),

    /// A send was attempted on a connection that is no longer writable.
    #[error("Connection closed")]
    Closed,
}
