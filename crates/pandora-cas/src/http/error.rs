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

//! Error types for the Pandora HTTP surface.

use thiserror::Error;

/// Errors from the Pandora HTTP surface, classified so callers can decide
/// recovery: transport faults back off, auth sentinels refresh the session,
/// upstream faults count toward degradation.
#[derive(Debug, Error)]
pub enum PandoraHttpError {
    /// Network-level failure from the transport layer.
    #[error("Transport error: {0}")]
    Transport(#[from] pandora_network::http::HttpClientError),

    /// The sentinel status range (400–403) signalling a missing or expired
    /// session.
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// Server-side failure (HTTP 5xx or rate limiting).
    #[error("Upstream error (status {status}): {detail}")]
    Upstream {
        status: u16,
        detail: String,
    },

    /// Unexpected non-success status outside the classified ranges.
    #[error("Unexpected status {status}: {detail}")]
    UnexpectedStatus {
        status: u16,
        detail: String,
    },

    /// The body was not valid JSON or did not match the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// A 2xx response whose payload describes a failure.
    #[error("API error: {0}")]
    Api(String),
}

impl PandoraHttpError {
    /// Returns `true` when the error signals an expired or missing session.
    #[must_use]
    pub const fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::AuthRejected(_))
    }

    /// Returns `true` for transient faults worth retrying on the next tick.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Upstream { .. })
    }
}
