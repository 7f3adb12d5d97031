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

//! HTTP transport error types.

use thiserror::Error;

/// Errors produced by the HTTP transport layer.
///
/// Status-level failures are not reported here: the client returns every
/// response with its status code attached and callers decide how to classify
/// non-success statuses for their protocol.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// Failed to construct the underlying client.
    #[error("Client build error: {0}")]
    ClientBuild(String),

    /// Network-level failure (DNS, TCP, TLS, connection reset).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request exceeded its deadline.
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Malformed request input (URL, header, form encoding).
    #[error("Request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for HttpClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_builder() || error.is_request() {
            Self::Request(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = HttpClientError::Timeout("deadline exceeded".to_string());
        assert_eq!(error.to_string(), "Timeout error: deadline exceeded");
    }
}
