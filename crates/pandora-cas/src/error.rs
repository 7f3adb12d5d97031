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

//! Error types for the session and streaming layer.

use thiserror::Error;

use crate::http::error::PandoraHttpError;

/// Result type for Pandora operations.
pub type PandoraResult<T> = Result<T, PandoraError>;

/// Authentication failures, classified from upstream signals.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Credentials rejected.
    #[error("Bad credentials: {0}")]
    BadCredentials(String),

    /// The upstream demanded a captcha; cannot proceed unattended.
    #[error("Captcha required")]
    CaptchaRequired,

    /// The account is locked upstream.
    #[error("Account locked: {0}")]
    AccountLocked(String),

    /// The session expired and must be re-established.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// The auth endpoint is unreachable or failing.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

/// The main error type for all client operations.
#[derive(Debug, Error)]
pub enum PandoraError {
    /// Authentication failure.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// HTTP layer failure (transport, status or parse).
    #[error("HTTP error: {0}")]
    Http(#[from] PandoraHttpError),

    /// Malformed or unexpected frame on the stream.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The unit rejected a command; the reply code conveys detail.
    #[error("Command rejected with reply {reply}")]
    CommandRejected {
        /// Numeric reply code from the unit.
        reply: i64,
    },

    /// An operation exceeded its deadline.
    #[error("Timeout")]
    Timeout,

    /// The account closed while the operation was in flight.
    #[error("Cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_wraps() {
        let error = PandoraError::from(AuthError::CaptchaRequired);
        assert!(matches!(error, PandoraError::Auth(AuthError::CaptchaRequired)));
        assert_eq!(error.to_string(), "Auth error: Captcha required");
    }
}
