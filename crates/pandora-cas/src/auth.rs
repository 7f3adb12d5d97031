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

//! Session establishment and refresh.
//!
//! Sessions are opaque cookie-based credentials that silently expire; the
//! authenticator recognises expiry from sentinel HTTP statuses, body
//! markers and WebSocket close codes, and re-establishes the session with
//! at most one refresh in flight per account. Callers that lose the race
//! simply observe the refreshed generation and proceed.

use std::sync::{
    Mutex,
    atomic::{AtomicU32, AtomicU64, Ordering},
};

use crate::{
    common::consts::WS_CLOSE_AUTH_EXPIRED,
    error::AuthError,
    http::{PandoraHttpClient, PandoraHttpError},
};

/// Opaque credential state for one authenticated session.
///
/// The session cookie itself lives in the HTTP client's jar; this record
/// carries the identifiers the protocol layer needs alongside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub session_id: Option<String>,
}

/// Establishes and refreshes the account session.
pub struct Authenticator {
    http: PandoraHttpClient,
    username: String,
    password: String,
    session: Mutex<Option<Session>>,
    refresh_lock: tokio::sync::Mutex<()>,
    /// Bumped on every successful login; lets concurrent refresh callers
    /// detect that someone else already did the work.
    generation: AtomicU64,
    consecutive_bad_credentials: AtomicU32,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("username", &self.username)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Creates an authenticator bound to one credential pair.
    #[must_use]
    pub fn new(http: PandoraHttpClient, username: String, password: String) -> Self {
        Self {
            http,
            username,
            password,
            session: Mutex::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            consecutive_bad_credentials: AtomicU32::new(0),
        }
    }

    /// Returns the current session, if authenticated.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session.lock().expect("session lock poisoned").clone()
    }

    /// Returns the session generation, bumped on each successful login.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Returns the run of consecutive `BadCredentials` refresh failures.
    #[must_use]
    pub fn consecutive_bad_credentials(&self) -> u32 {
        self.consecutive_bad_credentials.load(Ordering::Relaxed)
    }

    /// Exchanges credentials for a fresh session.
    ///
    /// # Errors
    ///
    /// Returns a classified [`AuthError`].
    pub async fn login(&self) -> Result<Session, AuthError> {
        match self.http.login(&self.username, &self.password).await {
            Ok(response) => {
                let session = Session {
                    user_id: response.user_id,
                    session_id: response.session_id,
                };
                *self.session.lock().expect("session lock poisoned") = Some(session.clone());
                self.generation.fetch_add(1, Ordering::AcqRel);
                self.consecutive_bad_credentials.store(0, Ordering::Relaxed);
                Ok(session)
            }
            Err(error) => {
                let classified = Self::classify(error);
                if matches!(classified, AuthError::BadCredentials(_)) {
                    self.consecutive_bad_credentials
                        .fetch_add(1, Ordering::Relaxed);
                }
                Err(classified)
            }
        }
    }

    /// Re-establishes the session after an expiry signal.
    ///
    /// Idempotent: at most one refresh runs per account; concurrent callers
    /// wait on the same in-flight refresh and return once it completes.
    ///
    /// # Errors
    ///
    /// Returns a classified [`AuthError`] when the refresh itself fails.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let observed_generation = self.generation();
        let _guard = self.refresh_lock.lock().await;

        // Another caller finished a refresh while we waited on the lock
        if self.generation() != observed_generation {
            log::debug!("Session already refreshed by concurrent caller");
            return Ok(());
        }

        log::info!("Refreshing expired session for '{}'", self.username);
        self.login().await.map(|_| ())
    }

    /// Invalidates the current session (e.g. after an expiry signal), so
    /// that probes fail fast until the next refresh.
    pub fn invalidate(&self) {
        *self.session.lock().expect("session lock poisoned") = None;
    }

    /// Recognises session expiry from an HTTP-layer error.
    #[must_use]
    pub const fn is_expired_error(error: &PandoraHttpError) -> bool {
        error.is_auth_rejected()
    }

    /// Recognises session expiry from a WebSocket close code.
    #[must_use]
    pub fn is_expired_close_code(close_code: u16) -> bool {
        close_code == WS_CLOSE_AUTH_EXPIRED
    }

    /// Recognises session expiry from a rejected WebSocket upgrade.
    #[must_use]
    pub fn is_expired_upgrade_status(status: u16) -> bool {
        (400..=403).contains(&status)
    }

    fn classify(error: PandoraHttpError) -> AuthError {
        match error {
            PandoraHttpError::AuthRejected(detail) => {
                let lowered = detail.to_lowercase();
                if lowered.contains("captcha") {
                    AuthError::CaptchaRequired
                } else if lowered.contains("lock") || lowered.contains("block") {
                    AuthError::AccountLocked(detail)
                } else if lowered.contains("expired") {
                    AuthError::SessionExpired(detail)
                } else {
                    AuthError::BadCredentials(detail)
                }
            }
            PandoraHttpError::Api(detail) => AuthError::BadCredentials(detail),
            other => AuthError::UpstreamUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_rejection() {
        let error = Authenticator::classify(PandoraHttpError::AuthRejected(
            "captcha required".to_string(),
        ));
        assert_eq!(error, AuthError::CaptchaRequired);

        let error =
            Authenticator::classify(PandoraHttpError::AuthRejected("account blocked".to_string()));
        assert!(matches!(error, AuthError::AccountLocked(_)));

        let error =
            Authenticator::classify(PandoraHttpError::AuthRejected("sid expired".to_string()));
        assert!(matches!(error, AuthError::SessionExpired(_)));

        let error =
            Authenticator::classify(PandoraHttpError::AuthRejected("wrong password".to_string()));
        assert!(matches!(error, AuthError::BadCredentials(_)));
    }

    #[test]
    fn test_classify_transient_as_upstream() {
        let error = Authenticator::classify(PandoraHttpError::Upstream {
            status: 502,
            detail: String::new(),
        });
        assert!(matches!(error, AuthError::UpstreamUnavailable(_)));
    }

    #[test]
    fn test_expiry_signals() {
        assert!(Authenticator::is_expired_close_code(4401));
        assert!(!Authenticator::is_expired_close_code(1000));
        assert!(Authenticator::is_expired_upgrade_status(401));
        assert!(!Authenticator::is_expired_upgrade_status(500));
        assert!(Authenticator::is_expired_error(
            &PandoraHttpError::AuthRejected("expired".to_string())
        ));
    }
}
