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

//! Stream lifecycle: connect, dispatch, reconnect.
//!
//! The handler owns the WebSocket connection exclusively and runs in a
//! dedicated task. Its loop walks the connection state machine:
//! `connecting -> subscribed -> (backoff | auth-refresh) -> connecting`.
//! Transport and protocol faults never escalate beyond the loop; only
//! repeated credential rejection is terminal for the account. The server
//! opens every subscription with `initial-state` frames, so a reconnect
//! fully replaces any state the stream may have missed while down.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use pandora_network::{
    backoff::ExponentialBackoff,
    websocket::{WebSocketConfig, WsConnection, WsError},
};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::Message;

use super::messages::{PointPayload, StatePayload, WsFrame};
use crate::{
    auth::Authenticator,
    commander::Commander,
    common::{
        consts::{
            MAX_AUTH_REFRESH_FAILURES, RECONNECT_DELAY_INITIAL_SECS, RECONNECT_DELAY_MAX_SECS,
            RECONNECT_STABLE_RESET_SECS, WS_HEARTBEAT_SECS, WS_PONG_TIMEOUT_SECS,
        },
        enums::{AccountStatus, PrimaryEventId},
    },
    config::AccountConfig,
    error::AuthError,
    http::PandoraHttpClient,
    model::{
        events::{EventMessage, TrackingEvent, TrackingPoint},
        registry::DeviceRegistry,
    },
};

enum ReadOutcome {
    /// Connection ended without an auth signal; back off and redial.
    Disconnected,
    /// The server closed the stream with the auth-expired code.
    AuthExpired,
    /// Stop was requested.
    Stopped,
}

/// Owns the WebSocket lifecycle for one account.
pub struct StreamHandler {
    config: AccountConfig,
    http: PandoraHttpClient,
    authenticator: Arc<Authenticator>,
    registry: Arc<DeviceRegistry>,
    commander: Arc<Commander>,
    event_tx: broadcast::Sender<EventMessage>,
    point_tx: broadcast::Sender<TrackingPoint>,
    status_tx: watch::Sender<AccountStatus>,
    stop_rx: watch::Receiver<bool>,
}

impl StreamHandler {
    /// Creates a handler; `run` drives it until stop or terminal failure.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: AccountConfig,
        http: PandoraHttpClient,
        authenticator: Arc<Authenticator>,
        registry: Arc<DeviceRegistry>,
        commander: Arc<Commander>,
        event_tx: broadcast::Sender<EventMessage>,
        point_tx: broadcast::Sender<TrackingPoint>,
        status_tx: watch::Sender<AccountStatus>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            http,
            authenticator,
            registry,
            commander,
            event_tx,
            point_tx,
            status_tx,
            stop_rx,
        }
    }

    /// Main processing loop for the stream.
    pub async fn run(mut self) {
        log::debug!("Stream handler started");

        let mut backoff = match ExponentialBackoff::new(
            Duration::from_secs(RECONNECT_DELAY_INITIAL_SECS),
            Duration::from_secs(RECONNECT_DELAY_MAX_SECS),
            2.0,
            false,
        ) {
            Ok(backoff) => backoff,
            Err(e) => {
                log::error!("Invalid backoff configuration: {e}");
                return;
            }
        };
        let mut consecutive_auth_expired: u32 = 0;

        while !*self.stop_rx.borrow() {
            match self.connect().await {
                Ok(mut connection) => {
                    log::info!("Stream connected: {}", self.config.ws_url());
                    self.set_status_ok();
                    let connected_at = Instant::now();

                    let outcome = self.read_loop(&mut connection).await;

                    // A stable session re-arms both the backoff and the
                    // immediate-retry path for a fresh auth expiry
                    if connected_at.elapsed()
                        >= Duration::from_secs(RECONNECT_STABLE_RESET_SECS)
                    {
                        backoff.reset();
                        consecutive_auth_expired = 0;
                    }

                    match outcome {
                        ReadOutcome::Stopped => break,
                        ReadOutcome::Disconnected => {
                            consecutive_auth_expired = 0;
                            self.sleep_backoff(&mut backoff).await;
                        }
                        ReadOutcome::AuthExpired => {
                            consecutive_auth_expired += 1;
                            if !self
                                .recover_session(consecutive_auth_expired, &mut backoff)
                                .await
                            {
                                break;
                            }
                        }
                    }
                }
                Err(WsError::UpgradeRejected(status))
                    if Authenticator::is_expired_upgrade_status(status) =>
                {
                    log::warn!("Stream upgrade rejected with status {status}, refreshing session");
                    consecutive_auth_expired += 1;
                    if !self
                        .recover_session(consecutive_auth_expired, &mut backoff)
                        .await
                    {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("Stream connect failed: {e}");
                    consecutive_auth_expired = 0;
                    self.sleep_backoff(&mut backoff).await;
                }
            }
        }

        log::info!("Stream handler stopped");
    }

    async fn connect(&self) -> Result<WsConnection, WsError> {
        let mut url = self.config.ws_url();
        if let Some(session) = self.authenticator.session()
            && let Some(session_id) = session.session_id
        {
            url = format!("{url}?access_token={session_id}");
        }

        let mut headers = vec![("User-Agent".to_string(), self.config.user_agent.clone())];
        if let Some(cookie) = self.http.session_cookie_header() {
            headers.push(("Cookie".to_string(), cookie));
        }

        WsConnection::connect(WebSocketConfig {
            url,
            headers,
            heartbeat_secs: Some(WS_HEARTBEAT_SECS),
            pong_timeout_secs: WS_PONG_TIMEOUT_SECS,
            connect_timeout: Duration::from_secs(self.config.request_timeout_secs),
        })
        .await
    }

    async fn read_loop(&mut self, connection: &mut WsConnection) -> ReadOutcome {
        loop {
            let message = tokio::select! {
                message = connection.recv() => message,
                _ = self.stop_rx.changed() => {
                    if *self.stop_rx.borrow() {
                        let _ = connection.send_close();
                        return ReadOutcome::Stopped;
                    }
                    continue;
                }
            };

            match message {
                Some(Message::Text(text)) => self.dispatch(text.as_str()),
                Some(Message::Close(frame)) => {
                    if let Some(frame) = frame {
                        let code = u16::from(frame.code);
                        log::info!("Stream closed by server (code {code}: {})", frame.reason);
                        if Authenticator::is_expired_close_code(code) {
                            return ReadOutcome::AuthExpired;
                        }
                    } else {
                        log::info!("Stream closed by server");
                    }
                    return ReadOutcome::Disconnected;
                }
                Some(_) => {} // Ping/pong handled by the transport
                None => {
                    log::warn!("Stream disconnected");
                    return ReadOutcome::Disconnected;
                }
            }
        }
    }

    /// Routes one decoded frame. Malformed frames are logged and skipped;
    /// a bad frame must never take the stream down.
    fn dispatch(&self, text: &str) {
        let frame: WsFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Malformed stream frame: {e}");
                return;
            }
        };

        match frame {
            WsFrame::InitialState(payload) => self.apply_state(&payload, true),
            WsFrame::State(payload) => self.apply_state(&payload, false),
            WsFrame::Point(payload) => self.handle_point(&payload),
            WsFrame::Event(payload) => {
                let Some(event) = TrackingEvent::from_payload(&payload) else {
                    log::warn!("Event frame without device ID");
                    return;
                };
                let _ = self.event_tx.send(EventMessage::from(&event));
            }
            WsFrame::Command(payload) => {
                let command_id = u32::try_from(payload.command).unwrap_or_default();
                self.commander.complete_from_reply(
                    payload.dev_id,
                    command_id,
                    payload.result,
                    payload.reply,
                );
            }
            WsFrame::UpdateSettings(payload) => {
                let Some(device_id) = payload.device_id() else {
                    log::warn!("Settings frame without device ID");
                    return;
                };
                // Surfaced as a settings-changed event; the payload itself
                // is opaque
                let primary = PrimaryEventId::SettingsChanged;
                let _ = self.event_tx.send(EventMessage {
                    device_id,
                    event_id_primary: primary as u16,
                    event_id_secondary: 0,
                    title_primary: primary.title(),
                    title_secondary: None,
                    event_type: primary.event_type().to_string(),
                    latitude: None,
                    longitude: None,
                    gsm_level: None,
                    fuel: None,
                    exterior_temperature: None,
                    engine_temperature: None,
                });
            }
        }
    }

    fn apply_state(&self, payload: &StatePayload, initial: bool) {
        let Some(device_id) = payload.device_id() else {
            log::warn!("State frame without device ID");
            return;
        };

        let payload = if self.config.device_options(device_id).ignore_ws_coordinates {
            let mut stripped = payload.clone();
            stripped.x = None;
            stripped.y = None;
            stripped.lock_x = None;
            stripped.lock_y = None;
            std::borrow::Cow::Owned(stripped)
        } else {
            std::borrow::Cow::Borrowed(payload)
        };

        let device = self.registry.ensure(device_id);
        let applied = if initial {
            device.apply_snapshot(&payload)
        } else {
            device.apply_delta(&payload)
        };
        if applied.is_none() {
            log::debug!("Dropped stale state frame for device {device_id}");
        }
    }

    fn handle_point(&self, payload: &PointPayload) {
        let Some(point) = TrackingPoint::from_payload(payload) else {
            log::warn!("Point frame without device ID");
            return;
        };

        // A point is also a positional state update for the device
        let ignore_coordinates = self
            .config
            .device_options(point.device_id)
            .ignore_ws_coordinates;
        let device = self.registry.ensure(point.device_id);
        device.apply_delta(&StatePayload {
            x: if ignore_coordinates { None } else { payload.x.map(Some) },
            y: if ignore_coordinates { None } else { payload.y.map(Some) },
            speed: payload.speed.map(Some),
            rot: payload.direction.map(Some),
            fuel: payload.fuel.map(Some),
            state_timestamp: payload.dtime.map(Some),
            ..Default::default()
        });

        let _ = self.point_tx.send(point);
    }

    /// Refreshes the session after an expiry signal. The first consecutive
    /// expiry retries immediately; later ones back off. Returns `false`
    /// when the account must close with an auth failure.
    async fn recover_session(
        &mut self,
        consecutive_auth_expired: u32,
        backoff: &mut ExponentialBackoff,
    ) -> bool {
        self.authenticator.invalidate();

        match self.authenticator.refresh().await {
            Ok(()) => {
                if consecutive_auth_expired > 1 {
                    self.sleep_backoff(backoff).await;
                }
                true
            }
            Err(AuthError::BadCredentials(detail))
                if self.authenticator.consecutive_bad_credentials()
                    >= MAX_AUTH_REFRESH_FAILURES =>
            {
                log::error!(
                    "Credentials rejected {} times, closing account: {detail}",
                    self.authenticator.consecutive_bad_credentials()
                );
                let _ = self.status_tx.send(AccountStatus::AuthFailure);
                false
            }
            Err(AuthError::CaptchaRequired) => {
                log::error!("Captcha required, cannot refresh unattended; closing account");
                let _ = self.status_tx.send(AccountStatus::AuthFailure);
                false
            }
            Err(AuthError::AccountLocked(detail)) => {
                log::error!("Account locked upstream, closing account: {detail}");
                let _ = self.status_tx.send(AccountStatus::AuthFailure);
                false
            }
            Err(e) => {
                log::warn!("Session refresh failed, will retry: {e}");
                self.sleep_backoff(backoff).await;
                true
            }
        }
    }

    fn set_status_ok(&self) {
        self.status_tx.send_if_modified(|status| {
            if matches!(status, AccountStatus::Ok) {
                false
            } else {
                *status = AccountStatus::Ok;
                true
            }
        });
    }

    async fn sleep_backoff(&mut self, backoff: &mut ExponentialBackoff) {
        let delay = backoff.next_duration();
        log::debug!("Stream backing off for {delay:?}");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = self.stop_rx.changed() => {}
        }
    }
}
