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

//! Periodic HTTP snapshot polling.
//!
//! The poller repairs deltas the stream may have missed: on a cadence (and
//! once shortly after every successful command) it fetches the `updates`
//! snapshot and feeds it into the device models. Polls never overlap; the
//! whole poll runs inline in one task, and triggers that arrive while a
//! poll is in flight are dropped rather than queued since the inflight
//! request will deliver fresher data anyway.

use std::{sync::Arc, time::Duration};

use tokio::sync::{broadcast, mpsc, watch};

use crate::{
    auth::Authenticator,
    common::consts::POLL_FAILURES_BEFORE_DEGRADED,
    common::enums::AccountStatus,
    http::{PandoraHttpClient, PandoraHttpError},
    model::{
        events::{EventMessage, TrackingEvent},
        registry::DeviceRegistry,
    },
};

/// Drives the snapshot poll cadence for one account.
pub struct Poller {
    http: PandoraHttpClient,
    authenticator: Arc<Authenticator>,
    registry: Arc<DeviceRegistry>,
    event_tx: broadcast::Sender<EventMessage>,
    status_tx: watch::Sender<AccountStatus>,
    stop_rx: watch::Receiver<bool>,
    trigger_rx: mpsc::Receiver<()>,
    interval: Duration,
    last_ts: i64,
    consecutive_failures: u32,
}

impl Poller {
    /// Creates a poller. `trigger_rx` accepts one-shot poll requests
    /// (scheduled after successful commands).
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        http: PandoraHttpClient,
        authenticator: Arc<Authenticator>,
        registry: Arc<DeviceRegistry>,
        event_tx: broadcast::Sender<EventMessage>,
        status_tx: watch::Sender<AccountStatus>,
        stop_rx: watch::Receiver<bool>,
        trigger_rx: mpsc::Receiver<()>,
        interval: Duration,
    ) -> Self {
        Self {
            http,
            authenticator,
            registry,
            event_tx,
            status_tx,
            stop_rx,
            trigger_rx,
            interval,
            last_ts: -1,
            consecutive_failures: 0,
        }
    }

    /// Runs the poll cadence until stop.
    pub async fn run(mut self) {
        log::debug!(
            "Poller started (interval {}s)",
            self.interval.as_secs()
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; the account already took the
        // initial snapshot
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                Some(()) = self.trigger_rx.recv() => {
                    log::debug!("One-shot poll triggered");
                }
                _ = self.stop_rx.changed() => {}
            }
            if *self.stop_rx.borrow() {
                break;
            }

            let _ = self.poll_once().await;

            // Triggers that queued while the poll ran are satisfied by the
            // data it just delivered
            while self.trigger_rx.try_recv().is_ok() {}
        }

        log::debug!("Poller stopped");
    }

    /// Performs one snapshot poll and ingests the result.
    ///
    /// # Errors
    ///
    /// Returns the HTTP error after recording it toward the degradation
    /// counter; a run of failures flips the account status to `degraded`
    /// but never closes it.
    pub async fn poll_once(&mut self) -> Result<(), PandoraHttpError> {
        match self.http.request_updates(self.last_ts).await {
            Ok(response) => {
                self.ingest(&response);
                self.record_success();
                Ok(())
            }
            Err(error) => {
                log::warn!("Snapshot poll failed: {error}");
                if error.is_auth_rejected() {
                    self.authenticator.invalidate();
                    if let Err(refresh_error) = self.authenticator.refresh().await {
                        log::warn!("Session refresh after poll rejection failed: {refresh_error}");
                    }
                }
                self.record_failure();
                Err(error)
            }
        }
    }

    fn ingest(&mut self, response: &crate::http::models::UpdatesResponse) {
        if let Some(stats) = &response.stats {
            for (raw_device_id, payload) in stats {
                let Ok(device_id) = raw_device_id.parse::<u64>() else {
                    log::warn!("Bad device ID in stats data: {raw_device_id}");
                    continue;
                };

                // On the HTTP surface `online` is a flag, not a timestamp
                // as on the stream
                let mut payload = payload.clone();
                if payload.is_online.is_none()
                    && let Some(Some(flag)) = payload.online_timestamp.take()
                {
                    payload.is_online = Some(Some(flag != 0));
                }

                let device = self.registry.ensure(device_id);
                if device.apply_snapshot(&payload).is_none() {
                    log::debug!("Dropped stale snapshot for device {device_id}");
                }
            }
        }

        if let Some(time) = &response.time {
            for (raw_device_id, entry) in time {
                let Ok(device_id) = raw_device_id.parse::<u64>() else {
                    log::warn!("Bad device ID in time data: {raw_device_id}");
                    continue;
                };
                let device = self.registry.ensure(device_id);
                device.apply_snapshot(&entry.to_state_payload());
            }
        }

        for entry in response.lenta.as_deref().unwrap_or_default() {
            let Some(payload) = &entry.obj else {
                continue;
            };
            match TrackingEvent::from_payload(payload) {
                Some(event) => {
                    let _ = self.event_tx.send(EventMessage::from(&event));
                }
                None => log::debug!("Skipping event entry without device ID"),
            }
        }

        match response.ts {
            Some(ts) => self.last_ts = ts,
            None => log::warn!("Snapshot response did not contain timestamp"),
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        // Recover from degraded, but never overwrite a terminal status
        self.status_tx.send_if_modified(|status| {
            if matches!(status, AccountStatus::Degraded(_)) {
                *status = AccountStatus::Ok;
                true
            } else {
                false
            }
        });
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures == POLL_FAILURES_BEFORE_DEGRADED {
            log::error!(
                "{} consecutive poll failures, reporting degraded",
                self.consecutive_failures
            );
            self.status_tx.send_if_modified(|status| {
                if matches!(status, AccountStatus::Ok | AccountStatus::Initialising) {
                    *status =
                        AccountStatus::Degraded("snapshot polling failing".to_string());
                    true
                } else {
                    false
                }
            });
        }
    }
}
