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

//! Account composition root.
//!
//! One [`Account`] per credential pair. It owns the authenticator, device
//! registry, stream handler, poller and commander for that session, and is
//! the only object external code needs to hold. Nothing is shared across
//! accounts: each has its own cookie jar, stream and device set.

use std::{
    sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}},
    time::Duration,
};

use tokio::sync::{broadcast, mpsc, watch};

use crate::{
    auth::{Authenticator, Session},
    commander::Commander,
    common::{
        consts::POST_COMMAND_POLL_DELAY_SECS,
        enums::{AccountStatus, CommandId, CommandOutcome},
    },
    config::AccountConfig,
    error::{PandoraError, PandoraResult},
    http::PandoraHttpClient,
    model::{
        device::{Device, DeviceListener, ListenerHandle},
        events::{CommandMessage, EventMessage, TrackingEvent, TrackingPoint},
        registry::DeviceRegistry,
    },
    poller::Poller,
    websocket::handler::StreamHandler,
};

const EVENT_BUS_CAPACITY: usize = 256;

/// One authenticated session with the Pandora cloud and everything owned
/// by it.
///
/// Start sequence: `login -> first snapshot -> open stream -> start
/// poller`. Any step's failure leaves the account in a classified
/// non-`Ok` status and returns the cause.
pub struct Account {
    config: AccountConfig,
    http: PandoraHttpClient,
    authenticator: Arc<Authenticator>,
    registry: Arc<DeviceRegistry>,
    commander: Arc<Commander>,
    event_tx: broadcast::Sender<EventMessage>,
    command_tx: broadcast::Sender<CommandMessage>,
    point_tx: broadcast::Sender<TrackingPoint>,
    status_tx: watch::Sender<AccountStatus>,
    status_rx: watch::Receiver<AccountStatus>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    poll_trigger_tx: mpsc::Sender<()>,
    poll_trigger_rx: Mutex<Option<mpsc::Receiver<()>>>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    started: AtomicBool,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.config.username)
            .field("devices", &self.registry.len())
            .field("status", &*self.status_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl Account {
    /// Creates an account from its configuration. No I/O happens until
    /// [`Account::start`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: AccountConfig) -> PandoraResult<Self> {
        let http = PandoraHttpClient::new(&config)?;
        let authenticator = Arc::new(Authenticator::new(
            http.clone(),
            config.username.clone(),
            config.password.clone(),
        ));
        let registry = Arc::new(DeviceRegistry::new());

        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let (command_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let (point_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let (status_tx, status_rx) = watch::channel(AccountStatus::Initialising);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (poll_trigger_tx, poll_trigger_rx) = mpsc::channel(1);

        let commander = Arc::new(Commander::new(
            http.clone(),
            registry.clone(),
            command_tx.clone(),
            Duration::from_secs(config.command_timeout_secs),
        ));

        Ok(Self {
            config,
            http,
            authenticator,
            registry,
            commander,
            event_tx,
            command_tx,
            point_tx,
            status_tx,
            status_rx,
            stop_tx,
            stop_rx,
            poll_trigger_tx,
            poll_trigger_rx: Mutex::new(Some(poll_trigger_rx)),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Authenticates, takes the first snapshot, opens the stream and
    /// starts the poll cadence.
    ///
    /// # Errors
    ///
    /// Returns the classified cause of the failed step; the `status`
    /// observable reflects it.
    pub async fn start(&self) -> PandoraResult<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Login
        if let Err(error) = self.authenticator.login().await {
            let _ = self.status_tx.send(AccountStatus::AuthFailure);
            return Err(error.into());
        }

        // Device directory, then first snapshot
        let trigger_rx = self
            .poll_trigger_rx
            .lock()
            .expect("poll trigger lock poisoned")
            .take()
            .ok_or(PandoraError::Cancelled)?;
        let mut poller = Poller::new(
            self.http.clone(),
            self.authenticator.clone(),
            self.registry.clone(),
            self.event_tx.clone(),
            self.status_tx.clone(),
            self.stop_rx.clone(),
            trigger_rx,
            Duration::from_secs(self.config.effective_polling_interval_secs()),
        );

        let bootstrap = async {
            self.refresh_device_directory().await?;
            poller.poll_once().await?;
            Ok::<(), PandoraError>(())
        };
        if let Err(error) = bootstrap.await {
            let _ = self
                .status_tx
                .send(AccountStatus::Degraded(format!("start failed: {error}")));
            return Err(error);
        }

        // Stream, then poll cadence
        let stream = StreamHandler::new(
            self.config.clone(),
            self.http.clone(),
            self.authenticator.clone(),
            self.registry.clone(),
            self.commander.clone(),
            self.event_tx.clone(),
            self.point_tx.clone(),
            self.status_tx.clone(),
            self.stop_rx.clone(),
        );

        let mut tasks = self.tasks.lock().expect("task list poisoned");
        tasks.push(tokio::spawn(stream.run()));
        tasks.push(tokio::spawn(poller.run()));

        let _ = self.status_tx.send(AccountStatus::Ok);
        Ok(())
    }

    /// Re-fetches the device directory and refreshes identity attributes.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory request fails.
    pub async fn refresh_device_directory(&self) -> PandoraResult<()> {
        let devices = self.http.fetch_devices().await?;
        for attributes in devices {
            let Some(info) = attributes.to_device_info() else {
                log::warn!("Skipping directory entry without device ID");
                continue;
            };
            self.registry.ensure(info.device_id).set_info(info);
        }
        Ok(())
    }

    /// Returns the current session, if authenticated.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.authenticator.session()
    }

    /// Returns the status observable.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<AccountStatus> {
        self.status_rx.clone()
    }

    /// Returns all observed devices.
    #[must_use]
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.registry.all()
    }

    /// Returns one device, if observed.
    #[must_use]
    pub fn device(&self, device_id: u64) -> Option<Arc<Device>> {
        self.registry.get(device_id)
    }

    /// Seeds a device with state a host persisted from a previous run.
    /// Restored data is advisory: fresh frames always outrank it.
    pub fn seed_device_state(
        &self,
        device_id: u64,
        bit_state: Option<crate::model::BitState>,
        last_online_utc: Option<i64>,
    ) {
        self.registry
            .ensure(device_id)
            .seed_warm_start(bit_state, last_online_utc);
    }

    /// Subscribes to a device's update notifications.
    ///
    /// Returns `None` when the device has not been observed yet.
    #[must_use]
    pub fn subscribe_device(&self, device_id: u64) -> Option<(ListenerHandle, DeviceListener)> {
        Some(self.registry.get(device_id)?.subscribe())
    }

    /// Subscribes to the `pandora_cas_event` topic.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventMessage> {
        self.event_tx.subscribe()
    }

    /// Subscribes to the `pandora_cas_command` topic.
    #[must_use]
    pub fn subscribe_commands(&self) -> broadcast::Receiver<CommandMessage> {
        self.command_tx.subscribe()
    }

    /// Subscribes to decoded track points.
    #[must_use]
    pub fn subscribe_points(&self) -> broadcast::Receiver<TrackingPoint> {
        self.point_tx.subscribe()
    }

    /// Submits a remote command.
    ///
    /// A successful submission schedules a one-shot snapshot poll shortly
    /// afterwards to observe the resulting state change even if the stream
    /// misses it.
    ///
    /// # Errors
    ///
    /// Returns an error when the account is closed or the HTTP submission
    /// fails. Command rejection by the unit is reported through the
    /// returned [`CommandOutcome`], not an error.
    pub async fn command(
        &self,
        device_id: u64,
        command: CommandId,
        ensure_complete: bool,
    ) -> PandoraResult<CommandOutcome> {
        let outcome = self
            .commander
            .submit(device_id, command, ensure_complete)
            .await?;

        let trigger = self.poll_trigger_tx.clone();
        let mut stop_rx = self.stop_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(POST_COMMAND_POLL_DELAY_SECS)) => {
                    let _ = trigger.try_send(());
                }
                _ = stop_rx.changed() => {}
            }
        });

        Ok(outcome)
    }

    /// Sends a wake-up request to a device.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails.
    pub async fn wake_up_device(&self, device_id: u64) -> PandoraResult<()> {
        self.http.wake_up_device(device_id).await?;
        Ok(())
    }

    /// Fetches historical events.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails.
    pub async fn fetch_events(
        &self,
        timestamp_from: i64,
        timestamp_to: i64,
        limit: u32,
        device_id: Option<u64>,
    ) -> PandoraResult<Vec<TrackingEvent>> {
        Ok(self
            .http
            .fetch_events(timestamp_from, timestamp_to, limit, device_id)
            .await?)
    }

    /// Fetches the most recent events, windowed up to one day into the
    /// future to absorb device-local timezone skew.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails.
    pub async fn fetch_recent_events(
        &self,
        limit: u32,
        device_id: Option<u64>,
    ) -> PandoraResult<Vec<TrackingEvent>> {
        let timestamp_to = (chrono::Utc::now() + chrono::Duration::days(1)).timestamp();
        self.fetch_events(0, timestamp_to, limit, device_id).await
    }

    /// Closes the account: stops the stream and poller, drains
    /// outstanding commands with `Cancelled`, and notifies every device
    /// listener before releasing resources.
    pub async fn close(&self) {
        if *self.status_rx.borrow() == AccountStatus::Closed {
            return;
        }
        log::info!("Closing account '{}'", self.config.username);

        let _ = self.stop_tx.send(true);
        self.commander.cancel_all();

        let tasks: Vec<_> = {
            let mut guard = self.tasks.lock().expect("task list poisoned");
            guard.drain(..).collect()
        };
        for task in tasks {
            if tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .is_err()
            {
                log::warn!("Task did not stop within grace period");
            }
        }

        self.registry.close_all_listeners();
        self.authenticator.invalidate();
        let _ = self.status_tx.send(AccountStatus::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_account_is_initialising() {
        let account = Account::new(AccountConfig::new("user", "pass")).unwrap();
        assert_eq!(*account.status().borrow(), AccountStatus::Initialising);
        assert!(account.session().is_none());
        assert!(account.devices().is_empty());
    }

    #[tokio::test]
    async fn test_close_without_start() {
        let account = Account::new(AccountConfig::new("user", "pass")).unwrap();
        account.close().await;
        assert_eq!(*account.status().borrow(), AccountStatus::Closed);

        // Commands are refused after close
        let result = account.command(1, CommandId::Lock, false).await;
        assert!(matches!(result, Err(PandoraError::Cancelled)));
    }

    #[tokio::test]
    async fn test_subscribe_unknown_device() {
        let account = Account::new(AccountConfig::new("user", "pass")).unwrap();
        assert!(account.subscribe_device(404).is_none());
    }
}
