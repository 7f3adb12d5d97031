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

//! Command submission and asynchronous reply correlation.
//!
//! Submission is an HTTP POST; completion arrives later as a `command`
//! frame on the stream, correlated by `(device_id, command_id)`. The
//! pending table is shared between the submitter and the stream's
//! completer and protected by a mutex held only around lookup, insert and
//! remove. Completion and timeout race by compare-and-remove on the
//! table, so exactly one of them resolves each entry.
//!
//! The upstream rejects overlapping commands for one unit, so submissions
//! are serialized per device: a second submit waits until the first
//! reaches a terminal state.

use std::{
    sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}},
    time::Duration,
};

use ahash::AHashMap;
use dashmap::DashMap;
use tokio::sync::{broadcast, oneshot};

use crate::{
    common::enums::{CommandId, CommandOutcome},
    error::{PandoraError, PandoraResult},
    http::PandoraHttpClient,
    model::{events::CommandMessage, registry::DeviceRegistry},
};

struct PendingEntry {
    completion: oneshot::Sender<CommandOutcome>,
}

/// Submits commands and correlates their asynchronous replies.
pub struct Commander {
    http: PandoraHttpClient,
    registry: Arc<DeviceRegistry>,
    pending: Mutex<AHashMap<(u64, u32), PendingEntry>>,
    device_locks: DashMap<u64, Arc<tokio::sync::Mutex<()>>>,
    command_tx: broadcast::Sender<CommandMessage>,
    deadline: Duration,
    closed: AtomicBool,
}

impl std::fmt::Debug for Commander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commander")
            .field("deadline", &self.deadline)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Commander {
    /// Creates a commander publishing terminations on `command_tx`.
    #[must_use]
    pub fn new(
        http: PandoraHttpClient,
        registry: Arc<DeviceRegistry>,
        command_tx: broadcast::Sender<CommandMessage>,
        deadline: Duration,
    ) -> Self {
        Self {
            http,
            registry,
            pending: Mutex::new(AHashMap::new()),
            device_locks: DashMap::new(),
            command_tx,
            deadline,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the number of outstanding commands (all devices).
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("pending table poisoned").len()
    }

    /// Submits a command for a device.
    ///
    /// With `ensure_complete` the returned future resolves only on a
    /// terminal outcome: the reply frame (`Ok`/`Failure`), the deadline
    /// (`Timeout`), or account shutdown (`Cancelled`). Without it, HTTP
    /// acceptance alone resolves the future with `Ok`; the eventual reply
    /// still fires the command topic but does not affect the caller.
    ///
    /// At most one command is outstanding per device; a concurrent submit
    /// for the same device waits for the first to terminate.
    ///
    /// # Errors
    ///
    /// Returns an error when the account is closed or the HTTP submission
    /// fails.
    pub async fn submit(
        self: &Arc<Self>,
        device_id: u64,
        command: CommandId,
        ensure_complete: bool,
    ) -> PandoraResult<CommandOutcome> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PandoraError::Cancelled);
        }

        let command_id = command.as_u32();
        let device_lock = self
            .device_locks
            .entry(device_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let guard = device_lock.lock_owned().await;

        if self.closed.load(Ordering::Acquire) {
            return Err(PandoraError::Cancelled);
        }

        self.registry
            .ensure(device_id)
            .record_command_submitted(command_id);

        // Install the pending entry before the POST so a reply racing the
        // HTTP response cannot miss it
        let (completion_tx, completion_rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("pending table poisoned");
            pending.insert(
                (device_id, command_id),
                PendingEntry {
                    completion: completion_tx,
                },
            );
        }

        // Deadline watchdog; loses the race against a reply by
        // compare-and-remove on the table
        let watchdog = self.clone();
        let deadline = self.deadline;
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            watchdog.expire(device_id, command_id);
        });

        if let Err(error) = self.http.remote_command(device_id, command_id).await {
            // Submission never reached the cloud; terminate immediately
            let removed = {
                let mut pending = self.pending.lock().expect("pending table poisoned");
                pending.remove(&(device_id, command_id)).is_some()
            };
            if removed {
                self.publish(CommandMessage {
                    device_id,
                    command_id,
                    result: CommandOutcome::Failure(-1),
                    reply: None,
                });
            }
            drop(guard);
            return Err(error.into());
        }

        if ensure_complete {
            let outcome = completion_rx
                .await
                .unwrap_or(CommandOutcome::Cancelled);
            drop(guard);
            return Ok(outcome);
        }

        // Fire-and-forget: HTTP acceptance satisfies the caller, but the
        // device stays serialized until the command terminates
        tokio::spawn(async move {
            let _ = completion_rx.await;
            drop(guard);
        });
        Ok(CommandOutcome::Ok)
    }

    /// Completes a pending command from a reply frame. Called by the
    /// stream dispatcher.
    pub fn complete_from_reply(
        &self,
        device_id: u64,
        command_id: u32,
        result: i64,
        reply: Option<i64>,
    ) {
        let outcome = if result == 0 {
            CommandOutcome::Ok
        } else {
            CommandOutcome::Failure(reply.unwrap_or(result))
        };

        if let Some(device) = self.registry.get(device_id) {
            device.record_command_reply(command_id, result, reply);
        }

        let entry = {
            let mut pending = self.pending.lock().expect("pending table poisoned");
            pending.remove(&(device_id, command_id))
        };
        match entry {
            Some(entry) => {
                let _ = entry.completion.send(outcome);
            }
            None => log::debug!(
                "Reply for command {command_id} on device {device_id} matched no pending entry"
            ),
        }

        // The reply always reaches the command topic, matched or late
        self.publish(CommandMessage {
            device_id,
            command_id,
            result: outcome,
            reply,
        });
    }

    fn expire(&self, device_id: u64, command_id: u32) {
        let entry = {
            let mut pending = self.pending.lock().expect("pending table poisoned");
            pending.remove(&(device_id, command_id))
        };
        let Some(entry) = entry else {
            return; // Completed before the deadline
        };

        log::warn!("Command {command_id} on device {device_id} timed out without a reply");
        let _ = entry.completion.send(CommandOutcome::Timeout);
        self.publish(CommandMessage {
            device_id,
            command_id,
            result: CommandOutcome::Timeout,
            reply: None,
        });
    }

    /// Drains every outstanding command with `Cancelled` and refuses
    /// further submissions. Called on account shutdown.
    pub fn cancel_all(&self) {
        self.closed.store(true, Ordering::Release);

        let drained: Vec<((u64, u32), PendingEntry)> = {
            let mut pending = self.pending.lock().expect("pending table poisoned");
            pending.drain().collect()
        };
        for ((device_id, command_id), entry) in drained {
            let _ = entry.completion.send(CommandOutcome::Cancelled);
            self.publish(CommandMessage {
                device_id,
                command_id,
                result: CommandOutcome::Cancelled,
                reply: None,
            });
        }
    }

    fn publish(&self, message: CommandMessage) {
        // Send fails only without subscribers, which is fine
        let _ = self.command_tx.send(message);
    }
}
