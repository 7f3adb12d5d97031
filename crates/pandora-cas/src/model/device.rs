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

//! In-memory model of one vehicle alarm unit.
//!
//! Merges are CPU-only and run under the device's lock, so notifications
//! for one device are totally ordered by commit order. Listener delivery is
//! decoupled through bounded per-listener queues: a stalled subscriber has
//! its oldest pending update coalesced into the newest instead of blocking
//! frame ingestion or growing memory without bound.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};

use super::{
    bits::{BitState, CanBitState},
    telemetry::Telemetry,
};
use crate::{
    common::enums::{DeviceType, Features},
    websocket::messages::StatePayload,
};

/// Default capacity of each listener's delivery queue.
pub const LISTENER_QUEUE_CAPACITY: usize = 32;

/// Identity attributes of a device; mutated only on directory snapshots.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: u64,
    pub name: String,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub voice_version: Option<String>,
    pub color: Option<String>,
    pub phone: Option<String>,
    pub phone_other: Option<String>,
    pub device_type: DeviceType,
    pub features: Features,
}

/// Command bookkeeping surfaced on the device view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCommand {
    pub command_id: u32,
    /// Reply code from the most recent completed command, if any.
    pub reply: Option<i64>,
    /// `result` from the most recent reply frame (`0` = accepted).
    pub result: Option<i64>,
}

/// Immutable snapshot of a device handed to subscribers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceView {
    pub device_id: u64,
    pub info: Option<DeviceInfo>,
    pub telemetry: Telemetry,
    pub bit_state: Option<BitState>,
    pub can_bit_state: Option<CanBitState>,
    pub last_command: Option<LastCommand>,
}

impl DeviceView {
    /// Locking mechanism engaged, when the state word is known.
    #[must_use]
    pub fn is_armed(&self) -> Option<bool> {
        self.bit_state.map(BitState::is_armed)
    }

    /// Engine running, when the state word is known.
    #[must_use]
    pub fn is_engine_running(&self) -> Option<bool> {
        self.bit_state.map(BitState::is_engine_running)
    }

    /// Whether the unit is reachable by the cloud.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.telemetry.is_online.unwrap_or(false)
    }
}

/// One update delivered to a subscriber.
#[derive(Clone, Debug)]
pub enum DeviceNotification {
    /// The device changed; `changed` lists the affected field names.
    Updated {
        view: Arc<DeviceView>,
        changed: Vec<&'static str>,
        /// Set when earlier pending updates were coalesced into this one
        /// because the subscriber fell behind.
        backpressure: bool,
    },
    /// The owning account closed; no further notifications follow.
    Closed,
}

struct ListenerQueue {
    inner: Mutex<VecDeque<DeviceNotification>>,
    notify: tokio::sync::Notify,
    capacity: usize,
}

impl ListenerQueue {
    fn push(&self, mut notification: DeviceNotification) {
        {
            let mut queue = self.inner.lock().expect("listener queue poisoned");
            if queue.len() >= self.capacity {
                // Coalesce: fold the oldest pending update into the incoming
                // one and flag the overflow to the subscriber
                if let Some(DeviceNotification::Updated {
                    changed: dropped, ..
                }) = queue.pop_front()
                    && let DeviceNotification::Updated {
                        changed,
                        backpressure,
                        ..
                    } = &mut notification
                {
                    for name in dropped {
                        if !changed.contains(&name) {
                            changed.push(name);
                        }
                    }
                    *backpressure = true;
                }
            }
            queue.push_back(notification);
        }
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<DeviceNotification> {
        self.inner
            .lock()
            .expect("listener queue poisoned")
            .pop_front()
    }
}

/// Receiving side of a device subscription.
pub struct DeviceListener {
    queue: Arc<ListenerQueue>,
    closed: bool,
}

impl DeviceListener {
    /// Receives the next notification, waiting if none is pending.
    ///
    /// Returns `None` once the [`DeviceNotification::Closed`] marker has
    /// been consumed.
    pub async fn recv(&mut self) -> Option<DeviceNotification> {
        if self.closed {
            return None;
        }
        loop {
            if let Some(notification) = self.queue.pop() {
                if matches!(notification, DeviceNotification::Closed) {
                    self.closed = true;
                }
                return Some(notification);
            }
            self.queue.notify.notified().await;
        }
    }

    /// Pops a pending notification without waiting.
    pub fn try_recv(&mut self) -> Option<DeviceNotification> {
        if self.closed {
            return None;
        }
        let notification = self.queue.pop()?;
        if matches!(notification, DeviceNotification::Closed) {
            self.closed = true;
        }
        Some(notification)
    }
}

/// Handle used to unsubscribe a listener.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ListenerHandle(u64);

struct DeviceState {
    info: Option<DeviceInfo>,
    telemetry: Telemetry,
    bit_state: Option<BitState>,
    can_bit_state: Option<CanBitState>,
    last_command: Option<LastCommand>,
    listeners: Vec<(u64, Arc<ListenerQueue>)>,
    next_listener_id: u64,
    /// Set while the state holds only restored (warm-start) data. Restored
    /// timestamps are advisory: the first live frame always applies and
    /// clears the flag.
    warm_start: bool,
}

/// One vehicle alarm unit and its subscriber set.
pub struct Device {
    device_id: u64,
    state: Mutex<DeviceState>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Creates an empty device model.
    #[must_use]
    pub fn new(device_id: u64) -> Self {
        Self {
            device_id,
            state: Mutex::new(DeviceState {
                info: None,
                telemetry: Telemetry::default(),
                bit_state: None,
                can_bit_state: None,
                last_command: None,
                listeners: Vec::new(),
                next_listener_id: 0,
                warm_start: false,
            }),
        }
    }

    /// Seeds the model with state persisted by a host from a previous run.
    ///
    /// Restored data is advisory: it populates the view for a warm start
    /// but never outranks fresh frames, whatever timestamps it carries.
    pub fn seed_warm_start(&self, bit_state: Option<BitState>, last_online_utc: Option<i64>) {
        let mut state = self.lock();
        if state.bit_state.is_some() || state.telemetry.online_timestamp_utc.is_some() {
            return; // Live data already present
        }
        state.bit_state = bit_state;
        state.telemetry.online_timestamp_utc = last_online_utc;
        state.warm_start = true;
    }

    /// Returns the stable identifier of the unit.
    #[must_use]
    pub const fn device_id(&self) -> u64 {
        self.device_id
    }

    /// Replaces the identity attributes (directory snapshot only).
    pub fn set_info(&self, info: DeviceInfo) {
        let mut state = self.lock();
        if state.info.as_ref() == Some(&info) {
            return;
        }
        state.info = Some(info);
        Self::commit(&mut state, self.device_id, vec!["info"]);
    }

    /// Applies a full snapshot: the state words are replaced wholesale and
    /// telemetry merges field-by-field under the timestamp guard.
    ///
    /// Returns the changed field names, or `None` when the frame is older
    /// than the stored state and was dropped entirely.
    pub fn apply_snapshot(&self, payload: &StatePayload) -> Option<Vec<&'static str>> {
        self.apply(payload)
    }

    /// Applies a sparse delta under the same invariants as a snapshot:
    /// absent keys retain values, explicit nulls clear, state words replace
    /// atomically, stale frames are dropped.
    pub fn apply_delta(&self, payload: &StatePayload) -> Option<Vec<&'static str>> {
        self.apply(payload)
    }

    fn apply(&self, payload: &StatePayload) -> Option<Vec<&'static str>> {
        let mut state = self.lock();

        if state.warm_start {
            // Restored timestamps must not gate live data
            state.telemetry.online_timestamp_utc = None;
            state.warm_start = false;
        } else if state.telemetry.is_stale(payload) {
            log::warn!(
                "State update for device {} is older than existing data, dropping frame",
                self.device_id
            );
            return None;
        }

        let mut changed = state.telemetry.merge(payload);

        // Bits are positive assertions: replace the word, never OR-merge
        if let Some(Some(word)) = payload.bit_state_1 {
            let next = BitState(word);
            if state.bit_state != Some(next) {
                Self::push_flipped_bits(
                    &mut changed,
                    state.bit_state.map_or(0, |b| b.0),
                    next.0,
                    super::bits::BIT_STATE_MAP,
                );
                state.bit_state = Some(next);
                changed.push("bit_state");
            }
        }
        if let Some(Some(word)) = payload.can_bit_state {
            let next = CanBitState(word as u32);
            if state.can_bit_state != Some(next) {
                Self::push_flipped_bits(
                    &mut changed,
                    state.can_bit_state.map_or(0, |b| u64::from(b.0)),
                    u64::from(next.0),
                    super::bits::CAN_BIT_STATE_MAP,
                );
                state.can_bit_state = Some(next);
                changed.push("can_bit_state");
            }
        }

        if changed.is_empty() {
            return Some(changed);
        }

        Self::commit(&mut state, self.device_id, changed.clone());
        Some(changed)
    }

    fn push_flipped_bits(
        changed: &mut Vec<&'static str>,
        previous: u64,
        next: u64,
        map: super::bits::BitMap,
    ) {
        let flipped = previous ^ next;
        for &(name, position) in map {
            if flipped & (1u64 << position) != 0 {
                changed.push(name);
            }
        }
    }

    /// Records a command submission on the view.
    pub fn record_command_submitted(&self, command_id: u32) {
        let mut state = self.lock();
        state.last_command = Some(LastCommand {
            command_id,
            reply: None,
            result: None,
        });
        Self::commit(&mut state, self.device_id, vec!["last_command"]);
    }

    /// Records a command reply on the view.
    pub fn record_command_reply(&self, command_id: u32, result: i64, reply: Option<i64>) {
        let mut state = self.lock();
        state.last_command = Some(LastCommand {
            command_id,
            reply,
            result: Some(result),
        });
        Self::commit(&mut state, self.device_id, vec!["last_command"]);
    }

    /// Returns an immutable snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> DeviceView {
        let state = self.lock();
        Self::view_of(&state, self.device_id)
    }

    /// Registers a listener with the default queue capacity.
    pub fn subscribe(&self) -> (ListenerHandle, DeviceListener) {
        self.subscribe_with_capacity(LISTENER_QUEUE_CAPACITY)
    }

    /// Registers a listener with an explicit queue capacity.
    pub fn subscribe_with_capacity(&self, capacity: usize) -> (ListenerHandle, DeviceListener) {
        let queue = Arc::new(ListenerQueue {
            inner: Mutex::new(VecDeque::new()),
            notify: tokio::sync::Notify::new(),
            capacity: capacity.max(1),
        });

        let mut state = self.lock();
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.push((id, queue.clone()));

        (
            ListenerHandle(id),
            DeviceListener {
                queue,
                closed: false,
            },
        )
    }

    /// Removes a listener; pending notifications are discarded.
    pub fn unsubscribe(&self, handle: ListenerHandle) {
        let mut state = self.lock();
        state.listeners.retain(|(id, _)| *id != handle.0);
    }

    /// Sends the terminal [`DeviceNotification::Closed`] to every listener
    /// and drops the listener set.
    pub fn close_listeners(&self) {
        let mut state = self.lock();
        for (_, queue) in state.listeners.drain(..) {
            queue.push(DeviceNotification::Closed);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().expect("device state poisoned")
    }

    fn view_of(state: &DeviceState, device_id: u64) -> DeviceView {
        DeviceView {
            device_id,
            info: state.info.clone(),
            telemetry: state.telemetry.clone(),
            bit_state: state.bit_state,
            can_bit_state: state.can_bit_state,
            last_command: state.last_command,
        }
    }

    fn commit(state: &mut DeviceState, device_id: u64, changed: Vec<&'static str>) {
        if state.listeners.is_empty() {
            return;
        }
        let view = Arc::new(Self::view_of(state, device_id));
        for (_, queue) in &state.listeners {
            queue.push(DeviceNotification::Updated {
                view: view.clone(),
                changed: changed.clone(),
                backpressure: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> StatePayload {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn test_delta_merge_notifies_changed_fields() {
        let device = Device::new(1234);
        device.apply_snapshot(&payload(serde_json::json!({"speed": 0, "fuel": 50})));

        let (_handle, mut listener) = device.subscribe();
        device.apply_delta(&payload(serde_json::json!({"speed": 42})));

        let Some(DeviceNotification::Updated { view, changed, .. }) = listener.recv().await else {
            panic!("expected update");
        };
        assert_eq!(view.telemetry.speed, Some(42.0));
        assert_eq!(view.telemetry.fuel, Some(50.0));
        assert_eq!(changed, vec!["speed"]);
    }

    #[tokio::test]
    async fn test_bit_state_replaced_and_flips_reported() {
        let device = Device::new(1);
        device.apply_snapshot(&payload(serde_json::json!({"bit_state_1": 0b111})));

        let (_handle, mut listener) = device.subscribe();
        device.apply_delta(&payload(serde_json::json!({"bit_state_1": 0b001})));

        let view = device.snapshot();
        assert_eq!(view.bit_state, Some(BitState(0b001)));
        assert_eq!(view.is_armed(), Some(true));
        assert_eq!(view.is_engine_running(), Some(false));

        let Some(DeviceNotification::Updated { changed, .. }) = listener.recv().await else {
            panic!("expected update");
        };
        assert!(changed.contains(&"bit_state"));
        assert!(changed.contains(&"engine_running"));
        assert!(changed.contains(&"alarm"));
        assert!(!changed.contains(&"armed"));
    }

    #[test]
    fn test_stale_frame_dropped_entirely() {
        let device = Device::new(1);
        device.apply_snapshot(&payload(serde_json::json!({"state_utc": 1000, "fuel": 55})));

        let result =
            device.apply_delta(&payload(serde_json::json!({"state_utc": 900, "fuel": 10})));

        assert!(result.is_none());
        assert_eq!(device.snapshot().telemetry.fuel, Some(55.0));
    }

    #[tokio::test]
    async fn test_backpressure_coalesces_oldest_into_newest() {
        let device = Device::new(1);
        let (_handle, mut listener) = device.subscribe_with_capacity(2);

        device.apply_delta(&payload(serde_json::json!({"speed": 1})));
        device.apply_delta(&payload(serde_json::json!({"fuel": 10})));
        // Queue is full; this push coalesces the oldest (speed) away
        device.apply_delta(&payload(serde_json::json!({"voltage": 12.0})));

        let first = listener.try_recv();
        let Some(DeviceNotification::Updated { changed, .. }) = first else {
            panic!("expected update");
        };
        assert_eq!(changed, vec!["fuel"]);

        let Some(DeviceNotification::Updated {
            changed,
            backpressure,
            view,
        }) = listener.try_recv()
        else {
            panic!("expected update");
        };
        assert!(backpressure);
        assert!(changed.contains(&"voltage"));
        assert!(changed.contains(&"speed")); // folded from the dropped update
        // The coalesced view carries the newest state
        assert_eq!(view.telemetry.speed, Some(1.0));
        assert_eq!(view.telemetry.voltage, Some(12.0));

        assert!(listener.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_close_notifies_then_ends() {
        let device = Device::new(1);
        let (_handle, mut listener) = device.subscribe();

        device.close_listeners();

        assert!(matches!(
            listener.recv().await,
            Some(DeviceNotification::Closed)
        ));
        assert!(listener.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let device = Device::new(1);
        let (handle, mut listener) = device.subscribe();
        device.unsubscribe(handle);

        device.apply_delta(&payload(serde_json::json!({"speed": 5})));
        assert!(listener.try_recv().is_none());
    }

    #[test]
    fn test_warm_start_seed_is_advisory() {
        let device = Device::new(1);
        device.seed_warm_start(Some(BitState(0x01)), Some(5_000));

        let view = device.snapshot();
        assert_eq!(view.is_armed(), Some(true));
        assert_eq!(view.telemetry.online_timestamp_utc, Some(5_000));

        // A live frame older than the restored timestamp still applies
        let applied = device.apply_delta(&payload(
            serde_json::json!({"online_utc": 1_000, "fuel": 30, "bit_state_1": 0}),
        ));
        assert!(applied.is_some());

        let view = device.snapshot();
        assert_eq!(view.telemetry.fuel, Some(30.0));
        assert_eq!(view.telemetry.online_timestamp_utc, Some(1_000));
        assert_eq!(view.is_armed(), Some(false));

        // From the second live frame on, monotonicity gates again
        let applied = device.apply_delta(&payload(serde_json::json!({"online_utc": 900})));
        assert!(applied.is_none());
    }

    #[test]
    fn test_warm_start_seed_refused_after_live_data() {
        let device = Device::new(1);
        device.apply_delta(&payload(serde_json::json!({"bit_state_1": 2, "online_utc": 100})));
        device.seed_warm_start(Some(BitState(0x01)), Some(5_000));

        let view = device.snapshot();
        assert_eq!(view.bit_state, Some(BitState(2)));
        assert_eq!(view.telemetry.online_timestamp_utc, Some(100));
    }

    #[tokio::test]
    async fn test_command_bookkeeping_on_view() {
        let device = Device::new(1);
        device.record_command_submitted(4);
        assert_eq!(
            device.snapshot().last_command,
            Some(LastCommand {
                command_id: 4,
                reply: None,
                result: None
            })
        );

        device.record_command_reply(4, 0, Some(2));
        let last = device.snapshot().last_command.unwrap();
        assert_eq!(last.result, Some(0));
        assert_eq!(last.reply, Some(2));
    }
}
