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

//! Frame types for the Pandora streaming protocol.
//!
//! Every frame arrives as `{"type": <kind>, "data": {...}}`. State payloads
//! are field-sparse: an absent key means "unchanged", an explicit `null`
//! clears the field, which the payload structs model as `Option<Option<T>>`
//! (see [`crate::common::de`]). Keys the codec does not know are preserved
//! in a flattened `raw` sidecar so a decode/encode round trip loses
//! nothing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::de;

/// One decoded WebSocket frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum WsFrame {
    /// Full snapshot for one device, sent by the server on (re)connect.
    InitialState(StatePayload),
    /// Sparse delta for one device.
    State(StatePayload),
    /// GPS track point.
    Point(PointPayload),
    /// Domain event with primary/secondary codes.
    Event(EventPayload),
    /// Asynchronous reply to a submitted command.
    Command(CommandReplyPayload),
    /// Opaque settings-changed notification.
    UpdateSettings(SettingsPayload),
}

impl WsFrame {
    /// Returns the device the frame addresses, when identifiable.
    #[must_use]
    pub fn device_id(&self) -> Option<u64> {
        match self {
            Self::InitialState(p) | Self::State(p) => p.device_id(),
            Self::Point(p) => p.device_id(),
            Self::Event(p) => p.device_id(),
            Self::Command(p) => Some(p.dev_id),
            Self::UpdateSettings(p) => p.device_id(),
        }
    }
}

/// Balance reading with its currency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalancePayload {
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cur: Option<String>,
}

/// Per-tank fuel reading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuelTankPayload {
    #[serde(deserialize_with = "de::required_i64")]
    pub id: i64,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub val: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub ras: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub ras_t: Option<f64>,
}

/// Sparse device state, shared by `initial-state` frames, `state` deltas
/// and the per-device objects of the HTTP `updates` snapshot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    // Position and motion
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub x: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub y: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub speed: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub rot: Option<Option<f64>>,
    #[serde(
        default,
        rename = "move",
        deserialize_with = "de::loose_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_moving: Option<Option<bool>>,
    #[serde(
        default,
        rename = "evaq",
        deserialize_with = "de::loose_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_evacuating: Option<Option<bool>>,
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub lock_x: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub lock_y: Option<Option<f64>>,

    // Packed state words
    #[serde(
        default,
        deserialize_with = "de::loose_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub bit_state_1: Option<Option<u64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub can_bit_state: Option<Option<u64>>,

    // Engine and temperatures
    #[serde(
        default,
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub engine_rpm: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub engine_temp: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub cabin_temp: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub out_temp: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub battery_temperature: Option<Option<f64>>,

    // Supply and consumables
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub fuel: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub voltage: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub gsm_level: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "de::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub balance: Option<Option<BalancePayload>>,
    #[serde(
        default,
        rename = "balance1",
        deserialize_with = "de::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub balance_other: Option<Option<BalancePayload>>,
    #[serde(
        default,
        deserialize_with = "de::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub tanks: Option<Option<Vec<FuelTankPayload>>>,

    // Mileage
    #[serde(
        default,
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub mileage: Option<Option<f64>>,
    #[serde(
        default,
        rename = "mileage_CAN",
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub mileage_can: Option<Option<f64>>,

    // Accessory state
    #[serde(
        default,
        rename = "metka",
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub tag_number: Option<Option<i64>>,
    #[serde(
        default,
        rename = "brelok",
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub key_number: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub relay: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub active_sim: Option<Option<i64>>,
    #[serde(
        default,
        rename = "track_remains",
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub tracking_remaining: Option<Option<f64>>,
    #[serde(
        default,
        rename = "online_mode",
        deserialize_with = "de::loose_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_online: Option<Option<bool>>,

    // Tire pressures (raw integers; the unit does not document the scale)
    #[serde(
        default,
        rename = "CAN_TMPS_forvard_left",
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub tpms_front_left: Option<Option<f64>>,
    #[serde(
        default,
        rename = "CAN_TMPS_forvard_right",
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub tpms_front_right: Option<Option<f64>>,
    #[serde(
        default,
        rename = "CAN_TMPS_back_left",
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub tpms_back_left: Option<Option<f64>>,
    #[serde(
        default,
        rename = "CAN_TMPS_back_right",
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub tpms_back_right: Option<Option<f64>>,
    #[serde(
        default,
        rename = "CAN_TMPS_reserve",
        deserialize_with = "de::loose_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub tpms_reserve: Option<Option<f64>>,

    // Timestamps (`state`/`online` are device-local, `*_utc` are UTC)
    #[serde(
        default,
        rename = "state",
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub state_timestamp: Option<Option<i64>>,
    #[serde(
        default,
        rename = "state_utc",
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub state_timestamp_utc: Option<Option<i64>>,
    #[serde(
        default,
        rename = "online",
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub online_timestamp: Option<Option<i64>>,
    #[serde(
        default,
        rename = "online_utc",
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub online_timestamp_utc: Option<Option<i64>>,
    #[serde(
        default,
        rename = "command_utc",
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub command_timestamp_utc: Option<Option<i64>>,
    #[serde(
        default,
        rename = "setting_utc",
        deserialize_with = "de::loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub settings_timestamp_utc: Option<Option<i64>>,

    /// Keys the codec does not decode, preserved verbatim.
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl StatePayload {
    /// Returns the device identifier (`dev_id` with `id` as fallback).
    #[must_use]
    pub fn device_id(&self) -> Option<u64> {
        self.dev_id.or(self.id)
    }
}

/// GPS track point; always carries position, speed, direction and time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PointPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub track_id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub x: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub y: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub speed: Option<f64>,
    #[serde(
        default,
        rename = "rot",
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub direction: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub fuel: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_speed: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub length: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub dtime: Option<i64>,

    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl PointPayload {
    /// Returns the device identifier (`dev_id` with `id` as fallback).
    #[must_use]
    pub fn device_id(&self) -> Option<u64> {
        self.dev_id.or(self.id)
    }
}

/// Domain event record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_id: Option<u64>,
    /// Server-side record identifier.
    #[serde(
        default,
        deserialize_with = "de::loose_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub eventid1: Option<i64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub eventid2: Option<i64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub dtime: Option<i64>,
    /// Fallback timestamp key used by some firmware generations.
    #[serde(
        default,
        deserialize_with = "de::loose_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<i64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub dtime_rec: Option<i64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub x: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub y: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub bit_state_1: Option<i64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub cabin_temp: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub engine_rpm: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub engine_temp: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub fuel: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub gsm_level: Option<i64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub out_temp: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub voltage: Option<f64>,

    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl EventPayload {
    /// Returns the device identifier.
    #[must_use]
    pub fn device_id(&self) -> Option<u64> {
        self.dev_id
    }

    /// Returns the occurrence timestamp (`dtime` with `time` as fallback).
    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        self.dtime.or(self.time)
    }
}

/// Asynchronous reply to a submitted command.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandReplyPayload {
    #[serde(deserialize_with = "de::required_u64")]
    pub dev_id: u64,
    #[serde(deserialize_with = "de::required_u64")]
    pub command: u64,
    #[serde(deserialize_with = "de::required_i64")]
    pub result: i64,
    #[serde(
        default,
        deserialize_with = "de::loose_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub reply: Option<i64>,

    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

/// Opaque settings-changed notification, surfaced as an event.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SettingsPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl SettingsPayload {
    /// Returns the device identifier (`dev_id` with `id` as fallback).
    #[must_use]
    pub fn device_id(&self) -> Option<u64> {
        self.dev_id.or(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_state_frame() {
        let json = r#"{
            "type": "state",
            "data": {
                "dev_id": 1234,
                "speed": 42,
                "bit_state_1": 1,
                "engine_rpm": 0,
                "x": 55.75,
                "y": 37.61
            }
        }"#;

        let frame: WsFrame = serde_json::from_str(json).unwrap();
        let WsFrame::State(payload) = frame else {
            panic!("expected state frame");
        };
        assert_eq!(payload.device_id(), Some(1234));
        assert_eq!(payload.speed, Some(Some(42.0)));
        assert_eq!(payload.bit_state_1, Some(Some(1)));
        assert_eq!(payload.engine_rpm, Some(Some(0)));
        assert_eq!(payload.fuel, None); // absent, not cleared
    }

    #[test]
    fn test_decode_initial_state_tag() {
        let json = r#"{"type": "initial-state", "data": {"dev_id": 7}}"#;
        let frame: WsFrame = serde_json::from_str(json).unwrap();
        assert!(matches!(frame, WsFrame::InitialState(_)));
    }

    #[test]
    fn test_explicit_null_clears() {
        let json = r#"{"type": "state", "data": {"dev_id": 1, "fuel": null}}"#;
        let WsFrame::State(payload) = serde_json::from_str(json).unwrap() else {
            panic!("expected state frame");
        };
        assert_eq!(payload.fuel, Some(None));
    }

    #[test]
    fn test_decode_command_reply() {
        let json = r#"{
            "type": "command",
            "data": {"dev_id": 1234, "command": 4, "result": 0, "reply": 2}
        }"#;
        let WsFrame::Command(payload) = serde_json::from_str(json).unwrap() else {
            panic!("expected command frame");
        };
        assert_eq!(payload.dev_id, 1234);
        assert_eq!(payload.command, 4);
        assert_eq!(payload.result, 0);
        assert_eq!(payload.reply, Some(2));
    }

    #[test]
    fn test_decode_point() {
        let json = r#"{
            "type": "point",
            "data": {
                "dev_id": 9, "track_id": 3, "x": 59.93, "y": 30.33,
                "speed": 12.5, "rot": 270, "dtime": 1700000000
            }
        }"#;
        let WsFrame::Point(payload) = serde_json::from_str(json).unwrap() else {
            panic!("expected point frame");
        };
        assert_eq!(payload.device_id(), Some(9));
        assert_eq!(payload.direction, Some(270.0));
        assert_eq!(payload.dtime, Some(1_700_000_000));
    }

    #[test]
    fn test_decode_event() {
        let json = r#"{
            "type": "event",
            "data": {
                "dev_id": 1234, "eventid1": 4, "eventid2": 0,
                "dtime": 1700000100, "x": 1.0, "y": 2.0, "fuel": 50
            }
        }"#;
        let WsFrame::Event(payload) = serde_json::from_str(json).unwrap() else {
            panic!("expected event frame");
        };
        assert_eq!(payload.eventid1, Some(4));
        assert_eq!(payload.timestamp(), Some(1_700_000_100));
    }

    #[test]
    fn test_unknown_keys_preserved_in_raw() {
        let json = r#"{
            "type": "state",
            "data": {"dev_id": 1, "speed": 10, "smeter": 5, "loadaxis": "x"}
        }"#;
        let WsFrame::State(payload) = serde_json::from_str(json).unwrap() else {
            panic!("expected state frame");
        };
        assert_eq!(payload.raw["smeter"], serde_json::json!(5));
        assert_eq!(payload.raw["loadaxis"], serde_json::json!("x"));

        // Round trip keeps the sidecar keys
        let frame = WsFrame::State(payload);
        let encoded = serde_json::to_value(&frame).unwrap();
        assert_eq!(encoded["data"]["smeter"], serde_json::json!(5));
        assert_eq!(encoded["data"]["speed"], serde_json::json!(10.0));
        assert_eq!(encoded["type"], serde_json::json!("state"));
    }

    #[test]
    fn test_round_trip_preserves_null_clear() {
        let json = r#"{"type": "state", "data": {"dev_id": 1, "fuel": null}}"#;
        let frame: WsFrame = serde_json::from_str(json).unwrap();
        let encoded = serde_json::to_value(&frame).unwrap();
        assert!(encoded["data"].get("fuel").unwrap().is_null());
        // Absent keys stay absent
        assert!(encoded["data"].get("speed").is_none());
    }

    #[test]
    fn test_update_settings_is_opaque() {
        let json = r#"{"type": "update-settings", "data": {"dev_id": 5, "anything": [1, 2]}}"#;
        let WsFrame::UpdateSettings(payload) = serde_json::from_str(json).unwrap() else {
            panic!("expected update-settings frame");
        };
        assert_eq!(payload.device_id(), Some(5));
        assert_eq!(payload.raw["anything"], serde_json::json!([1, 2]));
    }
}
