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

//! Response models for the Pandora HTTP endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    common::{de, enums::{DeviceType, Features}},
    model::device::DeviceInfo,
    websocket::messages::{EventPayload, StatePayload},
};

/// Body of a successful `POST /api/users/login`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(deserialize_with = "de::required_i64")]
    pub user_id: i64,
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

/// One entry of the `GET /api/devices` directory.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeviceAttributes {
    #[serde(default, deserialize_with = "de::loose_opt_i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "de::loose_opt_i64")]
    pub dev_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub firmware: Option<String>,
    #[serde(default)]
    pub voice_version: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, rename = "phone1")]
    pub phone_other: Option<String>,
    #[serde(default, rename = "type")]
    pub device_type: Option<DeviceType>,
    #[serde(default)]
    pub features: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl DeviceAttributes {
    /// Returns the device identifier (`dev_id` with `id` as fallback).
    #[must_use]
    pub fn device_id(&self) -> Option<u64> {
        self.dev_id
            .or(self.id)
            .and_then(|id| u64::try_from(id).ok())
            .filter(|&id| id != 0)
    }

    /// Converts the directory entry into the identity attributes of the
    /// device model. Returns `None` without a usable identifier.
    #[must_use]
    pub fn to_device_info(&self) -> Option<DeviceInfo> {
        Some(DeviceInfo {
            device_id: self.device_id()?,
            name: self.name.clone().unwrap_or_default(),
            model: self.model.clone(),
            firmware_version: self.firmware.clone(),
            voice_version: self.voice_version.clone(),
            color: self.color.clone(),
            phone: self.phone.clone().filter(|p| !p.is_empty()),
            phone_other: self.phone_other.clone().filter(|p| !p.is_empty()),
            device_type: self.device_type.unwrap_or_default(),
            features: self
                .features
                .as_ref()
                .map(Features::from_attributes)
                .unwrap_or_default(),
        })
    }
}

/// Per-device timestamps carried in the `time` section of a snapshot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Online timestamp, UTC.
    #[serde(default, deserialize_with = "de::loose_opt_i64")]
    pub online: Option<i64>,
    /// Online timestamp, device-local.
    #[serde(default, deserialize_with = "de::loose_opt_i64")]
    pub onlined: Option<i64>,
    /// Last command timestamp, UTC.
    #[serde(default, deserialize_with = "de::loose_opt_i64")]
    pub command: Option<i64>,
    /// Last settings-change timestamp, UTC.
    #[serde(default, deserialize_with = "de::loose_opt_i64")]
    pub setting: Option<i64>,
}

impl TimeEntry {
    /// Converts the timestamps into a sparse state payload for merging.
    #[must_use]
    pub fn to_state_payload(&self) -> StatePayload {
        StatePayload {
            online_timestamp: self.onlined.map(Some),
            online_timestamp_utc: self.online.map(Some),
            command_timestamp_utc: self.command.map(Some),
            settings_timestamp_utc: self.setting.map(Some),
            ..Default::default()
        }
    }
}

/// One wrapper of the `lenta` event feed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LentaEntry {
    #[serde(default)]
    pub obj: Option<EventPayload>,

    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

/// Body of `GET /api/updates`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdatesResponse {
    /// Server timestamp echoed into the next poll request.
    #[serde(default, deserialize_with = "de::loose_opt_i64")]
    pub ts: Option<i64>,
    /// Per-device state keyed by stringified device id.
    #[serde(default)]
    pub stats: Option<HashMap<String, StatePayload>>,
    /// Per-device timestamps keyed by stringified device id.
    #[serde(default)]
    pub time: Option<HashMap<String, TimeEntry>>,
    /// Event feed entries.
    #[serde(default)]
    pub lenta: Option<Vec<LentaEntry>>,

    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

/// Body of `POST /api/devices/command`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub status: Option<String>,
    /// Per-device submission state keyed by stringified device id.
    #[serde(default)]
    pub action_result: Option<HashMap<String, String>>,

    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl CommandResponse {
    /// Returns `true` when the command was accepted for the device.
    #[must_use]
    pub fn is_sent(&self, device_id: u64) -> bool {
        if let Some(action_result) = &self.action_result {
            return action_result
                .get(&device_id.to_string())
                .is_some_and(|state| state == "sent");
        }
        self.status.as_deref() == Some("success")
    }
}

/// Body of `POST /api/devices/wakeup`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WakeupResponse {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_attributes_identity() {
        let attributes: DeviceAttributes = serde_json::from_value(serde_json::json!({
            "id": 1234,
            "name": "My Car",
            "model": "DXL-5000",
            "firmware": "2.41",
            "type": "alarm",
            "features": {"autostart": 1, "heater": 1},
            "photo": "abc"
        }))
        .unwrap();

        assert_eq!(attributes.device_id(), Some(1234));
        let info = attributes.to_device_info().unwrap();
        assert_eq!(info.name, "My Car");
        assert_eq!(info.device_type, DeviceType::Alarm);
        assert!(info.features.contains(Features::AUTO_START));
        assert_eq!(attributes.raw["photo"], serde_json::json!("abc"));
    }

    #[test]
    fn test_zero_device_id_rejected() {
        let attributes: DeviceAttributes =
            serde_json::from_value(serde_json::json!({"id": 0})).unwrap();
        assert_eq!(attributes.device_id(), None);
    }

    #[test]
    fn test_updates_response_shape() {
        let response: UpdatesResponse = serde_json::from_value(serde_json::json!({
            "ts": 1_700_000_000,
            "stats": {"1234": {"online": 1, "fuel": 50, "bit_state_1": 1}},
            "time": {"1234": {"online": 1_700_000_000, "onlined": 1_700_010_800}},
            "lenta": [{"time": 1, "obj": {"dev_id": 1234, "eventid1": 4}}]
        }))
        .unwrap();

        assert_eq!(response.ts, Some(1_700_000_000));
        let stats = response.stats.unwrap();
        assert_eq!(stats["1234"].fuel, Some(Some(50.0)));
        let time = response.time.unwrap();
        assert_eq!(time["1234"].online, Some(1_700_000_000));
        let lenta = response.lenta.unwrap();
        assert_eq!(lenta[0].obj.as_ref().unwrap().eventid1, Some(4));
    }

    #[test]
    fn test_command_response_accepted() {
        let response: CommandResponse = serde_json::from_value(serde_json::json!({
            "action_result": {"1234": "sent"}
        }))
        .unwrap();
        assert!(response.is_sent(1234));
        assert!(!response.is_sent(5678));

        let response: CommandResponse =
            serde_json::from_value(serde_json::json!({"status": "success"})).unwrap();
        assert!(response.is_sent(1));

        let response: CommandResponse =
            serde_json::from_value(serde_json::json!({"status": "fail"})).unwrap();
        assert!(!response.is_sent(1));
    }
}
