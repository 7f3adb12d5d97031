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

//! Immutable domain records and the event-bus payloads derived from them.

use serde::{Deserialize, Serialize};

use crate::{
    common::enums::{AlertType, CommandOutcome, PrimaryEventId},
    websocket::messages::{EventPayload, PointPayload},
};

/// One recorded event from the unit. Never mutated after emission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub device_id: u64,
    pub event_id_primary: u16,
    pub event_id_secondary: u16,
    pub timestamp: Option<i64>,
    pub recorded_timestamp: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub bit_state: Option<u64>,
    pub gsm_level: Option<i64>,
    pub fuel: Option<f64>,
    pub exterior_temperature: Option<f64>,
    pub engine_temperature: Option<f64>,
    pub interior_temperature: Option<f64>,
    pub engine_rpm: Option<f64>,
    pub voltage: Option<f64>,
}

impl TrackingEvent {
    /// Builds an event record from a decoded payload.
    ///
    /// Returns `None` when the payload carries no device identifier.
    #[must_use]
    pub fn from_payload(payload: &EventPayload) -> Option<Self> {
        Some(Self {
            device_id: payload.device_id()?,
            event_id_primary: payload.eventid1.and_then(|v| u16::try_from(v).ok())?,
            event_id_secondary: payload
                .eventid2
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or_default(),
            timestamp: payload.timestamp(),
            recorded_timestamp: payload.dtime_rec,
            latitude: payload.x,
            longitude: payload.y,
            bit_state: payload.bit_state_1.and_then(|v| u64::try_from(v).ok()),
            gsm_level: payload.gsm_level,
            fuel: payload.fuel,
            exterior_temperature: payload.out_temp,
            engine_temperature: payload.engine_temp,
            interior_temperature: payload.cabin_temp,
            engine_rpm: payload.engine_rpm,
            voltage: payload.voltage,
        })
    }

    /// Returns the decoded primary event code.
    #[must_use]
    pub fn primary_event(&self) -> PrimaryEventId {
        PrimaryEventId::from(self.event_id_primary)
    }
}

/// One GPS track point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingPoint {
    pub device_id: u64,
    pub track_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub direction: Option<f64>,
    pub fuel: Option<f64>,
    pub max_speed: Option<f64>,
    pub length: Option<f64>,
    pub timestamp: Option<i64>,
}

impl TrackingPoint {
    /// Builds a point record from a decoded payload.
    ///
    /// Returns `None` when the payload carries no device identifier.
    #[must_use]
    pub fn from_payload(payload: &PointPayload) -> Option<Self> {
        Some(Self {
            device_id: payload.device_id()?,
            track_id: payload.track_id,
            latitude: payload.x,
            longitude: payload.y,
            speed: payload.speed,
            direction: payload.direction,
            fuel: payload.fuel,
            max_speed: payload.max_speed,
            length: payload.length,
            timestamp: payload.dtime,
        })
    }
}

/// Payload published on the `pandora_cas_event` topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub device_id: u64,
    pub event_id_primary: u16,
    pub event_id_secondary: u16,
    pub title_primary: String,
    pub title_secondary: Option<String>,
    pub event_type: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub gsm_level: Option<i64>,
    pub fuel: Option<f64>,
    pub exterior_temperature: Option<f64>,
    pub engine_temperature: Option<f64>,
}

impl From<&TrackingEvent> for EventMessage {
    fn from(event: &TrackingEvent) -> Self {
        let primary = event.primary_event();
        let title_secondary = if primary == PrimaryEventId::Alert {
            AlertType::title_for(event.event_id_secondary).map(ToOwned::to_owned)
        } else {
            None
        };

        Self {
            device_id: event.device_id,
            event_id_primary: event.event_id_primary,
            event_id_secondary: event.event_id_secondary,
            title_primary: primary.title(),
            title_secondary,
            event_type: primary.event_type().to_string(),
            latitude: event.latitude,
            longitude: event.longitude,
            gsm_level: event.gsm_level,
            fuel: event.fuel,
            exterior_temperature: event.exterior_temperature,
            engine_temperature: event.engine_temperature,
        }
    }
}

/// Payload published on the `pandora_cas_command` topic for every
/// terminated command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub device_id: u64,
    pub command_id: u32,
    pub result: CommandOutcome,
    pub reply: Option<i64>,
}
