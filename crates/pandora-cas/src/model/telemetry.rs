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

//! Vehicle telemetry record and its sparse-merge semantics.

use serde::{Deserialize, Serialize};

use crate::websocket::messages::StatePayload;

/// Balance reading with its currency.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub value: f64,
    pub currency: String,
}

/// Per-tank fuel reading.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelTank {
    pub id: i64,
    pub value: f64,
    pub consumption: Option<f64>,
    pub consumption_trip: Option<f64>,
}

/// Sparse vehicle telemetry. Every field is independently nullable; fields
/// absent from an incoming frame keep their prior value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub bearing: Option<f64>,
    pub is_moving: Option<bool>,
    pub is_evacuating: Option<bool>,
    pub lock_latitude: Option<f64>,
    pub lock_longitude: Option<f64>,
    pub engine_rpm: Option<i64>,
    pub engine_temperature: Option<f64>,
    pub interior_temperature: Option<f64>,
    pub exterior_temperature: Option<f64>,
    pub battery_temperature: Option<f64>,
    pub fuel: Option<f64>,
    pub voltage: Option<f64>,
    pub gsm_level: Option<i64>,
    pub balance: Option<Balance>,
    pub balance_other: Option<Balance>,
    pub fuel_tanks: Option<Vec<FuelTank>>,
    pub mileage: Option<f64>,
    pub can_mileage: Option<f64>,
    pub tag_number: Option<i64>,
    pub key_number: Option<i64>,
    pub relay: Option<i64>,
    pub active_sim: Option<i64>,
    pub tracking_remaining: Option<f64>,
    pub is_online: Option<bool>,
    pub tpms_front_left: Option<f64>,
    pub tpms_front_right: Option<f64>,
    pub tpms_back_left: Option<f64>,
    pub tpms_back_right: Option<f64>,
    pub tpms_reserve: Option<f64>,
    pub state_timestamp: Option<i64>,
    pub state_timestamp_utc: Option<i64>,
    pub online_timestamp: Option<i64>,
    pub online_timestamp_utc: Option<i64>,
    pub command_timestamp_utc: Option<i64>,
    pub settings_timestamp_utc: Option<i64>,
}

/// Applies `Option<Option<T>>` payload semantics to one field: outer `None`
/// keeps the stored value, `Some(None)` clears it, `Some(Some(v))` assigns.
macro_rules! merge_field {
    ($self:ident, $incoming:expr, $field:ident, $changed:ident) => {
        if let Some(value) = $incoming {
            if $self.$field != value {
                $self.$field = value;
                $changed.push(stringify!($field));
            }
        }
    };
}

impl Telemetry {
    /// Merges a sparse payload into the record, returning the names of the
    /// fields whose values changed.
    ///
    /// Timestamp monotonicity is enforced by the caller before the merge;
    /// this function only applies field-sparse semantics.
    pub fn merge(&mut self, payload: &StatePayload) -> Vec<&'static str> {
        let mut changed = Vec::new();

        merge_field!(self, payload.x, latitude, changed);
        merge_field!(self, payload.y, longitude, changed);
        merge_field!(self, payload.speed, speed, changed);
        merge_field!(self, payload.rot, bearing, changed);
        merge_field!(self, payload.is_moving, is_moving, changed);
        merge_field!(self, payload.is_evacuating, is_evacuating, changed);

        // Lock coordinates arrive scaled by 1e6 on the wire
        merge_field!(
            self,
            payload.lock_x.map(|inner| inner.map(|v| v / 1_000_000.0)),
            lock_latitude,
            changed
        );
        merge_field!(
            self,
            payload.lock_y.map(|inner| inner.map(|v| v / 1_000_000.0)),
            lock_longitude,
            changed
        );

        merge_field!(self, payload.engine_rpm, engine_rpm, changed);
        merge_field!(self, payload.engine_temp, engine_temperature, changed);
        merge_field!(self, payload.cabin_temp, interior_temperature, changed);
        merge_field!(self, payload.out_temp, exterior_temperature, changed);
        merge_field!(self, payload.battery_temperature, battery_temperature, changed);

        merge_field!(self, payload.fuel, fuel, changed);
        merge_field!(self, payload.voltage, voltage, changed);
        merge_field!(self, payload.gsm_level, gsm_level, changed);

        let balance = payload
            .balance
            .clone()
            .map(|inner| inner.and_then(|b| to_balance(&b)));
        merge_field!(self, balance, balance, changed);
        let balance_other = payload
            .balance_other
            .clone()
            .map(|inner| inner.and_then(|b| to_balance(&b)));
        merge_field!(self, balance_other, balance_other, changed);

        let tanks = payload.tanks.clone().map(|inner| {
            inner.map(|tanks| {
                tanks
                    .iter()
                    .map(|t| FuelTank {
                        id: t.id,
                        value: t.val.unwrap_or_default(),
                        consumption: t.ras,
                        consumption_trip: t.ras_t,
                    })
                    .collect::<Vec<_>>()
            })
        });
        merge_field!(self, tanks, fuel_tanks, changed);

        merge_field!(self, payload.mileage, mileage, changed);
        merge_field!(self, payload.mileage_can, can_mileage, changed);
        merge_field!(self, payload.tag_number, tag_number, changed);
        merge_field!(self, payload.key_number, key_number, changed);
        merge_field!(self, payload.relay, relay, changed);
        merge_field!(self, payload.active_sim, active_sim, changed);
        merge_field!(self, payload.tracking_remaining, tracking_remaining, changed);
        merge_field!(self, payload.is_online, is_online, changed);

        merge_field!(self, payload.tpms_front_left, tpms_front_left, changed);
        merge_field!(self, payload.tpms_front_right, tpms_front_right, changed);
        merge_field!(self, payload.tpms_back_left, tpms_back_left, changed);
        merge_field!(self, payload.tpms_back_right, tpms_back_right, changed);
        merge_field!(self, payload.tpms_reserve, tpms_reserve, changed);

        self.merge_timestamps(payload, &mut changed);

        changed
    }

    /// Timestamps only move forward: an incoming value older than the
    /// stored one is ignored rather than applied.
    fn merge_timestamps(&mut self, payload: &StatePayload, changed: &mut Vec<&'static str>) {
        macro_rules! merge_monotonic {
            ($incoming:expr, $field:ident) => {
                if let Some(Some(value)) = $incoming
                    && self.$field.is_none_or(|current| current <= value)
                    && self.$field != Some(value)
                {
                    self.$field = Some(value);
                    changed.push(stringify!($field));
                }
            };
        }

        merge_monotonic!(payload.state_timestamp, state_timestamp);
        merge_monotonic!(payload.state_timestamp_utc, state_timestamp_utc);
        merge_monotonic!(payload.online_timestamp, online_timestamp);
        merge_monotonic!(payload.online_timestamp_utc, online_timestamp_utc);
        merge_monotonic!(payload.command_timestamp_utc, command_timestamp_utc);
        merge_monotonic!(payload.settings_timestamp_utc, settings_timestamp_utc);
    }

    /// Returns `true` when the payload's timestamps are older than the
    /// stored ones, meaning the whole frame should be dropped.
    #[must_use]
    pub fn is_stale(&self, payload: &StatePayload) -> bool {
        macro_rules! older {
            ($incoming:expr, $field:ident) => {
                matches!(
                    ($incoming, self.$field),
                    (Some(Some(incoming)), Some(current)) if incoming < current
                )
            };
        }

        older!(payload.state_timestamp, state_timestamp)
            || older!(payload.state_timestamp_utc, state_timestamp_utc)
            || older!(payload.online_timestamp, online_timestamp)
            || older!(payload.online_timestamp_utc, online_timestamp_utc)
    }
}

fn to_balance(payload: &crate::websocket::messages::BalancePayload) -> Option<Balance> {
    Some(Balance {
        value: payload.value?,
        currency: payload.cur.clone().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> StatePayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_absent_fields_retain_values() {
        let mut telemetry = Telemetry::default();
        telemetry.merge(&payload(serde_json::json!({"speed": 0, "fuel": 50})));

        let changed = telemetry.merge(&payload(serde_json::json!({"speed": 42})));

        assert_eq!(telemetry.speed, Some(42.0));
        assert_eq!(telemetry.fuel, Some(50.0));
        assert_eq!(changed, vec!["speed"]);
    }

    #[test]
    fn test_explicit_null_clears() {
        let mut telemetry = Telemetry::default();
        telemetry.merge(&payload(serde_json::json!({"fuel": 50})));

        let changed = telemetry.merge(&payload(serde_json::json!({"fuel": null})));

        assert_eq!(telemetry.fuel, None);
        assert_eq!(changed, vec!["fuel"]);
    }

    #[test]
    fn test_unchanged_value_not_reported() {
        let mut telemetry = Telemetry::default();
        telemetry.merge(&payload(serde_json::json!({"speed": 10})));

        let changed = telemetry.merge(&payload(serde_json::json!({"speed": 10})));
        assert!(changed.is_empty());
    }

    #[test]
    fn test_wire_key_mapping() {
        let mut telemetry = Telemetry::default();
        telemetry.merge(&payload(serde_json::json!({
            "x": 55.7, "y": 37.6, "rot": 90.0, "out_temp": -3,
            "cabin_temp": 18, "engine_temp": 84, "mileage_CAN": 1200.5
        })));

        assert_eq!(telemetry.latitude, Some(55.7));
        assert_eq!(telemetry.longitude, Some(37.6));
        assert_eq!(telemetry.bearing, Some(90.0));
        assert_eq!(telemetry.exterior_temperature, Some(-3.0));
        assert_eq!(telemetry.interior_temperature, Some(18.0));
        assert_eq!(telemetry.engine_temperature, Some(84.0));
        assert_eq!(telemetry.can_mileage, Some(1200.5));
    }

    #[test]
    fn test_lock_coordinates_scaled() {
        let mut telemetry = Telemetry::default();
        telemetry.merge(&payload(serde_json::json!({
            "lock_x": 55_750_000.0, "lock_y": 37_610_000.0
        })));

        assert_eq!(telemetry.lock_latitude, Some(55.75));
        assert_eq!(telemetry.lock_longitude, Some(37.61));
    }

    #[test]
    fn test_balance_decoded() {
        let mut telemetry = Telemetry::default();
        telemetry.merge(&payload(serde_json::json!({
            "balance": {"value": "250.50", "cur": "RUB"}
        })));

        assert_eq!(
            telemetry.balance,
            Some(Balance {
                value: 250.5,
                currency: "RUB".to_string()
            })
        );
    }

    #[test]
    fn test_timestamps_monotonic() {
        let mut telemetry = Telemetry::default();
        telemetry.merge(&payload(serde_json::json!({"state_utc": 1000})));

        // Older timestamp is ignored
        telemetry.merge(&payload(serde_json::json!({"state_utc": 900})));
        assert_eq!(telemetry.state_timestamp_utc, Some(1000));

        // Newer timestamp applies
        telemetry.merge(&payload(serde_json::json!({"state_utc": 1100})));
        assert_eq!(telemetry.state_timestamp_utc, Some(1100));
    }

    #[test]
    fn test_stale_frame_detection() {
        let mut telemetry = Telemetry::default();
        telemetry.merge(&payload(serde_json::json!({"state_utc": 1000, "online_utc": 1000})));

        assert!(telemetry.is_stale(&payload(serde_json::json!({"state_utc": 900}))));
        assert!(!telemetry.is_stale(&payload(serde_json::json!({"state_utc": 1000}))));
        assert!(!telemetry.is_stale(&payload(serde_json::json!({"speed": 5}))));
    }

    #[test]
    fn test_non_null_field_superset_over_prefixes() {
        // Without explicit nulls, the populated field set only grows
        let mut telemetry = Telemetry::default();
        let frames = [
            serde_json::json!({"speed": 1}),
            serde_json::json!({"fuel": 40}),
            serde_json::json!({"voltage": 12.6}),
            serde_json::json!({"speed": 2}),
        ];

        let mut populated_counts = Vec::new();
        for frame in frames {
            telemetry.merge(&payload(frame));
            let count = [
                telemetry.speed.is_some(),
                telemetry.fuel.is_some(),
                telemetry.voltage.is_some(),
            ]
            .iter()
            .filter(|&&p| p)
            .count();
            populated_counts.push(count);
        }

        assert!(populated_counts.windows(2).all(|w| w[0] <= w[1]));
    }
}
