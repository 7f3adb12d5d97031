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

//! Bitfield words and their expansion into named booleans.
//!
//! The unit reports boolean vehicle state as two packed words: `bit_state`
//! (64-bit, core alarm state) and `can_bit_state` (32-bit, CAN-derived
//! accessory state). Bits are positive assertions, so an incoming word
//! always replaces the stored one wholesale; OR-merging would resurrect
//! cleared bits.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// A named bit position inside a state word.
pub type BitMap = &'static [(&'static str, u8)];

/// Bit positions of the 64-bit `bit_state` word.
pub const BIT_STATE_MAP: BitMap = &[
    ("armed", 0),
    ("alarm", 1),
    ("engine_running", 2),
    ("ignition", 3),
    ("autostart_active", 4),
    ("hands_free_locking", 5),
    ("hands_free_unlocking", 6),
    ("gsm_active", 7),
    ("gps_active", 8),
    ("tracking_enabled", 9),
    ("engine_locked", 10),
    ("ext_sensor_alert_zone", 11),
    ("ext_sensor_main_zone", 12),
    ("sensor_alert_zone", 13),
    ("sensor_main_zone", 14),
    ("autostart_enabled", 15),
    ("incoming_sms_enabled", 16),
    ("incoming_calls_enabled", 17),
    ("exterior_lights_active", 18),
    ("siren_warnings_enabled", 19),
    ("siren_sound_enabled", 20),
    ("door_front_left_open", 21),
    ("door_front_right_open", 22),
    ("door_back_left_open", 23),
    ("door_back_right_open", 24),
    ("trunk_open", 25),
    ("hood_open", 26),
    ("handbrake_engaged", 27),
    ("brakes_engaged", 28),
    ("block_heater_active", 29),
    ("active_security_enabled", 30),
    ("block_heater_enabled", 31),
    ("evacuation_mode_active", 33),
    ("service_mode_active", 34),
    ("stay_home_active", 35),
    ("security_tags_ignored", 60),
    ("security_tags_enforced", 61),
];

/// Bit positions of the 32-bit `can_bit_state` word.
pub const CAN_BIT_STATE_MAP: BitMap = &[
    ("seat_taken", 0),
    ("tpms_low_front_left", 1),
    ("tpms_low_front_right", 2),
    ("tpms_low_back_left", 3),
    ("tpms_low_back_right", 4),
    ("tpms_low_reserve", 5),
    ("glass_driver_open", 6),
    ("glass_passenger_open", 7),
    ("glass_back_left_open", 8),
    ("glass_back_right_open", 9),
    ("belt_driver", 10),
    ("belt_passenger", 11),
    ("belt_back_left", 12),
    ("belt_back_right", 13),
    ("belt_back_center", 14),
    ("low_liquid", 15),
    ("pads_wear", 16),
    ("ev_charging_connected", 17),
    ("ev_charging_slow", 18),
    ("ev_charging_fast", 19),
    ("ev_ready", 20),
];

/// Expands a packed state word into a name-to-boolean map.
#[must_use]
pub fn expand_bits(bits: u64, map: BitMap) -> AHashMap<&'static str, bool> {
    map.iter()
        .map(|&(name, position)| (name, bits & (1u64 << position) != 0))
        .collect()
}

/// The 64-bit core alarm state word.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BitState(pub u64);

impl BitState {
    const fn bit(self, position: u8) -> bool {
        self.0 & (1u64 << position) != 0
    }

    /// Locking mechanism engaged.
    #[must_use]
    pub const fn is_armed(self) -> bool {
        self.bit(0)
    }

    /// Alarm triggered.
    #[must_use]
    pub const fn is_alarm_active(self) -> bool {
        self.bit(1)
    }

    /// Engine currently running.
    #[must_use]
    pub const fn is_engine_running(self) -> bool {
        self.bit(2)
    }

    /// Ignition switched on.
    #[must_use]
    pub const fn is_ignition_on(self) -> bool {
        self.bit(3)
    }

    /// Tracking enabled.
    #[must_use]
    pub const fn is_tracking_enabled(self) -> bool {
        self.bit(9)
    }

    /// Any door open.
    #[must_use]
    pub const fn is_any_door_open(self) -> bool {
        self.0 & (0b1111 << 21) != 0
    }

    /// Trunk open.
    #[must_use]
    pub const fn is_trunk_open(self) -> bool {
        self.bit(25)
    }

    /// Hood open.
    #[must_use]
    pub const fn is_hood_open(self) -> bool {
        self.bit(26)
    }

    /// Handbrake engaged.
    #[must_use]
    pub const fn is_handbrake_engaged(self) -> bool {
        self.bit(27)
    }

    /// Block (coolant) heater active.
    #[must_use]
    pub const fn is_block_heater_active(self) -> bool {
        self.bit(29)
    }

    /// Active security engaged.
    #[must_use]
    pub const fn is_active_security_enabled(self) -> bool {
        self.bit(30)
    }

    /// Service mode active.
    #[must_use]
    pub const fn is_service_mode_active(self) -> bool {
        self.bit(34)
    }

    /// Expands the word into a name-to-boolean map.
    #[must_use]
    pub fn expand(self) -> AHashMap<&'static str, bool> {
        expand_bits(self.0, BIT_STATE_MAP)
    }
}

/// The 32-bit CAN-derived accessory state word.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CanBitState(pub u32);

impl CanBitState {
    const fn bit(self, position: u8) -> bool {
        self.0 & (1u32 << position) != 0
    }

    /// Driver seat occupied.
    #[must_use]
    pub const fn is_seat_taken(self) -> bool {
        self.bit(0)
    }

    /// Low pressure reported for any tire.
    #[must_use]
    pub const fn is_any_tpms_low(self) -> bool {
        self.0 & (0b11111 << 1) != 0
    }

    /// EV charger plugged in.
    #[must_use]
    pub const fn is_ev_charging_connected(self) -> bool {
        self.bit(17)
    }

    /// Expands the word into a name-to-boolean map.
    #[must_use]
    pub fn expand(self) -> AHashMap<&'static str, bool> {
        expand_bits(u64::from(self.0), CAN_BIT_STATE_MAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_armed_bit() {
        let state = BitState(0x01);
        assert!(state.is_armed());
        assert!(!state.is_engine_running());

        let expanded = state.expand();
        assert_eq!(expanded["armed"], true);
        assert_eq!(expanded["engine_running"], false);
    }

    #[test]
    fn test_door_bits() {
        // Front-left door is bit 21
        let state = BitState(1 << 21);
        assert!(state.is_any_door_open());
        assert_eq!(state.expand()["door_front_left_open"], true);

        let closed = BitState(0);
        assert!(!closed.is_any_door_open());
    }

    #[test]
    fn test_high_bits() {
        let state = BitState((1 << 34) | (1 << 60));
        assert!(state.is_service_mode_active());
        let expanded = state.expand();
        assert_eq!(expanded["service_mode_active"], true);
        assert_eq!(expanded["security_tags_ignored"], true);
        assert_eq!(expanded["security_tags_enforced"], false);
    }

    #[test]
    fn test_can_bits() {
        let state = CanBitState((1 << 2) | (1 << 17));
        assert!(state.is_any_tpms_low());
        assert!(state.is_ev_charging_connected());
        assert!(!state.is_seat_taken());

        let expanded = state.expand();
        assert_eq!(expanded["tpms_low_front_right"], true);
        assert_eq!(expanded["ev_charging_connected"], true);
    }

    #[test]
    fn test_expand_covers_whole_map() {
        let expanded = expand_bits(0, BIT_STATE_MAP);
        assert_eq!(expanded.len(), BIT_STATE_MAP.len());
        assert!(expanded.values().all(|&v| !v));
    }

    #[test]
    fn test_replacement_semantics() {
        // A fresh word replaces the previous one; cleared bits stay cleared
        let previous = BitState(0b111);
        let next = BitState(0b001);
        assert!(previous.is_engine_running());
        assert!(!next.is_engine_running());
        assert!(next.is_armed());
    }
}
