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

//! Enumerations for commands, events and account state.

use serde::{Deserialize, Serialize};

/// Remote command identifiers accepted by the unit.
///
/// The numeric id is authoritative on the wire; the variant name is a
/// convenience alias. Unknown ids are still submitted verbatim via
/// [`CommandId::Other`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CommandId {
    Lock,
    Unlock,
    StartEngine,
    StopEngine,
    DisableConnection,
    EnableTracking,
    EnableActiveSecurity,
    DisableActiveSecurity,
    TurnOnCoolantHeater,
    TurnOffCoolantHeater,
    TriggerHorn,
    TriggerLight,
    DisableTracking,
    TurnOnExtChannel,
    TurnOffExtChannel,
    TriggerTrunk,
    EnableServiceMode,
    DisableServiceMode,
    EnableStatusOutput,
    DisableStatusOutput,
    AdditionalCommand1,
    AdditionalCommand2,
    EnableConnection,
    Check,
    EraseDtc,
    ReadDtc,
    Nav12TurnOffCoolantHeater,
    Nav12TurnOnCoolantHeater,
    Nav12DisableStatusOutput,
    Nav12EnableStatusOutput,
    Nav12DisableServiceMode,
    Nav12EnableServiceMode,
    Nav12ResetErrors,
    /// Any identifier without a known alias, submitted as-is.
    Other(u32),
}

impl CommandId {
    /// Returns the wire identifier for the command.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Lock => 1,
            Self::Unlock => 2,
            Self::StartEngine => 4,
            Self::StopEngine => 8,
            Self::DisableConnection => 15,
            Self::EnableTracking => 16,
            Self::EnableActiveSecurity => 17,
            Self::DisableActiveSecurity => 18,
            Self::TurnOnCoolantHeater => 21,
            Self::TurnOffCoolantHeater => 22,
            Self::TriggerHorn => 23,
            Self::TriggerLight => 24,
            Self::DisableTracking => 32,
            Self::TurnOnExtChannel => 33,
            Self::TurnOffExtChannel => 34,
            Self::TriggerTrunk => 35,
            Self::EnableServiceMode => 40,
            Self::DisableServiceMode => 41,
            Self::EnableStatusOutput => 48,
            Self::DisableStatusOutput => 49,
            Self::AdditionalCommand1 => 100,
            Self::AdditionalCommand2 => 128,
            Self::EnableConnection => 240,
            Self::Check => 255,
            Self::Nav12TurnOffCoolantHeater => 57353,
            Self::Nav12TurnOnCoolantHeater => 57354,
            Self::Nav12DisableStatusOutput => 57371,
            Self::Nav12EnableStatusOutput => 57372,
            Self::Nav12DisableServiceMode => 57374,
            Self::Nav12EnableServiceMode => 57375,
            Self::Nav12ResetErrors => 57408,
            Self::EraseDtc => 57856,
            Self::ReadDtc => 57857,
            Self::Other(id) => id,
        }
    }

    /// Returns the symbolic alias for the command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::StartEngine => "start_engine",
            Self::StopEngine => "stop_engine",
            Self::DisableConnection => "disable_connection",
            Self::EnableTracking => "enable_tracking",
            Self::EnableActiveSecurity => "enable_active_security",
            Self::DisableActiveSecurity => "disable_active_security",
            Self::TurnOnCoolantHeater => "turn_on_coolant_heater",
            Self::TurnOffCoolantHeater => "turn_off_coolant_heater",
            Self::TriggerHorn => "trigger_horn",
            Self::TriggerLight => "trigger_light",
            Self::DisableTracking => "disable_tracking",
            Self::TurnOnExtChannel => "turn_on_ext_channel",
            Self::TurnOffExtChannel => "turn_off_ext_channel",
            Self::TriggerTrunk => "trigger_trunk",
            Self::EnableServiceMode => "enable_service_mode",
            Self::DisableServiceMode => "disable_service_mode",
            Self::EnableStatusOutput => "enable_status_output",
            Self::DisableStatusOutput => "disable_status_output",
            Self::AdditionalCommand1 => "additional_command_1",
            Self::AdditionalCommand2 => "additional_command_2",
            Self::EnableConnection => "enable_connection",
            Self::Check => "check",
            Self::Nav12TurnOffCoolantHeater => "nav12_turn_off_coolant_heater",
            Self::Nav12TurnOnCoolantHeater => "nav12_turn_on_coolant_heater",
            Self::Nav12DisableStatusOutput => "nav12_disable_status_output",
            Self::Nav12EnableStatusOutput => "nav12_enable_status_output",
            Self::Nav12DisableServiceMode => "nav12_disable_service_mode",
            Self::Nav12EnableServiceMode => "nav12_enable_service_mode",
            Self::Nav12ResetErrors => "nav12_reset_errors",
            Self::EraseDtc => "erase_dtc",
            Self::ReadDtc => "read_dtc",
            Self::Other(_) => "other",
        }
    }
}

impl From<u32> for CommandId {
    fn from(id: u32) -> Self {
        match id {
            1 => Self::Lock,
            2 => Self::Unlock,
            4 => Self::StartEngine,
            8 => Self::StopEngine,
            15 => Self::DisableConnection,
            16 => Self::EnableTracking,
            17 => Self::EnableActiveSecurity,
            18 => Self::DisableActiveSecurity,
            21 => Self::TurnOnCoolantHeater,
            22 => Self::TurnOffCoolantHeater,
            23 => Self::TriggerHorn,
            24 => Self::TriggerLight,
            32 => Self::DisableTracking,
            33 => Self::TurnOnExtChannel,
            34 => Self::TurnOffExtChannel,
            35 => Self::TriggerTrunk,
            40 => Self::EnableServiceMode,
            41 => Self::DisableServiceMode,
            48 => Self::EnableStatusOutput,
            49 => Self::DisableStatusOutput,
            100 => Self::AdditionalCommand1,
            128 => Self::AdditionalCommand2,
            240 => Self::EnableConnection,
            255 => Self::Check,
            57353 => Self::Nav12TurnOffCoolantHeater,
            57354 => Self::Nav12TurnOnCoolantHeater,
            57371 => Self::Nav12DisableStatusOutput,
            57372 => Self::Nav12EnableStatusOutput,
            57374 => Self::Nav12DisableServiceMode,
            57375 => Self::Nav12EnableServiceMode,
            57408 => Self::Nav12ResetErrors,
            57856 => Self::EraseDtc,
            57857 => Self::ReadDtc,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.as_u32())
    }
}

/// Primary event codes reported by the unit.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[repr(u16)]
pub enum PrimaryEventId {
    Unknown = 0,
    LockingEnabled = 1,
    LockingDisabled = 2,
    Alert = 3,
    EngineStarted = 4,
    EngineStopped = 5,
    EngineLocked = 6,
    ServiceModeEnabled = 7,
    SettingsChanged = 8,
    Refuel = 9,
    Collision = 10,
    GsmConnection = 11,
    EmergencyCall = 12,
    FailedStartAttempt = 13,
    TrackingEnabled = 14,
    TrackingDisabled = 15,
    SystemPowerLoss = 16,
    SecureTrunkOpen = 17,
    FactoryTesting = 18,
    PowerDip = 19,
    CheckReceived = 20,
    SystemLogin = 29,
    ActiveSecurityEnabled = 32,
    ActiveSecurityDisabled = 33,
    ActiveSecurityAlert = 34,
    BlockHeaterEnabled = 35,
    BlockHeaterDisabled = 36,
    RoughRoadConditions = 37,
    Driving = 38,
    EngineRunningProlongation = 40,
    ServiceModeDisabled = 41,
    GsmChannelEnabled = 42,
    GsmChannelDisabled = 43,
    NavStatus = 48,
    DtcReadRequest = 166,
    DtcReadError = 167,
    DtcReadActive = 168,
    DtcEraseRequest = 169,
    DtcEraseActive = 170,
    SystemMessage = 176,
    EcoModeEnabled = 177,
    EcoModeDisabled = 178,
    TirePressureLow = 179,
    BluetoothStatus = 220,
    TagRequirementEnabled = 230,
    TagRequirementDisabled = 231,
    TagPollingEnabled = 232,
    TagPollingDisabled = 233,
    Point = 250,
}

impl PrimaryEventId {
    /// Returns the stable symbolic name used as `event_type` on the event
    /// bus. Unmapped codes yield `"unknown"`; the raw codes remain in the
    /// payload.
    #[must_use]
    pub const fn event_type(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::LockingEnabled => "locking_enabled",
            Self::LockingDisabled => "locking_disabled",
            Self::Alert => "alert",
            Self::EngineStarted => "engine_started",
            Self::EngineStopped => "engine_stopped",
            Self::EngineLocked => "engine_locked",
            Self::ServiceModeEnabled => "service_mode_enabled",
            Self::SettingsChanged => "settings_changed",
            Self::Refuel => "refuel",
            Self::Collision => "collision",
            Self::GsmConnection => "gsm_connection",
            Self::EmergencyCall => "emergency_call",
            Self::FailedStartAttempt => "failed_start_attempt",
            Self::TrackingEnabled => "tracking_enabled",
            Self::TrackingDisabled => "tracking_disabled",
            Self::SystemPowerLoss => "system_power_loss",
            Self::SecureTrunkOpen => "secure_trunk_open",
            Self::FactoryTesting => "factory_testing",
            Self::PowerDip => "power_dip",
            Self::CheckReceived => "check_received",
            Self::SystemLogin => "system_login",
            Self::ActiveSecurityEnabled => "active_security_enabled",
            Self::ActiveSecurityDisabled => "active_security_disabled",
            Self::ActiveSecurityAlert => "active_security_alert",
            Self::BlockHeaterEnabled => "block_heater_enabled",
            Self::BlockHeaterDisabled => "block_heater_disabled",
            Self::RoughRoadConditions => "rough_road_conditions",
            Self::Driving => "driving",
            Self::EngineRunningProlongation => "engine_running_prolongation",
            Self::ServiceModeDisabled => "service_mode_disabled",
            Self::GsmChannelEnabled => "gsm_channel_enabled",
            Self::GsmChannelDisabled => "gsm_channel_disabled",
            Self::NavStatus => "nav_status",
            Self::DtcReadRequest => "dtc_read_request",
            Self::DtcReadError => "dtc_read_error",
            Self::DtcReadActive => "dtc_read_active",
            Self::DtcEraseRequest => "dtc_erase_request",
            Self::DtcEraseActive => "dtc_erase_active",
            Self::SystemMessage => "system_message",
            Self::EcoModeEnabled => "eco_mode_enabled",
            Self::EcoModeDisabled => "eco_mode_disabled",
            Self::TirePressureLow => "tire_pressure_low",
            Self::BluetoothStatus => "bluetooth_status",
            Self::TagRequirementEnabled => "tag_requirement_enabled",
            Self::TagRequirementDisabled => "tag_requirement_disabled",
            Self::TagPollingEnabled => "tag_polling_enabled",
            Self::TagPollingDisabled => "tag_polling_disabled",
            Self::Point => "point",
        }
    }

    /// Returns a human-readable title for the event.
    #[must_use]
    pub fn title(self) -> String {
        let name = self.event_type();
        let mut title = String::with_capacity(name.len());
        for (i, part) in name.split('_').enumerate() {
            if i > 0 {
                title.push(' ');
            }
            if i == 0 {
                let mut chars = part.chars();
                if let Some(first) = chars.next() {
                    title.extend(first.to_uppercase());
                    title.push_str(chars.as_str());
                }
            } else {
                title.push_str(part);
            }
        }
        title
    }
}

impl From<u16> for PrimaryEventId {
    fn from(code: u16) -> Self {
        match code {
            1 => Self::LockingEnabled,
            2 => Self::LockingDisabled,
            3 => Self::Alert,
            4 => Self::EngineStarted,
            5 => Self::EngineStopped,
            6 => Self::EngineLocked,
            7 => Self::ServiceModeEnabled,
            8 => Self::SettingsChanged,
            9 => Self::Refuel,
            10 => Self::Collision,
            11 => Self::GsmConnection,
            12 => Self::EmergencyCall,
            13 => Self::FailedStartAttempt,
            14 => Self::TrackingEnabled,
            15 => Self::TrackingDisabled,
            16 => Self::SystemPowerLoss,
            17 => Self::SecureTrunkOpen,
            18 => Self::FactoryTesting,
            19 => Self::PowerDip,
            20 => Self::CheckReceived,
            29 => Self::SystemLogin,
            32 => Self::ActiveSecurityEnabled,
            33 => Self::ActiveSecurityDisabled,
            34 => Self::ActiveSecurityAlert,
            35 => Self::BlockHeaterEnabled,
            36 => Self::BlockHeaterDisabled,
            37 => Self::RoughRoadConditions,
            38 => Self::Driving,
            40 => Self::EngineRunningProlongation,
            41 => Self::ServiceModeDisabled,
            42 => Self::GsmChannelEnabled,
            43 => Self::GsmChannelDisabled,
            48 => Self::NavStatus,
            166 => Self::DtcReadRequest,
            167 => Self::DtcReadError,
            168 => Self::DtcReadActive,
            169 => Self::DtcEraseRequest,
            170 => Self::DtcEraseActive,
            176 => Self::SystemMessage,
            177 => Self::EcoModeEnabled,
            178 => Self::EcoModeDisabled,
            179 => Self::TirePressureLow,
            220 => Self::BluetoothStatus,
            230 => Self::TagRequirementEnabled,
            231 => Self::TagRequirementDisabled,
            232 => Self::TagPollingEnabled,
            233 => Self::TagPollingDisabled,
            250 => Self::Point,
            _ => Self::Unknown,
        }
    }
}

/// Secondary codes qualifying an [`PrimaryEventId::Alert`] event.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[repr(u16)]
pub enum AlertType {
    Battery = 1,
    ExtSensorWarningZone = 2,
    ExtSensorMainZone = 3,
    CrackSensorWarningZone = 4,
    CrackSensorMainZone = 5,
    BrakePedalPressed = 6,
    HandbrakeEngaged = 7,
    InclineDetected = 8,
    MovementDetected = 9,
    EngineIgnition = 10,
}

impl AlertType {
    /// Returns a human-readable title for the alert, `None` for unmapped
    /// codes.
    #[must_use]
    pub fn title_for(code: u16) -> Option<&'static str> {
        Some(match code {
            1 => "Battery",
            2 => "Exterior sensor warning zone",
            3 => "Exterior sensor main zone",
            4 => "Crack sensor warning zone",
            5 => "Crack sensor main zone",
            6 => "Brake pedal pressed",
            7 => "Handbrake engaged",
            8 => "Incline detected",
            9 => "Movement detected",
            10 => "Engine ignition",
            _ => return None,
        })
    }
}

/// Hardware family reported in the device directory.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Alarm,
    Nav8,
    Nav12,
    #[serde(other)]
    Unknown,
}

/// Capability flags decoded from the device directory's `features` map.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Features(u32);

impl Features {
    pub const ACTIVE_SECURITY: Self = Self(1 << 0);
    pub const AUTO_CHECK: Self = Self(1 << 1);
    pub const AUTO_START: Self = Self(1 << 2);
    pub const BEEPER: Self = Self(1 << 3);
    pub const BLUETOOTH: Self = Self(1 << 4);
    pub const EXT_CHANNEL: Self = Self(1 << 5);
    pub const NETWORK: Self = Self(1 << 6);
    pub const CUSTOM_PHONES: Self = Self(1 << 7);
    pub const EVENTS: Self = Self(1 << 8);
    pub const EXTENDED_PROPERTIES: Self = Self(1 << 9);
    pub const BLOCK_HEATER: Self = Self(1 << 10);
    pub const KEEP_ALIVE: Self = Self(1 << 11);
    pub const LIGHT_TOGGLE: Self = Self(1 << 12);
    pub const NOTIFICATIONS: Self = Self(1 << 13);
    pub const SCHEDULE: Self = Self(1 << 14);
    pub const SENSORS: Self = Self(1 << 15);
    pub const TRACKING: Self = Self(1 << 16);
    pub const TRUNK_TRIGGER: Self = Self(1 << 17);
    pub const NAV: Self = Self(1 << 18);

    /// Decodes the directory's `features` key set into a flag word.
    #[must_use]
    pub fn from_attributes(features: &serde_json::Map<String, serde_json::Value>) -> Self {
        const KEYS: &[(&str, Features)] = &[
            ("active_security", Features::ACTIVE_SECURITY),
            ("auto_check", Features::AUTO_CHECK),
            ("autostart", Features::AUTO_START),
            ("beep", Features::BEEPER),
            ("bluetooth", Features::BLUETOOTH),
            ("channel", Features::EXT_CHANNEL),
            ("connection", Features::NETWORK),
            ("custom_phones", Features::CUSTOM_PHONES),
            ("events", Features::EVENTS),
            ("extend_props", Features::EXTENDED_PROPERTIES),
            ("heater", Features::BLOCK_HEATER),
            ("keep_alive", Features::KEEP_ALIVE),
            ("light", Features::LIGHT_TOGGLE),
            ("notification", Features::NOTIFICATIONS),
            ("schedule", Features::SCHEDULE),
            ("sensors", Features::SENSORS),
            ("tracking", Features::TRACKING),
            ("trunk", Features::TRUNK_TRIGGER),
            ("nav", Features::NAV),
        ];

        let mut result = Self::default();
        for (key, flag) in KEYS {
            if features.contains_key(*key) {
                result.0 |= flag.0;
            }
        }
        result
    }

    /// Returns `true` when the capability is present.
    #[must_use]
    pub const fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Returns `true` when no capability is present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// User-visible account health.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Start sequence in progress.
    #[default]
    Initialising,
    /// Authenticated, stream and poller healthy.
    Ok,
    /// Operational with a persistent fault (e.g. a run of poll failures).
    Degraded(String),
    /// Credentials were rejected repeatedly; the account is terminal.
    AuthFailure,
    /// Closed by the caller or after a terminal failure.
    Closed,
}

/// Terminal result of a submitted command.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    /// The unit acknowledged the command (`result == 0`).
    Ok,
    /// The unit rejected the command; the reply code conveys detail.
    Failure(i64),
    /// No reply arrived before the deadline.
    Timeout,
    /// The account closed while the command was outstanding.
    Cancelled,
}

impl CommandOutcome {
    /// Returns `true` for the acknowledged outcome.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1, CommandId::Lock)]
    #[case(4, CommandId::StartEngine)]
    #[case(255, CommandId::Check)]
    #[case(240, CommandId::EnableConnection)]
    #[case(57857, CommandId::ReadDtc)]
    fn test_command_id_round_trip(#[case] id: u32, #[case] expected: CommandId) {
        assert_eq!(CommandId::from(id), expected);
        assert_eq!(expected.as_u32(), id);
    }

    #[test]
    fn test_unknown_command_id_preserved() {
        let command = CommandId::from(1234);
        assert_eq!(command, CommandId::Other(1234));
        assert_eq!(command.as_u32(), 1234);
    }

    #[rstest]
    #[case(1, "locking_enabled")]
    #[case(4, "engine_started")]
    #[case(34, "active_security_alert")]
    #[case(9999, "unknown")]
    fn test_event_codifier(#[case] code: u16, #[case] expected: &str) {
        assert_eq!(PrimaryEventId::from(code).event_type(), expected);
    }

    #[test]
    fn test_event_title() {
        assert_eq!(PrimaryEventId::EngineStarted.title(), "Engine started");
        assert_eq!(PrimaryEventId::Alert.title(), "Alert");
    }

    #[test]
    fn test_features_from_attributes() {
        let json = serde_json::json!({"autostart": 1, "heater": 1, "tracking": 1});
        let features = Features::from_attributes(json.as_object().unwrap());
        assert!(features.contains(Features::AUTO_START));
        assert!(features.contains(Features::BLOCK_HEATER));
        assert!(features.contains(Features::TRACKING));
        assert!(!features.contains(Features::BLUETOOTH));
    }

    #[test]
    fn test_device_type_decode() {
        let device_type: DeviceType = serde_json::from_str("\"nav8\"").unwrap();
        assert_eq!(device_type, DeviceType::Nav8);
        let device_type: DeviceType = serde_json::from_str("\"mystery\"").unwrap();
        assert_eq!(device_type, DeviceType::Unknown);
    }
}
