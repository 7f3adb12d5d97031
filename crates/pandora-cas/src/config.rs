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

//! Account configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::common::consts::{
    DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_POLLING_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_USER_AGENT, MAX_POLLING_INTERVAL_SECS, MIN_POLLING_INTERVAL_SECS, PANDORA_BASE_URL,
};

/// Per-device behaviour toggles, keyed by device id in the account
/// configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeviceOptions {
    /// Present fuel readings as liters instead of percent.
    #[serde(default)]
    pub fuel_is_liters: bool,
    /// Present mileage in miles instead of kilometers.
    #[serde(default)]
    pub mileage_miles: bool,
    /// Present CAN mileage in miles instead of kilometers.
    #[serde(default)]
    pub mileage_can_miles: bool,
    /// Treat an offline unit as unavailable rather than last-known.
    #[serde(default)]
    pub offline_as_unavailable: bool,
    /// Ignore coordinates carried on stream frames (some units report
    /// garbage positions over the socket while HTTP snapshots are sane).
    #[serde(default)]
    pub ignore_ws_coordinates: bool,
}

/// Configuration for one account session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account username (required).
    pub username: String,
    /// Account password (required).
    pub password: String,
    /// User agent presented on every HTTP and WebSocket request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Base URL of the service; override for testing.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Snapshot polling interval in seconds, clamped to 10–3600.
    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,
    /// Deadline for a submitted command to be acknowledged, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Per-device behaviour toggles, keyed by device id.
    #[serde(default)]
    pub device_options: HashMap<u64, DeviceOptions>,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_base_url() -> String {
    PANDORA_BASE_URL.to_string()
}

const fn default_polling_interval_secs() -> u64 {
    DEFAULT_POLLING_INTERVAL_SECS
}

const fn default_command_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl AccountConfig {
    /// Creates a configuration with defaults for everything but the
    /// credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            user_agent: default_user_agent(),
            base_url: default_base_url(),
            polling_interval_secs: default_polling_interval_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            device_options: HashMap::new(),
        }
    }

    /// Returns the options for a device, defaulted when not configured.
    #[must_use]
    pub fn device_options(&self, device_id: u64) -> DeviceOptions {
        self.device_options
            .get(&device_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the polling interval clamped to the accepted range.
    #[must_use]
    pub fn effective_polling_interval_secs(&self) -> u64 {
        self.polling_interval_secs
            .clamp(MIN_POLLING_INTERVAL_SECS, MAX_POLLING_INTERVAL_SECS)
    }

    /// Returns the WebSocket URL derived from the base URL.
    #[must_use]
    pub fn ws_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!(
            "{}{}",
            ws_base.trim_end_matches('/'),
            crate::common::consts::PATH_WS_UPDATES
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = AccountConfig::new("user", "pass");
        assert_eq!(config.base_url, PANDORA_BASE_URL);
        assert_eq!(config.polling_interval_secs, 60);
        assert_eq!(config.command_timeout_secs, 30);
        assert!(config.user_agent.contains("Firefox"));
    }

    #[rstest]
    #[case(5, 10)]
    #[case(60, 60)]
    #[case(10_000, 3600)]
    fn test_polling_interval_clamped(#[case] configured: u64, #[case] effective: u64) {
        let config = AccountConfig {
            polling_interval_secs: configured,
            ..AccountConfig::new("user", "pass")
        };
        assert_eq!(config.effective_polling_interval_secs(), effective);
    }

    #[test]
    fn test_ws_url_scheme_mapping() {
        let config = AccountConfig {
            base_url: "https://pro.p-on.ru".to_string(),
            ..AccountConfig::new("user", "pass")
        };
        assert_eq!(config.ws_url(), "wss://pro.p-on.ru/api/v4/updates");

        let config = AccountConfig {
            base_url: "http://127.0.0.1:8080".to_string(),
            ..AccountConfig::new("user", "pass")
        };
        assert_eq!(config.ws_url(), "ws://127.0.0.1:8080/api/v4/updates");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: AccountConfig =
            serde_json::from_str(r#"{"username": "u", "password": "p"}"#).unwrap();
        assert_eq!(config.username, "u");
        assert_eq!(config.polling_interval_secs, 60);
        assert!(config.device_options.is_empty());
    }

    #[test]
    fn test_device_options_map() {
        let config: AccountConfig = serde_json::from_str(
            r#"{
                "username": "u",
                "password": "p",
                "device_options": {"1234": {"ignore_ws_coordinates": true}}
            }"#,
        )
        .unwrap();
        assert!(config.device_options(1234).ignore_ws_coordinates);
        assert!(!config.device_options(1234).fuel_is_liters);
        assert!(!config.device_options(5678).ignore_ws_coordinates);
    }
}
