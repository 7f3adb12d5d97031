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

//! Service constants and protocol defaults.

/// Production base URL of the Pandora cloud.
pub const PANDORA_BASE_URL: &str = "https://pro.p-on.ru";

/// Login endpoint (form fields `login`, `password`).
pub const PATH_LOGIN: &str = "/api/users/login";

/// Device directory endpoint.
pub const PATH_DEVICES: &str = "/api/devices";

/// Snapshot poll endpoint (`?ts=<last_ts>`).
pub const PATH_UPDATES: &str = "/api/updates";

/// Command submission endpoint (form fields `id`, `command`).
pub const PATH_COMMAND: &str = "/api/devices/command";

/// Device wake-up endpoint (form field `id`).
pub const PATH_WAKEUP: &str = "/api/devices/wakeup";

/// Event history endpoint.
pub const PATH_EVENTS: &str = "/api/lenta";

/// WebSocket streaming endpoint.
pub const PATH_WS_UPDATES: &str = "/api/v4/updates";

/// Default user agent presented on every request.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:115.0) Gecko/20100101 Firefox/115.0";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Default deadline for a submitted command to be acknowledged, in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Default snapshot polling interval in seconds.
pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 60;

/// Minimum accepted polling interval in seconds.
pub const MIN_POLLING_INTERVAL_SECS: u64 = 10;

/// Maximum accepted polling interval in seconds.
pub const MAX_POLLING_INTERVAL_SECS: u64 = 3600;

/// Delay before the one-shot snapshot poll scheduled after a successful
/// command, in seconds.
pub const POST_COMMAND_POLL_DELAY_SECS: u64 = 10;

/// Outbound ping cadence on the stream, in seconds.
pub const WS_HEARTBEAT_SECS: u64 = 30;

/// Silence tolerated after a ping before the stream is declared dead,
/// in seconds.
pub const WS_PONG_TIMEOUT_SECS: u64 = 10;

/// Initial reconnect backoff delay in seconds.
pub const RECONNECT_DELAY_INITIAL_SECS: u64 = 1;

/// Reconnect backoff ceiling in seconds.
pub const RECONNECT_DELAY_MAX_SECS: u64 = 120;

/// Stream uptime after which the reconnect backoff resets, in seconds.
pub const RECONNECT_STABLE_RESET_SECS: u64 = 60;

/// WebSocket close code signalling an expired session.
pub const WS_CLOSE_AUTH_EXPIRED: u16 = 4401;

/// Consecutive poll failures before the account reports `degraded`.
pub const POLL_FAILURES_BEFORE_DEGRADED: u32 = 10;

/// Consecutive `BadCredentials` refresh failures before the account closes.
pub const MAX_AUTH_REFRESH_FAILURES: u32 = 3;

/// Per-account ceiling on concurrently inflight HTTP calls.
pub const MAX_INFLIGHT_HTTP_REQUESTS: usize = 4;
