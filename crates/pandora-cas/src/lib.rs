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

//! Session and streaming layer for the Pandora/PanDECT vehicle-alarm cloud.
//!
//! The crate authenticates a user account, discovers the vehicles attached
//! to it, maintains a live view of each vehicle's telemetry and accessory
//! state, dispatches remote commands, and emits a stream of typed domain
//! events. Truth is reconstructed from three transport surfaces: HTTP
//! snapshot polls, a long-lived WebSocket delivering incremental frames,
//! and HTTP command submission with asynchronous completion reported over
//! the WebSocket.
//!
//! [`account::Account`] is the composition root: one instance per
//! credential pair, owning the authenticator, stream handler, poller and
//! commander for that session.

pub mod account;
pub mod auth;
pub mod commander;
pub mod common;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod poller;
pub mod websocket;

pub use account::Account;
pub use config::AccountConfig;
pub use error::PandoraError;
