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

//! Transport layer for the Pandora cloud client.
//!
//! Provides the HTTP request pipeline (cookie-jar backed, built on `reqwest`)
//! and a single-connection WebSocket dialer (built on `tokio-tungstenite`)
//! together with the exponential backoff helper used by reconnect loops.
//!
//! The crate is protocol-agnostic: it knows nothing about the Pandora wire
//! format. Session semantics, frame decoding and reconnect policy live in the
//! `pandora-cas` crate which composes these primitives.

pub mod backoff;
pub mod http;
pub mod websocket;
