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

//! Typed client for the Pandora HTTP endpoints.

use std::{sync::Arc, time::Duration};

use pandora_network::http::{HttpClient, HttpResponse};
use serde_json::Value;
use tokio::sync::Semaphore;

use super::{
    PandoraHttpError,
    models::{
        CommandResponse, DeviceAttributes, LoginResponse, UpdatesResponse, WakeupResponse,
    },
};
use crate::{
    common::consts::{
        MAX_INFLIGHT_HTTP_REQUESTS, PATH_COMMAND, PATH_DEVICES, PATH_EVENTS, PATH_LOGIN,
        PATH_UPDATES, PATH_WAKEUP,
    },
    config::AccountConfig,
    model::events::TrackingEvent,
};

/// Typed HTTP client for one account session.
///
/// All requests share the underlying cookie jar, so the session cookie set
/// by [`PandoraHttpClient::login`] authenticates every subsequent call.
/// Concurrency is bounded by a per-account semaphore so a burst of
/// commands cannot starve the connection pool.
#[derive(Clone, Debug)]
pub struct PandoraHttpClient {
    http: HttpClient,
    base_url: String,
    request_timeout: Duration,
    inflight: Arc<Semaphore>,
}

impl PandoraHttpClient {
    /// Creates a client from the account configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be built.
    pub fn new(config: &AccountConfig) -> Result<Self, PandoraHttpError> {
        let http = HttpClient::new(
            vec![("User-Agent".to_string(), config.user_agent.clone())],
            Some(Duration::from_secs(config.request_timeout_secs)),
        )?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            inflight: Arc::new(Semaphore::new(MAX_INFLIGHT_HTTP_REQUESTS)),
        })
    }

    async fn acquire_slot(&self) -> tokio::sync::SemaphorePermit<'_> {
        self.inflight
            .acquire()
            .await
            .expect("inflight semaphore closed")
    }

    /// Returns the `Cookie` header the jar would present for the service
    /// host, for use on the WebSocket upgrade.
    #[must_use]
    pub fn session_cookie_header(&self) -> Option<String> {
        let url = reqwest::Url::parse(&self.base_url).ok()?;
        self.http.cookie_header_for(&url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Decodes a response into JSON, classifying sentinel statuses.
    ///
    /// Mirrors the upstream contract: a 400–403 status is an auth
    /// rejection whatever the body says; other non-success statuses are
    /// classified with the body's status marker attached when present.
    fn handle_json(response: &HttpResponse) -> Result<Value, PandoraHttpError> {
        let decoded: Result<Value, _> = serde_json::from_slice(&response.body);

        let marker = decoded
            .as_ref()
            .ok()
            .and_then(|data| {
                data.get("error_text")
                    .or_else(|| data.get("status"))
                    .or_else(|| data.get("action_result"))
            })
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });

        let status = response.status.as_u16();
        if (400..=403).contains(&status) {
            return Err(PandoraHttpError::AuthRejected(
                marker.unwrap_or_else(|| "unknown auth error".to_string()),
            ));
        }
        if response.status.is_server_error() {
            return Err(PandoraHttpError::Upstream {
                status,
                detail: marker.unwrap_or_default(),
            });
        }
        if !response.status.is_success() {
            return Err(PandoraHttpError::UnexpectedStatus {
                status,
                detail: marker.unwrap_or_default(),
            });
        }

        decoded.map_err(|e| PandoraHttpError::Malformed(format!("bad JSON encoding: {e}")))
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, PandoraHttpError> {
        serde_json::from_value(value)
            .map_err(|e| PandoraHttpError::Malformed(format!("unexpected shape: {e}")))
    }

    /// Exchanges credentials for a session cookie.
    ///
    /// # Errors
    ///
    /// Returns `AuthRejected` on a sentinel status, `Malformed` when the
    /// body cannot be decoded, or a transport error.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginResponse, PandoraHttpError> {
        log::debug!("Logging in user '{username}'");

        let _permit = self.acquire_slot().await;
        let form = vec![
            ("login".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
            ("lang".to_string(), "ru".to_string()),
            ("v".to_string(), "3".to_string()),
            ("utc_offset".to_string(), "0".to_string()),
        ];
        let response = self
            .http
            .post_form(self.url(PATH_LOGIN), &form, Some(self.request_timeout))
            .await?;

        let data = Self::handle_json(&response)?;
        let login: LoginResponse = Self::decode(data)?;
        log::info!("Login successful (user_id={})", login.user_id);
        Ok(login)
    }

    /// Fetches the device directory.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, sentinel status or a
    /// malformed body.
    pub async fn fetch_devices(&self) -> Result<Vec<DeviceAttributes>, PandoraHttpError> {
        log::debug!("Retrieving devices");
        let _permit = self.acquire_slot().await;
        let response = self
            .http
            .get(self.url(PATH_DEVICES), None, Some(self.request_timeout))
            .await?;

        let data = Self::handle_json(&response)?;
        if !data.is_array() {
            return Err(PandoraHttpError::Malformed(
                "devices response is not a list".to_string(),
            ));
        }
        Self::decode(data)
    }

    /// Fetches the latest snapshot of changes since `ts`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, sentinel status or a
    /// malformed body.
    pub async fn request_updates(&self, ts: i64) -> Result<UpdatesResponse, PandoraHttpError> {
        log::debug!("Fetching changes since {ts}");
        let _permit = self.acquire_slot().await;
        let query = vec![("ts".to_string(), ts.to_string())];
        let response = self
            .http
            .get(
                self.url(PATH_UPDATES),
                Some(&query),
                Some(self.request_timeout),
            )
            .await?;

        let data = Self::handle_json(&response)?;
        if !data.is_object() {
            return Err(PandoraHttpError::Malformed(
                "updates response is not a mapping".to_string(),
            ));
        }
        Self::decode(data)
    }

    /// Submits a remote command for a device.
    ///
    /// HTTP acceptance only means the cloud queued the command; completion
    /// is reported asynchronously over the stream.
    ///
    /// # Errors
    ///
    /// Returns `Api` when the cloud refuses the submission, or the usual
    /// transport/status/parse classifications.
    pub async fn remote_command(
        &self,
        device_id: u64,
        command_id: u32,
    ) -> Result<(), PandoraHttpError> {
        log::info!("Sending command {command_id} to device {device_id}");

        let _permit = self.acquire_slot().await;
        let form = vec![
            ("id".to_string(), device_id.to_string()),
            ("command".to_string(), command_id.to_string()),
        ];
        let response = self
            .http
            .post_form(self.url(PATH_COMMAND), &form, Some(self.request_timeout))
            .await?;

        let data = Self::handle_json(&response)?;
        let command_response: CommandResponse = Self::decode(data)?;
        if !command_response.is_sent(device_id) {
            let detail = command_response
                .status
                .or_else(|| {
                    command_response
                        .action_result
                        .and_then(|m| m.get(&device_id.to_string()).cloned())
                })
                .unwrap_or_else(|| "unknown error".to_string());
            log::error!("Error sending command {command_id} to device {device_id}: {detail}");
            return Err(PandoraHttpError::Api(detail));
        }

        log::info!("Command {command_id} sent to device {device_id}");
        Ok(())
    }

    /// Sends a wake-up request to a device.
    ///
    /// # Errors
    ///
    /// Returns `Api` when the cloud reports failure, or the usual
    /// transport/status/parse classifications.
    pub async fn wake_up_device(&self, device_id: u64) -> Result<(), PandoraHttpError> {
        log::info!("Waking up device {device_id}");

        let _permit = self.acquire_slot().await;
        let form = vec![("id".to_string(), device_id.to_string())];
        let response = self
            .http
            .post_form(self.url(PATH_WAKEUP), &form, Some(self.request_timeout))
            .await?;

        let data = Self::handle_json(&response)?;
        let wakeup: WakeupResponse = Self::decode(data)?;
        if wakeup.status.as_deref() != Some("success") {
            return Err(PandoraHttpError::Api(
                wakeup.status.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }

    /// Fetches historical events in `[timestamp_from, timestamp_to]`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, sentinel status or a
    /// malformed body.
    pub async fn fetch_events(
        &self,
        timestamp_from: i64,
        timestamp_to: i64,
        limit: u32,
        device_id: Option<u64>,
    ) -> Result<Vec<TrackingEvent>, PandoraHttpError> {
        log::debug!("Fetching events between {timestamp_from} and {timestamp_to}");

        let _permit = self.acquire_slot().await;
        let mut query = vec![
            ("from".to_string(), timestamp_from.to_string()),
            ("to".to_string(), timestamp_to.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        if let Some(device_id) = device_id {
            query.push(("id".to_string(), device_id.to_string()));
        }

        let response = self
            .http
            .get(
                self.url(PATH_EVENTS),
                Some(&query),
                Some(self.request_timeout),
            )
            .await?;

        let data = Self::handle_json(&response)?;
        let lenta = data.get("lenta").and_then(Value::as_array).cloned();

        let mut events = Vec::new();
        for entry in lenta.unwrap_or_default() {
            let Some(obj) = entry.get("obj") else {
                continue;
            };
            match serde_json::from_value(obj.clone()) {
                Ok(payload) => {
                    if let Some(event) = TrackingEvent::from_payload(&payload) {
                        events.push(event);
                    }
                }
                Err(e) => log::warn!("Skipping malformed event entry: {e}"),
            }
        }
        log::debug!("Received {} events", events.len());
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use pandora_network::http::HttpResponse;
    use reqwest::StatusCode;

    use super::*;

    fn response(status: StatusCode, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_auth_sentinel_status() {
        let result = PandoraHttpClient::handle_json(&response(
            StatusCode::FORBIDDEN,
            r#"{"error_text": "sid-expired"}"#,
        ));
        assert!(matches!(
            result,
            Err(PandoraHttpError::AuthRejected(detail)) if detail == "sid-expired"
        ));
    }

    #[test]
    fn test_auth_sentinel_without_body() {
        let result =
            PandoraHttpClient::handle_json(&response(StatusCode::UNAUTHORIZED, "not json"));
        assert!(matches!(
            result,
            Err(PandoraHttpError::AuthRejected(detail)) if detail == "unknown auth error"
        ));
    }

    #[test]
    fn test_server_error_classified_upstream() {
        let result = PandoraHttpClient::handle_json(&response(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"status": "maintenance"}"#,
        ));
        assert!(matches!(
            result,
            Err(PandoraHttpError::Upstream { status: 503, detail }) if detail == "maintenance"
        ));
    }

    #[test]
    fn test_malformed_body_on_success_status() {
        let result = PandoraHttpClient::handle_json(&response(StatusCode::OK, "][ not json"));
        assert!(matches!(result, Err(PandoraHttpError::Malformed(_))));
    }

    #[test]
    fn test_success_decoded() {
        let value = PandoraHttpClient::handle_json(&response(
            StatusCode::OK,
            r#"{"user_id": 42}"#,
        ))
        .unwrap();
        assert_eq!(value["user_id"], serde_json::json!(42));
    }
}
