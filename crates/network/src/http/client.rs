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

//! HTTP client implementation with a shared cookie jar and timeout support.

use std::{str::FromStr, sync::Arc, time::Duration};

use reqwest::{
    Method, Response, StatusCode, Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};

use super::HttpClientError;

/// An HTTP client whose requests share a single cookie jar.
///
/// Built on `reqwest` for async I/O. All requests carry the configured
/// default headers (notably `User-Agent`) and share the jar, so a session
/// cookie set by one response is presented on every subsequent request to
/// the same host. The client can be cloned cheaply; clones share the jar
/// and the connection pool.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    cookie_jar: Arc<reqwest::cookie::Jar>,
}

/// A decoded HTTP response: status code plus raw body bytes.
///
/// Status handling is left to the caller so protocol layers can classify
/// sentinel statuses (auth expiry markers) without losing the body.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// The response status code.
    pub status: StatusCode,
    /// The raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns the body interpreted as UTF-8, lossily.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl HttpClient {
    /// Creates a new [`HttpClient`] instance.
    ///
    /// # Errors
    ///
    /// Returns `ClientBuild` if a default header is malformed or building the
    /// underlying `reqwest::Client` fails.
    pub fn new(
        headers: Vec<(String, String)>,
        timeout: Option<Duration>,
    ) -> Result<Self, HttpClientError> {
        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let header_name = HeaderName::from_str(&key)
                .map_err(|e| HttpClientError::ClientBuild(format!("Invalid header '{key}': {e}")))?;
            let header_value = HeaderValue::from_str(&value).map_err(|e| {
                HttpClientError::ClientBuild(format!("Invalid header value '{value}': {e}"))
            })?;
            header_map.insert(header_name, header_value);
        }

        let cookie_jar = Arc::new(reqwest::cookie::Jar::default());

        let mut client_builder = reqwest::Client::builder()
            .default_headers(header_map)
            .cookie_provider(cookie_jar.clone())
            .tcp_nodelay(true);

        if let Some(timeout) = timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder
            .build()
            .map_err(|e| HttpClientError::ClientBuild(e.to_string()))?;

        Ok(Self { client, cookie_jar })
    }

    /// Adds a cookie to the jar for the given URL scope.
    ///
    /// Used to seed a previously persisted session before the first request.
    pub fn add_cookie(&self, cookie: &str, url: &Url) {
        self.cookie_jar.add_cookie_str(cookie, url);
    }

    /// Returns the serialized `Cookie` header value the jar would present
    /// for the URL, if any. Lets a WebSocket upgrade carry the same session
    /// cookies as the HTTP pipeline.
    #[must_use]
    pub fn cookie_header_for(&self, url: &Url) -> Option<String> {
        use reqwest::cookie::CookieStore;
        self.cookie_jar
            .cookies(url)
            .and_then(|value| value.to_str().map(ToOwned::to_owned).ok())
    }

    /// Sends an HTTP GET request.
    ///
    /// # Errors
    ///
    /// Returns an error if unable to send the request or it times out.
    pub async fn get(
        &self,
        url: String,
        query: Option<&[(String, String)]>,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, HttpClientError> {
        self.send_request(Method::GET, url, query, None, timeout)
            .await
    }

    /// Sends an HTTP POST request with a URL-encoded form body.
    ///
    /// # Errors
    ///
    /// Returns an error if the form cannot be encoded, the request cannot be
    /// sent, or it times out.
    pub async fn post_form(
        &self,
        url: String,
        form: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, HttpClientError> {
        let body = serde_urlencoded::to_string(form)
            .map_err(|e| HttpClientError::Request(format!("Failed to encode form: {e}")))?;
        self.send_request(Method::POST, url, None, Some(body), timeout)
            .await
    }

    async fn send_request(
        &self,
        method: Method,
        url: String,
        query: Option<&[(String, String)]>,
        form_body: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, HttpClientError> {
        let url = Url::parse(&url)
            .map_err(|e| HttpClientError::Request(format!("URL parse error: {e}")))?;

        let mut request_builder = self.client.request(method, url);

        if let Some(query) = query {
            request_builder = request_builder.query(query);
        }
        if let Some(timeout) = timeout {
            request_builder = request_builder.timeout(timeout);
        }
        if let Some(body) = form_body {
            request_builder = request_builder
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(body);
        }

        let request = request_builder.build().map_err(HttpClientError::from)?;
        log::trace!("{request:?}");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(HttpClientError::from)?;

        Self::to_response(response).await
    }

    async fn to_response(response: Response) -> Result<HttpResponse, HttpClientError> {
        log::trace!("{response:?}");
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(HttpClientError::from)?
            .to_vec();
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        Router,
        extract::Query,
        http::header::{COOKIE, SET_COOKIE},
        response::IntoResponse,
        routing::{get, post},
        serve,
    };
    use http::status::StatusCode;

    use super::*;

    fn create_router() -> Router {
        Router::new()
            .route("/get", get(|| async { "hello-world!" }))
            .route(
                "/query",
                get(
                    |Query(params): Query<std::collections::HashMap<String, String>>| async move {
                        params.get("ts").cloned().unwrap_or_default()
                    },
                ),
            )
            .route(
                "/form",
                post(|body: String| async move {
                    if body.contains("login=user") && body.contains("password=pass") {
                        StatusCode::OK
                    } else {
                        StatusCode::BAD_REQUEST
                    }
                }),
            )
            .route(
                "/set-cookie",
                get(|| async {
                    ([(SET_COOKIE, "sid=abc123; Path=/")], StatusCode::OK).into_response()
                }),
            )
            .route(
                "/needs-cookie",
                get(|headers: axum::http::HeaderMap| async move {
                    match headers.get(COOKIE) {
                        Some(value)
                            if value.to_str().unwrap_or_default().contains("sid=abc123") =>
                        {
                            StatusCode::OK
                        }
                        _ => StatusCode::UNAUTHORIZED,
                    }
                }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "eventually responded"
                }),
            )
    }

    async fn start_test_server() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            serve(listener, create_router()).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_get() {
        let addr = start_test_server().await;
        let client = HttpClient::new(vec![], None).unwrap();

        let response = client
            .get(format!("http://{addr}/get"), None, None)
            .await
            .unwrap();

        assert!(response.status.is_success());
        assert_eq!(response.body_text(), "hello-world!");
    }

    #[tokio::test]
    async fn test_get_with_query() {
        let addr = start_test_server().await;
        let client = HttpClient::new(vec![], None).unwrap();

        let query = vec![("ts".to_string(), "1700000000".to_string())];
        let response = client
            .get(format!("http://{addr}/query"), Some(&query), None)
            .await
            .unwrap();

        assert_eq!(response.body_text(), "1700000000");
    }

    #[tokio::test]
    async fn test_post_form() {
        let addr = start_test_server().await;
        let client = HttpClient::new(vec![], None).unwrap();

        let form = vec![
            ("login".to_string(), "user".to_string()),
            ("password".to_string(), "pass".to_string()),
        ];
        let response = client
            .post_form(format!("http://{addr}/form"), &form, None)
            .await
            .unwrap();

        assert!(response.status.is_success());
    }

    #[tokio::test]
    async fn test_cookie_jar_round_trip() {
        let addr = start_test_server().await;
        let client = HttpClient::new(vec![], None).unwrap();

        // Without the session cookie the protected route rejects us
        let response = client
            .get(format!("http://{addr}/needs-cookie"), None, None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        // The jar captures the cookie and presents it on the next request
        client
            .get(format!("http://{addr}/set-cookie"), None, None)
            .await
            .unwrap();
        let response = client
            .get(format!("http://{addr}/needs-cookie"), None, None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_timeout() {
        let addr = start_test_server().await;
        let client = HttpClient::new(vec![], None).unwrap();

        let result = client
            .get(
                format!("http://{addr}/slow"),
                None,
                Some(Duration::from_secs(1)),
            )
            .await;

        assert!(matches!(result, Err(HttpClientError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_default_headers() {
        let addr = start_test_server().await;
        let client = HttpClient::new(
            vec![("User-Agent".to_string(), "pandora-test/1.0".to_string())],
            None,
        )
        .unwrap();

        let response = client
            .get(format!("http://{addr}/get"), None, None)
            .await
            .unwrap();
        assert!(response.status.is_success());
    }
}
