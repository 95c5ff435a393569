// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the clinic messaging REST API.
//!
//! Provides [`ClinicClient`] which handles URL construction, bearer
//! authentication, status mapping, and a single retry of transient errors
//! on idempotent requests.

use std::time::Duration;

use molarisse_config::MolarisseConfig;
use molarisse_core::MolarisseError;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::ApiErrorBody;

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Longest server error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Clone)]
pub struct ClinicClient {
    client: reqwest::Client,
    /// `{base_url}{api_prefix}`, without a trailing slash.
    origin: String,
    timeout: Duration,
    max_retries: u32,
}

impl ClinicClient {
    /// Build a client rooted at `origin`, e.g. `http://clinic:8080/api/v1/api`.
    pub fn new(
        origin: &str,
        token: Option<&SecretString>,
        timeout: Duration,
    ) -> Result<Self, MolarisseError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| MolarisseError::Config(format!("invalid auth token header value: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| MolarisseError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
            timeout,
            max_retries: 1,
        })
    }

    pub fn from_config(config: &MolarisseConfig) -> Result<Self, MolarisseError> {
        let origin = format!(
            "{}{}",
            config.api.base_url.trim_end_matches('/'),
            config.api.api_prefix
        );
        let token = config.api.auth_token.clone().map(SecretString::from);
        Self::new(
            &origin,
            token.as_ref(),
            Duration::from_secs(config.api.request_timeout_secs),
        )
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Request builder for `path` under the API origin.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{path}", self.origin))
    }

    /// Send and decode a JSON body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, MolarisseError> {
        let response = self.send(request).await?;
        let body = response.text().await.map_err(|e| MolarisseError::Decode {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        serde_json::from_str(&body).map_err(|e| MolarisseError::Decode {
            message: format!("failed to parse response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Send and discard the body.
    pub async fn send_empty(&self, request: RequestBuilder) -> Result<(), MolarisseError> {
        self.send(request).await.map(|_| ())
    }

    /// Send, mapping non-success statuses to [`MolarisseError::Status`].
    ///
    /// GET and other idempotent requests are retried once after a transient
    /// status (429, 502, 503, 504). Sends are never retried.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, MolarisseError> {
        let mut request = request;
        let mut attempt = 0;
        loop {
            let retry = if attempt < self.max_retries && is_idempotent(&request) {
                request.try_clone()
            } else {
                None
            };

            let response = request.send().await.map_err(|e| self.transport_error(e))?;
            let status = response.status();
            debug!(status = %status, url = %response.url().path(), attempt, "response received");

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) {
                if let Some(next) = retry {
                    warn!(status = %status, attempt, "transient error, will retry");
                    tokio::time::sleep(RETRY_DELAY).await;
                    request = next;
                    attempt += 1;
                    continue;
                }
            }

            return Err(MolarisseError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> MolarisseError {
        if e.is_timeout() {
            MolarisseError::Timeout {
                duration: self.timeout,
            }
        } else {
            MolarisseError::Transport {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            }
        }
    }
}

fn is_idempotent(request: &RequestBuilder) -> bool {
    // A builder that cannot be cloned also cannot be inspected; treat it as
    // non-idempotent.
    request
        .try_clone()
        .and_then(|r| r.build().ok())
        .is_some_and(|r| {
            let method = r.method();
            *method == Method::GET || *method == Method::PUT || *method == Method::DELETE
        })
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 502 | 503 | 504)
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(api) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = api.describe() {
            return message.to_string();
        }
    }
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_client(uri: &str) -> ClinicClient {
        ClinicClient::new(
            &format!("{uri}/api/v1/api/"),
            Some(&SecretString::from("jwt-test")),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sends_bearer_token_under_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/api/messages/unread/count"))
            .and(header("authorization", "Bearer jwt-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("4"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let count: u64 = client
            .send_json(client.request(Method::GET, "/messages/unread/count"))
            .await
            .unwrap();
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn get_retries_once_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/api/messages/conversations"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/api/messages/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let rows: Vec<serde_json::Value> = client
            .send_json(client.request(Method::GET, "/messages/conversations"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn post_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/api/messages"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .send_empty(client.request(Method::POST, "/messages"))
            .await
            .unwrap_err();
        assert!(matches!(err, MolarisseError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn server_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/api/messages/9"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({"message": "Not your message"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .send_empty(client.request(Method::DELETE, "/messages/9"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "server returned 403: Not your message");
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/api/users/3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .send_json::<serde_json::Value>(client.request(Method::GET, "/users/3"))
            .await
            .unwrap_err();
        assert!(matches!(err, MolarisseError::Decode { .. }));
    }

    #[test]
    fn empty_error_body_uses_reason_phrase() {
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
        assert_eq!(error_message(StatusCode::BAD_REQUEST, "plain text"), "plain text");
    }
}
