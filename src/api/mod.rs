//! HTTP client for the employee and auth APIs with a consistent timeout and error
//! policy. Endpoint helpers live in `auth` and `employees`; this module owns request
//! setup and response handling. Tokens are passed in by callers and only ever
//! attached as headers.

pub mod auth;
pub mod employees;
mod errors;
mod types;

pub use errors::ApiError;
pub use types::{
    AuthResponse, Employee, EmployeeInput, EmployeePatch, Employer, RefreshResponse,
};

use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Default request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters surfaced to the user.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Builds a client for `base_url` with the given request timeout.
    ///
    /// # Errors
    /// Returns an error if the URL is not an absolute http(s) URL or the HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|err| ApiError::Config(format!("Invalid API URL {base_url}: {err}")))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ApiError::Config(format!(
                    "Unsupported API URL scheme: {scheme}"
                )))
            }
        }

        if parsed.host().is_none() {
            return Err(ApiError::Config("API URL has no host".to_string()));
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: parsed.to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(build_url_with_base(&self.base_url, path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(build_url_with_base(&self.base_url, path))
    }

    pub(crate) fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(build_url_with_base(&self.base_url, path))
    }

    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(build_url_with_base(&self.base_url, path))
    }
}

pub(crate) fn with_bearer(builder: RequestBuilder, token: &SecretString) -> RequestBuilder {
    builder.bearer_auth(token.expose_secret())
}

/// Sends a request and parses a JSON response body.
pub(crate) async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
    let response = builder.send().await.map_err(map_request_error)?;
    handle_json_response(response).await
}

/// Sends a request whose successful response body is ignored.
pub(crate) async fn send_empty(builder: RequestBuilder) -> Result<(), ApiError> {
    let response = builder.send().await.map_err(map_request_error)?;
    handle_empty_response(response).await
}

/// Joins a base URL and a path with exactly one slash between them.
fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Maps transport errors into `ApiError` variants with timeout detection.
fn map_request_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout("Request timed out. Please try again.".to_string())
    } else {
        ApiError::Network(format!("Unable to reach the server: {err}"))
    }
}

async fn handle_json_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Parse(format!("Failed to decode response: {err}")))
    } else {
        Err(http_error(response).await)
    }
}

async fn handle_empty_response(response: Response) -> Result<(), ApiError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(http_error(response).await)
    }
}

async fn http_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    debug!(status, "API request failed");
    ApiError::Http {
        status,
        message: error_message(&body),
    }
}

/// Prefers the `error` field of a JSON error body, otherwise the raw body.
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        json.get("error")
            .or_else(|| json.get("message"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
    });

    sanitize_body(from_json.as_deref().unwrap_or(body))
}

/// Trims and truncates error bodies for user-facing messages.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
