//! REST client for the finance backend.
//!
//! Four endpoints: register, login, fetch the caller's finance document,
//! replace it. Any non-success response becomes a structured
//! [`ConnectError::Api`] carrying the HTTP status and a best-effort message
//! extracted from the body.

use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use haushalt_core::finance::{parse_document_value, FinanceData};

use crate::error::{ConnectError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Bearer token returned by register/login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

/// Client for the finance backend REST API.
#[derive(Debug, Clone)]
pub struct FinanceApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl FinanceApiClient {
    /// Create a new API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the backend (e.g., "http://127.0.0.1:8000")
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn bearer_headers(&self, token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ConnectError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);
        Ok(headers)
    }

    /// Best-effort error message: a JSON body with a `detail` field yields
    /// that detail, other JSON bodies are stringified, non-JSON bodies pass
    /// through as raw text.
    fn error_message(body: &str) -> String {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => match value.get("detail") {
                Some(detail) => detail.to_string(),
                None => value.to_string(),
            },
            Err(_) => body.to_string(),
        }
    }

    /// Read the body, turning any non-success status into an API error.
    async fn ensure_ok(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            debug!("API response status: {}", status);
            return Ok(body);
        }
        debug!("API response error ({}): {}", status, body);
        Err(ConnectError::api(
            status.as_u16(),
            Self::error_message(&body),
        ))
    }

    /// Extract the `data` field of a document envelope. Missing or null
    /// `data`, or an unrecognized document version, counts as "no document".
    fn parse_envelope(body: &str) -> Result<Option<FinanceData>> {
        let value: Value = serde_json::from_str(body)?;
        match value.get("data") {
            Some(data) if !data.is_null() => Ok(parse_document_value(data.clone())),
            _ => Ok(None),
        }
    }

    /// Register a new account.
    ///
    /// POST /auth/register
    pub async fn register(&self, email: &str, password: &str) -> Result<AuthToken> {
        let url = format!("{}/auth/register", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CredentialsBody { email, password })
            .send()
            .await?;
        let body = Self::ensure_ok(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Log into an existing account.
    ///
    /// POST /auth/login
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken> {
        let url = format!("{}/auth/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CredentialsBody { email, password })
            .send()
            .await?;
        let body = Self::ensure_ok(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch the caller's finance document. `None` when the backend holds
    /// no usable document yet.
    ///
    /// GET /v1/finance/me
    pub async fn get_document(&self, token: &str) -> Result<Option<FinanceData>> {
        let url = format!("{}/v1/finance/me", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(self.bearer_headers(token)?)
            .send()
            .await?;
        let body = Self::ensure_ok(response).await?;
        Self::parse_envelope(&body)
    }

    /// Replace the caller's finance document wholesale. Returns the stored
    /// document as echoed by the backend.
    ///
    /// PUT /v1/finance/me
    pub async fn put_document(&self, token: &str, data: &FinanceData) -> Result<Option<FinanceData>> {
        let url = format!("{}/v1/finance/me", self.base_url);
        let response = self
            .client
            .put(&url)
            .headers(self.bearer_headers(token)?)
            .json(&serde_json::json!({ "data": data }))
            .send()
            .await?;
        let body = Self::ensure_ok(response).await?;
        Self::parse_envelope(&body)
    }
}
