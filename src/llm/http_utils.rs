//! HTTP utilities for the stack client.
//!
//! Provides common request/response handling so the endpoint wrappers in
//! `client` stay free of transport plumbing.

use crate::llm::LlmError;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

/// Creates an HTTP client configured with the given request timeout.
///
/// The timeout prevents infinite hangs when the stack is slow or
/// unresponsive.
#[must_use]
pub fn create_http_client(timeout_secs: u64) -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Sends an HTTP POST request with a JSON body and returns the parsed JSON
/// response.
///
/// # Errors
///
/// Returns `LlmError::NetworkError` on connectivity issues,
/// `LlmError::ApiError` on non-success status codes, or
/// `LlmError::JsonError` if parsing fails.
pub async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
    auth_header: Option<&str>,
) -> Result<Value, LlmError> {
    let mut request = client.post(url).json(body);

    if let Some(auth) = auth_header {
        request = request.header("Authorization", auth);
    }

    let response = request
        .send()
        .await
        .map_err(|e| LlmError::NetworkError(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(LlmError::ApiError(format!("{status} - {error_text}")));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::JsonError(e.to_string()))
}

/// Sends an HTTP GET request and returns the parsed JSON response.
///
/// # Errors
///
/// Returns `LlmError::NetworkError` on connectivity issues,
/// `LlmError::ApiError` on non-success status codes, or
/// `LlmError::JsonError` if parsing fails.
pub async fn get_json_request(
    client: &HttpClient,
    url: &str,
    auth_header: Option<&str>,
) -> Result<Value, LlmError> {
    let mut request = client.get(url);

    if let Some(auth) = auth_header {
        request = request.header("Authorization", auth);
    }

    let response = request
        .send()
        .await
        .map_err(|e| LlmError::NetworkError(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(LlmError::ApiError(format!("{status} - {error_text}")));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::JsonError(e.to_string()))
}
