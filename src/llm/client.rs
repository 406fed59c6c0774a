//! Client for the OpenAI-compatible stack.
//!
//! One `StackClient` serves every endpoint this crate consumes: response
//! generation, moderation, model listing and vector-store listing. It wraps
//! a `reqwest::Client` and is safe to share across concurrent calls.

use crate::config::Settings;
use crate::llm::http_utils::{create_http_client, get_json_request, send_json_request};
use crate::llm::{
    LlmError, ModelEntry, ModerationProvider, ModerationResult, ProviderResponse, ResponseRequest,
    ResponsesProvider,
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Client for the stack's HTTP APIs.
pub struct StackClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

/// One vector store as reported by the stack.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VectorStoreEntry {
    /// Store identifier.
    pub id: Option<String>,
    /// Human-readable store name.
    pub name: Option<String>,
    /// Creation time (unix seconds); newest store wins on name collisions.
    pub created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DataList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct ModerationsResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

impl StackClient {
    /// Create a client from process settings and an effective timeout.
    #[must_use]
    pub fn new(settings: &Settings, timeout_secs: u64) -> Self {
        Self::from_parts(settings.base_url(), settings.stack_api_key.clone(), timeout_secs)
    }

    /// Create a client from explicit connection parts.
    #[must_use]
    pub fn from_parts(base_url: String, api_key: String, timeout_secs: u64) -> Self {
        Self {
            http: create_http_client(timeout_secs),
            base_url,
            api_key,
        }
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    /// List the vector stores the stack serves.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::NetworkError` on connectivity issues,
    /// `LlmError::ApiError` on non-success status codes, or
    /// `LlmError::JsonError` if parsing fails.
    pub async fn list_vector_stores(&self) -> Result<Vec<VectorStoreEntry>, LlmError> {
        let url = format!("{}/v1/openai/v1/vector_stores", self.base_url);
        let value = get_json_request(&self.http, &url, Some(&self.auth())).await?;
        let parsed: DataList<VectorStoreEntry> =
            serde_json::from_value(value).map_err(|e| LlmError::JsonError(e.to_string()))?;
        Ok(parsed.data)
    }
}

#[async_trait::async_trait]
impl ResponsesProvider for StackClient {
    async fn create_response(
        &self,
        request: ResponseRequest,
    ) -> Result<ProviderResponse, LlmError> {
        let url = format!("{}/v1/responses", self.base_url);
        let body =
            serde_json::to_value(&request).map_err(|e| LlmError::JsonError(e.to_string()))?;

        debug!(
            model = %request.model,
            messages = request.input.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "Sending responses request to stack"
        );

        let value = send_json_request(&self.http, &url, &body, Some(&self.auth())).await?;
        serde_json::from_value(value).map_err(|e| LlmError::JsonError(e.to_string()))
    }

    async fn list_models(&self) -> Result<Vec<ModelEntry>, LlmError> {
        let url = format!("{}/v1/models", self.base_url);
        let value = get_json_request(&self.http, &url, Some(&self.auth())).await?;
        let parsed: DataList<ModelEntry> =
            serde_json::from_value(value).map_err(|e| LlmError::JsonError(e.to_string()))?;
        Ok(parsed.data)
    }
}

#[async_trait::async_trait]
impl ModerationProvider for StackClient {
    async fn moderate(
        &self,
        input: &str,
        shield_model: &str,
    ) -> Result<ModerationResult, LlmError> {
        let url = format!("{}/v1/moderations", self.base_url);
        let body = json!({
            "input": input,
            "model": shield_model,
        });

        let value = send_json_request(&self.http, &url, &body, Some(&self.auth())).await?;
        let parsed: ModerationsResponse =
            serde_json::from_value(value).map_err(|e| LlmError::JsonError(e.to_string()))?;

        // An empty result list means the shield had nothing to say.
        Ok(parsed.results.into_iter().next().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vector_store_list_parsing() {
        let parsed: DataList<VectorStoreEntry> = serde_json::from_value(json!({
            "data": [
                {"id": "vs_1", "name": "HR-Policies-kb-1a2b3c4d", "created_at": 1700000000},
                {"id": "vs_2"}
            ]
        }))
        .expect("lenient parsing");
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].id.as_deref(), Some("vs_1"));
        assert!(parsed.data[1].name.is_none());
    }

    #[test]
    fn moderation_result_parsing() {
        let parsed: ModerationsResponse = serde_json::from_value(json!({
            "results": [{
                "flagged": true,
                "categories": {"violence": true, "hate": false},
                "category_scores": {"violence": 0.97},
                "user_message": "I cannot help with that."
            }]
        }))
        .expect("lenient parsing");
        let result = parsed.results.first().expect("one result");
        assert!(result.flagged);
        assert_eq!(result.categories.get("violence"), Some(&true));
        assert_eq!(result.user_message.as_deref(), Some("I cannot help with that."));

        let empty: ModerationsResponse =
            serde_json::from_value(json!({})).expect("tolerates absent results");
        assert!(empty.results.is_empty());
    }
}
