//! Thin OpenAI-compatible HTTP client used to reach a local model backend
//! (e.g. LM Studio, Ollama's OpenAI-compatible endpoint, vLLM).
//!
//! Judge-specific behavior (prompt construction, verdict parsing,
//! hallucination detection, fallback) lives in [`crate::judge`]; this
//! module only knows how to list models and run one chat completion.

use std::time::Duration;

use crate::models::{ChatRequest, ChatResponse, Model, ModelsResponse};
use crate::{DEFAULT_BACKEND_URL, LlmError, Result};

/// Client for an OpenAI-compatible `/v1` completion API.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
}

impl LlmClient {
    /// Build a client against `base_url` with the given request timeout.
    /// Does not eagerly contact the server — connectivity is verified
    /// lazily on the first call, so a backend that is temporarily down at
    /// startup does not prevent the classifier from booting.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn with_default_url(timeout: Duration) -> Self {
        Self::new(DEFAULT_BACKEND_URL, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the list of models the backend currently serves.
    pub async fn fetch_models(&self) -> Result<Vec<Model>> {
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            let models_resp: ModelsResponse = response.json().await?;
            Ok(models_resp.data)
        } else {
            Err(LlmError::BackendError(format!(
                "failed to fetch models: {}",
                response.status()
            )))
        }
    }

    /// Send a single chat completion request. Callers (the judge) are
    /// responsible for applying the request-level timeout budget; this
    /// method itself races against the client's configured timeout.
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(LlmError::BackendError(format!(
                "chat completion failed: {status} - {body}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    #[tokio::test]
    async fn fetch_models_happy_path() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/models"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_raw(
                    serde_json::json!({
                        "object": "list",
                        "data": [
                            {"id": "qwen2.5-3b-instruct", "object": "model", "owned_by": "local", "created": 0},
                            {"id": "text-embedding-nomic", "object": "model", "owned_by": "local", "created": 0}
                        ]
                    })
                    .to_string(),
                    "application/json",
                ),
            )
            .mount(&server)
            .await;

        let client = LlmClient::new(server.uri(), Duration::from_secs(5));
        let models = client.fetch_models().await.expect("fetch models");
        assert_eq!(models.len(), 2);
    }

    #[tokio::test]
    async fn chat_completion_happy_path() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_raw(
                    serde_json::json!({
                        "id": "chatcmpl-1",
                        "object": "chat.completion",
                        "created": 0,
                        "model": "test-model",
                        "choices": [{
                            "index": 0,
                            "message": {"role": "assistant", "content": "{\"verdict\":\"SAFE\",\"reason\":\"ok\"}"},
                            "finish_reason": "stop"
                        }]
                    })
                    .to_string(),
                    "application/json",
                ),
            )
            .mount(&server)
            .await;

        let client = LlmClient::new(server.uri(), Duration::from_secs(5));
        let request = ChatRequest::new("test-model", vec![ChatMessage::user("hi")]);
        let response = client.chat_completion(&request).await.expect("chat completion");
        assert!(response.content().unwrap().contains("SAFE"));
    }

    #[tokio::test]
    async fn backend_error_surfaces_status() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/models"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = LlmClient::new(server.uri(), Duration::from_secs(5));
        let err = client.fetch_models().await.unwrap_err();
        assert!(err.to_string().contains("failed to fetch models"));
    }
}
