use super::prompt::{build_messages, mock_response};
use super::{ChatMessage, CompletionBackend, CompletionRequest, ProviderError};
use crate::config::ProviderConfig;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.7;

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

/// Chat-completion client for an OpenAI-compatible endpoint.
///
/// Without an API key it answers every request with a labelled mock string
/// so the assistant stays usable offline.
pub struct CompletionClient {
    config: ProviderConfig,
    http: Client,
}

impl CompletionClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = config.http_client()?;
        Ok(Self { config, http })
    }

    pub async fn chat(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let Some(api_key) = self.config.api_key() else {
            tracing::info!("Completion API key not configured, returning mock response");
            return Ok(mock_response(request));
        };

        let messages = build_messages(request);
        let body = OpenAiRequest {
            model: &self.config.model,
            messages: &messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.config.endpoint()))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let text = resp.text().await?;
        parse_completion(&text)
    }
}

impl CompletionBackend for CompletionClient {
    fn generate_chat_response<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        self.chat(request).boxed()
    }
}

fn parse_completion(body: &str) -> Result<String, ProviderError> {
    let data: OpenAiResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;
    data.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::Parse("response has no message content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(api_key: Option<&str>, endpoint: Option<String>) -> CompletionClient {
        CompletionClient::new(ProviderConfig {
            api_key: api_key.map(String::from),
            endpoint,
            model: "gpt-3.5-turbo".into(),
            timeout: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn without_key_returns_mock() {
        let client = client(None, None);
        let request = CompletionRequest::new("What is the LVR limit?", "Credit Report/File");

        let response = client.chat(&request).await.unwrap();
        assert!(response.starts_with("Mock response for query: \"What is the LVR limit?\""));
        assert!(response.contains("Credit Report/File"));
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("Authorization", "Bearer sk-test")
                    .body_contains("\"max_tokens\":500")
                    .body_contains("Qudos rates");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "choices": [{ "message": { "role": "assistant", "content": "**Qudos** fits best." } }]
                    }));
            })
            .await;

        let client = client(Some("sk-test"), Some(server.base_url()));
        let request = CompletionRequest::new("Cheapest at 60% LVR?", "Qudos rates");
        let response = client.generate_chat_response(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response, "**Qudos** fits best.");
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(429).body("rate limited");
            })
            .await;

        let client = client(Some("sk-test"), Some(server.base_url()));
        let err = client
            .chat(&CompletionRequest::new("q", "ctx"))
            .await
            .unwrap_err();

        match err {
            ProviderError::Api { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "choices": [] }));
            })
            .await;

        let client = client(Some("sk-test"), Some(server.base_url()));
        let err = client
            .chat(&CompletionRequest::new("q", "ctx"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn parse_completion_rejects_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(matches!(parse_completion(body), Err(ProviderError::Parse(_))));
        assert!(matches!(parse_completion("not json"), Err(ProviderError::Parse(_))));
    }
}
