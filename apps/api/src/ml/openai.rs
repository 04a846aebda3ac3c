use super::{Embedder, LanguageModel};
use crate::{
    config::Config,
    error::{ApiError, Result},
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const MAX_TEXT_PREVIEW_LENGTH: usize = 100;

/// Client for an OpenAI-compatible API, used for both embeddings and chat completions.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
    completion_model: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(MAX_TEXT_PREVIEW_LENGTH) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

impl OpenAiClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        embedding_model: &str,
        completion_model: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ApiError::ConfigError("OpenAI API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            embedding_model: embedding_model.to_string(),
            completion_model: completion_model.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.openai_api_key,
            &config.openai_base_url,
            &config.embedding_model,
            &config.completion_model,
            config.request_timeout(),
            config.connect_timeout(),
        )
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        error!("OpenAI API returned {}: {}", status, text);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::ExternalServiceError(
                "Authentication failed. Please check your OpenAI API key.".to_string(),
            ),
            StatusCode::TOO_MANY_REQUESTS => ApiError::ExternalServiceError(
                "Rate limit exceeded. Reduce the request rate or raise the embed delay."
                    .to_string(),
            ),
            StatusCode::NOT_FOUND => {
                ApiError::ExternalServiceError(format!("Model or endpoint not found: {}", text))
            }
            _ => ApiError::ExternalServiceError(format!(
                "OpenAI API returned non-success status: {} - {}",
                status, text
            )),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(
            "Embedding text (length: {}): {}",
            text.len(),
            preview(text)
        );

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };

        let response: EmbeddingResponse = self.post("embeddings", &request).await?.json().await?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                ApiError::ExternalServiceError("Embedding response contained no vector".to_string())
            })?;

        debug!("Got embedding of size {}", embedding.len());
        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.completion_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response: ChatResponse = self
            .post("chat/completions", &request)
            .await?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ApiError::ExternalServiceError("Completion response contained no message".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_api_key() {
        let result = OpenAiClient::new(
            "  ",
            "https://api.openai.com/v1",
            "text-embedding-3-small",
            "gpt-4",
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(ApiError::ConfigError(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = OpenAiClient::new(
            "sk-test",
            "http://localhost:8080/v1/",
            "text-embedding-3-small",
            "gpt-4",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert_eq!(client.model_name(), "text-embedding-3-small");
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let text = "é".repeat(150);
        assert_eq!(preview(&text).chars().count(), MAX_TEXT_PREVIEW_LENGTH);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_chat_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"[{\"name\":\"A\",\"reason\":\"b\"}]"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some(r#"[{"name":"A","reason":"b"}]"#)
        );
    }
}
