//! Gemini API client (generateContent, non-streaming).

use crate::config::LlmConfig;
use crate::llm::{LlmError, ReplyGenerator};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Finish reasons for which the candidate text is not usable.
const BLOCKED_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
    "OTHER",
];

/// Client for the Gemini generateContent API.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("gemini request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gemini api error: {0}")]
    Api(String),
    #[error("gemini returned no usable text: {0}")]
    Empty(String),
}

impl GeminiClient {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self::with_http_client(api_key, model, base_url, reqwest::Client::new())
    }

    fn with_http_client(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self {
            base_url,
            api_key,
            model,
            client,
        }
    }

    /// Build from config. Requires `llm.apiKey` (GEMINI_API_KEY).
    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("llm.apiKey (GEMINI_API_KEY) is not configured")?;
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("building gemini http client")?;
        Ok(Self::with_http_client(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
            client,
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST /v1beta/models/{model}:generateContent with `text` as the single user turn.
    pub async fn generate(&self, text: &str) -> Result<String, GeminiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(text.to_string()),
                }],
            }],
        };
        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(GeminiError::Api(format!("{} {}", status, body)));
        }
        let data: GenerateContentResponse = res.json().await?;
        data.text()
    }
}

#[async_trait]
impl ReplyGenerator for GeminiClient {
    async fn reply(&self, text: &str) -> Result<String, LlmError> {
        self.generate(text).await.map_err(|e| {
            log::error!("there was an error querying the LLM: {}", e);
            LlmError::Query
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Result<String, GeminiError> {
        let Some(candidate) = self.candidates.first() else {
            let reason = self
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone())
                .map(|r| format!("prompt blocked ({})", r))
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(GeminiError::Empty(reason));
        };
        if let Some(reason) = candidate.finish_reason.as_deref() {
            if BLOCKED_FINISH_REASONS.contains(&reason) {
                return Err(GeminiError::Empty(format!("response blocked ({})", reason)));
            }
        }
        Ok(candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::Server) -> GeminiClient {
        GeminiClient::new(
            "test-key".to_string(),
            Some("test-model".to_string()),
            Some(format!("{}/", server.url())),
        )
    }

    #[test]
    fn defaults_model_when_blank() {
        let c = GeminiClient::new("k".to_string(), Some("  ".to_string()), None);
        assert_eq!(c.model(), DEFAULT_MODEL);
    }

    #[test]
    fn from_config_requires_api_key() {
        assert!(GeminiClient::from_config(&LlmConfig::default()).is_err());
        let config = LlmConfig {
            api_key: Some("k".to_string()),
            timeout_secs: Some(5),
            ..Default::default()
        };
        assert!(GeminiClient::from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn generate_sends_single_user_turn() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/test-model:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::Json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Hello" }] }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{
                        "content": { "role": "model", "parts": [{ "text": "Hi " }, { "text": "there!" }] },
                        "finishReason": "STOP"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let reply = client(&server).generate("Hello").await.unwrap();
        assert_eq!(reply, "Hi there!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/test-model:generateContent")
            .with_status(429)
            .with_body("quota exceeded")
            .create_async()
            .await;

        let err = client(&server).generate("Hello").await.unwrap_err();
        assert!(matches!(err, GeminiError::Api(ref m) if m.contains("429") && m.contains("quota")));
    }

    #[tokio::test]
    async fn blocked_prompt_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/test-model:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "promptFeedback": { "blockReason": "SAFETY" } }).to_string())
            .create_async()
            .await;

        let err = client(&server).generate("Hello").await.unwrap_err();
        assert!(matches!(err, GeminiError::Empty(ref m) if m.contains("SAFETY")));
    }

    #[tokio::test]
    async fn safety_finish_reason_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/test-model:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "candidates": [{ "finishReason": "SAFETY" }] }).to_string())
            .create_async()
            .await;

        assert!(client(&server).generate("Hello").await.is_err());
    }

    #[tokio::test]
    async fn reply_hides_error_detail() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/test-model:generateContent")
            .with_status(500)
            .with_body("internal detail")
            .create_async()
            .await;

        let err = client(&server).reply("Hello").await.unwrap_err();
        assert_eq!(err.to_string(), "LLM query error");
    }
}
