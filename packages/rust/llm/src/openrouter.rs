//! OpenAI-compatible chat-completions client (OpenRouter by default).

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use articleforge_shared::{AppConfig, ArticleForgeError, Result, validate_api_key};

use crate::{GenerationParams, Prompt, TextGenerator};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("ArticleForge/", env!("CARGO_PKG_VERSION"));

/// Transport-level timeout; the orchestrator applies its own per-call deadline on top.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Longest slice of an error body quoted in an error message.
const ERROR_BODY_PREVIEW: usize = 300;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    #[serde(flatten)]
    params: &'a GenerationParams,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat-completions client authenticated with a bearer key.
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterClient {
    /// Create a client for `base_url` (e.g. `https://openrouter.ai/api/v1`).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                ArticleForgeError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Build a client from the `[openrouter]` config, reading the key from its env var.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        validate_api_key(config)?;
        let api_key = std::env::var(&config.openrouter.api_key_env).unwrap_or_default();
        Self::new(config.openrouter.base_url.clone(), api_key)
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{base}/chat/completions")
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for OpenRouterClient {
    #[instrument(skip_all, fields(model = %prompt.params.model))]
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let start = Instant::now();
        let request = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            params: &prompt.params,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("X-Title", "ArticleForge")
            .json(&request)
            .send()
            .await
            .map_err(|e| ArticleForgeError::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ArticleForgeError::Generation(format!("failed to read response body: {e}"))
        })?;

        if !status.is_success() {
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(ArticleForgeError::Generation(format!(
                "HTTP {status}: {preview}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ArticleForgeError::Generation(format!("invalid completion response: {e}"))
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ArticleForgeError::Generation("empty completion".into()))?;

        let (tokens_in, tokens_out) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        debug!(
            served_by = parsed.model.as_deref().unwrap_or("unknown"),
            tokens_in,
            tokens_out,
            latency_ms = start.elapsed().as_millis(),
            "completion received"
        );

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prompt() -> Prompt {
        Prompt {
            system: "You are terse.".into(),
            user: "Say hi".into(),
            params: GenerationParams {
                model: "test/model".into(),
                temperature: Some(0.2),
                ..Default::default()
            },
        }
    }

    #[test]
    fn endpoint_appends_chat_completions() {
        let client = OpenRouterClient::new("https://openrouter.ai/api/v1/", "k").unwrap();
        assert_eq!(
            client.endpoint(),
            "https://openrouter.ai/api/v1/chat/completions"
        );

        let client =
            OpenRouterClient::new("http://localhost:1234/v1/chat/completions", "k").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn request_serializes_params_flat() {
        let p = prompt();
        let request = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            params: &p.params,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "test/model");
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert!(json.get("top_p").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({"model": "test/model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "test/model",
                "choices": [{"message": {"role": "assistant", "content": "Hello there"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3}
            })))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(format!("{}/v1", server.uri()), "secret").unwrap();
        let text = client.complete(&prompt()).await.unwrap();
        assert_eq!(text, "Hello there");
    }

    #[tokio::test]
    async fn complete_maps_http_error_to_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(format!("{}/v1", server.uri()), "secret").unwrap();
        let err = client.complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, ArticleForgeError::Generation(_)));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn complete_rejects_empty_choices() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(format!("{}/v1", server.uri()), "secret").unwrap();
        let err = client.complete(&prompt()).await.unwrap_err();
        assert!(err.to_string().contains("empty completion"));
    }
}
