//! Text-generation capability used by every pipeline stage.
//!
//! The pipeline only needs a function from a structured prompt to text;
//! [`TextGenerator`] is that seam. [`OpenRouterClient`] implements it over
//! any OpenAI-compatible chat-completions API.

mod openrouter;

use articleforge_shared::Result;
use serde::Serialize;

pub use openrouter::OpenRouterClient;

/// Sampling parameters sent with a prompt. `None` leaves the provider default.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationParams {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A rendered system + user prompt with its sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub params: GenerationParams,
}

/// Something that turns a prompt into text.
///
/// Implementations report every failure (transport, quota, model) as
/// [`ArticleForgeError::Generation`](articleforge_shared::ArticleForgeError::Generation).
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}
