//! Chat-completion drafting of descriptive copy
//!
//! Each draft is a single request: a fixed system prompt, one user turn built
//! from the operator's seed text, at most 150 output tokens at temperature 0.7.

use crate::config::AiOptions;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Output cap for every draft
pub const MAX_TOKENS: u32 = 150;

/// Sampling temperature for every draft
pub const TEMPERATURE: f32 = 0.7;

/// Text fields the generator can draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    /// Organization description shown above the code
    OrgDescription,
    /// What the scanned URL is for
    UrlPurpose,
}

impl TextField {
    fn system_prompt(self) -> &'static str {
        match self {
            Self::OrgDescription => {
                "You are a helpful assistant that writes concise, compelling descriptions \
                 for non-profit organizations."
            }
            Self::UrlPurpose => {
                "You are a helpful assistant that explains, in plain language, what people \
                 will find when they scan a non-profit's QR code."
            }
        }
    }

    fn user_prompt(self, seed: &str) -> String {
        match self {
            Self::OrgDescription => format!(
                "Write a brief, engaging description (2-3 sentences) of a non-profit \
                 organization based on this information: {seed}"
            ),
            Self::UrlPurpose => format!(
                "Write a short, clear sentence explaining the purpose of this link for \
                 visitors, based on this information: {seed}"
            ),
        }
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            Self::OrgDescription => "organization description",
            Self::UrlPurpose => "URL purpose",
        }
    }
}

/// One system + user exchange sent to the provider
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System message
    pub system: String,
    /// Single user turn
    pub user: String,
    /// Output token cap
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl CompletionRequest {
    /// Build the fixed prompt pair for `field` around `seed`.
    pub fn for_field(field: TextField, seed: &str) -> Self {
        Self {
            system: field.system_prompt().to_string(),
            user: field.user_prompt(seed.trim()),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

/// Anything that can turn a [`CompletionRequest`] into text
#[async_trait]
pub trait TextDrafter: Send + Sync {
    /// Request a completion; the returned text is trimmed.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

/// OpenAI-compatible `/chat/completions` client
pub struct OpenAiDrafter {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiDrafter {
    /// Build a client from configuration. A missing key is not an error here;
    /// every request then fails with [`Error::AiNotConfigured`].
    pub fn new(options: &AiOptions) -> Self {
        Self {
            client: Client::new(),
            api_key: options.key().map(str::to_string),
            model: options.model.clone(),
            base_url: options.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Whether an API key is available
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl TextDrafter for OpenAiDrafter {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or(Error::AiNotConfigured)?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(
            model = %self.model,
            prompt_len = request.user.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Ai(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or_else(|_| format!("AI provider returned {status}"));
            return Err(Error::Ai(message));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Ai(format!("Failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::Ai("The AI provider returned no text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_fixed_bounds() {
        let request = CompletionRequest::for_field(TextField::UrlPurpose, "  donate page  ");
        assert_eq!(request.max_tokens, 150);
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
        assert!(request.user.ends_with("donate page"));
        assert_ne!(
            request.system,
            CompletionRequest::for_field(TextField::OrgDescription, "x").system
        );
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let drafter = OpenAiDrafter::new(&AiOptions::default());
        assert!(!drafter.is_configured());
        let request = CompletionRequest::for_field(TextField::OrgDescription, "food bank");
        assert!(matches!(
            drafter.complete(&request).await,
            Err(Error::AiNotConfigured)
        ));
    }
}
