use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::interface::{TranslateInterface, TranslateRequest};
use crate::error::TranslateError;

/// Translator backed by any OpenAI-compatible `/chat/completions` endpoint
/// (OpenAI, Groq, DeepSeek, Ollama, ...).
pub struct OpenAICompatibleTranslator {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAICompatibleTranslator {
    pub fn new(
        http: Client,
        base_url: String,
        model: String,
        api_key: Option<String>,
        temperature: f32,
    ) -> Self {
        info!(
            "Initialized OpenAICompatibleTranslator: model={}, base_url={}",
            model, base_url
        );
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            temperature,
        }
    }
}

#[async_trait]
impl TranslateInterface for OpenAICompatibleTranslator {
    async fn translate(&self, request: &TranslateRequest) -> Result<String, TranslateError> {
        let prompt = request.prompt();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.temperature,
        };

        debug!(
            "Chat completion request: model={}, {} -> {}",
            self.model,
            request.source_language.code(),
            request.target_language.code()
        );

        // Local servers such as Ollama accept unauthenticated requests.
        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(TranslateError::Api {
                status: status.as_u16(),
                body: raw,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&raw)
            .map_err(|e| TranslateError::MalformedResponse(e.to_string()))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "openai_compatible"
    }
}
