use anyhow::Result;
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

use super::gemini::GeminiTranslator;
use super::interface::TranslateInterface;
use super::openai_compatible::OpenAICompatibleTranslator;
use crate::config::TranslatorConfig;

/// Factory for creating translator clients
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create a translator based on the configured provider.
    ///
    /// A missing API key is not an error here: it surfaces as a failed
    /// translation when the first request is made.
    pub fn create_translator(config: &TranslatorConfig) -> Result<Arc<dyn TranslateInterface>> {
        info!("Initializing translator: {}", config.provider);

        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let api_key = config.api_key();

        match config.provider.as_str() {
            "gemini" => {
                if api_key.is_none() {
                    warn!("No API key configured for gemini; translations will fail");
                }
                Ok(Arc::new(GeminiTranslator::new(
                    http,
                    config.base_url.clone(),
                    config.model.clone(),
                    api_key,
                )))
            }
            "openai_compatible" | "openai" | "groq" | "deepseek" | "ollama" => {
                Ok(Arc::new(OpenAICompatibleTranslator::new(
                    http,
                    config.base_url.clone(),
                    config.model.clone(),
                    api_key,
                    config.temperature,
                )))
            }
            other => Err(anyhow::anyhow!("Unsupported translation provider: {}", other)),
        }
    }
}
