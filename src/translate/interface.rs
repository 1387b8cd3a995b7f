use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TranslateError;
use crate::language::Language;

/// A single translation job handed to the remote model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    pub source_language: Language,
    pub target_language: Language,
}

/// Body returned by the one-shot REST endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translated_text: String,
    pub success: bool,
}

impl TranslateRequest {
    pub fn new(text: impl Into<String>, source_language: Language, target_language: Language) -> Self {
        Self {
            text: text.into(),
            source_language,
            target_language,
        }
    }

    /// Instruction sent to the model. The text is embedded raw.
    pub fn prompt(&self) -> String {
        format!(
            "Translate the following {} text to {}. \
             Only provide the translated text, without any explanation or additional commentary.\n\n{}",
            self.source_language.name(),
            self.target_language.name(),
            self.text
        )
    }
}

/// Remote translation collaborator.
///
/// Stateless: one request per call, text in, text out. An empty string is a
/// valid answer when the model returns no text.
#[async_trait]
pub trait TranslateInterface: Send + Sync {
    async fn translate(&self, request: &TranslateRequest) -> Result<String, TranslateError>;

    /// Provider name, for logs and the health endpoint.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_both_languages_and_keeps_text_verbatim() {
        let request = TranslateRequest::new("  hello\nworld ", Language::English, Language::Malayalam);
        let prompt = request.prompt();

        assert!(prompt.starts_with("Translate the following English text to Malayalam."));
        assert!(prompt.contains("Only provide the translated text"));
        assert!(prompt.ends_with("\n\n  hello\nworld "));
    }
}
