use anyhow::Result;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::language::Language;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub system_config: SystemConfig,
    #[serde(default)]
    pub translator_config: TranslatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_downloads_dir() -> String {
    "downloads".to_string()
}

/// Settings for the remote model and the widget built on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// `gemini` or `openai_compatible`
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_error_message")]
    pub error_message: String,

    #[serde(default = "default_export_filename")]
    pub export_filename: String,

    /// TrueType font embedded in exported PDFs. Without one, only
    /// Latin-1 text can be rendered.
    #[serde(default)]
    pub pdf_font_path: Option<String>,

    #[serde(default = "default_source_language")]
    pub default_source_language: Language,

    #[serde(default = "default_target_language")]
    pub default_target_language: Language,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

pub fn default_error_message() -> String {
    "Translation failed. Please try again.".to_string()
}

pub fn default_export_filename() -> String {
    "translation.pdf".to_string()
}

fn default_source_language() -> Language {
    Language::Malayalam
}

fn default_target_language() -> Language {
    Language::English
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            downloads_dir: default_downloads_dir(),
        }
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            debounce_ms: default_debounce_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            error_message: default_error_message(),
            export_filename: default_export_filename(),
            pdf_font_path: None,
            default_source_language: default_source_language(),
            default_target_language: default_target_language(),
        }
    }
}

impl TranslatorConfig {
    /// The configured key, or `None` when it is blank or an unresolved
    /// `${VAR}` placeholder.
    pub fn api_key(&self) -> Option<String> {
        let key = self.api_key.trim();
        if key.is_empty() || (key.starts_with("${") && key.ends_with('}')) {
            None
        } else {
            Some(key.to_string())
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SystemConfig {
    pub fn downloads_path(&self) -> PathBuf {
        PathBuf::from(&self.downloads_dir)
    }
}

impl Config {
    /// Load a YAML or JSON config file. `${VAR}` placeholders are replaced
    /// from the environment; unknown variables are left as-is.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            anyhow::bail!("Configuration file not found: {}", path);
        }
        let bytes = fs::read(path)?;
        Self::parse(&decode_text(&bytes), path)
    }

    fn parse(content: &str, path: &str) -> Result<Self> {
        let content = substitute_env_vars(content);
        let path_lower = path.to_lowercase();
        if path_lower.ends_with(".json") {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(serde_yaml::from_str(&content)?)
        }
    }
}

/// Decode as UTF-8, dropping a BOM if present.
fn decode_text(bytes: &[u8]) -> String {
    let (text, _had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
    text.into_owned()
}

fn substitute_env_vars(content: &str) -> String {
    let pattern = Regex::new(r"\$\{(\w+)\}").expect("static regex");
    pattern
        .replace_all(content, |caps: &Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_with_defaults() {
        let yaml = r#"
system_config:
  port: 9000
translator_config:
  api_key: "abc"
"#;
        let config = Config::parse(yaml, "conf.yaml").unwrap();
        assert_eq!(config.system_config.port, 9000);
        assert_eq!(config.system_config.host, "0.0.0.0");
        assert_eq!(config.translator_config.provider, "gemini");
        assert_eq!(config.translator_config.debounce_ms, 1000);
        assert_eq!(config.translator_config.export_filename, "translation.pdf");
        assert_eq!(config.translator_config.pdf_font_path, None);
        assert_eq!(config.translator_config.default_source_language, Language::Malayalam);
        assert_eq!(config.translator_config.api_key(), Some("abc".to_string()));
    }

    #[test]
    fn json_with_languages() {
        let json = r#"{"translator_config": {"default_source_language": "en", "default_target_language": "ml", "pdf_font_path": "fonts/ml.ttf"}}"#;
        let config = Config::parse(json, "conf.json").unwrap();
        assert_eq!(config.translator_config.default_source_language, Language::English);
        assert_eq!(config.translator_config.default_target_language, Language::Malayalam);
        assert_eq!(config.translator_config.pdf_font_path.as_deref(), Some("fonts/ml.ttf"));
        assert_eq!(config.system_config.port, 8080);
    }

    #[test]
    fn substitutes_known_env_vars_only() {
        std::env::set_var("TRANSLATION_WIDGET_TEST_KEY", "secret-123");
        let out = substitute_env_vars("a: ${TRANSLATION_WIDGET_TEST_KEY}\nb: ${TRANSLATION_WIDGET_UNSET_VAR}");
        assert_eq!(out, "a: secret-123\nb: ${TRANSLATION_WIDGET_UNSET_VAR}");
    }

    #[test]
    fn unresolved_placeholder_counts_as_missing_key() {
        let config = TranslatorConfig {
            api_key: "${GEMINI_API_KEY_NOT_SET}".to_string(),
            ..TranslatorConfig::default()
        };
        assert_eq!(config.api_key(), None);
        assert_eq!(TranslatorConfig::default().api_key(), None);
    }

    #[test]
    fn strips_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"system_config:\n  port: 1234\n");
        let text = decode_text(&bytes);
        assert!(text.starts_with("system_config"));
        assert_eq!(Config::parse(&text, "conf.yaml").unwrap().system_config.port, 1234);
    }
}
