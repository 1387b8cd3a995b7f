use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownLanguage;

/// Languages the widget can translate between.
///
/// Serialized on the wire as ISO 639-1 codes; the English display name is
/// what goes into the model prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "ml")]
    Malayalam,
    #[serde(rename = "en")]
    English,
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "ta")]
    Tamil,
    #[serde(rename = "kn")]
    Kannada,
    #[serde(rename = "te")]
    Telugu,
    #[serde(rename = "ar")]
    Arabic,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "es")]
    Spanish,
}

impl Language {
    pub const ALL: [Language; 10] = [
        Language::Malayalam,
        Language::English,
        Language::Hindi,
        Language::Tamil,
        Language::Kannada,
        Language::Telugu,
        Language::Arabic,
        Language::French,
        Language::German,
        Language::Spanish,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Language::Malayalam => "Malayalam",
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Tamil => "Tamil",
            Language::Kannada => "Kannada",
            Language::Telugu => "Telugu",
            Language::Arabic => "Arabic",
            Language::French => "French",
            Language::German => "German",
            Language::Spanish => "Spanish",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::Malayalam => "ml",
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Tamil => "ta",
            Language::Kannada => "kn",
            Language::Telugu => "te",
            Language::Arabic => "ar",
            Language::French => "fr",
            Language::German => "de",
            Language::Spanish => "es",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts either the ISO code or the display name, case-insensitively.
impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Language::ALL
            .into_iter()
            .find(|lang| {
                lang.code().eq_ignore_ascii_case(needle) || lang.name().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ml", Language::Malayalam)]
    #[case("EN", Language::English)]
    #[case("malayalam", Language::Malayalam)]
    #[case(" English ", Language::English)]
    #[case("de", Language::German)]
    fn parses_codes_and_names(#[case] input: &str, #[case] expected: Language) {
        assert_eq!(input.parse::<Language>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_language() {
        let err = "klingon".parse::<Language>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported language: klingon");
    }

    #[test]
    fn serializes_as_iso_code() {
        assert_eq!(serde_json::to_string(&Language::Malayalam).unwrap(), "\"ml\"");
        let lang: Language = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(lang, Language::English);
    }

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<_> = Language::ALL.iter().map(|l| l.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), Language::ALL.len());
    }
}
