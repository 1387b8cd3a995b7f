use serde::{Deserialize, Serialize};

use crate::language::Language;
use crate::widget::TranslationState;

/// Frames the browser sends over `/client-ws`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    SetInput { text: String },
    SetSourceLanguage { language: Language },
    SetTargetLanguage { language: Language },
    SwapLanguages,
    ClearAll,
    DownloadPdf,
    CopyOutput,
    FetchState,
}

/// Frames the server pushes to the browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    TranslationState(TranslationState),
    CopyToClipboard { text: String },
    DownloadReady { filename: String, path: String },
    Error { message: String },
}
