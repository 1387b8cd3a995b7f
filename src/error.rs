use thiserror::Error;

/// Failures of the remote translation collaborator.
///
/// None of these reach the user as-is: the widget logs them and shows its
/// fixed error string instead.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),

    #[error("request to translation API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translation API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed translation API response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export")]
    EmptyDocument,

    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build PDF: {0}")]
    Pdf(#[from] printpdf::Error),
}

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard receiver is gone")]
    Disconnected,
}

#[derive(Debug, Error)]
#[error("unsupported language: {0}")]
pub struct UnknownLanguage(pub String);
