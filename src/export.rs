use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, Pt};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::TranslatorConfig;
use crate::error::ExportError;

/// A document ready to be handed to the browser.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Where a saved document ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDownload {
    pub filename: String,
    pub path: PathBuf,
    pub url: String,
}

/// Turns translated text into a downloadable document.
pub trait DocumentExporter: Send + Sync {
    fn export(&self, text: &str, filename: &str) -> Result<ExportedDocument, ExportError>;
}

/// Save-as for an exported document.
pub trait DownloadSink: Send + Sync {
    fn save(&self, document: &ExportedDocument) -> Result<SavedDownload, ExportError>;
}

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;

/// Plain text PDF. With a TrueType font configured the text is embedded as
/// Unicode (Identity-H with a ToUnicode map), so scripts such as Malayalam
/// survive. Without one it falls back to built-in Helvetica, where characters
/// outside WinAnsi are written as `?`.
pub struct PdfExporter {
    font: Option<Vec<u8>>,
    font_size: f32,
    leading: f32,
    margin: f32,
    max_chars_per_line: usize,
}

impl Default for PdfExporter {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 12.0,
            leading: 16.0,
            margin: 50.0,
            max_chars_per_line: 85,
        }
    }
}

impl PdfExporter {
    /// Embed `font` (TrueType/OpenType bytes) in every exported document.
    pub fn with_font(font: Vec<u8>) -> Result<Self, ExportError> {
        // Reject unparseable fonts now rather than on the first download.
        PdfDocument::empty("font check").add_external_font(font.as_slice())?;
        Ok(Self {
            font: Some(font),
            ..Self::default()
        })
    }

    pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        Self::with_font(fs::read(path)?)
    }

    /// Exporter for the configured font, or Helvetica when none is set or it
    /// cannot be loaded.
    pub fn from_config(config: &TranslatorConfig) -> Self {
        let Some(path) = config.pdf_font_path.as_deref() else {
            return Self::default();
        };
        match Self::from_font_file(path) {
            Ok(exporter) => {
                info!("Embedding PDF font from {}", path);
                exporter
            }
            Err(e) => {
                warn!(
                    "Could not load PDF font {}: {}. Non-Latin text will be lost in exports",
                    path, e
                );
                Self::default()
            }
        }
    }

    fn lines_per_page(&self) -> usize {
        (((PAGE_HEIGHT - 2.0 * self.margin) / self.leading).floor() as usize).max(1)
    }

    fn load_font(&self, doc: &PdfDocumentReference) -> Result<IndirectFontRef, ExportError> {
        let font = match &self.font {
            Some(bytes) => doc.add_external_font(bytes.as_slice())?,
            None => doc.add_builtin_font(BuiltinFont::Helvetica)?,
        };
        Ok(font)
    }
}

impl DocumentExporter for PdfExporter {
    fn export(&self, text: &str, filename: &str) -> Result<ExportedDocument, ExportError> {
        if text.trim().is_empty() {
            return Err(ExportError::EmptyDocument);
        }

        let mut lines = wrap_text(text, self.max_chars_per_line);
        if self.font.is_none() {
            let mut replaced = 0;
            for line in lines.iter_mut() {
                let (encodable, misses) = to_win_ansi(line);
                *line = encodable;
                replaced += misses;
            }
            if replaced > 0 {
                warn!(
                    "{} character(s) have no glyph in Helvetica; set pdf_font_path to keep them",
                    replaced
                );
            }
        }

        let page_size = (Mm::from(Pt(PAGE_WIDTH)), Mm::from(Pt(PAGE_HEIGHT)));
        let (doc, first_page, first_layer) =
            PdfDocument::new(filename, page_size.0, page_size.1, "Text");
        let doc = doc.with_producer("translation-widget");
        let font = self.load_font(&doc)?;

        let mut page_count = 0;
        for (i, page_lines) in lines.chunks(self.lines_per_page()).enumerate() {
            let (page, layer) = if i == 0 {
                (first_page, first_layer)
            } else {
                doc.add_page(page_size.0, page_size.1, "Text")
            };
            let layer = doc.get_page(page).get_layer(layer);

            for (row, line) in page_lines.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let y = PAGE_HEIGHT - self.margin - self.font_size - row as f32 * self.leading;
                layer.use_text(
                    line.as_str(),
                    self.font_size,
                    Mm::from(Pt(self.margin)),
                    Mm::from(Pt(y)),
                    &font,
                );
            }
            page_count += 1;
        }

        let bytes = doc.save_to_bytes()?;
        debug!(
            "Exported {} lines over {} page(s), {} bytes",
            lines.len(),
            page_count,
            bytes.len()
        );

        Ok(ExportedDocument {
            filename: filename.to_string(),
            mime_type: "application/pdf",
            bytes,
        })
    }
}

/// Map `text` onto what Helvetica can show: tabs become spaces, other control
/// characters are dropped and anything outside Windows-1252 becomes `?`.
/// Returns the text and the number of replaced characters.
fn to_win_ansi(text: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut replaced = 0;
    let mut buf = [0u8; 4];
    for c in text.chars() {
        match c {
            '\t' => out.push(' '),
            c if c.is_control() => {}
            c if c.is_ascii() => out.push(c),
            c => {
                let (bytes, _, had_errors) = encoding_rs::WINDOWS_1252.encode(c.encode_utf8(&mut buf));
                if had_errors || bytes.len() != 1 {
                    out.push('?');
                    replaced += 1;
                } else {
                    out.push(c);
                }
            }
        }
    }
    (out, replaced)
}

/// Greedy word wrap by character count. Blank lines are kept; words longer
/// than `width` are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + 1 + word_len > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }

            if word_len > width {
                let chars: Vec<char> = word.chars().collect();
                for chunk in chars.chunks(width) {
                    if current_len > 0 {
                        lines.push(std::mem::take(&mut current));
                    }
                    current = chunk.iter().collect();
                    current_len = chunk.len();
                }
                continue;
            }

            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }
        lines.push(current);
    }
    lines
}

/// Saves documents into a directory that is also served over HTTP under
/// `url_prefix`.
pub struct DirectoryDownloadSink {
    dir: PathBuf,
    url_prefix: String,
}

impl DirectoryDownloadSink {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into(),
        }
    }
}

impl DownloadSink for DirectoryDownloadSink {
    fn save(&self, document: &ExportedDocument) -> Result<SavedDownload, ExportError> {
        fs::create_dir_all(&self.dir)?;

        // Never let a filename escape the target directory.
        let filename = Path::new(&document.filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
            .to_string();
        let path = self.dir.join(&filename);
        fs::write(&path, &document.bytes)?;
        debug!("Saved download: {:?}", path);

        Ok(SavedDownload {
            url: format!("{}/{}", self.url_prefix.trim_end_matches('/'), filename),
            filename,
            path,
        })
    }
}
