use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::clipboard::BrowserClipboard;
use crate::export::DirectoryDownloadSink;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::widget::TranslationWidget;

/// Apply one client frame to the client's widget. State changes reach the
/// browser through the widget's update stream; direct replies go to
/// `outbound`.
pub fn handle_message(
    state: &AppState,
    client_uid: &str,
    widget: &TranslationWidget,
    text: &str,
    outbound: &UnboundedSender<ServerMessage>,
) -> anyhow::Result<()> {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Unknown message from {}: {}", client_uid, e);
            return Ok(());
        }
    };

    match msg {
        ClientMessage::SetInput { text } => widget.set_input_text(text),
        ClientMessage::SetSourceLanguage { language } => widget.set_source_language(language),
        ClientMessage::SetTargetLanguage { language } => widget.set_target_language(language),
        ClientMessage::SwapLanguages => widget.swap_languages(),
        ClientMessage::ClearAll => widget.clear_all(),
        ClientMessage::DownloadPdf => handle_download(state, client_uid, widget, outbound)?,
        ClientMessage::CopyOutput => {
            let clipboard = BrowserClipboard::new(outbound.clone());
            if !widget.copy_output(&clipboard)? {
                debug!("Nothing to copy for {}", client_uid);
            }
        }
        ClientMessage::FetchState => {
            outbound.send(ServerMessage::TranslationState(widget.snapshot()))?;
        }
    }

    Ok(())
}

fn handle_download(
    state: &AppState,
    client_uid: &str,
    widget: &TranslationWidget,
    outbound: &UnboundedSender<ServerMessage>,
) -> anyhow::Result<()> {
    let sink = DirectoryDownloadSink::new(
        state.client_downloads_dir(client_uid),
        format!("/downloads/{}", client_uid),
    );

    match widget.download_pdf(&sink) {
        Ok(Some(saved)) => {
            debug!("Saved PDF for {} at {:?}", client_uid, saved.path);
            outbound.send(ServerMessage::DownloadReady {
                filename: saved.filename,
                path: saved.url,
            })?;
        }
        Ok(None) => debug!("Nothing to export for {}", client_uid),
        Err(e) => {
            error!("PDF export failed for {}: {}", client_uid, e);
            outbound.send(ServerMessage::Error {
                message: "Could not create the PDF.".to_string(),
            })?;
        }
    }
    Ok(())
}
