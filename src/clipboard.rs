use tokio::sync::mpsc::UnboundedSender;

use crate::error::ClipboardError;
use crate::protocol::ServerMessage;

/// Write-only clipboard.
pub trait ClipboardSink: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard of the browser on the other end of a WebSocket. The text is
/// forwarded as a `copy-to-clipboard` frame and the page performs the copy.
pub struct BrowserClipboard {
    outbound: UnboundedSender<ServerMessage>,
}

impl BrowserClipboard {
    pub fn new(outbound: UnboundedSender<ServerMessage>) -> Self {
        Self { outbound }
    }
}

impl ClipboardSink for BrowserClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.outbound
            .send(ServerMessage::CopyToClipboard {
                text: text.to_string(),
            })
            .map_err(|_| ClipboardError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_text_as_frame() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let clipboard = BrowserClipboard::new(tx);

        clipboard.write_text("ഹലോ").unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerMessage::CopyToClipboard { text: "ഹലോ".to_string() }
        );

        drop(rx);
        assert!(matches!(clipboard.write_text("x"), Err(ClipboardError::Disconnected)));
    }
}
