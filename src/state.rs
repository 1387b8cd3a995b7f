use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::export::{DocumentExporter, PdfExporter};
use crate::translate::{TranslateInterface, TranslatorFactory};
use crate::widget::{TranslationWidget, WidgetOptions};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub translator: Arc<dyn TranslateInterface>,
    pub exporter: Arc<dyn DocumentExporter>,
    pub widgets: Arc<DashMap<String, TranslationWidget>>, // client_uid -> widget
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let translator = TranslatorFactory::create_translator(&config.translator_config)?;
        Ok(Self::with_translator(config, translator))
    }

    pub fn with_translator(config: Config, translator: Arc<dyn TranslateInterface>) -> Self {
        let exporter = PdfExporter::from_config(&config.translator_config);
        Self {
            config,
            translator,
            exporter: Arc::new(exporter),
            widgets: Arc::new(DashMap::new()),
        }
    }

    pub fn generate_client_uid(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Where a client's saved downloads live; removed when the client leaves.
    pub fn client_downloads_dir(&self, client_uid: &str) -> PathBuf {
        self.config.system_config.downloads_path().join(client_uid)
    }

    /// Create and register a widget for a newly connected client.
    pub fn open_widget(&self, client_uid: &str) -> TranslationWidget {
        let widget = TranslationWidget::new(
            Arc::clone(&self.translator),
            Arc::clone(&self.exporter),
            WidgetOptions::from(&self.config.translator_config),
        );
        self.widgets.insert(client_uid.to_string(), widget.clone());
        widget
    }

    pub fn close_widget(&self, client_uid: &str) {
        if let Some((_, widget)) = self.widgets.remove(client_uid) {
            widget.shutdown();
        }

        let downloads = self.client_downloads_dir(client_uid);
        if downloads.exists() {
            match std::fs::remove_dir_all(&downloads) {
                Ok(()) => debug!("Removed downloads for {}", client_uid),
                Err(e) => warn!("Failed to remove downloads at {:?}: {}", downloads, e),
            }
        }
    }
}
