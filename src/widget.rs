//! Per-client translation widget.
//!
//! Holds the input/output texts, the language pair and the in-flight flag,
//! and drives the debounce-then-translate cycle:
//!
//! ```text
//! IDLE --edit--> PENDING --quiet for `debounce`--> IN_FLIGHT --> COMPLETE | FAILED
//!                  ^  |                                               |
//!                  +--+ further edits re-arm        next edit --------+
//! ```
//!
//! Every edit and every dispatched request bumps a generation counter. A
//! reply is applied only when nothing changed since its request went out, so
//! output never belongs to input that is no longer shown.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::clipboard::ClipboardSink;
use crate::config::{default_error_message, default_export_filename, TranslatorConfig};
use crate::error::{ClipboardError, ExportError};
use crate::export::{DocumentExporter, DownloadSink, SavedDownload};
use crate::language::Language;
use crate::scheduler::Debouncer;
use crate::translate::{TranslateInterface, TranslateRequest};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationState {
    pub input_text: String,
    pub output_text: String,
    pub is_translating: bool,
    pub source_language: Language,
    pub target_language: Language,
}

impl TranslationState {
    pub fn new(source_language: Language, target_language: Language) -> Self {
        Self {
            input_text: String::new(),
            output_text: String::new(),
            is_translating: false,
            source_language,
            target_language,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WidgetOptions {
    pub debounce: Duration,
    pub error_message: String,
    pub export_filename: String,
    pub source_language: Language,
    pub target_language: Language,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            error_message: default_error_message(),
            export_filename: default_export_filename(),
            source_language: Language::Malayalam,
            target_language: Language::English,
        }
    }
}

impl From<&TranslatorConfig> for WidgetOptions {
    fn from(config: &TranslatorConfig) -> Self {
        Self {
            debounce: config.debounce(),
            error_message: config.error_message.clone(),
            export_filename: config.export_filename.clone(),
            source_language: config.default_source_language,
            target_language: config.default_target_language,
        }
    }
}

/// Everything guarded by the widget lock.
struct Shared {
    state: TranslationState,
    /// Bumped by every edit and every dispatched request.
    generation: u64,
    /// Generation of the newest request still awaiting its reply.
    in_flight: Option<u64>,
}

struct Inner {
    shared: Mutex<Shared>,
    translator: Arc<dyn TranslateInterface>,
    exporter: Arc<dyn DocumentExporter>,
    options: WidgetOptions,
    updates: broadcast::Sender<TranslationState>,
}

/// Cheap to clone; clones share the same state and timer.
#[derive(Clone)]
pub struct TranslationWidget {
    inner: Arc<Inner>,
    debouncer: Arc<Debouncer>,
}

impl TranslationWidget {
    pub fn new(
        translator: Arc<dyn TranslateInterface>,
        exporter: Arc<dyn DocumentExporter>,
        options: WidgetOptions,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let debouncer = Arc::new(Debouncer::new(options.debounce));
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    state: TranslationState::new(options.source_language, options.target_language),
                    generation: 0,
                    in_flight: None,
                }),
                translator,
                exporter,
                options,
                updates,
            }),
            debouncer,
        }
    }

    pub fn snapshot(&self) -> TranslationState {
        self.inner.shared.lock().state.clone()
    }

    /// Receive a snapshot after every state change, in the order the changes
    /// were made.
    pub fn subscribe(&self) -> broadcast::Receiver<TranslationState> {
        self.inner.updates.subscribe()
    }

    pub fn set_input_text(&self, text: impl Into<String>) {
        let mut shared = self.inner.shared.lock();
        shared.state.input_text = text.into();
        self.schedule(&mut shared);
    }

    pub fn set_source_language(&self, language: Language) {
        let mut shared = self.inner.shared.lock();
        shared.state.source_language = language;
        self.schedule(&mut shared);
    }

    pub fn set_target_language(&self, language: Language) {
        let mut shared = self.inner.shared.lock();
        shared.state.target_language = language;
        self.schedule(&mut shared);
    }

    /// Exchange the language pair together with the texts. The new input
    /// goes through the same scheduling as a typed edit.
    pub fn swap_languages(&self) {
        let mut shared = self.inner.shared.lock();
        let state = &mut shared.state;
        std::mem::swap(&mut state.source_language, &mut state.target_language);
        std::mem::swap(&mut state.input_text, &mut state.output_text);
        self.schedule(&mut shared);
    }

    /// Reset both texts and discard any reply still in flight. A timer that
    /// is already armed stays armed; when it fires it finds empty input and
    /// does nothing.
    pub fn clear_all(&self) {
        let mut shared = self.inner.shared.lock();
        shared.generation += 1;
        shared.state.input_text.clear();
        shared.state.output_text.clear();
        self.inner.publish_locked(&shared.state);
    }

    /// Translate `text` right away with the current language pair.
    #[cfg(test)]
    pub async fn translate(&self, text: &str) {
        self.inner.translate(text).await;
    }

    /// Export the output through the document exporter and save it.
    /// Returns `Ok(None)` when there is no output.
    pub fn download_pdf(&self, sink: &dyn DownloadSink) -> Result<Option<SavedDownload>, ExportError> {
        let output = self.inner.shared.lock().state.output_text.clone();
        if output.is_empty() {
            return Ok(None);
        }
        let document = self
            .inner
            .exporter
            .export(&output, &self.inner.options.export_filename)?;
        sink.save(&document).map(Some)
    }

    /// Copy the output verbatim. Returns false when there was nothing to copy.
    pub fn copy_output(&self, clipboard: &dyn ClipboardSink) -> Result<bool, ClipboardError> {
        let output = self.inner.shared.lock().state.output_text.clone();
        if output.is_empty() {
            return Ok(false);
        }
        clipboard.write_text(&output)?;
        Ok(true)
    }

    #[cfg(test)]
    pub fn has_pending_translation(&self) -> bool {
        self.debouncer.is_armed()
    }

    /// Drop the pending timer; called when the client goes away.
    pub fn shutdown(&self) {
        if self.debouncer.cancel() {
            debug!("Cancelled pending translation on shutdown");
        }
    }

    /// Called with the lock held after an edit to the input or languages.
    fn schedule(&self, shared: &mut Shared) {
        // A reply still in flight was computed for the previous input.
        shared.generation += 1;
        self.debouncer.cancel();

        let blank = shared.state.input_text.trim().is_empty();
        if blank {
            shared.state.output_text.clear();
        }
        self.inner.publish_locked(&shared.state);

        if blank {
            return;
        }

        let inner = Arc::clone(&self.inner);
        self.debouncer.arm(async move {
            inner.translate_input().await;
        });
    }
}

impl Inner {
    /// Broadcast while the lock is held so subscribers see snapshots in the
    /// order the changes were made.
    fn publish_locked(&self, state: &TranslationState) {
        // No subscribers is fine.
        let _ = self.updates.send(state.clone());
    }

    async fn translate_input(&self) {
        let dispatched = {
            let mut shared = self.shared.lock();
            let text = shared.state.input_text.clone();
            self.dispatch(&mut shared, &text)
        };
        if let Some((request_id, request)) = dispatched {
            self.complete(request_id, request).await;
        }
    }

    #[cfg(test)]
    async fn translate(&self, text: &str) {
        let dispatched = self.dispatch(&mut self.shared.lock(), text);
        if let Some((request_id, request)) = dispatched {
            self.complete(request_id, request).await;
        }
    }

    /// Mark a request for `text` as in flight. Blank text dispatches nothing.
    fn dispatch(&self, shared: &mut Shared, text: &str) -> Option<(u64, TranslateRequest)> {
        if text.trim().is_empty() {
            return None;
        }

        shared.generation += 1;
        let request_id = shared.generation;
        shared.in_flight = Some(request_id);
        shared.state.is_translating = true;
        self.publish_locked(&shared.state);

        Some((
            request_id,
            TranslateRequest::new(text, shared.state.source_language, shared.state.target_language),
        ))
    }

    async fn complete(&self, request_id: u64, request: TranslateRequest) {
        debug!(
            "Dispatching translation #{} via {}: {} -> {}",
            request_id,
            self.translator.name(),
            request.source_language.code(),
            request.target_language.code()
        );
        let result = self.translator.translate(&request).await;

        let mut shared = self.shared.lock();
        let newest = shared.in_flight == Some(request_id);
        if newest {
            shared.in_flight = None;
            shared.state.is_translating = false;
        }

        if shared.generation != request_id {
            debug!("Discarding stale translation #{}", request_id);
            if newest {
                self.publish_locked(&shared.state);
            }
            return;
        }

        match result {
            Ok(translated) => shared.state.output_text = translated,
            Err(e) => {
                error!("Translation error: {}", e);
                shared.state.output_text = self.options.error_message.clone();
            }
        }
        self.publish_locked(&shared.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranslateError;
    use crate::export::{ExportedDocument, PdfExporter};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    const DELAY: Duration = Duration::from_millis(1000);

    /// Records every request and answers with a fixed reply.
    struct ScriptedTranslator {
        reply: Result<String, ()>,
        calls: Mutex<Vec<TranslateRequest>>,
    }

    impl ScriptedTranslator {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<TranslateRequest> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl TranslateInterface for ScriptedTranslator {
        async fn translate(&self, request: &TranslateRequest) -> Result<String, TranslateError> {
            self.calls.lock().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(()) => Err(TranslateError::Api {
                    status: 429,
                    body: "quota exceeded".to_string(),
                }),
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    /// Each call blocks until the test releases it, so responses can be
    /// delivered out of order.
    struct GatedTranslator {
        gates: Mutex<VecDeque<oneshot::Receiver<String>>>,
    }

    #[async_trait]
    impl TranslateInterface for GatedTranslator {
        async fn translate(&self, _request: &TranslateRequest) -> Result<String, TranslateError> {
            let gate = self.gates.lock().pop_front().expect("unexpected call");
            gate.await
                .map_err(|_| TranslateError::MalformedResponse("gate dropped".to_string()))
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    fn gated(gates: Vec<oneshot::Receiver<String>>) -> Arc<GatedTranslator> {
        Arc::new(GatedTranslator {
            gates: Mutex::new(gates.into()),
        })
    }

    struct MemorySink {
        saved: Mutex<Vec<ExportedDocument>>,
    }

    impl DownloadSink for MemorySink {
        fn save(&self, document: &ExportedDocument) -> Result<SavedDownload, ExportError> {
            self.saved.lock().push(document.clone());
            Ok(SavedDownload {
                filename: document.filename.clone(),
                path: document.filename.clone().into(),
                url: format!("/downloads/{}", document.filename),
            })
        }
    }

    struct MemoryClipboard {
        written: Mutex<Vec<String>>,
    }

    impl ClipboardSink for MemoryClipboard {
        fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            self.written.lock().push(text.to_string());
            Ok(())
        }
    }

    fn widget_with(translator: Arc<dyn TranslateInterface>, source: Language, target: Language) -> TranslationWidget {
        TranslationWidget::new(
            translator,
            Arc::new(PdfExporter::default()),
            WidgetOptions {
                source_language: source,
                target_language: target,
                ..WidgetOptions::default()
            },
        )
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(duration: Duration) {
        tokio::time::sleep(duration).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn translates_after_quiet_period() {
        let translator = ScriptedTranslator::ok("ഹലോ");
        let widget = widget_with(translator.clone(), Language::English, Language::Malayalam);

        widget.set_input_text("hello");
        assert!(widget.has_pending_translation());

        advance(DELAY - Duration::from_millis(1)).await;
        assert!(translator.calls().is_empty());
        assert_eq!(widget.snapshot().output_text, "");

        advance(Duration::from_millis(1)).await;
        let state = widget.snapshot();
        assert_eq!(state.output_text, "ഹലോ");
        assert!(!state.is_translating);
        assert_eq!(
            translator.calls(),
            vec![TranslateRequest::new("hello", Language::English, Language::Malayalam)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_call() {
        let translator = ScriptedTranslator::ok("done");
        let widget = widget_with(translator.clone(), Language::Malayalam, Language::English);

        for text in ["h", "he", "hel", "hell", "hello"] {
            widget.set_input_text(text);
            advance(Duration::from_millis(300)).await;
        }
        widget.set_target_language(Language::Hindi);
        advance(Duration::from_millis(999)).await;
        assert!(translator.calls().is_empty());

        advance(Duration::from_millis(1)).await;
        assert_eq!(
            translator.calls(),
            vec![TranslateRequest::new("hello", Language::Malayalam, Language::Hindi)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blank_input_clears_output_without_calling() {
        let translator = ScriptedTranslator::ok("unused");
        let widget = widget_with(translator.clone(), Language::English, Language::Malayalam);

        widget.set_input_text("hello");
        advance(DELAY).await;
        assert_eq!(widget.snapshot().output_text, "unused");

        widget.set_input_text("   \n\t");
        assert_eq!(widget.snapshot().output_text, "");
        assert!(!widget.has_pending_translation());

        advance(DELAY * 3).await;
        assert_eq!(translator.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_shows_fixed_error() {
        let widget = widget_with(ScriptedTranslator::failing(), Language::English, Language::Malayalam);

        widget.set_input_text("hello");
        advance(DELAY).await;

        let state = widget.snapshot();
        assert_eq!(state.output_text, "Translation failed. Please try again.");
        assert!(!state.is_translating);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reply_becomes_empty_output() {
        let widget = widget_with(ScriptedTranslator::ok(""), Language::English, Language::Malayalam);
        widget.set_input_text("hello");
        advance(DELAY).await;
        assert_eq!(widget.snapshot().output_text, "");
        assert!(!widget.snapshot().is_translating);
    }

    #[tokio::test]
    async fn is_translating_only_while_in_flight() {
        let (release, gate) = oneshot::channel();
        let widget = widget_with(gated(vec![gate]), Language::English, Language::Malayalam);
        assert!(!widget.snapshot().is_translating);

        let running = {
            let widget = widget.clone();
            tokio::spawn(async move { widget.translate("hello").await })
        };
        settle().await;
        assert!(widget.snapshot().is_translating);

        release.send("ഹലോ".to_string()).unwrap();
        running.await.unwrap();
        let state = widget.snapshot();
        assert!(!state.is_translating);
        assert_eq!(state.output_text, "ഹലോ");
    }

    #[tokio::test]
    async fn stale_response_does_not_overwrite_newer_one() {
        let (release_first, first) = oneshot::channel();
        let (release_second, second) = oneshot::channel();
        let widget = widget_with(gated(vec![first, second]), Language::English, Language::Malayalam);

        let older = {
            let widget = widget.clone();
            tokio::spawn(async move { widget.translate("hel").await })
        };
        settle().await;
        let newer = {
            let widget = widget.clone();
            tokio::spawn(async move { widget.translate("hello").await })
        };
        settle().await;

        release_second.send("new".to_string()).unwrap();
        newer.await.unwrap();
        assert_eq!(widget.snapshot().output_text, "new");
        assert!(!widget.snapshot().is_translating);

        release_first.send("old".to_string()).unwrap();
        older.await.unwrap();
        assert_eq!(widget.snapshot().output_text, "new");
        assert!(!widget.snapshot().is_translating);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_during_request_discards_reply() {
        let (release, gate) = oneshot::channel();
        let widget = widget_with(gated(vec![gate]), Language::English, Language::Malayalam);

        widget.set_input_text("hello");
        advance(DELAY).await;
        assert!(widget.snapshot().is_translating);

        widget.clear_all();
        release.send("ഹലോ".to_string()).unwrap();
        settle().await;

        let state = widget.snapshot();
        assert_eq!(state.input_text, "");
        assert_eq!(state.output_text, "");
        assert!(!state.is_translating);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_edit_during_request_discards_reply() {
        let (release, gate) = oneshot::channel();
        let widget = widget_with(gated(vec![gate]), Language::English, Language::Malayalam);

        widget.set_input_text("hello");
        advance(DELAY).await;
        widget.set_input_text("   ");
        release.send("ഹലോ".to_string()).unwrap();
        settle().await;

        let state = widget.snapshot();
        assert_eq!(state.output_text, "");
        assert!(!state.is_translating);
        assert!(!widget.has_pending_translation());
    }

    #[tokio::test(start_paused = true)]
    async fn edit_during_request_waits_for_newer_reply() {
        let (release_first, first) = oneshot::channel();
        let (release_second, second) = oneshot::channel();
        let widget = widget_with(gated(vec![first, second]), Language::English, Language::Malayalam);

        widget.set_input_text("hello");
        advance(DELAY).await;
        widget.set_input_text("hello world");

        // The reply for "hello" no longer matches the input.
        release_first.send("ഹലോ".to_string()).unwrap();
        settle().await;
        assert_eq!(widget.snapshot().output_text, "");
        assert!(!widget.snapshot().is_translating);

        advance(DELAY).await;
        assert!(widget.snapshot().is_translating);
        release_second.send("ഹലോ ലോകം".to_string()).unwrap();
        settle().await;
        let state = widget.snapshot();
        assert_eq!(state.output_text, "ഹലോ ലോകം");
        assert!(!state.is_translating);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_edits_publish_in_order() {
        let widget = widget_with(ScriptedTranslator::ok("unused"), Language::English, Language::Malayalam);
        let mut updates = widget.subscribe();

        let editors: Vec<_> = (0..4)
            .map(|worker| {
                let widget = widget.clone();
                tokio::spawn(async move {
                    for i in 0..50 {
                        let language = Language::ALL[(worker * 50 + i) % Language::ALL.len()];
                        if worker % 2 == 0 {
                            widget.set_source_language(language);
                        } else {
                            widget.set_target_language(language);
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for editor in editors {
            editor.await.unwrap();
        }

        let mut last = None;
        loop {
            match updates.try_recv() {
                Ok(state) => last = Some(state),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert_eq!(last, Some(widget.snapshot()));
    }

    #[tokio::test]
    async fn blank_translate_is_a_no_op() {
        let translator = ScriptedTranslator::ok("x");
        let widget = widget_with(translator.clone(), Language::English, Language::Malayalam);
        widget.translate("  ").await;
        assert!(translator.calls().is_empty());
        assert!(!widget.snapshot().is_translating);
    }

    #[tokio::test(start_paused = true)]
    async fn swap_exchanges_languages_and_texts() {
        let translator = ScriptedTranslator::ok("Y");
        let widget = widget_with(translator.clone(), Language::English, Language::Malayalam);

        widget.set_input_text("X");
        advance(DELAY).await;
        assert_eq!(widget.snapshot().output_text, "Y");

        widget.swap_languages();
        let state = widget.snapshot();
        assert_eq!(state.source_language, Language::Malayalam);
        assert_eq!(state.target_language, Language::English);
        assert_eq!(state.input_text, "Y");
        assert_eq!(state.output_text, "X");
        assert_eq!(translator.calls().len(), 1);

        // The swapped input is translated like any other edit.
        assert!(widget.has_pending_translation());
        advance(DELAY).await;
        assert_eq!(
            translator.calls()[1],
            TranslateRequest::new("Y", Language::Malayalam, Language::English)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clear_all_resets_texts_and_pending_timer_is_a_no_op() {
        let translator = ScriptedTranslator::ok("out");
        let widget = widget_with(translator.clone(), Language::English, Language::Malayalam);

        widget.set_input_text("first");
        advance(DELAY).await;
        widget.set_input_text("second");
        widget.clear_all();

        let state = widget.snapshot();
        assert_eq!(state.input_text, "");
        assert_eq!(state.output_text, "");
        assert!(widget.has_pending_translation());

        advance(DELAY).await;
        assert_eq!(translator.calls().len(), 1);
        assert_eq!(widget.snapshot().output_text, "");
        assert!(!widget.snapshot().is_translating);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_translation() {
        let translator = ScriptedTranslator::ok("out");
        let widget = widget_with(translator.clone(), Language::English, Language::Malayalam);

        widget.set_input_text("hello");
        widget.shutdown();
        advance(DELAY * 2).await;
        assert!(translator.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_snapshots_on_change() {
        let widget = widget_with(ScriptedTranslator::ok("ഹലോ"), Language::English, Language::Malayalam);
        let mut updates = widget.subscribe();

        widget.set_input_text("hello");
        advance(DELAY).await;

        let mut seen = Vec::new();
        while let Ok(state) = updates.try_recv() {
            seen.push(state);
        }
        assert_eq!(seen.first().unwrap().input_text, "hello");
        assert!(seen.iter().any(|s| s.is_translating));
        let last = seen.last().unwrap();
        assert_eq!(last.output_text, "ഹലോ");
        assert!(!last.is_translating);
    }

    #[tokio::test(start_paused = true)]
    async fn download_requires_output() {
        let widget = widget_with(ScriptedTranslator::ok("hola"), Language::English, Language::Spanish);
        let sink = MemorySink {
            saved: Mutex::new(Vec::new()),
        };

        assert_eq!(widget.download_pdf(&sink).unwrap(), None);
        assert!(sink.saved.lock().is_empty());

        widget.set_input_text("hello");
        advance(DELAY).await;
        let saved = widget.download_pdf(&sink).unwrap().unwrap();
        assert_eq!(saved.filename, "translation.pdf");

        let documents = sink.saved.lock();
        assert_eq!(documents.len(), 1);
        assert!(documents[0].bytes.starts_with(b"%PDF-"));
    }

    #[tokio::test(start_paused = true)]
    async fn copy_writes_output_verbatim() {
        let widget = widget_with(ScriptedTranslator::ok("ഹലോ ലോകം"), Language::English, Language::Malayalam);
        let clipboard = MemoryClipboard {
            written: Mutex::new(Vec::new()),
        };

        assert!(!widget.copy_output(&clipboard).unwrap());

        widget.set_input_text("hello world");
        advance(DELAY).await;
        assert!(widget.copy_output(&clipboard).unwrap());
        assert_eq!(*clipboard.written.lock(), vec!["ഹലോ ലോകം".to_string()]);
    }
}
