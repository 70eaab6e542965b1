//! Input demuxer.

use crate::crypto::KeySource;
use crate::error::{Error, Result};
use crate::handler::{HandlerKind, MediaHandler, OriginHandler, StreamData};
use abrpack_core::container::determine_container;
use abrpack_core::file::read_file;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Demultiplexes one input into per-selector streams.
///
/// One demuxer exists per distinct input; every stream descriptor reading
/// from that input shares it. During assembly the packager binds a handler
/// chain to each stream selector with [`Demuxer::set_handler`]; at run time
/// the demuxer feeds each selected stream into its chain.
///
/// Container-specific media parsers plug in behind the demuxer and are
/// provided by format support crates; the demuxer itself only owns input
/// access, stream selection, and key handling for encrypted inputs.
pub struct Demuxer {
    input: String,
    dump_stream_info: AtomicBool,
    cancelled: AtomicBool,
    key_source: Mutex<Option<Arc<dyn KeySource>>>,
    language_overrides: Mutex<HashMap<String, String>>,
    handlers: Mutex<HashMap<String, Arc<dyn MediaHandler>>>,
}

impl Demuxer {
    /// Create a demuxer for an input path or URI.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            dump_stream_info: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            key_source: Mutex::new(None),
            language_overrides: Mutex::new(HashMap::new()),
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// The input this demuxer reads.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Print demuxed stream metadata instead of requiring outputs.
    pub fn set_dump_stream_info(&self, dump: bool) {
        self.dump_stream_info.store(dump, Ordering::Relaxed);
    }

    /// Whether stream info dumping is enabled.
    pub fn dump_stream_info(&self) -> bool {
        self.dump_stream_info.load(Ordering::Relaxed)
    }

    /// Attach the key source used to decrypt an encrypted input.
    pub fn set_key_source(&self, key_source: Arc<dyn KeySource>) {
        *self.key_source.lock() = Some(key_source);
    }

    /// Whether a decryption key source is attached.
    pub fn has_key_source(&self) -> bool {
        self.key_source.lock().is_some()
    }

    /// Override the language reported for a selected stream.
    pub fn set_language_override(
        &self,
        stream_selector: impl Into<String>,
        language: impl Into<String>,
    ) {
        self.language_overrides
            .lock()
            .insert(stream_selector.into(), language.into());
    }

    /// The language override for a selector, if any.
    pub fn language_override(&self, stream_selector: &str) -> Option<String> {
        self.language_overrides.lock().get(stream_selector).cloned()
    }

    /// Bind the head of a handler chain to a stream selector.
    pub fn set_handler(
        &self,
        stream_selector: impl Into<String>,
        handler: Arc<dyn MediaHandler>,
    ) -> Result<()> {
        let stream_selector = stream_selector.into();
        let mut handlers = self.handlers.lock();
        if handlers.contains_key(&stream_selector) {
            return Err(Error::InvalidArgument(format!(
                "A handler is already set for stream '{stream_selector}' of input '{}'.",
                self.input
            )));
        }
        handlers.insert(stream_selector, handler);
        Ok(())
    }

    /// The handler bound to a stream selector, if any.
    pub fn handler(&self, stream_selector: &str) -> Option<Arc<dyn MediaHandler>> {
        self.handlers.lock().get(stream_selector).cloned()
    }

    /// Selectors with a bound handler.
    pub fn stream_selectors(&self) -> Vec<String> {
        self.handlers.lock().keys().cloned().collect()
    }
}

impl MediaHandler for Demuxer {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Demuxer
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn is_origin(&self) -> bool {
        true
    }

    fn add_downstream(&self, _downstream: Arc<dyn MediaHandler>) -> Result<()> {
        // Demuxer outputs are per-selector; they are bound with set_handler.
        Err(Error::InvalidArgument(
            "Demuxer downstreams are bound per stream selector with set_handler.".to_string(),
        ))
    }

    fn downstreams(&self) -> Vec<Arc<dyn MediaHandler>> {
        self.handlers.lock().values().cloned().collect()
    }

    fn initialize(&self) -> Result<()> {
        if self.input.is_empty() {
            return Err(Error::InvalidArgument(
                "Demuxer created with an empty input.".to_string(),
            ));
        }
        Ok(())
    }

    fn process(&self, _data: StreamData) -> Result<()> {
        Err(Error::InvalidArgument(
            "Demuxer is an origin handler; it accepts no upstream data.".to_string(),
        ))
    }

    fn flush(&self) -> Result<()> {
        let handlers = self.handlers.lock().values().cloned().collect::<Vec<_>>();
        for handler in handlers {
            handler.flush()?;
        }
        Ok(())
    }
}

impl OriginHandler for Demuxer {
    fn run(&self) -> Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }

        let data = read_file(&self.input)?;
        let container = determine_container(&data);

        if self.dump_stream_info() {
            info!(input = %self.input, %container, "stream info");
        }

        // Elementary stream parsing lives in the format support crates; the
        // shipped demuxer stops at container identification.
        Err(Error::Unimplemented(format!(
            "No media parser registered for {container} input '{}'.",
            self.input
        )))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CollectingSink;

    #[test]
    fn test_set_handler_rejects_duplicate_selector() {
        let demuxer = Demuxer::new("v.mp4");
        let sink = CollectingSink::new();
        demuxer.set_handler("video", sink.clone()).unwrap();
        assert!(demuxer.set_handler("video", sink.clone()).is_err());
        assert!(demuxer.set_handler("audio", sink).is_ok());
    }

    #[test]
    fn test_language_override_round_trip() {
        let demuxer = Demuxer::new("v.mp4");
        demuxer.set_language_override("video", "eng");
        assert_eq!(demuxer.language_override("video").as_deref(), Some("eng"));
        assert_eq!(demuxer.language_override("audio"), None);
    }

    #[test]
    fn test_initialize_rejects_empty_input() {
        let demuxer = Demuxer::new("");
        assert!(demuxer.initialize().is_err());
    }

    #[test]
    fn test_cancelled_run_reports_cancelled() {
        let demuxer = Demuxer::new("v.mp4");
        demuxer.cancel();
        assert!(matches!(demuxer.run(), Err(Error::Cancelled)));
    }
}
