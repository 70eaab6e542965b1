//! Muxers and the muxer factory.
//!
//! Muxers sit at the leaves of the packaging graph. The factory picks the
//! muxer for a stream's resolved output container and owns the clock every
//! muxer stamps output with, which tests replace with an epoch clock.

use crate::listener::MuxerListener;
use abrpack_core::container::MediaContainer;
use abrpack_core::descriptor::StreamDescriptor;
use abrpack_core::error::{Error, Result};
use abrpack_core::media_info::{MediaInfo, MediaInfoContainerType};
use abrpack_core::params::{Mp4OutputParams, MuxerOptions, PackagingParams};
use abrpack_pipeline::handler::{HandlerKind, MediaHandler, StreamData};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Time source for output timestamps.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the epoch. Injected by tests for deterministic output.
pub struct EpochClock;

impl Clock for EpochClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }
}

#[derive(Default)]
struct MuxerState {
    media_started: bool,
    samples_received: u64,
    segments_finalized: u64,
}

/// One output muxer.
///
/// Container-specific serialization lives behind the format support crates;
/// the node tracks output lifecycle, drives its listener, and accounts
/// samples and segments.
pub struct MuxerNode {
    container: MediaContainer,
    options: MuxerOptions,
    clock: Arc<dyn Clock>,
    listener: Mutex<Option<Box<dyn MuxerListener>>>,
    state: Mutex<MuxerState>,
}

impl MuxerNode {
    fn new(container: MediaContainer, options: MuxerOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            container,
            options,
            clock,
            listener: Mutex::new(None),
            state: Mutex::new(MuxerState::default()),
        }
    }

    /// The container this muxer writes.
    pub fn container(&self) -> MediaContainer {
        self.container
    }

    /// The options this muxer writes with.
    pub fn options(&self) -> &MuxerOptions {
        &self.options
    }

    /// Attach the listener for output lifecycle events.
    pub fn set_muxer_listener(&self, listener: Box<dyn MuxerListener>) {
        *self.listener.lock() = Some(listener);
    }

    /// Whether a listener is attached.
    pub fn has_muxer_listener(&self) -> bool {
        self.listener.lock().is_some()
    }

    fn media_info(&self) -> MediaInfo {
        let media_file_name = if self.options.output_file_name.is_empty() {
            self.options.segment_template.clone()
        } else {
            self.options.output_file_name.clone()
        };
        MediaInfo {
            media_file_name,
            bandwidth: self.options.bandwidth,
            container_type: match self.container {
                MediaContainer::Mp4 => MediaInfoContainerType::Mp4,
                MediaContainer::Mpeg2Ts => MediaInfoContainerType::MpegTs,
                MediaContainer::Aac | MediaContainer::Ac3 | MediaContainer::Eac3 => {
                    MediaInfoContainerType::PackedAudio
                }
                MediaContainer::WebVtt | MediaContainer::Ttml => MediaInfoContainerType::Text,
                _ => MediaInfoContainerType::Unknown,
            },
            text_info: None,
        }
    }
}

impl MediaHandler for MuxerNode {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Muxer
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn add_downstream(&self, _downstream: Arc<dyn MediaHandler>) -> Result<()> {
        Err(Error::InvalidArgument(
            "Muxers are terminal handlers.".to_string(),
        ))
    }

    fn downstreams(&self) -> Vec<Arc<dyn MediaHandler>> {
        Vec::new()
    }

    fn process(&self, data: StreamData) -> Result<()> {
        let mut state = self.state.lock();
        if !state.media_started {
            state.media_started = true;
            debug!(
                output = %self.options.output_file_name,
                container = %self.container,
                opened_at = %self.clock.now(),
                "muxer opened"
            );
            if let Some(listener) = self.listener.lock().as_ref() {
                listener.on_media_start(&self.options);
            }
        }

        match data {
            StreamData::MediaSample(_) => {
                state.samples_received += 1;
            }
            StreamData::SegmentInfo(info) => {
                state.segments_finalized += 1;
                if let Some(listener) = self.listener.lock().as_ref() {
                    listener.on_new_segment(
                        &self.options.segment_template,
                        info.start_time,
                        info.duration,
                        0,
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        match self.listener.lock().as_ref() {
            Some(listener) => listener.on_media_end(&self.media_info()),
            None => Ok(()),
        }
    }
}

/// Builds the muxer for a stream's output container.
pub struct MuxerFactory {
    mp4_params: Mp4OutputParams,
    temp_dir: String,
    clock: Arc<dyn Clock>,
}

impl MuxerFactory {
    /// Create a factory from the packaging parameters.
    pub fn new(packaging_params: &PackagingParams) -> Self {
        Self {
            mp4_params: packaging_params.mp4_output_params.clone(),
            temp_dir: packaging_params.temp_dir.clone(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock muxers stamp output with.
    pub fn override_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    /// Create the muxer for an output container, or `None` when the
    /// container is not a supported output.
    pub fn create_muxer(
        &self,
        container: MediaContainer,
        stream: &StreamDescriptor,
    ) -> Option<Arc<MuxerNode>> {
        if container == MediaContainer::Unknown {
            return None;
        }
        let options = MuxerOptions {
            mp4_params: self.mp4_params.clone(),
            temp_dir: self.temp_dir.clone(),
            bandwidth: stream.bandwidth,
            output_file_name: stream.output.clone(),
            segment_template: stream.segment_template.clone(),
        };
        Some(Arc::new(MuxerNode::new(
            container,
            options,
            Arc::clone(&self.clock),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_clock_returns_epoch() {
        assert_eq!(EpochClock.now().timestamp(), 0);
    }

    #[test]
    fn test_factory_rejects_unknown_container() {
        let factory = MuxerFactory::new(&PackagingParams::default());
        let stream = StreamDescriptor::new("v.mp4", "video");
        assert!(factory
            .create_muxer(MediaContainer::Unknown, &stream)
            .is_none());
    }

    #[test]
    fn test_factory_copies_stream_options() {
        let factory = MuxerFactory::new(&PackagingParams {
            temp_dir: "/tmp/pack".to_string(),
            ..Default::default()
        });
        let stream = StreamDescriptor::new("v.mp4", "video")
            .with_output("init.mp4")
            .with_segment_template("s_$Number$.m4s");
        let muxer = factory.create_muxer(MediaContainer::Mp4, &stream).unwrap();
        assert_eq!(muxer.options().output_file_name, "init.mp4");
        assert_eq!(muxer.options().segment_template, "s_$Number$.m4s");
        assert_eq!(muxer.options().temp_dir, "/tmp/pack");
        assert_eq!(muxer.container(), MediaContainer::Mp4);
    }
}
