//! Muxer listener construction.
//!
//! Every muxer gets one listener combining up to three concerns: dumping a
//! `.media_info` sidecar for on-demand output, notifying the DASH manifest,
//! and notifying the HLS playlists.

use crate::notifier::{HlsNotifier, MpdNotifier};
use abrpack_core::descriptor::StreamDescriptor;
use abrpack_core::error::{Error, Result};
use abrpack_core::media_info::MediaInfo;
use std::sync::Arc;
use tracing::debug;

pub use abrpack_pipeline::listener::MuxerListener;

/// Suffix of the media-info sidecar written next to on-demand outputs.
pub const MEDIA_INFO_SUFFIX: &str = ".media_info";

/// Per-stream data the listener factory needs.
#[derive(Debug, Clone, Default)]
pub struct ListenerStreamData {
    /// Path the stream's media info describes.
    pub media_info_output: String,
    /// HLS audio/subtitle group id.
    pub hls_group_id: String,
    /// HLS rendition name.
    pub hls_name: String,
    /// HLS media playlist file name.
    pub hls_playlist_name: String,
    /// HLS I-frame playlist file name.
    pub hls_iframe_playlist_name: String,
}

/// Extract the listener-relevant fields of a stream descriptor.
pub fn to_muxer_listener_data(stream: &StreamDescriptor) -> ListenerStreamData {
    ListenerStreamData {
        media_info_output: stream.output.clone(),
        hls_group_id: stream.hls_group_id.clone(),
        hls_name: stream.hls_name.clone(),
        hls_playlist_name: stream.hls_playlist_name.clone(),
        hls_iframe_playlist_name: stream.hls_iframe_playlist_name.clone(),
    }
}

/// Serialize a media info record to a sidecar file.
pub fn write_media_info_to_file(media_info: &MediaInfo, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(media_info)
        .map_err(|e| Error::FileFailure(format!("Failed to serialize media info: {e}.")))?;
    std::fs::write(path, json)
        .map_err(|e| Error::FileFailure(format!("Failed to write media info '{path}': {e}.")))?;
    debug!(path, "wrote media info");
    Ok(())
}

/// Writes a `.media_info` sidecar describing a finished on-demand output.
pub struct VodMediaInfoDumpMuxerListener {
    output_path: String,
}

impl VodMediaInfoDumpMuxerListener {
    /// Create a dump listener writing to `output_path`.
    pub fn new(output_path: impl Into<String>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }
}

impl MuxerListener for VodMediaInfoDumpMuxerListener {
    fn on_media_end(&self, media_info: &MediaInfo) -> Result<()> {
        write_media_info_to_file(media_info, &self.output_path)
    }
}

struct MpdNotifyMuxerListener {
    notifier: Arc<dyn MpdNotifier>,
}

impl MuxerListener for MpdNotifyMuxerListener {
    fn on_media_end(&self, media_info: &MediaInfo) -> Result<()> {
        self.notifier.notify_new_container(media_info)?;
        Ok(())
    }
}

struct HlsNotifyMuxerListener {
    notifier: Arc<dyn HlsNotifier>,
    data: ListenerStreamData,
}

impl MuxerListener for HlsNotifyMuxerListener {
    fn on_media_end(&self, media_info: &MediaInfo) -> Result<()> {
        debug!(
            group = %self.data.hls_group_id,
            name = %self.data.hls_name,
            playlist = %self.data.hls_playlist_name,
            "notifying HLS stream"
        );
        self.notifier.notify_new_stream(media_info)
    }
}

/// Fans listener events out to several listeners.
struct CombinedMuxerListener {
    listeners: Vec<Box<dyn MuxerListener>>,
}

impl MuxerListener for CombinedMuxerListener {
    fn on_media_start(&self, options: &abrpack_core::params::MuxerOptions) {
        for listener in &self.listeners {
            listener.on_media_start(options);
        }
    }

    fn on_new_segment(&self, file_name: &str, start_time: i64, duration: i64, size: u64) {
        for listener in &self.listeners {
            listener.on_new_segment(file_name, start_time, duration, size);
        }
    }

    fn on_media_end(&self, media_info: &MediaInfo) -> Result<()> {
        for listener in &self.listeners {
            listener.on_media_end(media_info)?;
        }
        Ok(())
    }
}

/// Builds the listener stack for each muxer.
pub struct MuxerListenerFactory {
    output_media_info: bool,
    mpd_notifier: Option<Arc<dyn MpdNotifier>>,
    hls_notifier: Option<Arc<dyn HlsNotifier>>,
}

impl MuxerListenerFactory {
    /// Create a factory over the run's notifiers.
    pub fn new(
        output_media_info: bool,
        mpd_notifier: Option<Arc<dyn MpdNotifier>>,
        hls_notifier: Option<Arc<dyn HlsNotifier>>,
    ) -> Self {
        Self {
            output_media_info,
            mpd_notifier,
            hls_notifier,
        }
    }

    /// Create the combined listener for one stream.
    pub fn create_listener(&self, data: ListenerStreamData) -> Box<dyn MuxerListener> {
        let mut listeners: Vec<Box<dyn MuxerListener>> = Vec::new();
        if self.output_media_info {
            listeners.push(Box::new(VodMediaInfoDumpMuxerListener::new(format!(
                "{}{MEDIA_INFO_SUFFIX}",
                data.media_info_output
            ))));
        }
        if let Some(notifier) = &self.mpd_notifier {
            listeners.push(Box::new(MpdNotifyMuxerListener {
                notifier: Arc::clone(notifier),
            }));
        }
        if let Some(notifier) = &self.hls_notifier {
            listeners.push(Box::new(HlsNotifyMuxerListener {
                notifier: Arc::clone(notifier),
                data: data.clone(),
            }));
        }
        Box::new(CombinedMuxerListener { listeners })
    }

    /// Create an HLS-only listener, or `None` when no HLS notifier is
    /// configured.
    pub fn create_hls_listener(&self, data: ListenerStreamData) -> Option<Box<dyn MuxerListener>> {
        let notifier = self.hls_notifier.as_ref()?;
        Some(Box::new(HlsNotifyMuxerListener {
            notifier: Arc::clone(notifier),
            data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::SimpleHlsNotifier;
    use abrpack_core::media_info::MediaInfoContainerType;
    use abrpack_core::params::HlsParams;

    #[test]
    fn test_hls_listener_requires_hls_notifier() {
        let factory = MuxerListenerFactory::new(false, None, None);
        assert!(factory
            .create_hls_listener(ListenerStreamData::default())
            .is_none());

        let hls: Arc<SimpleHlsNotifier> = Arc::new(SimpleHlsNotifier::new(HlsParams::default()));
        let factory = MuxerListenerFactory::new(false, None, Some(hls));
        assert!(factory
            .create_hls_listener(ListenerStreamData::default())
            .is_some());
    }

    #[test]
    fn test_vod_dump_listener_writes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4.media_info");
        let listener = VodMediaInfoDumpMuxerListener::new(path.to_str().unwrap());

        let info = MediaInfo {
            media_file_name: "out.mp4".to_string(),
            bandwidth: 1000,
            container_type: MediaInfoContainerType::Mp4,
            text_info: None,
        };
        listener.on_media_end(&info).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let back: MediaInfo = serde_json::from_str(&written).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_combined_listener_forwards_to_hls_notifier() {
        let hls = Arc::new(SimpleHlsNotifier::new(HlsParams::default()));
        let factory = MuxerListenerFactory::new(false, None, Some(hls.clone()));
        let listener = factory.create_listener(ListenerStreamData::default());

        let info = MediaInfo {
            media_file_name: "a.mp4".to_string(),
            ..Default::default()
        };
        listener.on_media_end(&info).unwrap();
        assert_eq!(hls.notified_streams().len(), 1);
    }
}
