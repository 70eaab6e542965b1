//! Muxer event listeners.
//!
//! Muxers and text output handlers report lifecycle events through this
//! trait; manifest notifiers and media-info dumpers hang off it.

use crate::error::Result;
use abrpack_core::media_info::MediaInfo;
use abrpack_core::params::MuxerOptions;

/// Receives output lifecycle events from a muxer.
pub trait MuxerListener: Send + Sync {
    /// The muxer opened its output.
    fn on_media_start(&self, _options: &MuxerOptions) {}

    /// A media segment was finalized.
    fn on_new_segment(
        &self,
        _file_name: &str,
        _start_time: i64,
        _duration: i64,
        _segment_file_size: u64,
    ) {
    }

    /// The output is complete and described by `media_info`.
    fn on_media_end(&self, _media_info: &MediaInfo) -> Result<()> {
        Ok(())
    }
}
