//! Packaging parameters.
//!
//! One [`PackagingParams`] value configures a whole packaging run; stream
//! specific settings live on [`crate::StreamDescriptor`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// MP4 (ISO-BMFF) output tuning.
#[derive(Debug, Clone, Default)]
pub struct Mp4OutputParams {
    /// Generate `sidx` boxes in media segments.
    pub generate_sidx_in_media_segments: bool,
    /// Include PSSH boxes in the output stream in addition to the manifest.
    pub include_pssh_in_stream: bool,
}

/// Segment chunking configuration.
#[derive(Debug, Clone)]
pub struct ChunkingParams {
    /// Segment duration in seconds.
    pub segment_duration_in_seconds: f64,
    /// Subsegment duration in seconds; 0 disables subsegments.
    pub subsegment_duration_in_seconds: f64,
    /// Force segments to begin at stream access points.
    pub segment_sap_aligned: bool,
    /// Force subsegments to begin at stream access points. Requires
    /// `segment_sap_aligned`.
    pub subsegment_sap_aligned: bool,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            segment_duration_in_seconds: 6.0,
            subsegment_duration_in_seconds: 0.0,
            segment_sap_aligned: true,
            subsegment_sap_aligned: true,
        }
    }
}

/// DRM content protection scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ProtectionScheme {
    /// AES-CTR, no pattern ('cenc').
    #[default]
    Cenc,
    /// AES-CBC, no pattern ('cbc1').
    Cbc1,
    /// AES-CTR with subsample pattern ('cens').
    Cens,
    /// AES-CBC with subsample pattern ('cbcs').
    Cbcs,
    /// Apple Sample-AES, required for TS and packed-audio output.
    AppleSampleAes,
}

impl fmt::Display for ProtectionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cenc => write!(f, "cenc"),
            Self::Cbc1 => write!(f, "cbc1"),
            Self::Cens => write!(f, "cens"),
            Self::Cbcs => write!(f, "cbcs"),
            Self::AppleSampleAes => write!(f, "apple-sample-aes"),
        }
    }
}

/// Where encryption or decryption keys come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum KeyProvider {
    /// No key provider; content stays clear.
    #[default]
    None,
    /// Keys supplied directly in [`RawKeyParams`].
    Raw,
}

/// One raw key entry, keyed by DRM label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawKey {
    /// 16-byte key id.
    pub key_id: Vec<u8>,
    /// 16-byte content key.
    pub key: Vec<u8>,
    /// Optional IV; generated when absent.
    pub iv: Vec<u8>,
}

/// Raw key material for [`KeyProvider::Raw`].
#[derive(Debug, Clone, Default)]
pub struct RawKeyParams {
    /// Keys by DRM label. The empty label is the default key.
    pub key_map: HashMap<String, RawKey>,
}

/// Attributes of a stream being encrypted, handed to the stream label
/// function to pick a DRM label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptedStreamAttributes {
    /// An audio stream.
    Audio,
    /// A video stream with its coded resolution.
    Video {
        /// Coded width in pixels.
        width: u32,
        /// Coded height in pixels.
        height: u32,
    },
    /// Neither audio nor video.
    Unknown,
}

/// Maps stream attributes to a DRM label.
pub type StreamLabelFn = Arc<dyn Fn(&EncryptedStreamAttributes) -> String + Send + Sync>;

/// Encryption configuration.
#[derive(Clone, Default)]
pub struct EncryptionParams {
    /// Key provider.
    pub key_provider: KeyProvider,
    /// Raw key material when `key_provider` is [`KeyProvider::Raw`].
    pub raw_key: RawKeyParams,
    /// Protection scheme. Forced to Apple Sample-AES for TS and packed
    /// audio output regardless of this setting.
    pub protection_scheme: ProtectionScheme,
    /// Seconds of clear content at the start of each stream.
    pub clear_lead_in_seconds: f64,
    /// Maps stream attributes to DRM labels; a default resolution-based
    /// function is installed when unset.
    pub stream_label_func: Option<StreamLabelFn>,
}

impl fmt::Debug for EncryptionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionParams")
            .field("key_provider", &self.key_provider)
            .field("protection_scheme", &self.protection_scheme)
            .field("clear_lead_in_seconds", &self.clear_lead_in_seconds)
            .field("stream_label_func", &self.stream_label_func.is_some())
            .finish_non_exhaustive()
    }
}

/// Decryption configuration for encrypted inputs.
#[derive(Debug, Clone, Default)]
pub struct DecryptionParams {
    /// Key provider.
    pub key_provider: KeyProvider,
    /// Raw key material when `key_provider` is [`KeyProvider::Raw`].
    pub raw_key: RawKeyParams,
}

/// HLS playlist type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HlsPlaylistType {
    /// Video on demand; playlists are finalized.
    #[default]
    Vod,
    /// Event; playlists grow but segments are never removed.
    Event,
    /// Live; a sliding window of segments.
    Live,
}

/// HLS output configuration.
#[derive(Debug, Clone, Default)]
pub struct HlsParams {
    /// Master playlist path; empty disables HLS output.
    pub master_playlist_output: String,
    /// Playlist type.
    pub playlist_type: HlsPlaylistType,
    /// Base URL prepended to media paths in playlists.
    pub base_url: String,
    /// Live window depth in seconds.
    pub time_shift_buffer_depth: f64,
    /// Default audio/text language.
    pub default_language: String,
}

/// DASH MPD output configuration.
#[derive(Debug, Clone)]
pub struct MpdParams {
    /// MPD path; empty disables DASH output.
    pub mpd_output: String,
    /// Base URLs listed in the MPD.
    pub base_urls: Vec<String>,
    /// `minBufferTime` in seconds.
    pub min_buffer_time: f64,
    /// `minimumUpdatePeriod` in seconds, live only.
    pub minimum_update_period: f64,
    /// `suggestedPresentationDelay` in seconds, live only.
    pub suggested_presentation_delay: f64,
    /// Live window depth in seconds.
    pub time_shift_buffer_depth: f64,
    /// Default audio/text language.
    pub default_language: String,
    /// Emit a static MPD even for live profile content.
    pub generate_static_live_mpd: bool,
}

impl Default for MpdParams {
    fn default() -> Self {
        Self {
            mpd_output: String::new(),
            base_urls: Vec::new(),
            min_buffer_time: 2.0,
            minimum_update_period: 5.0,
            suggested_presentation_delay: 0.0,
            time_shift_buffer_depth: 1800.0,
            default_language: String::new(),
            generate_static_live_mpd: false,
        }
    }
}

/// One ad cue.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cuepoint {
    /// Cue start relative to the start of the presentation, in seconds.
    pub start_time_in_seconds: f64,
    /// Cue duration in seconds; 0 for a splice point.
    pub duration_in_seconds: f64,
}

impl Cuepoint {
    /// A splice-point cue at the given time.
    pub fn at(start_time_in_seconds: f64) -> Self {
        Self {
            start_time_in_seconds,
            duration_in_seconds: 0.0,
        }
    }
}

/// Ad cue generation configuration.
#[derive(Debug, Clone, Default)]
pub struct AdCueGeneratorParams {
    /// Cue points; non-empty activates cue alignment across all streams.
    pub cue_points: Vec<Cuepoint>,
}

/// Custom read callback: `(file name, buffer) -> bytes read or < 0 on error`.
pub type ReadCallback = Arc<dyn Fn(&str, &mut [u8]) -> i64 + Send + Sync>;
/// Custom write callback: `(file name, data) -> bytes written or < 0 on error`.
pub type WriteCallback = Arc<dyn Fn(&str, &[u8]) -> i64 + Send + Sync>;

/// Buffer callback configuration. When set, file reads and/or writes are
/// routed through the callbacks instead of the filesystem.
#[derive(Clone, Default)]
pub struct BufferCallbackParams {
    /// Read callback; rewrites descriptor inputs when present.
    pub read_func: Option<ReadCallback>,
    /// Write callback; rewrites descriptor outputs, segment templates and
    /// manifest paths when present.
    pub write_func: Option<WriteCallback>,
}

impl fmt::Debug for BufferCallbackParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferCallbackParams")
            .field("read_func", &self.read_func.is_some())
            .field("write_func", &self.write_func.is_some())
            .finish()
    }
}

/// Test hooks. Not for production use.
#[derive(Debug, Clone, Default)]
pub struct TestParams {
    /// Dump demuxed stream info instead of requiring outputs.
    pub dump_stream_info: bool,
    /// Replace the muxer clock with one that always returns the epoch.
    pub inject_fake_clock: bool,
    /// Report this library version string for deterministic test output.
    pub injected_library_version: String,
}

/// Top-level packaging configuration.
#[derive(Debug, Clone, Default)]
pub struct PackagingParams {
    /// MP4 output tuning.
    pub mp4_output_params: Mp4OutputParams,
    /// Directory for intermediate files.
    pub temp_dir: String,
    /// Chunking configuration.
    pub chunking_params: ChunkingParams,
    /// Encryption configuration.
    pub encryption_params: EncryptionParams,
    /// Decryption configuration.
    pub decryption_params: DecryptionParams,
    /// HLS output configuration.
    pub hls_params: HlsParams,
    /// DASH output configuration.
    pub mpd_params: MpdParams,
    /// Ad cue configuration.
    pub ad_cue_generator_params: AdCueGeneratorParams,
    /// Buffer callback configuration.
    pub buffer_callback_params: BufferCallbackParams,
    /// Write a `.media_info` sidecar per on-demand output.
    pub output_media_info: bool,
    /// Test hooks.
    pub test_params: TestParams,
}

/// Options handed to a muxer for one output.
#[derive(Debug, Clone, Default)]
pub struct MuxerOptions {
    /// MP4 output tuning.
    pub mp4_params: Mp4OutputParams,
    /// Directory for intermediate files.
    pub temp_dir: String,
    /// Bandwidth in bits per second, 0 when unknown.
    pub bandwidth: u32,
    /// Output file name (init segment for multi-segment output).
    pub output_file_name: String,
    /// Segment template for multi-segment output.
    pub segment_template: String,
}
