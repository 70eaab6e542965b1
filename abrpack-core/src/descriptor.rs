//! Stream descriptors.

/// Describes one input stream and where its packaged output goes.
///
/// String fields use the empty string for "not set"; descriptors are copied
/// and normalized by the packager before assembly, so user-supplied values
/// are never mutated in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDescriptor {
    /// Input source, a path or URI.
    pub input: String,
    /// Which stream to select from the input, e.g. `"video"`, `"audio"`,
    /// a track number, or the literal `"text"` for text pipelines.
    pub stream_selector: String,
    /// Output file path. For multi-segment output this is the init segment.
    /// May itself be a template when ad cues split output per period.
    pub output: String,
    /// Segment template for multi-segment output.
    pub segment_template: String,
    /// Explicit output format name; overrides extension-based detection.
    pub output_format: String,
    /// Language tag for this stream.
    pub language: String,
    /// Bandwidth in bits per second, 0 when unknown.
    pub bandwidth: u32,
    /// Skip encryption for this stream even when a key source is configured.
    pub skip_encryption: bool,
    /// DRM label selecting the key to encrypt this stream with.
    pub drm_label: String,
    /// Trick-play sampling factor; 0 marks the main track.
    pub trick_play_factor: u32,
    /// HLS audio/subtitle group id.
    pub hls_group_id: String,
    /// HLS rendition name.
    pub hls_name: String,
    /// HLS media playlist file name.
    pub hls_playlist_name: String,
    /// HLS I-frame playlist file name.
    pub hls_iframe_playlist_name: String,
}

impl StreamDescriptor {
    /// Create a descriptor for the given input and stream selector.
    pub fn new(input: impl Into<String>, stream_selector: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            stream_selector: stream_selector.into(),
            ..Default::default()
        }
    }

    /// Set the output file path.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Set the segment template.
    pub fn with_segment_template(mut self, segment_template: impl Into<String>) -> Self {
        self.segment_template = segment_template.into();
        self
    }

    /// Set the explicit output format name.
    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = output_format.into();
        self
    }

    /// Set the language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the trick-play factor.
    pub fn with_trick_play_factor(mut self, factor: u32) -> Self {
        self.trick_play_factor = factor;
        self
    }

    /// Set the DRM label.
    pub fn with_drm_label(mut self, drm_label: impl Into<String>) -> Self {
        self.drm_label = drm_label.into();
        self
    }
}
