//! Media container identification.
//!
//! Containers are identified three ways: by sniffing magic bytes, by file
//! extension, and by an explicit format name. The packager cross-checks all
//! three when resolving what a stream descriptor should produce.

use std::fmt;

/// Media container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MediaContainer {
    /// Container could not be determined.
    Unknown,
    /// ISO Base Media File Format (MP4, MOV, CMAF segments).
    Mp4,
    /// MPEG-2 Transport Stream.
    Mpeg2Ts,
    /// WebVTT text.
    WebVtt,
    /// TTML text.
    Ttml,
    /// Packed AAC audio (ADTS).
    Aac,
    /// Packed AC-3 audio.
    Ac3,
    /// Packed E-AC-3 audio.
    Eac3,
    /// WebM / Matroska.
    WebM,
}

impl MediaContainer {
    /// Whether this is a packed-audio container (raw elementary audio with
    /// no initialization data).
    pub fn is_packed_audio(&self) -> bool {
        matches!(self, Self::Aac | Self::Ac3 | Self::Eac3)
    }

    /// The typical file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Mp4 => "mp4",
            Self::Mpeg2Ts => "ts",
            Self::WebVtt => "vtt",
            Self::Ttml => "ttml",
            Self::Aac => "aac",
            Self::Ac3 => "ac3",
            Self::Eac3 => "ec3",
            Self::WebM => "webm",
        }
    }
}

impl fmt::Display for MediaContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Mp4 => write!(f, "MP4"),
            Self::Mpeg2Ts => write!(f, "MPEG2-TS"),
            Self::WebVtt => write!(f, "WebVTT"),
            Self::Ttml => write!(f, "TTML"),
            Self::Aac => write!(f, "AAC"),
            Self::Ac3 => write!(f, "AC-3"),
            Self::Eac3 => write!(f, "E-AC-3"),
            Self::WebM => write!(f, "WebM"),
        }
    }
}

/// TS packet size, used to confirm a sync-byte match.
const TS_PACKET_SIZE: usize = 188;

/// Determine the container from the leading bytes of a file.
pub fn determine_container(data: &[u8]) -> MediaContainer {
    // Skip a UTF-8 BOM if present; WebVTT files commonly carry one.
    let body = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if body.starts_with(b"WEBVTT") {
        return MediaContainer::WebVtt;
    }
    if looks_like_ttml(body) {
        return MediaContainer::Ttml;
    }
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return MediaContainer::Mp4;
    }
    if data.len() >= 4 && data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return MediaContainer::WebM;
    }
    if data.len() > TS_PACKET_SIZE && data[0] == 0x47 && data[TS_PACKET_SIZE] == 0x47 {
        return MediaContainer::Mpeg2Ts;
    }
    if data.len() >= 2 && data[0] == 0x0B && data[1] == 0x77 {
        // AC-3 and E-AC-3 share a sync word; the bitstream id that separates
        // them is not available from a two-byte sniff.
        return MediaContainer::Ac3;
    }
    if data.len() >= 2 && data[0] == 0xFF && (data[1] & 0xF6) == 0xF0 {
        return MediaContainer::Aac;
    }
    MediaContainer::Unknown
}

fn looks_like_ttml(body: &[u8]) -> bool {
    if !body.starts_with(b"<") {
        return false;
    }
    let head = &body[..body.len().min(256)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    text.contains("<tt")
}

/// Determine the container from a file name's extension.
///
/// Works on segment templates too; `v_$Number$.m4s` resolves through the
/// trailing `.m4s`.
pub fn determine_container_from_file_name(file_name: &str) -> MediaContainer {
    let Some((_, extension)) = file_name.rsplit_once('.') else {
        return MediaContainer::Unknown;
    };
    match extension.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" | "m4a" | "m4s" | "mov" | "cmfv" | "cmfa" => MediaContainer::Mp4,
        "ts" | "mts" | "m2ts" => MediaContainer::Mpeg2Ts,
        "vtt" | "webvtt" => MediaContainer::WebVtt,
        "ttml" => MediaContainer::Ttml,
        "aac" => MediaContainer::Aac,
        "ac3" => MediaContainer::Ac3,
        "ec3" | "eac3" => MediaContainer::Eac3,
        "webm" => MediaContainer::WebM,
        _ => MediaContainer::Unknown,
    }
}

/// Determine the container from an explicit format name, e.g. the
/// `output_format` field of a stream descriptor.
pub fn determine_container_from_format_name(name: &str) -> MediaContainer {
    match name.to_ascii_lowercase().as_str() {
        "mp4" | "mov" | "m4s" => MediaContainer::Mp4,
        "ts" | "mp2t" | "mpeg2ts" => MediaContainer::Mpeg2Ts,
        "vtt" | "webvtt" => MediaContainer::WebVtt,
        "ttml" => MediaContainer::Ttml,
        "aac" => MediaContainer::Aac,
        "ac3" => MediaContainer::Ac3,
        "ec3" | "eac3" => MediaContainer::Eac3,
        "webm" => MediaContainer::WebM,
        _ => MediaContainer::Unknown,
    }
}
