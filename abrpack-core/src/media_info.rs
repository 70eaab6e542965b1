//! Media info records handed to manifest notifiers.

use serde::{Deserialize, Serialize};

/// Container type of a described media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaInfoContainerType {
    /// Not determined.
    #[default]
    Unknown,
    /// ISO-BMFF.
    Mp4,
    /// MPEG-2 TS.
    MpegTs,
    /// Packed audio.
    PackedAudio,
    /// Plain text (WebVTT, TTML).
    Text,
}

/// Text track details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextInfo {
    /// Codec string, e.g. `"wvtt"` or `"ttml"`.
    pub codec: String,
    /// Language, empty when unknown.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
}

/// Describes one packaged container for manifest generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Path of the described media file.
    pub media_file_name: String,
    /// Bandwidth in bits per second.
    pub bandwidth: u32,
    /// Container type.
    pub container_type: MediaInfoContainerType,
    /// Text track details, for text streams only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_info: Option<TextInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_info_json_round_trip() {
        let info = MediaInfo {
            media_file_name: "en.vtt".to_string(),
            bandwidth: 256,
            container_type: MediaInfoContainerType::Text,
            text_info: Some(TextInfo {
                codec: "wvtt".to_string(),
                language: "eng".to_string(),
            }),
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: MediaInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_empty_language_is_omitted() {
        let info = MediaInfo {
            media_file_name: "en.vtt".to_string(),
            bandwidth: 256,
            container_type: MediaInfoContainerType::Text,
            text_info: Some(TextInfo {
                codec: "wvtt".to_string(),
                language: String::new(),
            }),
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("language"));
    }
}
