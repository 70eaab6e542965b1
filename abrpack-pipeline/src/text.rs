//! WebVTT text stages.
//!
//! Text pipelines start from a [`WebVttParser`] origin instead of a demuxer.
//! Cues flow through a [`TextPadder`] that fills timeline gaps, then either
//! into a [`WebVttToMp4Handler`] on the way to an MP4 muxer or into a
//! [`WebVttTextOutputHandler`] that writes segmented WebVTT for HLS.

use crate::error::{Error, Result};
use crate::handler::{
    DownstreamSet, HandlerKind, MediaHandler, MediaSample, OriginHandler, StreamData, TextSample,
};
use crate::listener::MuxerListener;
use abrpack_core::media_info::{MediaInfo, MediaInfoContainerType, TextInfo};
use abrpack_core::params::MuxerOptions;
use abrpack_core::template::apply_segment_template;
use byteorder::{BigEndian, WriteBytesExt};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Parses a WebVTT file and emits one [`TextSample`] per cue.
pub struct WebVttParser {
    input: String,
    language: String,
    cancelled: AtomicBool,
    downstreams: DownstreamSet,
}

impl WebVttParser {
    /// Create a parser over a WebVTT input file.
    pub fn new(input: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            language: language.into(),
            cancelled: AtomicBool::new(false),
            downstreams: DownstreamSet::new(),
        }
    }

    /// The input file.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The language of the parsed track.
    pub fn language(&self) -> &str {
        &self.language
    }
}

impl MediaHandler for WebVttParser {
    fn kind(&self) -> HandlerKind {
        HandlerKind::TextParser
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn is_origin(&self) -> bool {
        true
    }

    fn add_downstream(&self, downstream: Arc<dyn MediaHandler>) -> Result<()> {
        self.downstreams.add(downstream);
        Ok(())
    }

    fn downstreams(&self) -> Vec<Arc<dyn MediaHandler>> {
        self.downstreams.list()
    }

    fn initialize(&self) -> Result<()> {
        if self.downstreams.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "WebVTT parser for '{}' has no downstream.",
                self.input
            )));
        }
        Ok(())
    }

    fn process(&self, _data: StreamData) -> Result<()> {
        Err(Error::InvalidArgument(
            "WebVTT parser is an origin handler; it accepts no upstream data.".to_string(),
        ))
    }

    fn flush(&self) -> Result<()> {
        self.downstreams.flush_all()
    }
}

impl OriginHandler for WebVttParser {
    fn run(&self) -> Result<()> {
        let content = std::fs::read_to_string(&self.input)?;
        for cue in parse_webvtt(&self.input, &content)? {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            self.downstreams.dispatch(StreamData::TextSample(cue))?;
        }
        self.flush()
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

fn parse_webvtt(input: &str, content: &str) -> Result<Vec<TextSample>> {
    let content = content.trim_start_matches('\u{FEFF}');
    let mut lines = content.lines().peekable();

    let header = lines.next().unwrap_or("");
    if !header.trim_end().starts_with("WEBVTT") {
        return Err(Error::ParserFailure(format!(
            "'{input}' does not start with a WEBVTT header."
        )));
    }

    let mut cues = Vec::new();
    while let Some(line) = lines.next() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Skip comments and style/region blocks.
        if line.starts_with("NOTE") || line.starts_with("STYLE") || line.starts_with("REGION") {
            for block_line in lines.by_ref() {
                if block_line.trim().is_empty() {
                    break;
                }
            }
            continue;
        }

        // A cue block: optional identifier line, then the timing line.
        let (id, timing_line) = if line.contains("-->") {
            (String::new(), line.to_string())
        } else {
            let Some(timing) = lines.next() else { break };
            (line.to_string(), timing.trim().to_string())
        };

        let (start_time_ms, end_time_ms, settings) = parse_timing_line(input, &timing_line)?;

        let mut payload_lines = Vec::new();
        for payload_line in lines.by_ref() {
            if payload_line.trim().is_empty() {
                break;
            }
            payload_lines.push(payload_line.trim_end());
        }

        cues.push(TextSample {
            id,
            start_time_ms,
            end_time_ms,
            settings,
            payload: payload_lines.join("\n"),
        });
    }

    Ok(cues)
}

fn parse_timing_line(input: &str, line: &str) -> Result<(i64, i64, String)> {
    let Some((start_part, rest)) = line.split_once("-->") else {
        return Err(Error::ParserFailure(format!(
            "'{input}' has a cue without a valid timing line: '{line}'."
        )));
    };
    let mut rest_parts = rest.trim().splitn(2, char::is_whitespace);
    let end_part = rest_parts.next().unwrap_or("");
    let settings = rest_parts.next().unwrap_or("").trim().to_string();

    let start = parse_timestamp(start_part.trim())
        .ok_or_else(|| Error::ParserFailure(format!("'{input}' has a bad cue start: '{line}'.")))?;
    let end = parse_timestamp(end_part)
        .ok_or_else(|| Error::ParserFailure(format!("'{input}' has a bad cue end: '{line}'.")))?;
    Ok((start, end, settings))
}

/// Parse `hh:mm:ss.mmm` or `mm:ss.mmm` into milliseconds.
fn parse_timestamp(value: &str) -> Option<i64> {
    let (clock, millis) = value.split_once('.')?;
    let millis: i64 = millis.parse().ok()?;
    if millis >= 1000 {
        return None;
    }

    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<i64>().ok()?, m.parse::<i64>().ok()?, s.parse::<i64>().ok()?),
        [m, s] => (0, m.parse::<i64>().ok()?, s.parse::<i64>().ok()?),
        _ => return None,
    };
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis)
}

#[derive(Default)]
struct PadderState {
    last_end_ms: i64,
}

/// Fills timeline gaps between cues with empty samples so downstream
/// chunkers always see a contiguous timeline.
pub struct TextPadder {
    min_duration_ms: i64,
    downstreams: DownstreamSet,
    state: Mutex<PadderState>,
}

impl TextPadder {
    /// Create a padder. `min_duration_ms` extends the stream to at least
    /// that long at flush; 0 disables the trailing pad.
    pub fn new(min_duration_ms: i64) -> Self {
        Self {
            min_duration_ms,
            downstreams: DownstreamSet::new(),
            state: Mutex::new(PadderState::default()),
        }
    }

    fn pad_to(&self, state: &mut PadderState, time_ms: i64) -> Result<()> {
        if time_ms <= state.last_end_ms {
            return Ok(());
        }
        let gap = TextSample {
            id: String::new(),
            start_time_ms: state.last_end_ms,
            end_time_ms: time_ms,
            settings: String::new(),
            payload: String::new(),
        };
        state.last_end_ms = time_ms;
        self.downstreams.dispatch(StreamData::TextSample(gap))
    }
}

impl MediaHandler for TextPadder {
    fn kind(&self) -> HandlerKind {
        HandlerKind::TextPadder
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn add_downstream(&self, downstream: Arc<dyn MediaHandler>) -> Result<()> {
        self.downstreams.add(downstream);
        Ok(())
    }

    fn downstreams(&self) -> Vec<Arc<dyn MediaHandler>> {
        self.downstreams.list()
    }

    fn process(&self, data: StreamData) -> Result<()> {
        if let StreamData::TextSample(sample) = &data {
            let mut state = self.state.lock();
            self.pad_to(&mut state, sample.start_time_ms)?;
            state.last_end_ms = state.last_end_ms.max(sample.end_time_ms);
        }
        self.downstreams.dispatch(data)
    }

    fn flush(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            let min = self.min_duration_ms;
            self.pad_to(&mut state, min)?;
        }
        self.downstreams.flush_all()
    }
}

/// Converts text cues into MP4 `wvtt` samples.
///
/// Each cue becomes a `vttc` box wrapping a `payl` box; gaps become `vtte`
/// boxes, so the MP4 timeline stays contiguous.
#[derive(Default)]
pub struct WebVttToMp4Handler {
    downstreams: DownstreamSet,
}

impl WebVttToMp4Handler {
    /// Create the converter.
    pub fn new() -> Self {
        Self::default()
    }

    fn to_mp4_sample(sample: &TextSample) -> Result<MediaSample> {
        let data = if sample.is_empty() {
            write_box(b"vtte", &[])?
        } else {
            let payload = write_box(b"payl", sample.payload.as_bytes())?;
            write_box(b"vttc", &payload)?
        };
        Ok(MediaSample {
            stream_index: 0,
            pts: sample.start_time_ms,
            dts: sample.start_time_ms,
            duration: sample.end_time_ms - sample.start_time_ms,
            is_key_frame: true,
            is_encrypted: false,
            data,
        })
    }
}

fn write_box(box_type: &[u8; 4], payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.write_u32::<BigEndian>((8 + payload.len()) as u32)?;
    out.write_all(box_type)?;
    out.write_all(payload)?;
    Ok(out)
}

impl MediaHandler for WebVttToMp4Handler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::TextToMp4
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn add_downstream(&self, downstream: Arc<dyn MediaHandler>) -> Result<()> {
        self.downstreams.add(downstream);
        Ok(())
    }

    fn downstreams(&self) -> Vec<Arc<dyn MediaHandler>> {
        self.downstreams.list()
    }

    fn process(&self, data: StreamData) -> Result<()> {
        let data = match data {
            StreamData::TextSample(sample) => {
                StreamData::MediaSample(Self::to_mp4_sample(&sample)?)
            }
            other => other,
        };
        self.downstreams.dispatch(data)
    }

    fn flush(&self) -> Result<()> {
        self.downstreams.flush_all()
    }
}

#[derive(Default)]
struct TextOutputState {
    segment_number: u64,
    buffered: Vec<TextSample>,
    segments_written: u64,
}

/// Writes segmented WebVTT files for HLS.
///
/// Buffers cues until the upstream chunker closes a segment, then writes one
/// `.vtt` file per segment from the segment template.
pub struct WebVttTextOutputHandler {
    options: MuxerOptions,
    listener: Box<dyn MuxerListener>,
    state: Mutex<TextOutputState>,
}

impl WebVttTextOutputHandler {
    /// Create the output handler over muxer options and a listener.
    pub fn new(options: MuxerOptions, listener: Box<dyn MuxerListener>) -> Self {
        Self {
            options,
            listener,
            state: Mutex::new(TextOutputState::default()),
        }
    }

    /// The muxer options this handler writes with.
    pub fn options(&self) -> &MuxerOptions {
        &self.options
    }

    /// How many segments have been written so far.
    pub fn segments_written(&self) -> u64 {
        self.state.lock().segments_written
    }

    fn write_segment(&self, state: &mut TextOutputState, start: i64, duration: i64) -> Result<()> {
        state.segment_number += 1;
        let file_name = apply_segment_template(
            &self.options.segment_template,
            state.segment_number,
            start.max(0) as u64,
            "",
            self.options.bandwidth,
        );

        let mut content = String::from("WEBVTT\n\n");
        let segment_end = start + duration;
        for cue in &state.buffered {
            if cue.is_empty() || cue.start_time_ms >= segment_end || cue.end_time_ms <= start {
                continue;
            }
            if !cue.id.is_empty() {
                content.push_str(&cue.id);
                content.push('\n');
            }
            content.push_str(&format!(
                "{} --> {}",
                format_timestamp(cue.start_time_ms),
                format_timestamp(cue.end_time_ms)
            ));
            if !cue.settings.is_empty() {
                content.push(' ');
                content.push_str(&cue.settings);
            }
            content.push('\n');
            content.push_str(&cue.payload);
            content.push_str("\n\n");
        }

        std::fs::write(&file_name, content.as_bytes()).map_err(|e| {
            Error::FileFailure(format!("Failed to write text segment '{file_name}': {e}."))
        })?;
        debug!(segment = %file_name, "wrote text segment");

        state.buffered.retain(|cue| cue.end_time_ms > segment_end);
        state.segments_written += 1;
        self.listener
            .on_new_segment(&file_name, start, duration, content.len() as u64);
        Ok(())
    }
}

fn format_timestamp(ms: i64) -> String {
    let millis = ms % 1000;
    let seconds = (ms / 1000) % 60;
    let minutes = (ms / 60_000) % 60;
    let hours = ms / 3_600_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

impl MediaHandler for WebVttTextOutputHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::TextOutput
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn add_downstream(&self, _downstream: Arc<dyn MediaHandler>) -> Result<()> {
        Err(crate::handler::terminal_handler_error(HandlerKind::TextOutput))
    }

    fn downstreams(&self) -> Vec<Arc<dyn MediaHandler>> {
        Vec::new()
    }

    fn process(&self, data: StreamData) -> Result<()> {
        match data {
            StreamData::TextSample(sample) => {
                self.state.lock().buffered.push(sample);
                Ok(())
            }
            StreamData::SegmentInfo(info) => {
                let mut state = self.state.lock();
                self.write_segment(&mut state, info.start_time, info.duration)
            }
            _ => Ok(()),
        }
    }

    fn flush(&self) -> Result<()> {
        let media_info = MediaInfo {
            media_file_name: self.options.segment_template.clone(),
            bandwidth: self.options.bandwidth,
            container_type: MediaInfoContainerType::Text,
            text_info: Some(TextInfo {
                codec: "wvtt".to_string(),
                language: String::new(),
            }),
        };
        self.listener.on_media_end(&media_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CollectingSink;
    use std::io::Write as _;

    const SAMPLE_VTT: &str = "WEBVTT\n\n\
        intro\n00:00:01.000 --> 00:00:03.000 align:center\nHello\n\n\
        00:00:05.000 --> 00:00:07.500\nWorld\nagain\n";

    #[test]
    fn test_parse_webvtt_cues() {
        let cues = parse_webvtt("test.vtt", SAMPLE_VTT).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].id, "intro");
        assert_eq!(cues[0].start_time_ms, 1000);
        assert_eq!(cues[0].end_time_ms, 3000);
        assert_eq!(cues[0].settings, "align:center");
        assert_eq!(cues[0].payload, "Hello");
        assert_eq!(cues[1].payload, "World\nagain");
        assert_eq!(cues[1].end_time_ms, 7500);
    }

    #[test]
    fn test_parse_webvtt_rejects_missing_header() {
        assert!(parse_webvtt("bad.vtt", "00:00:01.000 --> 00:00:02.000\nhi\n").is_err());
    }

    #[test]
    fn test_parse_webvtt_skips_notes() {
        let content = "WEBVTT\n\nNOTE a comment\nmore comment\n\n00:01.000 --> 00:02.000\nhi\n";
        let cues = parse_webvtt("test.vtt", content).unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].start_time_ms, 1000);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(parse_timestamp("00:00:01.000"), Some(1000));
        assert_eq!(parse_timestamp("01:02.500"), Some(62_500));
        assert_eq!(parse_timestamp("01:00:00.001"), Some(3_600_001));
        assert_eq!(parse_timestamp("1.000"), None);
        assert_eq!(parse_timestamp("00:61.000"), None);
    }

    #[test]
    fn test_parser_run_emits_cues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("en.vtt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE_VTT.as_bytes()).unwrap();

        let parser = WebVttParser::new(path.to_str().unwrap(), "en");
        let sink = CollectingSink::new();
        parser.add_downstream(sink.clone()).unwrap();

        parser.run().unwrap();
        assert_eq!(sink.text_payloads(), vec!["Hello", "World\nagain"]);
        assert!(sink.was_flushed());
    }

    #[test]
    fn test_padder_fills_gaps() {
        let padder = TextPadder::new(0);
        let sink = CollectingSink::new();
        padder.add_downstream(sink.clone()).unwrap();

        padder
            .process(StreamData::TextSample(TextSample {
                id: String::new(),
                start_time_ms: 2000,
                end_time_ms: 3000,
                settings: String::new(),
                payload: "hi".to_string(),
            }))
            .unwrap();

        let payloads = sink.text_payloads();
        assert_eq!(payloads, vec!["", "hi"]);
    }

    #[test]
    fn test_webvtt_to_mp4_wraps_cues_in_boxes() {
        let handler = WebVttToMp4Handler::new();
        let sink = CollectingSink::new();
        handler.add_downstream(sink.clone()).unwrap();

        handler
            .process(StreamData::TextSample(TextSample {
                id: String::new(),
                start_time_ms: 0,
                end_time_ms: 1000,
                settings: String::new(),
                payload: "hi".to_string(),
            }))
            .unwrap();
        handler
            .process(StreamData::TextSample(TextSample {
                id: String::new(),
                start_time_ms: 1000,
                end_time_ms: 2000,
                settings: String::new(),
                payload: String::new(),
            }))
            .unwrap();

        let seen = sink.seen();
        let StreamData::MediaSample(cue_sample) = &seen[0] else {
            panic!("expected a media sample");
        };
        assert_eq!(&cue_sample.data[4..8], b"vttc");
        assert_eq!(&cue_sample.data[12..16], b"payl");
        let StreamData::MediaSample(gap_sample) = &seen[1] else {
            panic!("expected a media sample");
        };
        assert_eq!(&gap_sample.data[4..8], b"vtte");
    }
}
