//! Segment chunking.

use crate::error::Result;
use crate::handler::{DownstreamSet, HandlerKind, MediaHandler, SegmentInfo, StreamData};
use abrpack_core::params::ChunkingParams;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct ChunkingState {
    time_scale: u32,
    segment_start: Option<i64>,
    last_sample_end: i64,
}

/// Splits an A/V stream into segments at access-point-aligned boundaries.
///
/// A segment closes when a sample at or past the target duration arrives;
/// with `segment_sap_aligned` set, the boundary additionally waits for a key
/// frame. A cue event closes the current segment immediately so all streams
/// share a boundary at the cue.
pub struct ChunkingHandler {
    params: ChunkingParams,
    downstreams: DownstreamSet,
    state: Mutex<ChunkingState>,
}

impl ChunkingHandler {
    /// Create a chunker from chunking parameters.
    pub fn new(params: ChunkingParams) -> Self {
        Self {
            params,
            downstreams: DownstreamSet::new(),
            state: Mutex::new(ChunkingState::default()),
        }
    }

    /// The chunking parameters this handler segments with.
    pub fn params(&self) -> &ChunkingParams {
        &self.params
    }

    fn segment_duration_ticks(&self, time_scale: u32) -> i64 {
        (self.params.segment_duration_in_seconds * f64::from(time_scale)) as i64
    }

    fn close_segment(&self, state: &mut ChunkingState, end_time: i64) -> Result<()> {
        let Some(start) = state.segment_start.take() else {
            return Ok(());
        };
        if end_time <= start {
            return Ok(());
        }
        self.downstreams.dispatch(StreamData::SegmentInfo(SegmentInfo {
            start_time: start,
            duration: end_time - start,
            is_subsegment: false,
        }))
    }
}

impl MediaHandler for ChunkingHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Chunker
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
        match data {
            StreamData::StreamInfo(info) => {
                self.state.lock().time_scale = info.time_scale;
                self.downstreams.dispatch(StreamData::StreamInfo(info))
            }
            StreamData::MediaSample(sample) => {
                let mut state = self.state.lock();
                let time_scale = state.time_scale.max(1);
                let target = self.segment_duration_ticks(time_scale);

                let boundary_due = state
                    .segment_start
                    .is_some_and(|start| sample.pts - start >= target);
                let boundary_allowed = !self.params.segment_sap_aligned || sample.is_key_frame;
                if boundary_due && boundary_allowed {
                    self.close_segment(&mut state, sample.pts)?;
                }

                if state.segment_start.is_none() {
                    state.segment_start = Some(sample.pts);
                }
                state.last_sample_end = sample.pts + sample.duration;
                drop(state);

                self.downstreams.dispatch(StreamData::MediaSample(sample))
            }
            StreamData::CueEvent(cue) => {
                let mut state = self.state.lock();
                let time_scale = state.time_scale.max(1);
                let cue_ticks = (cue.time_in_seconds * f64::from(time_scale)) as i64;
                self.close_segment(&mut state, cue_ticks)?;
                drop(state);

                self.downstreams.dispatch(StreamData::CueEvent(cue))
            }
            other => self.downstreams.dispatch(other),
        }
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        let end = state.last_sample_end;
        self.close_segment(&mut state, end)?;
        drop(state);
        self.downstreams.flush_all()
    }
}

#[derive(Default)]
struct TextChunkState {
    segment_start_ms: i64,
}

/// Splits a text stream into fixed-duration segments.
///
/// Text cues have no access points, so boundaries fall exactly at multiples
/// of the segment duration.
pub struct TextChunker {
    segment_duration_ms: i64,
    downstreams: DownstreamSet,
    state: Mutex<TextChunkState>,
}

impl TextChunker {
    /// Create a text chunker with the given segment length in seconds.
    pub fn new(segment_duration_in_seconds: f64) -> Self {
        Self {
            segment_duration_ms: (segment_duration_in_seconds * 1000.0) as i64,
            downstreams: DownstreamSet::new(),
            state: Mutex::new(TextChunkState::default()),
        }
    }

    /// Segment duration in milliseconds.
    pub fn segment_duration_ms(&self) -> i64 {
        self.segment_duration_ms
    }

    fn emit_segments_until(&self, state: &mut TextChunkState, time_ms: i64) -> Result<()> {
        while time_ms >= state.segment_start_ms + self.segment_duration_ms {
            self.downstreams.dispatch(StreamData::SegmentInfo(SegmentInfo {
                start_time: state.segment_start_ms,
                duration: self.segment_duration_ms,
                is_subsegment: false,
            }))?;
            state.segment_start_ms += self.segment_duration_ms;
        }
        Ok(())
    }
}

impl MediaHandler for TextChunker {
    fn kind(&self) -> HandlerKind {
        HandlerKind::TextChunker
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
        match data {
            StreamData::TextSample(sample) => {
                let mut state = self.state.lock();
                self.emit_segments_until(&mut state, sample.start_time_ms)?;
                drop(state);
                self.downstreams.dispatch(StreamData::TextSample(sample))
            }
            StreamData::CueEvent(cue) => {
                let cue_ms = (cue.time_in_seconds * 1000.0) as i64;
                let mut state = self.state.lock();
                if cue_ms > state.segment_start_ms {
                    self.downstreams.dispatch(StreamData::SegmentInfo(SegmentInfo {
                        start_time: state.segment_start_ms,
                        duration: cue_ms - state.segment_start_ms,
                        is_subsegment: false,
                    }))?;
                    state.segment_start_ms = cue_ms;
                }
                drop(state);
                self.downstreams.dispatch(StreamData::CueEvent(cue))
            }
            other => self.downstreams.dispatch(other),
        }
    }

    fn flush(&self) -> Result<()> {
        // Close the trailing partial segment.
        let mut state = self.state.lock();
        self.downstreams.dispatch(StreamData::SegmentInfo(SegmentInfo {
            start_time: state.segment_start_ms,
            duration: self.segment_duration_ms,
            is_subsegment: false,
        }))?;
        state.segment_start_ms += self.segment_duration_ms;
        drop(state);
        self.downstreams.flush_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{MediaSample, StreamInfo, TextSample};
    use crate::test_support::CollectingSink;

    fn sample(pts: i64, key: bool) -> StreamData {
        StreamData::MediaSample(MediaSample {
            stream_index: 0,
            pts,
            dts: pts,
            duration: 1000,
            is_key_frame: key,
            is_encrypted: false,
            data: Vec::new(),
        })
    }

    #[test]
    fn test_chunker_emits_segment_at_duration() {
        let chunker = ChunkingHandler::new(ChunkingParams {
            segment_duration_in_seconds: 2.0,
            ..Default::default()
        });
        let sink = CollectingSink::new();
        chunker.add_downstream(sink.clone()).unwrap();

        chunker
            .process(StreamData::StreamInfo(StreamInfo {
                stream_index: 0,
                time_scale: 1000,
            }))
            .unwrap();
        for pts in [0, 1000, 2000, 3000] {
            chunker.process(sample(pts, true)).unwrap();
        }
        // Boundary at pts 2000.
        assert_eq!(sink.segment_count(), 1);

        chunker.flush().unwrap();
        assert_eq!(sink.segment_count(), 2);
    }

    #[test]
    fn test_chunker_waits_for_key_frame_when_sap_aligned() {
        let chunker = ChunkingHandler::new(ChunkingParams {
            segment_duration_in_seconds: 1.0,
            segment_sap_aligned: true,
            ..Default::default()
        });
        let sink = CollectingSink::new();
        chunker.add_downstream(sink.clone()).unwrap();

        chunker
            .process(StreamData::StreamInfo(StreamInfo {
                stream_index: 0,
                time_scale: 1000,
            }))
            .unwrap();
        chunker.process(sample(0, true)).unwrap();
        chunker.process(sample(1000, false)).unwrap();
        assert_eq!(sink.segment_count(), 0);
        chunker.process(sample(2000, true)).unwrap();
        assert_eq!(sink.segment_count(), 1);
    }

    #[test]
    fn test_text_chunker_segments_by_wall_time() {
        let chunker = TextChunker::new(10.0);
        let sink = CollectingSink::new();
        chunker.add_downstream(sink.clone()).unwrap();

        chunker
            .process(StreamData::TextSample(TextSample {
                id: String::new(),
                start_time_ms: 25_000,
                end_time_ms: 26_000,
                settings: String::new(),
                payload: "hi".to_string(),
            }))
            .unwrap();

        // Cue at 25s closes the 0-10s and 10-20s segments first.
        assert_eq!(sink.segment_count(), 2);
        assert_eq!(sink.text_payloads(), vec!["hi"]);
    }
}
