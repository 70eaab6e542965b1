//! Handler test doubles shared by unit tests.

use crate::error::Result;
use crate::handler::{DownstreamSet, HandlerKind, MediaHandler, StreamData};
use parking_lot::Mutex;
use std::sync::Arc;

/// Terminal handler that records everything it receives.
pub struct CollectingSink {
    seen: Mutex<Vec<StreamData>>,
    flushed: Mutex<bool>,
    downstreams: DownstreamSet,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            flushed: Mutex::new(false),
            downstreams: DownstreamSet::new(),
        })
    }

    pub fn seen(&self) -> Vec<StreamData> {
        self.seen.lock().clone()
    }

    pub fn media_sample_pts(&self) -> Vec<i64> {
        self.seen
            .lock()
            .iter()
            .filter_map(|data| match data {
                StreamData::MediaSample(sample) => Some(sample.pts),
                _ => None,
            })
            .collect()
    }

    pub fn text_payloads(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .filter_map(|data| match data {
                StreamData::TextSample(sample) => Some(sample.payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn segment_count(&self) -> usize {
        self.seen
            .lock()
            .iter()
            .filter(|data| matches!(data, StreamData::SegmentInfo(_)))
            .count()
    }

    pub fn cue_times(&self) -> Vec<f64> {
        self.seen
            .lock()
            .iter()
            .filter_map(|data| match data {
                StreamData::CueEvent(cue) => Some(cue.time_in_seconds),
                _ => None,
            })
            .collect()
    }

    pub fn was_flushed(&self) -> bool {
        *self.flushed.lock()
    }
}

impl MediaHandler for CollectingSink {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Muxer
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
        self.seen.lock().push(data);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        *self.flushed.lock() = true;
        Ok(())
    }
}
