//! Trick-play down-sampling.

use crate::error::Result;
use crate::handler::{DownstreamSet, HandlerKind, MediaHandler, StreamData};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct TrickPlayState {
    key_frames_seen: u64,
}

/// Produces an n×-speed trick-play rendition by keeping every n-th key
/// frame and dropping everything else.
pub struct TrickPlayHandler {
    factor: u32,
    downstreams: DownstreamSet,
    state: Mutex<TrickPlayState>,
}

impl TrickPlayHandler {
    /// Create a handler for the given trick-play factor. The factor must be
    /// non-zero; factor 0 marks a main track, which takes no handler.
    pub fn new(factor: u32) -> Self {
        debug_assert!(factor != 0);
        Self {
            factor,
            downstreams: DownstreamSet::new(),
            state: Mutex::new(TrickPlayState::default()),
        }
    }

    /// The trick-play factor.
    pub fn factor(&self) -> u32 {
        self.factor
    }
}

impl MediaHandler for TrickPlayHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::TrickPlay
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
        if let StreamData::MediaSample(sample) = &data {
            if !sample.is_key_frame {
                return Ok(());
            }
            let mut state = self.state.lock();
            let index = state.key_frames_seen;
            state.key_frames_seen += 1;
            if index % u64::from(self.factor) != 0 {
                return Ok(());
            }
        }
        self.downstreams.dispatch(data)
    }

    fn flush(&self) -> Result<()> {
        self.downstreams.flush_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MediaSample;
    use crate::test_support::CollectingSink;

    fn sample(pts: i64, key: bool) -> StreamData {
        StreamData::MediaSample(MediaSample {
            stream_index: 0,
            pts,
            dts: pts,
            duration: 1,
            is_key_frame: key,
            is_encrypted: false,
            data: Vec::new(),
        })
    }

    #[test]
    fn test_keeps_every_nth_key_frame() {
        let handler = TrickPlayHandler::new(2);
        let sink = CollectingSink::new();
        handler.add_downstream(sink.clone()).unwrap();

        for pts in 0..6 {
            handler.process(sample(pts, true)).unwrap();
        }
        // Key frames 0, 2, 4 pass.
        let seen = sink.media_sample_pts();
        assert_eq!(seen, vec![0, 2, 4]);
    }

    #[test]
    fn test_drops_non_key_frames() {
        let handler = TrickPlayHandler::new(1);
        let sink = CollectingSink::new();
        handler.add_downstream(sink.clone()).unwrap();

        handler.process(sample(0, true)).unwrap();
        handler.process(sample(1, false)).unwrap();
        handler.process(sample(2, true)).unwrap();

        assert_eq!(sink.media_sample_pts(), vec![0, 2]);
    }
}
