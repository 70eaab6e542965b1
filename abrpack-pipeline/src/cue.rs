//! Ad-cue alignment.
//!
//! When ad cues are configured, one [`SyncPointQueue`] is shared by every
//! cue aligner in the run so that all sources force segment boundaries at
//! the same presentation times.

use crate::error::Result;
use crate::handler::{CueEvent, DownstreamSet, HandlerKind, MediaHandler, StreamData};
use abrpack_core::params::AdCueGeneratorParams;
use parking_lot::Mutex;
use std::sync::Arc;

struct QueueState {
    /// Pending cue times in seconds, ascending.
    points: Vec<f64>,
    cancelled: bool,
}

/// Shared, thread-safe store of ad-cue alignment points.
pub struct SyncPointQueue {
    state: Mutex<QueueState>,
}

impl SyncPointQueue {
    /// Build the queue from ad-cue parameters.
    pub fn new(params: &AdCueGeneratorParams) -> Self {
        let mut points: Vec<f64> = params
            .cue_points
            .iter()
            .map(|cue| cue.start_time_in_seconds)
            .collect();
        points.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        points.dedup();
        Self {
            state: Mutex::new(QueueState {
                points,
                cancelled: false,
            }),
        }
    }

    /// Pending cue times, ascending.
    pub fn cue_points(&self) -> Vec<f64> {
        self.state.lock().points.clone()
    }

    /// The first pending cue at or after `time_in_seconds`, if any.
    pub fn next_at_or_after(&self, time_in_seconds: f64) -> Option<f64> {
        let state = self.state.lock();
        if state.cancelled {
            return None;
        }
        state
            .points
            .iter()
            .copied()
            .find(|point| *point >= time_in_seconds)
    }

    /// Retire every cue at or before `time_in_seconds`; a cue one aligner
    /// has emitted must not trigger again.
    pub fn promote_at(&self, time_in_seconds: f64) {
        let mut state = self.state.lock();
        state.points.retain(|point| *point > time_in_seconds);
    }

    /// Stop handing out cues.
    pub fn cancel(&self) {
        self.state.lock().cancelled = true;
    }

    /// Whether the queue has been cancelled.
    pub fn cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}

#[derive(Default)]
struct AlignerState {
    time_scale: u32,
}

/// Forces segment boundaries at shared cue times.
///
/// Sits between a source and its chunker; when a sample's presentation time
/// reaches a pending cue, a [`CueEvent`] is emitted ahead of the sample so
/// the chunker closes the current segment at the cue.
pub struct CueAlignmentHandler {
    sync_points: Arc<SyncPointQueue>,
    downstreams: DownstreamSet,
    state: Mutex<AlignerState>,
}

impl CueAlignmentHandler {
    /// Create an aligner over the run's shared sync points.
    pub fn new(sync_points: Arc<SyncPointQueue>) -> Self {
        Self {
            sync_points,
            downstreams: DownstreamSet::new(),
            state: Mutex::new(AlignerState::default()),
        }
    }

    /// The shared queue this aligner consults.
    pub fn sync_points(&self) -> &Arc<SyncPointQueue> {
        &self.sync_points
    }

    fn emit_due_cues(&self, sample_time_seconds: f64) -> Result<()> {
        while let Some(cue) = self.sync_points.next_at_or_after(0.0) {
            if cue > sample_time_seconds {
                break;
            }
            self.sync_points.promote_at(cue);
            self.downstreams.dispatch(StreamData::CueEvent(CueEvent {
                time_in_seconds: cue,
            }))?;
        }
        Ok(())
    }
}

impl MediaHandler for CueAlignmentHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::CueAligner
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
        match &data {
            StreamData::StreamInfo(info) => {
                self.state.lock().time_scale = info.time_scale;
            }
            StreamData::MediaSample(sample) => {
                let time_scale = self.state.lock().time_scale.max(1);
                self.emit_due_cues(sample.pts as f64 / f64::from(time_scale))?;
            }
            StreamData::TextSample(sample) => {
                self.emit_due_cues(sample.start_time_ms as f64 / 1000.0)?;
            }
            _ => {}
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
    use abrpack_core::params::Cuepoint;

    fn queue(points: &[f64]) -> SyncPointQueue {
        SyncPointQueue::new(&AdCueGeneratorParams {
            cue_points: points.iter().copied().map(Cuepoint::at).collect(),
        })
    }

    #[test]
    fn test_points_sorted_and_deduped() {
        let q = queue(&[20.0, 10.0, 20.0]);
        assert_eq!(q.cue_points(), vec![10.0, 20.0]);
    }

    #[test]
    fn test_next_and_promote() {
        let q = queue(&[10.0, 20.0]);
        assert_eq!(q.next_at_or_after(0.0), Some(10.0));
        q.promote_at(10.0);
        assert_eq!(q.next_at_or_after(0.0), Some(20.0));
        q.promote_at(25.0);
        assert_eq!(q.next_at_or_after(0.0), None);
    }

    #[test]
    fn test_cancel_stops_cues() {
        let q = queue(&[10.0]);
        q.cancel();
        assert!(q.cancelled());
        assert_eq!(q.next_at_or_after(0.0), None);
    }
}
