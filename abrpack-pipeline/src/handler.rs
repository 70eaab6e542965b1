//! Media handler abstractions.
//!
//! A packaging run is a DAG of handlers. Origin handlers (demuxers, text
//! parsers) pull data in; every other handler receives [`StreamData`] from
//! its upstream and forwards results to its downstreams. The graph is built
//! once, before any job runs, by [`chain`]-ing handlers together.

use crate::error::Result;
use abrpack_core::Error;
use parking_lot::Mutex;
use std::sync::Arc;

/// What a handler node is. Used for diagnostics and graph inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum HandlerKind {
    /// Input demuxer.
    Demuxer,
    /// Cue alignment handler.
    CueAligner,
    /// A/V segment chunker.
    Chunker,
    /// Text segment chunker.
    TextChunker,
    /// Encryption handler.
    Encryptor,
    /// Fan-out replicator.
    Replicator,
    /// Trick-play down-sampler.
    TrickPlay,
    /// Output muxer.
    Muxer,
    /// Text parser origin.
    TextParser,
    /// Text gap padder.
    TextPadder,
    /// WebVTT-in-MP4 converter.
    TextToMp4,
    /// Segmented text writer.
    TextOutput,
}

/// Stream metadata announced ahead of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Stream index within the origin.
    pub stream_index: u32,
    /// Ticks per second for sample timestamps.
    pub time_scale: u32,
}

/// One demuxed media sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSample {
    /// Stream index within the origin.
    pub stream_index: u32,
    /// Presentation timestamp in time-scale ticks.
    pub pts: i64,
    /// Decode timestamp in time-scale ticks.
    pub dts: i64,
    /// Duration in time-scale ticks.
    pub duration: i64,
    /// Whether this sample is a stream access point.
    pub is_key_frame: bool,
    /// Whether the payload has been encrypted.
    pub is_encrypted: bool,
    /// Sample payload.
    pub data: Vec<u8>,
}

/// One text cue.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSample {
    /// Cue identifier, empty when the cue has none.
    pub id: String,
    /// Cue start in milliseconds.
    pub start_time_ms: i64,
    /// Cue end in milliseconds.
    pub end_time_ms: i64,
    /// Cue settings string.
    pub settings: String,
    /// Cue payload.
    pub payload: String,
}

impl TextSample {
    /// Whether this sample carries no visible text.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Marks the end of one finished segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentInfo {
    /// Segment start in time-scale ticks (milliseconds for text).
    pub start_time: i64,
    /// Segment duration in the same unit as `start_time`.
    pub duration: i64,
    /// Whether this closes a subsegment rather than a full segment.
    pub is_subsegment: bool,
}

/// A cue point crossing, emitted by cue aligners ahead of the first sample
/// at or past the cue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueEvent {
    /// Cue time in seconds.
    pub time_in_seconds: f64,
}

/// Data flowing between handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamData {
    /// Stream metadata.
    StreamInfo(StreamInfo),
    /// A media sample.
    MediaSample(MediaSample),
    /// A text cue.
    TextSample(TextSample),
    /// A finished segment.
    SegmentInfo(SegmentInfo),
    /// A cue point crossing.
    CueEvent(CueEvent),
}

/// A node in the packaging graph.
pub trait MediaHandler: Send + Sync {
    /// What this handler is.
    fn kind(&self) -> HandlerKind;

    /// The handler as [`std::any::Any`], for graph inspection.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Whether this handler pulls data in rather than receiving it from an
    /// upstream. Only origin handlers are registered with the job manager.
    fn is_origin(&self) -> bool {
        false
    }

    /// Connect a downstream handler. Called repeatedly on fan-out nodes.
    fn add_downstream(&self, downstream: Arc<dyn MediaHandler>) -> Result<()>;

    /// The currently connected downstream handlers, in connection order.
    fn downstreams(&self) -> Vec<Arc<dyn MediaHandler>>;

    /// Validate wiring before the run starts.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Accept one unit of data from upstream.
    fn process(&self, data: StreamData) -> Result<()>;

    /// Upstream is done; drain buffered state downstream.
    fn flush(&self) -> Result<()>;
}

/// A graph node the job manager drives directly.
pub trait OriginHandler: MediaHandler {
    /// Pull all data through the graph. Blocks until done or cancelled.
    fn run(&self) -> Result<()>;

    /// Ask a running origin to stop at its next yield point.
    fn cancel(&self);
}

/// Downstream bookkeeping shared by handler implementations.
///
/// Most handlers forward to a single downstream; fan-out nodes accumulate
/// several. Dispatch clones data only when more than one tail is connected.
#[derive(Default)]
pub struct DownstreamSet {
    downstreams: Mutex<Vec<Arc<dyn MediaHandler>>>,
}

impl DownstreamSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a downstream handler.
    pub fn add(&self, downstream: Arc<dyn MediaHandler>) {
        self.downstreams.lock().push(downstream);
    }

    /// Snapshot of the connected handlers.
    pub fn list(&self) -> Vec<Arc<dyn MediaHandler>> {
        self.downstreams.lock().clone()
    }

    /// Whether no downstream is connected yet.
    pub fn is_empty(&self) -> bool {
        self.downstreams.lock().is_empty()
    }

    /// Forward data to every connected downstream.
    pub fn dispatch(&self, data: StreamData) -> Result<()> {
        let downstreams = self.list();
        let Some((last, rest)) = downstreams.split_last() else {
            return Ok(());
        };
        for downstream in rest {
            downstream.process(data.clone())?;
        }
        last.process(data)
    }

    /// Flush every connected downstream.
    pub fn flush_all(&self) -> Result<()> {
        for downstream in self.list() {
            downstream.flush()?;
        }
        Ok(())
    }
}

/// Wire a sequence of handlers upstream-to-downstream.
///
/// `None` entries are skipped. Each present handler becomes a downstream of
/// the nearest present handler before it. Calling `chain` again with the
/// same head extends that head with a new tail, which is how a replicator
/// fans out across repeated calls.
pub fn chain(handlers: &[Option<Arc<dyn MediaHandler>>]) -> Result<()> {
    let mut previous: Option<&Arc<dyn MediaHandler>> = None;
    for handler in handlers.iter().flatten() {
        if let Some(upstream) = previous {
            upstream.add_downstream(Arc::clone(handler))?;
        }
        previous = Some(handler);
    }
    Ok(())
}

/// Error for handlers that accept no downstream.
pub(crate) fn terminal_handler_error(kind: HandlerKind) -> Error {
    Error::InvalidArgument(format!("{kind:?} is a terminal handler."))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        kind: HandlerKind,
        downstreams: DownstreamSet,
        seen: Mutex<Vec<StreamData>>,
        flushed: Mutex<bool>,
    }

    impl Probe {
        fn new(kind: HandlerKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                downstreams: DownstreamSet::new(),
                seen: Mutex::new(Vec::new()),
                flushed: Mutex::new(false),
            })
        }
    }

    impl MediaHandler for Probe {
        fn kind(&self) -> HandlerKind {
            self.kind
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
            self.seen.lock().push(data.clone());
            self.downstreams.dispatch(data)
        }

        fn flush(&self) -> Result<()> {
            *self.flushed.lock() = true;
            self.downstreams.flush_all()
        }
    }

    fn sample(pts: i64) -> StreamData {
        StreamData::MediaSample(MediaSample {
            stream_index: 0,
            pts,
            dts: pts,
            duration: 1,
            is_key_frame: true,
            is_encrypted: false,
            data: Vec::new(),
        })
    }

    #[test]
    fn test_chain_connects_in_order() {
        let a = Probe::new(HandlerKind::Chunker);
        let b = Probe::new(HandlerKind::Encryptor);
        let c = Probe::new(HandlerKind::Replicator);

        chain(&[
            Some(a.clone() as Arc<dyn MediaHandler>),
            Some(b.clone() as Arc<dyn MediaHandler>),
            Some(c.clone() as Arc<dyn MediaHandler>),
        ])
        .unwrap();

        assert_eq!(a.downstreams().len(), 1);
        assert_eq!(a.downstreams()[0].kind(), HandlerKind::Encryptor);
        assert_eq!(b.downstreams()[0].kind(), HandlerKind::Replicator);
        assert!(c.downstreams().is_empty());
    }

    #[test]
    fn test_chain_skips_none_entries() {
        let a = Probe::new(HandlerKind::Chunker);
        let c = Probe::new(HandlerKind::Replicator);

        chain(&[
            Some(a.clone() as Arc<dyn MediaHandler>),
            None,
            Some(c.clone() as Arc<dyn MediaHandler>),
        ])
        .unwrap();

        assert_eq!(a.downstreams()[0].kind(), HandlerKind::Replicator);
    }

    #[test]
    fn test_repeated_chain_fans_out() {
        let replicator = Probe::new(HandlerKind::Replicator);
        let tail_one = Probe::new(HandlerKind::Muxer);
        let tail_two = Probe::new(HandlerKind::Muxer);

        chain(&[
            Some(replicator.clone() as Arc<dyn MediaHandler>),
            Some(tail_one.clone() as Arc<dyn MediaHandler>),
        ])
        .unwrap();
        chain(&[
            Some(replicator.clone() as Arc<dyn MediaHandler>),
            Some(tail_two.clone() as Arc<dyn MediaHandler>),
        ])
        .unwrap();

        assert_eq!(replicator.downstreams().len(), 2);

        replicator.process(sample(0)).unwrap();
        assert_eq!(tail_one.seen.lock().len(), 1);
        assert_eq!(tail_two.seen.lock().len(), 1);
    }

    #[test]
    fn test_flush_propagates() {
        let a = Probe::new(HandlerKind::Chunker);
        let b = Probe::new(HandlerKind::Muxer);
        chain(&[
            Some(a.clone() as Arc<dyn MediaHandler>),
            Some(b.clone() as Arc<dyn MediaHandler>),
        ])
        .unwrap();

        a.flush().unwrap();
        assert!(*b.flushed.lock());
    }
}
