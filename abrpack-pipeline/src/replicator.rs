//! Stream fan-out.

use crate::error::Result;
use crate::handler::{DownstreamSet, HandlerKind, MediaHandler, StreamData};
use std::sync::Arc;

/// Fans one input stream out to any number of downstream tails.
///
/// One replicator exists per `(input, stream selector)` pair; every muxer
/// tail for that stream hangs off it. Tails see data in connection order.
#[derive(Default)]
pub struct Replicator {
    downstreams: DownstreamSet,
}

impl Replicator {
    /// Create a replicator with no tails.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaHandler for Replicator {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Replicator
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
        self.downstreams.dispatch(data)
    }

    fn flush(&self) -> Result<()> {
        self.downstreams.flush_all()
    }
}
