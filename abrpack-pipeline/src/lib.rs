//! Handler graph and job execution for the abrpack media packager.
//!
//! A packaging run is a directed acyclic graph of media handlers. Origins
//! (demuxers, text parsers) pull data in; intermediate handlers chunk,
//! align, encrypt and replicate it; muxers and text writers sit at the
//! leaves. The graph is assembled once, then every origin is driven on its
//! own worker thread by the [`JobManager`]:
//!
//! ```text
//! ┌─────────┐   ┌─────────────┐   ┌─────────┐   ┌───────────┐   ┌────────────┐
//! │ Demuxer │──▶│ CueAligner? │──▶│ Chunker │──▶│ Encryptor │──▶│ Replicator │
//! └─────────┘   └─────────────┘   └─────────┘   └───────────┘   └─────┬──────┘
//!                                                       ┌─────────────┼─────────────┐
//!                                                       ▼             ▼             ▼
//!                                                    Muxer     TrickPlay→Muxer   Muxer
//! ```
//!
//! # Modules
//!
//! - [`handler`] - The [`MediaHandler`] trait, stream data, and graph wiring
//! - [`demuxer`] - Shared per-input demuxer origin
//! - [`chunking`] - A/V and text segment chunkers
//! - [`cue`] - Ad-cue sync points and alignment
//! - [`crypto`] - Key sources and the encryption handler
//! - [`replicator`] - Stream fan-out
//! - [`trick_play`] - Trick-play down-sampling
//! - [`text`] - WebVTT parsing, padding, MP4 conversion and segmented output
//! - [`listener`] - Muxer event listeners
//! - [`job`] - Job management

pub mod chunking;
pub mod crypto;
pub mod cue;
pub mod demuxer;
pub mod error;
pub mod handler;
pub mod job;
pub mod listener;
pub mod replicator;
pub mod text;
pub mod trick_play;

#[cfg(test)]
mod test_support;

pub use chunking::{ChunkingHandler, TextChunker};
pub use crypto::{
    create_decryption_key_source, create_encryption_key_source, EncryptionHandler, EncryptionKey,
    KeySource, RawKeySource,
};
pub use cue::{CueAlignmentHandler, SyncPointQueue};
pub use demuxer::Demuxer;
pub use error::{Error, Result};
pub use handler::{
    chain, CueEvent, DownstreamSet, HandlerKind, MediaHandler, MediaSample, OriginHandler,
    SegmentInfo, StreamData, StreamInfo, TextSample,
};
pub use job::{Job, JobManager};
pub use listener::MuxerListener;
pub use replicator::Replicator;
pub use text::{TextPadder, WebVttParser, WebVttTextOutputHandler, WebVttToMp4Handler};
pub use trick_play::TrickPlayHandler;
