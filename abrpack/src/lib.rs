//! Adaptive-streaming media packager.
//!
//! abrpack takes a set of stream descriptors and packaging parameters,
//! assembles a graph of media-processing handlers for them, and drives that
//! graph to produce DASH and HLS ready output:
//!
//! ```text
//! StreamDescriptors ──▶ validate ──▶ normalize ──▶ split text / A-V
//!                                                       │
//!                              ┌────────────────────────┴──────┐
//!                              ▼                               ▼
//!                        text pipelines                 A/V pipelines
//!                  parser→padder→chunker→out     demuxer→chunker→encrypt→
//!                                                replicate→(trickplay)→mux
//!                              │                               │
//!                              └──────────────┬────────────────┘
//!                                             ▼
//!                                        JobManager
//! ```
//!
//! # Example
//!
//! ```no_run
//! use abrpack::{Packager, PackagingParams, StreamDescriptor};
//!
//! let params = PackagingParams::default();
//! let streams = vec![
//!     StreamDescriptor::new("input.mp4", "video").with_output("video.mp4"),
//!     StreamDescriptor::new("input.mp4", "audio").with_output("audio.mp4"),
//! ];
//!
//! let mut packager = Packager::new();
//! packager.initialize(&params, &streams)?;
//! packager.run()?;
//! # Ok::<(), abrpack::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`format`] - Output container resolution
//! - [`validate`] - Descriptor and parameter validation
//! - [`jobs`] - Pipeline graph assembly
//! - [`muxer`] - Muxers, the muxer factory, and clocks
//! - [`listener`] - Muxer listener construction
//! - [`notifier`] - DASH and HLS manifest notifiers
//! - [`packager`] - The orchestrator

pub mod format;
pub mod jobs;
pub mod listener;
pub mod muxer;
pub mod notifier;
pub mod packager;
pub mod validate;

pub use abrpack_core::{
    AdCueGeneratorParams, BufferCallbackParams, ChunkingParams, Cuepoint, DecryptionParams,
    EncryptedStreamAttributes, EncryptionParams, Error, HlsParams, HlsPlaylistType, KeyProvider,
    MediaContainer, MediaInfo, MpdParams, MuxerOptions, PackagingParams, ProtectionScheme,
    RawKey, RawKeyParams, Result, StreamDescriptor, TestParams,
};
pub use format::resolve_output_format;
pub use jobs::{create_all_jobs, stream_descriptor_order};
pub use listener::{MuxerListener, MuxerListenerFactory};
pub use muxer::{Clock, EpochClock, MuxerFactory, MuxerNode, SystemClock};
pub use notifier::{
    get_mpd_options, DashProfile, HlsNotifier, MpdNotifier, MpdOptions, MpdType,
    SimpleHlsNotifier, SimpleMpdNotifier,
};
pub use packager::Packager;
pub use validate::{validate_params, validate_stream_descriptor};
