//! Shared types and utilities for the abrpack media packager.
//!
//! This crate holds the leaf pieces every other abrpack crate builds on:
//! stream descriptors and packaging parameters, media container detection,
//! language canonicalization, segment template validation, media info
//! records, and the packager error type.
//!
//! # Modules
//!
//! - [`container`] - Container identification by magic bytes, file name, or
//!   format name
//! - [`descriptor`] - Stream descriptors
//! - [`error`] - Error types
//! - [`file`] - File helpers and buffer-callback name rewriting
//! - [`language`] - ISO-639-2 and shortest-form language mapping
//! - [`media_info`] - Media info records for manifest notifiers
//! - [`params`] - Packaging parameters
//! - [`template`] - Segment template grammar

pub mod container;
pub mod descriptor;
pub mod error;
pub mod file;
pub mod language;
pub mod media_info;
pub mod params;
pub mod template;

pub use container::{
    determine_container, determine_container_from_file_name,
    determine_container_from_format_name, MediaContainer,
};
pub use descriptor::StreamDescriptor;
pub use error::{Error, Result};
pub use file::{copy_file, make_callback_file_name, read_file, CALLBACK_FILE_PREFIX};
pub use language::{language_to_iso_639_2, language_to_shortest_form};
pub use media_info::{MediaInfo, MediaInfoContainerType, TextInfo};
pub use params::{
    AdCueGeneratorParams, BufferCallbackParams, ChunkingParams, Cuepoint, DecryptionParams,
    EncryptedStreamAttributes, EncryptionParams, HlsParams, HlsPlaylistType, KeyProvider,
    Mp4OutputParams, MpdParams, MuxerOptions, PackagingParams, ProtectionScheme, RawKey,
    RawKeyParams, ReadCallback, StreamLabelFn, TestParams, WriteCallback,
};
pub use template::{apply_segment_template, validate_segment_template};
