//! Error types for the pipeline layer.
//!
//! Every packaging stage reports through the shared status type in
//! `abrpack-core`, so this is a re-export rather than a new hierarchy.

pub use abrpack_core::error::{Error, Result};
