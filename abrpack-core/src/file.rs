//! File helpers shared by the packager.

use crate::error::{Error, Result};
use crate::params::BufferCallbackParams;

/// Prefix that routes a file name through the buffer callbacks instead of
/// the filesystem.
pub const CALLBACK_FILE_PREFIX: &str = "callback://";

/// Read a whole file.
pub fn read_file(path: &str) -> Result<Vec<u8>> {
    Ok(std::fs::read(path)?)
}

/// Copy `src` to `dst`. Errors map to [`Error::FileFailure`].
pub fn copy_file(src: &str, dst: &str) -> Result<()> {
    std::fs::copy(src, dst).map_err(|e| {
        Error::FileFailure(format!(
            "Failed to copy the input file ({src}) to output file ({dst}): {e}."
        ))
    })?;
    Ok(())
}

/// Rewrite a file name so the file layer routes it through the buffer
/// callbacks.
///
/// An empty name stays empty; callers rewrite optional paths
/// unconditionally and rely on that.
pub fn make_callback_file_name(_params: &BufferCallbackParams, file_name: &str) -> String {
    if file_name.is_empty() {
        return String::new();
    }
    format!("{CALLBACK_FILE_PREFIX}{file_name}")
}
