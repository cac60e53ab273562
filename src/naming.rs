//! Default mode and output-name derivation from the input file name.
//!
//! Decoded files carry a `.dec` suffix.  Feeding one back in defaults to
//! encoding and to the original name with the suffix stripped; anything
//! else defaults to decoding into `<name>.dec`.

use std::path::{Path, PathBuf};
use crate::transform::Mode;

/// Suffix written by decode and stripped again by encode.
pub const DECODED_SUFFIX: &str = ".dec";

/// Final path component.  Both `/` and `\` count as separators, whatever the
/// host platform.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// `Encode` for files that look already decoded, otherwise `Decode`.
pub fn default_mode(path: &str) -> Mode {
    let name = file_name_of(path);
    if name.len() > DECODED_SUFFIX.len() && name.ends_with(DECODED_SUFFIX) {
        Mode::Encode
    } else {
        Mode::Decode
    }
}

/// Suggested output file name for `path` under `mode`.
pub fn default_output_name(path: &str, mode: Mode) -> String {
    let name = file_name_of(path);
    match mode {
        Mode::Encode if default_mode(path) == Mode::Encode => {
            name[..name.len() - DECODED_SUFFIX.len()].to_string()
        }
        _ => format!("{}.{}", name, mode.output_extension()),
    }
}

/// [`default_output_name`] placed in the input's directory.
pub fn default_output_path(path: &Path, mode: Mode) -> PathBuf {
    let raw  = path.to_string_lossy();
    let name = default_output_name(&raw, mode);
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
        _                                        => PathBuf::from(name),
    }
}
