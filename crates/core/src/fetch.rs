//! Reading captured page snapshots and serialized pipeline values from local
//! files and standard input.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::{Result, TanaPasteError};

/// Argument naming standard input instead of a file.
pub const STDIN_ARG: &str = "-";

/// Reads a saved snapshot or JSON document from a local file.
///
/// A leading UTF-8 byte order mark, as written by some browsers' "save page"
/// and by editors on Windows, is dropped.
pub fn fetch_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TanaPasteError::FileNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    Ok(strip_bom(content))
}

/// Reads everything on standard input until EOF.
pub fn fetch_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(strip_bom(buffer))
}

/// Reads from standard input when `input` is `-`, else from the named file.
pub fn fetch_input(input: &str) -> Result<String> {
    if input == STDIN_ARG { fetch_stdin() } else { fetch_file(input) }
}

fn strip_bom(content: String) -> String {
    match content.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => content,
    }
}
