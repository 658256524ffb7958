//! Reading JSON files that carry `#` or `//` line comments.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{DockyardError, Result};

const COMMENT_MARKERS: [&str; 2] = ["#", "//"];

/// Cuts a single line at the first comment marker that sits outside a string
/// literal.
fn strip_line(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
            continue;
        }
        let rest = &line[idx..];
        if COMMENT_MARKERS.iter().any(|marker| rest.starts_with(marker)) {
            return line[..idx].trim_end();
        }
    }
    line
}

/// Removes line comments from JSON text, keeping markers that appear inside
/// string values such as URLs.
pub fn strip_comments(content: &str) -> String {
    content
        .lines()
        .map(strip_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads and deserializes a commented JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|source| DockyardError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&strip_comments(&content)).map_err(|source| DockyardError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
