use std::path::Path;

use blake3::Hasher;

use crate::error::{DockyardError, Result};

const COMMENT_MARKER: char = '#';

/// Reduces a Dockerfile to the lines that affect the build.
///
/// Lines are right-trimmed, then dropped when empty or when they start with
/// `#`. A trailing comment is cut at the last `#` on the line and the line is
/// kept only if something remains.
pub fn normalize(content: &str) -> String {
    let mut lines = Vec::new();
    for line in content.split('\n') {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(COMMENT_MARKER) {
            continue;
        }
        match line.rfind(COMMENT_MARKER) {
            Some(idx) => {
                let kept = line[..idx].trim_end();
                if !kept.is_empty() {
                    lines.push(kept);
                }
            }
            None => lines.push(line),
        }
    }
    lines.join("\n")
}

/// Fingerprint of already-loaded Dockerfile text, hex-encoded BLAKE3.
pub fn fingerprint_str(content: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(normalize(content).as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Computes the change-detection fingerprint of a Dockerfile.
///
/// Comments, blank lines and trailing whitespace do not contribute, so
/// cosmetic edits never trigger a rebuild. Symbolic links are read through
/// to their target; directories are rejected.
///
/// # Errors
///
/// Returns an error if the path is not a regular file or cannot be read as
/// UTF-8 text.
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let metadata = std::fs::metadata(path).map_err(|source| DockyardError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    if metadata.is_dir() {
        return Err(DockyardError::InvalidFileType {
            path: path.to_path_buf(),
            message: "Directories are not supported".to_string(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| DockyardError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(fingerprint_str(&content))
}
