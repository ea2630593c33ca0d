//! Session cache: the last input and output, restored on the next run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default file name of the session cache.
pub const SESSION_FILE: &str = "last_session.json";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// State kept between runs.
///
/// # Examples
/// ```
/// use hexlens_core::Session;
///
/// let session = Session {
///     input_text: "AA 00".to_string(),
///     raw_hex_data: "AA00".to_string(),
///     ..Session::default()
/// };
/// assert_eq!(session.offset, 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Text as the user supplied it.
    #[serde(default)]
    pub input_text: String,
    /// Rendered output of the last parse.
    #[serde(default)]
    pub output_text: String,
    /// Canonical hex of the last input.
    #[serde(default)]
    pub raw_hex_data: String,
    #[serde(default)]
    pub offset: usize,
}

impl Session {
    /// Load the session at `path`; a missing or unreadable file yields the
    /// default session.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                debug!(path = %path.display(), %err, "no session restored");
                return Self::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "ignoring malformed session file");
            Self::default()
        })
    }

    /// Write the session to `path` as pretty JSON, creating parent
    /// directories.
    ///
    /// # Errors
    /// Returns `SessionError` when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SessionError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut json = serde_json::to_string_pretty(self).map_err(|source| SessionError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        json.push('\n');
        std::fs::write(path, json).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::load(&dir.path().join(SESSION_FILE));
        assert!(session.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SESSION_FILE);
        let session = Session {
            input_text: "0000:  AA 00".into(),
            output_text: "TestProto".into(),
            raw_hex_data: "AA00".into(),
            offset: 3,
        };
        session.save(&path).unwrap();
        assert_eq!(Session::load(&path), session);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"raw_hex_data\": \"AA00\""));
    }

    #[test]
    fn malformed_or_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Session::load(&path).is_empty());

        std::fs::write(&path, r#"{"raw_hex_data":"0A"}"#).unwrap();
        let session = Session::load(&path);
        assert_eq!(session.raw_hex_data, "0A");
        assert_eq!(session.offset, 0);
    }
}
