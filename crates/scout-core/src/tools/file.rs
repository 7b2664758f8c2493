use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ToolError;

/// Reads local UTF-8 text files, bounded by a size ceiling.
///
/// Relative paths resolve against `root`; absolute paths are used as given.
#[derive(Debug, Clone)]
pub struct FileReader {
    root: PathBuf,
    max_bytes: u64,
}

impl FileReader {
    pub fn new(root: impl AsRef<Path>, max_bytes: u64) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_bytes,
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }

    pub async fn read(&self, path: &str) -> Result<String, ToolError> {
        let resolved = self.resolve(path);

        let metadata = tokio::fs::metadata(&resolved)
            .await
            .map_err(|err| io_error(path, err))?;
        if !metadata.is_file() {
            return Err(ToolError::NotFound(format!("{path} is not a regular file")));
        }
        if metadata.len() > self.max_bytes {
            return Err(ToolError::TooLarge {
                path: path.to_string(),
                size: metadata.len(),
                limit: self.max_bytes,
            });
        }

        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|err| io_error(path, err))?;
        debug!(path = %resolved.display(), bytes = bytes.len(), "file read");

        String::from_utf8(bytes)
            .map_err(|_| ToolError::Parse(format!("{path} is not valid UTF-8 text")))
    }
}

/// Every local I/O failure surfaces as `NotFound`.
fn io_error(path: &str, err: std::io::Error) -> ToolError {
    match err.kind() {
        ErrorKind::NotFound => ToolError::NotFound(path.to_string()),
        _ => ToolError::NotFound(format!("{path}: {err}")),
    }
}
