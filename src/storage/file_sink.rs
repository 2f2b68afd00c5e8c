//! Filesystem sink.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use super::{path_for, ResultSink, SaveFormat, StorageResult};
use crate::error::AppResult;

/// Stores record artifacts as plain files under one output directory.
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    /// Creates the sink, making sure the output directory exists.
    pub fn new(root: impl AsRef<Path>) -> AppResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl ResultSink for FileSink {
    fn save(&self, format: SaveFormat, content: &[u8], filename: &str) -> StorageResult {
        let path = path_for(&self.root, filename, format);
        match fs::write(&path, content) {
            Ok(()) => {
                debug!("Saved {} ({} bytes)", path.display(), content.len());
                StorageResult::ok(path)
            }
            Err(e) => {
                error!("Failed to save {}: {}", path.display(), e);
                StorageResult::failed(e.to_string())
            }
        }
    }

    fn file_exists(&self, filename: &str, format: SaveFormat) -> bool {
        path_for(&self.root, filename, format).exists()
    }

    fn file_path(&self, filename: &str, format: SaveFormat) -> PathBuf {
        path_for(&self.root, filename, format)
    }
}
