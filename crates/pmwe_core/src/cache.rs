use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CacheError;
use crate::page::PageReference;

/// Page sources kept on local disk, one file per qualified page name.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, page: &PageReference) -> PathBuf {
        self.dir.join(page.cache_file_name())
    }

    /// Overwrite the cache file for `page` with `text`. Last writer wins.
    pub fn save(&self, page: &PageReference, text: &str) -> Result<PathBuf, CacheError> {
        let path = self.path_for(page);
        fs::write(&path, text).map_err(|source| CacheError::WriteFailed {
            path: path.clone(),
            source,
        })?;
        debug!("cached {} ({} bytes)", path.display(), text.len());
        Ok(path)
    }

    pub fn read(&self, path: &Path) -> Result<String, CacheError> {
        fs::read_to_string(path).map_err(|source| CacheError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })
    }
}
