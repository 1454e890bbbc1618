//! Cached icon storage.
//!
//! Icons are cached on disk named by the owning object's id. The startup
//! sequencer sweeps the cache once per launch, deleting files no database
//! object references.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// On-disk icon cache.
pub struct IconCache {
    dir: PathBuf,
}

impl IconCache {
    /// Create a cache rooted at the given directory. The directory is
    /// created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the cache.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an icon for the named object would be cached at.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.png", name))
    }

    /// Cache icon bytes for the named object.
    pub fn store(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Delete cached icons whose name is not in the live set. Returns the
    /// number of files removed. A cache directory that does not exist yet
    /// counts as already clean.
    pub fn clear_orphans(&self, live: &HashSet<String>) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !live.contains(&name) {
                debug!("Removing orphaned icon {:?}", path);
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
