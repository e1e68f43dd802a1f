use std::fs;
use std::io;
use std::path::Path;

use filetime::FileTime;
use tracing::{debug, info};

use crate::error::{ArchiveError, Result};

/// Filesystem mutations used by the archiver. With `dry_run` set, every
/// operation only logs what it would have done.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOps {
    dry_run: bool,
}

impl FileOps {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn create_dir_all(&self, dir: &Path) -> Result<()> {
        if self.dry_run {
            debug!("mkdir -p {}", dir.display());
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|e| ArchiveError::io(dir, e))
    }

    /// Copy bytes and permissions, then carry over access and modification
    /// times. Returns the number of bytes copied (0 in dry run).
    pub fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        if self.dry_run {
            info!("cp {} {}", from.display(), to.display());
            return Ok(0);
        }
        let meta = fs::metadata(from).map_err(|e| ArchiveError::io(from, e))?;
        let bytes = fs::copy(from, to).map_err(|e| ArchiveError::io(to, e))?;
        let atime = FileTime::from_last_access_time(&meta);
        let mtime = FileTime::from_last_modification_time(&meta);
        filetime::set_file_times(to, atime, mtime).map_err(|e| ArchiveError::io(to, e))?;
        Ok(bytes)
    }

    /// Rename, or copy and remove when the rename is refused (for example
    /// across filesystems).
    pub fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        if self.dry_run {
            info!("mv {} {}", from.display(), to.display());
            return Ok(());
        }
        if let Err(e) = fs::rename(from, to) {
            if e.kind() == io::ErrorKind::NotFound {
                return Err(ArchiveError::io(from, e));
            }
            debug!("rename {} failed ({}), copying instead", from.display(), e);
            self.copy(from, to)?;
            fs::remove_file(from).map_err(|e| ArchiveError::io(from, e))?;
        }
        Ok(())
    }
}
