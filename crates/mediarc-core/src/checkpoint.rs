use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{ArchiveError, Result};
use crate::walker::Cursor;

/// Current checkpoint file format version
const CHECKPOINT_VERSION: u32 = 1;

const CHECKPOINT_PREFIX: &str = ".mediarc-";
const CHECKPOINT_SUFFIX: &str = ".checkpoint.json";

/// Resume state for one `(source root, destination root)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub cursor: Cursor,
}

/// Location of the checkpoint for a root pair, inside `state_dir`.
///
/// The name is derived from both roots, so runs over different pairs never
/// share a record.
pub fn checkpoint_path(state_dir: &Path, source_root: &Path, dest_root: &Path) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(source_root.to_string_lossy().as_bytes());
    hasher.update(b"\0--to--\0");
    hasher.update(dest_root.to_string_lossy().as_bytes());
    let key = hex::encode(hasher.finalize());
    state_dir.join(format!("{CHECKPOINT_PREFIX}{}{CHECKPOINT_SUFFIX}", &key[..16]))
}

/// Scratch file the record is written to before it is renamed into place.
pub fn temp_path(checkpoint: &Path) -> PathBuf {
    let mut name = checkpoint.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    checkpoint.with_file_name(name)
}

impl CheckpointRecord {
    pub fn new(source_root: &Path, dest_root: &Path, cursor: Cursor) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            saved_at: Utc::now(),
            source_root: source_root.to_path_buf(),
            dest_root: dest_root.to_path_buf(),
            cursor,
        }
    }

    /// Write the record to `path`. A crash mid-write leaves either the old
    /// record or none, never a torn one.
    pub fn save(&self, path: &Path) -> Result<()> {
        let fail = |reason: String| ArchiveError::Checkpoint {
            path: path.to_path_buf(),
            reason,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;
        }

        let temp = temp_path(path);
        let file = File::create(&temp).map_err(|e| fail(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|e| fail(e.to_string()))?;
        writer.flush().map_err(|e| fail(e.to_string()))?;
        drop(writer);

        fs::rename(&temp, path).map_err(|e| fail(e.to_string()))
    }

    /// Load the record at `path` and delete it.
    ///
    /// Single use: whatever the outcome, the file is gone afterwards. A
    /// missing, unreadable or mismatched record yields `None`, and the run
    /// starts over.
    pub fn take(path: &Path, source_root: &Path, dest_root: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let loaded = Self::load(path);
        if let Err(e) = fs::remove_file(path) {
            warn!("Could not delete checkpoint {}: {}", path.display(), e);
        }

        match loaded {
            Ok(record)
                if record.version == CHECKPOINT_VERSION
                    && record.source_root == source_root
                    && record.dest_root == dest_root =>
            {
                info!(
                    "Resuming from checkpoint {} (saved {}) at item {}",
                    path.display(),
                    record.saved_at,
                    record.cursor.position
                );
                Some(record)
            }
            Ok(_) => {
                warn!("Checkpoint {} does not match this run, starting over", path.display());
                None
            }
            Err(e) => {
                warn!("Invalid checkpoint {}: {}. Starting over", path.display(), e);
                None
            }
        }
    }

    fn load(path: &Path) -> std::result::Result<Self, String> {
        let file = File::open(path).map_err(|e| e.to_string())?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| e.to_string())
    }
}

/// Stop request shared between a signal handler and the archive loop.
///
/// The loop looks at it before taking the next file, so the file in flight
/// always finishes and the saved cursor points at the first untouched one.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop before its next file.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err` once a stop was requested; the caller saves its cursor and bails.
    pub fn check(&self) -> std::result::Result<(), CancelledError> {
        if self.is_cancelled() {
            return Err(CancelledError);
        }
        Ok(())
    }
}

/// Returned by [`CancellationToken::check`] after a stop request.
#[derive(Debug, Clone)]
pub struct CancelledError;

impl std::fmt::Display for CancelledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stopped between files")
    }
}

impl std::error::Error for CancelledError {}

impl From<CancelledError> for ArchiveError {
    fn from(_: CancelledError) -> Self {
        ArchiveError::Cancelled
    }
}
