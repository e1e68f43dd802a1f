use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::scan::FileSource;

/// Serializable position in a [`FileSource`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cursor {
    /// Index of the next item to fetch.
    pub position: usize,
    /// The item expected at `position` when the cursor was taken.
    pub resume_path: Option<PathBuf>,
}

/// Cursor over a [`FileSource`] that can step back one item so a failed
/// item is retried after a restart.
#[derive(Debug)]
pub struct CheckpointedWalker {
    source: FileSource,
    position: usize,
}

impl CheckpointedWalker {
    pub fn new(source: FileSource) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    /// Continue from a saved cursor. If the tree changed so that a different
    /// item now sits at the saved index, follow the saved path instead.
    pub fn resume(source: FileSource, cursor: &Cursor) -> Self {
        let mut position = cursor.position.min(source.len());
        if let Some(expected) = cursor.resume_path.as_deref() {
            if source.get(position) != Some(expected) {
                if let Some(found) = source.position_of(expected) {
                    debug!(
                        "{} moved from {} to {}",
                        expected.display(),
                        cursor.position,
                        found
                    );
                    position = found;
                }
            }
        }
        Self { source, position }
    }

    /// Advance and fetch the next item.
    pub fn next_item(&mut self) -> Option<&Path> {
        let item = self.source.get(self.position)?;
        self.position += 1;
        Some(item)
    }

    pub fn step_back(&mut self) {
        self.position = self.position.saturating_sub(1);
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn cursor(&self) -> Cursor {
        Cursor {
            position: self.position,
            resume_path: self.source.get(self.position).map(Path::to_path_buf),
        }
    }
}
