use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ArchiveError, Result};

/// Ordered list of candidate files under a source root.
///
/// Entries are sorted by file name at every directory level, so two cold
/// enumerations of an unchanged tree yield the same sequence.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    items: Vec<PathBuf>,
}

impl FileSource {
    /// Walk `root`, skipping every path in `exclude` (and, for directories,
    /// everything below them). Excluded paths need not exist.
    pub fn enumerate(root: &Path, exclude: &[PathBuf]) -> Result<Self> {
        if !root.is_dir() {
            return Err(ArchiveError::SourceNotFound {
                path: root.to_path_buf(),
            });
        }
        let canonical_root = root.canonicalize().map_err(|e| ArchiveError::io(root, e))?;
        let exclude: Vec<PathBuf> = exclude.iter().map(|p| resolved(p)).collect();
        let is_excluded = |path: &Path| {
            let full = match path.strip_prefix(root) {
                Ok(rel) => canonical_root.join(rel),
                Err(_) => path.to_path_buf(),
            };
            exclude.iter().any(|ex| *ex == full)
        };

        let mut items = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_excluded(entry.path()));
        for entry in walker {
            let entry = entry.map_err(|e| ArchiveError::Walk {
                path: e.path().unwrap_or(root).to_path_buf(),
                source: e,
            })?;
            if entry.file_type().is_file() {
                items.push(entry.into_path());
            }
        }
        debug!("{} candidate files under {}", items.len(), root.display());
        Ok(Self { items })
    }

    pub fn from_items(items: Vec<PathBuf>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.items.get(index).map(PathBuf::as_path)
    }

    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.items.iter().position(|item| item == path)
    }
}

/// Canonical form of `path`, or of its parent joined with its name when
/// the path itself does not exist yet.
fn resolved(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
