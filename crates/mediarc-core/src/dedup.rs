//! Destination collision handling: numbered `-COPY_n` suffixes and the three
//! duplicate policies.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::layout::CanonicalPath;
use crate::signature;

/// What to do when a same-named destination already holds identical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMode {
    /// Never compare content; always take the first free name.
    Ignore,
    /// Identical content already archived: do not copy.
    Skip,
    /// Identical content already archived: copy anyway under a name that
    /// points at the existing file.
    #[default]
    Mark,
}

impl fmt::Display for DuplicateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ignore => "ignore",
            Self::Skip => "skip",
            Self::Mark => "mark",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationDecision {
    /// Target of the copy; for a skipped duplicate, the existing file.
    pub path: PathBuf,
    pub is_duplicate_of_existing: bool,
    /// `-DUPLICATE_OF-<name>` when the copy is a marked duplicate.
    pub dup_marker_suffix: Option<String>,
}

impl DestinationDecision {
    /// Whether the source still has to be written to [`Self::path`].
    pub fn needs_copy(&self) -> bool {
        !self.is_duplicate_of_existing || self.dup_marker_suffix.is_some()
    }
}

/// CRC of the source, read at most once and only when a collision needs it.
struct SourceCrc<'a> {
    path: &'a Path,
    value: Option<u32>,
}

impl<'a> SourceCrc<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, value: None }
    }

    fn get(&mut self) -> Result<u32> {
        if let Some(crc) = self.value {
            return Ok(crc);
        }
        let crc = signature::crc32(self.path)?;
        self.value = Some(crc);
        Ok(crc)
    }
}

/// Pick the destination for `source` under `mode`.
///
/// Only a failure to read the source itself is an error. A candidate that
/// cannot be read is treated as different content.
pub fn resolve_destination(
    canonical: &CanonicalPath,
    mode: DuplicateMode,
    source: &Path,
) -> Result<DestinationDecision> {
    let mut source_crc = SourceCrc::new(source);
    let (found_duplicate, path) = find_free(canonical, "", mode, &mut source_crc)?;

    if !found_duplicate {
        return Ok(DestinationDecision {
            path,
            is_duplicate_of_existing: false,
            dup_marker_suffix: None,
        });
    }

    match mode {
        DuplicateMode::Mark => {
            let original = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let suffix = format!("-DUPLICATE_OF-{original}");
            let (_, marked) = find_free(canonical, &suffix, DuplicateMode::Ignore, &mut source_crc)?;
            Ok(DestinationDecision {
                path: marked,
                is_duplicate_of_existing: true,
                dup_marker_suffix: Some(suffix),
            })
        }
        DuplicateMode::Skip | DuplicateMode::Ignore => Ok(DestinationDecision {
            path,
            is_duplicate_of_existing: true,
            dup_marker_suffix: None,
        }),
    }
}

/// Walk `{base}{append}`, `{base}{append}-COPY_1`, ... until a name is free
/// or, unless `mode` is ignore, an occupant has the source's CRC.
fn find_free(
    canonical: &CanonicalPath,
    append: &str,
    mode: DuplicateMode,
    source_crc: &mut SourceCrc<'_>,
) -> Result<(bool, PathBuf)> {
    let mut path = canonical.render(append);
    let mut count: u64 = 1;

    while path.exists() {
        if mode != DuplicateMode::Ignore {
            let expected = source_crc.get()?;
            match signature::crc32(&path) {
                Ok(crc) if crc == expected => return Ok((true, path)),
                Ok(_) => debug!("{} exists with different content", path.display()),
                Err(e) => warn!("Cannot compare with {}: {}", path.display(), e),
            }
        }
        path = canonical.render(&format!("{append}-COPY_{count}"));
        count += 1;
    }
    Ok((false, path))
}
