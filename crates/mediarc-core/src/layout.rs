//! Canonical, date-structured destination paths.

use std::path::{Component, Path, PathBuf};

use chrono::NaiveDateTime;

use crate::media::{MediaClass, MediaMetadata};

/// Folder (under the destination root) for files that need a human decision.
pub const MANUAL_CHECK_DIR: &str = "MANUAL-CHECK-NEEDED";

/// A destination path split at the point where suffixes are inserted:
/// `{dir}/{base}{append}{ext}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPath {
    dir: PathBuf,
    base: String,
    ext: String,
}

impl CanonicalPath {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render with `append` placed before the extension.
    pub fn render(&self, append: &str) -> PathBuf {
        self.dir.join(format!("{}{}{}", self.base, append, self.ext))
    }
}

/// Lowercased extension of `source` including its dot, or empty.
pub fn source_extension(source: &Path) -> String {
    source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// `{year}/{Mon}/{dd-Day}` for `dt`, with `/` separators.
pub fn date_folder(dt: &NaiveDateTime) -> String {
    dt.format("%Y/%b/%d-%a").to_string()
}

/// Where `source` belongs in the archive rooted at `dest_root`.
///
/// - video with a timestamp: `{Y}/{Mon}/{dd-Day}/VIDEO/{hh-mm-ss-AM}`
/// - image with a timestamp: `{Y}/{Mon}/{dd-Day}/IMG/{Y-Mon-dd-Day-hh-mm-ss-AM}`
/// - anything else goes under [`MANUAL_CHECK_DIR`], by base name, or by
///   the whole sanitized source path when neither class nor time is known.
pub fn canonical_path(dest_root: &Path, metadata: &MediaMetadata, source: &Path) -> CanonicalPath {
    let ext = source_extension(source);

    match (metadata.class, metadata.created_on) {
        (MediaClass::Video, Some(dt)) => CanonicalPath {
            dir: dest_root.join(date_folder(&dt)).join("VIDEO"),
            base: dt.format("%I-%M-%S-%p").to_string(),
            ext,
        },
        (MediaClass::Image, Some(dt)) => CanonicalPath {
            dir: dest_root.join(date_folder(&dt)).join("IMG"),
            base: dt.format("%Y-%b-%d-%a-%I-%M-%S-%p").to_string(),
            ext,
        },
        (MediaClass::Unknown, None) => {
            let mut dir = dest_root.join(MANUAL_CHECK_DIR);
            if let Some(parent) = source.parent() {
                dir.push(sanitized(parent));
            }
            CanonicalPath {
                dir,
                base: stem_of(source).replace(':', ""),
                ext,
            }
        }
        _ => CanonicalPath {
            dir: dest_root.join(MANUAL_CHECK_DIR),
            base: stem_of(source),
            ext,
        },
    }
}

fn stem_of(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Keep only the normal components of `path`, with `:` removed, so the
/// result always stays below the directory it is joined onto.
fn sanitized(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => {
                let part = part.to_string_lossy().replace(':', "");
                (!part.is_empty()).then_some(part)
            }
            _ => None,
        })
        .collect()
}
