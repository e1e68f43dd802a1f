pub mod archiver;
pub mod checkpoint;
pub mod date;
pub mod dedup;
pub mod error;
pub mod layout;
pub mod media;
pub mod scan;
pub mod signature;
pub mod sniff;
pub mod walker;
pub mod writer;

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub use checkpoint::{CancellationToken, CancelledError, CheckpointRecord};
pub use dedup::{DestinationDecision, DuplicateMode};
pub use error::{ArchiveError, Result};
pub use media::{MediaClass, MediaFormat, MediaMetadata};
pub use signature::ImageFingerprint;

use archiver::Archiver;
use scan::FileSource;
use walker::CheckpointedWalker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveAction {
    /// Copy sources into the archive.
    #[default]
    Copy,
    /// Move misfiled items of an existing archive to where they belong.
    Verify,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveOptions {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    #[serde(default)]
    pub mode: DuplicateMode,
    #[serde(default)]
    pub action: ArchiveAction,
    #[serde(default)]
    pub dry_run: bool,
    /// Where the checkpoint record lives; the destination root if unset.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    /// Read creation times out of PNG text and `tIME` chunks.
    #[serde(default)]
    pub png_timestamps: bool,
}

impl ArchiveOptions {
    /// Roots with `\` turned into `/` and trailing separators removed.
    pub fn normalized(&self) -> Self {
        Self {
            source_root: normalize_root(&self.source_root),
            dest_root: normalize_root(&self.dest_root),
            ..self.clone()
        }
    }

    pub fn state_dir(&self) -> &Path {
        self.state_dir.as_deref().unwrap_or(&self.dest_root)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        checkpoint::checkpoint_path(self.state_dir(), &self.source_root, &self.dest_root)
    }
}

fn normalize_root(root: &Path) -> PathBuf {
    let text = root.to_string_lossy().replace('\\', "/");
    let trimmed = text.trim_end_matches('/');
    if trimmed.is_empty() && !text.is_empty() {
        PathBuf::from("/")
    } else {
        PathBuf::from(trimmed)
    }
}

/// Counts for one run. Every processed file lands in exactly one of
/// `copied`, `moved`, `skipped_duplicates`, `marked_duplicates`,
/// `left_in_place` or `unsupported`; `manual_check` counts the subset of
/// copies and moves that went to the manual-check folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReport {
    pub total: u64,
    pub copied: u64,
    pub moved: u64,
    pub skipped_duplicates: u64,
    pub marked_duplicates: u64,
    pub left_in_place: u64,
    pub unsupported: u64,
    pub manual_check: u64,
}

/// Control options for a run that are not part of its configuration.
#[derive(Debug, Clone, Default)]
pub struct ArchiveControl {
    /// Checked between files; a cancelled run saves its position first.
    pub cancel_token: Option<CancellationToken>,
}

impl ArchiveControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}

/// Type alias for progress callback: `(stage, current, total, message)`.
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

/// Throttled progress reporter: emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: Cell<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    const INTERVAL: Duration = Duration::from_millis(200);

    pub fn new(inner: &'a ProgressCallback) -> Self {
        let last = Instant::now()
            .checked_sub(Self::INTERVAL)
            .unwrap_or_else(Instant::now);
        Self {
            inner,
            last_emit: Cell::new(last),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            if self.last_emit.get().elapsed() < Self::INTERVAL {
                return;
            }
            self.last_emit.set(Instant::now());
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Everything the pipeline can tell about one file, without placing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub metadata: MediaMetadata,
    pub crc32: u32,
    /// dHash of image-class files that could be decoded.
    #[serde(serialize_with = "serialize_fingerprint")]
    pub fingerprint: Option<ImageFingerprint>,
}

fn serialize_fingerprint<S: serde::Serializer>(
    value: &Option<ImageFingerprint>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(fp) => serializer.serialize_some(&fp.to_string()),
        None => serializer.serialize_none(),
    }
}

pub fn inspect(path: &Path, png_timestamps: bool) -> Result<Inspection> {
    let metadata = archiver::read_metadata(path, png_timestamps)?;
    let crc32 = signature::crc32(path)?;
    let fingerprint = if metadata.class == MediaClass::Image {
        match signature::dhash(path) {
            Ok(fp) => Some(fp),
            Err(e) => {
                info!("No fingerprint for {}: {}", path.display(), e);
                None
            }
        }
    } else {
        None
    };
    Ok(Inspection {
        metadata,
        crc32,
        fingerprint,
    })
}

/// Archive every file under the source root with progress reporting.
pub fn archive(options: &ArchiveOptions, progress_callback: &ProgressCallback) -> Result<ArchiveReport> {
    archive_with_control(options, &ArchiveControl::default(), progress_callback)
}

/// Archive with progress reporting and control options.
///
/// A failure on any file steps the cursor back onto that file, saves a
/// checkpoint and returns the failure; the next run over the same roots
/// starts with that file.
pub fn archive_with_control(
    options: &ArchiveOptions,
    control: &ArchiveControl,
    progress_callback: &ProgressCallback,
) -> Result<ArchiveReport> {
    let options = options.normalized();
    let tp = ThrottledProgress::new(progress_callback);
    let checkpoint_file = options.checkpoint_path();

    let mut exclude = vec![checkpoint_file.clone(), checkpoint::temp_path(&checkpoint_file)];
    if options.dest_root != options.source_root {
        exclude.push(options.dest_root.clone());
    }
    let source = FileSource::enumerate(&options.source_root, &exclude)?;

    let mut walker =
        match CheckpointRecord::take(&checkpoint_file, &options.source_root, &options.dest_root) {
            Some(record) => CheckpointedWalker::resume(source, &record.cursor),
            None => CheckpointedWalker::new(source),
        };
    let total = walker.len() as u64;
    info!(
        "Archiving {} files from {} to {} (starting at {})",
        total,
        options.source_root.display(),
        options.dest_root.display(),
        walker.position()
    );

    let mut archiver = Archiver::new(&options);
    loop {
        if let Some(token) = &control.cancel_token {
            if let Err(cancelled) = token.check() {
                save_checkpoint(&options, &checkpoint_file, &walker);
                return Err(cancelled.into());
            }
        }

        let Some(path) = walker.next_item().map(Path::to_path_buf) else {
            break;
        };
        tp.report(
            "archive",
            walker.position() as u64 - 1,
            total,
            &path.display().to_string(),
        );

        if let Err(e) = archiver.process(&path) {
            walker.step_back();
            save_checkpoint(&options, &checkpoint_file, &walker);
            return Err(e);
        }
    }

    Ok(archiver.into_report())
}

fn save_checkpoint(options: &ArchiveOptions, path: &Path, walker: &CheckpointedWalker) {
    let record = CheckpointRecord::new(&options.source_root, &options.dest_root, walker.cursor());
    match record.save(path) {
        Ok(()) => info!("Saved state to {}", path.display()),
        Err(e) => error!("{}", e),
    }
}
