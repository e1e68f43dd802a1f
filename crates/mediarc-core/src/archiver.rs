//! Per-file work: identify, date, and place one source file.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::{debug, info};

use crate::date::{self, reader::ByteCursor};
use crate::dedup::{self, DuplicateMode};
use crate::error::{ArchiveError, Result};
use crate::layout::{self, MANUAL_CHECK_DIR};
use crate::media::MediaMetadata;
use crate::sniff;
use crate::writer::FileOps;
use crate::{ArchiveAction, ArchiveOptions, ArchiveReport};

/// Sniff `path` and run the one extractor its format selects.
pub fn read_metadata(path: &Path, png_timestamps: bool) -> Result<MediaMetadata> {
    let mut file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
    let (format, class) = sniff::sniff_reader(&mut file).map_err(|e| ArchiveError::io(path, e))?;

    let mut cursor = ByteCursor::new(BufReader::new(file)).map_err(|e| ArchiveError::io(path, e))?;
    let created_on = date::extract_created_on(format, &mut cursor, png_timestamps)
        .map_err(|e| e.with_path(path))?;
    debug!("{}: {}/{} created {:?}", path.display(), format, class, created_on);

    Ok(MediaMetadata {
        format,
        class,
        created_on,
    })
}

pub struct Archiver<'a> {
    options: &'a ArchiveOptions,
    ops: FileOps,
    report: ArchiveReport,
}

impl<'a> Archiver<'a> {
    pub fn new(options: &'a ArchiveOptions) -> Self {
        Self {
            options,
            ops: FileOps::new(options.dry_run),
            report: ArchiveReport::default(),
        }
    }

    pub fn report(&self) -> &ArchiveReport {
        &self.report
    }

    pub fn into_report(self) -> ArchiveReport {
        self.report
    }

    pub fn process(&mut self, source: &Path) -> Result<()> {
        let metadata = read_metadata(source, self.options.png_timestamps)?;
        self.report.total += 1;

        if !metadata.is_supported() {
            info!("IGNORING {} : UNKNOWN MEDIA TYPE: {}", source.display(), metadata);
            self.report.unsupported += 1;
            return Ok(());
        }

        match self.options.action {
            ArchiveAction::Copy => self.copy(source, &metadata),
            ArchiveAction::Verify => self.verify(source, &metadata),
        }
    }

    fn copy(&mut self, source: &Path, metadata: &MediaMetadata) -> Result<()> {
        let canonical = layout::canonical_path(&self.options.dest_root, metadata, source);
        let decision = dedup::resolve_destination(&canonical, self.options.mode, source)?;

        if !decision.needs_copy() {
            info!("SKIPPING {} : FOUND DUPLICATE: {}", source.display(), decision.path.display());
            self.report.skipped_duplicates += 1;
            return Ok(());
        }

        if decision.is_duplicate_of_existing {
            info!("COPYING DUPLICATE TO: {}", decision.path.display());
            self.report.marked_duplicates += 1;
        } else {
            info!("COPYING TO: {}", decision.path.display());
            self.report.copied += 1;
        }
        if metadata.created_on.is_none() {
            self.report.manual_check += 1;
        }

        if let Some(dir) = decision.path.parent() {
            self.ops.create_dir_all(dir)?;
        }
        self.ops.copy(source, &decision.path)?;
        Ok(())
    }

    /// Re-file an archived item that is not where its timestamp says it
    /// belongs. Never overwrites: the target is the first free name.
    fn verify(&mut self, source: &Path, metadata: &MediaMetadata) -> Result<()> {
        let placed = match metadata.created_on {
            Some(dt) => source
                .to_string_lossy()
                .replace('\\', "/")
                .contains(&layout::date_folder(&dt)),
            None => source.starts_with(self.options.dest_root.join(MANUAL_CHECK_DIR)),
        };
        if placed {
            debug!("{} is already in place", source.display());
            self.report.left_in_place += 1;
            return Ok(());
        }

        let canonical = layout::canonical_path(&self.options.dest_root, metadata, source);
        let decision = dedup::resolve_destination(&canonical, DuplicateMode::Ignore, source)?;
        info!("MOVING {} TO: {}", source.display(), decision.path.display());

        if let Some(dir) = decision.path.parent() {
            self.ops.create_dir_all(dir)?;
        }
        self.ops.move_file(source, &decision.path)?;
        self.report.moved += 1;
        if metadata.created_on.is_none() {
            self.report.manual_check += 1;
        }
        Ok(())
    }
}
