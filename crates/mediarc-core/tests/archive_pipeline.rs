use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{tempdir, TempDir};

use mediarc_core::{
    archive, archive_with_control, ArchiveAction, ArchiveControl, ArchiveError, ArchiveOptions,
    ArchiveReport, CancellationToken, DuplicateMode,
};

/// JPEG whose EXIF IFD0 holds a big-endian DateTimeOriginal. `salt` ends up
/// in the scan data so files with the same date can differ in content.
fn jpeg(date: &str, salt: u8) -> Vec<u8> {
    let mut tiff = b"MM\x00\x2A\x00\x00\x00\x08".to_vec();
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x9003u16.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&20u32.to_be_bytes());
    // Header (8) + count (2) + one entry (12) + next-IFD offset (4).
    tiff.extend_from_slice(&26u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(date.as_bytes());
    tiff.push(0);

    let mut app1 = b"Exif\0\0".to_vec();
    app1.extend_from_slice(&tiff);
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&app1);
    out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x04, salt, salt]);
    out.extend_from_slice(&[salt; 64]);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// AVCHD stream with an MDPM block recording 2014-06-15 14:30:05.
fn mts() -> Vec<u8> {
    let mut out = b"\x00\x00\x00\x00G@".to_vec();
    out.extend_from_slice(&[0x11; 700]);
    out.extend_from_slice(b"MDPM");
    out.extend_from_slice(&[0x03, 0x18, 0x02, 0x20, 0x14, 0x06, 0x19, 0x15, 0x14, 0x30, 0x05]);
    out.extend_from_slice(&[0x11; 300]);
    out
}

struct Workspace {
    _dir: TempDir,
    source: PathBuf,
    dest: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let source = dir.path().join("incoming");
        let dest = dir.path().join("archive");
        fs::create_dir_all(&source).unwrap();
        Self {
            _dir: dir,
            source,
            dest,
        }
    }

    fn add(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.source.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        path
    }

    fn options(&self, mode: DuplicateMode) -> ArchiveOptions {
        ArchiveOptions {
            source_root: self.source.clone(),
            dest_root: self.dest.clone(),
            mode,
            ..ArchiveOptions::default()
        }
    }

    fn run(&self, options: &ArchiveOptions) -> ArchiveReport {
        archive(options, &|_, _, _, _| {}).unwrap()
    }

    fn archived(&self) -> Vec<String> {
        let mut files: Vec<String> = walk(&self.dest)
            .into_iter()
            .map(|p| p.strip_prefix(&self.dest).unwrap().to_string_lossy().replace('\\', "/"))
            .filter(|p| !p.starts_with(".mediarc-"))
            .collect();
        files.sort();
        files
    }
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(walk(&path));
        } else {
            out.push(path);
        }
    }
    out
}

const PHOTO: &str = "2020/Jun/15-Mon/IMG/2020-Jun-15-Mon-02-30-05-PM";

#[test]
fn test_jpeg_lands_at_its_canonical_path() {
    let ws = Workspace::new();
    let bytes = jpeg("2020:06:15 14:30:05", 1);
    ws.add("DCIM/IMG_0001.JPG", &bytes);

    let report = ws.run(&ws.options(DuplicateMode::Mark));

    assert_eq!(report.total, 1);
    assert_eq!(report.copied, 1);
    assert_eq!(ws.archived(), [format!("{PHOTO}.jpg")]);
    assert_eq!(fs::read(ws.dest.join(format!("{PHOTO}.jpg"))).unwrap(), bytes);
}

#[test]
fn test_mts_lands_in_video_folder() {
    let ws = Workspace::new();
    ws.add("AVCHD/00001.MTS", &mts());

    let report = ws.run(&ws.options(DuplicateMode::Mark));

    assert_eq!(report.copied, 1);
    assert_eq!(ws.archived(), ["2014/Jun/15-Sun/VIDEO/02-30-05-PM.mts"]);
}

#[test]
fn test_skip_mode_does_not_copy_identical_content_twice() {
    let ws = Workspace::new();
    ws.add("a.jpg", &jpeg("2020:06:15 14:30:05", 1));
    let options = ws.options(DuplicateMode::Skip);

    ws.run(&options);
    let second = ws.run(&options);

    assert_eq!(second.skipped_duplicates, 1);
    assert_eq!(second.copied, 0);
    assert_eq!(ws.archived(), [format!("{PHOTO}.jpg")]);
}

#[test]
fn test_mark_mode_keeps_both_copies_with_a_marker() {
    let ws = Workspace::new();
    ws.add("a.jpg", &jpeg("2020:06:15 14:30:05", 1));
    let options = ws.options(DuplicateMode::Mark);

    ws.run(&options);
    let second = ws.run(&options);

    assert_eq!(second.marked_duplicates, 1);
    assert_eq!(
        ws.archived(),
        [
            format!("{PHOTO}-DUPLICATE_OF-2020-Jun-15-Mon-02-30-05-PM.jpg.jpg"),
            format!("{PHOTO}.jpg"),
        ]
    );
}

#[test]
fn test_ignore_mode_numbers_regardless_of_content() {
    let ws = Workspace::new();
    ws.add("a.jpg", &jpeg("2020:06:15 14:30:05", 1));
    let options = ws.options(DuplicateMode::Ignore);

    ws.run(&options);
    let second = ws.run(&options);

    assert_eq!(second.copied, 1);
    assert_eq!(ws.archived(), [format!("{PHOTO}-COPY_1.jpg"), format!("{PHOTO}.jpg")]);
}

#[test]
fn test_same_time_different_content_gets_numbered_names() {
    let ws = Workspace::new();
    for (i, name) in ["a.jpg", "b.jpg", "c.jpg"].iter().enumerate() {
        ws.add(name, &jpeg("2020:06:15 14:30:05", i as u8));
    }

    let report = ws.run(&ws.options(DuplicateMode::Skip));

    assert_eq!(report.copied, 3);
    assert_eq!(
        ws.archived(),
        [
            format!("{PHOTO}-COPY_1.jpg"),
            format!("{PHOTO}-COPY_2.jpg"),
            format!("{PHOTO}.jpg"),
        ]
    );
}

#[test]
fn test_failed_run_resumes_at_the_failed_item() {
    let ws = Workspace::new();
    ws.add("a.jpg", &jpeg("2019:03:02 10:00:00", 1));
    ws.add("b.jpg", &jpeg("2020:06:15 14:30:05", 2));
    ws.add("c.jpg", &jpeg("2021:08:09 08:15:00", 3));
    let options = ws.options(DuplicateMode::Mark);

    // A plain file where the 2020 folder should go makes item 1 fail.
    fs::create_dir_all(&ws.dest).unwrap();
    let blocker = ws.dest.join("2020");
    fs::write(&blocker, b"in the way").unwrap();

    let err = archive(&options, &|_, _, _, _| {}).unwrap_err();
    assert!(matches!(err, ArchiveError::Io { .. }));
    let checkpoint = options.normalized().checkpoint_path();
    assert!(checkpoint.exists());
    assert!(ws.dest.join("2019/Mar/02-Sat/IMG/2019-Mar-02-Sat-10-00-00-AM.jpg").exists());

    fs::remove_file(&blocker).unwrap();
    let report = ws.run(&options);

    // Only b and c; a re-run of a would have produced a marked duplicate.
    assert_eq!(report.total, 2);
    assert_eq!(report.copied, 2);
    assert_eq!(report.marked_duplicates, 0);
    assert!(!checkpoint.exists());
    assert_eq!(
        ws.archived(),
        [
            "2019/Mar/02-Sat/IMG/2019-Mar-02-Sat-10-00-00-AM.jpg".to_string(),
            format!("{PHOTO}.jpg"),
            "2021/Aug/09-Mon/IMG/2021-Aug-09-Mon-08-15-00-AM.jpg".to_string(),
        ]
    );
}

#[test]
fn test_cancelled_run_saves_position() {
    let ws = Workspace::new();
    ws.add("a.jpg", &jpeg("2020:06:15 14:30:05", 1));
    let options = ws.options(DuplicateMode::Mark);

    let token = CancellationToken::new();
    token.cancel();
    let control = ArchiveControl::new().with_cancel_token(token);
    let err = archive_with_control(&options, &control, &|_, _, _, _| {}).unwrap_err();
    assert!(matches!(err, ArchiveError::Cancelled));
    assert!(options.normalized().checkpoint_path().exists());

    let report = ws.run(&options);
    assert_eq!(report.copied, 1);
    assert!(!options.normalized().checkpoint_path().exists());
}

#[test]
fn test_corrupt_checkpoint_means_cold_start() {
    let ws = Workspace::new();
    ws.add("a.jpg", &jpeg("2020:06:15 14:30:05", 1));
    let options = ws.options(DuplicateMode::Mark);
    let checkpoint = options.normalized().checkpoint_path();
    fs::create_dir_all(checkpoint.parent().unwrap()).unwrap();
    fs::write(&checkpoint, b"\x00garbage").unwrap();

    let report = ws.run(&options);

    assert_eq!(report.copied, 1);
    assert!(!checkpoint.exists());
}

#[test]
fn test_dry_run_decides_but_writes_nothing() {
    let ws = Workspace::new();
    ws.add("a.jpg", &jpeg("2020:06:15 14:30:05", 1));
    let options = ArchiveOptions {
        dry_run: true,
        ..ws.options(DuplicateMode::Mark)
    };

    let report = ws.run(&options);

    assert_eq!(report.copied, 1);
    assert!(!ws.dest.exists());
}

#[test]
fn test_unknown_files_are_reported_not_archived() {
    let ws = Workspace::new();
    ws.add("notes.txt", b"shopping list");
    ws.add("empty.bin", b"");

    let report = ws.run(&ws.options(DuplicateMode::Mark));

    assert_eq!(report.total, 2);
    assert_eq!(report.unsupported, 2);
    assert!(ws.archived().is_empty());
}

#[test]
fn test_nested_archive_is_not_rescanned() {
    let ws = Workspace::new();
    ws.add("a.jpg", &jpeg("2020:06:15 14:30:05", 1));
    let options = ArchiveOptions {
        dest_root: ws.source.join("archive"),
        ..ws.options(DuplicateMode::Mark)
    };

    ws.run(&options);
    let second = ws.run(&options);

    assert_eq!(second.total, 1);
    assert_eq!(second.marked_duplicates, 1);
}

#[test]
fn test_verify_refiles_misplaced_items() {
    let ws = Workspace::new();
    let root = ws.source.clone();
    let stray = ws.add("2020/Jul/01-Wed/IMG/stray.jpg", &jpeg("2020:06:15 14:30:05", 1));
    let placed = ws.add("2021/Aug/09-Mon/IMG/ok.jpg", &jpeg("2021:08:09 08:15:00", 2));
    let options = ArchiveOptions {
        source_root: root.clone(),
        dest_root: root.clone(),
        action: ArchiveAction::Verify,
        ..ArchiveOptions::default()
    };

    let report = ws.run(&options);

    assert_eq!(report.moved, 1);
    assert_eq!(report.left_in_place, 1);
    assert!(!stray.exists());
    assert!(placed.exists());
    assert!(root.join(format!("{PHOTO}.jpg")).exists());
}

#[test]
fn test_trailing_separators_do_not_change_the_checkpoint_key() {
    let ws = Workspace::new();
    let plain = ws.options(DuplicateMode::Mark);
    let slashed = ArchiveOptions {
        source_root: PathBuf::from(format!("{}/", ws.source.display())),
        dest_root: PathBuf::from(format!("{}//", ws.dest.display())),
        ..plain.clone()
    };
    assert_eq!(
        plain.normalized().checkpoint_path(),
        slashed.normalized().checkpoint_path()
    );
}
