pub mod exif;
pub mod mov;
pub mod mts;
pub mod png;
pub mod reader;
pub mod tiff;

use std::io::{Read, Seek};
use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use regex::bytes::Regex;

use crate::error::ExtractError;
use crate::media::MediaFormat;
use reader::ByteCursor;

/// Optional-timestamp result shared by every extractor.
pub type DateResult = Result<Option<NaiveDateTime>, ExtractError>;

static EXIF_DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}):(\d\d):(\d\d) (\d\d):(\d\d):(\d\d)$").expect("valid date regex")
});

/// Extract the creation time with the one extractor that matches `format`.
///
/// GIF has no extractor and PNG only runs when `png_timestamps` is set.
pub fn extract_created_on<R: Read + Seek>(
    format: MediaFormat,
    cursor: &mut ByteCursor<R>,
    png_timestamps: bool,
) -> DateResult {
    match format {
        MediaFormat::QuickTime | MediaFormat::IsoBaseMedia | MediaFormat::Mpeg4Video => {
            mov::creation_time(cursor)
        }
        MediaFormat::Jpeg => exif::jpeg_creation_time(cursor),
        MediaFormat::Tiff => tiff::creation_time(cursor),
        MediaFormat::AvchdMts => mts::creation_time(cursor),
        MediaFormat::Png if png_timestamps => png::creation_time(cursor),
        MediaFormat::Png | MediaFormat::Gif | MediaFormat::Unknown => Ok(None),
    }
}

/// Parse a 19-byte `YYYY:MM:DD HH:MM:SS` field. An all-zero date or an
/// impossible calendar value gives `None`.
pub fn parse_exif_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    let caps = EXIF_DATETIME_RE.captures(raw)?;
    let field = |i: usize| -> Option<u32> {
        std::str::from_utf8(caps.get(i)?.as_bytes()).ok()?.parse().ok()
    };
    let (year, month, day) = (field(1)?, field(2)?, field(3)?);
    let (hour, minute, second) = (field(4)?, field(5)?, field(6)?);

    if (year | month | day | hour | minute | second) == 0 {
        return None;
    }
    NaiveDate::from_ymd_opt(year as i32, month, day)?.and_hms_opt(hour, minute, second)
}

/// Convert Unix seconds to local calendar fields.
pub fn unix_to_local(secs: i64) -> Option<NaiveDateTime> {
    let utc = DateTime::from_timestamp(secs, 0)?;
    Some(utc.with_timezone(&Local).naive_local())
}
