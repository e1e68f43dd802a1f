//! PNG creation time. Not part of the default dispatch; enabled through
//! `ArchiveOptions::png_timestamps`.

use std::io::{Read, Seek};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use flate2::read::ZlibDecoder;

use super::reader::{ByteCursor, ByteOrder};
use super::DateResult;
use crate::error::ExtractError;
use crate::media::MediaFormat;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const CREATION_TIME_KEY: &[u8] = b"Creation Time";
/// Upper bound on an inflated zTXt value.
const MAX_TEXT_LEN: u64 = 64 * 1024;

/// Prefer a `Creation Time` text chunk; fall back to the `tIME` chunk once
/// `IEND` (or anything that is not a chunk) is reached.
pub fn creation_time<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> DateResult {
    if cursor.read_array::<8>(0)? != Some(PNG_SIGNATURE) {
        return Err(ExtractError::HeaderMismatch(MediaFormat::Png));
    }

    let mut modified = None;
    let mut offset = PNG_SIGNATURE.len() as u64;
    loop {
        let Some(head) = cursor.read_array::<8>(offset)? else {
            return Ok(modified);
        };
        let length = ByteOrder::Big.u32([head[0], head[1], head[2], head[3]]);
        let kind = [head[4], head[5], head[6], head[7]];
        if !kind[0].is_ascii_alphabetic() || &kind == b"IEND" {
            return Ok(modified);
        }

        let data_at = offset + 8;
        if matches!(&kind, b"tEXt" | b"zTXt" | b"tIME") {
            let Some(data) = cursor.read_vec(data_at, length as usize)? else {
                return Ok(modified);
            };
            match &kind {
                b"tEXt" => {
                    if let Some(dt) = text_creation_time(&data, false) {
                        return Ok(Some(dt));
                    }
                }
                b"zTXt" => {
                    if let Some(dt) = text_creation_time(&data, true) {
                        return Ok(Some(dt));
                    }
                }
                _ => modified = modified.or_else(|| decode_time_chunk(&data)),
            }
        }
        // Payload, then the 4-byte CRC.
        offset = data_at + u64::from(length) + 4;
    }
}

fn text_creation_time(data: &[u8], compressed: bool) -> Option<NaiveDateTime> {
    let nul = data.iter().position(|&b| b == 0)?;
    if &data[..nul] != CREATION_TIME_KEY {
        return None;
    }
    let rest = &data[nul + 1..];

    let value = if compressed {
        // Compression method byte; 0 (deflate) is the only one defined.
        let (&method, stream) = rest.split_first()?;
        if method != 0 {
            return None;
        }
        let mut text = String::new();
        ZlibDecoder::new(stream)
            .take(MAX_TEXT_LEN)
            .read_to_string(&mut text)
            .ok()?;
        text
    } else {
        String::from_utf8_lossy(rest).into_owned()
    };
    parse_text_time(value.trim())
}

fn parse_text_time(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

fn decode_time_chunk(data: &[u8]) -> Option<NaiveDateTime> {
    let &[y0, y1, month, day, hour, minute, second] = data.get(..7)? else {
        return None;
    };
    let year = u16::from_be_bytes([y0, y1]);
    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))?.and_hms_opt(
        u32::from(hour),
        u32::from(minute),
        u32::from(second),
    )
}
