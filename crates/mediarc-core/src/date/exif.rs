use std::io::{Read, Seek};

use chrono::NaiveDateTime;

use super::reader::{ByteCursor, ByteOrder};
use super::{parse_exif_datetime, DateResult};

const SOI: [u8; 2] = [0xFF, 0xD8];
const MARKER_APP1: u8 = 0xE1;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;

const EXIF_HEADER: &[u8] = b"Exif\0\0";

pub const TAG_DATE_TIME: u16 = 0x0132;
pub const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
pub const TAG_EXIF_IFD_POINTER: u16 = 0x8769;

const IFD_ENTRY_LEN: usize = 12;
const EXIF_DATE_LEN: usize = 19;
/// Sub-IFD pointers are followed at most this deep, so a pointer cycle ends.
const MAX_IFD_DEPTH: u8 = 4;

/// Walk the JPEG header segments up to the start of scan, looking for an
/// EXIF APP1 block with a date tag.
pub fn jpeg_creation_time<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> DateResult {
    if cursor.read_array::<2>(0)? != Some(SOI) {
        return Ok(None);
    }

    let mut pos = 2u64;
    loop {
        let Some([0xFF, marker]) = cursor.read_array::<2>(pos)? else {
            return Ok(None);
        };
        pos += 2;

        match marker {
            MARKER_SOS | MARKER_EOI => return Ok(None),
            // Fill byte before a marker.
            0xFF => {
                pos -= 1;
                continue;
            }
            // Standalone markers carry no length field.
            0x01 | 0xD0..=0xD8 => continue,
            _ => {}
        }

        let Some(len) = cursor.read_u16(pos, ByteOrder::Big)? else {
            return Ok(None);
        };
        if len < 2 {
            return Ok(None);
        }

        if marker == MARKER_APP1 {
            let Some(payload) = cursor.read_vec(pos + 2, len as usize - 2)? else {
                return Ok(None);
            };
            if let Some(tiff) = payload.strip_prefix(EXIF_HEADER) {
                if let Some(dt) = exif_block_datetime(tiff) {
                    return Ok(Some(dt));
                }
            }
        }
        pos += u64::from(len);
    }
}

/// Find the first usable date in an in-memory TIFF-structured EXIF block.
pub fn exif_block_datetime(tiff: &[u8]) -> Option<NaiveDateTime> {
    let order = match tiff.get(0..2)? {
        b"II" => ByteOrder::Little,
        b"MM" => ByteOrder::Big,
        _ => return None,
    };
    // Bytes 2..4 are the TIFF id.
    let ifd0 = order.u32_at(tiff, 4)? as usize;
    find_date_in_ifd(tiff, order, ifd0, 0)
}

fn find_date_in_ifd(data: &[u8], order: ByteOrder, ifd: usize, depth: u8) -> Option<NaiveDateTime> {
    if depth > MAX_IFD_DEPTH {
        return None;
    }
    let count = order.u16_at(data, ifd)? as usize;

    for i in 0..count {
        let entry = ifd + 2 + i * IFD_ENTRY_LEN;
        let tag = order.u16_at(data, entry)?;
        let value = order.u32_at(data, entry + 8)? as usize;

        let found = match tag {
            TAG_EXIF_IFD_POINTER => find_date_in_ifd(data, order, value, depth + 1),
            TAG_DATE_TIME | TAG_DATE_TIME_ORIGINAL => data
                .get(value..value.checked_add(EXIF_DATE_LEN)?)
                .and_then(parse_exif_datetime),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}
