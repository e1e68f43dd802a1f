use std::io::{Read, Seek};

use chrono::NaiveDateTime;

use super::reader::ByteCursor;
use super::DateResult;

const MDPM_TAG: &[u8; 4] = b"MDPM";
const WINDOW: usize = 500;
/// Overlap between windows so a tag split across a boundary is still seen.
const WINDOW_OVERLAP: usize = 4;
const DATE_BLOCK_LEN: usize = 20;
const DATE_TAG: u8 = 0x18;

/// Scan an AVCHD transport stream for the `MDPM` user-data block and read
/// the recording time that follows it.
pub fn creation_time<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> DateResult {
    let mut offset = 0u64;
    loop {
        let window = cursor.read_up_to(offset, WINDOW)?;
        if let Some(i) = window.windows(MDPM_TAG.len()).position(|w| w == MDPM_TAG) {
            let block = cursor.read_up_to(offset + i as u64, DATE_BLOCK_LEN)?;
            return Ok(decode_date_block(&block));
        }
        if window.len() < WINDOW {
            return Ok(None);
        }
        offset += (WINDOW - WINDOW_OVERLAP) as u64;
    }
}

/// The block starts at the tag. After the first 0x18 byte come a time-zone
/// byte, two year bytes and the month; day, hour, minute and second follow
/// one byte later. Each byte is written out as its two hex digits.
fn decode_date_block(block: &[u8]) -> Option<NaiveDateTime> {
    let at = block.iter().position(|&b| b == DATE_TAG)?;
    let byte = |rel: usize| block.get(at + rel).copied();

    let text = format!(
        "{:02x}{:02x}-{:02x}-{:02x}T{:02x}:{:02x}:{:02x}",
        byte(2)?,
        byte(3)?,
        byte(4)?,
        byte(6)?,
        byte(7)?,
        byte(8)?,
        byte(9)?,
    );
    NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S").ok()
}
