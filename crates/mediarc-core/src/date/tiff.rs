use std::io::{Read, Seek};

use super::exif::TAG_DATE_TIME;
use super::reader::{ByteCursor, ByteOrder};
use super::{parse_exif_datetime, DateResult};
use crate::error::ExtractError;
use crate::media::MediaFormat;

/// Read tag 0x0132 (DateTime) from IFD0 of a TIFF or TIFF-based RAW file.
///
/// The sniffer has already classified the stream as TIFF, so a header that
/// is neither `II*\0` nor `MM\0*` is a hard error rather than an unknown date.
pub fn creation_time<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> DateResult {
    let order = match cursor.read_array::<4>(0)? {
        Some([b'I', b'I', 0x2A, 0x00]) => ByteOrder::Little,
        Some([b'M', b'M', 0x00, 0x2A]) => ByteOrder::Big,
        _ => return Err(ExtractError::HeaderMismatch(MediaFormat::Tiff)),
    };

    let Some(ifd) = cursor.read_u32(4, order)? else {
        return Ok(None);
    };
    let ifd = u64::from(ifd);
    let Some(count) = cursor.read_u16(ifd, order)? else {
        return Ok(None);
    };

    let end = ifd + 2 + u64::from(count) * 12;
    let mut entry = ifd + 2;
    while entry + 12 <= end {
        let Some(raw) = cursor.read_array::<12>(entry)? else {
            return Ok(None);
        };
        entry += 12;

        if order.u16([raw[0], raw[1]]) == TAG_DATE_TIME {
            let at = order.u32([raw[8], raw[9], raw[10], raw[11]]);
            let date = cursor.read_up_to(u64::from(at), 20)?;
            return Ok(date.get(..19).and_then(parse_exif_datetime));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::testdata::tiff_block;
    use std::io::Cursor;

    fn extract(bytes: Vec<u8>) -> DateResult {
        let mut cursor = ByteCursor::new(Cursor::new(bytes)).unwrap();
        creation_time(&mut cursor)
    }

    #[test]
    fn test_reads_datetime_in_both_byte_orders() {
        for little in [true, false] {
            let tiff = tiff_block(little, Some("2015:07:04 21:15:00"), None);
            let dt = extract(tiff).unwrap().unwrap();
            assert_eq!(dt.to_string(), "2015-07-04 21:15:00");
        }
    }

    #[test]
    fn test_zeroed_or_missing_date_is_unknown() {
        assert!(extract(tiff_block(true, Some("0000:00:00 00:00:00"), None)).unwrap().is_none());
        assert!(extract(tiff_block(false, None, None)).unwrap().is_none());
    }

    #[test]
    fn test_bad_header_is_a_hard_error() {
        let mut tiff = tiff_block(true, Some("2015:07:04 21:15:00"), None);
        tiff[2] = 0x2B;
        assert!(matches!(
            extract(tiff),
            Err(ExtractError::HeaderMismatch(MediaFormat::Tiff))
        ));
        assert!(matches!(
            extract(Vec::new()),
            Err(ExtractError::HeaderMismatch(MediaFormat::Tiff))
        ));
    }

    #[test]
    fn test_truncated_directory_is_unknown() {
        let tiff = tiff_block(true, Some("2015:07:04 21:15:00"), None);
        for cut in [6usize, 9, 20, 40] {
            assert!(extract(tiff[..cut].to_vec()).unwrap().is_none(), "cut at {cut}");
        }
    }

    #[test]
    fn test_inflated_entry_count_stays_bounded() {
        let mut tiff = tiff_block(true, None, None);
        tiff[8..10].copy_from_slice(&u16::MAX.to_le_bytes());
        assert!(extract(tiff).unwrap().is_none());
    }
}
