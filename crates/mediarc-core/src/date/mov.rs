use std::io::{self, Read, Seek};

use chrono::NaiveDateTime;

use super::reader::{ByteCursor, ByteOrder};
use super::{unix_to_local, DateResult};

/// Seconds between 1904-01-01 (QuickTime epoch) and 1970-01-01.
const QT_EPOCH_OFFSET: i64 = 2_082_844_800;

#[derive(Debug, Clone, Copy)]
struct BoxHeader {
    kind: [u8; 4],
    data_start: u64,
    end: u64,
}

/// Outcome of scanning one level of boxes.
enum Walk {
    /// `mvhd` was reached (its creation time may still be unset), or the
    /// structure is broken; either way scanning stops.
    Done(Option<NaiveDateTime>),
    Continue,
}

/// Creation time from `moov/mvhd`, converted to local calendar fields.
pub fn creation_time<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> DateResult {
    let len = cursor.len();
    let mut offset = 0u64;

    while offset < len {
        let Some(top) = read_box(cursor, offset, len)? else {
            return Ok(None);
        };
        if &top.kind == b"moov" {
            if let Walk::Done(found) = scan_moov(cursor, top)? {
                return Ok(found);
            }
        }
        offset = top.end;
    }
    Ok(None)
}

fn scan_moov<R: Read + Seek>(cursor: &mut ByteCursor<R>, moov: BoxHeader) -> io::Result<Walk> {
    let mut offset = moov.data_start;
    while offset < moov.end {
        let Some(child) = read_box(cursor, offset, moov.end)? else {
            return Ok(Walk::Done(None));
        };
        if &child.kind == b"mvhd" {
            return Ok(Walk::Done(read_mvhd(cursor, child)?));
        }
        offset = child.end;
    }
    Ok(Walk::Continue)
}

/// Parse `{size, type}` at `offset`. `None` when the header is truncated or
/// the declared size cannot fit inside `limit` and the stream.
fn read_box<R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    offset: u64,
    limit: u64,
) -> io::Result<Option<BoxHeader>> {
    let Some(header) = cursor.read_array::<8>(offset)? else {
        return Ok(None);
    };
    let declared = ByteOrder::Big.u32([header[0], header[1], header[2], header[3]]);
    let kind = [header[4], header[5], header[6], header[7]];

    let (size, header_len) = match declared {
        // 64-bit "largesize" follows the type.
        1 => match cursor.read_u64(offset + 8, ByteOrder::Big)? {
            Some(large) => (large, 16),
            None => return Ok(None),
        },
        // Box extends to the end of its container.
        0 => (limit - offset, 8),
        n => (u64::from(n), 8),
    };

    let Some(end) = offset.checked_add(size) else {
        return Ok(None);
    };
    if size < header_len || end > limit || end > cursor.len() {
        return Ok(None);
    }
    Ok(Some(BoxHeader {
        kind,
        data_start: offset + header_len,
        end,
    }))
}

fn read_mvhd<R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    mvhd: BoxHeader,
) -> io::Result<Option<NaiveDateTime>> {
    // 1-byte version, 3-byte flags, then the times.
    let Some(version) = cursor.read_u8(mvhd.data_start)? else {
        return Ok(None);
    };
    let times_at = mvhd.data_start + 4;
    let created = match version {
        0 => cursor.read_u32(times_at, ByteOrder::Big)?.map(u64::from),
        1 => cursor.read_u64(times_at, ByteOrder::Big)?,
        _ => None,
    };

    Ok(match created {
        None | Some(0) => None,
        Some(secs) => i64::try_from(secs)
            .ok()
            .and_then(|s| unix_to_local(s - QT_EPOCH_OFFSET)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    fn mvhd_v0(created: u32) -> Vec<u8> {
        let mut payload = vec![0, 0, 0, 0];
        payload.extend_from_slice(&created.to_be_bytes());
        payload.extend_from_slice(&created.to_be_bytes());
        payload.extend_from_slice(&600u32.to_be_bytes());
        payload.extend_from_slice(&6000u32.to_be_bytes());
        payload.extend_from_slice(&[0u8; 80]);
        make_box(b"mvhd", &payload)
    }

    fn mvhd_v1(created: u64) -> Vec<u8> {
        let mut payload = vec![1, 0, 0, 0];
        payload.extend_from_slice(&created.to_be_bytes());
        payload.extend_from_slice(&created.to_be_bytes());
        payload.extend_from_slice(&600u32.to_be_bytes());
        payload.extend_from_slice(&6000u64.to_be_bytes());
        payload.extend_from_slice(&[0u8; 80]);
        make_box(b"mvhd", &payload)
    }

    fn movie(mvhd: Vec<u8>) -> Vec<u8> {
        let mut out = make_box(b"ftyp", b"qt  \0\0\0\0qt  ");
        out.extend(make_box(b"wide", &[]));
        out.extend(make_box(b"mdat", &[0x55; 64]));
        let mut moov = make_box(b"udta", &[0u8; 12]);
        moov.extend(mvhd);
        moov.extend(make_box(b"trak", &[0u8; 16]));
        out.extend(make_box(b"moov", &moov));
        out
    }

    fn extract(bytes: Vec<u8>) -> Option<NaiveDateTime> {
        let mut cursor = ByteCursor::new(Cursor::new(bytes)).unwrap();
        creation_time(&mut cursor).unwrap()
    }

    #[test]
    fn test_reads_version_0_creation_time() {
        let expected = unix_to_local(3_000_000_000 - QT_EPOCH_OFFSET);
        assert_eq!(extract(movie(mvhd_v0(3_000_000_000))), expected);
        assert!(expected.is_some());
    }

    #[test]
    fn test_reads_version_1_creation_time() {
        let expected = unix_to_local(3_600_000_000 - QT_EPOCH_OFFSET);
        assert_eq!(extract(movie(mvhd_v1(3_600_000_000))), expected);
    }

    #[test]
    fn test_follows_64_bit_box_sizes() {
        // mdat with size field 1 and the real length in the largesize slot.
        let mut bytes = make_box(b"ftyp", b"qt  \0\0\0\0qt  ");
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(b"mdat");
        bytes.extend_from_slice(&(16u64 + 40).to_be_bytes());
        bytes.extend_from_slice(&[0x55; 40]);
        bytes.extend(make_box(b"moov", &mvhd_v0(3_000_000_000)));

        let expected = unix_to_local(3_000_000_000 - QT_EPOCH_OFFSET);
        assert!(expected.is_some());
        assert_eq!(extract(bytes.clone()), expected);

        // A largesize reaching past the stream is unknown.
        let at = 8 + 12 + 8;
        bytes[at..at + 8].copy_from_slice(&u64::MAX.to_be_bytes());
        assert_eq!(extract(bytes), None);
    }

    #[test]
    fn test_zero_creation_time_is_unknown() {
        assert_eq!(extract(movie(mvhd_v0(0))), None);
    }

    #[test]
    fn test_no_moov_is_unknown() {
        let mut bytes = make_box(b"ftyp", b"isom\0\0\0\0");
        bytes.extend(make_box(b"mdat", &[1, 2, 3]));
        assert_eq!(extract(bytes), None);
    }

    #[test]
    fn test_oversized_box_is_unknown() {
        let mut bytes = movie(mvhd_v0(3_000_000_000));
        // Inflate the ftyp size past the end of the stream.
        bytes[0..4].copy_from_slice(&0x7FFF_FFFFu32.to_be_bytes());
        assert_eq!(extract(bytes), None);
    }

    #[test]
    fn test_undersized_box_does_not_loop() {
        let mut bytes = movie(mvhd_v0(3_000_000_000));
        bytes[0..4].copy_from_slice(&4u32.to_be_bytes());
        assert_eq!(extract(bytes), None);
    }

    #[test]
    fn test_child_overrunning_moov_is_unknown() {
        let mvhd = mvhd_v0(3_000_000_000);
        let mut moov_payload = make_box(b"udta", &[0u8; 4]);
        moov_payload[0..4].copy_from_slice(&200u32.to_be_bytes());
        moov_payload.extend(mvhd);
        let mut bytes = make_box(b"moov", &moov_payload);
        bytes.extend(make_box(b"free", &[0u8; 256]));
        assert_eq!(extract(bytes), None);
    }

    #[test]
    fn test_truncated_stream_is_unknown() {
        let bytes = movie(mvhd_v0(3_000_000_000));
        assert_eq!(extract(bytes[..bytes.len() - 30].to_vec()), None);
        assert_eq!(extract(Vec::new()), None);
    }
}
