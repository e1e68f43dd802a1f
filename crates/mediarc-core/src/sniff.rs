//! Magic-number classification of a stream's leading bytes.
//!
//! Rules are checked in table order and the first whose prefix equals the
//! stream's leading bytes wins. The order is part of the contract: the JPEG
//! rule is only the two-byte SOI marker (some cameras put EXIF data in bytes
//! 3-4), so anything more specific that could start with `FF D8` must sit
//! above it, and the ISO/QuickTime rules differ only in the size word and
//! brand and are kept grouped by brand.

use std::io::{self, Read};

use crate::media::{MediaClass, MediaFormat};

/// Number of bytes the sniffer reads from a stream. Every rule fits in it.
pub const PROBE_LEN: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct MagicRule {
    pub prefix: &'static [u8],
    pub format: MediaFormat,
    pub class: MediaClass,
}

const fn rule(prefix: &'static [u8], format: MediaFormat, class: MediaClass) -> MagicRule {
    MagicRule {
        prefix,
        format,
        class,
    }
}

use MediaClass::{Image, Video};
use MediaFormat::*;

pub static MAGIC_RULES: &[MagicRule] = &[
    rule(b"GIF8", Gif, Image),
    rule(&[0xFF, 0xD8], Jpeg, Image),
    rule(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], Png, Image),
    // "II" Intel byte order then 42 little-endian, "MM" Motorola then 42 big-endian.
    rule(b"II\x2A\x00", Tiff, Image),
    rule(b"MM\x00\x2A", Tiff, Image),
    rule(b"\x00\x00\x00\x14ftypisom", IsoBaseMedia, Video),
    rule(b"\x00\x00\x00\x18ftypisom", IsoBaseMedia, Video),
    rule(b"\x00\x00\x00\x20ftypisom", IsoBaseMedia, Video),
    rule(b"\x00\x00\x00\x14pnot", QuickTime, Video),
    rule(b"\x00\x00\x00\x14ftypqt", QuickTime, Video),
    rule(b"\x00\x00\x00\x18ftypqt", QuickTime, Video),
    rule(b"\x00\x00\x00\x20ftypqt", QuickTime, Video),
    rule(b"\x03\xD9\x84\x00mdat", QuickTime, Video),
    rule(b"\x00\x00\x00\x14ftyp3gp5", Mpeg4Video, Video),
    rule(b"\x00\x00\x00\x14ftypmp42", Mpeg4Video, Video),
    rule(b"\x00\x00\x00\x18ftypmp42", Mpeg4Video, Video),
    rule(b"\x00\x00\x00\x1Cftypmp42", Mpeg4Video, Video),
    // BDAV transport packets: 4-byte timecode header then the 0x47 sync byte.
    rule(b"\x00\x00\x00\x00G@", AvchdMts, Video),
    rule(b"\x00\x00\x00\x6CG@", AvchdMts, Video),
    rule(b"\x00\x00\x08\xE1G@", AvchdMts, Video),
    rule(b"\x00\x00\x08\xE2G@", AvchdMts, Video),
    rule(b"\x00\x00\x08\xE3G@", AvchdMts, Video),
    rule(b"\x00\x00\x0B\xA8G@", AvchdMts, Video),
    rule(b"\x00\x00\x0B\xA9G@", AvchdMts, Video),
];

/// Classify a byte prefix. Short or empty input simply fails to match the
/// longer rules.
pub fn sniff(bytes: &[u8]) -> (MediaFormat, MediaClass) {
    MAGIC_RULES
        .iter()
        .find(|r| bytes.starts_with(r.prefix))
        .map(|r| (r.format, r.class))
        .unwrap_or((MediaFormat::Unknown, MediaClass::Unknown))
}

/// Read at most [`PROBE_LEN`] bytes from `reader` and classify them.
pub fn sniff_reader<R: Read>(reader: &mut R) -> io::Result<(MediaFormat, MediaClass)> {
    let mut probe = Vec::with_capacity(PROBE_LEN);
    reader.take(PROBE_LEN as u64).read_to_end(&mut probe)?;
    Ok(sniff(&probe))
}
