//! Content signatures: an exact CRC-32 and a perceptual difference hash.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use flate2::Crc;
use image::imageops::FilterType;
use image::ImageReader;

use crate::error::{ArchiveError, Result};

/// Block size used when streaming a file through the checksum.
pub const CRC_BLOCK_SIZE: usize = 8 * 1024;

const DHASH_WIDTH: u32 = 9;
const DHASH_HEIGHT: u32 = 8;
const DHASH_BITS: u32 = DHASH_WIDTH * DHASH_HEIGHT;

/// CRC-32 (zlib polynomial) of the whole file. Never cached.
pub fn crc32(path: &Path) -> Result<u32> {
    let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
    crc32_reader(file, CRC_BLOCK_SIZE).map_err(|e| ArchiveError::io(path, e))
}

/// Fold `reader` into a running CRC-32, `block_size` bytes at a time.
pub fn crc32_reader<R: Read>(mut reader: R, block_size: usize) -> io::Result<u32> {
    let mut crc = Crc::new();
    let mut buf = vec![0u8; block_size.max(1)];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        crc.update(&buf[..n]);
    }
    Ok(crc.sum())
}

/// 72-bit difference hash, most significant bit first in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageFingerprint(pub u128);

impl fmt::Display for ImageFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:018x}", self.0)
    }
}

/// Compute the dHash of an image file.
///
/// The image is reduced to a 9x8 grayscale grid; bit `i` is set when pixel
/// `i` is brighter than pixel `i - 1`. The first pixel has no predecessor
/// and always contributes 0.
pub fn dhash(path: &Path) -> Result<ImageFingerprint> {
    let image = ImageReader::open(path)
        .map_err(|e| ArchiveError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| ArchiveError::io(path, e))?
        .decode()
        .map_err(|source| ArchiveError::Fingerprint {
            path: path.to_path_buf(),
            source,
        })?;

    let grid = image
        .grayscale()
        .resize_exact(DHASH_WIDTH, DHASH_HEIGHT, FilterType::Triangle)
        .to_luma8();
    Ok(fingerprint_from_luma(grid.as_raw()))
}

fn fingerprint_from_luma(pixels: &[u8]) -> ImageFingerprint {
    let mut bits = 0u128;
    for i in 0..DHASH_BITS as usize {
        bits <<= 1;
        if i != 0 && pixels.get(i) > pixels.get(i - 1) {
            bits |= 1;
        }
    }
    ImageFingerprint(bits)
}

/// Hamming distance between two fingerprints; smaller means more alike.
pub fn image_distance(a: ImageFingerprint, b: ImageFingerprint) -> u32 {
    (a.0 ^ b.0).count_ones()
}
