use std::io::{self, Read, Seek, SeekFrom};

/// Seekable byte source with a known length.
///
/// Reads that would run past `len` are reported as `Ok(None)`: the file's
/// declared structure is malformed, not broken. A read that fails once the
/// length check has passed is a real I/O fault and is returned as `Err`.
pub struct ByteCursor<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> ByteCursor<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn fits(&self, offset: u64, count: usize) -> bool {
        offset
            .checked_add(count as u64)
            .is_some_and(|end| end <= self.len)
    }

    /// Fill `buf` from `offset`. Returns `false` when the stream is too short.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<bool> {
        if !self.fits(offset, buf.len()) {
            return Ok(false);
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.read_exact(buf)?;
        Ok(true)
    }

    pub fn read_array<const N: usize>(&mut self, offset: u64) -> io::Result<Option<[u8; N]>> {
        let mut buf = [0u8; N];
        Ok(self.read_at(offset, &mut buf)?.then_some(buf))
    }

    pub fn read_vec(&mut self, offset: u64, count: usize) -> io::Result<Option<Vec<u8>>> {
        if !self.fits(offset, count) {
            return Ok(None);
        }
        let mut buf = vec![0u8; count];
        self.read_at(offset, &mut buf)?;
        Ok(Some(buf))
    }

    /// Read up to `count` bytes from `offset`, fewer near the end of the stream.
    pub fn read_up_to(&mut self, offset: u64, count: usize) -> io::Result<Vec<u8>> {
        let available = self.len.saturating_sub(offset).min(count as u64) as usize;
        let mut buf = vec![0u8; available];
        if available > 0 {
            self.read_at(offset, &mut buf)?;
        }
        Ok(buf)
    }

    pub fn read_u8(&mut self, offset: u64) -> io::Result<Option<u8>> {
        Ok(self.read_array::<1>(offset)?.map(|b| b[0]))
    }

    pub fn read_u16(&mut self, offset: u64, order: ByteOrder) -> io::Result<Option<u16>> {
        Ok(self.read_array::<2>(offset)?.map(|b| order.u16(b)))
    }

    pub fn read_u32(&mut self, offset: u64, order: ByteOrder) -> io::Result<Option<u32>> {
        Ok(self.read_array::<4>(offset)?.map(|b| order.u32(b)))
    }

    pub fn read_u64(&mut self, offset: u64, order: ByteOrder) -> io::Result<Option<u64>> {
        Ok(self.read_array::<8>(offset)?.map(|b| order.u64(b)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn u16(self, b: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(b),
            Self::Big => u16::from_be_bytes(b),
        }
    }

    pub fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(b),
            Self::Big => u32::from_be_bytes(b),
        }
    }

    pub fn u64(self, b: [u8; 8]) -> u64 {
        match self {
            Self::Little => u64::from_le_bytes(b),
            Self::Big => u64::from_be_bytes(b),
        }
    }

    /// Decode a 2-byte field out of an in-memory block; `None` past its end.
    pub fn u16_at(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes = data.get(offset..offset.checked_add(2)?)?;
        Some(self.u16([bytes[0], bytes[1]]))
    }

    pub fn u32_at(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes = data.get(offset..offset.checked_add(4)?)?;
        Some(self.u32([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
