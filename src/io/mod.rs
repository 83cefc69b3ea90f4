//! Envelope-checked stream access
//!
//! Every length field in a JP2 stream is untrusted, so all reads go through
//! [`BoundedReader`]: a thin wrapper that knows the total stream size and
//! refuses any read, seek or allocation that would cross it. Overruns become
//! unrepresentable instead of being caught ad hoc at each call site.

use crate::core::error::{MetaError, MetaResult};
use std::io::{Read, Seek, SeekFrom};

/// A reader bounded by the size of the underlying stream.
///
/// The stream is borrowed exclusively for the duration of one operation;
/// dropping the `BoundedReader` releases it. The size is probed once at
/// construction and every subsequent read is validated against it.
pub struct BoundedReader<'a, R: Read + Seek> {
    inner: &'a mut R,
    size: u64,
}

impl<'a, R: Read + Seek> BoundedReader<'a, R> {
    /// Wrap a stream, probing its total size.
    ///
    /// The current position is preserved.
    pub fn new(inner: &'a mut R) -> MetaResult<Self> {
        let pos = inner.stream_position()?;
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(Self { inner, size })
    }

    /// Total size of the underlying stream in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current position.
    pub fn position(&mut self) -> MetaResult<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Bytes between the current position and the end of the stream.
    pub fn remaining(&mut self) -> MetaResult<u64> {
        let pos = self.position()?;
        Ok(self.size.saturating_sub(pos))
    }

    /// Read exactly `n` bytes.
    ///
    /// Fails with [`MetaError::InputDataReadFailed`] if `n` exceeds the
    /// remaining envelope, so a corrupted length can never trigger an
    /// allocation larger than the stream itself.
    pub fn read_exact(&mut self, n: u64) -> MetaResult<Vec<u8>> {
        if n > self.remaining()? {
            return Err(MetaError::InputDataReadFailed);
        }
        let n = usize::try_from(n).map_err(|_| MetaError::InputDataReadFailed)?;
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => MetaError::InputDataReadFailed,
            _ => MetaError::FailedToReadImageData,
        })?;
        Ok(buf)
    }

    /// Read up to `n` bytes without moving the position.
    pub fn peek(&mut self, n: u64) -> MetaResult<Vec<u8>> {
        let pos = self.position()?;
        let n = n.min(self.remaining()?);
        let buf = self.read_exact(n)?;
        self.seek_absolute(pos)?;
        Ok(buf)
    }

    /// Seek to an absolute position within the envelope.
    pub fn seek_absolute(&mut self, pos: u64) -> MetaResult<()> {
        if pos > self.size {
            return Err(MetaError::CorruptedMetadata);
        }
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Seek relative to the current position, staying within the envelope.
    pub fn seek_relative(&mut self, delta: i64) -> MetaResult<()> {
        let pos = self.position()?;
        let target = pos
            .checked_add_signed(delta)
            .ok_or(MetaError::CorruptedMetadata)?;
        self.seek_absolute(target)
    }

    /// Read a big-endian `u32`.
    pub fn read_u32(&mut self) -> MetaResult<u32> {
        let b = self.read_exact(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian `u64`.
    pub fn read_u64(&mut self) -> MetaResult<u64> {
        let b = self.read_exact(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}
