//! Little-endian byte cursor with bounded sub-streams.

use crate::TapeError;

/// A read cursor over an in-memory image or one chunk's payload.
#[derive(Debug, Clone)]
pub(crate) struct ByteStream {
    data: Vec<u8>,
    pos: usize,
    context: &'static str,
}

impl ByteStream {
    pub(crate) fn new(data: Vec<u8>, context: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            context,
        }
    }

    pub(crate) fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub(crate) fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&[u8], TapeError> {
        let remaining = self.data.len() - self.pos;
        if n > remaining {
            return Err(TapeError::Truncated {
                context: self.context,
                offset: self.pos,
                needed: n,
                remaining,
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, TapeError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, TapeError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, TapeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32, TapeError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read up to a NUL terminator (or the end of the stream).
    pub(crate) fn read_nul_string(&mut self) -> String {
        let rest = &self.data[self.pos..];
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let text = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos = (self.pos + len + 1).min(self.data.len());
        text
    }

    /// Split off the next `len` bytes as an independent stream.
    pub(crate) fn substream(
        &mut self,
        len: usize,
        context: &'static str,
    ) -> Result<ByteStream, TapeError> {
        let bytes = self.take(len)?.to_vec();
        Ok(ByteStream::new(bytes, context))
    }
}
