//! Big-endian cursor over class file bytes

use super::error::{ClassFileError, ClassFileResult};

/// Cursor over a byte slice. Every read is bounds-checked and reports the offset it failed at.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current offset from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, n: usize) -> ClassFileResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(ClassFileError::UnexpectedEof {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> ClassFileResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u1(&mut self) -> ClassFileResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u2(&mut self) -> ClassFileResult<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u4(&mut self) -> ClassFileResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i1(&mut self) -> ClassFileResult<i8> {
        Ok(self.read_u1()? as i8)
    }

    pub fn read_i2(&mut self) -> ClassFileResult<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i4(&mut self) -> ClassFileResult<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i8(&mut self) -> ClassFileResult<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    /// Skip `n` bytes without interpreting them
    pub fn skip(&mut self, n: usize) -> ClassFileResult<()> {
        self.read_bytes(n).map(|_| ())
    }
}
