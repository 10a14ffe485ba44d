//! # Byte Reader
//!
//! Forward-only little-endian cursor over a byte slice. Every read either
//! advances the single running offset or fails without moving it.

use crate::error::ReadError;

/// Little-endian cursor.
#[derive(Clone, Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current offset.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Returns true when every byte has been consumed.
    #[inline]
    #[must_use]
    pub const fn is_at_end(&self) -> bool {
        self.offset == self.data.len()
    }

    /// Takes the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        if len > self.remaining() {
            return Err(ReadError::UnexpectedEnd {
                offset: self.offset,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    /// Takes the next `N` bytes as an array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads a little-endian i32.
    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        self.read_array().map(i32::from_le_bytes)
    }

    /// Reads a little-endian f32.
    pub fn read_f32(&mut self) -> Result<f32, ReadError> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// Reads `N` consecutive f32 values.
    pub fn read_f32_array<const N: usize>(&mut self) -> Result<[f32; N], ReadError> {
        let bytes = self.read_bytes(N * 4)?;
        let mut out = [0.0f32; N];
        for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(out)
    }

    /// Reads `N` consecutive u16 values.
    pub fn read_u16_array<const N: usize>(&mut self) -> Result<[u16; N], ReadError> {
        let bytes = self.read_bytes(N * 2)?;
        let mut out = [0u16; N];
        for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(2)) {
            *value = u16::from_le_bytes([chunk[0], chunk[1]]);
        }
        Ok(out)
    }

    /// Reads a NUL-terminated UTF-8 string and consumes the terminator.
    pub fn read_cstr(&mut self) -> Result<&'a str, ReadError> {
        let start = self.offset;
        let rest = &self.data[start..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ReadError::UnterminatedString(start))?;
        let text = std::str::from_utf8(&rest[..len]).map_err(|_| ReadError::InvalidUtf8(start))?;
        self.offset += len + 1;
        Ok(text)
    }

    /// Reads a fixed-width, NUL-padded UTF-8 field of `width` bytes.
    ///
    /// The value ends at the first NUL or at `width`, whichever comes first.
    pub fn read_fixed_str(&mut self, width: usize) -> Result<&'a str, ReadError> {
        let start = self.offset;
        let field = self.read_bytes(width)?;
        let len = field.iter().position(|&b| b == 0).unwrap_or(width);
        std::str::from_utf8(&field[..len]).map_err(|_| ReadError::InvalidUtf8(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian() {
        let data = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xFF];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(reader.read_u8().unwrap(), 0xFF);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_short_read_does_not_advance() {
        let data = [1, 2, 3];
        let mut reader = ByteReader::new(&data);
        reader.read_u8().unwrap();

        let err = reader.read_u32().unwrap_err();
        assert_eq!(
            err,
            ReadError::UnexpectedEnd { offset: 1, needed: 4, remaining: 2 }
        );
        assert_eq!(reader.offset(), 1);
    }

    #[test]
    fn test_cstr() {
        let data = b"wave\0next\0";
        let mut reader = ByteReader::new(data);
        assert_eq!(reader.read_cstr().unwrap(), "wave");
        assert_eq!(reader.read_cstr().unwrap(), "next");
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_unterminated_cstr() {
        let mut reader = ByteReader::new(b"abc");
        assert_eq!(reader.read_cstr(), Err(ReadError::UnterminatedString(0)));
    }

    #[test]
    fn test_fixed_str_stops_at_nul_and_consumes_width() {
        let mut field = [0u8; 16];
        field[..6].copy_from_slice(b"PELVIS");
        let mut data = field.to_vec();
        data.push(7);

        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_fixed_str(16).unwrap(), "PELVIS");
        assert_eq!(reader.read_u8().unwrap(), 7);
    }

    #[test]
    fn test_fixed_str_full_width() {
        let data = *b"ABCDEFGHIJKLMNOP";
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_fixed_str(16).unwrap(), "ABCDEFGHIJKLMNOP");
    }
}
