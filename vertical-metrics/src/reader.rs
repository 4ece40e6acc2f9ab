//! Sequential big-endian reads over container data.

use read_fonts::{types::Tag, FontData, ReadError};

/// A forward-only cursor over [`FontData`].
///
/// The WOFF containers are streams of variable length records, which the
/// table-oriented API of read-fonts does not model; this fills that gap.
#[derive(Clone)]
pub(crate) struct Reader<'a> {
    data: FontData<'a>,
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            data: FontData::new(bytes),
            pos: 0,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, ReadError> {
        let value = self.data.read_at::<u8>(self.pos)?;
        self.pos += 1;
        Ok(value)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, ReadError> {
        let value = self.data.read_at::<u16>(self.pos)?;
        self.pos += 2;
        Ok(value)
    }

    pub(crate) fn read_i16(&mut self) -> Result<i16, ReadError> {
        let value = self.data.read_at::<i16>(self.pos)?;
        self.pos += 2;
        Ok(value)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ReadError> {
        let value = self.data.read_at::<u32>(self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    pub(crate) fn read_tag(&mut self) -> Result<Tag, ReadError> {
        self.read_u32().map(Tag::from_u32)
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        let end = self.pos.checked_add(len).ok_or(ReadError::OutOfBounds)?;
        let bytes = self
            .data
            .slice(self.pos..end)
            .ok_or(ReadError::OutOfBounds)?
            .as_bytes();
        self.pos = end;
        Ok(bytes)
    }

    /// Read a [UIntBase128] value.
    ///
    /// [UIntBase128]: https://www.w3.org/TR/WOFF2/#DataTypes
    pub(crate) fn read_base128(&mut self) -> Result<u32, ReadError> {
        let mut accum = 0u32;
        for i in 0..5 {
            let byte = self.read_u8()?;
            // no leading zeros
            if i == 0 && byte == 0x80 {
                return Err(ReadError::MalformedData("UIntBase128 has a leading zero"));
            }
            if accum & 0xFE00_0000 != 0 {
                return Err(ReadError::MalformedData("UIntBase128 overflows 32 bits"));
            }
            accum = (accum << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                return Ok(accum);
            }
        }
        Err(ReadError::MalformedData("UIntBase128 is longer than 5 bytes"))
    }

    /// Read a [255UInt16] value.
    ///
    /// [255UInt16]: https://www.w3.org/TR/WOFF2/#DataTypes
    pub(crate) fn read_255_u16(&mut self) -> Result<u16, ReadError> {
        const ONE_MORE_BYTE_CODE1: u8 = 255;
        const ONE_MORE_BYTE_CODE2: u8 = 254;
        const WORD_CODE: u8 = 253;
        const LOWEST_U_CODE: u16 = 253;

        match self.read_u8()? {
            WORD_CODE => self.read_u16(),
            ONE_MORE_BYTE_CODE1 => Ok(self.read_u8()? as u16 + LOWEST_U_CODE),
            ONE_MORE_BYTE_CODE2 => Ok(self.read_u8()? as u16 + LOWEST_U_CODE * 2),
            code => Ok(code as u16),
        }
    }
}
