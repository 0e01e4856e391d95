use crate::error::ParseError;
use crate::model::Tag;
use crate::transfer_syntax::ByteOrder;

/// Cursor over an in-memory byte stream.
///
/// Every read is bounds checked and reports its absolute offset, so a short
/// stream always becomes `ParseError::Truncated` instead of a panic.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    offset: usize,
    base: usize,
    order: ByteOrder,
}

impl<'a> ByteReader<'a> {
    pub fn new(buffer: &'a [u8], order: ByteOrder) -> Self {
        ByteReader {
            buffer,
            offset: 0,
            base: 0,
            order,
        }
    }

    /// Absolute position in the original stream.
    pub fn position(&self) -> usize {
        self.base + self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn peek(&self, length: usize) -> Result<&'a [u8], ParseError> {
        if length > self.remaining() {
            return Err(ParseError::Truncated {
                offset: self.position(),
                needed: length - self.remaining(),
            });
        }
        Ok(&self.buffer[self.offset..self.offset + length])
    }

    pub fn take(&mut self, length: usize) -> Result<&'a [u8], ParseError> {
        let bytes = self.peek(length)?;
        self.offset += length;
        Ok(bytes)
    }

    /// Splits off the next `length` bytes as their own reader, keeping
    /// absolute offsets and byte order.
    pub fn sub_reader(&mut self, length: usize) -> Result<ByteReader<'a>, ParseError> {
        let base = self.position();
        let buffer = self.take(length)?;
        Ok(ByteReader {
            buffer,
            offset: 0,
            base,
            order: self.order,
        })
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let bytes: [u8; 2] = array(self.take(2)?);
        Ok(match self.order {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let bytes: [u8; 4] = array(self.take(4)?);
        Ok(match self.order {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn read_tag(&mut self) -> Result<Tag, ParseError> {
        let group = self.read_u16()?;
        let element = self.read_u16()?;
        Ok(Tag(group, element))
    }

    pub fn peek_tag(&self) -> Result<Tag, ParseError> {
        self.clone().read_tag()
    }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

/// Decodes a packed array of fixed-size numbers. The caller checks that the
/// length is a multiple of `N`.
pub fn decode_numbers<const N: usize, T>(
    bytes: &[u8],
    order: ByteOrder,
    from_le: fn([u8; N]) -> T,
    from_be: fn([u8; N]) -> T,
) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| match order {
            ByteOrder::Little => from_le(array(chunk)),
            ByteOrder::Big => from_be(array(chunk)),
        })
        .collect()
}

/// Upper-case hex dump of at most `limit` bytes, for error messages.
pub fn hex_preview(bytes: &[u8], limit: usize) -> String {
    let mut result = bytes
        .iter()
        .take(limit)
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() > limit {
        result.push_str(" ..");
    }
    result
}
