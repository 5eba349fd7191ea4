// BER primitives used by the control value codecs and the control envelope.
// Definite lengths only (up to 4 length octets), single-byte tags.

use std::io::Cursor;
use thiserror::Error;

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_ENUMERATED: u8 = 0x0A;
pub const TAG_SEQUENCE: u8 = 0x30;

/// Context-specific primitive tag `[n]` (e.g. `[0]` = 0x80).
pub const fn context_primitive(n: u8) -> u8 {
    0x80 | (n & 0x1F)
}

/// Context-specific constructed tag `[n]` (e.g. `[2]` = 0xA2).
pub const fn context_constructed(n: u8) -> u8 {
    0xA0 | (n & 0x1F)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BerError {
    #[error("BER truncated: need {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("indefinite length not supported")]
    IndefiniteLength,
    #[error("length too large: {0} bytes")]
    LengthTooLarge(usize),
    #[error("multi-byte tag numbers not supported: 0x{0:02X}")]
    HighTagNumber(u8),
    #[error("expected tag 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedTag { expected: u8, actual: u8 },
    #[error("{kind} value must be 1 byte, got {length}")]
    InvalidLength { kind: &'static str, length: usize },
    #[error("invalid UTF-8 string")]
    InvalidUtf8,
    #[error("{0} trailing bytes after element")]
    TrailingBytes(usize),
}

pub type BerResult<T> = std::result::Result<T, BerError>;

/// One decoded TLV. `value` borrows the content octets from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BerElement<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

impl<'a> BerElement<'a> {
    /// Decodes exactly one element; trailing data is an error.
    pub fn decode(data: &'a [u8]) -> BerResult<Self> {
        let mut reader = BerReader::new(data);
        let element = reader.read_element()?;
        if !reader.is_empty() {
            return Err(BerError::TrailingBytes(reader.remaining()));
        }
        Ok(element)
    }

    pub fn expect_tag(self, expected: u8) -> BerResult<Self> {
        if self.tag != expected {
            return Err(BerError::UnexpectedTag {
                expected,
                actual: self.tag,
            });
        }
        Ok(self)
    }

    /// Tag is not checked, so implicitly tagged booleans decode the same way.
    pub fn as_boolean(&self) -> BerResult<bool> {
        if self.value.len() != 1 {
            return Err(BerError::InvalidLength {
                kind: "Boolean",
                length: self.value.len(),
            });
        }
        Ok(self.value[0] != 0)
    }

    pub fn as_enumerated(&self) -> BerResult<u8> {
        if self.value.len() != 1 {
            return Err(BerError::InvalidLength {
                kind: "Enumerated",
                length: self.value.len(),
            });
        }
        Ok(self.value[0])
    }

    pub fn as_octet_string(&self) -> &'a [u8] {
        self.value
    }

    pub fn as_string(&self) -> BerResult<String> {
        String::from_utf8(self.value.to_vec()).map_err(|_| BerError::InvalidUtf8)
    }

    /// Parses the content octets as a sequence of nested elements.
    pub fn elements(&self) -> BerResult<Vec<BerElement<'a>>> {
        let mut reader = BerReader::new(self.value);
        let mut elements = Vec::new();
        while !reader.is_empty() {
            elements.push(reader.read_element()?);
        }
        Ok(elements)
    }
}

// BER parsing utilities
pub struct BerReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> BerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    fn take(&mut self, n: usize) -> BerResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(BerError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let data: &'a [u8] = *self.cursor.get_ref();
        let pos = self.cursor.position() as usize;
        self.cursor.set_position((pos + n) as u64);
        Ok(&data[pos..pos + n])
    }

    pub fn read_tag(&mut self) -> BerResult<u8> {
        let tag = self.take(1)?[0];
        if (tag & 0x1F) == 0x1F {
            return Err(BerError::HighTagNumber(tag));
        }
        Ok(tag)
    }

    pub fn read_length(&mut self) -> BerResult<usize> {
        let first_byte = self.take(1)?[0];

        if (first_byte & 0x80) == 0 {
            // Short form
            Ok(first_byte as usize)
        } else {
            // Long form
            let length_bytes = (first_byte & 0x7F) as usize;
            if length_bytes == 0 {
                return Err(BerError::IndefiniteLength);
            }
            if length_bytes > 4 {
                return Err(BerError::LengthTooLarge(length_bytes));
            }
            let mut length = 0u32;
            for &b in self.take(length_bytes)? {
                length = (length << 8) | b as u32;
            }
            Ok(length as usize)
        }
    }

    pub fn read_element(&mut self) -> BerResult<BerElement<'a>> {
        let tag = self.read_tag()?;
        let length = self.read_length()?;
        let value = self.take(length)?;
        Ok(BerElement { tag, value })
    }

    pub fn remaining(&self) -> usize {
        let pos = self.cursor.position() as usize;
        let len = self.cursor.get_ref().len();
        len.saturating_sub(pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

// BER encoding utilities
#[derive(Debug, Default)]
pub struct BerWriter {
    buffer: Vec<u8>,
}

impl BerWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_tag(&mut self, tag: u8) {
        self.buffer.push(tag);
    }

    fn write_length(&mut self, length: usize) {
        let encoded = encode_length(length);
        self.buffer.extend_from_slice(&encoded);
    }

    pub fn write_boolean(&mut self, value: bool) {
        self.write_boolean_tagged(TAG_BOOLEAN, value);
    }

    pub fn write_boolean_tagged(&mut self, tag: u8, value: bool) {
        self.write_tag(tag);
        self.write_length(1);
        self.buffer.push(if value { 0xFF } else { 0x00 });
    }

    pub fn write_octet_string(&mut self, data: &[u8]) {
        self.write_octet_string_tagged(TAG_OCTET_STRING, data);
    }

    pub fn write_octet_string_tagged(&mut self, tag: u8, data: &[u8]) {
        self.write_tag(tag);
        self.write_length(data.len());
        self.buffer.extend_from_slice(data);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_octet_string(s.as_bytes());
    }

    pub fn write_enumerated(&mut self, value: u8) {
        self.write_tag(TAG_ENUMERATED);
        self.write_length(1);
        self.buffer.push(value);
    }

    /// Starts a universal SEQUENCE. Pass the returned position to `end_sequence`.
    pub fn start_sequence(&mut self) -> usize {
        self.start_sequence_tagged(TAG_SEQUENCE)
    }

    /// Starts a constructed element with an arbitrary tag (e.g. `[2]` or `[0]` controls).
    pub fn start_sequence_tagged(&mut self, tag: u8) -> usize {
        self.write_tag(tag);
        self.buffer.len()
    }

    /// Inserts the definite length for everything written since `start_pos`.
    pub fn end_sequence(&mut self, start_pos: usize) {
        let content_len = self.buffer.len() - start_pos;
        let encoded = encode_length(content_len);
        self.buffer.splice(start_pos..start_pos, encoded);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }
}

fn encode_length(length: usize) -> Vec<u8> {
    if length < 128 {
        // Short form
        vec![length as u8]
    } else {
        // Long form
        let mut bytes = Vec::new();
        let mut len = length;
        while len > 0 {
            bytes.push((len & 0xFF) as u8);
            len >>= 8;
        }
        bytes.reverse();
        let mut out = Vec::with_capacity(bytes.len() + 1);
        out.push(0x80 | bytes.len() as u8);
        out.extend_from_slice(&bytes);
        out
    }
}
