//! # Consensus Codec
//!
//! Byte-exact encoding used for transaction ids, block hashes, size limits
//! and the block files. Integers are little-endian; lengths and counts use
//! the compact-size prefix:
//!
//! ```text
//! < 0xfd          1 byte
//! 0xfd + u16      3 bytes
//! 0xfe + u32      5 bytes
//! 0xff + u64      9 bytes
//! ```
//!
//! Encoding cannot fail. Decoding rejects truncated input, non-canonical
//! compact sizes and trailing bytes.

use thiserror::Error;

/// Upper bound for any decoded length prefix.
pub const MAX_DECODE_SIZE: u64 = 32 * 1024 * 1024;

/// Errors produced while decoding consensus bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unexpected end of input: needed {needed} bytes at offset {offset}")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("length prefix {0} exceeds limit")]
    OversizedLength(u64),

    #[error("non-canonical compact size")]
    NonCanonicalCompactSize,
}

/// A value with a consensus encoding.
pub trait Encodable {
    /// Append the encoding of `self` to `out`.
    fn encode_to(&self, out: &mut Vec<u8>);

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_to(&mut out);
        out
    }

    fn encoded_len(&self) -> usize {
        self.encode().len()
    }
}

/// A value that can be read back from its consensus encoding.
pub trait Decodable: Sized {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError>;

    /// Decode a complete buffer; trailing bytes are an error.
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(bytes);
        let value = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

/// Cursor over a byte slice.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof {
                offset: self.pos,
                needed: n,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_hash(&mut self) -> Result<[u8; 32], CodecError> {
        self.read_array()
    }

    pub fn read_compact_size(&mut self) -> Result<u64, CodecError> {
        let value = match self.read_u8()? {
            0xfd => {
                let v = u64::from(self.read_u16()?);
                if v < 0xfd {
                    return Err(CodecError::NonCanonicalCompactSize);
                }
                v
            }
            0xfe => {
                let v = u64::from(self.read_u32()?);
                if v <= 0xffff {
                    return Err(CodecError::NonCanonicalCompactSize);
                }
                v
            }
            0xff => {
                let v = self.read_u64()?;
                if v <= 0xffff_ffff {
                    return Err(CodecError::NonCanonicalCompactSize);
                }
                v
            }
            small => u64::from(small),
        };
        if value > MAX_DECODE_SIZE {
            return Err(CodecError::OversizedLength(value));
        }
        Ok(value)
    }

    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_compact_size()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    /// Read a count-prefixed vector. The count is bounded by the remaining
    /// input so a forged prefix cannot force a large allocation.
    pub fn read_vec<T: Decodable>(&mut self) -> Result<Vec<T>, CodecError> {
        let count = self.read_compact_size()? as usize;
        if count > self.remaining() {
            return Err(CodecError::OversizedLength(count as u64));
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::decode_from(self)?);
        }
        Ok(items)
    }

    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

pub fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    if n < 0xfd {
        out.push(n as u8);
    } else if n <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&n.to_le_bytes());
    }
}

pub fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

pub fn write_vec<T: Encodable>(out: &mut Vec<u8>, items: &[T]) {
    write_compact_size(out, items.len() as u64);
    for item in items {
        item.encode_to(out);
    }
}

macro_rules! impl_int_codec {
    ($($ty:ty => $read:ident),*) => {
        $(
            impl Encodable for $ty {
                fn encode_to(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }

            impl Decodable for $ty {
                fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
                    reader.$read()
                }
            }
        )*
    };
}

impl_int_codec!(u8 => read_u8, u16 => read_u16, u32 => read_u32, i32 => read_i32, u64 => read_u64, i64 => read_i64);

impl Encodable for [u8; 32] {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl Decodable for [u8; 32] {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        reader.read_hash()
    }
}
