//! Little-endian binary codec used by the ELA wire format.
//!
//! Encoding appends to a `Vec<u8>` and cannot fail. Decoding goes through a
//! bounds-checked [`Reader`] and reports every malformed input as a
//! [`SerializationError`]; no decode path panics on hostile bytes.
//!
//! Variable-length integers use the compact form:
//!
//! ```text
//! n < 0xFD          -> n                (1 byte)
//! n <= 0xFFFF       -> 0xFD ++ u16 LE   (3 bytes)
//! n <= 0xFFFF_FFFF  -> 0xFE ++ u32 LE   (5 bytes)
//! otherwise         -> 0xFF ++ u64 LE   (9 bytes)
//! ```

use crate::error::SerializationError;

/// Types with a canonical wire encoding.
pub trait Encodable {
    fn encode(&self, buf: &mut Vec<u8>);

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

/// Types that can be read back from their wire encoding.
pub trait Decodable: Sized {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, SerializationError>;
}

pub fn write_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_var_uint(buf: &mut Vec<u8>, v: u64) {
    if v < 0xFD {
        buf.push(v as u8);
    } else if v <= u16::MAX as u64 {
        buf.push(0xFD);
        write_u16(buf, v as u16);
    } else if v <= u32::MAX as u64 {
        buf.push(0xFE);
        write_u32(buf, v as u32);
    } else {
        buf.push(0xFF);
        write_u64(buf, v);
    }
}

pub fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_var_uint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

pub fn write_var_string(buf: &mut Vec<u8>, s: &str) {
    write_var_bytes(buf, s.as_bytes());
}

/// Write a var-uint count followed by each element.
pub fn write_list<T: Encodable>(buf: &mut Vec<u8>, items: &[T]) {
    write_var_uint(buf, items.len() as u64);
    for item in items {
        item.encode(buf);
    }
}

/// Bounds-checked cursor over an input buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Fail with [`SerializationError::TrailingBytes`] unless fully consumed.
    pub fn finish(&self) -> Result<(), SerializationError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(SerializationError::TrailingBytes(n)),
        }
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], SerializationError> {
        if n > self.remaining() {
            return Err(SerializationError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SerializationError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, SerializationError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, SerializationError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, SerializationError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, SerializationError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a compact integer, rejecting encodings that are not minimal.
    pub fn read_var_uint(&mut self) -> Result<u64, SerializationError> {
        let (value, min) = match self.read_u8()? {
            0xFD => (self.read_u16()? as u64, 0xFD),
            0xFE => (self.read_u32()? as u64, 0x1_0000),
            0xFF => (self.read_u64()?, 0x1_0000_0000),
            b => return Ok(b as u64),
        };
        if value < min {
            return Err(SerializationError::NonCanonicalVarInt);
        }
        Ok(value)
    }

    /// Read a length prefix that must fit in the unread input.
    ///
    /// `min_item_len` is the smallest encoding of one element, so a count
    /// prefix cannot claim more elements than the buffer could hold.
    pub fn read_length(&mut self, min_item_len: usize) -> Result<usize, SerializationError> {
        let len = self.read_var_uint()?;
        let remaining = self.remaining();
        let fits = usize::try_from(len)
            .ok()
            .and_then(|n| n.checked_mul(min_item_len.max(1)))
            .is_some_and(|bytes| bytes <= remaining);
        if !fits {
            return Err(SerializationError::LengthOverflow { len, remaining });
        }
        Ok(len as usize)
    }

    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, SerializationError> {
        let len = self.read_length(1)?;
        Ok(self.read_bytes(len)?.to_vec())
    }

    pub fn read_var_string(&mut self) -> Result<String, SerializationError> {
        let bytes = self.read_var_bytes()?;
        String::from_utf8(bytes).map_err(|_| SerializationError::InvalidUtf8)
    }

    /// Read a var-uint count followed by that many elements.
    pub fn read_list<T: Decodable>(&mut self, min_item_len: usize) -> Result<Vec<T>, SerializationError> {
        let count = self.read_length(min_item_len)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }
}
