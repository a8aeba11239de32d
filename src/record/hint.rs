//! Hint record definitions

use std::io::Read;

use bytes::{Buf, BufMut, BytesMut};

use super::{declared_len, read_header, read_payload, size_field, utf8, HINT_HEADER_SIZE};
use crate::error::{CaskError, Result};

/// Location of a key's value inside a data segment, without the value bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintRecord {
    pub timestamp: i32,

    pub key: String,

    pub value_size: u32,

    /// Byte offset of the value within its data segment
    pub value_offset: u32,
}

impl HintRecord {
    pub fn new(key: impl Into<String>, value_size: u32, value_offset: u32, timestamp: i32) -> Self {
        Self {
            timestamp,
            key: key.into(),
            value_size,
            value_offset,
        }
    }

    pub fn encoded_len(&self) -> u64 {
        (HINT_HEADER_SIZE + self.key.len()) as u64
    }

    pub fn encode(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.encoded_len() as usize);
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        let key_size = size_field(self.key.len(), "key")?;
        let value_size = size_field(self.value_size as usize, "value")?;
        let value_offset = i32::try_from(self.value_offset).map_err(|_| {
            CaskError::InvalidRecord(format!(
                "value offset {} exceeds the 4-byte offset field",
                self.value_offset
            ))
        })?;

        buf.reserve(self.encoded_len() as usize);
        buf.put_i32(self.timestamp);
        buf.put_i32(key_size);
        buf.put_i32(value_size);
        buf.put_i32(value_offset);
        buf.put_slice(self.key.as_bytes());
        Ok(())
    }

    /// Decode one hint from the front of `buf`; `Ok(None)` if `buf` is empty
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Option<Self>> {
        if !buf.has_remaining() {
            return Ok(None);
        }
        if buf.remaining() < HINT_HEADER_SIZE {
            return Err(CaskError::CorruptRecord(format!(
                "truncated hint header: {} of {} bytes",
                buf.remaining(),
                HINT_HEADER_SIZE
            )));
        }

        let (timestamp, key_len, value_size, value_offset) = Self::parse_header(buf)?;
        if buf.remaining() < key_len {
            return Err(CaskError::CorruptRecord(format!(
                "truncated hint key: expected {} bytes, {} remain",
                key_len,
                buf.remaining()
            )));
        }

        let mut key = vec![0u8; key_len];
        buf.copy_to_slice(&mut key);

        Ok(Some(Self {
            timestamp,
            key: utf8(key, "key")?,
            value_size,
            value_offset,
        }))
    }

    /// Read the next hint from a stream; `Ok(None)` at a clean end of stream
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let mut header = [0u8; HINT_HEADER_SIZE];
        if !read_header(reader, &mut header)? {
            return Ok(None);
        }

        let (timestamp, key_len, value_size, value_offset) = Self::parse_header(&mut &header[..])?;
        let key = read_payload(reader, key_len)?;

        Ok(Some(Self {
            timestamp,
            key: utf8(key, "key")?,
            value_size,
            value_offset,
        }))
    }

    fn parse_header<B: Buf>(buf: &mut B) -> Result<(i32, usize, u32, u32)> {
        let timestamp = buf.get_i32();
        let key_len = declared_len(buf.get_i32(), "key size")?;
        let value_size = declared_len(buf.get_i32(), "value size")? as u32;
        let value_offset = declared_len(buf.get_i32(), "value offset")? as u32;
        Ok((timestamp, key_len, value_size, value_offset))
    }
}
