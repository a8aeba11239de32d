//! Data record definitions
//!
//! The only record shape found in data segments. Deletes are ordinary data
//! records whose value is [`TOMBSTONE`].

use std::io::Read;

use bytes::{Buf, BufMut, BytesMut};

use super::{declared_len, read_header, read_payload, size_field, utf8, DATA_HEADER_SIZE, TOMBSTONE};
use crate::error::{CaskError, Result};

/// A single record in a data segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    /// Unix seconds when the record was written
    pub timestamp: i32,

    pub key: String,

    pub value: String,
}

impl DataRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>, timestamp: i32) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            timestamp,
        }
    }

    /// A delete marker for `key`
    pub fn tombstone(key: impl Into<String>, timestamp: i32) -> Self {
        Self::new(key, TOMBSTONE, timestamp)
    }

    pub fn is_tombstone(&self) -> bool {
        self.value == TOMBSTONE
    }

    /// Total encoded size in bytes
    pub fn encoded_len(&self) -> u64 {
        (DATA_HEADER_SIZE + self.key.len() + self.value.len()) as u64
    }

    /// Distance from the start of the record to its value bytes
    pub fn value_offset_in_record(&self) -> u64 {
        (DATA_HEADER_SIZE + self.key.len()) as u64
    }

    /// Encode into a fresh buffer
    pub fn encode(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.encoded_len() as usize);
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Append the encoded record to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        let key_size = size_field(self.key.len(), "key")?;
        let value_size = size_field(self.value.len(), "value")?;

        buf.reserve(self.encoded_len() as usize);
        buf.put_i32(self.timestamp);
        buf.put_i32(key_size);
        buf.put_i32(value_size);
        buf.put_slice(self.key.as_bytes());
        buf.put_slice(self.value.as_bytes());
        Ok(())
    }

    /// Decode one record from the front of `buf`
    ///
    /// Returns `Ok(None)` if `buf` is empty.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Option<Self>> {
        if !buf.has_remaining() {
            return Ok(None);
        }
        if buf.remaining() < DATA_HEADER_SIZE {
            return Err(CaskError::CorruptRecord(format!(
                "truncated header: {} of {} bytes",
                buf.remaining(),
                DATA_HEADER_SIZE
            )));
        }

        let timestamp = buf.get_i32();
        let key_len = declared_len(buf.get_i32(), "key size")?;
        let value_len = declared_len(buf.get_i32(), "value size")?;

        if buf.remaining() < key_len + value_len {
            return Err(CaskError::CorruptRecord(format!(
                "truncated payload: expected {} bytes, {} remain",
                key_len + value_len,
                buf.remaining()
            )));
        }

        let mut key = vec![0u8; key_len];
        buf.copy_to_slice(&mut key);
        let mut value = vec![0u8; value_len];
        buf.copy_to_slice(&mut value);

        Ok(Some(Self {
            timestamp,
            key: utf8(key, "key")?,
            value: utf8(value, "value")?,
        }))
    }

    /// Read the next record from a stream
    ///
    /// Returns `Ok(None)` at a clean end of stream.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let mut header = [0u8; DATA_HEADER_SIZE];
        if !read_header(reader, &mut header)? {
            return Ok(None);
        }

        let mut cursor = &header[..];
        let timestamp = cursor.get_i32();
        let key_len = declared_len(cursor.get_i32(), "key size")?;
        let value_len = declared_len(cursor.get_i32(), "value size")?;

        let key = read_payload(reader, key_len)?;
        let value = read_payload(reader, value_len)?;

        Ok(Some(Self {
            timestamp,
            key: utf8(key, "key")?,
            value: utf8(value, "value")?,
        }))
    }
}
