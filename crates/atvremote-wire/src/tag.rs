//! Tagged-field encoding: `(field_number << 3) | wire_type` followed by the
//! value.
//!
//! Only the two wire types this protocol uses are materialised (varint and
//! length-delimited); fixed-width fields from future televisions are skipped
//! by size, and anything else is a decode error.

use crate::varint::{put_varint, read_varint};
use atvremote_core::error::WireError;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LENGTH_DELIMITED: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// A decoded field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
}

impl<'a> FieldValue<'a> {
    /// Varint value clamped into u32, erroring on overflow.
    pub fn as_u32(&self, field: u32) -> Result<u32, WireError> {
        match self {
            FieldValue::Varint(v) => {
                u32::try_from(*v).map_err(|_| WireError::InvalidField {
                    field,
                    reason: format!("value {v} exceeds u32"),
                })
            }
            FieldValue::Bytes(_) => Err(WireError::InvalidField {
                field,
                reason: "expected varint, got bytes".to_string(),
            }),
        }
    }

    /// Length-delimited payload.
    pub fn as_bytes(&self, field: u32) -> Result<&'a [u8], WireError> {
        match self {
            FieldValue::Bytes(b) => Ok(b),
            FieldValue::Varint(_) => Err(WireError::InvalidField {
                field,
                reason: "expected bytes, got varint".to_string(),
            }),
        }
    }

    /// Length-delimited payload as UTF-8, lossy on invalid sequences.
    pub fn as_string(&self, field: u32) -> Result<String, WireError> {
        Ok(String::from_utf8_lossy(self.as_bytes(field)?).into_owned())
    }
}

/// Streaming decoder over a message's fields.
///
/// Yields `(field_number, value)` in wire order; fields with fixed-width
/// wire types are skipped silently so unknown television messages never
/// abort a decode.
pub struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take_varint(&mut self) -> Result<u64, WireError> {
        let (value, used) = read_varint(&self.data[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    fn take_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let remaining = self.data.len() - self.pos;
        if len > remaining {
            return Err(WireError::TruncatedField {
                wanted: len,
                remaining,
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

impl<'a> Iterator for FieldReader<'a> {
    type Item = Result<(u32, FieldValue<'a>), WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pos >= self.data.len() {
                return None;
            }

            let tag = match self.take_varint() {
                Ok(tag) => tag,
                Err(e) => return Some(Err(e)),
            };
            let field = (tag >> 3) as u32;
            let wire_type = (tag & 0x07) as u8;

            match wire_type {
                WIRE_VARINT => {
                    return Some(self.take_varint().map(|v| (field, FieldValue::Varint(v))))
                }
                WIRE_LENGTH_DELIMITED => {
                    let len = match self.take_varint() {
                        Ok(len) => len as usize,
                        Err(e) => return Some(Err(e)),
                    };
                    return Some(self.take_bytes(len).map(|b| (field, FieldValue::Bytes(b))));
                }
                WIRE_FIXED64 => {
                    if let Err(e) = self.take_bytes(8) {
                        return Some(Err(e));
                    }
                }
                WIRE_FIXED32 => {
                    if let Err(e) = self.take_bytes(4) {
                        return Some(Err(e));
                    }
                }
                other => return Some(Err(WireError::UnsupportedWireType(other))),
            }
        }
    }
}

/// Builder for an encoded message body.
#[derive(Debug, Default)]
pub struct MessageWriter {
    buf: Vec<u8>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn tag(&mut self, field: u32, wire_type: u8) {
        put_varint(&mut self.buf, (u64::from(field) << 3) | u64::from(wire_type));
    }

    /// Write a varint field.
    pub fn varint(&mut self, field: u32, value: u64) -> &mut Self {
        self.tag(field, WIRE_VARINT);
        put_varint(&mut self.buf, value);
        self
    }

    /// Write a length-delimited bytes field.
    pub fn bytes(&mut self, field: u32, value: &[u8]) -> &mut Self {
        self.tag(field, WIRE_LENGTH_DELIMITED);
        put_varint(&mut self.buf, value.len() as u64);
        self.buf.extend_from_slice(value);
        self
    }

    /// Write a UTF-8 string field.
    pub fn string(&mut self, field: u32, value: &str) -> &mut Self {
        self.bytes(field, value.as_bytes())
    }

    /// Write a nested message field.
    pub fn message(&mut self, field: u32, inner: MessageWriter) -> &mut Self {
        self.bytes(field, &inner.buf)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
