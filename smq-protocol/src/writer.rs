//! Message encoder.
//!
//! A message is a topic header, any number of key/value fields, then the
//! end marker:
//!
//! ```text
//! header  = 0x00 crc(len) len crc(name) name   (named topic)
//!         | 0x01 id                              (topic id)
//! field   = key value
//! key     = 0x00 crc(len) len crc(name) name
//!         | 0x01 hash
//! value   = tag [crc(payload) payload]
//! ```
//!
//! All integers, checksums and floats are little-endian.

use crate::crc;
use crate::id::{FieldKey, KeyStyle, Topic};
use crate::io::{EncodeError, Sink};
use crate::value::{ValueType, END_OF_MESSAGE, TAG_HASH, TAG_NAME};

/// Writes one message into a [`Sink`]
///
/// The first write error is kept and every later write is skipped, so a
/// failed message is never half-completed with fields after the gap.
pub struct FrameWriter<S> {
    sink: S,
    style: KeyStyle,
    error: Option<EncodeError>,
}

impl<S: Sink> FrameWriter<S> {
    pub fn new(sink: S, style: KeyStyle) -> Self {
        Self {
            sink,
            style,
            error: None,
        }
    }

    pub fn style(&self) -> KeyStyle {
        self.style
    }

    /// First error hit so far, if any
    pub fn error(&self) -> Option<EncodeError> {
        self.error
    }

    fn emit(&mut self, data: &[u8]) {
        if self.error.is_none() {
            if let Err(e) = self.sink.write(data) {
                self.error = Some(e);
            }
        }
    }

    fn emit_u16(&mut self, value: u16) {
        self.emit(&value.to_le_bytes());
    }

    fn emit_name(&mut self, bytes: &[u8]) {
        let Ok(len) = u16::try_from(bytes.len()) else {
            self.error.get_or_insert(EncodeError::Overflow);
            return;
        };
        let len = len.to_le_bytes();
        self.emit(&[TAG_NAME]);
        self.emit_u16(crc::checksum(&len));
        self.emit(&len);
        self.emit_u16(crc::checksum(bytes));
        self.emit(bytes);
    }

    fn emit_hash(&mut self, id: u16) {
        self.emit(&[TAG_HASH]);
        self.emit_u16(id);
    }

    fn emit_key(&mut self, key: FieldKey<'_>) {
        match (key, self.style) {
            (FieldKey::Name(name), KeyStyle::Inline) => self.emit_name(name.as_bytes()),
            (FieldKey::Name(name), KeyStyle::Hashed) => self.emit_hash(crc::name_hash(name)),
            (FieldKey::Id(id), _) => self.emit_hash(id),
        }
    }

    fn emit_numeric(&mut self, ty: ValueType, payload: &[u8]) {
        self.emit(&[ty.to_byte()]);
        self.emit_u16(crc::checksum(payload));
        self.emit(payload);
    }

    /// Write the topic header
    pub fn topic(&mut self, topic: Topic<'_>) -> &mut Self {
        match topic {
            Topic::Name(name) => self.emit_name(name.as_bytes()),
            Topic::Id(id) => self.emit_hash(id.raw()),
        }
        self
    }

    pub fn put_i8<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: i8) -> &mut Self {
        self.emit_key(key.into());
        self.emit_numeric(ValueType::I8, &value.to_le_bytes());
        self
    }

    pub fn put_i16<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: i16) -> &mut Self {
        self.emit_key(key.into());
        self.emit_numeric(ValueType::I16, &value.to_le_bytes());
        self
    }

    pub fn put_i32<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: i32) -> &mut Self {
        self.emit_key(key.into());
        self.emit_numeric(ValueType::I32, &value.to_le_bytes());
        self
    }

    pub fn put_u8<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: u8) -> &mut Self {
        self.emit_key(key.into());
        self.emit_numeric(ValueType::U8, &value.to_le_bytes());
        self
    }

    pub fn put_u16<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: u16) -> &mut Self {
        self.emit_key(key.into());
        self.emit_numeric(ValueType::U16, &value.to_le_bytes());
        self
    }

    pub fn put_u32<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: u32) -> &mut Self {
        self.emit_key(key.into());
        self.emit_numeric(ValueType::U32, &value.to_le_bytes());
        self
    }

    pub fn put_f32<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: f32) -> &mut Self {
        self.emit_key(key.into());
        self.emit_numeric(ValueType::F32, &value.to_le_bytes());
        self
    }

    pub fn put_f64<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: f64) -> &mut Self {
        self.emit_key(key.into());
        self.emit_numeric(ValueType::F64, &value.to_le_bytes());
        self
    }

    /// 32-bit signed integer field
    pub fn put_int<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: i32) -> &mut Self {
        self.put_i32(key, value)
    }

    /// 32-bit float field
    pub fn put_float<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: f32) -> &mut Self {
        self.put_f32(key, value)
    }

    pub fn put_bool<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: bool) -> &mut Self {
        self.emit_key(key.into());
        let ty = if value {
            ValueType::True
        } else {
            ValueType::False
        };
        self.emit(&[ty.to_byte()]);
        self
    }

    pub fn put_null<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> &mut Self {
        self.emit_key(key.into());
        self.emit(&[ValueType::Null.to_byte()]);
        self
    }

    pub fn put_string<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: &str) -> &mut Self {
        self.emit_key(key.into());
        self.emit_name(value.as_bytes());
        self
    }

    /// String value sent as its 16-bit name hash
    pub fn put_hash<'k>(&mut self, key: impl Into<FieldKey<'k>>, value: &str) -> &mut Self {
        self.emit_key(key.into());
        self.emit_hash(crc::name_hash(value));
        self
    }

    /// Raw bytes with no tag or checksum, for fixed-layout bodies
    pub fn put_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.emit(bytes);
        self
    }

    /// Write the end marker and hand back the sink
    pub fn finish(mut self) -> Result<S, EncodeError> {
        self.emit(&[END_OF_MESSAGE]);
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.sink),
        }
    }
}
