//! Message decoder.
//!
//! Lookup is forward-only: [`Cursor::find_key`] walks fields from the
//! current position, skipping values it does not want, and never rewinds.
//! Handlers should read fields in the order the publisher writes them.
//!
//! Decoding never fails outright. A field whose checksum does not match
//! reads as zero/empty and [`Cursor::field_type`] reports `None`; decoding
//! carries on with the next field. Only a lost field boundary (bad length
//! checksum, unknown tag, input running out) ends the message early.

use heapless::{String, Vec};

use crate::crc;
use crate::fmt::warn;
use crate::id::{FieldKey, TopicId};
use crate::io::ByteSource;
use crate::value::{ValueType, END_OF_MESSAGE, TAG_HASH, TAG_NAME};

/// Longest length-prefixed name or string accepted on decode
pub const MAX_FIELD_LEN: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scalar {
    Int(i64),
    Float(f64),
}

/// Decode position within one inbound message
pub struct Cursor<'a> {
    source: &'a mut dyn ByteSource,
    eom: bool,
    truncated: bool,
    field: Option<ValueType>,
    /// `find_key` stopped in front of a value nobody has read yet
    pending_value: bool,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a mut dyn ByteSource) -> Self {
        Self {
            source,
            eom: false,
            truncated: false,
            field: None,
            pending_value: false,
        }
    }

    /// True once the end marker has been reached (or the message was cut short)
    pub fn is_end(&self) -> bool {
        self.eom
    }

    /// True if the message ended without a proper end marker
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Type of the value last read, `None` if it was missing or corrupt
    pub fn field_type(&self) -> Option<ValueType> {
        self.field
    }

    fn abort(&mut self) {
        self.eom = true;
        self.truncated = true;
        self.field = None;
    }

    fn byte(&mut self) -> Option<u8> {
        if self.truncated {
            return None;
        }
        let byte = self.source.next_byte();
        if byte.is_none() {
            self.abort();
        }
        byte
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let mut out = [0u8; N];
        for b in out.iter_mut() {
            *b = self.byte()?;
        }
        Some(out)
    }

    fn read_u16(&mut self) -> Option<u16> {
        self.read_array::<2>().map(u16::from_le_bytes)
    }

    fn read_length(&mut self) -> Option<usize> {
        let expected = self.read_u16()?;
        let raw = self.read_array::<2>()?;
        if crc::checksum(&raw) != expected {
            warn!("length checksum mismatch, dropping rest of message");
            self.abort();
            return None;
        }
        let len = u16::from_le_bytes(raw) as usize;
        if len > MAX_FIELD_LEN {
            warn!("field length {} over limit", len);
            self.abort();
            return None;
        }
        Some(len)
    }

    /// Stream a length-prefixed byte string through `each`.
    /// Returns whether its checksum matched.
    fn read_name_with(&mut self, mut each: impl FnMut(usize, u8)) -> Option<bool> {
        let len = self.read_length()?;
        let expected = self.read_u16()?;
        let mut sum = 0u16;
        for i in 0..len {
            let b = self.byte()?;
            sum = crc::update(sum, b);
            each(i, b);
        }
        Some(sum == expected)
    }

    /// Read the topic header at the start of a message
    ///
    /// Returns `None` for a corrupt header or an empty message. The caller
    /// should still call [`Cursor::end`] to get past the rest of it.
    pub fn read_topic(&mut self) -> Option<TopicId> {
        match self.byte()? {
            TAG_NAME => {
                let mut hash = 0xFFFF;
                let ok = self.read_name_with(|_, b| hash = crc::update(hash, b))?;
                if !ok {
                    warn!("topic name checksum mismatch");
                    return None;
                }
                Some(TopicId::from_raw(!hash))
            }
            TAG_HASH => self.read_u16().map(TopicId::from_raw),
            END_OF_MESSAGE => {
                self.eom = true;
                None
            }
            tag => {
                warn!("bad topic tag {}", tag);
                self.abort();
                None
            }
        }
    }

    /// Decode the next key and compare it with `wanted`.
    /// `None` means no more fields.
    fn next_key(&mut self, wanted: Option<FieldKey<'_>>) -> Option<bool> {
        match self.byte()? {
            TAG_NAME => {
                let want_bytes = match wanted {
                    Some(FieldKey::Name(name)) => Some(name.as_bytes()),
                    _ => None,
                };
                let mut hash = 0xFFFF;
                let mut same = true;
                let mut len = 0;
                let ok = self.read_name_with(|i, b| {
                    hash = crc::update(hash, b);
                    if let Some(want) = want_bytes {
                        same &= want.get(i) == Some(&b);
                    }
                    len = i + 1;
                })?;
                if !ok {
                    warn!("key checksum mismatch");
                    return Some(false);
                }
                Some(match wanted {
                    Some(FieldKey::Name(name)) => same && len == name.len(),
                    Some(FieldKey::Id(id)) => !hash == id,
                    None => false,
                })
            }
            TAG_HASH => {
                let id = self.read_u16()?;
                Some(wanted.is_some_and(|key| key.hash() == id))
            }
            END_OF_MESSAGE => {
                self.eom = true;
                None
            }
            tag => {
                warn!("bad key tag {}", tag);
                self.abort();
                None
            }
        }
    }

    fn read_type(&mut self) -> Option<ValueType> {
        self.pending_value = false;
        let tag = self.byte()?;
        let ty = ValueType::from_byte(tag);
        if ty.is_none() {
            warn!("bad value tag {}", tag);
            self.abort();
        }
        self.field = ty;
        ty
    }

    fn skip_payload(&mut self, ty: ValueType) {
        match ty {
            ValueType::String => {
                let _ = self.read_name_with(|_, _| {});
            }
            ValueType::Hash => {
                let _ = self.read_u16();
            }
            ValueType::True | ValueType::False | ValueType::Null | ValueType::Buffer => {}
            numeric => {
                let width = numeric.numeric_width().unwrap_or(0) + 2;
                for _ in 0..width {
                    if self.byte().is_none() {
                        break;
                    }
                }
            }
        }
    }

    fn skip_value(&mut self) {
        if let Some(ty) = self.read_type() {
            self.skip_payload(ty);
        }
    }

    /// Step over a value left unread after a successful `find_key`
    fn skip_pending(&mut self) {
        if self.pending_value && !self.eom {
            self.skip_value();
        }
        self.pending_value = false;
    }

    /// Advance to just past the key `key`
    ///
    /// Fields in between are skipped. The value is left for the next
    /// getter; if none reads it, the next lookup or [`Cursor::end`] steps
    /// over it. Returns `false` once the end marker is hit; after that
    /// every lookup fails.
    pub fn find_key<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> bool {
        let key = key.into();
        self.skip_pending();
        while !self.eom {
            match self.next_key(Some(key)) {
                Some(true) => {
                    self.pending_value = true;
                    return true;
                }
                Some(false) => self.skip_value(),
                None => break,
            }
        }
        self.field = None;
        false
    }

    /// Skip everything up to and including the end marker
    pub fn end(&mut self) {
        self.skip_pending();
        while !self.eom {
            if self.next_key(None).is_none() {
                break;
            }
            self.skip_value();
        }
    }

    fn read_scalar(&mut self) -> Option<Scalar> {
        let ty = self.read_type()?;
        match ty {
            ValueType::String => {
                self.skip_payload(ty);
                Some(Scalar::Int(0))
            }
            ValueType::Hash => self.read_u16().map(|v| Scalar::Int(v as i64)),
            ValueType::True => Some(Scalar::Int(1)),
            ValueType::False | ValueType::Null | ValueType::Buffer => Some(Scalar::Int(0)),
            numeric => {
                let width = numeric.numeric_width().unwrap_or(0);
                let expected = self.read_u16()?;
                let mut buf = [0u8; 8];
                for b in buf[..width].iter_mut() {
                    *b = self.byte()?;
                }
                if crc::checksum(&buf[..width]) != expected {
                    warn!("value checksum mismatch");
                    self.field = None;
                    return None;
                }
                Some(decode_numeric(numeric, &buf))
            }
        }
    }

    /// Value of `key` coerced to an integer
    ///
    /// Floats truncate toward zero, `true` is 1, hashed strings give their
    /// hash. Missing keys, strings and corrupt values give 0.
    pub fn get_integer<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> i64 {
        if !self.find_key(key) {
            return 0;
        }
        match self.read_scalar() {
            Some(Scalar::Int(v)) => v,
            Some(Scalar::Float(f)) => f as i64,
            None => 0,
        }
    }

    /// Value of `key` coerced to a double, 0.0 if missing or corrupt
    pub fn get_double<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> f64 {
        if !self.find_key(key) {
            return 0.0;
        }
        match self.read_scalar() {
            Some(Scalar::Int(v)) => v as f64,
            Some(Scalar::Float(f)) => f,
            None => 0.0,
        }
    }

    /// True if `key` holds a non-zero integer value
    pub fn get_boolean<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> bool {
        self.get_integer(key) != 0
    }

    pub fn get_i8<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> i8 {
        self.get_integer(key) as i8
    }

    pub fn get_i16<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> i16 {
        self.get_integer(key) as i16
    }

    pub fn get_i32<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> i32 {
        self.get_integer(key) as i32
    }

    pub fn get_u8<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> u8 {
        self.get_integer(key) as u8
    }

    pub fn get_u16<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> u16 {
        self.get_integer(key) as u16
    }

    pub fn get_u32<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> u32 {
        self.get_integer(key) as u32
    }

    pub fn get_f32<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> f32 {
        self.get_double(key) as f32
    }

    /// String value of `key`, at most `N` bytes
    ///
    /// Longer strings are cut at the last whole character that fits. Any
    /// non-string value is skipped and reads as empty.
    pub fn get_string<'k, const N: usize>(&mut self, key: impl Into<FieldKey<'k>>) -> String<N> {
        let mut out = String::new();
        if !self.find_key(key) {
            return out;
        }
        let Some(ty) = self.read_type() else {
            return out;
        };
        if ty != ValueType::String {
            self.skip_payload(ty);
            return out;
        }

        let mut bytes = Vec::<u8, N>::new();
        match self.read_name_with(|_, b| {
            let _ = bytes.push(b);
        }) {
            Some(true) => {}
            Some(false) => {
                warn!("string checksum mismatch");
                self.field = None;
                return out;
            }
            None => return out,
        }

        let text = match core::str::from_utf8(&bytes) {
            Ok(text) => text,
            Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
        };
        // Fits: text is a prefix of at most N bytes
        let _ = out.push_str(text);
        out
    }
}

fn decode_numeric(ty: ValueType, b: &[u8; 8]) -> Scalar {
    match ty {
        ValueType::I8 => Scalar::Int(b[0] as i8 as i64),
        ValueType::I16 => Scalar::Int(i16::from_le_bytes([b[0], b[1]]) as i64),
        ValueType::I32 => Scalar::Int(i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64),
        ValueType::U8 => Scalar::Int(b[0] as i64),
        ValueType::U16 => Scalar::Int(u16::from_le_bytes([b[0], b[1]]) as i64),
        ValueType::U32 => Scalar::Int(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64),
        ValueType::F32 => Scalar::Float(f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64),
        ValueType::F64 => Scalar::Float(f64::from_le_bytes(*b)),
        _ => Scalar::Int(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{KeyStyle, Topic};
    use crate::io::{SendBuffer, SliceSource};
    use crate::writer::FrameWriter;
    use proptest::prelude::*;

    type Buf = SendBuffer<250>;

    fn encode(style: KeyStyle, build: impl FnOnce(&mut FrameWriter<&mut Buf>)) -> Buf {
        let mut buf = Buf::new();
        let mut w = FrameWriter::new(&mut buf, style);
        build(&mut w);
        w.finish().unwrap();
        buf
    }

    #[test]
    fn test_roundtrip_every_type() {
        let buf = encode(KeyStyle::Inline, |w| {
            w.put_i8("i8", -5)
                .put_i16("i16", -1234)
                .put_i32("i32", -123_456)
                .put_u8("u8", 200)
                .put_u16("u16", 60_000)
                .put_u32("u32", 4_000_000_000)
                .put_f32("f32", 1.5)
                .put_f64("f64", -2.25)
                .put_bool("yes", true)
                .put_bool("no", false)
                .put_null("nothing")
                .put_string("text", "ok");
        });
        let mut src = SliceSource::new(buf.as_slice());
        let mut msg = Cursor::new(&mut src);

        assert_eq!(msg.get_i8("i8"), -5);
        assert_eq!(msg.field_type(), Some(ValueType::I8));
        assert_eq!(msg.get_i16("i16"), -1234);
        assert_eq!(msg.get_i32("i32"), -123_456);
        assert_eq!(msg.get_u8("u8"), 200);
        assert_eq!(msg.get_u16("u16"), 60_000);
        assert_eq!(msg.get_u32("u32"), 4_000_000_000);
        assert_eq!(msg.get_f32("f32"), 1.5);
        assert_eq!(msg.get_double("f64"), -2.25);
        assert_eq!(msg.field_type(), Some(ValueType::F64));
        assert!(msg.get_boolean("yes"));
        assert!(!msg.get_boolean("no"));
        assert_eq!(msg.get_integer("nothing"), 0);
        assert_eq!(msg.field_type(), Some(ValueType::Null));
        assert_eq!(msg.get_string::<8>("text").as_str(), "ok");
        assert_eq!(msg.field_type(), Some(ValueType::String));

        msg.end();
        assert!(msg.is_end());
        assert!(!msg.is_truncated());
        assert!(src.remaining().is_empty());
    }

    #[test]
    fn test_end_skips_unread_fields() {
        let buf = encode(KeyStyle::Hashed, |w| {
            w.put_int("state", 42)
                .put_string("name", "ok")
                .put_f64("extra", 9.5);
        });
        let mut data = heapless::Vec::<u8, 256>::new();
        data.extend_from_slice(buf.as_slice()).unwrap();
        data.push(0x42).unwrap(); // first byte of the next message

        let mut src = SliceSource::new(&data);
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.get_integer("state"), 42);
        assert_eq!(msg.get_string::<8>("name").as_str(), "ok");
        msg.end();
        assert!(msg.is_end());
        assert_eq!(src.remaining(), &[0x42]);
    }

    #[test]
    fn test_key_lookup_by_name_or_hash() {
        let inline = encode(KeyStyle::Inline, |w| {
            w.put_int("speed", 7);
        });
        let mut src = SliceSource::new(inline.as_slice());
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.get_integer(crc::name_hash("speed")), 7);

        let hashed = encode(KeyStyle::Hashed, |w| {
            w.put_int("speed", 7);
        });
        let mut src = SliceSource::new(hashed.as_slice());
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.get_integer("speed"), 7);
    }

    #[test]
    fn test_inline_name_must_match_exactly() {
        let buf = encode(KeyStyle::Inline, |w| {
            w.put_int("speedy", 1).put_int("spee", 2).put_int("speed", 3);
        });
        let mut src = SliceSource::new(buf.as_slice());
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.get_integer("speed"), 3);
    }

    #[test]
    fn test_lookup_is_forward_only() {
        let buf = encode(KeyStyle::Hashed, |w| {
            w.put_int("a", 1).put_int("b", 2).put_int("c", 3);
        });
        let mut src = SliceSource::new(buf.as_slice());
        let mut msg = Cursor::new(&mut src);

        assert_eq!(msg.get_integer("c"), 3);
        assert!(!msg.find_key("a"));
        assert!(msg.is_end());
        assert_eq!(msg.get_integer("b"), 0);
        assert_eq!(msg.field_type(), None);
    }

    #[test]
    fn test_missing_key_defaults() {
        let buf = encode(KeyStyle::Hashed, |w| {
            w.put_int("a", 1);
        });
        let mut src = SliceSource::new(buf.as_slice());
        let mut msg = Cursor::new(&mut src);

        assert_eq!(msg.get_double("zz"), 0.0);
        assert_eq!(msg.field_type(), None);
        assert_eq!(msg.get_string::<4>("zz").as_str(), "");
        assert!(!msg.is_truncated());
    }

    #[test]
    fn test_coercion() {
        let buf = encode(KeyStyle::Hashed, |w| {
            w.put_f32("up", 3.9)
                .put_f64("down", -3.9)
                .put_bool("flag", true)
                .put_u8("small", 9)
                .put_string("word", "hello")
                .put_int("after", 5)
                .put_int("number", 12)
                .put_hash("cmd", "up")
                .put_f32("half", 0.5);
        });
        let mut src = SliceSource::new(buf.as_slice());
        let mut msg = Cursor::new(&mut src);

        assert_eq!(msg.get_integer("up"), 3);
        assert_eq!(msg.get_integer("down"), -3);
        assert_eq!(msg.get_integer("flag"), 1);
        assert_eq!(msg.get_double("small"), 9.0);
        assert_eq!(msg.get_integer("word"), 0);
        assert_eq!(msg.field_type(), Some(ValueType::String));
        assert_eq!(msg.get_integer("after"), 5);
        assert_eq!(msg.get_string::<8>("number").as_str(), "");
        assert_eq!(msg.field_type(), Some(ValueType::I32));
        assert_eq!(msg.get_integer("cmd"), crc::name_hash("up") as i64);
        assert!(!msg.get_boolean("half"));
    }

    #[test]
    fn test_corrupt_value_falls_back_and_stays_in_sync() {
        let buf = encode(KeyStyle::Hashed, |w| {
            w.put_i32("a", 1000).put_i32("b", 2000);
        });
        // key(3) + tag(1) + crc(2), then the payload of "a"
        let mut data = heapless::Vec::<u8, 64>::new();
        data.extend_from_slice(buf.as_slice()).unwrap();
        data[7] ^= 0x10;

        let mut src = SliceSource::new(&data);
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.get_i32("a"), 0);
        assert_eq!(msg.field_type(), None);
        assert_eq!(msg.get_i32("b"), 2000);
        assert_eq!(msg.field_type(), Some(ValueType::I32));
    }

    #[test]
    fn test_corrupt_string_reads_empty() {
        let buf = encode(KeyStyle::Hashed, |w| {
            w.put_string("s", "abc").put_u8("n", 4);
        });
        let mut data = heapless::Vec::<u8, 64>::new();
        data.extend_from_slice(buf.as_slice()).unwrap();
        // key(3) + tag(1) + crc(2) + len(2) + crc(2), then "abc"
        data[10] = b'x';

        let mut src = SliceSource::new(&data);
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.get_string::<8>("s").as_str(), "");
        assert_eq!(msg.field_type(), None);
        assert_eq!(msg.get_u8("n"), 4);
    }

    #[test]
    fn test_corrupt_length_ends_message() {
        let buf = encode(KeyStyle::Hashed, |w| {
            w.put_string("s", "abc").put_u8("n", 4);
        });
        let mut data = heapless::Vec::<u8, 64>::new();
        data.extend_from_slice(buf.as_slice()).unwrap();
        // Low byte of the string length
        data[6] = 0x7F;

        let mut src = SliceSource::new(&data);
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.get_string::<8>("s").as_str(), "");
        assert!(msg.is_end());
        assert!(msg.is_truncated());
        assert_eq!(msg.get_u8("n"), 0);
    }

    #[test]
    fn test_truncated_input() {
        let buf = encode(KeyStyle::Hashed, |w| {
            w.put_u32("a", 77).put_u32("b", 88);
        });
        let cut = &buf.as_slice()[..buf.len() - 4];

        let mut src = SliceSource::new(cut);
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.get_u32("a"), 77);
        assert_eq!(msg.get_u32("b"), 0);
        assert!(msg.is_truncated());
        msg.end();
        assert!(msg.is_end());
    }

    #[test]
    fn test_string_truncated_to_capacity() {
        let buf = encode(KeyStyle::Hashed, |w| {
            w.put_string("s", "héllo").put_u8("n", 1);
        });
        let mut src = SliceSource::new(buf.as_slice());
        let mut msg = Cursor::new(&mut src);
        // "h" plus half of "é" fits, only "h" survives
        assert_eq!(msg.get_string::<2>("s").as_str(), "h");
        assert_eq!(msg.get_u8("n"), 1);
    }

    #[test]
    fn test_reserved_buffer_type_is_empty() {
        let a = crc::name_hash("a").to_le_bytes();
        let b = crc::name_hash("b").to_le_bytes();
        let seven = crc::checksum(&[7]).to_le_bytes();
        let data = [
            0x01, a[0], a[1], 0x0D, 0x01, b[0], b[1], 0x05, seven[0], seven[1], 7, 0xFF,
        ];
        let mut src = SliceSource::new(&data);
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.get_integer("a"), 0);
        assert_eq!(msg.field_type(), Some(ValueType::Buffer));
        assert_eq!(msg.get_integer("b"), 7);
    }

    #[test]
    fn test_found_value_left_unread_is_skipped() {
        let buf = encode(KeyStyle::Inline, |w| {
            w.put_u8("flag", b'D').put_int("x", 400).put_string("s", "D");
        });
        let mut data = heapless::Vec::<u8, 96>::new();
        data.extend_from_slice(buf.as_slice()).unwrap();
        data.push(b'Z').unwrap();

        let mut src = SliceSource::new(&data);
        let mut msg = Cursor::new(&mut src);
        assert!(msg.find_key("flag"));
        assert_eq!(msg.get_integer("x"), 400);
        assert!(msg.find_key("s"));
        msg.end();
        assert!(msg.is_end());
        assert!(!msg.is_truncated());
        assert_eq!(src.remaining(), b"Z");
    }

    #[test]
    fn test_found_then_end_stays_in_sync() {
        let buf = encode(KeyStyle::Hashed, |w| {
            w.put_u8("flag", b'D').put_int("x", 1);
        });
        let mut data = heapless::Vec::<u8, 64>::new();
        data.extend_from_slice(buf.as_slice()).unwrap();
        data.push(b'Z').unwrap();

        let mut src = SliceSource::new(&data);
        let mut msg = Cursor::new(&mut src);
        assert!(msg.find_key("flag"));
        msg.end();
        assert!(!msg.is_truncated());
        assert_eq!(src.remaining(), b"Z");
    }

    #[test]
    fn test_corrupt_inline_key_is_skipped() {
        let buf = encode(KeyStyle::Inline, |w| {
            w.put_u8("skip", 9).put_u8("keep", 4);
        });
        let mut data = heapless::Vec::<u8, 64>::new();
        data.extend_from_slice(buf.as_slice()).unwrap();
        // tag(1) + crc(len)(2) + len(2) + crc(name)(2), then "skip"
        data[8] = b'X';

        let mut src = SliceSource::new(&data);
        let mut msg = Cursor::new(&mut src);
        assert!(!msg.find_key("sXip"));
        assert!(!msg.is_truncated());

        let mut src = SliceSource::new(&data);
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.get_u8("skip"), 0);
        assert!(!msg.is_truncated());

        let mut src = SliceSource::new(&data);
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.get_u8("keep"), 4);
        assert_eq!(msg.field_type(), Some(ValueType::U8));
        msg.end();
        assert!(!msg.is_truncated());
    }

    #[test]
    fn test_unknown_key_tag_ends_message() {
        let data = [0x07, 0x00, 0x00, 0x05, 0xFF];
        let mut src = SliceSource::new(&data);
        let mut msg = Cursor::new(&mut src);
        assert!(!msg.find_key("a"));
        assert!(msg.is_end());
        assert!(msg.is_truncated());
    }

    #[test]
    fn test_read_topic_forms() {
        let named = encode(KeyStyle::Inline, |w| {
            w.topic(Topic::Name("Demo"));
        });
        let mut src = SliceSource::new(named.as_slice());
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.read_topic(), Some(TopicId::from_name("Demo")));
        msg.end();
        assert!(!msg.is_truncated());

        let by_id = encode(KeyStyle::Hashed, |w| {
            w.topic(Topic::Id(TopicId::from_raw(0xBEEF)));
        });
        let mut src = SliceSource::new(by_id.as_slice());
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.read_topic(), Some(TopicId::from_raw(0xBEEF)));

        let mut src = SliceSource::new(&[0xFF]);
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.read_topic(), None);
        assert!(msg.is_end());
    }

    proptest! {
        #[test]
        fn test_roundtrip_prop(i in any::<i32>(), d in any::<f64>(), s in "[a-zA-Z0-9 ]{0,40}") {
            prop_assume!(!d.is_nan());
            let buf = encode(KeyStyle::Hashed, |w| {
                w.put_i32("i", i).put_f64("d", d).put_string("s", &s);
            });
            let mut src = SliceSource::new(buf.as_slice());
            let mut msg = Cursor::new(&mut src);
            prop_assert_eq!(msg.get_i32("i"), i);
            prop_assert_eq!(msg.get_double("d"), d);
            let text = msg.get_string::<40>("s");
            prop_assert_eq!(text.as_str(), s.as_str());
        }

        #[test]
        fn test_bit_flip_rejected_and_next_field_intact(bit in 0usize..64, a in any::<i64>(), b in any::<u16>()) {
            let buf = encode(KeyStyle::Hashed, |w| {
                w.put_f64("a", a as f64).put_u16("b", b);
            });
            let mut data = heapless::Vec::<u8, 64>::new();
            data.extend_from_slice(buf.as_slice()).unwrap();
            data[6 + bit / 8] ^= 1 << (bit % 8);

            let mut src = SliceSource::new(&data);
            let mut msg = Cursor::new(&mut src);
            prop_assert_eq!(msg.get_double("a"), 0.0);
            prop_assert_eq!(msg.field_type(), None);
            prop_assert_eq!(msg.get_u16("b"), b);
        }
    }
}
