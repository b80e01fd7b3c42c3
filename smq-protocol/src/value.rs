//! Value type tags

/// Length-prefixed name or string (tag, crc(len), len, crc(bytes), bytes)
pub const TAG_NAME: u8 = 0x00;
/// Inline 16-bit id or name hash
pub const TAG_HASH: u8 = 0x01;
/// Terminates a message's field list
pub const END_OF_MESSAGE: u8 = 0xFF;

const TAG_I8: u8 = 0x02;
const TAG_I16: u8 = 0x03;
const TAG_I32: u8 = 0x04;
const TAG_U8: u8 = 0x05;
const TAG_U16: u8 = 0x06;
const TAG_U32: u8 = 0x07;
const TAG_F32: u8 = 0x08;
const TAG_F64: u8 = 0x09;
const TAG_TRUE: u8 = 0x0A;
const TAG_FALSE: u8 = 0x0B;
const TAG_NULL: u8 = 0x0C;
const TAG_BUFFER: u8 = 0x0D;

/// Type of a field value as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValueType {
    /// Length-prefixed string
    String,
    /// 16-bit hashed string
    Hash,
    I8,
    I16,
    I32,
    U8,
    U16,
    U32,
    F32,
    F64,
    True,
    False,
    Null,
    /// Reserved, always empty
    Buffer,
}

impl ValueType {
    /// Parse a value type from its wire tag
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            TAG_NAME => Some(ValueType::String),
            TAG_HASH => Some(ValueType::Hash),
            TAG_I8 => Some(ValueType::I8),
            TAG_I16 => Some(ValueType::I16),
            TAG_I32 => Some(ValueType::I32),
            TAG_U8 => Some(ValueType::U8),
            TAG_U16 => Some(ValueType::U16),
            TAG_U32 => Some(ValueType::U32),
            TAG_F32 => Some(ValueType::F32),
            TAG_F64 => Some(ValueType::F64),
            TAG_TRUE => Some(ValueType::True),
            TAG_FALSE => Some(ValueType::False),
            TAG_NULL => Some(ValueType::Null),
            TAG_BUFFER => Some(ValueType::Buffer),
            _ => None,
        }
    }

    /// Convert to wire tag
    pub fn to_byte(self) -> u8 {
        match self {
            ValueType::String => TAG_NAME,
            ValueType::Hash => TAG_HASH,
            ValueType::I8 => TAG_I8,
            ValueType::I16 => TAG_I16,
            ValueType::I32 => TAG_I32,
            ValueType::U8 => TAG_U8,
            ValueType::U16 => TAG_U16,
            ValueType::U32 => TAG_U32,
            ValueType::F32 => TAG_F32,
            ValueType::F64 => TAG_F64,
            ValueType::True => TAG_TRUE,
            ValueType::False => TAG_FALSE,
            ValueType::Null => TAG_NULL,
            ValueType::Buffer => TAG_BUFFER,
        }
    }

    /// Size of the checksummed payload for fixed-width numeric types
    pub fn numeric_width(self) -> Option<usize> {
        match self {
            ValueType::I8 | ValueType::U8 => Some(1),
            ValueType::I16 | ValueType::U16 => Some(2),
            ValueType::I32 | ValueType::U32 | ValueType::F32 => Some(4),
            ValueType::F64 => Some(8),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ValueType::F32 | ValueType::F64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for byte in 0x00..=0x0D {
            let ty = ValueType::from_byte(byte).unwrap();
            assert_eq!(ty.to_byte(), byte);
        }
    }

    #[test]
    fn test_unknown_tags() {
        assert_eq!(ValueType::from_byte(0x0E), None);
        assert_eq!(ValueType::from_byte(END_OF_MESSAGE), None);
    }

    #[test]
    fn test_numeric_width() {
        assert_eq!(ValueType::I16.numeric_width(), Some(2));
        assert_eq!(ValueType::F64.numeric_width(), Some(8));
        assert_eq!(ValueType::True.numeric_width(), None);
        assert_eq!(ValueType::String.numeric_width(), None);
    }
}
