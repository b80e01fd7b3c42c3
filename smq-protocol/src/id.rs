//! Topic and key identifiers

use crate::crc;

/// 16-bit topic identifier
///
/// Normally the name hash of the topic name, but any pre-agreed constant
/// works as long as both ends use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TopicId(u16);

impl TopicId {
    /// Id of a named topic
    pub const fn from_name(name: &str) -> Self {
        Self(crc::name_hash(name))
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<u16> for TopicId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

/// How a topic is named in an outgoing header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic<'a> {
    /// Sent as the length-prefixed name
    Name(&'a str),
    /// Sent as the 16-bit id
    Id(TopicId),
}

impl Topic<'_> {
    /// Id the receiving side will compute for this topic
    pub fn id(&self) -> TopicId {
        match *self {
            Topic::Name(name) => TopicId::from_name(name),
            Topic::Id(id) => id,
        }
    }
}

impl<'a> From<&'a str> for Topic<'a> {
    fn from(name: &'a str) -> Self {
        Topic::Name(name)
    }
}

impl From<TopicId> for Topic<'_> {
    fn from(id: TopicId) -> Self {
        Topic::Id(id)
    }
}

/// Field key, by literal name or by precomputed name hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKey<'a> {
    Name(&'a str),
    Id(u16),
}

impl FieldKey<'_> {
    /// Name hash this key compares equal to
    pub fn hash(&self) -> u16 {
        match *self {
            FieldKey::Name(name) => crc::name_hash(name),
            FieldKey::Id(id) => id,
        }
    }
}

impl<'a> From<&'a str> for FieldKey<'a> {
    fn from(name: &'a str) -> Self {
        FieldKey::Name(name)
    }
}

impl From<u16> for FieldKey<'_> {
    fn from(id: u16) -> Self {
        FieldKey::Id(id)
    }
}

/// Key encoding used by an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyStyle {
    /// Named keys are written out in full (tag 0x00)
    #[default]
    Inline,
    /// Named keys are written as their 16-bit name hash (tag 0x01)
    Hashed,
}
