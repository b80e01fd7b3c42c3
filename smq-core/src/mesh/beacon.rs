//! Beacon body layout.
//!
//! Beacons use the normal header (topic id and partition key hash) but
//! their body is fixed-layout rather than key/value fields:
//!
//! ```text
//! ┌──────────┬───────┬──────────────────┬──────┐
//! │ NAME     │ COUNT │ TOPIC IDS        │ 0xFF │
//! │ 13B, NUL │ 1B    │ COUNT × u16 (LE) │      │
//! └──────────┴───────┴──────────────────┴──────┘
//! ```
//!
//! Pairing beacons insert the sender's 16-byte link key after the count,
//! all zeros when it has none.

use heapless::{String, Vec};
use smq_hal::{PeerKey, PEER_KEY_LEN};
use smq_protocol::{FrameWriter, Sink, SliceSource, TopicId};

use super::directory::MAX_HOST_TOPICS;
use crate::config::MAX_HOST_NAME_LEN;

/// Reserved topic carrying beacons
pub const BEACON_TOPIC: TopicId = TopicId::from_name("BEACON");

/// Reserved topic carrying pairing beacons
pub const PAIRING_TOPIC: TopicId = TopicId::from_name("PAIRING");

/// Size of the NUL-padded name field
pub const NAME_FIELD_LEN: usize = MAX_HOST_NAME_LEN + 1;

/// A decoded beacon body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    pub name: String<MAX_HOST_NAME_LEN>,
    /// Link key from a pairing beacon; never set for a plain beacon
    pub key: Option<PeerKey>,
    pub topics: Vec<TopicId, MAX_HOST_TOPICS>,
}

/// Append a beacon body after the header
pub fn write_body<S: Sink>(
    writer: &mut FrameWriter<S>,
    name: &str,
    topics: impl Iterator<Item = TopicId> + Clone,
) {
    write(writer, name, None, topics);
}

/// Append a pairing beacon body after the header
pub fn write_pairing_body<S: Sink>(
    writer: &mut FrameWriter<S>,
    name: &str,
    key: Option<&PeerKey>,
    topics: impl Iterator<Item = TopicId> + Clone,
) {
    write(writer, name, Some(key.unwrap_or(&[0; PEER_KEY_LEN])), topics);
}

fn write<S: Sink>(
    writer: &mut FrameWriter<S>,
    name: &str,
    key: Option<&PeerKey>,
    topics: impl Iterator<Item = TopicId> + Clone,
) {
    let mut field = [0u8; NAME_FIELD_LEN];
    let len = name.len().min(MAX_HOST_NAME_LEN);
    field[..len].copy_from_slice(&name.as_bytes()[..len]);
    writer.put_raw(&field);

    let count = topics.clone().count().min(u8::MAX as usize);
    writer.put_raw(&[count as u8]);
    if let Some(key) = key {
        writer.put_raw(key);
    }
    for topic in topics.take(count) {
        writer.put_raw(&topic.raw().to_le_bytes());
    }
}

/// Parse a beacon body; `None` if it is cut short
///
/// Topics past [`MAX_HOST_TOPICS`] are read and dropped.
pub fn read_body(src: &mut SliceSource<'_>) -> Option<Beacon> {
    read(src, false)
}

/// Parse a pairing beacon body; an all-zero key reads as `None`
pub fn read_pairing_body(src: &mut SliceSource<'_>) -> Option<Beacon> {
    read(src, true)
}

fn read(src: &mut SliceSource<'_>, with_key: bool) -> Option<Beacon> {
    let field = src.take(NAME_FIELD_LEN)?;
    let raw = &field[..MAX_HOST_NAME_LEN];
    let raw = match raw.iter().position(|&b| b == 0) {
        Some(nul) => &raw[..nul],
        None => raw,
    };
    let text = match core::str::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&raw[..e.valid_up_to()]).unwrap_or(""),
    };
    let mut name = String::new();
    let _ = name.push_str(text);

    let count = src.read_u8()?;
    let key = if with_key {
        let mut key = [0; PEER_KEY_LEN];
        key.copy_from_slice(src.take(PEER_KEY_LEN)?);
        Some(key).filter(|k| k.iter().any(|&b| b != 0))
    } else {
        None
    };
    let mut topics = Vec::new();
    for _ in 0..count {
        let id = src.read_u16()?;
        let _ = topics.push(TopicId::from_raw(id));
    }
    Some(Beacon { name, key, topics })
}
