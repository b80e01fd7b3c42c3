//! SMQ wire protocol
//!
//! Typed key/value messages addressed to 16-bit topics, as exchanged by
//! SMQ nodes over a serial link or a broadcast radio mesh.
//!
//! # Message Overview
//!
//! ```text
//! ┌──────────────┬─────────┬─────────┬─────┬──────┐
//! │ TOPIC HEADER │ FIELD 0 │ FIELD 1 │ ... │ 0xFF │
//! └──────────────┴─────────┴─────────┴─────┴──────┘
//! ```
//!
//! Every field carries its own CRC-16 so a damaged field can be dropped
//! without losing the rest of the message. There is no length prefix for
//! the message as a whole; the `0xFF` end marker is the only resync point.
//!
//! - [`crc`] - the checksum engine (name hash and field checksum)
//! - [`FrameWriter`] - encoder
//! - [`Cursor`] - forward-only decoder with typed, coercing getters

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

mod fmt;

pub mod crc;
pub mod cursor;
pub mod id;
pub mod io;
pub mod value;
pub mod writer;

pub use cursor::{Cursor, MAX_FIELD_LEN};
pub use id::{FieldKey, KeyStyle, Topic, TopicId};
pub use io::{ByteSource, EncodeError, SendBuffer, Sink, SliceSource};
pub use value::{ValueType, END_OF_MESSAGE};
pub use writer::FrameWriter;

/// Largest message a mesh datagram can carry
pub const MAX_MSG_SIZE: usize = 250;
