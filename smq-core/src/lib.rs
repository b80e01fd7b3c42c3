//! Board-agnostic SMQ node logic
//!
//! Everything between the wire codec and the hardware:
//!
//! - Topic registry and message dispatch
//! - Serial transport (ready handshake, subscriber announcement)
//! - Radio mesh transport (beacons, host directory, flow control)
//! - Configuration types
//!
//! Hardware is reached only through the [`smq_hal`] traits, and time only
//! through the `now_ms` arguments, so the whole crate runs on the host in
//! tests.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

mod fmt;

pub mod config;
pub mod error;
pub mod mesh;
pub mod registry;
pub mod serial;

pub use config::{ConfigError, MeshConfig, SerialConfig};
pub use error::{PublishError, SerialError};
pub use mesh::{Host, MeshEvents, MeshSession, MeshShared, MeshTransport, PairedHost, Target};
pub use registry::{Handler, Origin, Registry, RegistryError};
pub use serial::{PollOutcome, SerialSession, SerialTransport};

pub use smq_protocol::{Cursor, FieldKey, FrameWriter, Topic, TopicId};
