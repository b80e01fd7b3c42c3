//! Broadcast radio abstractions
//!
//! Modelled on connectionless peer radios such as ESP-NOW: datagrams are
//! sent to one registered peer or to all of them, delivery is reported
//! later by the driver, and received datagrams arrive from driver context.

use core::fmt;

/// Number of bytes in a radio address
pub const MAC_LEN: usize = 6;

/// Length of a per-peer link key
pub const PEER_KEY_LEN: usize = 16;

/// Per-peer link encryption key, handed out during pairing
pub type PeerKey = [u8; PEER_KEY_LEN];

/// Six-byte radio hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacAddress(pub [u8; MAC_LEN]);

impl MacAddress {
    /// Address every peer in range listens on
    pub const BROADCAST: MacAddress = MacAddress([0xFF; MAC_LEN]);

    pub const fn new(bytes: [u8; MAC_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MAC_LEN] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Parse the `XX:XX:XX:XX:XX:XX` form (hex digits, either case)
    pub fn parse(text: &str) -> Option<Self> {
        let mut bytes = [0u8; MAC_LEN];
        let mut parts = text.split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next()?;
            if part.is_empty() || part.len() > 2 {
                return None;
            }
            *byte = u8::from_str_radix(part, 16).ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self(bytes))
    }
}

impl From<[u8; MAC_LEN]> for MacAddress {
    fn from(bytes: [u8; MAC_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Connectionless broadcast radio with a peer table
///
/// `send` only queues the datagram. The driver reports completion through
/// whatever callback path the platform offers, which the mesh transport
/// turns into its clear-to-send signal.
pub trait Radio {
    /// Error type for radio operations
    type Error;

    /// This node's own radio address
    fn local_address(&self) -> MacAddress;

    /// Register a peer so it can be addressed by `send`
    ///
    /// With a `key` the driver encrypts traffic to this peer. Radios
    /// without link encryption ignore it.
    fn add_peer(&mut self, peer: MacAddress, key: Option<&PeerKey>) -> Result<(), Self::Error>;

    /// Remove a previously registered peer
    fn remove_peer(&mut self, peer: MacAddress) -> Result<(), Self::Error>;

    /// Queue a datagram for transmission
    ///
    /// `Some(addr)` sends to that registered peer, `None` to every
    /// registered peer.
    fn send(&mut self, dest: Option<MacAddress>, data: &[u8]) -> Result<(), Self::Error>;

    /// Source of jitter for beacon scheduling
    fn random_u32(&mut self) -> u32 {
        0
    }
}
