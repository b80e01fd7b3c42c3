//! Pairing window and the paired-host list
//!
//! While the window is open a node sends [`PAIRING_TOPIC`] beacons that
//! carry its link key, and accepts the same from others. Every host paired
//! this way lands in a [`PairedHosts`] list the application may persist and
//! hand back at the next boot.
//!
//! [`PAIRING_TOPIC`]: super::beacon::PAIRING_TOPIC

use heapless::Vec;
use smq_hal::{MacAddress, PeerKey};

/// Most paired hosts remembered
pub const MAX_PAIRED_HOSTS: usize = 20;

/// How long a stopped window keeps answering pairing beacons
pub const PAIRING_LINGER_MS: u32 = 2_000;

/// A host we exchanged keys with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairedHost {
    pub address: MacAddress,
    /// Link key the host offered, `None` if it had none
    pub key: Option<PeerKey>,
}

/// Pairing window states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingState {
    /// Pairing beacons are ignored
    #[default]
    Closed,
    /// Sending and accepting pairing beacons until the deadline
    Open { until_ms: u32 },
    /// Stopped by the application; still answering until the deadline
    Closing { until_ms: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingEvent {
    Start { now_ms: u32, timeout_ms: u32 },
    Stop { now_ms: u32 },
    Tick { now_ms: u32 },
}

impl PairingState {
    pub fn is_open(&self) -> bool {
        matches!(self, PairingState::Open { .. })
    }

    /// Pairing beacons are sent and accepted
    pub fn accepts(&self) -> bool {
        !matches!(self, PairingState::Closed)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: PairingEvent) -> Self {
        match (self, event) {
            (_, PairingEvent::Start { now_ms, timeout_ms }) => PairingState::Open {
                until_ms: now_ms.wrapping_add(timeout_ms),
            },
            (PairingState::Open { .. }, PairingEvent::Stop { now_ms }) => PairingState::Closing {
                until_ms: now_ms.wrapping_add(PAIRING_LINGER_MS),
            },
            (
                PairingState::Open { until_ms } | PairingState::Closing { until_ms },
                PairingEvent::Tick { now_ms },
            ) if now_ms.wrapping_sub(until_ms) as i32 >= 0 => PairingState::Closed,
            (state, _) => state,
        }
    }
}

/// Hosts paired with, in pairing order
#[derive(Debug, Clone, Default)]
pub struct PairedHosts {
    hosts: Vec<PairedHost, MAX_PAIRED_HOSTS>,
}

impl PairedHosts {
    pub const fn new() -> Self {
        Self { hosts: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn as_slice(&self) -> &[PairedHost] {
        &self.hosts
    }

    pub fn contains(&self, address: MacAddress) -> bool {
        self.hosts.iter().any(|h| h.address == address)
    }

    pub fn key_for(&self, address: MacAddress) -> Option<&PeerKey> {
        self.hosts
            .iter()
            .find(|h| h.address == address)
            .and_then(|h| h.key.as_ref())
    }

    /// Add a host; `false` if it is already paired or the list is full
    pub fn insert(&mut self, host: PairedHost) -> bool {
        if self.contains(host.address) {
            return false;
        }
        self.hosts.push(host).is_ok()
    }

    /// Replace the list, keeping at most [`MAX_PAIRED_HOSTS`] entries
    ///
    /// Returns how many were kept.
    pub fn replace(&mut self, hosts: &[PairedHost]) -> usize {
        self.hosts.clear();
        for &host in hosts {
            if self.hosts.is_full() {
                break;
            }
            self.insert(host);
        }
        self.hosts.len()
    }
}
