//! Directory of peers discovered through beacons.
//!
//! Keyed by radio address. Entries are refreshed by every beacon and aged
//! out after a period of silence. Timestamps are `u32` milliseconds and
//! compared with wrapping arithmetic.

use heapless::{String, Vec};
use smq_hal::MacAddress;
use smq_protocol::TopicId;

use crate::config::MAX_HOST_NAME_LEN;

/// Most peers tracked at once
pub const MAX_HOSTS: usize = 20;

/// Most topics remembered per peer
pub const MAX_HOST_TOPICS: usize = 32;

/// A discovered peer
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Host {
    name: String<MAX_HOST_NAME_LEN>,
    address: MacAddress,
    last_seen_ms: u32,
    topics: Vec<TopicId, MAX_HOST_TOPICS>,
}

impl Host {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn last_seen_ms(&self) -> u32 {
        self.last_seen_ms
    }

    /// Topics the peer advertised in its last beacon
    pub fn topics(&self) -> &[TopicId] {
        &self.topics
    }

    pub fn subscribes(&self, topic: TopicId) -> bool {
        self.topics.contains(&topic)
    }
}

/// Result of feeding a beacon to the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Observation {
    /// First beacon from this address
    New,
    /// Known peer, name or topics changed
    Changed,
    /// Known peer, nothing changed
    Refreshed,
    /// Directory full, beacon ignored
    Ignored,
}

impl Observation {
    /// Whether this should be reported as a discovery
    pub fn is_discovery(&self) -> bool {
        matches!(self, Observation::New | Observation::Changed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HostDirectory {
    hosts: Vec<Host, MAX_HOSTS>,
}

impl HostDirectory {
    pub const fn new() -> Self {
        Self { hosts: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter()
    }

    pub fn get(&self, address: MacAddress) -> Option<&Host> {
        self.hosts.iter().find(|h| h.address == address)
    }

    /// First host advertising `name`
    pub fn find_by_name(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// Hosts advertising `topic`
    pub fn subscribers(&self, topic: TopicId) -> impl Iterator<Item = &Host> {
        self.hosts.iter().filter(move |h| h.subscribes(topic))
    }

    /// Record a beacon from `address`
    ///
    /// Names longer than a host name and topic lists longer than
    /// [`MAX_HOST_TOPICS`] are cut to fit.
    pub fn observe(
        &mut self,
        address: MacAddress,
        name: &str,
        topics: &[TopicId],
        now_ms: u32,
    ) -> Observation {
        let name = truncate_name(name);
        let topics = &topics[..topics.len().min(MAX_HOST_TOPICS)];

        if let Some(host) = self.hosts.iter_mut().find(|h| h.address == address) {
            host.last_seen_ms = now_ms;
            if host.name == name && host.topics.as_slice() == topics {
                return Observation::Refreshed;
            }
            host.name = name;
            host.topics.clear();
            let _ = host.topics.extend_from_slice(topics);
            return Observation::Changed;
        }

        let mut host = Host {
            name,
            address,
            last_seen_ms: now_ms,
            topics: Vec::new(),
        };
        // Length clamped above
        let _ = host.topics.extend_from_slice(topics);
        match self.hosts.push(host) {
            Ok(()) => Observation::New,
            Err(_) => Observation::Ignored,
        }
    }

    /// Drop hosts not seen for more than `timeout_ms`
    ///
    /// `on_lost` runs once for each host, before it is removed. Returns how
    /// many were removed.
    pub fn prune(&mut self, now_ms: u32, timeout_ms: u32, mut on_lost: impl FnMut(&Host)) -> usize {
        let before = self.hosts.len();
        self.hosts.retain(|host| {
            let alive = now_ms.wrapping_sub(host.last_seen_ms) <= timeout_ms;
            if !alive {
                on_lost(host);
            }
            alive
        });
        before - self.hosts.len()
    }
}

fn truncate_name(name: &str) -> String<MAX_HOST_NAME_LEN> {
    let mut end = name.len().min(MAX_HOST_NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::new();
    // Fits: at most MAX_HOST_NAME_LEN bytes
    let _ = out.push_str(&name[..end]);
    out
}
