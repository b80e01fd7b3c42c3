//! Wireless mesh transport
//!
//! Binds the codec to a connectionless broadcast radio. On top of the
//! shared message format every datagram carries a 32-bit hash of the
//! mesh's pre-shared key right after the topic header; datagrams with a
//! different hash are dropped unread.
//!
//! Nodes find each other through periodic [`BEACON_TOPIC`] broadcasts
//! listing their name and subscriptions. At most one send is in flight:
//! a publish fails with [`PublishError::Busy`] until the driver reports
//! completion through [`MeshShared::on_send_complete`].
//!
//! For a limited window after [`MeshTransport::start_pairing`] the node
//! sends [`PAIRING_TOPIC`] beacons instead, carrying its link key. Hosts
//! heard pairing in the same window are added to the paired-host list and
//! their keys are handed to the radio whenever they are registered as peers.
//!
//! All timing is driven by the `now_ms` passed to [`MeshTransport::poll`].

pub mod beacon;
pub mod directory;
pub mod pairing;
pub mod shared;

use core::ops::{Deref, DerefMut};

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Vec;
use smq_hal::{MacAddress, Radio};
use smq_protocol::{
    crc, Cursor, FrameWriter, KeyStyle, SendBuffer, SliceSource, Topic, TopicId, MAX_MSG_SIZE,
};

use crate::config::{ConfigError, MeshConfig};
use crate::error::PublishError;
use crate::fmt::{debug, info, trace, warn};
use crate::registry::{Origin, Registry};

pub use beacon::{BEACON_TOPIC, PAIRING_TOPIC};
pub use directory::{Host, HostDirectory, Observation, MAX_HOSTS, MAX_HOST_TOPICS};
pub use pairing::{PairedHost, PairedHosts, PairingEvent, PairingState, MAX_PAIRED_HOSTS};
pub use shared::{Datagram, MeshShared, QUEUE_SIZE};

const MAX_PEERS: usize = MAX_HOSTS + 1;

/// Who a publish goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// Every node in range
    Broadcast,
    /// Every discovered host subscribed to the topic
    Subscribers,
    /// Discovered host(s) with this name
    Host(&'a str),
    /// Discovered host with this address
    Address(MacAddress),
    /// `XX:XX:XX:XX:XX:XX` address, otherwise a host name
    Named(&'a str),
}

/// Directory change notifications
pub trait MeshEvents {
    /// A new host appeared, or a known one changed name or topics
    fn host_discovered(&mut self, _host: &Host) {}

    /// A host went silent and was removed
    fn host_lost(&mut self, _host: &Host) {}

    /// A host advertising `name` was paired during the pairing window
    fn host_paired(&mut self, _host: &PairedHost, _name: &str) {}

    /// The pairing window ran out without [`MeshTransport::stop_pairing`]
    fn pairing_timed_out(&mut self) {}
}

impl MeshEvents for () {}

enum HostFilter<'a> {
    Any,
    Name(&'a str),
    Address(MacAddress),
}

impl HostFilter<'_> {
    fn matches(&self, host: &Host) -> bool {
        match self {
            HostFilter::Any => true,
            HostFilter::Name(name) => host.name() == *name,
            HostFilter::Address(addr) => host.address() == *addr,
        }
    }
}

/// SMQ over a broadcast radio
pub struct MeshTransport<'s, R, M: RawMutex, const Q: usize = QUEUE_SIZE> {
    radio: R,
    shared: &'s MeshShared<M, Q>,
    config: MeshConfig,
    key_hash: u32,
    directory: HostDirectory,
    peers: Vec<MacAddress, MAX_PEERS>,
    send_buf: SendBuffer<MAX_MSG_SIZE>,
    ready: bool,
    now_ms: u32,
    next_beacon_ms: Option<u32>,
    send_started_ms: Option<u32>,
    last_sender: Option<MacAddress>,
    pairing: PairingState,
    paired: PairedHosts,
    pair_reply: bool,
}

impl<'s, R: Radio, M: RawMutex, const Q: usize> MeshTransport<'s, R, M, Q> {
    /// Create a transport; it stays not-ready until [`Self::init`] succeeds
    pub fn new(radio: R, shared: &'s MeshShared<M, Q>, config: MeshConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let key_hash = crc::key_hash(config.key());
        Ok(Self {
            radio,
            shared,
            config,
            key_hash,
            directory: HostDirectory::new(),
            peers: Vec::new(),
            send_buf: SendBuffer::new(),
            ready: false,
            now_ms: 0,
            next_beacon_ms: None,
            send_started_ms: None,
            last_sender: None,
            pairing: PairingState::Closed,
            paired: PairedHosts::new(),
            pair_reply: false,
        })
    }

    /// Register the broadcast peer and open for sending
    ///
    /// May be called again after a failure.
    pub fn init(&mut self) -> Result<(), R::Error> {
        self.ready = false;
        for &peer in self.peers.iter() {
            let _ = self.radio.remove_peer(peer);
        }
        self.peers.clear();

        self.radio.add_peer(MacAddress::BROADCAST, None)?;
        let _ = self.peers.push(MacAddress::BROADCAST);
        self.shared.set_clear_to_send(true);
        self.send_started_ms = None;
        self.next_beacon_ms = None;
        self.ready = true;
        info!(
            "mesh ready as {} ({})",
            self.config.host_name.as_str(),
            self.radio.local_address()
        );
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Ready and no send in flight
    pub fn clear_to_send(&self) -> bool {
        self.ready && self.shared.clear_to_send()
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Hash of the partition key carried in every datagram
    pub fn key_hash(&self) -> u32 {
        self.key_hash
    }

    pub fn directory(&self) -> &HostDirectory {
        &self.directory
    }

    /// Sender of the most recent datagram that passed the partition key check
    pub fn last_sender(&self) -> Option<MacAddress> {
        self.last_sender
    }

    pub fn local_address(&self) -> MacAddress {
        self.radio.local_address()
    }

    /// Open the pairing window for [`MeshConfig::pairing_timeout_ms`]
    ///
    /// The first pairing beacon goes out on the next poll. Starting again
    /// while open restarts the window.
    pub fn start_pairing(&mut self, now_ms: u32) -> Result<(), PublishError> {
        if !self.ready {
            return Err(PublishError::NotReady);
        }
        let timeout_ms = self.config.pairing_timeout_ms;
        self.pairing = self.pairing.transition(PairingEvent::Start { now_ms, timeout_ms });
        self.next_beacon_ms = None;
        info!("pairing for {} ms", timeout_ms);
        Ok(())
    }

    /// Close the pairing window
    ///
    /// Pairing beacons are still sent and answered for
    /// [`pairing::PAIRING_LINGER_MS`] so a peer that just heard us can finish.
    pub fn stop_pairing(&mut self, now_ms: u32) {
        self.pairing = self.pairing.transition(PairingEvent::Stop { now_ms });
    }

    /// The pairing window is open and has not been stopped
    pub fn is_pairing(&self) -> bool {
        self.pairing.is_open()
    }

    pub fn pairing_state(&self) -> PairingState {
        self.pairing
    }

    pub fn paired_hosts(&self) -> &[PairedHost] {
        self.paired.as_slice()
    }

    pub fn paired_host_count(&self) -> usize {
        self.paired.len()
    }

    /// Remember one paired host, e.g. restored from storage
    ///
    /// `false` if it is already paired or the list is full.
    pub fn add_paired_host(&mut self, host: PairedHost) -> bool {
        let added = self.paired.insert(host);
        if added {
            self.forget_peer(host.address);
        }
        added
    }

    /// Replace the paired-host list; returns how many entries were kept
    pub fn add_paired_hosts(&mut self, hosts: &[PairedHost]) -> usize {
        let kept = self.paired.replace(hosts);
        let stale: Vec<MacAddress, MAX_PEERS> = self
            .peers
            .iter()
            .copied()
            .filter(|p| !p.is_broadcast())
            .collect();
        for peer in stale {
            self.forget_peer(peer);
        }
        kept
    }

    /// Process queued datagrams, age the directory and send due beacons
    ///
    /// Returns the number of datagrams processed.
    pub fn poll<const N: usize>(
        &mut self,
        now_ms: u32,
        registry: &mut Registry<'_, N>,
        events: &mut dyn MeshEvents,
    ) -> usize {
        self.now_ms = now_ms;
        self.check_send_timeout();
        self.tick_pairing(events);

        let mut processed = 0;
        while let Some(datagram) = self.shared.try_receive() {
            self.process(&datagram, registry, events);
            processed += 1;
        }

        if self.pair_reply && self.clear_to_send() {
            self.pair_reply = false;
            if let Err(e) = self.send_pairing_beacon(registry) {
                warn!("pairing reply not sent: {}", e);
            }
        }

        let due = match self.next_beacon_ms {
            None => true,
            Some(at) => now_ms.wrapping_sub(at) as i32 >= 0,
        };
        if due {
            self.prune(events);
            if self.clear_to_send() {
                let sent = if self.pairing.accepts() {
                    self.send_pairing_beacon(registry)
                } else {
                    self.send_beacon(registry)
                };
                if let Err(e) = sent {
                    warn!("beacon not sent: {}", e);
                }
            }
            let jitter = match self.config.beacon_jitter_ms {
                0 => 0,
                max => self.radio.random_u32() % max.saturating_add(1),
            };
            let delay = self.config.beacon_interval_ms.saturating_add(jitter);
            self.next_beacon_ms = Some(now_ms.wrapping_add(delay));
        }
        processed
    }

    fn check_send_timeout(&mut self) {
        if self.shared.clear_to_send() {
            self.send_started_ms = None;
            return;
        }
        if let (Some(limit), Some(started)) = (self.config.send_timeout_ms, self.send_started_ms) {
            if self.now_ms.wrapping_sub(started) >= limit {
                warn!("no send-complete after {} ms, clearing", limit);
                self.send_started_ms = None;
                self.shared.set_clear_to_send(true);
            }
        }
    }

    fn tick_pairing(&mut self, events: &mut dyn MeshEvents) {
        let next = self.pairing.transition(PairingEvent::Tick { now_ms: self.now_ms });
        if next == self.pairing {
            return;
        }
        if self.pairing.is_open() {
            info!("pairing timed out, {} paired", self.paired.len());
            events.pairing_timed_out();
        } else {
            info!("pairing closed, {} paired", self.paired.len());
        }
        self.pairing = next;
        self.pair_reply = false;
    }

    fn prune(&mut self, events: &mut dyn MeshEvents) {
        let timeout = self.config.host_lost_timeout_ms;
        self.directory.prune(self.now_ms, timeout, |host| {
            info!("lost {} at {}", host.name(), host.address());
            events.host_lost(host);
        });
    }

    fn process<const N: usize>(
        &mut self,
        datagram: &Datagram,
        registry: &mut Registry<'_, N>,
        events: &mut dyn MeshEvents,
    ) {
        let from = datagram.from;
        let mut src = SliceSource::new(&datagram.data);
        let Some(topic) = Cursor::new(&mut src).read_topic() else {
            debug!("unreadable header from {}", from);
            return;
        };
        if src.read_u32() != Some(self.key_hash) {
            trace!("partition key mismatch from {}", from);
            return;
        }
        self.last_sender = Some(from);

        if topic == BEACON_TOPIC {
            self.on_beacon(from, &mut src, events);
            return;
        }
        if topic == PAIRING_TOPIC {
            self.on_pairing(from, &mut src, events);
            return;
        }
        let mut msg = Cursor::new(&mut src);
        registry.dispatch(topic, &mut msg, Origin::Mesh(from));
    }

    fn on_beacon(&mut self, from: MacAddress, src: &mut SliceSource<'_>, events: &mut dyn MeshEvents) {
        let Some(beacon) = beacon::read_body(src) else {
            debug!("short beacon from {}", from);
            return;
        };
        match self.directory.observe(from, &beacon.name, &beacon.topics, self.now_ms) {
            Observation::New | Observation::Changed => {
                if let Some(host) = self.directory.get(from) {
                    info!("discovered {} at {}", host.name(), from);
                    events.host_discovered(host);
                }
            }
            Observation::Refreshed => {}
            Observation::Ignored => warn!("host directory full, ignoring {}", from),
        }
    }

    fn on_pairing(&mut self, from: MacAddress, src: &mut SliceSource<'_>, events: &mut dyn MeshEvents) {
        if !self.pairing.accepts() {
            debug!("pairing beacon from {} outside the window", from);
            return;
        }
        let Some(beacon) = beacon::read_pairing_body(src) else {
            debug!("short pairing beacon from {}", from);
            return;
        };
        if self.directory.observe(from, &beacon.name, &beacon.topics, self.now_ms) == Observation::Ignored {
            warn!("host directory full, ignoring {}", from);
        }
        if self.paired.contains(from) {
            return;
        }
        let host = PairedHost {
            address: from,
            key: beacon.key,
        };
        if !self.paired.insert(host) {
            warn!("paired host list full, ignoring {}", from);
            return;
        }
        self.forget_peer(from);
        info!("paired with {} at {}", beacon.name.as_str(), from);
        events.host_paired(&host, &beacon.name);
        self.pair_reply = true;
    }

    /// Start a message to `target`
    ///
    /// Fails without side effects if the transport is not ready, a send is
    /// still in flight, or no matching host is known. Call
    /// [`MeshSession::end`] to send.
    pub fn publish<'n>(
        &mut self,
        topic: impl Into<Topic<'n>>,
        target: Target<'_>,
    ) -> Result<MeshSession<'_, R, M, Q>, PublishError> {
        if !self.ready {
            return Err(PublishError::NotReady);
        }
        if !self.shared.clear_to_send() {
            return Err(PublishError::Busy);
        }
        let topic = topic.into().id();
        let dest = self.resolve(topic, target)?;
        Ok(self.open(topic, dest))
    }

    /// Start a message to every node in range
    pub fn broadcast<'n>(
        &mut self,
        topic: impl Into<Topic<'n>>,
    ) -> Result<MeshSession<'_, R, M, Q>, PublishError> {
        self.publish(topic, Target::Broadcast)
    }

    /// Pick the destination and register exactly the peers it needs.
    /// `None` means every registered peer.
    fn resolve(&mut self, topic: TopicId, target: Target<'_>) -> Result<Option<MacAddress>, PublishError> {
        let filter = match target {
            Target::Broadcast => {
                self.set_peers(&[MacAddress::BROADCAST])?;
                return Ok(Some(MacAddress::BROADCAST));
            }
            Target::Subscribers => HostFilter::Any,
            Target::Host(name) => HostFilter::Name(name),
            Target::Address(addr) => HostFilter::Address(addr),
            Target::Named(text) => match MacAddress::parse(text) {
                Some(addr) => HostFilter::Address(addr),
                None => HostFilter::Name(text),
            },
        };

        let mut known = false;
        let mut dests: Vec<MacAddress, MAX_HOSTS> = Vec::new();
        for host in self.directory.iter().filter(|h| filter.matches(h)) {
            known = true;
            if host.subscribes(topic) {
                let _ = dests.push(host.address());
            }
        }
        if dests.is_empty() {
            return Err(match filter {
                HostFilter::Any => PublishError::NoSubscribers,
                _ if known => PublishError::NotSubscribed,
                _ => PublishError::UnknownHost,
            });
        }

        self.set_peers(&dests)?;
        Ok(match dests.as_slice() {
            [only] => Some(*only),
            _ => None,
        })
    }

    fn set_peers(&mut self, wanted: &[MacAddress]) -> Result<(), PublishError> {
        let mut i = 0;
        while i < self.peers.len() {
            let peer = self.peers[i];
            if wanted.contains(&peer) {
                i += 1;
            } else {
                let _ = self.radio.remove_peer(peer);
                self.peers.swap_remove(i);
            }
        }
        for &peer in wanted {
            if !self.peers.contains(&peer) {
                self.radio
                    .add_peer(peer, self.paired.key_for(peer))
                    .map_err(|_| PublishError::Radio)?;
                self.peers.push(peer).map_err(|_| PublishError::Radio)?;
            }
        }
        Ok(())
    }

    /// Unregister `peer` so its next use picks up its current key
    fn forget_peer(&mut self, peer: MacAddress) {
        if let Some(i) = self.peers.iter().position(|p| *p == peer) {
            let _ = self.radio.remove_peer(peer);
            self.peers.swap_remove(i);
        }
    }

    fn open(&mut self, topic: TopicId, dest: Option<MacAddress>) -> MeshSession<'_, R, M, Q> {
        self.send_buf.clear();
        let key = self.key_hash.to_le_bytes();
        let mut writer = FrameWriter::new(&mut self.send_buf, KeyStyle::Hashed);
        writer.topic(Topic::Id(topic)).put_raw(&key);
        MeshSession {
            writer,
            radio: &mut self.radio,
            shared: self.shared,
            dest,
            send_started_ms: &mut self.send_started_ms,
            now_ms: self.now_ms,
        }
    }

    fn send_beacon<const N: usize>(&mut self, registry: &Registry<'_, N>) -> Result<(), PublishError> {
        self.set_peers(&[MacAddress::BROADCAST])?;
        let name = self.config.host_name.clone();
        let mut session = self.open(BEACON_TOPIC, Some(MacAddress::BROADCAST));
        beacon::write_body(session.deref_mut(), &name, registry.topics());
        session.end()
    }

    fn send_pairing_beacon<const N: usize>(&mut self, registry: &Registry<'_, N>) -> Result<(), PublishError> {
        self.set_peers(&[MacAddress::BROADCAST])?;
        let name = self.config.host_name.clone();
        let key = self.config.link_key;
        let mut session = self.open(PAIRING_TOPIC, Some(MacAddress::BROADCAST));
        beacon::write_pairing_body(session.deref_mut(), &name, key.as_ref(), registry.topics());
        session.end()
    }
}

/// An outgoing mesh message
///
/// Derefs to [`FrameWriter`] for the `put_*` calls. Nothing is sent until
/// [`MeshSession::end`]; dropping the session discards the message.
pub struct MeshSession<'a, R, M: RawMutex, const Q: usize> {
    writer: FrameWriter<&'a mut SendBuffer<MAX_MSG_SIZE>>,
    radio: &'a mut R,
    shared: &'a MeshShared<M, Q>,
    dest: Option<MacAddress>,
    send_started_ms: &'a mut Option<u32>,
    now_ms: u32,
}

impl<'a, R, M: RawMutex, const Q: usize> Deref for MeshSession<'a, R, M, Q> {
    type Target = FrameWriter<&'a mut SendBuffer<MAX_MSG_SIZE>>;

    fn deref(&self) -> &Self::Target {
        &self.writer
    }
}

impl<R, M: RawMutex, const Q: usize> DerefMut for MeshSession<'_, R, M, Q> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.writer
    }
}

impl<R: Radio, M: RawMutex, const Q: usize> MeshSession<'_, R, M, Q> {
    /// Terminate the message and hand it to the radio
    ///
    /// A message that overflowed the send buffer is not sent.
    pub fn end(self) -> Result<(), PublishError> {
        let MeshSession {
            writer,
            radio,
            shared,
            dest,
            send_started_ms,
            now_ms,
        } = self;
        let buf = writer.finish()?;

        shared.set_clear_to_send(false);
        *send_started_ms = Some(now_ms);
        let sent = radio.send(dest, buf.as_slice());
        buf.clear();

        if sent.is_err() {
            warn!("radio send failed");
            shared.set_clear_to_send(true);
            *send_started_ms = None;
            return Err(PublishError::Radio);
        }
        Ok(())
    }
}
