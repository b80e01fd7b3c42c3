//! State shared with the radio driver's callbacks.
//!
//! The receive and send-complete callbacks run in interrupt or driver
//! context. They only touch this struct: the receive callback copies the
//! datagram into a bounded channel and returns, the send-complete callback
//! flips the clear-to-send flag. The main loop drains the channel from
//! [`super::MeshTransport::poll`].

use core::sync::atomic::Ordering;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use portable_atomic::{AtomicBool, AtomicU32};
use smq_hal::MacAddress;
use smq_protocol::MAX_MSG_SIZE;

use crate::fmt::warn;

/// Default depth of the receive queue
pub const QUEUE_SIZE: usize = 10;

/// One received datagram
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Datagram {
    pub from: MacAddress,
    pub data: Vec<u8, MAX_MSG_SIZE>,
}

/// Driver-facing half of a mesh transport
///
/// Meant to live in a `static`; use a `CriticalSectionRawMutex` when the
/// callbacks can preempt the main loop.
pub struct MeshShared<M: RawMutex, const Q: usize = QUEUE_SIZE> {
    queue: Channel<M, Datagram, Q>,
    clear_to_send: AtomicBool,
    dropped: AtomicU32,
}

impl<M: RawMutex, const Q: usize> Default for MeshShared<M, Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, const Q: usize> MeshShared<M, Q> {
    pub const fn new() -> Self {
        Self {
            queue: Channel::new(),
            clear_to_send: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
        }
    }

    /// Receive callback entry point. Never blocks.
    ///
    /// Returns `false` if the datagram was dropped, either because it is
    /// larger than a message can be or because the queue is full.
    pub fn on_receive(&self, from: MacAddress, data: &[u8]) -> bool {
        let mut copy = Vec::new();
        if copy.extend_from_slice(data).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if self.queue.try_send(Datagram { from, data: copy }).is_err() {
            warn!("receive queue full, dropping datagram from {}", from);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Send-complete callback entry point
    ///
    /// Delivery status is not acted on; there is no retry.
    pub fn on_send_complete(&self, _delivered: bool) {
        self.clear_to_send.store(true, Ordering::Release);
    }

    /// No send is in flight
    pub fn clear_to_send(&self) -> bool {
        self.clear_to_send.load(Ordering::Acquire)
    }

    pub(crate) fn set_clear_to_send(&self, clear: bool) {
        self.clear_to_send.store(clear, Ordering::Release);
    }

    /// Datagrams dropped since startup
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Datagrams waiting to be processed
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn try_receive(&self) -> Option<Datagram> {
        self.queue.try_receive().ok()
    }
}
