//! Serial transport
//!
//! Binds the codec to one point-to-point byte stream. Messages are read
//! and written straight off the UART with no intermediate buffer, so the
//! handshake bytes and the end marker are what keep both sides in step.
//!
//! ```text
//!   node                      host
//!    │ ◄──────── 'A' ───────── │   link up
//!    │ ── subscribers ───────► │
//!    │ ◄──────── 'D' ───────── │   host has a message
//!    │ ───────── 'R' ────────► │
//!    │ ◄─────── message ────── │   dispatched
//!    │ ─────── message ──────► │   publish, any time once ready
//! ```

pub mod link;

use core::ops::{Deref, DerefMut};

use smq_hal::{UartRx, UartTx};
use smq_protocol::{
    ByteSource, Cursor, EncodeError, FrameWriter, KeyStyle, Sink, Topic, TopicId,
};

use crate::error::{PublishError, SerialError};
use crate::fmt::{debug, info, trace};
use crate::registry::{Origin, Registry};

pub use link::{LinkEvent, LinkState, CTRL_ACK, CTRL_DELIVER, CTRL_READY};

/// Topic of the subscriber announcement sent after the handshake
pub const SUBSCRIBERS_TOPIC: TopicId = TopicId::from_name("subscribers");

/// What a call to [`SerialTransport::poll`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollOutcome {
    /// Nothing to do
    Idle,
    /// Handshake completed and subscriptions announced
    Connected,
    /// A message was received; `None` if its header was unreadable
    Delivered(Option<TopicId>),
}

struct UartSource<'a, U> {
    uart: &'a mut U,
}

impl<U: UartRx> ByteSource for UartSource<'_, U> {
    fn next_byte(&mut self) -> Option<u8> {
        self.uart.read_byte().ok()
    }
}

/// Encoder output going straight to the UART
pub struct UartSink<'a, U> {
    uart: &'a mut U,
}

impl<U: UartTx> Sink for UartSink<'_, U> {
    fn write(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        self.uart.write_blocking(data).map_err(|_| EncodeError::Io)
    }
}

/// SMQ over a serial link to a host
pub struct SerialTransport<U> {
    uart: U,
    state: LinkState,
    send_ready: bool,
}

impl<U, E> SerialTransport<U>
where
    U: UartTx<Error = E> + UartRx<Error = E>,
{
    pub fn new(uart: U) -> Self {
        Self {
            uart,
            state: LinkState::NotReady,
            send_ready: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Host has acked since our last publish
    pub fn send_ready(&self) -> bool {
        self.send_ready
    }

    /// Give the UART back
    pub fn release(self) -> U {
        self.uart
    }

    /// Block until the host sends `'A'`, then announce our subscriptions
    pub fn wait_ready<const N: usize>(
        &mut self,
        registry: &Registry<'_, N>,
    ) -> Result<(), SerialError<E>> {
        while !self.is_ready() {
            let byte = self.uart.read_byte().map_err(SerialError::Uart)?;
            self.on_event(LinkEvent::from_byte(byte), registry)?;
        }
        Ok(())
    }

    fn on_event<const N: usize>(
        &mut self,
        event: LinkEvent,
        registry: &Registry<'_, N>,
    ) -> Result<(), SerialError<E>> {
        let next = self.state.transition(event);
        if event == LinkEvent::Ack {
            self.send_ready = true;
        }
        if next != self.state {
            self.state = next;
            self.announce(registry)?;
            info!("serial link ready, {} subscriptions", registry.len());
        }
        Ok(())
    }

    /// Send the subscriber list: count then each topic id
    ///
    /// Nothing is sent when there are no subscriptions.
    fn announce<const N: usize>(&mut self, registry: &Registry<'_, N>) -> Result<(), SerialError<E>> {
        if registry.is_empty() {
            return Ok(());
        }
        let mut writer = FrameWriter::new(UartSink { uart: &mut self.uart }, KeyStyle::Inline);
        writer
            .topic(Topic::Id(SUBSCRIBERS_TOPIC))
            .put_raw(&(registry.len() as u16).to_le_bytes());
        for topic in registry.topics() {
            writer.put_raw(&topic.raw().to_le_bytes());
        }
        writer.finish()?;
        self.uart.flush().map_err(SerialError::Uart)
    }

    /// Handle whatever control bytes are waiting, without blocking
    ///
    /// A delivery request is answered with `'R'` and the message that
    /// follows is read (blocking) and dispatched. At most one message is
    /// handled per call.
    pub fn poll<const N: usize>(
        &mut self,
        registry: &mut Registry<'_, N>,
    ) -> Result<PollOutcome, SerialError<E>> {
        while self.uart.bytes_available() > 0 {
            let byte = self.uart.read_byte().map_err(SerialError::Uart)?;
            let event = LinkEvent::from_byte(byte);
            match (self.state, event) {
                (LinkState::Ready, LinkEvent::Deliver) => {
                    self.uart
                        .write_blocking(&[CTRL_READY])
                        .map_err(SerialError::Uart)?;
                    self.uart.flush().map_err(SerialError::Uart)?;
                    return Ok(PollOutcome::Delivered(self.receive(registry)));
                }
                (LinkState::NotReady, LinkEvent::Ack) => {
                    self.on_event(event, registry)?;
                    return Ok(PollOutcome::Connected);
                }
                (_, LinkEvent::Ack) => self.send_ready = true,
                (_, event) => trace!("ignoring {} on serial link", event),
            }
        }
        Ok(PollOutcome::Idle)
    }

    fn receive<const N: usize>(&mut self, registry: &mut Registry<'_, N>) -> Option<TopicId> {
        let mut source = UartSource { uart: &mut self.uart };
        let mut msg = Cursor::new(&mut source);
        let topic = registry.dispatch_message(&mut msg, Origin::Serial);
        if msg.is_truncated() {
            debug!("serial message cut short");
        }
        topic
    }

    /// Start a message to the host
    ///
    /// Fields are written to the UART as they are added; call
    /// [`SerialSession::end`] to terminate the message.
    pub fn publish<'n>(
        &mut self,
        topic: impl Into<Topic<'n>>,
    ) -> Result<SerialSession<'_, U>, PublishError> {
        if !self.is_ready() {
            return Err(PublishError::NotReady);
        }
        self.send_ready = false;
        let mut writer = FrameWriter::new(UartSink { uart: &mut self.uart }, KeyStyle::Inline);
        writer.topic(topic.into());
        Ok(SerialSession { writer })
    }
}

/// An outgoing message on the serial link
///
/// Derefs to [`FrameWriter`] for the `put_*` calls.
pub struct SerialSession<'a, U: UartTx> {
    writer: FrameWriter<UartSink<'a, U>>,
}

impl<'a, U: UartTx> Deref for SerialSession<'a, U> {
    type Target = FrameWriter<UartSink<'a, U>>;

    fn deref(&self) -> &Self::Target {
        &self.writer
    }
}

impl<U: UartTx> DerefMut for SerialSession<'_, U> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.writer
    }
}

impl<U: UartTx> SerialSession<'_, U> {
    /// Write the end marker and flush
    pub fn end(self) -> Result<(), PublishError> {
        let sink = self.writer.finish()?;
        sink.uart.flush().map_err(|_| PublishError::Encode(EncodeError::Io))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use heapless::{Deque, Vec};
    use smq_protocol::{SendBuffer, SliceSource};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Drained;

    struct MockUart {
        rx: Deque<u8, 512>,
        tx: Vec<u8, 512>,
    }

    impl MockUart {
        fn new() -> Self {
            Self {
                rx: Deque::new(),
                tx: Vec::new(),
            }
        }

        fn feed(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.rx.push_back(b).unwrap();
            }
        }
    }

    impl UartTx for MockUart {
        type Error = Drained;

        fn write_blocking(&mut self, data: &[u8]) -> Result<(), Drained> {
            self.tx.extend_from_slice(data).map_err(|_| Drained)
        }

        fn flush(&mut self) -> Result<(), Drained> {
            Ok(())
        }
    }

    impl UartRx for MockUart {
        type Error = Drained;

        // An empty queue is an error so a test can never block forever
        fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Drained> {
            buf[0] = self.rx.pop_front().ok_or(Drained)?;
            Ok(1)
        }

        fn bytes_available(&mut self) -> usize {
            self.rx.len()
        }
    }

    fn demo_message() -> SendBuffer<128> {
        let mut buf = SendBuffer::new();
        let mut w = FrameWriter::new(&mut buf, KeyStyle::Inline);
        w.topic(Topic::Name("Demo"))
            .put_int("state", 42)
            .put_string("name", "ok")
            .put_bool("unread", true);
        w.finish().unwrap();
        buf
    }

    fn expected_announcement(topics: &[TopicId]) -> Vec<u8, 64> {
        let mut out = Vec::new();
        out.push(0x01).unwrap();
        out.extend_from_slice(&SUBSCRIBERS_TOPIC.raw().to_le_bytes()).unwrap();
        out.extend_from_slice(&(topics.len() as u16).to_le_bytes()).unwrap();
        for t in topics {
            out.extend_from_slice(&t.raw().to_le_bytes()).unwrap();
        }
        out.push(0xFF).unwrap();
        out
    }

    #[test]
    fn test_wait_ready_skips_noise_and_announces() {
        let mut on_demo = |_: &mut Cursor<'_>, _: Origin| {};
        let mut on_lights = |_: &mut Cursor<'_>, _: Origin| {};
        let registry = Registry::<4>::builder()
            .subscribe("Demo", &mut on_demo)
            .unwrap()
            .subscribe("Lights", &mut on_lights)
            .unwrap()
            .build();

        let mut uart = MockUart::new();
        uart.feed(b"xyDA");
        let mut link = SerialTransport::new(uart);
        assert_eq!(link.state(), LinkState::NotReady);

        link.wait_ready(&registry).unwrap();
        assert!(link.is_ready());
        assert!(link.send_ready());
        let expected =
            expected_announcement(&[TopicId::from_name("Demo"), TopicId::from_name("Lights")]);
        assert_eq!(link.uart.tx.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_wait_ready_reports_uart_error() {
        let registry = Registry::<1>::builder().build();
        let mut link = SerialTransport::new(MockUart::new());
        assert_eq!(link.wait_ready(&registry), Err(SerialError::Uart(Drained)));
        assert!(!link.is_ready());
    }

    #[test]
    fn test_poll_handshake_without_blocking() {
        let mut registry = Registry::<1>::builder().build();
        let mut link = SerialTransport::new(MockUart::new());

        assert_eq!(link.poll(&mut registry), Ok(PollOutcome::Idle));
        link.uart.feed(b"D?");
        assert_eq!(link.poll(&mut registry), Ok(PollOutcome::Idle));
        assert!(!link.is_ready());
        assert!(link.uart.tx.is_empty());

        link.uart.feed(b"A");
        assert_eq!(link.poll(&mut registry), Ok(PollOutcome::Connected));
        assert!(link.is_ready());
        // No subscriptions, nothing to announce
        assert!(link.uart.tx.is_empty());
    }

    #[test]
    fn test_deliver_dispatches_one_message() {
        let state = Cell::new(0);
        let mut on_demo = |msg: &mut Cursor<'_>, origin: Origin| {
            assert_eq!(origin, Origin::Serial);
            state.set(msg.get_integer("state"));
            assert_eq!(msg.get_string::<8>("name").as_str(), "ok");
        };
        let mut registry = Registry::<2>::builder()
            .subscribe("Demo", &mut on_demo)
            .unwrap()
            .build();

        let mut link = SerialTransport::new(MockUart::new());
        link.uart.feed(b"A");
        link.wait_ready(&registry).unwrap();
        link.uart.tx.clear();

        let msg = demo_message();
        link.uart.feed(b"D");
        link.uart.feed(msg.as_slice());
        link.uart.feed(b"A");

        let outcome = link.poll(&mut registry).unwrap();
        assert_eq!(outcome, PollOutcome::Delivered(Some(TopicId::from_name("Demo"))));
        assert_eq!(link.uart.tx.as_slice(), &[CTRL_READY]);
        // The trailing ack is still waiting: the message was consumed exactly
        assert_eq!(link.uart.rx.len(), 1);

        assert_eq!(link.poll(&mut registry), Ok(PollOutcome::Idle));
        assert!(link.send_ready());
        drop(registry);
        assert_eq!(state.get(), 42);
    }

    #[test]
    fn test_deliver_unknown_topic_stays_in_sync() {
        let mut registry = Registry::<1>::builder().build();
        let mut link = SerialTransport::new(MockUart::new());
        link.uart.feed(b"A");
        link.wait_ready(&registry).unwrap();

        link.uart.feed(b"D");
        link.uart.feed(demo_message().as_slice());
        link.uart.feed(b"Z");
        assert_eq!(
            link.poll(&mut registry),
            Ok(PollOutcome::Delivered(Some(TopicId::from_name("Demo"))))
        );
        assert_eq!(link.uart.rx.pop_front(), Some(b'Z'));
    }

    #[test]
    fn test_handler_that_only_finds_key_stays_in_sync() {
        let found = Cell::new(false);
        let mut on_demo = |msg: &mut Cursor<'_>, _: Origin| found.set(msg.find_key("flag"));
        let mut registry = Registry::<1>::builder()
            .subscribe("Demo", &mut on_demo)
            .unwrap()
            .build();
        let mut link = SerialTransport::new(MockUart::new());
        link.uart.feed(b"A");
        link.wait_ready(&registry).unwrap();

        let mut buf = SendBuffer::<128>::new();
        let mut w = FrameWriter::new(&mut buf, KeyStyle::Inline);
        w.topic(Topic::Name("Demo"))
            .put_u8("flag", CTRL_DELIVER)
            .put_int("x", 400);
        w.finish().unwrap();

        link.uart.feed(b"D");
        link.uart.feed(buf.as_slice());
        link.uart.feed(b"Z");
        assert_eq!(
            link.poll(&mut registry),
            Ok(PollOutcome::Delivered(Some(TopicId::from_name("Demo"))))
        );
        assert_eq!(link.uart.rx.len(), 1);
        assert_eq!(link.uart.rx.pop_front(), Some(b'Z'));
        drop(registry);
        assert!(found.get());
    }

    #[test]
    fn test_publish_requires_ready() {
        let registry = Registry::<1>::builder().build();
        let mut link = SerialTransport::new(MockUart::new());
        assert_eq!(link.publish("Demo").err(), Some(PublishError::NotReady));

        link.uart.feed(b"A");
        link.wait_ready(&registry).unwrap();
        link.uart.tx.clear();

        let mut session = link.publish("Demo").unwrap();
        session
            .put_int("state", 42)
            .put_string("name", "ok")
            .put_bool("unread", true);
        session.end().unwrap();

        assert_eq!(link.uart.tx.as_slice(), demo_message().as_slice());
        assert!(!link.send_ready());

        // The published bytes decode back on the other side
        let mut src = SliceSource::new(link.uart.tx.as_slice());
        let mut msg = Cursor::new(&mut src);
        assert_eq!(msg.read_topic(), Some(TopicId::from_name("Demo")));
        assert_eq!(msg.get_integer("state"), 42);
    }

    #[test]
    fn test_publish_reports_write_failure() {
        let registry = Registry::<1>::builder().build();
        let mut link = SerialTransport::new(MockUart::new());
        link.uart.feed(b"A");
        link.wait_ready(&registry).unwrap();
        link.uart.tx.clear();
        for _ in 0..510 {
            link.uart.tx.push(0).unwrap();
        }

        let mut session = link.publish("Demo").unwrap();
        session.put_int("state", 1);
        assert_eq!(session.end(), Err(PublishError::Encode(EncodeError::Io)));
    }
}
