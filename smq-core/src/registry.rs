//! Topic registry and dispatch.
//!
//! The registry is built once at startup from `(topic, handler)` pairs and
//! handed to a transport. Dispatch is a linear scan in insertion order; if
//! the same topic was subscribed twice only the first handler ever runs.

use heapless::Vec;
use smq_hal::MacAddress;
use smq_protocol::{Cursor, Topic, TopicId};

use crate::fmt::debug;

/// Where an inbound message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Origin {
    /// The host on the serial link
    Serial,
    /// A mesh peer, by radio address
    Mesh(MacAddress),
}

/// Receives messages for one topic
pub trait Handler {
    /// Read what you need from `msg`; unread fields are skipped afterwards
    fn handle(&mut self, msg: &mut Cursor<'_>, origin: Origin);
}

impl<F> Handler for F
where
    F: FnMut(&mut Cursor<'_>, Origin),
{
    fn handle(&mut self, msg: &mut Cursor<'_>, origin: Origin) {
        self(msg, origin)
    }
}

/// Registry errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// More subscriptions than the registry capacity
    Full,
}

/// A handler bound to a topic
pub struct Subscription<'h> {
    topic: TopicId,
    handler: &'h mut dyn Handler,
}

impl Subscription<'_> {
    pub fn topic(&self) -> TopicId {
        self.topic
    }
}

/// Collects subscriptions before the registry is handed out
pub struct RegistryBuilder<'h, const N: usize> {
    subs: Vec<Subscription<'h>, N>,
}

impl<'h, const N: usize> RegistryBuilder<'h, N> {
    /// Subscribe `handler` to a topic, by name or by id
    pub fn subscribe<'n>(
        mut self,
        topic: impl Into<Topic<'n>>,
        handler: &'h mut dyn Handler,
    ) -> Result<Self, RegistryError> {
        let topic = topic.into().id();
        self.subs
            .push(Subscription { topic, handler })
            .map_err(|_| RegistryError::Full)?;
        Ok(self)
    }

    pub fn build(self) -> Registry<'h, N> {
        Registry { subs: self.subs }
    }
}

/// Iterator over subscribed topic ids, see [`Registry::topics`]
pub type Topics<'a, 'h> =
    core::iter::Map<core::slice::Iter<'a, Subscription<'h>>, fn(&Subscription<'h>) -> TopicId>;

/// Local subscriptions, at most `N`
pub struct Registry<'h, const N: usize> {
    subs: Vec<Subscription<'h>, N>,
}

impl<'h, const N: usize> Registry<'h, N> {
    pub fn builder() -> RegistryBuilder<'h, N> {
        RegistryBuilder { subs: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Subscribed topics in registration order
    pub fn topics(&self) -> Topics<'_, 'h> {
        self.subs
            .iter()
            .map(Subscription::topic as fn(&Subscription<'h>) -> TopicId)
    }

    pub fn contains(&self, topic: TopicId) -> bool {
        self.topics().any(|t| t == topic)
    }

    /// Hand `msg` to the first subscriber of `topic`
    ///
    /// The cursor is always left at the end of the message, whether a
    /// handler ran or not. Returns whether one ran.
    pub fn dispatch(&mut self, topic: TopicId, msg: &mut Cursor<'_>, origin: Origin) -> bool {
        let handled = match self.subs.iter_mut().find(|s| s.topic == topic) {
            Some(sub) => {
                sub.handler.handle(msg, origin);
                true
            }
            None => {
                debug!("no subscriber for topic {}", topic);
                false
            }
        };
        msg.end();
        handled
    }

    /// Read the topic header from `msg`, then dispatch the rest
    pub fn dispatch_message(&mut self, msg: &mut Cursor<'_>, origin: Origin) -> Option<TopicId> {
        match msg.read_topic() {
            Some(topic) => {
                self.dispatch(topic, msg, origin);
                Some(topic)
            }
            None => {
                msg.end();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use smq_protocol::{FrameWriter, KeyStyle, SendBuffer, SliceSource};

    fn message(topic: &str, value: i32) -> SendBuffer<64> {
        let mut buf = SendBuffer::new();
        let mut w = FrameWriter::new(&mut buf, KeyStyle::Inline);
        w.topic(Topic::Name(topic))
            .put_int("value", value)
            .put_int("ignored", 1);
        w.finish().unwrap();
        buf
    }

    #[test]
    fn test_dispatch_to_matching_topic_only() {
        let demo = Cell::new(0);
        let other = Cell::new(0);
        let mut on_demo = |msg: &mut Cursor<'_>, _: Origin| demo.set(msg.get_i32("value"));
        let mut on_other = |_: &mut Cursor<'_>, _: Origin| other.set(other.get() + 1);

        let mut registry = Registry::<4>::builder()
            .subscribe("Other", &mut on_other)
            .unwrap()
            .subscribe("Demo", &mut on_demo)
            .unwrap()
            .build();

        let buf = message("Demo", 42);
        let mut src = SliceSource::new(buf.as_slice());
        let mut msg = Cursor::new(&mut src);
        let topic = registry.dispatch_message(&mut msg, Origin::Serial);

        assert_eq!(topic, Some(TopicId::from_name("Demo")));
        assert!(msg.is_end());
        drop(registry);
        assert_eq!(demo.get(), 42);
        assert_eq!(other.get(), 0);
    }

    #[test]
    fn test_first_registered_wins() {
        let first = Cell::new(0);
        let second = Cell::new(0);
        let mut a = |_: &mut Cursor<'_>, _: Origin| first.set(first.get() + 1);
        let mut b = |_: &mut Cursor<'_>, _: Origin| second.set(second.get() + 1);

        let mut registry = Registry::<2>::builder()
            .subscribe("Demo", &mut a)
            .unwrap()
            .subscribe(TopicId::from_name("Demo"), &mut b)
            .unwrap()
            .build();

        for _ in 0..3 {
            let buf = message("Demo", 1);
            let mut src = SliceSource::new(buf.as_slice());
            let mut msg = Cursor::new(&mut src);
            registry.dispatch_message(&mut msg, Origin::Serial);
        }
        drop(registry);
        assert_eq!(first.get(), 3);
        assert_eq!(second.get(), 0);
    }

    #[test]
    fn test_unknown_topic_is_drained() {
        let mut registry = Registry::<1>::builder().build();
        let buf = message("Nobody", 5);
        let mut src = SliceSource::new(buf.as_slice());
        let mut msg = Cursor::new(&mut src);

        assert!(!registry.dispatch(TopicId::from_name("Nobody"), &mut msg, Origin::Serial));
        assert!(msg.is_end());
    }

    #[test]
    fn test_capacity() {
        let mut a = |_: &mut Cursor<'_>, _: Origin| {};
        let mut b = |_: &mut Cursor<'_>, _: Origin| {};
        let result = Registry::<1>::builder()
            .subscribe("a", &mut a)
            .unwrap()
            .subscribe("b", &mut b);
        assert_eq!(result.err(), Some(RegistryError::Full));
    }

    #[test]
    fn test_topics_in_order() {
        let mut a = |_: &mut Cursor<'_>, _: Origin| {};
        let mut b = |_: &mut Cursor<'_>, _: Origin| {};
        let registry = Registry::<4>::builder()
            .subscribe("b", &mut b)
            .unwrap()
            .subscribe("a", &mut a)
            .unwrap()
            .build();
        let mut topics = registry.topics();
        assert_eq!(topics.next(), Some(TopicId::from_name("b")));
        assert_eq!(topics.next(), Some(TopicId::from_name("a")));
        assert_eq!(topics.next(), None);
        assert!(registry.contains(TopicId::from_name("a")));
        assert!(!registry.contains(TopicId::from_name("c")));
        assert_eq!(registry.len(), 2);
    }
}
