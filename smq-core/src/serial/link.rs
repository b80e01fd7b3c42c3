//! Serial link handshake state
//!
//! The host drives the link with single control bytes between messages.

/// Host is ready / acknowledges
pub const CTRL_ACK: u8 = b'A';
/// Host wants to deliver a message
pub const CTRL_DELIVER: u8 = b'D';
/// Node is ready to receive the delivery
pub const CTRL_READY: u8 = b'R';

/// Link states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// Waiting for the host's first ack
    #[default]
    NotReady,
    /// Handshake done, subscriptions announced
    Ready,
}

/// Control bytes as events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    Ack,
    Deliver,
    /// Anything else; ignored between messages
    Noise(u8),
}

impl LinkEvent {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            CTRL_ACK => LinkEvent::Ack,
            CTRL_DELIVER => LinkEvent::Deliver,
            other => LinkEvent::Noise(other),
        }
    }
}

impl LinkState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LinkState::Ready)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: LinkEvent) -> Self {
        match (self, event) {
            (LinkState::NotReady, LinkEvent::Ack) => LinkState::Ready,
            (state, _) => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ack_makes_ready() {
        let state = LinkState::default();
        assert_eq!(state.transition(LinkEvent::from_byte(b'D')), LinkState::NotReady);
        assert_eq!(state.transition(LinkEvent::from_byte(b'x')), LinkState::NotReady);
        assert_eq!(state.transition(LinkEvent::from_byte(b'A')), LinkState::Ready);
    }

    #[test]
    fn test_ready_is_sticky() {
        let state = LinkState::Ready;
        assert_eq!(state.transition(LinkEvent::Ack), LinkState::Ready);
        assert_eq!(state.transition(LinkEvent::Deliver), LinkState::Ready);
        assert_eq!(state.transition(LinkEvent::Noise(0)), LinkState::Ready);
    }
}
