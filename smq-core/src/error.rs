//! Error types shared by the transports

use smq_protocol::EncodeError;

/// Why a publish did not go out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishError {
    /// Link handshake not done, or radio not initialised
    NotReady,
    /// Previous send still in flight
    Busy,
    /// No discovered host subscribes to the topic
    NoSubscribers,
    /// Addressed host is not in the directory
    UnknownHost,
    /// Addressed host does not subscribe to the topic
    NotSubscribed,
    /// Message could not be encoded
    Encode(EncodeError),
    /// Radio driver refused the datagram
    Radio,
}

impl From<EncodeError> for PublishError {
    fn from(e: EncodeError) -> Self {
        PublishError::Encode(e)
    }
}

/// Serial link errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError<E> {
    /// UART read or write failed
    Uart(E),
    /// Subscriber announcement could not be written
    Encode(EncodeError),
}

impl<E> From<EncodeError> for SerialError<E> {
    fn from(e: EncodeError) -> Self {
        SerialError::Encode(e)
    }
}
