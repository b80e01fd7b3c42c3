//! SMQ Hardware Abstraction Layer
//!
//! Traits implemented by chip-specific crates so the SMQ transports in
//! `smq-core` stay independent of the board they run on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  smq-core (serial + mesh transports)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  smq-hal (this crate - traits)          │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ smq-hal-      │       │ radio driver  │
//! │   rp2040      │       │ (ESP-NOW etc) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::UartTx`], [`uart::UartRx`] - Blocking serial link to a host
//! - [`radio::Radio`] - Broadcast radio with a peer list

#![no_std]
#![deny(unsafe_code)]

pub mod radio;
pub mod uart;

pub use radio::{MacAddress, PeerKey, Radio, PEER_KEY_LEN};
pub use uart::{Uart, UartConfig, UartRx, UartTx, DEFAULT_BAUD_RATE};
