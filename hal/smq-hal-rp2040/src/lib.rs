//! RP2040 bindings for the SMQ hardware traits
//!
//! - [`SerialPort`] - the buffered UART as an `smq_hal` serial port
//! - UART pin and config helpers

#![no_std]

pub mod uart;

pub use uart::{embassy_config, gpio_to_uart, SerialError, SerialPort, UartId};
