//! UART binding
//!
//! RP2040 has two UART peripherals (UART0 and UART1). The serial
//! transport runs on the interrupt-driven buffered driver; this module
//! adapts its `embedded-io` halves to the blocking [`smq_hal`] traits.

use embassy_rp::uart::{self, BufferedUartRx, BufferedUartTx};
use embedded_io::{Read, ReadReady, Write};
use smq_hal::{UartConfig, UartRx, UartTx};
use smq_hal::uart::{DataBits, Parity, StopBits};

/// UART peripheral identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartId {
    Uart0,
    Uart1,
}

/// Determine which UART can use a given GPIO pin
pub fn gpio_to_uart(gpio: u8) -> Option<UartId> {
    // UART0: GPIO 0/1, 12/13, 16/17, 28/29
    // UART1: GPIO 4/5, 8/9, 20/21, 24/25
    match gpio {
        0 | 1 | 12 | 13 | 16 | 17 | 28 | 29 => Some(UartId::Uart0),
        4 | 5 | 8 | 9 | 20 | 21 | 24 | 25 => Some(UartId::Uart1),
        _ => None,
    }
}

/// Translate a board-agnostic config into the embassy-rp one
pub fn embassy_config(config: &UartConfig) -> uart::Config {
    let mut out = uart::Config::default();
    out.baudrate = config.baudrate;
    out.data_bits = match config.data_bits {
        DataBits::Seven => uart::DataBits::DataBits7,
        DataBits::Eight => uart::DataBits::DataBits8,
    };
    out.parity = match config.parity {
        Parity::None => uart::Parity::ParityNone,
        Parity::Even => uart::Parity::ParityEven,
        Parity::Odd => uart::Parity::ParityOdd,
    };
    out.stop_bits = match config.stop_bits {
        StopBits::One => uart::StopBits::STOP1,
        StopBits::Two => uart::StopBits::STOP2,
    };
    out
}

/// Error from the serial port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// Receive overrun; bytes were lost
    Overrun,
    /// Framing error
    Framing,
    /// Parity error
    Parity,
    /// Break condition
    Break,
    /// Other error
    Other,
}

impl From<uart::Error> for SerialError {
    fn from(e: uart::Error) -> Self {
        match e {
            uart::Error::Overrun => SerialError::Overrun,
            uart::Error::Framing => SerialError::Framing,
            uart::Error::Parity => SerialError::Parity,
            uart::Error::Break => SerialError::Break,
            #[allow(unreachable_patterns)]
            _ => SerialError::Other,
        }
    }
}

/// The buffered UART halves as an SMQ serial port
pub struct SerialPort {
    tx: BufferedUartTx,
    rx: BufferedUartRx,
}

impl SerialPort {
    /// Wrap the halves returned by `BufferedUart::split`
    pub fn new(tx: BufferedUartTx, rx: BufferedUartRx) -> Self {
        Self { tx, rx }
    }

    pub fn into_halves(self) -> (BufferedUartTx, BufferedUartRx) {
        (self.tx, self.rx)
    }
}

impl UartTx for SerialPort {
    type Error = SerialError;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), SerialError> {
        Ok(self.tx.write_all(data)?)
    }

    fn flush(&mut self) -> Result<(), SerialError> {
        Ok(Write::flush(&mut self.tx)?)
    }
}

impl UartRx for SerialPort {
    type Error = SerialError;

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        Ok(self.rx.read(buf)?)
    }

    // The buffered driver does not expose its fill level; one byte is all
    // the transport needs to know a read will not block
    fn bytes_available(&mut self) -> usize {
        match self.rx.read_ready() {
            Ok(true) => 1,
            _ => 0,
        }
    }
}
