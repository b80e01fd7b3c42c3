//! SMQ example node
//!
//! Connects an RP2040 board to a host over UART0 and exchanges SMQ
//! messages with it: the host drives the on-board LED through the
//! "Demo" topic and the node publishes a periodic "Heartbeat".

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Uart};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use smq_core::config::SerialConfig;
use smq_hal_rp2040::{embassy_config, SerialPort};

mod channels;
mod config;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 512]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("SMQ node '{}' starting...", config::NODE_NAME);

    let p = embassy_rp::init(Default::default());

    let serial_config = SerialConfig {
        baudrate: config::BAUD_RATE,
    };
    let uart_config = embassy_config(&serial_config.uart_config());

    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 512]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    let port = SerialPort::new(tx, rx);

    info!("UART0 at {} baud", config::BAUD_RATE);

    // Pico on-board LED
    let led = Output::new(p.PIN_25, Level::Low);

    spawner.spawn(tasks::tick_task()).unwrap();
    spawner.spawn(tasks::led_task(led)).unwrap();
    spawner.spawn(tasks::link_task(port)).unwrap();

    info!("All tasks spawned, node running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
