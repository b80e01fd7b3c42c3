//! Serial link task
//!
//! Owns the SMQ serial transport. The transport's API is blocking, so the
//! task only calls into it when bytes are waiting and sleeps between
//! polls to let the other tasks run.

use core::cell::Cell;

use defmt::*;
use embassy_time::Timer;

use smq_core::serial::PollOutcome;
use smq_core::{Cursor, Handler, Origin, Registry, RegistryError, SerialTransport};
use smq_hal_rp2040::SerialPort;

use crate::channels::{HEARTBEAT_DUE, LED_CMD};
use crate::config::NODE_NAME;

/// Delay between polls of the UART
const POLL_INTERVAL_MS: u64 = 5;

/// Room for the node's subscriptions
const MAX_SUBSCRIPTIONS: usize = 4;

#[embassy_executor::task]
pub async fn link_task(port: SerialPort) {
    info!("Link task started");

    let received = Cell::new(0u32);

    let mut on_demo = |msg: &mut Cursor<'_>, _: Origin| {
        let state = msg.get_integer("state");
        let name = msg.get_string::<16>("name");
        info!("Demo: state={} name={}", state, name.as_str());
        received.set(received.get().wrapping_add(1));
        LED_CMD.signal(state != 0);
    };
    let mut on_led = |msg: &mut Cursor<'_>, _: Origin| {
        received.set(received.get().wrapping_add(1));
        LED_CMD.signal(msg.get_boolean("on"));
    };

    let mut registry = match subscriptions(&mut on_demo, &mut on_led) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Subscription table too small: {}", e);
            return;
        }
    };

    let mut link = SerialTransport::new(port);

    loop {
        match link.poll(&mut registry) {
            Ok(PollOutcome::Connected) => info!("Host connected"),
            Ok(PollOutcome::Delivered(None)) => warn!("Unreadable message from host"),
            Ok(_) => {}
            Err(e) => warn!("Serial error: {}", e),
        }

        if let Some(uptime_ms) = HEARTBEAT_DUE.try_take() {
            if link.is_ready() {
                publish_heartbeat(&mut link, uptime_ms, received.get());
            }
        }

        Timer::after_millis(POLL_INTERVAL_MS).await;
    }
}

fn subscriptions<'h>(
    on_demo: &'h mut dyn Handler,
    on_led: &'h mut dyn Handler,
) -> Result<Registry<'h, MAX_SUBSCRIPTIONS>, RegistryError> {
    Ok(Registry::builder()
        .subscribe("Demo", on_demo)?
        .subscribe("Led", on_led)?
        .build())
}

fn publish_heartbeat(link: &mut SerialTransport<SerialPort>, uptime_ms: u32, received: u32) {
    let mut msg = match link.publish("Heartbeat") {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Heartbeat not sent: {}", e);
            return;
        }
    };
    msg.put_string("node", NODE_NAME)
        .put_u32("uptime_ms", uptime_ms)
        .put_u32("received", received);
    if let Err(e) = msg.end() {
        warn!("Heartbeat not sent: {}", e);
    }
}
