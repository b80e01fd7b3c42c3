//! Heartbeat timing
//!
//! The serial link task polls on its own short timer; this task only
//! decides when a heartbeat is due.

use defmt::*;
use embassy_time::{Duration, Instant, Ticker};

use crate::channels::HEARTBEAT_DUE;
use crate::config::HEARTBEAT_PERIOD_MS;

/// Tick task - signals a due heartbeat with the current uptime
#[embassy_executor::task]
pub async fn tick_task() {
    info!("Tick task started, heartbeat every {} ms", HEARTBEAT_PERIOD_MS);

    let mut ticker = Ticker::every(Duration::from_millis(HEARTBEAT_PERIOD_MS as u64));
    let start = Instant::now();

    loop {
        ticker.next().await;
        HEARTBEAT_DUE.signal(start.elapsed().as_millis() as u32);
    }
}
