//! Inter-task communication channels

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Time to publish a heartbeat; carries uptime in milliseconds
pub static HEARTBEAT_DUE: Signal<CriticalSectionRawMutex, u32> = Signal::new();

/// LED state requested by the host
pub static LED_CMD: Signal<CriticalSectionRawMutex, bool> = Signal::new();
