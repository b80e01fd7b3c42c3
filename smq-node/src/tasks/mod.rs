//! Embassy async tasks
//!
//! Each task runs independently and communicates via signals.

pub mod led;
pub mod link;
pub mod tick;

pub use led::led_task;
pub use link::link_task;
pub use tick::tick_task;
