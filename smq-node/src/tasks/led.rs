//! LED task - mirrors the last "Demo" state received from the host

use defmt::*;
use embassy_rp::gpio::Output;

use crate::channels::LED_CMD;

#[embassy_executor::task]
pub async fn led_task(mut led: Output<'static>) {
    loop {
        let on = LED_CMD.wait().await;
        debug!("LED {}", if on { "on" } else { "off" });
        if on {
            led.set_high();
        } else {
            led.set_low();
        }
    }
}
