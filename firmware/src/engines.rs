//! HID engine wired into the mode controller
//!
//! The multiprotocol side is `PpmRelay` from the core crate.

use laser4_core::HidEngine;

/// HID personality
///
/// Report generation belongs to the USB class driver, which runs from its own
/// interrupt; nothing is polled here.
#[derive(Default)]
pub struct UsbHid;

impl HidEngine for UsbHid {
    fn init(&mut self) {
        #[cfg(feature = "defmt")]
        defmt::info!("HID mode active");
    }

    fn process(&mut self) {}
}
