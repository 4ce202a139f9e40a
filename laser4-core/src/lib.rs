#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # Laser4 Core
//!
//! Real-time coordination core for a dual-mode RC transmitter module
//! (multiprotocol RF transmitter / USB HID game controller).
//! Interrupt entry points are plain methods, so every state machine here runs
//! unchanged on the host for testing.

pub mod types;
pub mod hal;
pub mod sync;
pub mod tick;
pub mod mode;
pub mod swtimer;
pub mod tone;
pub mod ppm;
pub mod relay;
pub mod adc;
pub mod watchdog;
pub mod config;

#[cfg(feature = "test-utils")]
pub mod test_utils;


pub use types::*;
pub use hal::{CoreError, TickSource, ToneOutput, PpmOutput, AdcPeripheral, ProtocolEngine, HidEngine, SettingsStore};
pub use sync::SharedState;
pub use tick::{TickCounter, TickDelay, wait_until};
pub use mode::{ModeController, ModeHooks, OperatingModes, startup};
pub use swtimer::TimerPool;
pub use tone::{ToneGenerator, MELODY_CAPACITY, STARTUP_CHIME};
pub use ppm::{PpmGenerator, MAX_PPM_CHANNELS, PPM_MAX_PERIOD, PPM_PULSE_WIDTH};
pub use relay::{PpmRelay, PPM_FRAME_MS};
pub use adc::{AdcTelemetry, VREFINT_MV};
pub use watchdog::WatchdogConfig;
pub use config::CoreConfig;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration for a six-channel transmitter
pub fn default_config() -> CoreConfig {
    CoreConfig::default()
}
