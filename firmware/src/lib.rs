#![no_std]

//! Firmware library for the Laser4+ STM32F103 board: register-level
//! peripheral drivers and the HID engine

pub mod engines;
pub mod stm32f103;

pub use laser4_core::*;

pub use crate::engines::UsbHid;
pub use crate::stm32f103::{Adc1, GpioOutput, Iwdg, Tim1Buzzer, Tim4Ppm};
pub use stm32f1::stm32f103::Interrupt;

/// Number of software timer slots
pub const SWTIM_NUM: usize = 8;

/// Work scheduled on the software timers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerAction {
    /// Heartbeat on the status LED while in multiprotocol mode
    BlinkLed,
    /// Collect the latest battery reading and re-arm the conversion
    PollBattery,
}

/// Status LED blink half-period
pub const BLINK_MS: u32 = 500;

/// Battery poll interval
pub const BATTERY_POLL_MS: u32 = 1000;
