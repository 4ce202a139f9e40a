//! Hardware Abstraction Layer for the transmitter core
//!
//! The core never touches registers. Each component drives its peripheral
//! through one of the narrow traits below; the firmware crate implements them
//! with volatile register writes and the `mock` module implements them for
//! host tests.

/// Error types for core operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoreError {
    /// A fixed-capacity pool or buffer is full
    CapacityExceeded,
    /// No fresh measurement is available yet
    NotReady,
    /// ADC used before calibration completed
    NotCalibrated,
    /// Hardware did not complete within the allotted time
    Timeout,
    /// Invalid configuration or argument
    InvalidConfig,
    /// PPM frame does not match the configured channel count
    InvalidFrame,
}

impl core::fmt::Display for CoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CoreError::CapacityExceeded => write!(f, "Capacity exceeded"),
            CoreError::NotReady => write!(f, "Measurement not ready"),
            CoreError::NotCalibrated => write!(f, "ADC not calibrated"),
            CoreError::Timeout => write!(f, "Hardware timeout"),
            CoreError::InvalidConfig => write!(f, "Invalid configuration"),
            CoreError::InvalidFrame => write!(f, "Invalid PPM frame"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CoreError {}

/// Monotonic millisecond time base
pub trait TickSource {
    /// Current tick count. Wraps at `u32::MAX`.
    fn now(&self) -> u32;
}

impl<T: TickSource + ?Sized> TickSource for &T {
    fn now(&self) -> u32 {
        (**self).now()
    }
}

/// Buzzer timer plus its transfer engine
///
/// The timer runs at 1 MHz in down-count PWM mode. Every update event
/// requests one transfer of `period` into the reload register; the transfer
/// engine raises transfer-complete after `pulses` transfers.
pub trait ToneOutput {
    /// Write the compare register (volume pulse width)
    fn set_pulse_width(&mut self, width: u16);

    /// Current compare register value
    fn pulse_width(&self) -> u16;

    /// Arm the transfer engine and start the timer
    fn start(&mut self, period: u16, pulses: u16);

    /// Re-arm the transfer engine only (timer keeps running)
    fn rearm(&mut self, period: u16, pulses: u16);

    /// Stop the timer and force the idle output level
    fn stop(&mut self);
}

/// PPM timer plus its transfer engine
pub trait PpmOutput {
    /// Load `frame[0]` into the reload register with a forced update, arm a
    /// transfer of the whole frame into the reload register and resume the
    /// timer. `frame` must stay untouched until `on_transfer_complete`.
    fn start(&mut self, frame: &[u16]);

    /// Abort an in-flight transfer
    fn abort(&mut self);

    /// Stop the timer, holding the line at its idle level
    fn stop(&mut self);
}

/// Single ADC with an internal voltage reference channel
pub trait AdcPeripheral {
    /// Start the hardware self-calibration sequence
    fn start_calibration(&mut self);

    /// True while self-calibration is running
    fn calibration_busy(&self) -> bool;

    /// Configure the sample time (hardware encoding) for a channel
    fn set_sample_time(&mut self, channel: u8, sample_time: u8);

    /// Power the internal reference up or down
    fn enable_reference(&mut self, enable: bool);

    /// Select `channel` and trigger one conversion
    fn start_conversion(&mut self, channel: u8);

    /// End-of-conversion flag (polled only during calibration)
    fn conversion_done(&self) -> bool;

    /// Data register
    fn read(&self) -> u16;
}

/// RF protocol engine entry points
pub trait ProtocolEngine {
    /// One-time setup when entering multiprotocol mode
    fn setup(&mut self);

    /// Per-iteration work while in multiprotocol mode
    fn tick(&mut self);
}

/// HID engine entry points
pub trait HidEngine {
    /// One-time setup when entering HID mode
    fn init(&mut self);

    /// Per-iteration work while in HID mode
    fn process(&mut self);
}

/// Persistent settings collaborator
pub trait SettingsStore {
    /// Read one 16-bit setting; `None` if absent or erased
    fn read(&self, index: usize) -> Option<u16>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use core::cell::Cell;
    use std::vec::Vec;

    /// Tick source advanced by hand, optionally stepping on every read
    #[derive(Default)]
    pub struct MockTicks {
        now: Cell<u32>,
        step: Cell<u32>,
    }

    impl MockTicks {
        pub fn new(start: u32) -> Self {
            Self {
                now: Cell::new(start),
                step: Cell::new(0),
            }
        }

        /// Every `now()` call advances time by `step` afterwards
        pub fn auto_step(start: u32, step: u32) -> Self {
            Self {
                now: Cell::new(start),
                step: Cell::new(step),
            }
        }

        pub fn advance(&self, ticks: u32) {
            self.now.set(self.now.get().wrapping_add(ticks));
        }

        pub fn set(&self, ticks: u32) {
            self.now.set(ticks);
        }
    }

    impl TickSource for MockTicks {
        fn now(&self) -> u32 {
            let now = self.now.get();
            self.now.set(now.wrapping_add(self.step.get()));
            now
        }
    }

    /// Recorded buzzer operation
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum ToneOp {
        Start { period: u16, pulses: u16 },
        Rearm { period: u16, pulses: u16 },
        Stop,
    }

    #[derive(Default)]
    pub struct MockToneOutput {
        pub pulse_width: u16,
        pub ops: Vec<ToneOp>,
    }

    impl MockToneOutput {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn running(&self) -> bool {
            !matches!(self.ops.last(), None | Some(ToneOp::Stop))
        }
    }

    impl ToneOutput for MockToneOutput {
        fn set_pulse_width(&mut self, width: u16) {
            self.pulse_width = width;
        }

        fn pulse_width(&self) -> u16 {
            self.pulse_width
        }

        fn start(&mut self, period: u16, pulses: u16) {
            self.ops.push(ToneOp::Start { period, pulses });
        }

        fn rearm(&mut self, period: u16, pulses: u16) {
            self.ops.push(ToneOp::Rearm { period, pulses });
        }

        fn stop(&mut self) {
            self.ops.push(ToneOp::Stop);
        }
    }

    #[derive(Default)]
    pub struct MockPpmOutput {
        pub frames: Vec<Vec<u16>>,
        pub aborts: usize,
        pub stops: usize,
        pub running: bool,
    }

    impl MockPpmOutput {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl PpmOutput for MockPpmOutput {
        fn start(&mut self, frame: &[u16]) {
            self.frames.push(frame.to_vec());
            self.running = true;
        }

        fn abort(&mut self) {
            self.aborts += 1;
        }

        fn stop(&mut self) {
            self.stops += 1;
            self.running = false;
        }
    }

    /// ADC model: calibration finishes after `calibration_polls` busy checks,
    /// conversions on the reference channel complete immediately with
    /// `vref_raw`.
    pub struct MockAdc {
        pub calibration_polls: Cell<u32>,
        pub calibration_code: u16,
        pub vref_channel: u8,
        pub vref_raw: u16,
        pub reference_on: bool,
        pub selected: u8,
        pub conversions: Vec<u8>,
        pub sample_times: Vec<(u8, u8)>,
        calibrating: bool,
    }

    impl MockAdc {
        pub fn new(vref_channel: u8, vref_raw: u16) -> Self {
            Self {
                calibration_polls: Cell::new(2),
                calibration_code: 0x2A,
                vref_channel,
                vref_raw,
                reference_on: false,
                selected: 0,
                conversions: Vec::new(),
                sample_times: Vec::new(),
                calibrating: false,
            }
        }

        /// Calibration never finishes
        pub fn stuck(vref_channel: u8) -> Self {
            let adc = Self::new(vref_channel, 1500);
            adc.calibration_polls.set(u32::MAX);
            adc
        }
    }

    impl AdcPeripheral for MockAdc {
        fn start_calibration(&mut self) {
            self.calibrating = true;
        }

        fn calibration_busy(&self) -> bool {
            if !self.calibrating {
                return false;
            }
            let left = self.calibration_polls.get();
            if left == 0 {
                return false;
            }
            if left != u32::MAX {
                self.calibration_polls.set(left - 1);
            }
            true
        }

        fn set_sample_time(&mut self, channel: u8, sample_time: u8) {
            self.sample_times.push((channel, sample_time));
        }

        fn enable_reference(&mut self, enable: bool) {
            self.reference_on = enable;
        }

        fn start_conversion(&mut self, channel: u8) {
            self.selected = channel;
            self.conversions.push(channel);
        }

        fn conversion_done(&self) -> bool {
            true
        }

        fn read(&self) -> u16 {
            if self.calibrating && self.conversions.is_empty() {
                self.calibration_code
            } else if self.selected == self.vref_channel {
                self.vref_raw
            } else {
                0
            }
        }
    }

    /// Engine that counts its calls
    #[derive(Default, Debug)]
    pub struct CountingEngine {
        pub setups: usize,
        pub ticks: usize,
    }

    impl ProtocolEngine for CountingEngine {
        fn setup(&mut self) {
            self.setups += 1;
        }

        fn tick(&mut self) {
            self.ticks += 1;
        }
    }

    impl HidEngine for CountingEngine {
        fn init(&mut self) {
            self.setups += 1;
        }

        fn process(&mut self) {
            self.ticks += 1;
        }
    }

    /// Status LED stand-in
    #[derive(Default, Debug)]
    pub struct MockLed {
        pub on: bool,
    }

    impl embedded_hal::digital::ErrorType for MockLed {
        type Error = core::convert::Infallible;
    }

    impl embedded_hal::digital::OutputPin for MockLed {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.on = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.on = true;
            Ok(())
        }
    }

    /// Settings backed by a fixed table
    #[derive(Default)]
    pub struct MockSettings {
        pub values: Vec<(usize, u16)>,
    }

    impl MockSettings {
        pub fn with(values: &[(usize, u16)]) -> Self {
            Self {
                values: values.to_vec(),
            }
        }
    }

    impl SettingsStore for MockSettings {
        fn read(&self, index: usize) -> Option<u16> {
            self.values
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, v)| *v)
        }
    }
}
