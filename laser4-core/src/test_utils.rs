//! Test utilities for the transmitter core

#[cfg(all(feature = "test-utils", feature = "std"))]
pub mod interrupt_sim {
    //! Interrupt simulation for the blocking helpers
    //!
    //! The blocking calls poll shared state through [`SharedState`]. Wrapping
    //! a component in [`InterruptAfter`] lets a test decide on which poll the
    //! "interrupt" lands, without threads.

    use core::cell::{Cell, RefCell};

    use crate::sync::SharedState;

    /// Shared state whose handler runs just before the `n`th access
    pub struct InterruptAfter<T> {
        state: RefCell<T>,
        countdown: Cell<Option<u32>>,
        handler: fn(&mut T),
        fired: Cell<u32>,
    }

    impl<T> InterruptAfter<T> {
        pub fn new(state: T, handler: fn(&mut T)) -> Self {
            Self {
                state: RefCell::new(state),
                countdown: Cell::new(None),
                handler,
                fired: Cell::new(0),
            }
        }

        /// Fire the handler on the `accesses`th call to `with_mut` from now
        pub fn arm(&self, accesses: u32) {
            self.countdown.set(Some(accesses.max(1)));
        }

        /// Number of times the handler has run
        pub fn fired(&self) -> u32 {
            self.fired.get()
        }

        pub fn into_inner(self) -> T {
            self.state.into_inner()
        }
    }

    impl<T> SharedState<T> for InterruptAfter<T> {
        fn with_mut<F, R>(&self, f: F) -> R
        where
            F: FnOnce(&mut T) -> R,
        {
            let mut state = self.state.borrow_mut();
            if let Some(left) = self.countdown.get() {
                if left <= 1 {
                    self.countdown.set(None);
                    (self.handler)(&mut state);
                    self.fired.set(self.fired.get() + 1);
                } else {
                    self.countdown.set(Some(left - 1));
                }
            }
            f(&mut state)
        }
    }
}

#[cfg(all(feature = "test-utils", feature = "std"))]
pub mod fixtures {
    //! Ready-made components on mock peripherals

    use crate::adc::AdcTelemetry;
    use crate::hal::mock::{MockAdc, MockTicks, MockToneOutput};
    use crate::hal::ToneOutput;
    use crate::tick::TickDelay;
    use crate::tone::ToneGenerator;

    pub const BATTERY_CHANNEL: u8 = 1;
    pub const VREF_CHANNEL: u8 = 17;

    /// Telemetry already calibrated against a reference reading of `vref_raw`
    pub fn calibrated_adc(vref_raw: u16) -> AdcTelemetry<MockAdc> {
        let mut adc = AdcTelemetry::new(
            MockAdc::new(VREF_CHANNEL, vref_raw),
            BATTERY_CHANNEL,
            VREF_CHANNEL,
        );
        let ticks = MockTicks::auto_step(0, 1);
        let mut delay = TickDelay::new(&ticks);
        if let Err(e) = adc.calibrate(&mut delay, &ticks, 100) {
            panic!("mock calibration failed: {e}");
        }
        adc
    }

    pub fn tone_generator() -> ToneGenerator<MockToneOutput> {
        ToneGenerator::new(MockToneOutput::new())
    }

    /// Deliver transfer-complete until playback stops; returns the count
    pub fn drain_tone<T: ToneOutput>(tone: &mut ToneGenerator<T>) -> usize {
        let mut completions = 0;
        while tone.is_playing() {
            tone.on_transfer_complete();
            completions += 1;
        }
        completions
    }
}
