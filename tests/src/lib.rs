//! Host-side integration harness for the Laser4+ core
//!
//! [`Board`] wires the core components onto mock peripherals the way the
//! firmware wires them onto the STM32: one shared mode word, the tone
//! generator behind a critical-section mutex, and a hand-driven tick source.

use core::cell::RefCell;

use critical_section::Mutex;
use laser4_core::hal::mock::{CountingEngine, MockLed, MockTicks, MockToneOutput, ToneOp};
use laser4_core::test_utils::fixtures;
use laser4_core::{ModeController, OperatingModes, SharedState, ToneGenerator};

#[cfg(test)]
mod blocking_tests;
#[cfg(test)]
mod conversion_tests;
#[cfg(test)]
mod property_tests;
#[cfg(test)]
mod scenario_tests;

pub type SharedTone = Mutex<RefCell<ToneGenerator<MockToneOutput>>>;

/// Mode hooks on counting engines and a mock LED
pub type BoardModes<'a> =
    OperatingModes<'a, CountingEngine, CountingEngine, MockLed, SharedTone, MockToneOutput>;

pub struct Board {
    pub modes: ModeController,
    pub tone: SharedTone,
    pub ticks: MockTicks,
}

impl Board {
    pub fn new() -> Self {
        Self {
            modes: ModeController::new(),
            tone: Mutex::new(RefCell::new(fixtures::tone_generator())),
            ticks: MockTicks::new(0),
        }
    }

    /// Fresh mode hooks; the LED starts lit like after reset
    pub fn hooks(&self) -> BoardModes<'_> {
        OperatingModes::new(
            CountingEngine::default(),
            CountingEngine::default(),
            MockLed { on: true },
            &self.tone,
        )
    }

    /// Everything the buzzer has been told so far
    pub fn tone_ops(&self) -> Vec<ToneOp> {
        self.tone.with_mut(|tone| tone.output().ops.clone())
    }

    pub fn tone_playing(&self) -> bool {
        self.tone.with_mut(|tone| tone.is_playing())
    }

    /// Run the buzzer interrupt until playback ends
    pub fn finish_tone(&self) -> usize {
        self.tone.with_mut(fixtures::drain_tone)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
