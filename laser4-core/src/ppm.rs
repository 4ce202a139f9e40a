//! PPM frame generator
//!
//! A frame is the channel pulse periods followed by two terminator entries of
//! the maximum period. The first terminator produces the trailing edge of the
//! last channel; the second keeps transfer-complete from firing while that
//! edge is still being timed. On completion the timer is stopped with the
//! line at its idle level until the next frame.

use heapless::Vec;

use crate::config::CoreConfig;
use crate::hal::{CoreError, PpmOutput};
use crate::types::PpmState;

/// Most channels a frame can carry
pub const MAX_PPM_CHANNELS: usize = 16;

/// PPM timer clock in Hz (1 count = 0.5 µs)
pub const PPM_TIMER_HZ: u32 = 2_000_000;

/// Default terminator period (2.2 ms)
pub const PPM_MAX_PERIOD: u16 = 4400;

/// Separator pulse width (300 µs)
pub const PPM_PULSE_WIDTH: u16 = 600;

/// Default channel count
pub const PPM_DEFAULT_CHANNELS: usize = 6;

const TERMINATORS: usize = 2;

pub struct PpmGenerator<P: PpmOutput> {
    output: P,
    frame: Vec<u16, { MAX_PPM_CHANNELS + TERMINATORS }>,
    channels: usize,
    max_period: u16,
    state: PpmState,
}

impl<P: PpmOutput> PpmGenerator<P> {
    /// Generator with the default channel count and terminator
    pub const fn new(output: P) -> Self {
        Self {
            output,
            frame: Vec::new(),
            channels: PPM_DEFAULT_CHANNELS,
            max_period: PPM_MAX_PERIOD,
            state: PpmState::Idle,
        }
    }

    pub fn with_config(output: P, config: &CoreConfig) -> Result<Self, CoreError> {
        let mut ppm = Self::new(output);
        ppm.configure(config.ppm_channels, config.ppm_max_period)?;
        Ok(ppm)
    }

    /// Change channel count and terminator period
    pub fn configure(&mut self, channels: usize, max_period: u16) -> Result<(), CoreError> {
        if channels == 0 || channels > MAX_PPM_CHANNELS || max_period == 0 {
            return Err(CoreError::InvalidConfig);
        }
        self.channels = channels;
        self.max_period = max_period;
        Ok(())
    }

    /// Transmit one frame
    ///
    /// Channel values are copied as given; range checking is up to the
    /// caller. A frame still in flight is aborted first.
    pub fn send_frame(&mut self, channels: &[u16]) -> Result<(), CoreError> {
        if channels.len() != self.channels {
            return Err(CoreError::InvalidFrame);
        }

        if self.state == PpmState::Transmitting {
            #[cfg(feature = "defmt")]
            defmt::warn!("PPM frame still in flight, aborting");
            self.output.abort();
        }

        self.frame.clear();
        self.frame
            .extend_from_slice(channels)
            .map_err(|_| CoreError::CapacityExceeded)?;
        for _ in 0..TERMINATORS {
            self.frame
                .push(self.max_period)
                .map_err(|_| CoreError::CapacityExceeded)?;
        }

        self.state = PpmState::Transmitting;
        self.output.start(&self.frame);
        Ok(())
    }

    /// PPM transfer-complete handler
    pub fn on_transfer_complete(&mut self) {
        self.output.stop();
        self.state = PpmState::Idle;
    }

    /// Last frame handed to the hardware, terminators included
    pub fn frame(&self) -> &[u16] {
        &self.frame
    }

    pub fn is_transmitting(&self) -> bool {
        self.state == PpmState::Transmitting
    }

    pub fn state(&self) -> PpmState {
        self.state
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn max_period(&self) -> u16 {
        self.max_period
    }

    pub fn output(&self) -> &P {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut P {
        &mut self.output
    }
}
