//! Multiprotocol engine relaying channel values to the RF module over PPM
//!
//! A new frame goes out once the frame interval has passed and the previous
//! frame has completed. Long frames (many channels near full throw) simply
//! stretch the interval instead of being cut off by the next one.

use core::marker::PhantomData;

use crate::config::CoreConfig;
use crate::hal::{PpmOutput, ProtocolEngine, TickSource};
use crate::ppm::{PpmGenerator, MAX_PPM_CHANNELS};
use crate::sync::SharedState;

/// Standard PPM frame interval
pub const PPM_FRAME_MS: u32 = 22;

/// A frame still marked in flight after this long lost its completion
pub const PPM_STALL_MS: u32 = 100;

/// Channel values start at the configured neutral period and are held there
/// until `set_channel` moves them.
pub struct PpmRelay<'a, S, P, K: ?Sized> {
    ppm: &'a S,
    ticks: &'a K,
    channels: [u16; MAX_PPM_CHANNELS],
    count: usize,
    min_pulse: u16,
    max_pulse: u16,
    last_frame: u32,
    _output: PhantomData<fn() -> P>,
}

impl<'a, S, P, K> PpmRelay<'a, S, P, K>
where
    S: SharedState<PpmGenerator<P>>,
    P: PpmOutput,
    K: TickSource + ?Sized,
{
    pub fn new(ppm: &'a S, ticks: &'a K, config: &CoreConfig) -> Self {
        Self {
            ppm,
            ticks,
            channels: [config.ppm_default_pulse; MAX_PPM_CHANNELS],
            count: config.ppm_channels.min(MAX_PPM_CHANNELS),
            min_pulse: config.ppm_min_pulse,
            max_pulse: config.ppm_max_pulse,
            last_frame: 0,
            _output: PhantomData,
        }
    }

    /// Update one channel, clamped to the configured pulse range
    pub fn set_channel(&mut self, index: usize, value: u16) {
        if let Some(channel) = self.channels[..self.count].get_mut(index) {
            *channel = value.clamp(self.min_pulse, self.max_pulse);
        }
    }

    pub fn channels(&self) -> &[u16] {
        &self.channels[..self.count]
    }
}

impl<S, P, K> ProtocolEngine for PpmRelay<'_, S, P, K>
where
    S: SharedState<PpmGenerator<P>>,
    P: PpmOutput,
    K: TickSource + ?Sized,
{
    fn setup(&mut self) {
        self.last_frame = self.ticks.now().wrapping_sub(PPM_FRAME_MS);
        #[cfg(feature = "defmt")]
        defmt::info!("PPM relay: {} channels", self.count);
    }

    fn tick(&mut self) {
        let now = self.ticks.now();
        let elapsed = now.wrapping_sub(self.last_frame);
        if elapsed < PPM_FRAME_MS {
            return;
        }

        let frame = &self.channels[..self.count];
        let sent = self.ppm.with_mut(|ppm| {
            if ppm.is_transmitting() && elapsed < PPM_STALL_MS {
                return Ok(false);
            }
            ppm.send_frame(frame).map(|()| true)
        });

        match sent {
            Ok(true) => self.last_frame = now,
            Ok(false) => {}
            Err(_e) => {
                self.last_frame = now;
                #[cfg(feature = "defmt")]
                defmt::warn!("PPM frame rejected: {}", _e);
            }
        }
    }
}
