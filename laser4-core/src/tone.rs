//! Tone and melody generator
//!
//! Notes are converted into (period, pulses) pairs up front. The buzzer's
//! transfer engine then repeats `period` into the timer reload register
//! `pulses` times and raises transfer-complete, at which point
//! [`ToneGenerator::on_transfer_complete`] chains the next pair or stops.

use heapless::Vec;

use crate::hal::{CoreError, TickSource, ToneOutput};
use crate::sync::SharedState;
use crate::tick::wait_until;
use crate::types::{Note, Tone, ToneState};

/// Longest melody accepted, excluding the terminator
pub const MELODY_CAPACITY: usize = 16;

/// Buzzer timer clock in Hz (1 count = 1 µs)
pub const TONE_TIMER_HZ: u32 = 1_000_000;

/// Reload value the buzzer timer is parked at while silent
pub const TONE_IDLE_PERIOD: u16 = 0x0FFF;

/// Power-on chime
pub const STARTUP_CHIME: [Note; 4] = [
    Note::new(1000, 200),
    Note::new(2000, 300),
    Note::new(500, 100),
    Note::END,
];

/// Convert a note into timer units for the given compare value
///
/// The pulse count is `duration_ms * 1000 / period`, clamped to
/// `1..=u16::MAX`: a note shorter than one period still sounds for a single
/// period rather than turning into the sentinel, and very long notes
/// saturate. A note with zero duration converts to the sentinel.
pub fn convert(note: Note, pulse_width: u16) -> Result<Tone, CoreError> {
    if note.is_end() {
        return Ok(Tone::SENTINEL);
    }
    if note.frequency_hz == 0 {
        return Err(CoreError::InvalidConfig);
    }

    let period = (TONE_TIMER_HZ / note.frequency_hz as u32)
        .saturating_sub(pulse_width as u32)
        .clamp(1, u16::MAX as u32);
    let pulses = (note.duration_ms as u32 * 1000 / period).clamp(1, u16::MAX as u32);

    Ok(Tone {
        period: period as u16,
        pulses: pulses as u16,
    })
}

pub struct ToneGenerator<T: ToneOutput> {
    output: T,
    melody: Vec<Tone, { MELODY_CAPACITY + 1 }>,
    cursor: usize,
    state: ToneState,
}

impl<T: ToneOutput> ToneGenerator<T> {
    pub const fn new(output: T) -> Self {
        Self {
            output,
            melody: Vec::new(),
            cursor: 0,
            state: ToneState::Idle,
        }
    }

    /// Play a single note, replacing whatever is playing
    pub fn play_tone(&mut self, note: Note) -> Result<(), CoreError> {
        let tone = convert(note, self.output.pulse_width())?;
        if tone.is_sentinel() {
            return Ok(());
        }

        let mut melody = Vec::new();
        melody.push(tone).map_err(|_| CoreError::CapacityExceeded)?;
        self.begin(melody)
    }

    /// Play notes up to the first terminator (or the end of the slice)
    ///
    /// Every note is converted before the hardware is touched, so an
    /// invalid or oversized melody leaves the current playback alone.
    pub fn play_melody(&mut self, notes: &[Note]) -> Result<(), CoreError> {
        let pulse_width = self.output.pulse_width();
        let mut melody = Vec::new();
        for note in notes.iter().take_while(|note| !note.is_end()) {
            let tone = convert(*note, pulse_width)?;
            if melody.len() == MELODY_CAPACITY {
                return Err(CoreError::CapacityExceeded);
            }
            melody.push(tone).map_err(|_| CoreError::CapacityExceeded)?;
        }

        if melody.is_empty() {
            return Ok(());
        }
        self.begin(melody)
    }

    fn begin(&mut self, mut melody: Vec<Tone, { MELODY_CAPACITY + 1 }>) -> Result<(), CoreError> {
        melody
            .push(Tone::SENTINEL)
            .map_err(|_| CoreError::CapacityExceeded)?;

        if self.state == ToneState::Playing {
            self.output.stop();
        }

        self.melody = melody;
        let first = self.melody[0];
        self.cursor = 1;
        self.state = ToneState::Playing;

        #[cfg(feature = "defmt")]
        defmt::debug!("Tone start: {} entries", self.melody.len() - 1);

        self.output.start(first.period, first.pulses);
        Ok(())
    }

    /// Buzzer transfer-complete handler
    pub fn on_transfer_complete(&mut self) {
        if self.state != ToneState::Playing {
            return;
        }

        match self.melody.get(self.cursor) {
            Some(next) if !next.is_sentinel() => {
                self.output.rearm(next.period, next.pulses);
                self.cursor += 1;
            }
            _ => {
                self.output.stop();
                self.state = ToneState::Idle;
                self.cursor = 0;

                #[cfg(feature = "defmt")]
                defmt::debug!("Tone stop");
            }
        }
    }

    /// Set the volume; applies from the next timer cycle
    pub fn set_volume(&mut self, level: u16) {
        self.output.set_pulse_width(level.saturating_sub(1));
    }

    pub fn is_playing(&self) -> bool {
        self.state == ToneState::Playing
    }

    pub fn state(&self) -> ToneState {
        self.state
    }

    /// Number of tones in the current melody, excluding the sentinel
    pub fn melody_len(&self) -> usize {
        self.melody.len().saturating_sub(1)
    }

    pub fn output(&self) -> &T {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut T {
        &mut self.output
    }
}

/// Block until playback finishes or `timeout_ms` ticks pass
pub fn wait_for_completion<S, T, K>(tone: &S, ticks: &K, timeout_ms: u32) -> Result<(), CoreError>
where
    S: SharedState<ToneGenerator<T>>,
    T: ToneOutput,
    K: TickSource + ?Sized,
{
    wait_until(ticks, timeout_ms, || !tone.with_mut(|tone| tone.is_playing()))
}
