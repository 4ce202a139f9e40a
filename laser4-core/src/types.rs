//! Core data types shared across components

/// Operating personality of the module
///
/// The discriminants are the 4-bit codes stored in the packed mode word.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "std", derive(Hash))]
#[repr(u8)]
pub enum Mode {
    /// Power-on state, nothing running yet
    Starting = 0,
    /// Multiprotocol RF transmitter
    Multiprotocol = 1,
    /// USB HID game controller
    Hid = 2,
    /// A mode change is queued; the target sits in the high nibble
    RequestPending = 3,
}

impl Mode {
    /// Decode a 4-bit mode code
    pub const fn from_bits(bits: u8) -> Option<Mode> {
        match bits {
            0 => Some(Mode::Starting),
            1 => Some(Mode::Multiprotocol),
            2 => Some(Mode::Hid),
            3 => Some(Mode::RequestPending),
            _ => None,
        }
    }

    /// 4-bit mode code
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// True for the modes that own the main loop
    pub const fn is_operating(self) -> bool {
        matches!(self, Mode::Multiprotocol | Mode::Hid)
    }

    /// Audible confirmation played on entering this mode
    pub const fn confirmation_tone(self) -> Option<Note> {
        match self {
            Mode::Multiprotocol => Some(Note::new(500, 100)),
            Mode::Hid => Some(Note::new(400, 100)),
            Mode::Starting | Mode::RequestPending => None,
        }
    }
}

/// A requested tone, as written by callers
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Note {
    /// Fundamental frequency in Hz
    pub frequency_hz: u16,
    /// Duration in milliseconds; zero terminates a melody
    pub duration_ms: u16,
}

impl Note {
    /// Melody terminator
    pub const END: Note = Note::new(0, 0);

    pub const fn new(frequency_hz: u16, duration_ms: u16) -> Self {
        Self {
            frequency_hz,
            duration_ms,
        }
    }

    pub const fn is_end(&self) -> bool {
        self.duration_ms == 0
    }
}

/// A converted tone, as consumed by the buzzer transfer engine
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tone {
    /// Reload value in timer units (µs)
    pub period: u16,
    /// Number of periods to play; zero is the sentinel
    pub pulses: u16,
}

impl Tone {
    /// Melody sentinel
    pub const SENTINEL: Tone = Tone {
        period: 0,
        pulses: 0,
    };

    pub const fn is_sentinel(&self) -> bool {
        self.pulses == 0
    }

    /// Total playback time in timer units
    pub const fn length(&self) -> u32 {
        self.period as u32 * self.pulses as u32
    }
}

/// Index of an allocated software timer slot
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerHandle(pub(crate) usize);

impl TimerHandle {
    /// Slot index
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Buzzer playback state
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ToneState {
    Idle,
    Playing,
}

/// PPM output state
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PpmState {
    /// Line held at idle level, ready for the next frame
    Idle,
    /// Frame transfer in flight
    Transmitting,
}

/// ADC telemetry state
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcState {
    Uncalibrated,
    Calibrating,
    /// Idle; `ready` tells whether a result is waiting
    Calibrated,
    Converting,
}

/// What to do with a finished conversion
///
/// A closed set so the interrupt path only ever runs known work.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// Scale the raw reading into battery millivolts
    Battery,
}
