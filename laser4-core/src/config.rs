//! Runtime configuration

use crate::hal::SettingsStore;
use crate::ppm::{MAX_PPM_CHANNELS, PPM_DEFAULT_CHANNELS, PPM_MAX_PERIOD};

/// Settings slot: PPM value at +100 %
pub const IDX_PPM_MAX_100: usize = 9;
/// Settings slot: PPM value at -100 %
pub const IDX_PPM_MIN_100: usize = 10;
/// Settings slot: PPM neutral value
pub const IDX_PPM_DEFAULT_VALUE: usize = 12;
/// Settings slot: PPM channel count
pub const IDX_PPM_CHANNELS: usize = 13;
/// Settings slot: battery divider ratio in permille
pub const IDX_DIVIDER_PERMILLE: usize = 14;

/// Value of an erased settings cell
const ERASED: u16 = 0xFFFF;

/// Core configuration, resolved once at boot
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoreConfig {
    /// Channels per PPM frame
    pub ppm_channels: usize,
    /// Terminator period in PPM timer counts
    pub ppm_max_period: u16,
    /// Channel period at -100 %
    pub ppm_min_pulse: u16,
    /// Channel period at +100 %
    pub ppm_max_pulse: u16,
    /// Neutral channel period
    pub ppm_default_pulse: u16,
    /// Battery divider ratio R2 / (R1 + R2)
    pub divider_ratio: f32,
    /// Buzzer volume level
    pub tone_volume: u16,
    /// Watchdog interval
    pub watchdog_ms: u32,
    pub calibration_timeout_ms: u32,
    pub tone_timeout_ms: u32,
    pub adc_timeout_ms: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            ppm_channels: PPM_DEFAULT_CHANNELS,
            ppm_max_period: PPM_MAX_PERIOD,
            ppm_min_pulse: 2000, // 1000 µs
            ppm_max_pulse: 4000, // 2000 µs
            ppm_default_pulse: 3000,
            divider_ratio: 0.5,
            tone_volume: 10,
            watchdog_ms: 3000,
            calibration_timeout_ms: 100,
            tone_timeout_ms: 2000,
            adc_timeout_ms: 10,
        }
    }
}

impl CoreConfig {
    /// Create a new configuration with validation
    pub fn new(
        ppm_channels: usize,
        ppm_min_pulse: u16,
        ppm_max_pulse: u16,
        ppm_default_pulse: u16,
        divider_ratio: f32,
    ) -> Result<Self, &'static str> {
        let config = Self {
            ppm_channels,
            ppm_min_pulse,
            ppm_max_pulse,
            ppm_default_pulse,
            divider_ratio,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.ppm_channels == 0 || self.ppm_channels > MAX_PPM_CHANNELS {
            return Err("PPM channel count out of range");
        }
        if self.ppm_min_pulse > self.ppm_default_pulse
            || self.ppm_default_pulse > self.ppm_max_pulse
        {
            return Err("PPM pulses must satisfy min <= default <= max");
        }
        if self.ppm_max_pulse > self.ppm_max_period {
            return Err("PPM max pulse exceeds the frame terminator");
        }
        if !(self.divider_ratio > 0.0 && self.divider_ratio <= 1.0) {
            return Err("Divider ratio must be in (0, 1]");
        }
        if self.watchdog_ms == 0 {
            return Err("Watchdog interval must be non-zero");
        }
        if self.calibration_timeout_ms == 0 || self.tone_timeout_ms == 0 || self.adc_timeout_ms == 0 {
            return Err("Timeouts must be non-zero");
        }
        Ok(())
    }

    /// Overlay values from persistent settings onto the defaults
    ///
    /// Absent or erased cells keep their default. If the result does not
    /// validate, the defaults are returned as a whole.
    pub fn from_settings<S: SettingsStore + ?Sized>(store: &S) -> Self {
        let read = |index| store.read(index).filter(|&v| v != ERASED);
        let mut config = Self::default();

        if let Some(v) = read(IDX_PPM_MIN_100) {
            config.ppm_min_pulse = v;
        }
        if let Some(v) = read(IDX_PPM_MAX_100) {
            config.ppm_max_pulse = v;
        }
        if let Some(v) = read(IDX_PPM_DEFAULT_VALUE) {
            config.ppm_default_pulse = v;
        }
        if let Some(v) = read(IDX_PPM_CHANNELS) {
            config.ppm_channels = v as usize;
        }
        if let Some(v) = read(IDX_DIVIDER_PERMILLE) {
            config.divider_ratio = v as f32 / 1000.0;
        }

        match config.validate() {
            Ok(()) => config,
            Err(_reason) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Stored settings rejected: {}", _reason);
                Self::default()
            }
        }
    }
}
