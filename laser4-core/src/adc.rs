//! ADC calibration and battery telemetry
//!
//! Calibration runs once at boot: hardware self-calibration, then one
//! conversion of the internal reference to find the millivolts per LSB. After
//! that, conversions are started from the foreground and finished by the
//! end-of-conversion interrupt through [`AdcTelemetry::on_conversion_complete`].

use embedded_hal::delay::DelayNs;

use crate::config::CoreConfig;
use crate::hal::{AdcPeripheral, CoreError, TickSource};
use crate::sync::SharedState;
use crate::tick::wait_until;
use crate::types::{AdcState, Completion};

/// Internal reference voltage in millivolts
pub const VREFINT_MV: u32 = 1200;

/// Sample time code for the reference channel (13.5 cycles)
pub const VREF_SAMPLE_TIME: u8 = 2;

/// Reference wake-up settle time
pub const VREF_SETTLE_MS: u32 = 5;

/// ADC power-up settle time
pub const ADC_POWER_UP_MS: u32 = 20;

pub struct AdcTelemetry<A: AdcPeripheral> {
    adc: A,
    battery_channel: u8,
    vref_channel: u8,
    calibration_code: u16,
    /// Millivolts per LSB, known once calibrated
    resolution: Option<f32>,
    divider_ratio: f32,
    last_raw: u16,
    battery_mv: u32,
    ready: bool,
    completion: Option<Completion>,
    state: AdcState,
}

impl<A: AdcPeripheral> AdcTelemetry<A> {
    pub const fn new(adc: A, battery_channel: u8, vref_channel: u8) -> Self {
        Self {
            adc,
            battery_channel,
            vref_channel,
            calibration_code: 0,
            resolution: None,
            divider_ratio: 0.5,
            last_raw: 0,
            battery_mv: 0,
            ready: false,
            completion: None,
            state: AdcState::Uncalibrated,
        }
    }

    pub fn with_config(
        adc: A,
        battery_channel: u8,
        vref_channel: u8,
        config: &CoreConfig,
    ) -> Result<Self, CoreError> {
        let mut telemetry = Self::new(adc, battery_channel, vref_channel);
        telemetry.set_divider_ratio(config.divider_ratio)?;
        Ok(telemetry)
    }

    /// Divider ratio R2 / (R1 + R2), in `(0, 1]`
    pub fn set_divider_ratio(&mut self, ratio: f32) -> Result<(), CoreError> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(CoreError::InvalidConfig);
        }
        self.divider_ratio = ratio;
        Ok(())
    }

    /// Self-calibrate and measure the internal reference
    ///
    /// Blocks for the calibration and one conversion, each bounded by
    /// `timeout_ms`. Run it before the telemetry is shared with the
    /// interrupt handler. Returns the resolution in millivolts per LSB.
    pub fn calibrate<D, K>(
        &mut self,
        delay: &mut D,
        ticks: &K,
        timeout_ms: u32,
    ) -> Result<f32, CoreError>
    where
        D: DelayNs,
        K: TickSource + ?Sized,
    {
        self.state = AdcState::Calibrating;
        self.resolution = None;
        self.ready = false;

        let result = self.run_calibration(delay, ticks, timeout_ms);
        self.adc.enable_reference(false);

        match result {
            Ok(resolution) => {
                self.resolution = Some(resolution);
                self.state = AdcState::Calibrated;
                #[cfg(feature = "defmt")]
                defmt::info!(
                    "ADC calibrated: code={} resolution={} mV/LSB",
                    self.calibration_code,
                    resolution
                );
                Ok(resolution)
            }
            Err(e) => {
                self.state = AdcState::Uncalibrated;
                #[cfg(feature = "defmt")]
                defmt::error!("ADC calibration failed: {}", e);
                Err(e)
            }
        }
    }

    fn run_calibration<D, K>(
        &mut self,
        delay: &mut D,
        ticks: &K,
        timeout_ms: u32,
    ) -> Result<f32, CoreError>
    where
        D: DelayNs,
        K: TickSource + ?Sized,
    {
        self.adc.start_calibration();
        let adc = &self.adc;
        wait_until(ticks, timeout_ms, || !adc.calibration_busy())?;
        self.calibration_code = self.adc.read();

        self.adc.set_sample_time(self.vref_channel, VREF_SAMPLE_TIME);
        self.adc.enable_reference(true);
        delay.delay_ms(VREF_SETTLE_MS);

        self.adc.start_conversion(self.vref_channel);
        let adc = &self.adc;
        wait_until(ticks, timeout_ms, || adc.conversion_done())?;

        let raw = self.adc.read();
        if raw == 0 {
            return Err(CoreError::NotCalibrated);
        }
        Ok(VREFINT_MV as f32 / raw as f32)
    }

    /// Trigger one conversion; the result arrives through the interrupt
    pub fn start_conversion(
        &mut self,
        channel: u8,
        completion: Option<Completion>,
    ) -> Result<(), CoreError> {
        if self.resolution.is_none() {
            return Err(CoreError::NotCalibrated);
        }
        self.ready = false;
        self.completion = completion;
        self.state = AdcState::Converting;
        self.adc.start_conversion(channel);
        Ok(())
    }

    pub fn start_battery_conversion(&mut self) -> Result<(), CoreError> {
        self.start_conversion(self.battery_channel, Some(Completion::Battery))
    }

    /// End-of-conversion handler
    pub fn on_conversion_complete(&mut self, raw: u16) {
        self.last_raw = raw;
        if let Some(Completion::Battery) = self.completion {
            self.battery_mv = self.scale(raw);
        }
        self.ready = true;
        self.state = AdcState::Calibrated;
    }

    /// Battery voltage in millivolts, re-arming the next conversion
    ///
    /// `NotReady` leaves everything untouched.
    pub fn read_battery_voltage(&mut self) -> Result<u32, CoreError> {
        if !self.ready {
            return Err(CoreError::NotReady);
        }
        let mv = self.battery_mv;
        self.start_battery_conversion()?;
        Ok(mv)
    }

    fn scale(&self, raw: u16) -> u32 {
        let resolution = self.resolution.unwrap_or(0.0);
        (raw as f32 * resolution / self.divider_ratio + 0.5) as u32
    }

    pub fn state(&self) -> AdcState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_calibrated(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn resolution(&self) -> Option<f32> {
        self.resolution
    }

    pub fn calibration_code(&self) -> u16 {
        self.calibration_code
    }

    pub fn divider_ratio(&self) -> f32 {
        self.divider_ratio
    }

    /// Raw value of the last finished conversion
    pub fn last_raw(&self) -> u16 {
        self.last_raw
    }

    /// Last computed battery voltage (may be stale)
    pub fn battery_mv(&self) -> u32 {
        self.battery_mv
    }

    pub fn adc(&self) -> &A {
        &self.adc
    }

    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }
}

/// Start a battery conversion and block until it lands
///
/// The lock is taken per check so the end-of-conversion interrupt can run.
pub fn battery_voltage_blocking<S, A, K>(
    adc: &S,
    ticks: &K,
    timeout_ms: u32,
) -> Result<u32, CoreError>
where
    S: SharedState<AdcTelemetry<A>>,
    A: AdcPeripheral,
    K: TickSource + ?Sized,
{
    adc.with_mut(|adc| adc.start_battery_conversion())?;
    wait_until(ticks, timeout_ms, || adc.with_mut(|adc| adc.is_ready()))?;
    Ok(adc.with_mut(|adc| adc.battery_mv()))
}
