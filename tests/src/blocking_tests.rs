//! Blocking helpers against simulated interrupts

use laser4_core::adc::battery_voltage_blocking;
use laser4_core::hal::mock::{MockAdc, MockTicks, MockToneOutput};
use laser4_core::test_utils::fixtures;
use laser4_core::test_utils::interrupt_sim::InterruptAfter;
use laser4_core::tone::wait_for_completion;
use laser4_core::{AdcTelemetry, CoreError, Note, ToneGenerator};

fn tone_complete(tone: &mut ToneGenerator<MockToneOutput>) {
    tone.on_transfer_complete();
}

fn battery_sample(adc: &mut AdcTelemetry<MockAdc>) {
    adc.on_conversion_complete(2000);
}

#[test]
fn test_wait_for_tone_completion() {
    let mut tone = fixtures::tone_generator();
    tone.play_tone(Note::new(1000, 10)).unwrap();

    let shared = InterruptAfter::new(tone, tone_complete);
    shared.arm(3);
    let ticks = MockTicks::auto_step(0, 1);

    assert_eq!(wait_for_completion(&shared, &ticks, 100), Ok(()));
    assert_eq!(shared.fired(), 1);
    assert!(!shared.into_inner().is_playing());
}

#[test]
fn test_wait_for_tone_times_out() {
    let mut tone = fixtures::tone_generator();
    tone.play_tone(Note::new(1000, 10)).unwrap();

    let shared = InterruptAfter::new(tone, tone_complete);
    let ticks = MockTicks::auto_step(0, 1);

    assert_eq!(wait_for_completion(&shared, &ticks, 50), Err(CoreError::Timeout));
    assert!(shared.into_inner().is_playing());
}

#[test]
fn test_wait_when_idle_returns_at_once() {
    let shared = InterruptAfter::new(fixtures::tone_generator(), tone_complete);
    let ticks = MockTicks::new(0);

    assert_eq!(wait_for_completion(&shared, &ticks, 0), Ok(()));
    assert_eq!(shared.fired(), 0);
}

#[test]
fn test_completion_during_last_clock_read() {
    let mut tone = fixtures::tone_generator();
    tone.play_tone(Note::new(1000, 10)).unwrap();

    // Timeout of 1 tick: one check, one clock read past the deadline, then
    // the final look is the access the interrupt lands on
    let shared = InterruptAfter::new(tone, tone_complete);
    shared.arm(2);
    let ticks = MockTicks::auto_step(0, 1);

    assert_eq!(wait_for_completion(&shared, &ticks, 1), Ok(()));
}

#[test]
fn test_blocking_battery_read() {
    let shared = InterruptAfter::new(fixtures::calibrated_adc(1500), battery_sample);
    shared.arm(2);
    let ticks = MockTicks::auto_step(0, 1);

    assert_eq!(battery_voltage_blocking(&shared, &ticks, 10), Ok(3200));

    let adc = shared.into_inner();
    assert_eq!(adc.last_raw(), 2000);
    assert_eq!(adc.adc().conversions.last(), Some(&fixtures::BATTERY_CHANNEL));
}

#[test]
fn test_blocking_battery_read_times_out() {
    let shared = InterruptAfter::new(fixtures::calibrated_adc(1500), battery_sample);
    let ticks = MockTicks::auto_step(0, 1);

    assert_eq!(battery_voltage_blocking(&shared, &ticks, 10), Err(CoreError::Timeout));
    assert_eq!(shared.fired(), 0);
}

#[test]
fn test_blocking_battery_read_needs_calibration() {
    let adc = AdcTelemetry::new(
        MockAdc::new(fixtures::VREF_CHANNEL, 1500),
        fixtures::BATTERY_CHANNEL,
        fixtures::VREF_CHANNEL,
    );
    let shared = InterruptAfter::new(adc, battery_sample);
    let ticks = MockTicks::auto_step(0, 1);

    assert_eq!(
        battery_voltage_blocking(&shared, &ticks, 10),
        Err(CoreError::NotCalibrated)
    );
    assert!(shared.into_inner().adc().conversions.is_empty());
}
