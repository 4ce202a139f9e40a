//! End-to-end scenarios across the mode controller, tone generator,
//! telemetry and timer pool

use laser4_core::hal::mock::ToneOp;
use laser4_core::test_utils::fixtures;
use laser4_core::{startup, CoreError, Mode, ModeHooks, TimerPool};

use crate::Board;

#[test]
fn test_boot_into_multiprotocol() {
    let board = Board::new();
    let mut hooks = board.hooks();
    assert_eq!(board.modes.current(), Some(Mode::Starting));

    startup(&board.modes, &board.tone).unwrap();
    assert_eq!(board.modes.pending(), Some(Mode::Multiprotocol.bits()));
    assert!(board.tone_playing());

    // Boot waits for the chime before entering the main loop
    assert_eq!(board.finish_tone(), 3);
    board.modes.step(&mut hooks);

    assert_eq!(board.modes.current(), Some(Mode::Multiprotocol));
    assert_eq!(hooks.protocol.setups, 1);
    assert_eq!(hooks.hid.setups, 0);
    assert_eq!(
        board.tone_ops(),
        vec![
            ToneOp::Start { period: 1000, pulses: 200 },
            ToneOp::Rearm { period: 500, pulses: 600 },
            ToneOp::Rearm { period: 2000, pulses: 50 },
            ToneOp::Stop,
            ToneOp::Start { period: 2000, pulses: 50 },
        ]
    );
}

#[test]
fn test_switch_to_hid_and_back() {
    let board = Board::new();
    let mut hooks = board.hooks();
    startup(&board.modes, &board.tone).unwrap();
    board.finish_tone();
    board.modes.step(&mut hooks);
    board.finish_tone();

    board.modes.step(&mut hooks);
    board.modes.step(&mut hooks);
    assert_eq!(hooks.protocol.ticks, 2);

    // USB resume
    board.modes.request(Mode::Hid);
    board.modes.step(&mut hooks);
    assert_eq!(board.modes.current(), Some(Mode::Hid));
    assert_eq!(hooks.hid.setups, 1);
    assert!(!hooks.led.on);
    assert_eq!(
        board.tone_ops().last(),
        Some(&ToneOp::Start { period: 2500, pulses: 40 })
    );

    board.modes.step(&mut hooks);
    assert_eq!(hooks.hid.ticks, 1);
    assert_eq!(hooks.protocol.ticks, 2);

    // USB suspend
    board.modes.request(Mode::Multiprotocol);
    board.modes.step(&mut hooks);
    assert_eq!(board.modes.current(), Some(Mode::Multiprotocol));
    assert_eq!(hooks.protocol.setups, 2);
}

#[test]
fn test_request_burst_enters_once() {
    let board = Board::new();
    let mut hooks = board.hooks();

    board.modes.request(Mode::Hid);
    board.modes.request(Mode::Multiprotocol);
    board.modes.request(Mode::Hid);
    board.modes.step(&mut hooks);

    assert_eq!(board.modes.current(), Some(Mode::Hid));
    assert_eq!(hooks.hid.setups, 1);
    assert_eq!(hooks.protocol.setups, 0);
    assert_eq!(board.tone_ops().len(), 1);
}

#[test]
fn test_request_for_active_mode_is_ignored() {
    let board = Board::new();
    let mut hooks = board.hooks();
    board.modes.request(Mode::Multiprotocol);
    board.modes.step(&mut hooks);

    board.modes.request(Mode::Multiprotocol);
    assert_eq!(board.modes.pending(), None);
    board.modes.step(&mut hooks);
    assert_eq!(hooks.protocol.setups, 1);
    assert_eq!(hooks.protocol.ticks, 1);
}

#[test]
fn test_unknown_code_parks_the_loop() {
    let board = Board::new();
    let mut hooks = board.hooks();
    board.modes.request(Mode::Multiprotocol);
    board.modes.step(&mut hooks);

    board.modes.request_raw(0x0C);
    board.modes.step(&mut hooks);
    assert_eq!(board.modes.current(), None);
    assert_eq!(board.modes.current_bits(), 0x0C);

    board.modes.step(&mut hooks);
    assert_eq!(hooks.protocol.ticks, 0);

    // A valid request still gets out of it
    board.modes.request(Mode::Hid);
    board.modes.step(&mut hooks);
    assert_eq!(board.modes.current(), Some(Mode::Hid));
}

#[test]
fn test_confirmation_tone_cuts_running_melody() {
    let board = Board::new();
    let mut hooks = board.hooks();

    startup(&board.modes, &board.tone).unwrap();
    hooks.enter(Mode::Hid);

    assert_eq!(
        board.tone_ops(),
        vec![
            ToneOp::Start { period: 1000, pulses: 200 },
            ToneOp::Stop,
            ToneOp::Start { period: 2500, pulses: 40 },
        ]
    );
    assert_eq!(board.finish_tone(), 1);
}

#[test]
fn test_battery_telemetry_cycle() {
    let mut adc = fixtures::calibrated_adc(1500);
    assert_eq!(adc.read_battery_voltage(), Err(CoreError::NotReady));

    adc.start_battery_conversion().unwrap();
    adc.on_conversion_complete(2000);
    assert_eq!(adc.read_battery_voltage(), Ok(3200));

    // The read re-armed the next conversion
    assert!(!adc.is_ready());
    assert_eq!(adc.adc().conversions.last(), Some(&fixtures::BATTERY_CHANNEL));
    assert_eq!(adc.read_battery_voltage(), Err(CoreError::NotReady));

    adc.on_conversion_complete(2250);
    assert_eq!(adc.read_battery_voltage(), Ok(3600));
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Chore {
    Blink,
    Battery,
    Once,
}

#[test]
fn test_main_loop_timer_schedule() {
    let mut timers: TimerPool<Chore, 8> = TimerPool::new();
    timers.start(500, true, Chore::Blink).unwrap();
    timers.start(1000, true, Chore::Battery).unwrap();
    let once = timers.start(750, false, Chore::Once).unwrap();

    let mut fired = Vec::new();
    for now in (0..=2000).step_by(250) {
        timers.poll(now, |chore| fired.push((now, chore)));
    }

    assert_eq!(
        fired,
        vec![
            (500, Chore::Blink),
            (750, Chore::Once),
            (1000, Chore::Blink),
            (1000, Chore::Battery),
            (1500, Chore::Blink),
            (2000, Chore::Blink),
            (2000, Chore::Battery),
        ]
    );
    assert!(!timers.is_running(once));
    assert_eq!(timers.active(), 2);
}
