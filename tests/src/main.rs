// Host walk-through of the boot sequence and a mode round trip

use laser4_core::hal::mock::ToneOp;
use laser4_core::test_utils::fixtures;
use laser4_core::{startup, Mode};
use laser4_tests::Board;

fn main() {
    println!("🧪 Laser4+ core host walk-through");

    // Test 1: Boot
    test_boot_sequence();

    // Test 2: Telemetry
    test_battery_reading();

    println!("✅ All walk-through checks passed!");
    println!();
    println!("📝 Run the full suite with: cargo test");
}

/// Power-on, startup chime, first entry into multiprotocol mode, then HID
fn test_boot_sequence() {
    println!("🔧 Boot sequence...");

    let board = Board::new();
    let mut hooks = board.hooks();
    assert_eq!(board.modes.current(), Some(Mode::Starting));

    if let Err(e) = startup(&board.modes, &board.tone) {
        panic!("startup rejected: {e}");
    }
    let completions = board.finish_tone();
    println!("  chime finished after {completions} transfer completions");

    board.modes.step(&mut hooks);
    assert_eq!(board.modes.current(), Some(Mode::Multiprotocol));
    assert_eq!(hooks.protocol.setups, 1);
    board.finish_tone();

    board.modes.request(Mode::Hid);
    board.modes.step(&mut hooks);
    assert_eq!(board.modes.current(), Some(Mode::Hid));
    assert_eq!(
        board.tone_ops().last(),
        Some(&ToneOp::Start { period: 2500, pulses: 40 })
    );

    println!("  ✅ Starting -> Multiprotocol -> Hid");
}

fn test_battery_reading() {
    println!("🔋 Battery telemetry...");

    let mut adc = fixtures::calibrated_adc(1500);
    println!("  resolution {:?} mV/LSB", adc.resolution());

    if let Err(e) = adc.start_battery_conversion() {
        panic!("conversion not started: {e}");
    }
    adc.on_conversion_complete(2000);
    assert_eq!(adc.read_battery_voltage(), Ok(3200));

    println!("  ✅ 2000 LSB reads as 3200 mV");
}
