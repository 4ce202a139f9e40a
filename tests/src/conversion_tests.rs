//! Note-to-timer conversion tables

use laser4_core::tone::convert;
use laser4_core::{CoreError, Note, Tone};
use rstest::rstest;

#[rstest]
#[case::chime_first(1000, 200, 0, 1000, 200)]
#[case::chime_second(2000, 300, 0, 500, 600)]
#[case::chime_third(500, 100, 0, 2000, 50)]
#[case::multiprotocol_confirm(500, 100, 9, 1991, 50)]
#[case::hid_confirm(400, 100, 0, 2500, 40)]
#[case::compare_shortens_period(1000, 200, 9, 991, 201)]
#[case::period_clamped(1, 10, 0, 65535, 1)]
#[case::pulses_clamped(65535, 1000, 0, 15, 65535)]
#[case::short_note_keeps_one_pulse(100, 1, 0, 10000, 1)]
fn test_convert_table(
    #[case] frequency_hz: u16,
    #[case] duration_ms: u16,
    #[case] pulse_width: u16,
    #[case] period: u16,
    #[case] pulses: u16,
) {
    let tone = convert(Note::new(frequency_hz, duration_ms), pulse_width).unwrap();
    assert_eq!(tone, Tone { period, pulses });
    assert!(!tone.is_sentinel());
}

#[rstest]
#[case::end_marker(Note::END)]
#[case::zero_duration(Note::new(1000, 0))]
fn test_terminators_convert_to_sentinel(#[case] note: Note) {
    assert_eq!(convert(note, 0), Ok(Tone::SENTINEL));
}

#[test]
fn test_zero_frequency_rejected() {
    assert_eq!(convert(Note::new(0, 100), 0), Err(CoreError::InvalidConfig));
}

#[rstest]
#[case(1000, 200)]
#[case(2000, 300)]
#[case(500, 100)]
#[case(440, 250)]
fn test_length_within_one_period(#[case] frequency_hz: u16, #[case] duration_ms: u16) {
    let tone = convert(Note::new(frequency_hz, duration_ms), 0).unwrap();
    let wanted = duration_ms as u32 * 1000;
    assert!(tone.length() <= wanted);
    assert!(wanted - tone.length() < tone.period as u32);
}
