//! Property-based tests

use laser4_core::hal::mock::{MockPpmOutput, ToneOp};
use laser4_core::test_utils::fixtures;
use laser4_core::{
    CoreError, Mode, ModeController, ModeHooks, Note, PpmGenerator, TimerPool, MAX_PPM_CHANNELS,
    MELODY_CAPACITY, PPM_MAX_PERIOD,
};
use proptest::prelude::*;

#[derive(Default)]
struct Recorder {
    entered: Vec<Mode>,
}

impl ModeHooks for Recorder {
    fn enter(&mut self, mode: Mode) {
        self.entered.push(mode);
    }

    fn run(&mut self, _mode: Mode) {}
}

fn operating_mode() -> impl Strategy<Value = Mode> {
    prop_oneof![Just(Mode::Multiprotocol), Just(Mode::Hid)]
}

fn playable_note() -> impl Strategy<Value = Note> {
    (1u16..=20_000, 1u16..=2_000).prop_map(|(f, d)| Note::new(f, d))
}

proptest! {
    #[test]
    fn prop_latest_request_wins(
        initial in operating_mode(),
        requests in prop::collection::vec(operating_mode(), 1..20),
    ) {
        let modes = ModeController::new();
        let mut hooks = Recorder::default();
        modes.request(initial);
        modes.step(&mut hooks);
        hooks.entered.clear();

        for target in &requests {
            modes.request(*target);
        }
        modes.step(&mut hooks);

        let last = *requests.last().unwrap();
        prop_assert_eq!(modes.current(), Some(last));
        prop_assert_eq!(modes.pending(), None);
        prop_assert!(hooks.entered.len() <= 1);
        if let Some(entered) = hooks.entered.first() {
            prop_assert_eq!(*entered, last);
        }
    }

    #[test]
    fn prop_mode_word_stays_well_formed(
        ops in prop::collection::vec(prop::option::of(any::<u8>()), 0..40),
    ) {
        let modes = ModeController::new();
        let mut hooks = Recorder::default();

        for op in ops {
            match op {
                Some(code) => modes.request_raw(code),
                None => modes.step(&mut hooks),
            }

            let raw = modes.raw();
            if raw & 0x0F == Mode::RequestPending.bits() {
                prop_assert_ne!(raw >> 4, Mode::RequestPending.bits());
            } else {
                prop_assert_eq!(raw >> 4, 0);
            }
        }
    }

    #[test]
    fn prop_one_shot_fires_once(
        duration in 1u32..500,
        steps in prop::collection::vec(1u32..100, 1..30),
    ) {
        let mut timers: TimerPool<u8, 4> = TimerPool::new();
        let handle = timers.start(duration, false, 7).unwrap();

        let mut now = 0u32;
        let mut fired = 0;
        timers.poll(now, |_| fired += 1);
        for step in &steps {
            now += step;
            timers.poll(now, |action| {
                assert_eq!(action, 7);
                fired += 1;
            });
        }

        let total: u32 = steps.iter().sum();
        prop_assert_eq!(fired, usize::from(total >= duration));
        prop_assert_eq!(timers.is_running(handle), total < duration);
    }

    #[test]
    fn prop_auto_repeat_period(duration in 1u32..50, total in 0u32..400) {
        let mut timers: TimerPool<(), 2> = TimerPool::new();
        timers.start(duration, true, ()).unwrap();

        let mut fired = 0;
        for now in 0..=total {
            fired += timers.poll(now, |_| {});
        }
        prop_assert_eq!(fired as u32, total / duration);
    }

    #[test]
    fn prop_poll_survives_counter_wrap(start in any::<u32>(), duration in 1u32..1000) {
        let mut timers: TimerPool<(), 1> = TimerPool::new();
        timers.start(duration, false, ()).unwrap();

        timers.poll(start, |_| {});
        prop_assert_eq!(timers.poll(start.wrapping_add(duration - 1), |_| {}), 0);
        prop_assert_eq!(timers.poll(start.wrapping_add(duration), |_| {}), 1);
    }

    #[test]
    fn prop_exhausted_pool_reuses_stopped_slot(victim in 0usize..8) {
        let mut timers: TimerPool<usize, 8> = TimerPool::new();
        let handles: Vec<_> = (0..8)
            .map(|i| timers.start(10, true, i).unwrap())
            .collect();

        prop_assert_eq!(timers.start(10, true, 99), Err(CoreError::CapacityExceeded));
        prop_assert_eq!(timers.active(), 8);

        timers.stop(handles[victim]);
        let reused = timers.start(10, true, 99).unwrap();
        prop_assert_eq!(reused.index(), victim);
    }

    #[test]
    fn prop_melody_plays_every_note(
        notes in prop::collection::vec(playable_note(), 1..=MELODY_CAPACITY),
    ) {
        let mut tone = fixtures::tone_generator();
        tone.play_melody(&notes).unwrap();
        prop_assert_eq!(tone.melody_len(), notes.len());

        let completions = fixtures::drain_tone(&mut tone);
        prop_assert_eq!(completions, notes.len());

        let ops = &tone.output().ops;
        prop_assert_eq!(ops.len(), notes.len() + 1);
        let starts = matches!(ops[0], ToneOp::Start { .. });
        prop_assert!(starts);
        prop_assert_eq!(ops[notes.len()], ToneOp::Stop);
        for op in &ops[1..notes.len()] {
            let rearm = matches!(op, ToneOp::Rearm { pulses, .. } if *pulses > 0);
            prop_assert!(rearm);
        }
    }

    #[test]
    fn prop_oversized_melody_rejected_before_hardware(
        notes in prop::collection::vec(playable_note(), MELODY_CAPACITY + 1..40),
    ) {
        let mut tone = fixtures::tone_generator();
        prop_assert_eq!(tone.play_melody(&notes), Err(CoreError::CapacityExceeded));
        prop_assert!(!tone.is_playing());
        prop_assert!(tone.output().ops.is_empty());
    }

    #[test]
    fn prop_ppm_frame_layout(
        values in prop::collection::vec(any::<u16>(), 1..=MAX_PPM_CHANNELS),
    ) {
        let mut ppm = PpmGenerator::new(MockPpmOutput::new());
        ppm.configure(values.len(), PPM_MAX_PERIOD).unwrap();
        ppm.send_frame(&values).unwrap();

        let frame = ppm.frame();
        prop_assert_eq!(frame.len(), values.len() + 2);
        prop_assert_eq!(&frame[..values.len()], &values[..]);
        prop_assert_eq!(&frame[values.len()..], &[PPM_MAX_PERIOD, PPM_MAX_PERIOD][..]);
        prop_assert_eq!(&ppm.output().frames[0], &frame.to_vec());
    }
}
