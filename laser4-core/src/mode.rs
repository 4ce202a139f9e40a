//! Mode controller
//!
//! The whole controller state is one byte: the current mode in the low nibble
//! and, while the current mode is `RequestPending`, the target mode in the high
//! nibble. Requests may come from interrupt handlers (USB suspend/resume), so
//! every write is a single atomic read-modify-write of that byte. Only the
//! foreground loop performs transitions.

use core::marker::PhantomData;

use embedded_hal::digital::OutputPin;
use portable_atomic::{AtomicU8, Ordering};

use crate::hal::{CoreError, HidEngine, ProtocolEngine, ToneOutput};
use crate::sync::SharedState;
use crate::tone::{ToneGenerator, STARTUP_CHIME};
use crate::types::Mode;

const STATE_BITS: u8 = 4;
const STATE_MASK: u8 = (1 << STATE_BITS) - 1;
const REQUEST_PENDING: u8 = Mode::RequestPending as u8;

/// Packed current/pending mode word
pub struct ModeController {
    state: AtomicU8,
}

impl ModeController {
    /// Power-on state: `Starting`, nothing pending
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(Mode::Starting as u8),
        }
    }

    /// Queue a change to `target`
    pub fn request(&self, target: Mode) {
        self.request_raw(target.bits());
    }

    /// Queue a change to a raw 4-bit mode code
    ///
    /// Codes without a known mode are queued anyway and ignored by
    /// [`step`](Self::step). `RequestPending` itself is not a valid target.
    pub fn request_raw(&self, target: u8) {
        let target = target & STATE_MASK;
        if target == REQUEST_PENDING {
            #[cfg(feature = "defmt")]
            defmt::warn!("Mode request for the pending marker ignored");
            return;
        }

        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                let current = state & STATE_MASK;
                if current == target {
                    return None;
                }
                if current == REQUEST_PENDING && state >> STATE_BITS == target {
                    return None;
                }
                Some(target << STATE_BITS | REQUEST_PENDING)
            });
    }

    /// Current mode, `None` for an unknown code
    pub fn current(&self) -> Option<Mode> {
        Mode::from_bits(self.current_bits())
    }

    /// Raw low nibble
    pub fn current_bits(&self) -> u8 {
        self.state.load(Ordering::Acquire) & STATE_MASK
    }

    /// Target of a queued request
    pub fn pending(&self) -> Option<u8> {
        let state = self.state.load(Ordering::Acquire);
        if state & STATE_MASK == REQUEST_PENDING {
            Some(state >> STATE_BITS)
        } else {
            None
        }
    }

    /// Whole packed word
    pub fn raw(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }

    /// One foreground iteration
    ///
    /// Completes a queued transition (running the entry actions exactly once)
    /// or runs the active mode's per-iteration work.
    pub fn step<H: ModeHooks>(&self, hooks: &mut H) {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state & STATE_MASK != REQUEST_PENDING {
                if let Some(mode) = Mode::from_bits(state & STATE_MASK) {
                    if mode.is_operating() {
                        hooks.run(mode);
                    }
                }
                return;
            }

            // A request landing between the load and the swap wins: retry
            // with the newer word rather than entering a stale target.
            let target = state >> STATE_BITS;
            match self.state.compare_exchange_weak(
                state,
                target,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.enter(target, hooks);
                    return;
                }
                Err(actual) => state = actual,
            }
        }
    }

    fn enter<H: ModeHooks>(&self, target: u8, hooks: &mut H) {
        match Mode::from_bits(target) {
            Some(mode) if mode.is_operating() => {
                #[cfg(feature = "defmt")]
                defmt::info!("Entering mode {}", mode);
                hooks.enter(mode);
            }
            _ => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Unknown mode target {}, ignored", target);
            }
        }
    }
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}

/// Work the controller hands out per mode
pub trait ModeHooks {
    /// Called once per completed transition into an operating mode
    fn enter(&mut self, mode: Mode);

    /// Called once per foreground iteration while in an operating mode
    fn run(&mut self, mode: Mode);
}

/// The two operating personalities plus what their entry actions touch
pub struct OperatingModes<'a, P, H, L, S, T> {
    pub protocol: P,
    pub hid: H,
    pub led: L,
    tone: &'a S,
    _output: PhantomData<fn() -> T>,
}

impl<'a, P, H, L, S, T> OperatingModes<'a, P, H, L, S, T>
where
    P: ProtocolEngine,
    H: HidEngine,
    L: OutputPin,
    S: SharedState<ToneGenerator<T>>,
    T: ToneOutput,
{
    pub fn new(protocol: P, hid: H, led: L, tone: &'a S) -> Self {
        Self {
            protocol,
            hid,
            led,
            tone,
            _output: PhantomData,
        }
    }

    fn confirm(&self, mode: Mode) {
        if let Some(note) = mode.confirmation_tone() {
            if let Err(_e) = self.tone.with_mut(|tone| tone.play_tone(note)) {
                #[cfg(feature = "defmt")]
                defmt::warn!("Confirmation tone failed: {}", _e);
            }
        }
    }
}

impl<P, H, L, S, T> ModeHooks for OperatingModes<'_, P, H, L, S, T>
where
    P: ProtocolEngine,
    H: HidEngine,
    L: OutputPin,
    S: SharedState<ToneGenerator<T>>,
    T: ToneOutput,
{
    fn enter(&mut self, mode: Mode) {
        match mode {
            Mode::Multiprotocol => self.protocol.setup(),
            Mode::Hid => {
                self.hid.init();
                let _ = self.led.set_low();
            }
            Mode::Starting | Mode::RequestPending => return,
        }
        self.confirm(mode);
    }

    fn run(&mut self, mode: Mode) {
        match mode {
            Mode::Multiprotocol => self.protocol.tick(),
            Mode::Hid => self.hid.process(),
            Mode::Starting | Mode::RequestPending => {}
        }
    }
}

/// Boot sequence: queue multiprotocol mode and start the startup chime
///
/// The caller decides whether to wait for the chime before arming the
/// watchdog.
pub fn startup<S, T>(modes: &ModeController, tone: &S) -> Result<(), CoreError>
where
    S: SharedState<ToneGenerator<T>>,
    T: ToneOutput,
{
    modes.request(Mode::Multiprotocol);
    tone.with_mut(|tone| tone.play_melody(&STARTUP_CHIME))
}
