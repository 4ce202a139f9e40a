//! Millisecond time base and the bounded spin helpers built on it

use portable_atomic::{AtomicU32, Ordering};

use crate::hal::{CoreError, TickSource};

/// Monotonic tick counter incremented from the periodic interrupt
pub struct TickCounter {
    ticks: AtomicU32,
}

impl TickCounter {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
        }
    }

    /// Advance by one tick (called from the tick interrupt)
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Release);
    }

    /// Ticks elapsed since `earlier`, tolerant of wraparound
    pub fn elapsed_since(&self, earlier: u32) -> u32 {
        self.now().wrapping_sub(earlier)
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for TickCounter {
    fn now(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }
}

/// Spin until `condition` holds or `timeout_ms` ticks pass
pub fn wait_until<T, F>(ticks: &T, timeout_ms: u32, mut condition: F) -> Result<(), CoreError>
where
    T: TickSource + ?Sized,
    F: FnMut() -> bool,
{
    let start = ticks.now();
    loop {
        if condition() {
            return Ok(());
        }
        if ticks.now().wrapping_sub(start) >= timeout_ms {
            // Last look, the condition may have flipped while we read the clock
            return if condition() {
                Ok(())
            } else {
                Err(CoreError::Timeout)
            };
        }
        core::hint::spin_loop();
    }
}

/// Blocking delay on top of the tick counter
///
/// Resolution is one tick. Requests round up to whole ticks and may run up
/// to one tick long, never short.
pub struct TickDelay<'a, T: TickSource + ?Sized> {
    ticks: &'a T,
}

impl<'a, T: TickSource + ?Sized> TickDelay<'a, T> {
    pub fn new(ticks: &'a T) -> Self {
        Self { ticks }
    }

    /// Wait out `ms` full tick periods
    ///
    /// The first edge may come right after `start`, so one extra edge is
    /// counted to keep the delay from running short.
    fn spin_ms(&self, ms: u32) {
        if ms == 0 {
            return;
        }
        let edges = ms.saturating_add(1);
        let start = self.ticks.now();
        while self.ticks.now().wrapping_sub(start) < edges {
            core::hint::spin_loop();
        }
    }
}

impl<T: TickSource + ?Sized> embedded_hal::delay::DelayNs for TickDelay<'_, T> {
    fn delay_ns(&mut self, ns: u32) {
        self.spin_ms(ns.div_ceil(1_000_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.spin_ms(us.div_ceil(1_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.spin_ms(ms);
    }
}
