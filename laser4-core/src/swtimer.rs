//! Cooperative software timers
//!
//! A fixed pool polled from the foreground loop. Each slot carries an
//! application-defined action value which is handed back to the poller's
//! dispatcher when the slot expires.

use crate::hal::CoreError;
use crate::types::TimerHandle;

#[derive(Copy, Clone, Debug)]
struct Slot<A> {
    threshold: u32,
    accumulated: u32,
    auto_repeat: bool,
    action: A,
}

/// Pool of `N` software timers firing actions of type `A`
pub struct TimerPool<A: Copy, const N: usize> {
    slots: [Option<Slot<A>>; N],
    last_poll: Option<u32>,
}

impl<A: Copy, const N: usize> TimerPool<A, N> {
    pub const fn new() -> Self {
        Self {
            slots: [None; N],
            last_poll: None,
        }
    }

    /// Pool capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Allocate the first free slot
    ///
    /// `duration` is in ticks. Fails with `CapacityExceeded` when every slot
    /// is running; running slots are left untouched.
    pub fn start(
        &mut self,
        duration: u32,
        auto_repeat: bool,
        action: A,
    ) -> Result<TimerHandle, CoreError> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            #[cfg(feature = "defmt")]
            defmt::warn!("Software timer pool exhausted ({} slots)", N);
            return Err(CoreError::CapacityExceeded);
        };

        self.slots[index] = Some(Slot {
            threshold: duration,
            accumulated: 0,
            auto_repeat,
            action,
        });
        Ok(TimerHandle(index))
    }

    /// Free a slot. Stopping a free slot or an out-of-range handle is a no-op.
    pub fn stop(&mut self, handle: TimerHandle) {
        if let Some(slot) = self.slots.get_mut(handle.index()) {
            *slot = None;
        }
    }

    pub fn is_running(&self, handle: TimerHandle) -> bool {
        matches!(self.slots.get(handle.index()), Some(Some(_)))
    }

    /// Number of running slots
    pub fn active(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Account the ticks elapsed since the previous poll and fire expired slots
    ///
    /// The first poll only records the time base. Expired slots fire in slot
    /// order; `dispatch` receives each slot's action once. Returns the number
    /// of actions fired.
    pub fn poll<F: FnMut(A)>(&mut self, now: u32, mut dispatch: F) -> usize {
        let elapsed = match self.last_poll {
            Some(last) => now.wrapping_sub(last),
            None => 0,
        };
        self.last_poll = Some(now);

        let mut fired = 0;
        for entry in self.slots.iter_mut() {
            let Some(slot) = entry.as_mut() else { continue };
            slot.accumulated = slot.accumulated.saturating_add(elapsed);
            if slot.accumulated < slot.threshold {
                continue;
            }

            let action = slot.action;
            if slot.auto_repeat {
                slot.accumulated = 0;
            } else {
                *entry = None;
            }
            dispatch(action);
            fired += 1;
        }
        fired
    }
}

impl<A: Copy, const N: usize> Default for TimerPool<A, N> {
    fn default() -> Self {
        Self::new()
    }
}
