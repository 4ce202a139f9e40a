//! Access to state shared between the foreground loop and interrupt handlers.
//!
//! Components are plain structs; whoever shares one with an interrupt handler
//! wraps it in a `critical_section::Mutex<RefCell<_>>`. Blocking helpers take
//! the lock once per check so the handler can run in between.

use core::cell::RefCell;

/// Exclusive, short-lived access to shared state.
pub trait SharedState<T> {
    /// Run `f` with a mutable reference to the inner state.
    fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R;
}

impl<T> SharedState<T> for critical_section::Mutex<RefCell<T>> {
    fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| f(&mut self.borrow_ref_mut(cs)))
    }
}

/// Single-context sharing (host tests, init code before interrupts are on).
impl<T> SharedState<T> for RefCell<T> {
    fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        f(&mut self.borrow_mut())
    }
}
