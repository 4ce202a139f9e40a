//! Independent watchdog timing

/// Prescaler code and reload value for a requested timeout
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WatchdogConfig {
    pub prescaler: u8,
    pub reload: u16,
}

impl WatchdogConfig {
    /// Key enabling writes to the prescaler and reload registers
    pub const KEY_UNLOCK: u16 = 0x5555;
    /// Key reloading the counter
    pub const KEY_RELOAD: u16 = 0xAAAA;
    /// Key starting the watchdog
    pub const KEY_START: u16 = 0xCCCC;
    /// Largest value the 12-bit reload register holds
    pub const RELOAD_MAX: u16 = 0x0FFF;

    /// Derive the register values for `interval_ms`
    ///
    /// The interval is counted in 0.1 ms units and capped at `0xFFFF`; each
    /// prescaler step doubles the span covered by the reload value, and the
    /// reload is the interval's share of that span in 12-bit counts.
    pub fn from_interval_ms(interval_ms: u32) -> Self {
        let interval = interval_ms.saturating_mul(10).min(0xFFFF);
        let mut timeout: u32 = 4096;
        let mut prescaler = 0u8;
        while interval > timeout {
            timeout <<= 1;
            prescaler += 1;
        }

        Self {
            prescaler,
            reload: (interval * Self::RELOAD_MAX as u32 / timeout) as u16,
        }
    }
}
