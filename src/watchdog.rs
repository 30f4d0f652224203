//! # Interrupt Watchdog
//!
//! Liveness bound on interrupt context. The kernel arms the watchdog for a
//! core when an interrupt handler is entered there and services it when the
//! handler returns. If a handler is still running `budget_ms` after it was
//! entered, [`InterruptWatchdog::poll`] reports a [`Fault`] and the kernel
//! resets the whole system.
//!
//! Neither the lock nor the handler knows about this deadline; it is
//! enforced entirely from outside.

use core::fmt;

use crate::config::{CoreId, NUM_CORES};

/// An expired interrupt watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// Core whose interrupt handler overran.
    pub core: CoreId,
    /// Uptime at which the handler was entered.
    pub armed_at: u64,
    /// Uptime at which the overrun was detected.
    pub detected_at: u64,
}

impl Fault {
    /// How long the handler had been running when it was caught.
    pub fn overrun_ms(&self) -> u64 {
        self.detected_at - self.armed_at
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Guru Meditation Error: Core  {} panic'ed (Interrupt wdt timeout on CPU{}).",
            self.core, self.core
        )
    }
}

pub struct InterruptWatchdog {
    budget_ms: u64,
    armed: [Option<u64>; NUM_CORES],
}

impl InterruptWatchdog {
    pub const fn new(budget_ms: u64) -> Self {
        Self { budget_ms, armed: [None; NUM_CORES] }
    }

    /// Start the countdown for `core` at uptime `now`.
    pub fn arm(&mut self, core: CoreId, now: u64) {
        self.armed[core.index()] = Some(now);
    }

    /// Clear the countdown for `core`.
    pub fn service(&mut self, core: CoreId) {
        self.armed[core.index()] = None;
    }

    pub fn is_armed(&self, core: CoreId) -> bool {
        self.armed[core.index()].is_some()
    }

    /// Check every core at uptime `now`.
    ///
    /// # Returns
    /// The first core whose handler has run for the full budget.
    pub fn poll(&self, now: u64) -> Option<Fault> {
        CoreId::ALL.iter().find_map(|&core| {
            let armed_at = self.armed[core.index()]?;
            (now.saturating_sub(armed_at) >= self.budget_ms)
                .then(|| Fault { core, armed_at, detected_at: now })
        })
    }

    /// Disarm everything.
    pub fn reset(&mut self) {
        self.armed = [None; NUM_CORES];
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
