//! # Clock
//!
//! Monotonic millisecond time for the simulation, and the [`Hold`]
//! primitive used for every busy-wait in the system.
//!
//! On the real platform the tasks and the interrupt handler burn cycles in
//! `while now() - start < d {}` loops. Here the same wait is a `Hold` that
//! is checked once per tick against a clock the kernel (or a test) advances,
//! so timing-dependent scenarios replay identically without wall-clock
//! delays.

/// A monotonic millisecond time source.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Manually advanced clock. Never goes backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimClock {
    now: u64,
}

impl SimClock {
    pub const fn new() -> Self {
        Self { now: 0 }
    }

    #[inline]
    pub fn advance(&mut self, ms: u64) {
        self.now += ms;
    }
}

impl Clock for SimClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.now
    }
}

/// "Keep this core busy for `duration` ms", started at `since`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hold {
    pub since: u64,
    pub duration: u64,
}

impl Hold {
    #[inline]
    pub const fn start(now: u64, duration: u64) -> Self {
        Self { since: now, duration }
    }

    /// Whether the wait is over at time `now`.
    #[inline]
    pub const fn elapsed(&self, now: u64) -> bool {
        now.saturating_sub(self.since) >= self.duration
    }
}
