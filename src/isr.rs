//! # Timer Interrupt Handler
//!
//! Fires on the core the timer was attached from (core 1), preempting
//! whatever task runs there. Sequence per firing:
//!
//! ```text
//! print "ISR..." ─► spin on CoreLock ─► hold 20 ms ─► release ─► println "Finita la ISR"
//! ```
//!
//! The handler has no timeout of its own. If the lock stays with TaskH on
//! the other core for longer than the interrupt watchdog budget, the
//! watchdog resets the whole system while this handler is still spinning.

use crate::clock::Hold;
use crate::console::{ISR_ENTER, ISR_EXIT};
use crate::routine::{Context, Outcome, Routine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Not running.
    Idle,
    Entry,
    Acquire,
    /// Simulated work inside the critical section.
    Work(Hold),
}

/// The periodic timer interrupt routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerIsr {
    work_ms: u64,
    phase: Phase,
}

impl TimerIsr {
    /// Name reported for interrupt context in tick reports.
    pub const NAME: &'static str = "TimerISR";

    pub const fn new(work_ms: u64) -> Self {
        Self { work_ms, phase: Phase::Idle }
    }

    /// Interrupt entry. Called by the kernel when the line is taken.
    pub fn trigger(&mut self) {
        self.phase = Phase::Entry;
    }

    /// Entered and not yet returned.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Spinning on the lock.
    pub fn is_waiting(&self) -> bool {
        self.phase == Phase::Acquire
    }
}

impl Routine for TimerIsr {
    fn step(&mut self, cx: &mut Context<'_>) -> Outcome {
        loop {
            match self.phase {
                Phase::Idle => return Outcome::Done,
                Phase::Entry => {
                    cx.console.print(ISR_ENTER);
                    self.phase = Phase::Acquire;
                }
                Phase::Acquire => {
                    if !cx.lock.try_acquire(cx.core) {
                        return Outcome::Spinning;
                    }
                    self.phase = Phase::Work(Hold::start(cx.now, self.work_ms));
                }
                Phase::Work(hold) => {
                    if !hold.elapsed(cx.now) {
                        return Outcome::Busy;
                    }
                    cx.lock.release();
                    cx.console.println(ISR_EXIT);
                    self.phase = Phase::Idle;
                    return Outcome::Done;
                }
            }
        }
    }

    fn in_critical(&self) -> bool {
        matches!(self.phase, Phase::Work(_))
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
