//! # Application Routines
//!
//! The two perpetual tasks and the one-shot setup context.
//!
//! | Routine | Core | Priority | Touches CoreLock |
//! |---------|------|----------|------------------|
//! | [`TaskH`] | 0 | 2 | yes, every iteration |
//! | [`TaskL`] | 1 | 1 | never |
//! | [`Setup`] | 1 | 1 | never |
//!
//! Both tasks idle by busy-waiting, not by sleeping: they keep their core
//! occupied the whole time, exactly like the interrupt handler does.

use crate::clock::Hold;
use crate::console::{BANNER, TASK_H_CRITICAL, TASK_H_SPIN, TASK_L_MARK};
use crate::routine::{Context, Outcome, Routine};

// ---------------------------------------------------------------------------
// TaskH
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HighPhase {
    Announce,
    Acquire,
    Critical(Hold),
    Idle(Hold),
}

/// High-priority task on core 0.
///
/// Takes the core lock every iteration and keeps it for `hold_ms`. Nothing
/// on core 1 can make it let go earlier: cross-core preemption does not
/// exist, which is what leaves the timer interrupt spinning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskH {
    hold_ms: u64,
    wait_ms: u64,
    phase: HighPhase,
    cycles: u32,
}

impl TaskH {
    pub const NAME: &'static str = "Task H";

    pub const fn new(hold_ms: u64, wait_ms: u64) -> Self {
        Self { hold_ms, wait_ms, phase: HighPhase::Announce, cycles: 0 }
    }

    /// Completed iterations.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }
}

impl Routine for TaskH {
    fn step(&mut self, cx: &mut Context<'_>) -> Outcome {
        loop {
            match self.phase {
                HighPhase::Announce => {
                    cx.console.print(TASK_H_SPIN);
                    self.phase = HighPhase::Acquire;
                }
                HighPhase::Acquire => {
                    if !cx.lock.try_acquire(cx.core) {
                        return Outcome::Spinning;
                    }
                    cx.console.println(TASK_H_CRITICAL);
                    self.phase = HighPhase::Critical(Hold::start(cx.now, self.hold_ms));
                }
                HighPhase::Critical(hold) => {
                    if !hold.elapsed(cx.now) {
                        return Outcome::Busy;
                    }
                    cx.lock.release();
                    self.phase = HighPhase::Idle(Hold::start(cx.now, self.wait_ms));
                }
                HighPhase::Idle(hold) => {
                    if !hold.elapsed(cx.now) {
                        return Outcome::Busy;
                    }
                    self.cycles = self.cycles.wrapping_add(1);
                    self.phase = HighPhase::Announce;
                }
            }
        }
    }

    fn in_critical(&self) -> bool {
        matches!(self.phase, HighPhase::Critical(_))
    }
}

// ---------------------------------------------------------------------------
// TaskL
// ---------------------------------------------------------------------------

/// Low-priority task on core 1. Occupies the core between timer firings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskL {
    wait_ms: u64,
    idle: Option<Hold>,
    cycles: u32,
}

impl TaskL {
    pub const NAME: &'static str = "Task L";

    pub const fn new(wait_ms: u64) -> Self {
        Self { wait_ms, idle: None, cycles: 0 }
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }
}

impl Routine for TaskL {
    fn step(&mut self, cx: &mut Context<'_>) -> Outcome {
        loop {
            match self.idle {
                None => {
                    cx.console.println(TASK_L_MARK);
                    self.idle = Some(Hold::start(cx.now, self.wait_ms));
                }
                Some(hold) if !hold.elapsed(cx.now) => return Outcome::Busy,
                Some(_) => {
                    self.cycles = self.cycles.wrapping_add(1);
                    self.idle = None;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Initialization context: sleeps, prints the banner, then hands over to
/// the kernel to wire the timer and create both tasks. It is deleted
/// right after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setup {
    delay_ms: u64,
    slept: bool,
}

impl Setup {
    pub const NAME: &'static str = "loopTask";

    pub const fn new(delay_ms: u64) -> Self {
        Self { delay_ms, slept: false }
    }
}

impl Routine for Setup {
    fn step(&mut self, cx: &mut Context<'_>) -> Outcome {
        if !self.slept {
            self.slept = true;
            return Outcome::Sleep { until: cx.now + self.delay_ms };
        }
        cx.console.println("");
        cx.console.println(BANNER);
        Outcome::Bootstrap
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
