//! # Routines
//!
//! Every execution context in the system (the timer interrupt, the tasks
//! and the setup context) is a [`Routine`]: a resumable state machine the
//! kernel steps once per tick on the core it belongs to. A step performs
//! any instantaneous work (printing, a successful lock acquisition, a
//! release) and then reports how the rest of the tick is spent.

use crate::config::CoreId;
use crate::console::Console;
use crate::sync::CoreLock;

/// What a routine did with its core for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Busy-waiting on a [`Hold`](crate::clock::Hold). The core is occupied.
    Busy,
    /// Spinning on the core lock. The core is occupied.
    Spinning,
    /// Cooperative sleep until the given uptime. The core is given up.
    Sleep { until: u64 },
    /// The setup context asks the kernel to wire the timer and the tasks.
    Bootstrap,
    /// Interrupt handler returned, or task deleted itself.
    Done,
}

/// Everything a routine may touch while it runs.
pub struct Context<'a> {
    /// Kernel uptime in ms.
    pub now: u64,
    /// Core the routine is executing on.
    pub core: CoreId,
    pub lock: &'a CoreLock,
    pub console: &'a mut dyn Console,
}

pub trait Routine {
    /// Run until the routine has to spend time, then say how.
    fn step(&mut self, cx: &mut Context<'_>) -> Outcome;

    /// Whether the routine currently sits inside a lock-protected section.
    fn in_critical(&self) -> bool {
        false
    }
}
