//! # Kernel Errors
//!
//! Failures of the kernel API: task creation, timer wiring and configuration
//! checks. The watchdog timeout is not an error; it is reported as a
//! [`Fault`](crate::watchdog::Fault) and handled by resetting the system.

use core::fmt;

use crate::config::CoreId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Every TCB slot is in use (`MAX_TASKS` reached).
    TaskTableFull,
    /// No task is currently running on this core.
    NoCurrentTask(CoreId),
    /// All hardware timers are already configured.
    TimersExhausted,
    /// The handle does not name a configured timer.
    UnknownTimer,
    /// Prescaler outside the supported range (2..=65535).
    InvalidDivider(u16),
    /// A timer alarm of zero ticks.
    ZeroPeriod,
    /// The timer was enabled before a handler was attached.
    NoHandler,
    InvalidConfig(&'static str),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::TaskTableFull => f.write_str("task table full"),
            KernelError::NoCurrentTask(core) => write!(f, "no task running on core {}", core),
            KernelError::TimersExhausted => f.write_str("no hardware timer left"),
            KernelError::UnknownTimer => f.write_str("unknown timer handle"),
            KernelError::InvalidDivider(d) => write!(f, "invalid timer divider {}", d),
            KernelError::ZeroPeriod => f.write_str("timer period must be non-zero"),
            KernelError::NoHandler => f.write_str("timer enabled without a handler"),
            KernelError::InvalidConfig(why) => write!(f, "invalid configuration: {}", why),
        }
    }
}
