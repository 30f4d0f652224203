//! # CoreLock Configuration
//!
//! Compile-time constants describing the simulated dual-core platform, and
//! the [`SystemConfig`] value that carries the demo's tunable timings.
//! `SystemConfig::DEFAULT` reproduces the deadlock; tests build variants of
//! it to explore the numeric relationships between the hold times and the
//! watchdog budget.

use core::fmt;

use crate::error::KernelError;

/// Number of processor cores on the simulated SoC.
pub const NUM_CORES: usize = 2;

/// Kernel tick frequency in Hz. One simulation step is one tick.
pub const TICK_HZ: u32 = 1000;

/// Input clock of the hardware timer group (APB clock), in Hz.
pub const APB_CLK_HZ: u64 = 80_000_000;

/// Number of hardware timers the timer service can hand out.
pub const NUM_TIMERS: usize = 4;

/// Maximum number of tasks the scheduler can hold at once.
pub const MAX_TASKS: usize = 8;

/// Task priorities must be strictly below this value.
pub const MAX_PRIORITIES: u8 = 25;

/// Stack size of the initialization context, in bytes.
pub const SETUP_STACK_SIZE: usize = 8192;

/// Priority of the initialization context.
pub const SETUP_PRIORITY: u8 = 1;

/// Identifier of one of the two processor cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreId {
    /// Protocol CPU (core 0). Hosts TaskH.
    Pro = 0,
    /// Application CPU (core 1). Hosts TaskL, the timer interrupt and setup.
    App = 1,
}

/// Core 0.
pub const PRO_CPU_NUM: CoreId = CoreId::Pro;

/// Core 1.
pub const APP_CPU_NUM: CoreId = CoreId::App;

impl CoreId {
    /// All cores, in the order the kernel steps them each tick.
    pub const ALL: [CoreId; NUM_CORES] = [CoreId::Pro, CoreId::App];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The other core.
    pub const fn other(self) -> CoreId {
        match self {
            CoreId::Pro => CoreId::App,
            CoreId::App => CoreId::Pro,
        }
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

// ---------------------------------------------------------------------------
// Runtime-tunable system configuration
// ---------------------------------------------------------------------------

/// Timings and wiring parameters of the demo.
///
/// All durations are in milliseconds of kernel time unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemConfig {
    /// Baud rate the output channel is opened with.
    pub baud_rate: u32,

    /// Cooperative sleep of the setup context before it prints the banner.
    pub startup_delay_ms: u64,

    /// Hardware timer prescaler. 80 on an 80 MHz APB clock gives 1 MHz.
    pub timer_divider: u16,

    /// Alarm value in timer ticks. With a 1 MHz count rate this is in µs.
    pub timer_max_count: u64,

    /// Whether the timer alarm auto-reloads.
    pub timer_periodic: bool,

    /// How long the timer interrupt keeps the core lock (simulated work).
    pub isr_wait_ms: u64,

    /// How long TaskH keeps the core lock after printing its marker.
    pub task_h_hold_ms: u64,

    /// TaskH busy-wait between critical sections.
    pub task_h_wait_ms: u64,

    /// TaskL busy-wait between markers.
    pub task_l_wait_ms: u64,

    /// Interrupt watchdog budget.
    pub int_wdt_timeout_ms: u64,

    /// Stack size requested for TaskH and TaskL, in bytes.
    pub task_stack_size: usize,

    pub task_h_priority: u8,
    pub task_l_priority: u8,
}

impl SystemConfig {
    /// The demo as shipped: a 2 s timer, 100 ms task waits, a 20 ms interrupt
    /// workload and the platform's 300 ms interrupt watchdog.
    ///
    /// TaskH's hold is long enough that a firing eventually lands early in
    /// it, and the timer interrupt then spins past the watchdog budget.
    pub const DEFAULT: Self = Self {
        baud_rate: 115_200,
        startup_delay_ms: 1000,
        timer_divider: 80,
        timer_max_count: 2_000_000,
        timer_periodic: true,
        isr_wait_ms: 20,
        task_h_hold_ms: 1000,
        task_h_wait_ms: 100,
        task_l_wait_ms: 100,
        int_wdt_timeout_ms: 300,
        task_stack_size: 3072,
        task_h_priority: 2,
        task_l_priority: 1,
    };

    /// Timer input ticks per second after the prescaler.
    #[inline]
    pub const fn timer_tick_hz(&self) -> u64 {
        APB_CLK_HZ / self.timer_divider as u64
    }

    /// Reject configurations the simulation cannot make progress with.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.timer_divider < 2 {
            return Err(KernelError::InvalidDivider(self.timer_divider));
        }
        if self.timer_max_count == 0 {
            return Err(KernelError::ZeroPeriod);
        }
        // A zero wait would let a task loop forever inside one tick.
        if self.task_h_wait_ms == 0 {
            return Err(KernelError::InvalidConfig("task_h_wait_ms must be non-zero"));
        }
        if self.task_l_wait_ms == 0 {
            return Err(KernelError::InvalidConfig("task_l_wait_ms must be non-zero"));
        }
        if self.int_wdt_timeout_ms == 0 {
            return Err(KernelError::InvalidConfig("int_wdt_timeout_ms must be non-zero"));
        }
        if self.task_h_priority >= MAX_PRIORITIES || self.task_l_priority >= MAX_PRIORITIES {
            return Err(KernelError::InvalidConfig("task priority out of range"));
        }
        Ok(())
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timer_period() {
        let cfg = SystemConfig::DEFAULT;
        assert_eq!(cfg.timer_tick_hz(), 1_000_000);
        // 2 s between alarms
        assert_eq!(cfg.timer_max_count / cfg.timer_tick_hz(), 2);
    }

    #[test]
    fn test_default_is_valid() {
        assert_eq!(SystemConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_default_budget_below_task_h_cycle() {
        let cfg = SystemConfig::DEFAULT;
        assert!(cfg.int_wdt_timeout_ms < cfg.task_h_wait_ms + cfg.task_h_hold_ms);
    }

    #[test]
    fn test_validate_rejects_zero_wait() {
        let cfg = SystemConfig { task_l_wait_ms: 0, ..SystemConfig::DEFAULT };
        assert!(matches!(cfg.validate(), Err(KernelError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_divider() {
        let cfg = SystemConfig { timer_divider: 1, ..SystemConfig::DEFAULT };
        assert_eq!(cfg.validate(), Err(KernelError::InvalidDivider(1)));
    }

    #[test]
    fn test_validate_rejects_priority_out_of_range() {
        let cfg = SystemConfig { task_h_priority: MAX_PRIORITIES, ..SystemConfig::DEFAULT };
        assert!(matches!(cfg.validate(), Err(KernelError::InvalidConfig(_))));
        let cfg = SystemConfig { task_h_priority: MAX_PRIORITIES - 1, ..SystemConfig::DEFAULT };
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn test_core_ids() {
        assert_eq!(PRO_CPU_NUM.index(), 0);
        assert_eq!(APP_CPU_NUM.index(), 1);
        assert_eq!(CoreId::Pro.other(), CoreId::App);
    }
}
