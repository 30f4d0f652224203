//! # Hardware Timer Service
//!
//! A group of up-counting alarm timers clocked from the APB clock through a
//! prescaler. A timer's interrupt is bound to the core that attached its
//! handler; when the counter reaches the alarm value the interrupt is
//! raised on that core, and the kernel delivers it by stepping the
//! attached [`TimerIsr`] ahead of any task.
//!
//! An edge-triggered line latches the alarm until the core takes it, so an
//! alarm that lands while the handler is still running is delivered right
//! after it returns. A level-triggered line is only asserted during the tick
//! the alarm fires; if the core is busy with that handler, the alarm is lost.
//!
//! ## Wiring sequence
//!
//! ```text
//! configure(divider, periodic) ─► attach(handle, core, isr, edge)
//!     ─► set_period(handle, ticks) ─► enable(handle)
//! ```

use crate::config::{CoreId, APB_CLK_HZ, NUM_TIMERS, TICK_HZ};
use crate::error::KernelError;
use crate::isr::TimerIsr;

/// Handle to a configured timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(usize);

/// One alarm timer.
#[derive(Debug, Clone, Copy)]
pub struct HwTimer {
    configured: bool,
    enabled: bool,
    divider: u64,
    periodic: bool,
    /// Counter value, in prescaled ticks.
    counter: u64,
    /// APB cycles not yet worth a prescaled tick.
    residue: u64,
    alarm: u64,
    /// Latch alarms until taken, instead of dropping them after one tick.
    edge: bool,
    core: CoreId,
    handler: Option<TimerIsr>,
    pending: bool,
    fired: u32,
}

impl HwTimer {
    const UNUSED: Self = Self {
        configured: false,
        enabled: false,
        divider: 1,
        periodic: false,
        counter: 0,
        residue: 0,
        alarm: 0,
        edge: true,
        core: CoreId::Pro,
        handler: None,
        pending: false,
        fired: 0,
    };

    /// Count one kernel tick worth of input clock.
    fn advance(&mut self) {
        if !self.edge {
            self.pending = false;
        }
        if !self.enabled || self.alarm == 0 {
            return;
        }
        self.residue += APB_CLK_HZ / TICK_HZ as u64;
        self.counter += self.residue / self.divider;
        self.residue %= self.divider;

        if self.counter >= self.alarm {
            self.pending = true;
            self.fired = self.fired.wrapping_add(1);
            if self.periodic {
                self.counter %= self.alarm;
            } else {
                self.counter = 0;
                self.enabled = false;
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

}

/// The timer service: all hardware timers of the SoC.
pub struct TimerGroup {
    timers: [HwTimer; NUM_TIMERS],
}

impl TimerGroup {
    pub const fn new() -> Self {
        Self { timers: [HwTimer::UNUSED; NUM_TIMERS] }
    }

    /// Claim a free timer and set its prescaler and reload mode.
    ///
    /// The counter does not run until [`enable`](Self::enable).
    pub fn configure(&mut self, divider: u16, periodic: bool) -> Result<TimerHandle, KernelError> {
        if divider < 2 {
            return Err(KernelError::InvalidDivider(divider));
        }
        let id = self
            .timers
            .iter()
            .position(|t| !t.configured)
            .ok_or(KernelError::TimersExhausted)?;

        self.timers[id] = HwTimer {
            configured: true,
            divider: divider as u64,
            periodic,
            ..HwTimer::UNUSED
        };
        Ok(TimerHandle(id))
    }

    /// Attach `isr` to the timer. Its interrupt is routed to `core`,
    /// latched when `edge` is set, level-triggered otherwise.
    pub fn attach(
        &mut self,
        handle: TimerHandle,
        core: CoreId,
        isr: TimerIsr,
        edge: bool,
    ) -> Result<(), KernelError> {
        let t = self.get_mut(handle)?;
        t.core = core;
        t.handler = Some(isr);
        t.edge = edge;
        Ok(())
    }

    /// Set the alarm value, in prescaled ticks.
    pub fn set_period(&mut self, handle: TimerHandle, ticks: u64) -> Result<(), KernelError> {
        if ticks == 0 {
            return Err(KernelError::ZeroPeriod);
        }
        self.get_mut(handle)?.alarm = ticks;
        Ok(())
    }

    /// Start counting. Requires an attached handler.
    pub fn enable(&mut self, handle: TimerHandle) -> Result<(), KernelError> {
        let t = self.get_mut(handle)?;
        if t.handler.is_none() {
            return Err(KernelError::NoHandler);
        }
        if t.alarm == 0 {
            return Err(KernelError::ZeroPeriod);
        }
        t.enabled = true;
        Ok(())
    }

    pub fn disable(&mut self, handle: TimerHandle) -> Result<(), KernelError> {
        self.get_mut(handle)?.enabled = false;
        Ok(())
    }

    pub fn timer(&self, handle: TimerHandle) -> Result<&HwTimer, KernelError> {
        self.timers
            .get(handle.0)
            .filter(|t| t.configured)
            .ok_or(KernelError::UnknownTimer)
    }

    fn get_mut(&mut self, handle: TimerHandle) -> Result<&mut HwTimer, KernelError> {
        self.timers
            .get_mut(handle.0)
            .filter(|t| t.configured)
            .ok_or(KernelError::UnknownTimer)
    }

    /// Count one kernel tick on every enabled timer.
    pub fn advance(&mut self) {
        for t in self.timers.iter_mut() {
            t.advance();
        }
    }

    /// Pick the interrupt `core` must run now.
    ///
    /// A handler already in progress on `core` comes first; otherwise the
    /// first pending line routed to `core` is taken and its handler entered.
    ///
    /// # Returns
    /// `(timer index, freshly entered)`, or `None` if `core` has no
    /// interrupt work.
    pub fn take_interrupt(&mut self, core: CoreId) -> Option<(usize, bool)> {
        let routed = |t: &HwTimer| t.configured && t.core == core && t.handler.is_some();

        if let Some(i) = self
            .timers
            .iter()
            .position(|t| routed(t) && t.handler.map_or(false, |h| h.is_active()))
        {
            return Some((i, false));
        }

        let i = self.timers.iter().position(|t| routed(t) && t.pending)?;
        let t = &mut self.timers[i];
        t.pending = false;
        if let Some(h) = t.handler.as_mut() {
            h.trigger();
        }
        Some((i, true))
    }

    /// Handler attached to timer `index`.
    pub fn handler_mut(&mut self, index: usize) -> Option<&mut TimerIsr> {
        self.timers.get_mut(index).and_then(|t| t.handler.as_mut())
    }

    /// The handler currently running on `core`, if any.
    pub fn active_handler(&self, core: CoreId) -> Option<&TimerIsr> {
        self.timers
            .iter()
            .filter(|t| t.configured && t.core == core)
            .filter_map(|t| t.handler.as_ref())
            .find(|h| h.is_active())
    }

    /// Total alarms across all timers.
    pub fn fired(&self) -> u32 {
        self.timers.iter().map(|t| t.fired).sum()
    }
}

impl Default for TimerGroup {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
