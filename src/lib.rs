//! # CoreLock: ISR/task spinlock inversion on a dual-core RTOS
//!
//! A deterministic model of a classic dual-core failure: a timer interrupt
//! on core 1 and a high-priority task on core 0 share one spinlock, the
//! task holds it for too long, the interrupt spins inside interrupt context
//! waiting for it, and the interrupt watchdog resets the system.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                 Kernel (kernel.rs)                      │
//! │       System::new() · tick() · run_until_reset()        │
//! ├──────────────┬───────────────────┬────────────────────┤
//! │  Scheduler   │   Timer Service   │  Interrupt WDT     │
//! │  scheduler.rs│   timer.rs        │  watchdog.rs       │
//! │  ─ schedule()│   ─ configure()   │  ─ arm()           │
//! │  ─ create()  │   ─ attach()      │  ─ service()       │
//! │  ─ delete()  │   ─ enable()      │  ─ poll()          │
//! ├──────────────┴───────────────────┴────────────────────┤
//! │   Routines: TimerIsr (isr.rs) · TaskH · TaskL · Setup   │
//! │             (app.rs), stepped through routine.rs        │
//! ├────────────────────────────────────────────────────────┤
//! │   CoreLock (sync.rs) · Hold/SimClock (clock.rs)         │
//! │   Console (console.rs) · SystemConfig (config.rs)       │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The failure, step by step
//!
//! 1. TaskH (core 0, priority 2) takes [`CoreLock`](sync::CoreLock) and
//!    keeps it for `task_h_hold_ms`.
//! 2. The hardware timer fires on core 1 and preempts TaskL. The handler
//!    prints `ISR...` and spins on the lock.
//! 3. Nothing on core 1 can make TaskH release: there is no cross-core
//!    preemption, no priority inheritance and no timeout on the lock.
//! 4. `int_wdt_timeout_ms` after the handler was entered, the interrupt
//!    watchdog fires, prints the fault report and resets the system.
//! 5. The system boots again and the banner reappears.
//!
//! ## Memory Model
//!
//! - **No heap**: every entity lives inline in [`System`](kernel::System)
//! - **No globals**: the lock is lent to each routine through its
//!   [`Context`](routine::Context)
//! - **Host-testable**: `std` is linked only for unit tests

#![no_std]

#[cfg(test)]
extern crate std;

pub mod app;
pub mod clock;
pub mod config;
pub mod console;
pub mod error;
pub mod isr;
pub mod kernel;
pub mod routine;
pub mod scheduler;
pub mod sync;
pub mod task;
pub mod timer;
pub mod watchdog;
