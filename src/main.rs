//! # CoreLock Demo Firmware
//!
//! Runs the dual-core spinlock demo on a Cortex-M3 under QEMU and prints
//! the marker stream through semihosting:
//!
//! | Context | Core | Priority | Output |
//! |---------|------|----------|--------|
//! | `TimerISR` | 1 | interrupt | `ISR...` … `Finita la ISR` |
//! | `Task H` | 0 | 2 | `spinning...H` |
//! | `Task L` | 1 | 1 | `L` |
//!
//! ## Expected Output
//!
//! 1. **Boot**: the banner, then interleaved `L` and `spinning...H` lines.
//! 2. **First firing** (3 s): TaskH holds the lock, the handler waits for
//!    it and finishes late but within the watchdog budget.
//! 3. **Second firing** (5 s): TaskH has just taken the lock; the handler
//!    spins past 300 ms and the output stops after `ISR...`.
//! 4. **Reset**: `Guru Meditation Error ... Interrupt wdt timeout on CPU1`,
//!    `Rebooting...`, and the banner again.
//!
//! Run with `cargo run --release --target thumbv7m-none-eabi`.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use cortex_m_semihosting::{debug, hprint, hprintln};
use panic_halt as _;

use corelock::config::SystemConfig;
use corelock::console::Console;
use corelock::kernel::System;

/// Simulated time; long enough for two watchdog resets.
const RUN_MS: u64 = 12_000;

/// Forwards the console to the host's stdout.
struct Semihosting;

impl Console for Semihosting {
    fn write_str(&mut self, s: &str) {
        let _ = hprint!("{}", s);
    }
}

#[entry]
fn main() -> ! {
    let status = match run() {
        Ok(()) => debug::EXIT_SUCCESS,
        Err(e) => {
            let _ = hprintln!("kernel error: {}", e);
            debug::EXIT_FAILURE
        }
    };
    debug::exit(status);

    loop {
        cortex_m::asm::wfi();
    }
}

fn run() -> Result<(), corelock::error::KernelError> {
    let mut system = System::new(SystemConfig::DEFAULT, Semihosting)?;
    let stats = system.run_for(RUN_MS)?;

    let _ = hprintln!(
        "\n-- {} ms: {} boots, {} interrupts entered, {} returned, {} watchdog resets",
        RUN_MS,
        stats.boots,
        stats.isr_entries,
        stats.isr_returns,
        stats.watchdog_resets
    );
    Ok(())
}
