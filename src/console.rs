//! # Output Channel
//!
//! Append-only text sink the routines print their progress markers to.
//! Purely observational: nothing in the kernel reads it back. The firmware
//! binary forwards it to the semihosting console; tests either discard it
//! or record it.

/// Printed by the timer interrupt on entry, before it tries the lock.
pub const ISR_ENTER: &str = "ISR...";
/// Printed by the timer interrupt after releasing the lock.
pub const ISR_EXIT: &str = "Finita la ISR";
/// Printed by TaskH before it tries the lock.
pub const TASK_H_SPIN: &str = "spinning...";
/// Printed by TaskH inside its critical section.
pub const TASK_H_CRITICAL: &str = "H";
/// Printed by TaskL on every iteration.
pub const TASK_L_MARK: &str = "L";
/// Startup banner, printed once per boot.
pub const BANNER: &str = "FreeRTOS Esempio di spinlock e multicore";
/// Printed after a fault report, right before the re-initialization.
pub const REBOOTING: &str = "Rebooting...";

/// Serial-like text output.
pub trait Console {
    /// Open the channel. Sinks without a line rate ignore it.
    fn begin(&mut self, _baud: u32) {}

    fn write_str(&mut self, s: &str);

    #[inline]
    fn print(&mut self, s: &str) {
        self.write_str(s);
    }

    fn println(&mut self, s: &str) {
        self.write_str(s);
        self.write_str("\n");
    }
}

/// `core::fmt` adapter, so reports can be `write!`-ed to a console.
pub struct ConsoleWriter<'a, C: ?Sized + Console>(pub &'a mut C);

impl<C: ?Sized + Console> core::fmt::Write for ConsoleWriter<'_, C> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConsole;

impl Console for NullConsole {
    #[inline]
    fn write_str(&mut self, _s: &str) {}
}

/// Captures output in memory for assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub out: std::string::String,
    pub baud: Option<u32>,
}

#[cfg(test)]
impl Console for Recorder {
    fn begin(&mut self, baud: u32) {
        self.baud = Some(baud);
    }

    fn write_str(&mut self, s: &str) {
        self.out.push_str(s);
    }
}
