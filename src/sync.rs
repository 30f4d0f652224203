//! # Synchronization Primitives
//!
//! [`CoreLock`] is the cross-core spinlock shared by the timer interrupt on
//! core 1 and TaskH on core 0. It is usable from both task and interrupt
//! context: acquiring it never sleeps, never yields and never times out.
//! The waiting context keeps its core busy until the holder, on the other
//! core, lets go.
//!
//! Holder and held flag live in a single atomic owner word, so both cores
//! always observe a consistent `{held, owner}` pair.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::config::CoreId;

/// Owner word value for an unlocked lock.
const UNLOCKED: u8 = u8::MAX;

/// Lifetime counters of a [`CoreLock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockStats {
    pub acquisitions: u32,
    pub releases: u32,
}

/// Busy-wait mutual exclusion across both cores.
///
/// There is no ownership check on release, no reentrancy and no priority
/// ceiling. Releasing a lock that is not held, or acquiring it twice from
/// the same holder, is outside its contract.
pub struct CoreLock {
    owner: AtomicU8,
    acquisitions: AtomicU32,
    releases: AtomicU32,
}

impl CoreLock {
    /// Create an unlocked lock.
    pub const fn new() -> Self {
        Self {
            owner: AtomicU8::new(UNLOCKED),
            acquisitions: AtomicU32::new(0),
            releases: AtomicU32::new(0),
        }
    }

    /// Single acquisition attempt on behalf of `core`.
    ///
    /// # Returns
    /// `true` if the lock was free and is now held by `core`.
    #[inline]
    pub fn try_acquire(&self, core: CoreId) -> bool {
        let won = self
            .owner
            .compare_exchange(UNLOCKED, core as u8, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        if won {
            self.acquisitions.fetch_add(1, Ordering::Relaxed);
        }
        won
    }

    /// Spin until the lock is free, then take it for `core`.
    ///
    /// Unbounded: if the holder never releases, this never returns.
    pub fn acquire(&self, core: CoreId) {
        while !self.try_acquire(core) {
            while self.owner.load(Ordering::Relaxed) != UNLOCKED {
                core::hint::spin_loop();
            }
        }
    }

    /// Clear the held flag.
    ///
    /// The release is counted before the owner word is cleared, so a
    /// snapshot never shows more than one acquisition outstanding.
    #[inline]
    pub fn release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        self.owner.store(UNLOCKED, Ordering::Release);
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        self.owner.load(Ordering::Acquire) != UNLOCKED
    }

    /// Core currently holding the lock, if any.
    pub fn owner(&self) -> Option<CoreId> {
        match self.owner.load(Ordering::Acquire) {
            0 => Some(CoreId::Pro),
            1 => Some(CoreId::App),
            _ => None,
        }
    }

    pub fn stats(&self) -> LockStats {
        LockStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
        }
    }
}

impl Default for CoreLock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
