//! "Operation in progress" flag
//!
//! Each component serializes its own work with one of these instead of a
//! lock: a second caller sees the flag set and backs off rather than waiting.

use std::sync::atomic::{AtomicBool, Ordering};

/// Set while a drain or sync pass runs
#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

impl BusyFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Claim the flag; `None` if another pass holds it
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.0))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the flag when dropped, including on early return
#[derive(Debug)]
pub struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
