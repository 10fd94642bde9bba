use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use crate::config::INITIAL_SPL;
use crate::{MeterError, Result};

/// Copy of the shared estimate taken under the lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateSnapshot {
    /// Smoothed SPL in dB.
    pub spl: f32,
    /// Whether the capture source has been opened.
    pub ready: bool,
}

impl Default for EstimateSnapshot {
    fn default() -> Self {
        Self::starting(INITIAL_SPL)
    }
}

impl EstimateSnapshot {
    pub fn starting(spl: f32) -> Self {
        Self { spl, ready: false }
    }
}

/// Single-slot, lock-guarded holder for the latest smoothed SPL.
///
/// The capture thread writes through [`write`](Self::write) and
/// [`mark_ready`](Self::mark_ready); presentation ticks read through
/// [`try_read`](Self::try_read), which never waits for the writer.
#[derive(Clone)]
pub struct SharedEstimate {
    slot: Arc<Mutex<EstimateSnapshot>>,
}

impl Default for SharedEstimate {
    fn default() -> Self {
        Self::new(INITIAL_SPL)
    }
}

impl SharedEstimate {
    pub fn new(initial_spl: f32) -> Self {
        Self {
            slot: Arc::new(Mutex::new(EstimateSnapshot::starting(initial_spl))),
        }
    }

    /// Overwrites the current value, waiting for the lock if needed.
    pub fn write(&self, spl: f32) -> Result<()> {
        let mut slot = self.lock()?;
        slot.spl = spl;
        Ok(())
    }

    /// Flags the capture pipeline as operational.
    pub fn mark_ready(&self) -> Result<()> {
        let mut slot = self.lock()?;
        slot.ready = true;
        Ok(())
    }

    /// Returns the current value, or `None` while the writer holds the lock.
    pub fn try_read(&self) -> Option<EstimateSnapshot> {
        match self.slot.try_lock() {
            Ok(slot) => Some(*slot),
            Err(TryLockError::WouldBlock) => None,
            // The slot only holds plain data, so a panicked writer cannot
            // leave it half-updated.
            Err(TryLockError::Poisoned(poisoned)) => Some(*poisoned.into_inner()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, EstimateSnapshot>> {
        self.slot
            .lock()
            .map_err(|_| MeterError::msg("shared estimate has been poisoned"))
    }

    #[cfg(test)]
    pub(crate) fn hold_lock(&self) -> MutexGuard<'_, EstimateSnapshot> {
        self.slot.lock().unwrap()
    }
}

impl std::fmt::Debug for SharedEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEstimate")
            .field("current", &self.try_read())
            .finish()
    }
}
