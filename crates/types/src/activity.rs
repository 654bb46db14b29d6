//! Single-flight activity state machine
//!
//! The scan/extract/launch pipeline and the backup runner each hold one
//! [`ActivityGuard`]. Beginning an activity takes the guard from `Idle` into
//! a named phase and yields an RAII permit; a second caller finds the guard
//! busy and backs off instead of blocking. Dropping the permit always
//! returns the guard to `Idle`, so an error path can never leave a stale
//! latch behind.

use std::sync::{Arc, Mutex, PoisonError};

/// Phases an activity guard can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    Extracting,
    Launching,
    Backup,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Mutex-guarded phase cell shared between clones.
#[derive(Debug, Clone, Default)]
pub struct ActivityGuard {
    phase: Arc<Mutex<Phase>>,
}

impl ActivityGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to begin an activity. Returns `None` when another activity is in
    /// flight; the caller treats that as a no-op.
    #[must_use]
    pub fn try_begin(&self, phase: Phase) -> Option<ActivityPermit> {
        if phase == Phase::Idle {
            return None;
        }
        let mut current = self.lock();
        if *current != Phase::Idle {
            return None;
        }
        *current = phase;
        drop(current);
        Some(ActivityPermit {
            phase: Arc::clone(&self.phase),
        })
    }

    /// Phase currently held, `Idle` when free.
    #[must_use]
    pub fn current(&self) -> Phase {
        *self.lock()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.current() != Phase::Idle
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Permit for one running activity; resets the guard to `Idle` on drop.
#[derive(Debug)]
pub struct ActivityPermit {
    phase: Arc<Mutex<Phase>>,
}

impl ActivityPermit {
    /// Move the running activity into a later phase, e.g. `Launching` →
    /// `Extracting` while the launcher unpacks archives.
    pub fn advance(&self, phase: Phase) {
        let mut current = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if phase != Phase::Idle {
            *current = phase;
        }
    }
}

impl Drop for ActivityPermit {
    fn drop(&mut self) {
        let mut current = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        *current = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_refused() {
        let guard = ActivityGuard::new();
        let permit = guard.try_begin(Phase::Launching).unwrap();
        assert!(guard.try_begin(Phase::Scanning).is_none());
        assert_eq!(guard.current(), Phase::Launching);
        drop(permit);
        assert_eq!(guard.current(), Phase::Idle);
        assert!(guard.try_begin(Phase::Scanning).is_some());
    }

    #[test]
    fn advance_moves_phase() {
        let guard = ActivityGuard::new();
        let permit = guard.try_begin(Phase::Launching).unwrap();
        permit.advance(Phase::Extracting);
        assert_eq!(guard.current(), Phase::Extracting);
        drop(permit);
        assert_eq!(guard.current(), Phase::Idle);
    }

    #[test]
    fn permit_resets_on_early_drop() {
        let guard = ActivityGuard::new();
        {
            let _permit = guard.try_begin(Phase::Backup).unwrap();
            assert!(guard.is_busy());
        }
        assert!(!guard.is_busy());
    }

    #[test]
    fn idle_cannot_be_begun() {
        let guard = ActivityGuard::new();
        assert!(guard.try_begin(Phase::Idle).is_none());
    }
}
