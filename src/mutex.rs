//! Mutex state machine
//!
//! The single shared mutex: availability flag, owner, and a FIFO queue of
//! waiting threads. This module is pure bookkeeping; suspending a contended
//! caller and resuming a hand-off target go through the scheduler, which is
//! the only component that can block and unblock threads.
//!
//! Unlock hands the lock directly to the longest waiter: the owner field is
//! transferred and the mutex never passes through an "available" window, so
//! the next owner is determined by arrival order rather than a wake-up race.

use std::collections::VecDeque;

use crate::error::{ThreadError, ThreadResult};
use crate::id::ThreadId;

/// Outcome of an acquire attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acquire {
    /// Caller now owns the mutex
    Granted,
    /// Caller was appended to the wait queue and must suspend
    MustWait,
}

pub(crate) struct MutexState {
    available: bool,
    owner: Option<ThreadId>,
    waiters: VecDeque<(ThreadId, u32)>,
}

impl MutexState {
    pub(crate) fn new() -> Self {
        Self {
            available: true,
            owner: None,
            waiters: VecDeque::new(),
        }
    }

    /// Attempt to acquire for `caller`
    ///
    /// `after_wait` distinguishes a caller re-checking after being resumed
    /// from a fresh lock call: finding yourself the owner is a completed
    /// hand-off in the first case and an illegal re-lock in the second.
    pub(crate) fn acquire(
        &mut self,
        caller: ThreadId,
        generation: u32,
        after_wait: bool,
    ) -> ThreadResult<Acquire> {
        if self.owner == Some(caller) {
            if after_wait {
                return Ok(Acquire::Granted);
            }
            return Err(ThreadError::InvalidOperation(
                "mutex is not reentrant; caller already owns it",
            ));
        }
        if self.available {
            self.available = false;
            self.owner = Some(caller);
            return Ok(Acquire::Granted);
        }
        self.waiters.push_back((caller, generation));
        Ok(Acquire::MustWait)
    }

    /// Validate that `caller` may release the mutex
    pub(crate) fn begin_release(&self, caller: ThreadId) -> ThreadResult<()> {
        if self.available {
            return Err(ThreadError::InvalidOperation(
                "mutex is not locked",
            ));
        }
        if self.owner != Some(caller) {
            return Err(ThreadError::InvalidOperation(
                "mutex can only be unlocked by its owner",
            ));
        }
        Ok(())
    }

    /// Pop the longest-waiting thread
    pub(crate) fn pop_waiter(&mut self) -> Option<(ThreadId, u32)> {
        self.waiters.pop_front()
    }

    /// Transfer ownership directly; the mutex stays unavailable
    pub(crate) fn grant(&mut self, to: ThreadId) {
        self.owner = Some(to);
        self.available = false;
    }

    /// No waiters: clear the owner and make the mutex available
    pub(crate) fn make_available(&mut self) {
        self.owner = None;
        self.available = true;
    }

    /// Drop a thread from the wait queue; true if it was waiting
    pub(crate) fn remove_waiter(&mut self, id: ThreadId) -> bool {
        let before = self.waiters.len();
        self.waiters.retain(|&(tid, _)| tid != id);
        self.waiters.len() != before
    }

    pub(crate) fn owner(&self) -> Option<ThreadId> {
        self.owner
    }

    pub(crate) fn is_available(&self) -> bool {
        self.available
    }

    pub(crate) fn waiter_count(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> ThreadId {
        ThreadId::new(n)
    }

    #[test]
    fn test_uncontended_acquire() {
        let mut m = MutexState::new();
        assert_eq!(m.acquire(id(0), 0, false).unwrap(), Acquire::Granted);
        assert_eq!(m.owner(), Some(id(0)));
        assert!(!m.is_available());
    }

    #[test]
    fn test_relock_by_owner_fails() {
        let mut m = MutexState::new();
        m.acquire(id(0), 0, false).unwrap();
        assert!(matches!(
            m.acquire(id(0), 0, false),
            Err(ThreadError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_contended_acquire_waits_fifo() {
        let mut m = MutexState::new();
        m.acquire(id(0), 0, false).unwrap();
        assert_eq!(m.acquire(id(1), 0, false).unwrap(), Acquire::MustWait);
        assert_eq!(m.acquire(id(2), 0, false).unwrap(), Acquire::MustWait);
        assert_eq!(m.waiter_count(), 2);
        assert_eq!(m.pop_waiter(), Some((id(1), 0)));
        assert_eq!(m.pop_waiter(), Some((id(2), 0)));
    }

    #[test]
    fn test_release_validation() {
        let mut m = MutexState::new();
        // Double unlock
        assert!(m.begin_release(id(0)).is_err());

        m.acquire(id(0), 0, false).unwrap();
        // Not the owner
        assert!(m.begin_release(id(1)).is_err());
        assert!(m.begin_release(id(0)).is_ok());
    }

    #[test]
    fn test_handoff_transfers_ownership() {
        let mut m = MutexState::new();
        m.acquire(id(0), 0, false).unwrap();
        m.acquire(id(1), 1, false).unwrap();

        m.begin_release(id(0)).unwrap();
        let (next, _) = m.pop_waiter().unwrap();
        m.grant(next);

        assert_eq!(m.owner(), Some(id(1)));
        assert!(!m.is_available());
        // The hand-off target re-checks with after_wait and succeeds
        assert_eq!(m.acquire(id(1), 1, true).unwrap(), Acquire::Granted);
    }

    #[test]
    fn test_release_with_no_waiters() {
        let mut m = MutexState::new();
        m.acquire(id(0), 0, false).unwrap();
        m.begin_release(id(0)).unwrap();
        assert!(m.pop_waiter().is_none());
        m.make_available();
        assert!(m.is_available());
        assert_eq!(m.owner(), None);
    }

    #[test]
    fn test_remove_waiter() {
        let mut m = MutexState::new();
        m.acquire(id(0), 0, false).unwrap();
        m.acquire(id(1), 0, false).unwrap();
        m.acquire(id(2), 0, false).unwrap();

        assert!(m.remove_waiter(id(1)));
        assert!(!m.remove_waiter(id(1)));
        assert_eq!(m.pop_waiter(), Some((id(2), 0)));
    }
}
