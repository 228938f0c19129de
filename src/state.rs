//! Thread lifecycle state

use core::fmt;

/// Lifecycle state of a user-level thread
///
/// `Terminated` is transient: a thread enters it only on the way to having
/// its table slot cleared and its resources released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Runnable, waiting in the ready queue
    Ready = 0,

    /// Currently executing (exactly one thread at a time)
    Running = 1,

    /// Suspended; not in rotation until explicitly resumed
    Blocked = 2,

    /// Finished; slot about to be released
    Terminated = 3,
}

impl ThreadState {
    /// Check if this state allows the thread to be dispatched
    #[inline]
    pub const fn is_runnable(&self) -> bool {
        matches!(self, ThreadState::Ready)
    }

    /// Check if this thread is suspended
    #[inline]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, ThreadState::Blocked)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadState::Ready => write!(f, "READY"),
            ThreadState::Running => write!(f, "RUNNING"),
            ThreadState::Blocked => write!(f, "BLOCKED"),
            ThreadState::Terminated => write!(f, "TERMINATED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(ThreadState::Ready.is_runnable());
        assert!(!ThreadState::Running.is_runnable());
        assert!(!ThreadState::Blocked.is_runnable());
        assert!(!ThreadState::Terminated.is_runnable());

        assert!(ThreadState::Blocked.is_blocked());
        assert!(!ThreadState::Ready.is_blocked());
    }
}
