//! Error types for the uthread scheduler

use core::fmt;

use crate::id::ThreadId;

/// Result type for scheduler operations
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Errors that can occur in scheduler operations
///
/// The first four kinds are recoverable: the operation returns an error and
/// leaves all scheduler state unchanged. `AllocationFailure` and
/// `SystemCallFailure` are fatal; the library releases every thread resource
/// and terminates the process instead of continuing with a scheduler whose
/// invariants could not be maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    /// Bad argument (non-positive quantum length, broken configuration)
    InvalidArgument(&'static str),

    /// Thread table is full
    CapacityExceeded,

    /// No thread with this identity exists
    UnknownThread(ThreadId),

    /// The operation is not permitted in the current state
    /// (blocking the main thread, re-locking an owned mutex, unlocking a
    /// mutex that is not held, using the library before `init`)
    InvalidOperation(&'static str),

    /// Stack or context construction failed (fatal)
    AllocationFailure,

    /// Timer or signal-handler setup failed (fatal); carries the errno
    SystemCallFailure(i32),
}

impl ThreadError {
    /// Fatal errors abort the process instead of returning to the caller
    #[inline]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            ThreadError::AllocationFailure | ThreadError::SystemCallFailure(_)
        )
    }
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            ThreadError::CapacityExceeded => write!(f, "thread table is full"),
            ThreadError::UnknownThread(tid) => write!(f, "unknown thread id {}", tid),
            ThreadError::InvalidOperation(what) => write!(f, "invalid operation: {}", what),
            ThreadError::AllocationFailure => write!(f, "thread allocation failed"),
            ThreadError::SystemCallFailure(errno) => {
                write!(f, "system call failed (errno {})", errno)
            }
        }
    }
}

impl std::error::Error for ThreadError {}
