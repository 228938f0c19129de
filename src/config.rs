//! Scheduler configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder setters
//! 2. Environment variables
//! 3. Library defaults
//!
//! The quantum length is always supplied by the caller of `init`; only the
//! capacity and stack knobs come from the environment.

use crate::env::{env_get, env_get_bool};
use crate::error::{ThreadError, ThreadResult};

/// Default maximum number of concurrent threads, main thread included
pub const DEFAULT_MAX_THREADS: usize = 100;

/// Default usable stack size per spawned thread (bytes)
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Smallest usable stack accepted by `validate`
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Scheduler configuration with builder-style setters
///
/// Environment variables (all optional):
/// - `UT_MAX_THREADS` - Maximum concurrent threads
/// - `UT_STACK_SIZE` - Usable stack bytes per spawned thread
/// - `UT_DEBUG` - Log every lifecycle event at debug level (0/1)
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Quantum length in microseconds; must be positive
    pub quantum_usecs: i64,
    /// Maximum concurrent threads, main thread included
    pub max_threads: usize,
    /// Usable stack size per spawned thread (a guard page is added below it)
    pub stack_size: usize,
    /// Enable debug logging of lifecycle events
    pub debug_logging: bool,
}

impl SchedulerConfig {
    /// Create config for the given quantum, with environment overrides for
    /// the remaining knobs
    pub fn from_env(quantum_usecs: i64) -> Self {
        Self {
            quantum_usecs,
            max_threads: env_get("UT_MAX_THREADS", DEFAULT_MAX_THREADS),
            stack_size: env_get("UT_STACK_SIZE", DEFAULT_STACK_SIZE),
            debug_logging: env_get_bool("UT_DEBUG", false),
        }
    }

    /// Set the maximum number of concurrent threads
    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    /// Set the usable stack size per spawned thread
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Enable or disable debug logging
    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ThreadResult<()> {
        if self.quantum_usecs <= 0 {
            return Err(ThreadError::InvalidArgument(
                "quantum length must be a positive number of microseconds",
            ));
        }
        if self.max_threads < 1 {
            return Err(ThreadError::InvalidArgument(
                "max_threads must allow at least the main thread",
            ));
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ThreadError::InvalidArgument("stack_size is too small"));
        }
        Ok(())
    }
}
