//! # uthread - User-Level Thread Scheduler
//!
//! Preemptive round-robin green threads for Rust, multiplexed onto the one
//! OS thread that calls [`init`].
//!
//! ## Features
//!
//! - **Lightweight**: 64KB stacks (configurable) with a guard page, allocated
//!   via `mmap`
//! - **Preemptive**: `ITIMER_VIRTUAL` + `SIGVTALRM` enforce the quantum on
//!   CPU-bound threads
//! - **Fair**: strict FIFO ready queue, preempted threads rejoin at the tail
//! - **Synchronization**: one shared mutex with direct FIFO ownership hand-off
//!
//! ## Quick Start
//!
//! ```ignore
//! use uthread::ThreadId;
//!
//! fn main() {
//!     uthread::init(100_000).unwrap();
//!
//!     let worker = uthread::spawn(|| {
//!         println!("hello from thread {}", uthread::get_tid().unwrap());
//!         uthread::yield_now().unwrap();
//!     })
//!     .unwrap();
//!
//!     while uthread::get_quantums(worker).is_ok() {
//!         uthread::yield_now().unwrap();
//!     }
//!     uthread::terminate(ThreadId::MAIN).unwrap();
//! }
//! ```
//!
//! ## Semantics
//!
//! The calling thread becomes thread 0 (the main thread). It can never be
//! blocked, and terminating it ends the whole process with exit code 0.
//! Every other thread is spawned with the smallest free id, runs whole
//! quantums, and may be blocked, resumed or terminated by id. Quantum
//! counts measure virtual CPU time: a thread's count is the number of times
//! it entered RUNNING, and the global count is the total across all threads
//! (the quantum running at init counts as the first).
//!
//! Fatal conditions (stack allocation failure, timer or signal syscall
//! failure) release every thread resource and end the process with exit
//! code 1.
//!
//! This is a single-OS-thread library: every call must come from the OS
//! thread that ran [`init`] (that is, from a thread the scheduler itself
//! dispatched).

#[cfg(not(unix))]
compile_error!("uthread requires a Unix platform (mmap, sigaction, setitimer)");

pub mod arch;
pub mod config;
pub mod env;
pub mod error;
pub mod id;
pub mod kprint;
mod mutex;
mod preempt;
mod ready_queue;
mod scheduler;
mod stack;
mod state;
mod table;
mod tcb;

pub use config::{SchedulerConfig, DEFAULT_MAX_THREADS, DEFAULT_STACK_SIZE};
pub use error::{ThreadError, ThreadResult};
pub use id::ThreadId;
pub use kprint::LogLevel;
pub use state::ThreadState;

/// Initialize the scheduler with the default configuration and the given
/// quantum length in microseconds of virtual CPU time
///
/// The calling OS thread becomes thread 0, RUNNING, in its first quantum.
/// Fails with `InvalidArgument` for a non-positive quantum and with
/// `InvalidOperation` when already initialized.
pub fn init(quantum_usecs: i64) -> ThreadResult<()> {
    scheduler::init_scheduler(SchedulerConfig::from_env(quantum_usecs))
}

/// Initialize the scheduler with an explicit configuration
pub fn init_with_config(config: SchedulerConfig) -> ThreadResult<()> {
    scheduler::init_scheduler(config)
}

/// Create a new READY thread running `f`, at the tail of the ready queue
///
/// Returns the new thread's id, the smallest id not currently in use
/// (never 0). Fails with `CapacityExceeded` when `max_threads` threads are
/// alive.
pub fn spawn<F>(f: F) -> ThreadResult<ThreadId>
where
    F: FnOnce() + 'static,
{
    scheduler::spawn_thread(Box::new(f))
}

/// Destroy a thread and release its resources
///
/// Terminating thread 0 tears the library down and exits the process with
/// code 0; `terminate(tid)` for the calling thread does not return. A
/// terminated id becomes immediately reusable by [`spawn`].
pub fn terminate(tid: ThreadId) -> ThreadResult<()> {
    scheduler::terminate_request(tid)
}

/// Move a thread to BLOCKED; blocking the calling thread dispatches away
/// immediately
///
/// Blocking thread 0 is `InvalidOperation`. Blocking an already-blocked
/// thread is a no-op.
pub fn block(tid: ThreadId) -> ThreadResult<()> {
    scheduler::block_request(tid)
}

/// Make a BLOCKED thread READY at the tail of the queue; a no-op for a
/// thread that is not blocked. Never causes an immediate switch.
pub fn resume(tid: ThreadId) -> ThreadResult<()> {
    scheduler::resume_request(tid)
}

/// Voluntarily end the current quantum and go to the back of the ready
/// queue
///
/// When no other thread is ready the caller keeps running in a fresh
/// quantum (counters advance, the timer re-arms).
pub fn yield_now() -> ThreadResult<()> {
    scheduler::yield_request()
}

/// Id of the calling thread
pub fn get_tid() -> ThreadResult<ThreadId> {
    scheduler::current_tid()
}

/// Total quantums started since [`init`], across all threads
pub fn get_total_quantums() -> ThreadResult<u64> {
    scheduler::total_quantums()
}

/// Number of quantums `tid` has started, including a currently running one
pub fn get_quantums(tid: ThreadId) -> ThreadResult<u64> {
    scheduler::thread_quantums(tid)
}

/// Acquire the shared mutex, blocking the caller until ownership arrives
///
/// An unlock hands ownership directly to the longest-waiting thread, so the
/// mutex is never observed available while a waiter exists. Re-locking by
/// the owner is `InvalidOperation`.
pub fn mutex_lock() -> ThreadResult<()> {
    scheduler::mutex_lock_request()
}

/// Release the shared mutex
///
/// Only the owner may unlock; anything else is `InvalidOperation`.
pub fn mutex_unlock() -> ThreadResult<()> {
    scheduler::mutex_unlock_request()
}
