//! Preemption driver
//!
//! A periodic virtual-CPU timer (`setitimer(ITIMER_VIRTUAL)`) delivers
//! SIGVTALRM at every quantum expiry; the handler invokes the dispatcher.
//! All scheduler bookkeeping runs inside a critical section that masks the
//! timer signal, so a half-updated ready queue can never be observed by a
//! reentrant dispatch. That mask is the library's sole synchronization
//! primitive: only one logical thread executes at any instant, so nothing
//! finer-grained is needed.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use nix::sys::signal::{sigaction, sigprocmask, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};

use crate::error::{ThreadError, ThreadResult};
use crate::scheduler;

/// Signal paired with ITIMER_VIRTUAL
const PREEMPT_SIGNAL: Signal = Signal::SIGVTALRM;

static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Outstanding critical sections; the signal is unmasked only at depth zero
static PREEMPT_DEPTH: AtomicU32 = AtomicU32::new(0);

fn preempt_sigset() -> SigSet {
    let mut set = SigSet::empty();
    set.add(PREEMPT_SIGNAL);
    set
}

/// RAII critical section suppressing timer-driven dispatch
///
/// Every dispatch happens at depth exactly one: the handler and each public
/// API entry point take a single guard, and internal calls never nest
/// another. A thread that suspends mid-section leaves the global depth at
/// one for whichever thread the dispatcher switches to, whose own pending
/// guard (or adopted release, for a first activation) restores depth zero.
pub(crate) struct CriticalSection {
    _not_send: PhantomData<*const ()>,
}

impl CriticalSection {
    pub(crate) fn enter() -> Self {
        if PREEMPT_DEPTH.fetch_add(1, Ordering::SeqCst) == 0 {
            let _ = sigprocmask(SigmaskHow::SIG_BLOCK, Some(&preempt_sigset()), None);
        }
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        if PREEMPT_DEPTH.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&preempt_sigset()), None);
        }
    }
}

/// Release the critical section a freshly activated thread inherits
///
/// The dispatch that switched to a brand-new thread entered its guard on a
/// stack this thread will never return to, so the entry path releases it by
/// hand before running user code.
pub(crate) fn leave_adopted_section() {
    if PREEMPT_DEPTH.fetch_sub(1, Ordering::SeqCst) == 1 {
        let _ = sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&preempt_sigset()), None);
    }
}

/// Timer expiry: quantum is up, dispatch the next ready thread
extern "C" fn timer_expired(_sig: libc::c_int) {
    let _cs = CriticalSection::enter();
    scheduler::preempt_current();
}

/// Install the SIGVTALRM handler; idempotent
pub(crate) fn install_timer_handler() -> ThreadResult<()> {
    if HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let action = SigAction::new(
        SigHandler::Handler(timer_expired),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe { sigaction(PREEMPT_SIGNAL, &action) }
        .map(|_| ())
        .map_err(|e| {
            HANDLER_INSTALLED.store(false, Ordering::SeqCst);
            ThreadError::SystemCallFailure(e as i32)
        })
}

/// Arm (or re-arm) the periodic quantum timer
///
/// Called at init and again at every dispatch, so each thread entering
/// RUNNING receives a full quantum.
pub(crate) fn arm_timer(quantum_usecs: i64) -> ThreadResult<()> {
    set_timer(quantum_usecs)
}

/// Stop the timer; used during teardown
pub(crate) fn disarm_timer() -> ThreadResult<()> {
    set_timer(0)
}

fn set_timer(usecs: i64) -> ThreadResult<()> {
    let interval = libc::timeval {
        tv_sec: (usecs / 1_000_000) as libc::time_t,
        tv_usec: (usecs % 1_000_000) as libc::suseconds_t,
    };
    let timer = libc::itimerval {
        it_interval: interval,
        it_value: interval,
    };
    let ret = unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &timer, std::ptr::null_mut()) };
    if ret != 0 {
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        return Err(ThreadError::SystemCallFailure(errno));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_section_depth() {
        assert_eq!(PREEMPT_DEPTH.load(Ordering::SeqCst), 0);
        {
            let _outer = CriticalSection::enter();
            assert_eq!(PREEMPT_DEPTH.load(Ordering::SeqCst), 1);
            {
                let _inner = CriticalSection::enter();
                assert_eq!(PREEMPT_DEPTH.load(Ordering::SeqCst), 2);
            }
            assert_eq!(PREEMPT_DEPTH.load(Ordering::SeqCst), 1);
        }
        assert_eq!(PREEMPT_DEPTH.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disarm_without_arming_succeeds() {
        // setitimer with a zero interval is a valid "stop" request
        assert!(disarm_timer().is_ok());
    }
}
