//! Scheduler core
//!
//! Owns the singleton scheduler state: thread table, ready queue, running
//! thread, quantum counters and the shared mutex. Dispatch saves the running
//! thread's context, rotates the ready queue and restores the next thread's
//! context; everything else is bookkeeping around that switch.
//!
//! All entry points take one preemption-suppressing critical section, so
//! every context switch happens at critical-section depth exactly one (see
//! `preempt::CriticalSection`).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::addr_of_mut;

use crate::arch::{self, SavedRegs};
use crate::config::SchedulerConfig;
use crate::error::{ThreadError, ThreadResult};
use crate::id::ThreadId;
use crate::mutex::{Acquire, MutexState};
use crate::preempt::{self, CriticalSection};
use crate::ready_queue::ReadyQueue;
use crate::stack::ThreadStack;
use crate::state::ThreadState;
use crate::table::ThreadTable;
use crate::tcb::{EntryClosure, Tcb};
use crate::{kdebug, kerror, kinfo};

/// Global scheduler instance, created by `init`
static mut SCHEDULER: Option<Scheduler> = None;

fn scheduler() -> Option<&'static mut Scheduler> {
    unsafe { (*addr_of_mut!(SCHEDULER)).as_mut() }
}

fn scheduler_or_err() -> ThreadResult<&'static mut Scheduler> {
    scheduler().ok_or(ThreadError::InvalidOperation(
        "scheduler is not initialized",
    ))
}

/// Why the running thread is giving up the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwitchCause {
    /// Quantum expiry or voluntary yield; the thread goes to the back of
    /// the ready queue
    Preempt,
    /// The thread blocked (explicitly or on the mutex); not re-enqueued
    Block,
    /// The thread is terminating; its context is not preserved
    Terminate,
}

/// Result of picking the next thread to run
enum Selected {
    /// Save into `save`, restore from `load`
    Switch {
        save: *mut SavedRegs,
        load: *const SavedRegs,
    },
    /// The running thread won its own slot back; no switch needed
    InPlace,
    /// Nothing is runnable
    NoneReady,
}

pub(crate) struct Scheduler {
    config: SchedulerConfig,
    table: ThreadTable,
    ready: ReadyQueue,
    running: ThreadId,
    /// Total dispatches since init; starts at 1 for the main thread's first
    total_quantums: u64,
    mutex: MutexState,
    /// Tcb of a self-terminated thread, parked until the switch away from
    /// its stack has completed
    graveyard: Option<Tcb>,
    /// Save target for a terminating thread's final switch
    scratch_regs: SavedRegs,
}

impl Scheduler {
    fn new(config: SchedulerConfig) -> Self {
        let mut table = ThreadTable::new(config.max_threads);
        table.insert(Tcb::bootstrap());
        Self {
            config,
            table,
            ready: ReadyQueue::new(),
            running: ThreadId::MAIN,
            total_quantums: 1,
            mutex: MutexState::new(),
            graveyard: None,
            scratch_regs: SavedRegs::zeroed(),
        }
    }

    fn spawn_inner(&mut self, entry: EntryClosure) -> ThreadResult<ThreadId> {
        let id = self.table.first_free()?;
        let stack = ThreadStack::allocate(self.config.stack_size)?;
        let top = stack.top();

        let raw = Box::into_raw(Box::new(entry));
        let mut tcb = Tcb::new(id, stack, raw);
        unsafe {
            arch::init_context(&mut tcb.regs, top, thread_start as usize, raw as usize);
        }

        let generation = self.table.insert(tcb);
        self.ready.push(id, generation);
        if self.config.debug_logging {
            kdebug!("spawned thread {}", id);
        }
        Ok(id)
    }

    /// Mark a thread BLOCKED; returns true when the caller must dispatch
    /// because the blocked thread is the running one
    ///
    /// `explicit` distinguishes a user block request (forbidden for the
    /// main thread) from mutex-induced blocking (allowed for every thread).
    fn block_thread(&mut self, tid: ThreadId, explicit: bool) -> ThreadResult<bool> {
        if explicit && tid.is_main() {
            return Err(ThreadError::InvalidOperation(
                "the main thread cannot be blocked",
            ));
        }
        let tcb = self
            .table
            .get_mut(tid)
            .ok_or(ThreadError::UnknownThread(tid))?;
        match tcb.state {
            // Already blocked: a second request is a no-op
            ThreadState::Blocked => Ok(false),
            ThreadState::Running => {
                tcb.state = ThreadState::Blocked;
                tcb.waiting_on_mutex = !explicit;
                Ok(true)
            }
            ThreadState::Ready => {
                tcb.state = ThreadState::Blocked;
                tcb.waiting_on_mutex = !explicit;
                self.ready.remove(tid);
                Ok(false)
            }
            ThreadState::Terminated => Err(ThreadError::UnknownThread(tid)),
        }
    }

    /// Make a blocked thread READY again; no-op for any other state.
    /// Never dispatches.
    fn resume_thread(&mut self, tid: ThreadId) -> ThreadResult<()> {
        let tcb = self
            .table
            .get_mut(tid)
            .ok_or(ThreadError::UnknownThread(tid))?;
        if tcb.state != ThreadState::Blocked {
            return Ok(());
        }
        tcb.state = ThreadState::Ready;
        tcb.waiting_on_mutex = false;
        let generation = tcb.generation;
        // A waiter resumed from outside the mutex leaves the wait queue and
        // recontends inside lock()
        self.mutex.remove_waiter(tid);
        self.ready.push(tid, generation);
        Ok(())
    }

    /// Destroy a thread that is not currently executing
    fn terminate_other(&mut self, tid: ThreadId) -> ThreadResult<()> {
        if !self.table.contains(tid) {
            return Err(ThreadError::UnknownThread(tid));
        }
        self.ready.remove(tid);
        self.mutex.remove_waiter(tid);
        if self.mutex.owner() == Some(tid) {
            self.hand_off_or_release();
        }
        drop(self.table.release(tid));
        if self.config.debug_logging {
            kdebug!("terminated thread {}", tid);
        }
        Ok(())
    }

    /// Pull the running thread out of the table ahead of its final switch;
    /// its stack and context stay alive in the graveyard until the dispatch
    /// away from it has completed
    fn prepare_terminate_running(&mut self) {
        let tid = self.running;
        if self.mutex.owner() == Some(tid) {
            self.hand_off_or_release();
        }
        if let Some(mut tcb) = self.table.release(tid) {
            tcb.state = ThreadState::Terminated;
            debug_assert!(self.graveyard.is_none());
            self.graveyard = Some(tcb);
        }
        if self.config.debug_logging {
            kdebug!("terminating running thread {}", tid);
        }
    }

    /// Release the graveyard Tcb; called once execution has moved to a
    /// different thread's stack
    fn reap(&mut self) {
        self.graveyard.take();
    }

    /// Acquire attempt on behalf of the running thread; MustWait leaves the
    /// caller BLOCKED and expects it to dispatch
    fn mutex_acquire_step(&mut self, after_wait: bool) -> ThreadResult<Acquire> {
        let caller = self.running;
        let generation = self
            .table
            .get(caller)
            .map(|t| t.generation)
            .ok_or(ThreadError::UnknownThread(caller))?;
        match self.mutex.acquire(caller, generation, after_wait)? {
            Acquire::Granted => Ok(Acquire::Granted),
            Acquire::MustWait => {
                self.block_thread(caller, false)?;
                Ok(Acquire::MustWait)
            }
        }
    }

    /// Release on behalf of the running thread
    fn mutex_release(&mut self) -> ThreadResult<()> {
        let caller = self.running;
        self.mutex.begin_release(caller)?;
        self.hand_off_or_release();
        Ok(())
    }

    /// Transfer ownership to the longest live waiter, or make the mutex
    /// available when none remains
    fn hand_off_or_release(&mut self) {
        loop {
            match self.mutex.pop_waiter() {
                Some((tid, generation)) => {
                    // Stale entry: the slot was released or reused
                    if !self.table.is_current(tid, generation) {
                        continue;
                    }
                    self.mutex.grant(tid);
                    let _ = self.resume_thread(tid);
                    return;
                }
                None => {
                    self.mutex.make_available();
                    return;
                }
            }
        }
    }

    /// Round-robin selection: rotate (on preemption), pop the next READY
    /// thread, mark it RUNNING, bump counters, re-arm the quantum timer
    fn select_next(&mut self, cause: SwitchCause) -> Selected {
        let prev = self.running;

        if cause == SwitchCause::Preempt {
            if let Some(tcb) = self.table.get_mut(prev) {
                tcb.state = ThreadState::Ready;
                let generation = tcb.generation;
                self.ready.push(prev, generation);
            }
        }

        let next = loop {
            match self.ready.pop() {
                Some((tid, generation)) => {
                    if !self.table.is_current(tid, generation) {
                        continue;
                    }
                    // Skip entries for threads blocked since they were
                    // enqueued; queue membership normally matches READY
                    let runnable = self
                        .table
                        .get(tid)
                        .is_some_and(|t| t.state.is_runnable());
                    if !runnable {
                        continue;
                    }
                    break tid;
                }
                None => return Selected::NoneReady,
            }
        };

        if let Some(tcb) = self.table.get_mut(next) {
            tcb.state = ThreadState::Running;
            tcb.quantums += 1;
            tcb.mark_started();
        }
        self.total_quantums += 1;
        self.running = next;

        // Every thread entering RUNNING gets a full quantum
        if let Err(e) = preempt::arm_timer(self.config.quantum_usecs) {
            fatal(e);
        }

        if next == prev {
            return Selected::InPlace;
        }

        let save = match cause {
            SwitchCause::Terminate => &mut self.scratch_regs as *mut SavedRegs,
            _ => match self.table.get_mut(prev) {
                Some(tcb) => &mut tcb.regs as *mut SavedRegs,
                None => &mut self.scratch_regs as *mut SavedRegs,
            },
        };
        let load = match self.table.get(next) {
            Some(tcb) => &tcb.regs as *const SavedRegs,
            None => return Selected::NoneReady,
        };
        Selected::Switch { save, load }
    }
}

/// Suspend the running thread and resume the next READY one
///
/// For `Terminate` this never returns. For the other causes it returns once
/// some later dispatch switches back to the suspended thread.
pub(crate) fn dispatch(cause: SwitchCause) {
    let outcome = match scheduler() {
        Some(sched) => sched.select_next(cause),
        None => return,
    };
    match outcome {
        Selected::InPlace => {}
        Selected::NoneReady => {
            // Cannot happen while the main thread is in rotation
            kerror!("system error: no runnable thread");
            teardown_and_exit(1);
        }
        Selected::Switch { save, load } => {
            unsafe { arch::context_switch(save, load) };
            // Back on this thread's stack; a self-terminated predecessor
            // can be released now
            if let Some(sched) = scheduler() {
                sched.reap();
            }
        }
    }
}

/// Timer expiry entry point (called from the signal handler's critical
/// section)
pub(crate) fn preempt_current() {
    if scheduler().is_some() {
        dispatch(SwitchCause::Preempt);
    }
}

/// First code a spawned thread runs, via the arch trampoline
pub(crate) extern "C" fn thread_start(closure_ptr: usize) {
    // The dispatch that activated this thread is still holding its critical
    // section; finish its bookkeeping and release it before user code runs
    if let Some(sched) = scheduler() {
        sched.reap();
    }
    preempt::leave_adopted_section();

    let entry: Box<EntryClosure> = unsafe { Box::from_raw(closure_ptr as *mut EntryClosure) };
    if catch_unwind(AssertUnwindSafe(entry)).is_err() {
        kerror!("thread entry panicked; terminating the thread");
    }
}

/// Entry function returned (or panicked): terminate the running thread.
/// Referenced by the arch trampolines; never returns.
pub(crate) extern "C" fn thread_finished() {
    let _cs = CriticalSection::enter();
    if let Some(sched) = scheduler() {
        sched.prepare_terminate_running();
        dispatch(SwitchCause::Terminate);
    }
    unreachable!("terminated thread was dispatched again");
}

/// Construct the scheduler singleton, install the timer handler and arm the
/// quantum timer
pub(crate) fn init_scheduler(config: SchedulerConfig) -> ThreadResult<()> {
    let _cs = CriticalSection::enter();
    config.validate()?;
    if scheduler().is_some() {
        return Err(ThreadError::InvalidOperation(
            "scheduler is already initialized",
        ));
    }

    let quantum_usecs = config.quantum_usecs;
    let max_threads = config.max_threads;
    unsafe {
        *addr_of_mut!(SCHEDULER) = Some(Scheduler::new(config));
    }

    if let Err(e) = preempt::install_timer_handler() {
        fatal(e);
    }
    if let Err(e) = preempt::arm_timer(quantum_usecs) {
        fatal(e);
    }

    kinfo!(
        "scheduler initialized: quantum {}us, up to {} threads",
        quantum_usecs,
        max_threads
    );
    Ok(())
}

pub(crate) fn spawn_thread(entry: EntryClosure) -> ThreadResult<ThreadId> {
    let _cs = CriticalSection::enter();
    let sched = scheduler_or_err()?;
    match sched.spawn_inner(entry) {
        Err(e) if e.is_fatal() => fatal(e),
        other => other,
    }
}

pub(crate) fn block_request(tid: ThreadId) -> ThreadResult<()> {
    let _cs = CriticalSection::enter();
    let sched = scheduler_or_err()?;
    if sched.block_thread(tid, true)? {
        dispatch(SwitchCause::Block);
    }
    Ok(())
}

pub(crate) fn resume_request(tid: ThreadId) -> ThreadResult<()> {
    let _cs = CriticalSection::enter();
    scheduler_or_err()?.resume_thread(tid)
}

pub(crate) fn yield_request() -> ThreadResult<()> {
    let _cs = CriticalSection::enter();
    scheduler_or_err()?;
    dispatch(SwitchCause::Preempt);
    Ok(())
}

pub(crate) fn terminate_request(tid: ThreadId) -> ThreadResult<()> {
    let _cs = CriticalSection::enter();
    let sched = scheduler_or_err()?;
    if !sched.table.contains(tid) {
        return Err(ThreadError::UnknownThread(tid));
    }
    if tid.is_main() {
        // The only orderly shutdown path
        teardown_and_exit(0);
    }
    if tid == sched.running {
        sched.prepare_terminate_running();
        dispatch(SwitchCause::Terminate);
        unreachable!("terminated thread was dispatched again");
    }
    sched.terminate_other(tid)
}

pub(crate) fn current_tid() -> ThreadResult<ThreadId> {
    let _cs = CriticalSection::enter();
    Ok(scheduler_or_err()?.running)
}

pub(crate) fn total_quantums() -> ThreadResult<u64> {
    let _cs = CriticalSection::enter();
    Ok(scheduler_or_err()?.total_quantums)
}

pub(crate) fn thread_quantums(tid: ThreadId) -> ThreadResult<u64> {
    let _cs = CriticalSection::enter();
    let sched = scheduler_or_err()?;
    sched
        .table
        .get(tid)
        .map(|t| t.quantums)
        .ok_or(ThreadError::UnknownThread(tid))
}

pub(crate) fn mutex_lock_request() -> ThreadResult<()> {
    let _cs = CriticalSection::enter();
    let mut after_wait = false;
    loop {
        let sched = scheduler_or_err()?;
        match sched.mutex_acquire_step(after_wait)? {
            Acquire::Granted => return Ok(()),
            Acquire::MustWait => {
                after_wait = true;
                dispatch(SwitchCause::Block);
                // Resumed: either the unlock handed us ownership or an
                // external resume put us back in contention; re-check
            }
        }
    }
}

pub(crate) fn mutex_unlock_request() -> ThreadResult<()> {
    let _cs = CriticalSection::enter();
    scheduler_or_err()?.mutex_release()
}

/// Fatal failure: scheduler invariants cannot be maintained
fn fatal(err: ThreadError) -> ! {
    kerror!("system error: {}", err);
    teardown_and_exit(1)
}

/// Release every thread resource except the stack currently executing,
/// then end the process
fn teardown_and_exit(code: i32) -> ! {
    let _ = preempt::disarm_timer();
    if let Some(sched) = scheduler() {
        // A graveyard occupant at this point means the fatal condition was
        // hit during its final dispatch, so its stack is the one executing
        // this code; leak it rather than unmap it from under ourselves
        if let Some(tcb) = sched.graveyard.take() {
            std::mem::forget(tcb);
        }
        let running = sched.running;
        for tid in sched.table.live_ids() {
            if tid == running {
                continue;
            }
            drop(sched.table.release(tid));
        }
        // Never unmap the stack we are standing on; the OS reclaims it
        if let Some(tcb) = sched.table.release(running) {
            std::mem::forget(tcb);
        }
    }
    std::process::exit(code)
}
