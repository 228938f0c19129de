//! Thread control block

use crate::arch::SavedRegs;
use crate::id::ThreadId;
use crate::stack::ThreadStack;
use crate::state::ThreadState;

/// Entry closure, double-boxed so a thin raw pointer can travel through the
/// trampoline's argument register
pub(crate) type EntryClosure = Box<dyn FnOnce()>;

/// Per-thread state: identity, lifecycle, saved context, private stack,
/// quantum counter
///
/// The thread table is the sole owner of every Tcb; dropping one releases
/// its stack and, if the thread never ran, its entry closure.
pub(crate) struct Tcb {
    pub(crate) id: ThreadId,
    pub(crate) state: ThreadState,
    /// Distinguishes mutex-induced blocking from an explicit block request
    pub(crate) waiting_on_mutex: bool,
    /// Completed dispatches of this thread; bumped on every entry to RUNNING
    pub(crate) quantums: u64,
    /// Slot generation at the time this thread occupied its slot
    pub(crate) generation: u32,
    pub(crate) regs: SavedRegs,
    /// The main thread runs on the process stack and has no private one
    pub(crate) stack: Option<ThreadStack>,
    /// Raw double-boxed entry closure; handed to the trampoline on the first
    /// dispatch, reclaimed by Drop if the thread is destroyed before running
    entry: Option<*mut EntryClosure>,
}

impl Tcb {
    /// Control block for the main thread (identity 0), which adopts the
    /// process stack and is RUNNING from init onward
    pub(crate) fn bootstrap() -> Self {
        Self {
            id: ThreadId::MAIN,
            state: ThreadState::Running,
            waiting_on_mutex: false,
            quantums: 1,
            generation: 0,
            regs: SavedRegs::zeroed(),
            stack: None,
            entry: None,
        }
    }

    /// Control block for a spawned thread, READY and not yet dispatched
    pub(crate) fn new(id: ThreadId, stack: ThreadStack, entry: *mut EntryClosure) -> Self {
        Self {
            id,
            state: ThreadState::Ready,
            waiting_on_mutex: false,
            quantums: 0,
            generation: 0,
            regs: SavedRegs::zeroed(),
            stack: Some(stack),
            entry: Some(entry),
        }
    }

    /// Forget the entry closure pointer once the trampoline owns it
    pub(crate) fn mark_started(&mut self) {
        self.entry = None;
    }

    pub(crate) fn has_started(&self) -> bool {
        self.entry.is_none()
    }
}

impl Drop for Tcb {
    fn drop(&mut self) {
        // Destroyed before the first dispatch: the closure was never handed
        // to the trampoline, so it is still ours to free
        if let Some(ptr) = self.entry.take() {
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_bootstrap_tcb() {
        let tcb = Tcb::bootstrap();
        assert!(tcb.id.is_main());
        assert_eq!(tcb.state, ThreadState::Running);
        assert_eq!(tcb.quantums, 1);
        assert!(tcb.stack.is_none());
        assert!(tcb.has_started());
    }

    #[test]
    fn test_unstarted_tcb_frees_closure_on_drop() {
        let dropped = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dropped);

        struct SetOnDrop(Rc<Cell<bool>>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let guard = SetOnDrop(flag);
        let closure: EntryClosure = Box::new(move || {
            let _keep = &guard;
        });
        let raw = Box::into_raw(Box::new(closure));

        let stack = crate::stack::ThreadStack::allocate(16 * 1024).unwrap();
        let tcb = Tcb::new(ThreadId::new(1), stack, raw);
        assert!(!tcb.has_started());

        drop(tcb);
        assert!(dropped.get());
    }
}
