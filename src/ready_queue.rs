//! FIFO ready queue
//!
//! Holds exactly the READY threads, in arrival order; the running thread is
//! never a member. Entries carry the slot generation observed when the
//! thread was enqueued so the dispatcher can skip entries that refer to a
//! slot that has since been released and reused.

use std::collections::VecDeque;

use crate::id::ThreadId;

#[derive(Default)]
pub(crate) struct ReadyQueue {
    queue: VecDeque<(ThreadId, u32)>,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Append a thread at the tail (round-robin: back of the line)
    pub(crate) fn push(&mut self, id: ThreadId, generation: u32) {
        self.queue.push_back((id, generation));
    }

    /// Pop the head of the queue
    pub(crate) fn pop(&mut self) -> Option<(ThreadId, u32)> {
        self.queue.pop_front()
    }

    /// Remove a thread from anywhere in the queue; true if it was present
    pub(crate) fn remove(&mut self, id: ThreadId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|&(tid, _)| tid != id);
        self.queue.len() != before
    }

    pub(crate) fn contains(&self, id: ThreadId) -> bool {
        self.queue.iter().any(|&(tid, _)| tid == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
