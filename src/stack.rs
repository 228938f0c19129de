//! Per-thread stack memory
//!
//! Each spawned thread owns a private mmap'd stack with a PROT_NONE guard
//! page at the low end, so overflow faults instead of silently corrupting a
//! neighbouring allocation. The main thread runs on the process stack and
//! never owns one of these.

use crate::error::{ThreadError, ThreadResult};

const PAGE_SIZE: usize = 4096;

/// An exclusively-owned thread stack
///
/// Layout (addresses grow upward, the stack grows downward):
///
/// ```text
/// base                      base + PAGE_SIZE              base + total
///  | guard page (PROT_NONE) | usable stack ............... | <- top()
/// ```
pub(crate) struct ThreadStack {
    base: *mut u8,
    total: usize,
}

impl ThreadStack {
    /// Map a new stack with `usable` bytes above a guard page
    pub(crate) fn allocate(usable: usize) -> ThreadResult<Self> {
        let usable = round_up(usable, PAGE_SIZE);
        let total = usable + PAGE_SIZE;

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                total,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(ThreadError::AllocationFailure);
        }
        let base = base as *mut u8;

        // Guard page at the low end
        let ret = unsafe { libc::mprotect(base as *mut libc::c_void, PAGE_SIZE, libc::PROT_NONE) };
        if ret != 0 {
            unsafe {
                libc::munmap(base as *mut libc::c_void, total);
            }
            return Err(ThreadError::AllocationFailure);
        }

        Ok(Self { base, total })
    }

    /// Highest address of the stack; initial stack pointer before alignment
    #[inline]
    pub(crate) fn top(&self) -> *mut u8 {
        unsafe { self.base.add(self.total) }
    }

    /// Usable bytes between the guard page and the top
    #[inline]
    pub(crate) fn usable_size(&self) -> usize {
        self.total - PAGE_SIZE
    }
}

impl Drop for ThreadStack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.total);
        }
    }
}

#[inline]
fn round_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_drop() {
        let stack = ThreadStack::allocate(64 * 1024).unwrap();
        assert_eq!(stack.usable_size(), 64 * 1024);
        assert!(!stack.top().is_null());
        drop(stack);
    }

    #[test]
    fn test_rounds_to_page_size() {
        let stack = ThreadStack::allocate(10_000).unwrap();
        assert_eq!(stack.usable_size() % PAGE_SIZE, 0);
        assert!(stack.usable_size() >= 10_000);
    }

    #[test]
    fn test_top_is_writable() {
        let stack = ThreadStack::allocate(16 * 1024).unwrap();
        unsafe {
            let p = stack.top().sub(8) as *mut u64;
            p.write(0xDEAD_BEEF);
            assert_eq!(p.read(), 0xDEAD_BEEF);
        }
    }
}
