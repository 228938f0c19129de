//! x86_64 context switching implementation
//!
//! Uses inline assembly for the context switch. naked_asm is stable in
//! Rust 1.88+.

use std::arch::naked_asm;

/// Callee-saved register set plus stack pointer and resume address
///
/// Offsets are referenced from the assembly below; keep them in sync.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SavedRegs {
    pub rsp: u64, // 0x00
    pub rip: u64, // 0x08
    pub rbx: u64, // 0x10
    pub rbp: u64, // 0x18
    pub r12: u64, // 0x20
    pub r13: u64, // 0x28
    pub r14: u64, // 0x30
    pub r15: u64, // 0x38
}

impl SavedRegs {
    pub const fn zeroed() -> Self {
        Self {
            rsp: 0,
            rip: 0,
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
        }
    }

    #[inline]
    pub fn stack_pointer(&self) -> u64 {
        self.rsp
    }
}

/// Initialize a brand-new thread's context
///
/// Sets up the register state so that the first switch into it begins
/// executing `entry_fn(entry_arg)` at the top of `stack_top`'s stack.
///
/// # Safety
///
/// `regs` must point to valid `SavedRegs` memory. `stack_top` must be the
/// high end of an unused, exclusively-owned stack buffer.
#[inline]
pub unsafe fn init_context(
    regs: *mut SavedRegs,
    stack_top: *mut u8,
    entry_fn: usize,
    entry_arg: usize,
) {
    // 16-byte aligned at trampoline entry, so rsp % 16 == 8 inside the
    // entry function per the System V AMD64 ABI
    let aligned_sp = (stack_top as usize) & !0xF;

    let regs = &mut *regs;
    regs.rsp = aligned_sp as u64;
    regs.rip = thread_entry_trampoline as usize as u64;
    regs.rbx = 0;
    regs.rbp = 0;
    regs.r12 = entry_fn as u64;
    regs.r13 = entry_arg as u64;
    regs.r14 = 0;
    regs.r15 = 0;
}

/// Trampoline that calls the entry function with its argument
///
/// The entry function returns here when the thread's body completes; control
/// then moves to the termination path and never comes back.
#[unsafe(naked)]
pub unsafe extern "C" fn thread_entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "call {finished}",
        "ud2",
        finished = sym crate::scheduler::thread_finished,
    );
}

/// Switch execution contexts
///
/// Saves callee-saved registers to `save` and loads from `load`. Returns
/// only when some later switch restores `save`.
///
/// # Safety
///
/// Both pointers must be valid; `load` must hold a context produced by
/// `init_context` or by a previous save, whose stack is still alive.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_save: *mut SavedRegs, _load: *const SavedRegs) {
    naked_asm!(
        // Save callee-saved registers to save (RDI)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        // Load callee-saved registers from load (RSI)
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        // Jump to new RIP
        "jmp rax",
        // Return point for the saved context
        "1:",
        "ret",
    );
}
