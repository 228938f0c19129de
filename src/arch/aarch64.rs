//! aarch64 context switching implementation
//!
//! AAPCS64 callee-saved set: x19-x28, the frame pointer (x29) and link
//! register (x30), plus sp and a resume address.

use std::arch::naked_asm;

/// Callee-saved register set plus stack pointer and resume address
///
/// Offsets are referenced from the assembly below; keep them in sync.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SavedRegs {
    pub sp: u64,        // 0x00
    pub pc: u64,        // 0x08
    pub x: [u64; 10],   // 0x10: x19..x28
    pub fp: u64,        // 0x60: x29
    pub lr: u64,        // 0x68: x30
}

impl SavedRegs {
    pub const fn zeroed() -> Self {
        Self {
            sp: 0,
            pc: 0,
            x: [0; 10],
            fp: 0,
            lr: 0,
        }
    }

    #[inline]
    pub fn stack_pointer(&self) -> u64 {
        self.sp
    }
}

/// Initialize a brand-new thread's context
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
    // sp must stay 16-byte aligned at all times on aarch64
    let aligned_sp = (stack_top as usize) & !0xF;

    let regs = &mut *regs;
    *regs = SavedRegs::zeroed();
    regs.sp = aligned_sp as u64;
    regs.pc = thread_entry_trampoline as usize as u64;
    regs.x[0] = entry_fn as u64; // x19
    regs.x[1] = entry_arg as u64; // x20
}

/// Trampoline that calls the entry function with its argument
#[unsafe(naked)]
pub unsafe extern "C" fn thread_entry_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        "bl {finished}",
        "brk #1",
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
        // Save to save (x0)
        "mov x9, sp",
        "str x9, [x0, #0x00]",
        "adr x9, 1f",
        "str x9, [x0, #0x08]",
        "stp x19, x20, [x0, #0x10]",
        "stp x21, x22, [x0, #0x20]",
        "stp x23, x24, [x0, #0x30]",
        "stp x25, x26, [x0, #0x40]",
        "stp x27, x28, [x0, #0x50]",
        "stp x29, x30, [x0, #0x60]",
        // Load from load (x1)
        "ldp x19, x20, [x1, #0x10]",
        "ldp x21, x22, [x1, #0x20]",
        "ldp x23, x24, [x1, #0x30]",
        "ldp x25, x26, [x1, #0x40]",
        "ldp x27, x28, [x1, #0x50]",
        "ldp x29, x30, [x1, #0x60]",
        "ldr x9, [x1, #0x00]",
        "mov sp, x9",
        "ldr x9, [x1, #0x08]",
        "br x9",
        // Return point for the saved context
        "1:",
        "ret",
    );
}
