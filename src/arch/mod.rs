//! Architecture-specific execution context primitive
//!
//! The one inherently unsafe, platform-specific piece of the library: saving
//! and restoring register state so a thread can be suspended at an arbitrary
//! point and resumed later as if the switch call had just returned. Every
//! other module only uses `SavedRegs`, `init_context` and `context_switch`.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub use x86_64::{SavedRegs, init_context, context_switch};
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use aarch64::{SavedRegs, init_context, context_switch};
    } else {
        compile_error!("Unsupported architecture");
    }
}
