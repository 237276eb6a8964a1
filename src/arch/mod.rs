//! Architecture-specific register save/restore.
//!
//! Each backend exposes the same three items: a `Registers` struct big
//! enough to hold the callee-saved set and stack pointer for that ABI, a
//! `switch_regs` routine implementing the contract of spec.md §4.1, and an
//! `init_stack` routine that arranges a freshly allocated stack so the first
//! `switch_regs` into it lands in [`crate::trampoline::trampoline`].
//!
//! `switch_regs` is the one genuinely non-portable piece of this crate;
//! everything above this module is ordinary, arch-independent data
//! structures, per spec.md §9.

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use x86_64::{init_stack, switch_regs, Registers, STACK_ALIGN};

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use aarch64::{init_stack, switch_regs, Registers, STACK_ALIGN};

#[cfg(target_arch = "riscv64")]
mod riscv64;
#[cfg(target_arch = "riscv64")]
pub use riscv64::{init_stack, switch_regs, Registers, STACK_ALIGN};

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "riscv64"
)))]
compile_error!("coroutines: no context-switch backend for this target_arch; supported: x86_64, aarch64, riscv64");
