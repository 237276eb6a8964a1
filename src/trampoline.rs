//! The start trampoline and termination routine (spec.md §4.2).
//!
//! Both are reached by letting a restored instruction pointer land on their
//! address, not by an ordinary Rust call — see the `arch` backends for how
//! each architecture arranges that on the very first switch into a
//! coroutine. Because of that, the active [`Ctx`] has to be recovered from
//! somewhere other than a function argument; it is stashed in a
//! thread-local cell immediately before every switch. This replaces the
//! single mutable `static` the reference exercise's scheduler uses for the
//! same purpose with a safe `Cell`, which costs nothing extra given the
//! single-OS-thread invariant the context already requires.

use std::cell::Cell;

use crate::thread::ThreadState;
use crate::Ctx;

thread_local! {
    pub(crate) static ACTIVE_CTX: Cell<*mut Ctx> = const { Cell::new(std::ptr::null_mut()) };
}

/// Runs as the initial resumption point of every newly created coroutine.
/// Performs exactly the three steps of spec.md §4.2: mark the coroutine
/// `Alive`, call its start function with the first `resume`'s argument,
/// and fall into [`die`] if it returns.
pub(crate) extern "C" fn trampoline() -> ! {
    let ctx_ptr = ACTIVE_CTX.with(|cell| cell.get());
    debug_assert!(
        !ctx_ptr.is_null(),
        "coroutines: trampoline reached with no active Ctx"
    );
    // SAFETY: set by the resume/switch call that is switching into us,
    // immediately before the switch_regs that brought us here.
    let ctx: &mut Ctx = unsafe { &mut *ctx_ptr };
    let handle = ctx.current;
    // SAFETY: handle is the coroutine currently being entered.
    let thread = unsafe { handle.as_mut() };
    thread.state = ThreadState::Alive;
    let start = thread
        .start
        .take()
        .expect("coroutines: trampoline entered for a coroutine with no start function");
    let arg = ctx.buffer;
    log::trace!("coroutines: {:?} starting", handle);
    // SAFETY: see `StartFn`'s doc comment — sound because only one
    // coroutine's code runs at a time.
    start(ctx, arg);
    die()
}

/// Reached when a coroutine's start function returns. Marks the coroutine
/// `Dead`, clears the shared buffer, and switches back to `caller`. Never
/// returns: a `Dead` coroutine is never resumed again, so nothing can ever
/// switch back into this stack frame.
pub(crate) fn die() -> ! {
    let ctx_ptr = ACTIVE_CTX.with(|cell| cell.get());
    let ctx: &mut Ctx = unsafe { &mut *ctx_ptr };
    let handle = ctx.current;
    let thread = unsafe { handle.as_mut() };
    thread.state = ThreadState::Dead;
    ctx.buffer = 0;
    log::trace!("coroutines: {:?} terminating", handle);
    let caller = thread
        .caller
        .expect("coroutines: a coroutine terminated with no caller to return to");
    ctx.switch_raw(handle, caller);
    unreachable!("coroutines: a dead coroutine cannot be resumed, switch_raw cannot return here")
}
