//! The coroutine control block (spec.md §3's `Thread`).

use std::ptr::NonNull;

use crate::arch::Registers;
use crate::stack::Stack;
use crate::Ctx;

/// A coroutine's lifecycle state. See spec.md §3's "Lifecycles".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Created, never resumed.
    New,
    /// Resumed at least once and not yet terminated (includes "currently
    /// suspended, waiting to be resumed again").
    Alive,
    /// Start function returned (or the coroutine was otherwise terminated);
    /// destructors have run and the stack/TLS are released.
    Dead,
}

/// Start-function signature: `fn(ctx, arg)`, called exactly once, the
/// first time the coroutine is resumed. See spec.md §4.2/§6.
///
/// Takes `&Ctx`, not `&mut Ctx`: a coroutine body that wants to call back
/// into `resume`/`yield_now`/`register_destructor` cannot be handed a
/// second live `&mut Ctx` while an outer, suspended `resume` call on the
/// same `Ctx` is still mid-`switch_regs` further up the (suspended) call
/// chain — that would be two simultaneous exclusive references to the same
/// memory. Bodies that need to mutate recover a fresh `&mut Ctx` the same
/// way the trampoline itself does: from the thread-local cell
/// [`crate::trampoline::ACTIVE_CTX`] stashes immediately before every
/// switch.
pub type StartFn = fn(&Ctx, usize);

/// A registered cleanup action: `fn(arg)`, run in insertion order at
/// coroutine termination. See spec.md §4.6.
pub type DtorFn = fn(usize);

/// Opaque handle to a [`Thread`], analogous to spec.md §6's C-style
/// coroutine handle. Copy because it is just a non-owning pointer; whoever
/// holds the handle that `Ctx::spawn` returned is responsible for eventually
/// calling [`ThreadHandle::free`] on it (unless it was created with
/// [`Ctx::spawn_child`](crate::Ctx::spawn_child), which arranges that for
/// you).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ThreadHandle(pub(crate) NonNull<Thread>);

impl ThreadHandle {
    pub(crate) fn as_ptr(self) -> *mut Thread {
        self.0.as_ptr()
    }

    pub(crate) unsafe fn as_ref(self) -> &'static Thread {
        self.0.as_ref()
    }

    pub(crate) unsafe fn as_mut(mut self) -> &'static mut Thread {
        self.0.as_mut()
    }

    /// `thread_state`: this coroutine's current lifecycle state.
    pub fn state(self) -> ThreadState {
        unsafe { self.as_ref() }.state
    }

    /// `thread_free`: run this coroutine's destructors in insertion order,
    /// release its TLS array and stack, then free its control block.
    /// Safe to call on a `New`, `Alive`, or `Dead` coroutine (spec.md
    /// §4.4); calling it twice on the same handle, or on a coroutine
    /// presently reachable via some `current.caller...` chain, is
    /// undefined (spec.md §9).
    ///
    /// # Safety
    /// `self` must point at a control block that has not already been
    /// freed, and must not be on the active resume chain of any `Ctx`.
    pub unsafe fn free(self) {
        drop(unsafe { Box::from_raw(self.0.as_ptr()) });
    }
}

pub(crate) struct Thread {
    pub(crate) regs: Registers,
    pub(crate) state: ThreadState,
    /// `None` for the root coroutine, which has no allocated stack.
    pub(crate) stack: Option<Stack>,
    /// The coroutine that most recently resumed this one. Non-owning: see
    /// spec.md §9 on cyclic caller links.
    pub(crate) caller: Option<ThreadHandle>,
    pub(crate) dtors: Vec<(DtorFn, usize)>,
    /// TLS slots, indexed by `key - 1`; grown lazily to the high-water mark.
    pub(crate) tls: Vec<usize>,
    /// Taken by the trampoline on first resume; `None` afterwards (and for
    /// the root, which is never started).
    pub(crate) start: Option<StartFn>,
}

impl Thread {
    /// The pseudo-coroutine representing the OS thread that created the
    /// context. Has no stack and is never resumed-into via the trampoline.
    pub(crate) fn root() -> Self {
        Thread {
            regs: Registers::default(),
            state: ThreadState::Alive,
            stack: None,
            caller: None,
            dtors: Vec::new(),
            tls: Vec::new(),
            start: None,
        }
    }

    /// Run every registered destructor in insertion order, then drop the
    /// stack and TLS array. Idempotent: draining `dtors` means a second
    /// call is a silent no-op, matching `thread_free`'s "safe on New,
    /// Alive, and Dead" contract in spec.md §4.4.
    pub(crate) fn run_teardown(&mut self) {
        for (f, arg) in std::mem::take(&mut self.dtors) {
            f(arg);
        }
        self.tls.clear();
        self.stack = None;
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        // thread_free (spec.md §4.4): destructors, then TLS, then stack.
        // Safe even if the coroutine already terminated on its own (died),
        // since `run_teardown` already drained everything in that case.
        self.run_teardown();
    }
}
