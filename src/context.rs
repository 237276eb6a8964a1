//! The context: owner of the root coroutine, the currently-running
//! coroutine pointer, and the single-word transfer buffer (spec.md §3/§4.3).

use std::ptr::NonNull;

use crate::arch;
use crate::thread::{DtorFn, StartFn, Thread, ThreadHandle, ThreadState};
use crate::trampoline;

/// Floor below which [`Ctx::set_stack_size`] silently refuses to go
/// (spec.md §3/§7).
pub const MIN_STACK_SIZE: usize = 4096;

/// Initial value of `default_stack_size` (spec.md §3).
pub const DEFAULT_STACK_SIZE: usize = 131072;

/// Opaque, dense, never-reused coroutine-local-storage key (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsKey(usize);

/// The universe in which coroutines live. Bound to exactly one OS thread:
/// `Ctx` and every [`ThreadHandle`] it produces must only ever be touched
/// from the thread that created the `Ctx` (spec.md §5). Nothing about this
/// type is `Send` or `Sync` — it is built entirely out of raw pointers for
/// exactly that reason, so moving one across threads is a type error, not
/// a runtime hazard.
///
/// `Ctx` must not move in memory for as long as any coroutine created from
/// it might still be resumed: a reference to it is stashed in a
/// thread-local right before every switch so the trampoline can find it on
/// the other side. In practice this means creating it once, keeping it in
/// a local variable or a `Box`, and never relocating it — the same
/// constraint the pack's `Runtime`-global-pointer coroutine reference
/// places on itself.
pub struct Ctx {
    pub(crate) current: ThreadHandle,
    root_handle: ThreadHandle,
    // Keeps the root coroutine's heap allocation alive; never touched after
    // construction except via `root_handle`.
    _root: Box<Thread>,
    pub(crate) buffer: usize,
    default_stack_size: usize,
    tls_count: usize,
}

impl Ctx {
    /// `ctx_create`: allocate a context and its root coroutine. `current`
    /// starts out equal to `root`.
    pub fn new() -> Self {
        let mut root = Box::new(Thread::root());
        let root_handle = ThreadHandle(NonNull::from(root.as_mut()));
        Ctx {
            current: root_handle,
            root_handle,
            _root: root,
            buffer: 0,
            default_stack_size: DEFAULT_STACK_SIZE,
            tls_count: 0,
        }
    }

    /// `ctx_set_stack_size`: silently clamped at [`MIN_STACK_SIZE`]
    /// (spec.md §4.3/§7).
    pub fn set_stack_size(&mut self, size: usize) {
        if size >= MIN_STACK_SIZE {
            self.default_stack_size = size;
        }
    }

    /// The coroutine representing the OS thread that created this context.
    pub fn root(&self) -> ThreadHandle {
        self.root_handle
    }

    /// `current(ctx)`.
    pub fn current(&self) -> ThreadHandle {
        self.current
    }

    /// `caller(ctx)`: `None` on the root and on a coroutine that has never
    /// been resumed.
    pub fn caller(&self) -> Option<ThreadHandle> {
        unsafe { self.current.as_ref() }.caller
    }

    /// `thread_create`: allocate a control block and stack, state `New`.
    /// The returned handle is owned by the caller, who must eventually call
    /// [`ThreadHandle::free`] on it (unless created via
    /// [`Ctx::spawn_child`]).
    pub fn spawn(&mut self, start: StartFn) -> ThreadHandle {
        let stack = crate::stack::Stack::new(self.default_stack_size);
        let stack_top = stack.top();
        debug_assert_eq!(stack_top % arch::STACK_ALIGN, 0);
        // SAFETY: stack_top is the aligned top of a freshly allocated,
        // exclusively-owned stack.
        let regs = unsafe { arch::init_stack(stack_top) };
        let thread = Box::new(Thread {
            regs,
            state: ThreadState::New,
            stack: Some(stack),
            caller: None,
            dtors: Vec::new(),
            tls: Vec::new(),
            start: Some(start),
        });
        let handle = ThreadHandle(NonNull::from(Box::leak(thread)));
        log::trace!(
            "coroutines: spawned {:?}, stack_size={}",
            handle,
            self.default_stack_size
        );
        handle
    }

    /// `thread_create_child`: like [`Ctx::spawn`], but registers a
    /// destructor on the *current* coroutine that frees the child when the
    /// current coroutine terminates or is explicitly freed (spec.md §4.4).
    pub fn spawn_child(&mut self, start: StartFn) -> ThreadHandle {
        let child = self.spawn(start);
        self.register_destructor(free_child, child.as_ptr() as usize);
        child
    }

    /// `register_destructor`: append `(f, arg)` to the current coroutine's
    /// destructor list; runs in insertion order at termination (spec.md
    /// §4.6).
    pub fn register_destructor(&mut self, f: DtorFn, arg: usize) {
        unsafe { self.current.as_mut() }.dtors.push((f, arg));
    }

    /// `thread_resume`: start or re-enter `to`, delivering `arg`. Returns
    /// `None` without switching if `to` is already `Dead` (spec.md §4.5);
    /// otherwise returns `Some` of whatever was last written to the
    /// context's buffer before control returned here.
    ///
    /// Resuming the current coroutine is defined as a no-op that returns
    /// `arg` unchanged (spec.md §4.5's note), handled without invoking the
    /// switch primitive at all.
    pub fn resume(&mut self, to: ThreadHandle, arg: usize) -> Option<usize> {
        if to.state() == ThreadState::Dead {
            log::warn!("coroutines: resume({:?}) on a dead coroutine is a no-op", to);
            return None;
        }
        let curr = self.current;
        if to == curr {
            return Some(arg);
        }

        let curr_thread = unsafe { curr.as_mut() };
        let to_thread = unsafe { to.as_mut() };
        let saved_caller = curr_thread.caller;
        to_thread.caller = Some(curr);
        self.current = to;
        self.buffer = arg;

        trampoline::ACTIVE_CTX.with(|cell| cell.set(self as *mut Ctx));
        log::trace!("coroutines: resuming {:?} from {:?}", to, curr);
        // SAFETY: both handles are live control blocks (to is not Dead, and
        // curr is whatever is currently executing), and distinct (handled
        // by the to == curr check above).
        unsafe { arch::switch_regs(&mut curr_thread.regs, &to_thread.regs) };

        // Resumed: either `to` yielded back to us, or `to` ran to
        // completion and `die` raw-switched back into this call. In the
        // latter case `self.current` is stale (still `to`, since `die`
        // does not update it) — fix that up unconditionally; it is a
        // no-op in the former case, where whoever resumed `curr` already
        // set `self.current = curr` as part of its own bookkeeping.
        self.current = curr;

        if to_thread.state == ThreadState::Dead {
            log::trace!("coroutines: {:?} terminated, running destructors", to);
            to_thread.run_teardown();
        }
        curr_thread.caller = saved_caller;
        Some(self.buffer)
    }

    /// `thread_yield`: resume the caller coroutine. Panics if the current
    /// coroutine has no caller (spec.md §7 documents yielding from the
    /// root as undefined behavior; we turn that into a clean panic instead
    /// of memory-unsafety, since nothing here requires `unsafe` to detect
    /// it).
    pub fn yield_now(&mut self, arg: usize) -> Option<usize> {
        let caller = unsafe { self.current.as_ref() }
            .caller
            .expect("coroutines: yield_now called from a coroutine with no caller (the root?)");
        self.resume(caller, arg)
    }

    /// `thread_switch`: raw, unstructured transfer. Does not touch
    /// `current`, `caller`, or `buffer`. `from` must be the current
    /// coroutine.
    pub fn switch_raw(&mut self, from: ThreadHandle, to: ThreadHandle) {
        assert_eq!(
            from, self.current,
            "coroutines: thread_switch's `from` must be the current coroutine"
        );
        let from_thread = unsafe { from.as_mut() };
        let to_thread = unsafe { to.as_ref() };
        trampoline::ACTIVE_CTX.with(|cell| cell.set(self as *mut Ctx));
        // SAFETY: `from` is current and writable; `to` holds a register
        // file from a prior switch_regs/init_stack call.
        unsafe { arch::switch_regs(&mut from_thread.regs, &to_thread.regs) };
    }

    /// `tls_new`: issue a fresh, never-reused key.
    pub fn tls_new(&mut self) -> TlsKey {
        self.tls_count += 1;
        TlsKey(self.tls_count)
    }

    /// `tls_get`: 0 ("null") if the current coroutine has never written
    /// this key.
    pub fn tls_get(&mut self, key: TlsKey) -> usize {
        let thread = unsafe { self.current.as_mut() };
        ensure_tls_len(thread, key.0);
        thread.tls[key.0 - 1]
    }

    /// `tls_set`: returns the slot's previous value.
    pub fn tls_set(&mut self, key: TlsKey, value: usize) -> usize {
        let thread = unsafe { self.current.as_mut() };
        ensure_tls_len(thread, key.0);
        std::mem::replace(&mut thread.tls[key.0 - 1], value)
    }

    /// `tls_free`: no-op. Keys are permanent for the lifetime of the
    /// context (spec.md §4.7).
    pub fn tls_free(&mut self, _key: TlsKey) {}
}

impl Default for Ctx {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_tls_len(thread: &mut Thread, n: usize) {
    if thread.tls.len() < n {
        thread.tls.resize(n, 0);
    }
}

/// Destructor installed by [`Ctx::spawn_child`]: reclaims the child's
/// control block (which in turn runs the child's own destructors and frees
/// its stack/TLS).
fn free_child(raw: usize) {
    let handle = ThreadHandle(NonNull::new(raw as *mut Thread).expect("coroutines: null child handle"));
    // SAFETY: this destructor is only ever registered by `spawn_child` with
    // the pointer it just allocated, and runs at most once (destructor
    // lists are drained on use).
    unsafe { handle.free() };
}
