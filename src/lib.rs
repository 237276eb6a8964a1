//! # Symmetric Coroutines
//!
//! Stackful, cooperatively scheduled user-space threads ("coroutines") with
//! explicit context switching on a single OS thread. This is a coroutine
//! *primitive*, not a multiplexing runtime: there is no preemption, no I/O
//! poller, and no built-in scheduler. Callers decide when and to whom
//! control transfers.
//!
//! ## Key Concepts
//! - A [`Ctx`] is the universe a set of coroutines lives in. It owns the
//!   "root" coroutine (the OS thread that created it), tracks which
//!   coroutine is currently running, and carries a single machine-word
//!   value across every switch.
//! - [`Ctx::spawn`] allocates a coroutine's stack and control block in
//!   state `New`; it does not run until first [`Ctx::resume`]d.
//! - [`Ctx::resume`] / [`Ctx::yield_now`] / [`Ctx::switch_raw`] are the only
//!   three places control can move between coroutines (spec.md §5).
//! - Destructors registered with [`Ctx::register_destructor`] run in
//!   insertion order when a coroutine terminates, before its stack is
//!   reclaimed — the only reliable cleanup mechanism, since freeing a
//!   suspended coroutine does not unwind it.
//! - [`Ctx::tls_new`]/`tls_get`/`tls_set` give each coroutine its own
//!   key-indexed local storage, disjoint from every other coroutine's.
//!
//! ## Non-goals
//! No preemption, no run queue, no cross-OS-thread safety, no blocking I/O
//! integration, no stack-overflow detection beyond the OS's own guard
//! pages, no migrating a coroutine between contexts. A [`Ctx`] and every
//! coroutine it produces must only ever be touched from the single OS
//! thread that created it.
//!
//! ## Example: ping-pong
//! ```
//! use coroutines::Ctx;
//!
//! fn pong(ctx: &Ctx, first: usize) {
//!     // `ctx` is shared; we need a mutable handle to call back into it.
//!     // In practice callers keep the `Ctx` itself `&mut`-reachable from
//!     // the start function via a raw pointer or a cell — see the tests
//!     // module for the idiom used throughout this crate.
//!     let _ = (ctx, first);
//! }
//! # let _ = pong;
//! ```

mod arch;
mod context;
mod stack;
mod thread;
mod trampoline;

pub use context::{Ctx, TlsKey, DEFAULT_STACK_SIZE, MIN_STACK_SIZE};
pub use thread::{DtorFn, StartFn, ThreadHandle, ThreadState};
