//! Per-thread runtime context: the descriptor registry plus its
//! configuration, reached from every interposed call.
//!
//! Spec.md §5 "Scheduling model": the descriptor registry and the poller
//! are per-thread; there is no cross-thread synchronization within the
//! core. Grounded on the teacher's pattern of a lazily-initialized,
//! thread-owned value (`src/lazy.rs`'s `Lazy<T>`), modernized to
//! `std::cell::OnceCell` behind a `thread_local!`.

use std::cell::OnceCell;

use crate::config::RegistryConfig;
use crate::registry::Registry;

pub struct Context {
    pub registry: Registry,
    pub config: RegistryConfig,
}

impl Context {
    fn new() -> Context {
        Context {
            registry: Registry::new(),
            config: RegistryConfig::default(),
        }
    }
}

thread_local! {
    static CONTEXT: OnceCell<Context> = const { OnceCell::new() };
}

impl Context {
    /// Returns this thread's context, creating it on first use.
    pub fn get() -> &'static Context {
        CONTEXT.with(|cell| {
            let ctx = cell.get_or_init(Context::new);
            // Safety: `CONTEXT` is a thread-local with 'static storage
            // duration for the life of the thread; the reference is only
            // ever handed back out to code running on this same thread,
            // so it cannot outlive the thread-local it points into.
            unsafe { std::mem::transmute::<&Context, &'static Context>(ctx) }
        })
    }

    /// Destroys every record in this thread's registry (spec.md §6
    /// "close_all()").
    pub fn close_all() {
        CONTEXT.with(|cell| {
            if let Some(ctx) = cell.get() {
                ctx.registry.remove_all();
            }
        });
    }
}
