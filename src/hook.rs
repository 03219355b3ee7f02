//! Runtime-context predicate and hook control API (spec.md §4.B, §6).
//!
//! Grounded on `examples/original_source/sys_hook.c`'s `co_hooked()`,
//! `co_enable_hook()`, `co_disable_hook()`.

use crate::scheduler::current_task;

/// The single gate that decides whether an interposed call takes the
/// managed path or forwards unchanged: true only if the caller is running
/// inside a runtime-managed task *and* that task's hook flag is set.
pub fn hooked_here() -> bool {
    current_task().is_some_and(|task| task.hook_enabled())
}

/// Sets the current task's hook flag so subsequent interposed calls on
/// this thread take the managed path. No-op (not an error) outside a
/// runtime task.
pub fn enable_hook() {
    if let Some(task) = current_task() {
        task.set_hook_enabled(true);
    }
}

/// Clears the current task's hook flag; subsequent interposed calls
/// forward unchanged, observing plain POSIX semantics.
pub fn disable_hook() {
    if let Some(task) = current_task() {
        task.set_hook_enabled(false);
    }
}
