//! `corio` — transparent coroutine I/O.
//!
//! A per-OS-thread cooperative runtime layer that shadows the POSIX
//! file-descriptor API (`fcntl/socket/listen/connect/accept/close/read/
//! recv/recvfrom/recvmsg/write/send/sendto/sendmsg`). When a
//! runtime-managed, hook-enabled task calls one of these on a
//! non-blocking descriptor, the call registers interest with the current
//! thread's readiness poller, suspends the task, and resumes it when the
//! descriptor becomes ready or its deadline elapses. Calls made outside a
//! runtime task, with hook disabled, or against blocking/unmanaged
//! descriptors forward unchanged to the real syscall.
//!
//! This crate implements the interception layer and its three supporting
//! subsystems (the descriptor registry, the managed descriptor record, and
//! the syscall interposition table); the coroutine scheduler and the
//! kernel readiness multiplexer are external collaborators reached through
//! the traits in [`scheduler`].

pub mod config;
pub mod context;
pub mod hook;
pub mod interest;
pub mod interpose;
pub mod readiness;
pub mod record;
pub mod registry;
pub mod scheduler;
pub mod syscalls;

#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod integration_tests;

pub use config::RegistryConfig;
pub use context::Context;
pub use hook::{disable_hook, enable_hook, hooked_here};
pub use interest::Interest;
pub use readiness::Readiness;
pub use record::{Record, Timeout};
pub use registry::Registry;
pub use scheduler::{current_task, current_thread_poller, bind_thread, unbind_thread, Poller, Scheduler, Task, TaskId};

/// Destroys every record in the calling thread's registry (spec.md §6
/// "close_all()"). Intended for runtime teardown; any task still bound to
/// a destroyed record is left in a policy-undefined state exactly as
/// invariant 6 describes for a single `close(fd)`.
pub fn close_all() {
    Context::close_all();
}

/// Overrides a managed record's per-call readiness deadline (SPEC_FULL.md
/// "Extended control API", resolving spec.md §9's open question about
/// per-fd timeouts). `None` means infinite, matching `listen()`'s
/// encoding. No-op if `fd` is not runtime-managed.
pub fn set_timeout(fd: std::os::unix::io::RawFd, timeout: Timeout) {
    Context::get().registry.with(fd, |r| r.set_timeout(timeout));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_all_is_safe_with_no_context_yet() {
        close_all();
    }

    #[test]
    fn set_timeout_on_unmanaged_fd_is_a_harmless_no_op() {
        set_timeout(12345, None);
    }
}
