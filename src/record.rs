//! Managed descriptor record (spec.md §3, §4.B).
//!
//! Field-for-field grounded on `examples/original_source/inner_fd.h`'s
//! `struct _inner_fd_st` (`fd, flags, task, link, timeout, error`).

use std::sync::Arc;
use std::time::Duration;

use crate::readiness::Readiness;
use crate::scheduler::Task;

/// `-1`-style "no deadline" sentinel from spec.md §3, expressed as `None`
/// in this crate's `Duration`-typed API instead of a raw signed integer.
pub type Timeout = Option<Duration>;

/// Intrusive back-reference into the event loop's timer wheel
/// (spec.md §3 `timer_link`). The core never interprets this value; it's
/// opaque storage the poller collaborator uses to support O(1) removal
/// from its timer wheel bucket on `remove()` (spec.md §9 "Intrusive list
/// linkage").
pub type TimerLink = Option<u64>;

/// One record per runtime-managed fd (spec.md §3).
#[derive(Debug)]
pub struct Record {
    fd: i32,
    flags: libc::c_int,
    bound_task: Option<Arc<dyn Task>>,
    timeout: Timeout,
    timer_link: TimerLink,
    error: Readiness,
}

impl Record {
    pub fn new(fd: i32, flags: libc::c_int, default_timeout: Timeout) -> Record {
        Record {
            fd,
            flags,
            bound_task: None,
            timeout: default_timeout,
            timer_link: None,
            error: Readiness::NONE,
        }
    }

    pub fn fd(&self) -> i32 {
        self.fd
    }

    pub fn flags(&self) -> libc::c_int {
        self.flags
    }

    pub fn set_flags(&mut self, flags: libc::c_int) {
        self.flags = flags;
    }

    /// Invariant 4: no interposed op on this fd suspends unless `NONBLOCK`
    /// is set.
    pub fn is_nonblocking(&self) -> bool {
        self.flags & libc::O_NONBLOCK != 0
    }

    pub fn bound_task(&self) -> Option<&Arc<dyn Task>> {
        self.bound_task.as_ref()
    }

    /// Binds `task` as the fd's sole waiter. Panics if another task is
    /// already bound: double-bind is a programmer error per spec.md §4.F
    /// ("Exactly one task may be bound to a given fd at a time").
    pub fn bind(&mut self, task: Arc<dyn Task>) {
        assert!(
            self.bound_task.is_none(),
            "fd {} already has a bound task; double-bind is a usage error",
            self.fd
        );
        self.bound_task = Some(task);
    }

    pub fn unbind(&mut self) {
        self.bound_task = None;
    }

    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Timeout) {
        self.timeout = timeout;
    }

    pub fn timer_link(&self) -> TimerLink {
        self.timer_link
    }

    pub fn set_timer_link(&mut self, link: TimerLink) {
        self.timer_link = link;
    }

    /// Poller writes observed bits here before resuming the bound task
    /// (spec.md §4.F "Wake").
    pub fn set_error(&mut self, bits: Readiness) {
        self.error = bits;
    }

    pub fn error(&self) -> Readiness {
        self.error
    }

    /// Consumes (clears) the requested bits from `error`, returning what
    /// was actually set. Invariant 5: error never accumulates across
    /// suspensions.
    pub fn take_error(&mut self, bits: Readiness) -> Readiness {
        self.error.take(bits)
    }
}
