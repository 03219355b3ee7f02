//! Test-only stand-ins for the out-of-scope collaborators (spec.md §1,
//! SPEC_FULL.md "Test tooling"). Nothing here ships: it exists so the
//! interposed operations can be exercised end-to-end without a real
//! coroutine scheduler.
//!
//! [`EpollPoller`] is a genuine, minimal epoll-backed implementation of
//! [`crate::scheduler::Poller`], grounded on the teacher's
//! `sys::unix::epoll::Selector` (`register`/`select`/`deregister` against
//! raw `libc::epoll_*` calls). It is deliberately *not* exposed outside
//! `#[cfg(test)]`: driving a real epoll instance is the event loop's job
//! (spec.md §1 "Out of scope"), and this implementation only supports one
//! outstanding wait per fd at a time, which is all `event_poll`'s contract
//! requires.
//!
//! Since this crate implements no coroutine scheduler either, tests stand
//! each simulated "task" up on its own OS thread instead of multiplexing
//! several coroutines onto one thread; every thread binds its own
//! single-task [`crate::scheduler::SingleTaskScheduler`] and its own
//! `EpollPoller`. This is observationally equivalent for exercising the
//! interposition contract (each thread still owns exactly one registry
//! and one poller, as spec.md §5 requires) even though it doesn't exercise
//! true cooperative multiplexing.

use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::interest::Interest;
use crate::readiness::Readiness;
use crate::scheduler::Poller;

pub struct EpollPoller {
    epfd: RawFd,
}

impl EpollPoller {
    pub fn new() -> std::io::Result<EpollPoller> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(EpollPoller { epfd })
    }

    fn to_epoll_bits(events: Interest) -> u32 {
        let bits = events.bits();
        let mut out = 0u32;
        if bits.contains(Readiness::READ) {
            out |= libc::EPOLLIN as u32;
        }
        if bits.contains(Readiness::WRITE) {
            out |= libc::EPOLLOUT as u32;
        }
        if bits.contains(Readiness::RDHUP) {
            out |= libc::EPOLLRDHUP as u32;
        }
        if bits.contains(Readiness::ERR) {
            out |= libc::EPOLLERR as u32;
        }
        if events.is_edge_triggered() {
            out |= libc::EPOLLET as u32;
        }
        out
    }

    fn from_epoll_bits(bits: u32) -> Readiness {
        let mut out = Readiness::NONE;
        if bits & libc::EPOLLIN as u32 != 0 {
            out |= Readiness::READ;
        }
        if bits & libc::EPOLLOUT as u32 != 0 {
            out |= Readiness::WRITE;
        }
        if bits & libc::EPOLLRDHUP as u32 != 0 {
            out |= Readiness::RDHUP;
        }
        if bits & libc::EPOLLERR as u32 != 0 {
            out |= Readiness::ERR;
        }
        if bits & libc::EPOLLHUP as u32 != 0 {
            out |= Readiness::HUP;
        }
        out
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        unsafe { libc::close(self.epfd) };
    }
}

impl Poller for EpollPoller {
    fn event_poll(
        &self,
        fd: RawFd,
        events: Interest,
        timeout: Option<Duration>,
    ) -> std::io::Result<Readiness> {
        let mut ev = libc::epoll_event {
            events: Self::to_epoll_bits(events),
            u64: fd as u64,
        };
        if unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut ev) } < 0 {
            return Err(std::io::Error::last_os_error());
        }

        let timeout_ms = timeout
            .map(|d| i32::try_from(d.as_millis()).unwrap_or(i32::MAX))
            .unwrap_or(-1);

        let mut out = [libc::epoll_event { events: 0, u64: 0 }];
        let n = unsafe { libc::epoll_wait(self.epfd, out.as_mut_ptr(), 1, timeout_ms) };

        // Always deregister: event_poll binds exactly one waiter per call
        // (spec.md §4.F).
        unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut()) };

        if n < 0 {
            return Err(std::io::Error::last_os_error());
        }
        if n == 0 {
            return Ok(Readiness::TIMEOUT);
        }
        Ok(Self::from_epoll_bits(out[0].events))
    }
}

/// Binds a fresh single-task scheduler (hook enabled) and a fresh
/// `EpollPoller` to the calling thread, returning the task so callers can
/// flip its hook flag off mid-test (spec.md §8 scenario 6).
pub fn bind_hooked_thread() -> std::sync::Arc<crate::scheduler::SimpleTask> {
    let task = crate::scheduler::SimpleTask::new(crate::scheduler::TaskId(
        std::thread::current().id().as_u64().get(),
    ));
    task.set_hook_enabled(true);
    let scheduler = crate::scheduler::SingleTaskScheduler::new(task.clone());
    let poller = EpollPoller::new().expect("epoll_create1 failed");
    crate::scheduler::bind_thread(scheduler, std::sync::Arc::new(poller));
    task
}
