//! Read-family interposition: `read`, `recv`, `recvfrom`, `recvmsg`
//! (spec.md §4.D "Read family").
//!
//! Grounded on `examples/original_source/sys_hook.c`'s four near-identical
//! read-family functions, unified into [`poll_then_read`] instead of
//! copy-pasted four times — the same DRY move the teacher makes whenever
//! several `sys::unix` wrappers differ only in which raw syscall they call.

use std::os::unix::io::RawFd;

use crate::context::Context;
use crate::hook::hooked_here;
use crate::interest::sets;
use crate::readiness::Readiness;
use crate::scheduler::{current_task, current_thread_poller};
use crate::syscalls::{read_, recv_, recvfrom_, recvmsg_};

/// Shared engine for the read family: poll for readability, run the
/// underlying call once, and reinterpret a `0`-byte return as a hard error
/// if the record observed `RDHUP` (spec.md §7 "Peer-initiated hangup
/// detected during a zero-byte read").
unsafe fn poll_then_read(fd: RawFd, nonblocking: bool, call: impl FnOnce() -> libc::ssize_t) -> libc::ssize_t {
    if !hooked_here() || !nonblocking {
        return call();
    }

    let ctx = Context::get();
    let Some(task) = current_task() else {
        *libc::__errno_location() = libc::EBADF;
        return -1;
    };
    let Some(poller) = current_thread_poller() else {
        *libc::__errno_location() = libc::EBADF;
        return -1;
    };
    let timeout = ctx.registry.with(fd, |r| r.timeout()).flatten();
    #[cfg(feature = "log")]
    log::trace!("read(fd={fd}): polling for READ|RDHUP|ERR, timeout={timeout:?}");
    ctx.registry.with(fd, |r| r.bind(task));
    let poll_result = poller.event_poll(fd, sets::read(), timeout);
    ctx.registry.with(fd, |r| r.unbind());
    let observed = match poll_result {
        Ok(bits) => bits,
        Err(e) => {
            *libc::__errno_location() = e.raw_os_error().unwrap_or(libc::EIO);
            return -1;
        }
    };
    ctx.registry.with(fd, |r| r.set_error(observed));
    if observed.contains(Readiness::TIMEOUT) {
        // spec.md §4.D state machine: POLL_WAIT -> ERROR on timeout.
        *libc::__errno_location() = libc::ETIMEDOUT;
        return -1;
    }

    let ret = call();
    if ret == 0 {
        let rdhup = ctx
            .registry
            .with(fd, |r| r.error().contains(Readiness::RDHUP))
            .unwrap_or(false);
        if rdhup {
            *libc::__errno_location() = libc::ECONNRESET;
            return -1;
        }
    }
    ret
}

fn is_nonblocking(fd: RawFd) -> bool {
    Context::get().registry.with(fd, |r| r.is_nonblocking()).unwrap_or(false)
}

#[no_mangle]
pub unsafe extern "C" fn read(fd: RawFd, buf: *mut libc::c_void, count: libc::size_t) -> libc::ssize_t {
    poll_then_read(fd, is_nonblocking(fd), || (read_.get())(fd, buf, count))
}

#[no_mangle]
pub unsafe extern "C" fn recv(
    sockfd: RawFd,
    buf: *mut libc::c_void,
    len: libc::size_t,
    flags: libc::c_int,
) -> libc::ssize_t {
    poll_then_read(sockfd, is_nonblocking(sockfd), || {
        (recv_.get())(sockfd, buf, len, flags)
    })
}

#[no_mangle]
pub unsafe extern "C" fn recvfrom(
    sockfd: RawFd,
    buf: *mut libc::c_void,
    len: libc::size_t,
    flags: libc::c_int,
    src_addr: *mut libc::sockaddr,
    addrlen: *mut libc::socklen_t,
) -> libc::ssize_t {
    poll_then_read(sockfd, is_nonblocking(sockfd), || {
        (recvfrom_.get())(sockfd, buf, len, flags, src_addr, addrlen)
    })
}

#[no_mangle]
pub unsafe extern "C" fn recvmsg(sockfd: RawFd, msg: *mut libc::msghdr, flags: libc::c_int) -> libc::ssize_t {
    poll_then_read(sockfd, is_nonblocking(sockfd), || (recvmsg_.get())(sockfd, msg, flags))
}
