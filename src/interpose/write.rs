//! Write-family interposition: `write`, `send`, `sendto`, `sendmsg`
//! (spec.md §4.D "Write family").
//!
//! Grounded on `examples/original_source/sys_hook.c`'s near-identical
//! write-family functions. `sendmsg` deliberately does **not** share the
//! byte-advancing drain loop the others use; see the module doc on
//! [`sendmsg`] and SPEC_FULL.md's "`sendmsg` partial-retry policy" for why.

use std::io;
use std::os::unix::io::RawFd;

use crate::context::Context;
use crate::hook::hooked_here;
use crate::interest::sets;
use crate::readiness::Readiness;
use crate::scheduler::{current_task, current_thread_poller};
use crate::syscalls::{send_, sendto_, sendmsg_, write_};

fn is_nonblocking(fd: RawFd) -> bool {
    Context::get().registry.with(fd, |r| r.is_nonblocking()).unwrap_or(false)
}

fn would_block(errno: libc::c_int) -> bool {
    errno == libc::EAGAIN || errno == libc::EWOULDBLOCK
}

/// Drain loop shared by `write`/`send`/`sendto`: call `attempt(offset,
/// remaining)` until `n` bytes are consumed total, polling for
/// writability between `EAGAIN` bursts (spec.md §4.D "drain loop"). An
/// internal, non-ABI-facing helper (not `#[no_mangle] extern "C"`), so it
/// returns `io::Result<usize>` like the rest of the crate's internal
/// surface instead of a raw `ssize_t` with errno side effects; the
/// `#[no_mangle]` entry points below convert at the ABI boundary.
fn drain(fd: RawFd, n: usize, mut attempt: impl FnMut(usize, usize) -> libc::ssize_t) -> io::Result<usize> {
    if !hooked_here() || !is_nonblocking(fd) {
        let ret = attempt(0, n);
        return if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        };
    }

    let ctx = Context::get();
    let mut len = 0usize;
    loop {
        while len < n {
            let ret = attempt(len, n - len);
            if ret < 0 {
                let errno = io::Error::last_os_error();
                if would_block(errno.raw_os_error().unwrap_or(0)) {
                    break;
                }
                return Err(errno);
            }
            len += ret as usize;
        }
        if len >= n {
            break;
        }

        #[cfg(feature = "log")]
        log::trace!("drain(fd={fd}): {len}/{n}, polling for WRITE|RDHUP|ERR (edge-triggered)");

        let Some(task) = current_task() else {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        };
        let Some(poller) = current_thread_poller() else {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        };
        let timeout = ctx.registry.with(fd, |r| r.timeout()).flatten();
        ctx.registry.with(fd, |r| r.bind(task));
        let poll_result = poller.event_poll(fd, sets::write(), timeout);
        ctx.registry.with(fd, |r| r.unbind());
        match poll_result {
            Ok(bits) => {
                ctx.registry.with(fd, |r| r.set_error(bits));
                if bits.contains(Readiness::TIMEOUT) {
                    // spec.md §4.D state machine: POLL_WAIT -> ERROR on timeout.
                    return Err(io::Error::from_raw_os_error(libc::ETIMEDOUT));
                }
            }
            Err(e) => return Err(e),
        }
    }
    Ok(len)
}

/// Converts a `drain` result back to the raw ABI return + errno a POSIX
/// caller expects.
unsafe fn drain_to_raw(result: io::Result<usize>) -> libc::ssize_t {
    match result {
        Ok(n) => n as libc::ssize_t,
        Err(e) => {
            *libc::__errno_location() = e.raw_os_error().unwrap_or(libc::EIO);
            -1
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn write(fd: RawFd, buf: *const libc::c_void, count: libc::size_t) -> libc::ssize_t {
    drain_to_raw(drain(fd, count, |offset, remaining| {
        (write_.get())(fd, buf.add(offset), remaining)
    }))
}

#[no_mangle]
pub unsafe extern "C" fn send(
    sockfd: RawFd,
    buf: *const libc::c_void,
    len: libc::size_t,
    flags: libc::c_int,
) -> libc::ssize_t {
    drain_to_raw(drain(sockfd, len, |offset, remaining| {
        (send_.get())(sockfd, buf.add(offset), remaining, flags)
    }))
}

#[no_mangle]
pub unsafe extern "C" fn sendto(
    sockfd: RawFd,
    buf: *const libc::c_void,
    len: libc::size_t,
    flags: libc::c_int,
    dest_addr: *const libc::sockaddr,
    addrlen: libc::socklen_t,
) -> libc::ssize_t {
    drain_to_raw(drain(sockfd, len, |offset, remaining| {
        (sendto_.get())(sockfd, buf.add(offset), remaining, flags, dest_addr, addrlen)
    }))
}

/// `sendmsg` cannot safely reuse [`drain`]: the underlying call always
/// sends the whole `msghdr` it's given, so re-issuing it after a partial
/// send would resend the bytes already accepted. Per the Open Question in
/// spec.md §9 and the policy documented in SPEC_FULL.md, this
/// implementation treats a partial `sendmsg` as a final result rather than
/// advancing the iovec view and retrying — option (a): atomic-or-nothing
/// from the caller's perspective, never duplicating bytes.
#[no_mangle]
pub unsafe extern "C" fn sendmsg(sockfd: RawFd, msg: *const libc::msghdr, flags: libc::c_int) -> libc::ssize_t {
    if !hooked_here() || !is_nonblocking(sockfd) {
        return (sendmsg_.get())(sockfd, msg, flags);
    }

    if message_len(msg).is_none() {
        // Length unknowable: forward directly, no drain loop (spec.md
        // §4.D "sendmsg": "If computing the length fails, forward to the
        // native syscall directly"). The length itself is only needed for
        // this fallback check — actual retries never byte-account against
        // it (see the atomic-or-nothing note below).
        return (sendmsg_.get())(sockfd, msg, flags);
    }

    let ctx = Context::get();
    loop {
        let ret = (sendmsg_.get())(sockfd, msg, flags);
        if ret >= 0 {
            // Whether full or partial, this is the caller's answer: no
            // retry, to avoid resending already-accepted bytes.
            return ret;
        }
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        if !would_block(errno) {
            return ret;
        }

        let Some(task) = current_task() else {
            *libc::__errno_location() = libc::EBADF;
            return -1;
        };
        let Some(poller) = current_thread_poller() else {
            *libc::__errno_location() = libc::EBADF;
            return -1;
        };
        let timeout = ctx.registry.with(sockfd, |r| r.timeout()).flatten();
        ctx.registry.with(sockfd, |r| r.bind(task));
        let poll_result = poller.event_poll(sockfd, sets::write(), timeout);
        ctx.registry.with(sockfd, |r| r.unbind());
        match poll_result {
            Ok(bits) => {
                ctx.registry.with(sockfd, |r| r.set_error(bits));
                if bits.contains(Readiness::TIMEOUT) {
                    // spec.md §4.D state machine: POLL_WAIT -> ERROR on timeout.
                    *libc::__errno_location() = libc::ETIMEDOUT;
                    return -1;
                }
            }
            Err(e) => {
                *libc::__errno_location() = e.raw_os_error().unwrap_or(libc::EIO);
                return -1;
            }
        };
    }
}

/// Sums `msg_iov[0..msg_iovlen].iov_len`. Returns `None` if the message
/// header is malformed (null iovec with nonzero count, or an iovlen that
/// doesn't fit a `usize`).
unsafe fn message_len(msg: *const libc::msghdr) -> Option<usize> {
    if msg.is_null() {
        return None;
    }
    let msg = &*msg;
    if msg.msg_iov.is_null() && msg.msg_iovlen > 0 {
        return None;
    }
    let iovlen = usize::try_from(msg.msg_iovlen).ok()?;
    let mut total = 0usize;
    for i in 0..iovlen {
        let iov = &*msg.msg_iov.add(i);
        total = total.checked_add(iov.iov_len)?;
    }
    Some(total)
}
