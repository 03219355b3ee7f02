//! `accept` interposition (spec.md §4.D "accept(fd, addr, addrlen)").
//!
//! Grounded on `examples/original_source/sys_hook.c`'s `accept`.

use std::os::unix::io::RawFd;

use super::fcntl::dispatch_int;
use crate::context::Context;
use crate::hook::hooked_here;
use crate::interest::sets;
use crate::readiness::Readiness;
use crate::scheduler::{current_task, current_thread_poller};
use crate::syscalls::accept_;

#[no_mangle]
pub unsafe extern "C" fn accept(
    sockfd: RawFd,
    addr: *mut libc::sockaddr,
    addrlen: *mut libc::socklen_t,
) -> RawFd {
    let ctx = Context::get();
    let forward_unchanged = !hooked_here()
        || !ctx
            .registry
            .with(sockfd, |r| r.is_nonblocking())
            .unwrap_or(false);

    if forward_unchanged {
        return (accept_.get())(sockfd, addr, addrlen);
    }

    let mut ret = (accept_.get())(sockfd, addr, addrlen);
    if ret < 0 {
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        if errno != libc::EAGAIN && errno != libc::EWOULDBLOCK {
            return ret;
        }

        #[cfg(feature = "log")]
        log::trace!("accept({sockfd}) would block, polling for READ|RDHUP|ERR (edge-triggered)");

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
        let poll_result = poller.event_poll(sockfd, sets::accept(), timeout);
        ctx.registry.with(sockfd, |r| r.unbind());
        let observed = match poll_result {
            Ok(bits) => bits,
            Err(e) => {
                *libc::__errno_location() = e.raw_os_error().unwrap_or(libc::EIO);
                return -1;
            }
        };
        ctx.registry.with(sockfd, |r| r.set_error(observed));
        if observed.contains(Readiness::TIMEOUT) {
            // spec.md §4.D state machine: POLL_WAIT -> ERROR on timeout.
            *libc::__errno_location() = libc::ETIMEDOUT;
            return -1;
        }

        ret = (accept_.get())(sockfd, addr, addrlen);
        if ret < 0 {
            return ret;
        }
    }

    // Newly accepted fd is set non-blocking, which also registers it
    // (spec.md §4.D "accept": "On success, set the returned fd
    // non-blocking (which also registers it)").
    let current = dispatch_int(ret, libc::F_GETFL, 0);
    dispatch_int(ret, libc::F_SETFL, current | libc::O_NONBLOCK);
    ret
}
