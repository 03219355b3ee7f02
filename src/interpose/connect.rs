//! `connect` interposition (spec.md §4.D "connect(fd, addr, len)").
//!
//! Grounded on `examples/original_source/sys_hook.c`'s `connect` +
//! `get_connect_error`.

use std::mem;
use std::os::unix::io::RawFd;

use crate::context::Context;
use crate::hook::hooked_here;
use crate::interest::sets;
use crate::readiness::Readiness;
use crate::scheduler::{current_task, current_thread_poller};
use crate::syscalls::connect_;

#[no_mangle]
pub unsafe extern "C" fn connect(
    sockfd: RawFd,
    addr: *const libc::sockaddr,
    addrlen: libc::socklen_t,
) -> libc::c_int {
    let ctx = Context::get();
    let forward_unchanged = !hooked_here()
        || !ctx
            .registry
            .with(sockfd, |r| r.is_nonblocking())
            .unwrap_or(false);

    if forward_unchanged {
        return (connect_.get())(sockfd, addr, addrlen);
    }

    let ret = (connect_.get())(sockfd, addr, addrlen);
    if ret == 0 {
        return 0;
    }
    let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
    if errno != libc::EINPROGRESS && errno != libc::EALREADY {
        return ret;
    }

    #[cfg(feature = "log")]
    log::trace!("connect({sockfd}) in progress, polling for WRITE|RDHUP|ERR");

    let Some(task) = current_task() else {
        *libc::__errno_location() = libc::EBADF;
        return -1;
    };
    let Some(poller) = current_thread_poller() else {
        *libc::__errno_location() = libc::EBADF;
        return -1;
    };
    let timeout = ctx.registry.with(sockfd, |r| r.timeout()).flatten();
    // Bind the current task as the fd's sole waiter for the duration of
    // the poll (spec.md §4.F, §8 invariant 1); unbind as soon as it wakes.
    ctx.registry.with(sockfd, |r| r.bind(task));
    let poll_result = poller.event_poll(sockfd, sets::connect(), timeout);
    ctx.registry.with(sockfd, |r| r.unbind());
    let observed = match poll_result {
        Ok(bits) => bits,
        Err(e) => {
            *libc::__errno_location() = e.raw_os_error().unwrap_or(libc::EIO);
            return -1;
        }
    };
    ctx.registry.with(sockfd, |r| r.set_error(observed));

    let consumed = ctx
        .registry
        .with(sockfd, |r| r.take_error(Readiness::WRITE))
        .unwrap_or(Readiness::NONE);
    if !consumed.contains(Readiness::WRITE) {
        // Fatal bits (ERR/HUP) or a timeout arrived instead of WRITE.
        *libc::__errno_location() = if observed.contains(Readiness::TIMEOUT) {
            libc::ETIMEDOUT
        } else {
            libc::ECONNABORTED
        };
        return -1;
    }

    let so_error = get_so_error(sockfd);
    if so_error == 0 {
        0
    } else {
        *libc::__errno_location() = so_error;
        -1
    }
}

unsafe fn get_so_error(fd: RawFd) -> libc::c_int {
    let mut err: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    let ret = libc::getsockopt(
        fd,
        libc::SOL_SOCKET,
        libc::SO_ERROR,
        &mut err as *mut _ as *mut libc::c_void,
        &mut len,
    );
    if ret < 0 {
        std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
    } else {
        err
    }
}
