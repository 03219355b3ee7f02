//! `socket` and `listen` interposition (spec.md §4.D).
//!
//! Grounded on `examples/original_source/sys_hook.c`'s `socket`/`listen`.

use std::os::unix::io::RawFd;

use super::fcntl::dispatch_int;
use crate::context::Context;
use crate::hook::hooked_here;
use crate::syscalls::{listen_, socket_};

#[no_mangle]
pub unsafe extern "C" fn socket(
    domain: libc::c_int,
    ty: libc::c_int,
    protocol: libc::c_int,
) -> RawFd {
    let fd = (socket_.get())(domain, ty, protocol);
    #[cfg(feature = "log")]
    log::trace!("socket({domain}, {ty}, {protocol}) = {fd}");
    if fd < 0 || !hooked_here() {
        return fd;
    }

    // Auto-set non-blocking through the interposed fcntl so it registers
    // the new fd (spec.md §4.D "socket").
    let current = dispatch_int(fd, libc::F_GETFL, 0);
    dispatch_int(fd, libc::F_SETFL, current | libc::O_NONBLOCK);
    fd
}

#[no_mangle]
pub unsafe extern "C" fn listen(sockfd: RawFd, backlog: libc::c_int) -> libc::c_int {
    if hooked_here() {
        let ctx = Context::get();
        // Listening sockets have no per-accept deadline (spec.md §4.D
        // "listen").
        ctx.registry.with(sockfd, |r| r.set_timeout(None));
    }
    #[cfg(feature = "log")]
    log::trace!("listen({sockfd}, {backlog})");
    (listen_.get())(sockfd, backlog)
}
