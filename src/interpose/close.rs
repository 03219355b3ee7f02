//! `close` interposition (spec.md §4.D).
//!
//! Grounded on `examples/original_source/sys_hook.c`'s `close`.

use std::os::unix::io::RawFd;

use crate::context::Context;
use crate::hook::hooked_here;
use crate::syscalls::close_;

#[no_mangle]
pub unsafe extern "C" fn close(fd: RawFd) -> libc::c_int {
    if hooked_here() {
        // Invariant 6: the record is destroyed before the kernel close.
        Context::get().registry.remove(fd);
    }
    #[cfg(feature = "log")]
    log::trace!("close({fd})");
    (close_.get())(fd)
}
