//! Lazy next-link syscall resolution (spec.md §4.C).
//!
//! Grounded on mio's `dlsym!` macro
//! (`sys/unix/epoll.rs`: `dlsym!(fn epoll_create1(c_int) -> c_int)`) and
//! `examples/original_source/sys_hook.c`'s `HOOK_SYS_CALL` macro
//! (`if(!hook_##func##_pfn) hook_##func##_pfn = dlsym(RTLD_NEXT, #func)`).
//! One `NextLink<F>` cell per intercepted symbol; resolution races between
//! tasks are benign because every resolution of the same name yields the
//! same function pointer (spec.md §5 "Shared resource policy").

use std::ffi::CStr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lazily resolves and caches `dlsym(RTLD_NEXT, name)` as a function
/// pointer of type `F`. `F` must be a `fn`-pointer type; the cast from the
/// `*mut c_void` dlsym returns is the caller's responsibility via
/// [`NextLink::get`]'s transmute, matching the original's
/// `(func_pfn_t)dlsym(...)` cast.
pub struct NextLink<F: Copy> {
    name: &'static CStr,
    cached: AtomicUsize,
    _marker: std::marker::PhantomData<F>,
}

// Safety: the cached value is either 0 (unresolved) or a process-wide
// function pointer that never changes once written; concurrent writers
// race to write the same value.
unsafe impl<F: Copy> Sync for NextLink<F> {}

impl<F: Copy> NextLink<F> {
    pub const fn new(name: &'static CStr) -> NextLink<F> {
        NextLink {
            name,
            cached: AtomicUsize::new(0),
            _marker: std::marker::PhantomData,
        }
    }

    /// Resolves (on first use) and returns the underlying symbol.
    ///
    /// # Safety
    /// Caller must instantiate `NextLink<F>` with an `F` matching the
    /// actual signature of `self.name` in the next-loaded object; a
    /// mismatched `F` is undefined behavior once called.
    pub unsafe fn get(&self) -> F {
        let cached = self.cached.load(Ordering::Acquire);
        let resolved = if cached != 0 {
            cached
        } else {
            let resolved = libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr()) as usize;
            assert_ne!(
                resolved, 0,
                "next-link resolution for {:?} returned NULL; is this symbol actually shadowed?",
                self.name
            );
            // A benign race: another thread may have already stored the
            // same value. Either outcome is correct to use.
            self.cached.store(resolved, Ordering::Release);
            resolved
        };
        std::mem::transmute_copy(&resolved)
    }
}

/// Declares a `static NAME: NextLink<fn(...) -> Ret> = ...;` bound to
/// `symbol`'s next-link definition, the Rust-side equivalent of the
/// original's `HOOK_SYS_CALL`/`typedef ... _pfn_t` pair. `NAME` carries a
/// trailing underscore so it doesn't collide with the interposed function
/// of the same name defined in `src/interpose/`.
macro_rules! next_link {
    ($name:ident = $symbol:literal : fn($($arg:ty),* $(,)?) -> $ret:ty) => {
        pub static $name: crate::syscalls::NextLink<unsafe extern "C" fn($($arg),*) -> $ret> =
            crate::syscalls::NextLink::new(unsafe {
                std::ffi::CStr::from_bytes_with_nul_unchecked(
                    concat!($symbol, "\0").as_bytes(),
                )
            });
    };
}

pub(crate) use next_link;

next_link!(fcntl_ = "fcntl": fn(libc::c_int, libc::c_int, libc::c_long) -> libc::c_int);
next_link!(socket_ = "socket": fn(libc::c_int, libc::c_int, libc::c_int) -> libc::c_int);
next_link!(listen_ = "listen": fn(libc::c_int, libc::c_int) -> libc::c_int);
next_link!(connect_ = "connect": fn(libc::c_int, *const libc::sockaddr, libc::socklen_t) -> libc::c_int);
next_link!(accept_ = "accept": fn(libc::c_int, *mut libc::sockaddr, *mut libc::socklen_t) -> libc::c_int);
next_link!(close_ = "close": fn(libc::c_int) -> libc::c_int);
next_link!(read_ = "read": fn(libc::c_int, *mut libc::c_void, libc::size_t) -> libc::ssize_t);
next_link!(write_ = "write": fn(libc::c_int, *const libc::c_void, libc::size_t) -> libc::ssize_t);
next_link!(recv_ = "recv": fn(libc::c_int, *mut libc::c_void, libc::size_t, libc::c_int) -> libc::ssize_t);
next_link!(recvfrom_ = "recvfrom": fn(libc::c_int, *mut libc::c_void, libc::size_t, libc::c_int, *mut libc::sockaddr, *mut libc::socklen_t) -> libc::ssize_t);
next_link!(recvmsg_ = "recvmsg": fn(libc::c_int, *mut libc::msghdr, libc::c_int) -> libc::ssize_t);
next_link!(send_ = "send": fn(libc::c_int, *const libc::c_void, libc::size_t, libc::c_int) -> libc::ssize_t);
next_link!(sendto_ = "sendto": fn(libc::c_int, *const libc::c_void, libc::size_t, libc::c_int, *const libc::sockaddr, libc::socklen_t) -> libc::ssize_t);
next_link!(sendmsg_ = "sendmsg": fn(libc::c_int, *const libc::msghdr, libc::c_int) -> libc::ssize_t);
