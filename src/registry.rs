//! Descriptor registry: fd → managed record (spec.md §4.A).
//!
//! Grounded on the teacher's dense slab-style allocator idiom (`src/slab.rs`'s
//! index-by-`usize` `Entry` storage) and on
//! `examples/original_source/array.h`'s `array_get/array_put/array_del`,
//! reimplemented as a direct-indexed resizable array keyed by fd instead of
//! a hand-rolled C allocator. One registry instance is owned per OS thread
//! (spec.md §5 "per-thread"); the `Mutex` here guards against accidental
//! cross-thread sharing rather than expressing a need for one (spec.md §5
//! "Shared resource policy" explicitly says not to add locks that would
//! pessimize the common case — this one is never contended in the intended
//! single-thread-owns-its-registry usage).

use std::sync::Mutex;

use crate::config::RegistryConfig;
use crate::record::Record;

#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    slots: Vec<Option<Record>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            inner: Mutex::new(Inner { slots: Vec::new() }),
        }
    }

    /// Queries the live `F_GETFL` value for `fd` and creates a record for
    /// it. Fails if `fd` is not a valid kernel descriptor (spec.md §4.A).
    pub fn create(&self, fd: i32, config: &RegistryConfig) -> std::io::Result<()> {
        if fd < 0 {
            return Err(std::io::Error::from_raw_os_error(libc::EBADF));
        }
        // F_GETFD validates the fd is open; F_GETFL supplies the initial
        // cached flags value (spec.md §4.A "Initializes flags from a live
        // F_GETFL query").
        let fd_check = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        if fd_check < 0 {
            return Err(std::io::Error::last_os_error());
        }
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(std::io::Error::last_os_error());
        }

        let record = Record::new(fd, flags, config.default_timeout);
        let mut inner = self.inner.lock().unwrap();
        let idx = fd as usize;
        if idx >= inner.slots.len() {
            inner.slots.resize_with(idx + 1, || None);
        }
        inner.slots[idx] = Some(record);
        #[cfg(feature = "log")]
        log::trace!("registry: created record for fd={fd} flags={flags:#x}");
        Ok(())
    }

    /// Removes the fd's record if present; idempotent on absent keys
    /// (spec.md §4.A).
    pub fn remove(&self, fd: i32) {
        if fd < 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        if let Some(slot) = inner.slots.get_mut(fd as usize) {
            if slot.take().is_some() {
                #[cfg(feature = "log")]
                log::trace!("registry: removed record for fd={fd}");
            }
        }
    }

    pub fn remove_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.slots.clear();
        #[cfg(feature = "log")]
        log::trace!("registry: removed all records");
    }

    pub fn contains(&self, fd: i32) -> bool {
        self.with(fd, |_| ()).is_some()
    }

    /// Runs `f` with exclusive access to the record for `fd`, if managed.
    /// Mutation and lookup share one accessor so callers never observe a
    /// lookup/mutate race against another call on the same thread.
    pub fn with<R>(&self, fd: i32, f: impl FnOnce(&mut Record) -> R) -> Option<R> {
        if fd < 0 {
            return None;
        }
        let mut inner = self.inner.lock().unwrap();
        inner
            .slots
            .get_mut(fd as usize)
            .and_then(|slot| slot.as_mut())
            .map(f)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .slots
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
