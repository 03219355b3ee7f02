//! Readiness event bitset (spec.md §3 "Readiness event bitset").
//!
//! Mirrors `examples/original_source/inner_fd.h`'s `IE*` constants and
//! mio's `Ready`/`UnixReady` split between the portable bits and the
//! Unix-only hangup/error bits.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bits an interposed call or the poller may observe or request.
///
/// `TIMEOUT` only ever appears in an *observed* set (it is never part of a
/// requested interest); everything else can appear on either side.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness(u8);

impl Readiness {
    pub const NONE: Readiness = Readiness(0);
    pub const TIMEOUT: Readiness = Readiness(0b0000_0001);
    pub const READ: Readiness = Readiness(0b0000_0010);
    pub const WRITE: Readiness = Readiness(0b0000_0100);
    pub const RDHUP: Readiness = Readiness(0b0000_1000);
    pub const ERR: Readiness = Readiness(0b0001_0000);
    pub const HUP: Readiness = Readiness(0b0010_0000);

    pub fn contains(self, other: Readiness) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Readiness) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Readiness) {
        self.0 |= other.0;
    }

    /// Clears `other`'s bits, returning the bits that were actually set.
    ///
    /// Used by the waking interposed call to consume `record.error`
    /// (spec.md invariant 5: error never accumulates across suspensions).
    pub fn take(&mut self, other: Readiness) -> Readiness {
        let taken = Readiness(self.0 & other.0);
        self.0 &= !other.0;
        taken
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Fatal bits that should abort a poll wait regardless of what was
    /// requested: an asynchronous error or a full hangup.
    pub fn is_fatal(self) -> bool {
        self.intersects(Readiness::ERR.or(Readiness::HUP))
    }

    fn or(self, other: Readiness) -> Readiness {
        Readiness(self.0 | other.0)
    }
}

impl BitOr for Readiness {
    type Output = Readiness;
    fn bitor(self, rhs: Readiness) -> Readiness {
        self.or(rhs)
    }
}

impl BitOrAssign for Readiness {
    fn bitor_assign(&mut self, rhs: Readiness) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        let mut write_flag = |f: &mut fmt::Formatter<'_>, set: bool, name: &str| -> fmt::Result {
            if set {
                if wrote {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                wrote = true;
            }
            Ok(())
        };
        write_flag(f, self.contains(Readiness::TIMEOUT), "TIMEOUT")?;
        write_flag(f, self.contains(Readiness::READ), "READ")?;
        write_flag(f, self.contains(Readiness::WRITE), "WRITE")?;
        write_flag(f, self.contains(Readiness::RDHUP), "RDHUP")?;
        write_flag(f, self.contains(Readiness::ERR), "ERR")?;
        write_flag(f, self.contains(Readiness::HUP), "HUP")?;
        if !wrote {
            f.write_str("NONE")?;
        }
        Ok(())
    }
}
