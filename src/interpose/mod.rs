//! The fourteen interposed operations (spec.md §4.D, §6 "Interposed
//! symbols"). Each submodule owns one or a closely related cluster of
//! symbols; see `DESIGN.md` for the grounding of each against
//! `examples/original_source/sys_hook.c`.

pub mod accept;
pub mod close;
pub mod connect;
pub mod fcntl;
pub mod read;
pub mod socket;
pub mod write;
