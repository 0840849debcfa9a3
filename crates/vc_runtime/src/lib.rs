//! A reference host for generated serialise and deserialise procedures.
//!
//! The host models what the procedures expect of a real runtime: a
//! byte-addressed [`Memory`], a frozen [`DescriptorTable`] mapping type
//! identities to descriptors and process-wide instances, the two offset
//! entry points, and [`CustomHook`]s for trailing payloads. Procedures are
//! executed by an interpreter over the IR.
//!
//! ## Wire format
//!
//! Every object reachable from the root gets one segment in the output
//! buffer, aligned to the pointer width. A reference is stored as the offset
//! of its target's segment, with two reserved values: all ones for null, and
//! the high bit set for the identity of a process-wide instance.
//!
//! ## Menu
//!
//! - [`Process`]: program, descriptors and hooks shared by all runtimes.
//! - [`Runtime`]: private memory, `serialise` and `deserialise`.
//! - [`Memory`], [`DescriptorTable`], [`CustomHook`], [`RuntimeError`].
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// no_std support

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod descriptor;
mod error;
mod interp;
mod process;
mod runtime;
mod session;

pub mod memory;

// -----------------------------------------------------------------------------
// Exports

/// An address in runtime memory. `0` is null.
pub type Addr = u64;

pub use descriptor::{Descriptor, DescriptorTable};
pub use error::RuntimeError;
pub use memory::Memory;
pub use process::{CustomHook, Process};
pub use runtime::Runtime;
