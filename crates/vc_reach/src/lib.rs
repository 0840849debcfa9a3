//! The reachable type set of a compiled program and its physical layout.
//!
//! Upstream analysis decides which types exist, which fields they carry and
//! which of those fields are embedded. This crate only records that decision
//! ([`ReachTable`]) and derives the byte layout of every type from it
//! ([`LayoutTable`]). Both tables are built once and never mutated afterwards.
//!
//! ## Menu
//!
//! - [`TypeIdent`]: dense numeric type identity used on the wire.
//! - [`TypeKind`] and [`Builtin`]: structural kind and builtin special cases.
//! - [`ReachableType`] and [`Field`]: one node of the type set.
//! - [`ReachTable`]: the whole-program type set, loadable from RON.
//! - [`Target`], [`Width`], [`CompiledLayout`], [`LayoutTable`]: the layout side.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// no_std support

#[cfg(feature = "ron")]
extern crate std;

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod error;
mod ident;
mod kind;
mod layout;
mod table;
mod ty;

pub mod hash;

// -----------------------------------------------------------------------------
// Exports

pub use error::ReachError;
pub use ident::TypeIdent;
pub use kind::{Builtin, TypeKind};
pub use layout::{CompiledLayout, LayoutTable, StructLayout, Target, Unboxed, Width};
pub use table::{FieldDesc, ReachTable, TableDesc, TypeDesc};
pub use ty::{Field, ReachableType};
