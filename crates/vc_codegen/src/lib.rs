//! Generation of per-type serialise and deserialise procedures.
//!
//! For every type of a [`ReachTable`](vc_reach::ReachTable) the [`Generator`]
//! asks [`classify`] whether to skip it, hand it to a
//! [`SpecialisedGenerator`], or run the generic field walk. The generic walk
//! emits a serialiser writing the type's wire segment and, in most cases, a
//! deserialiser repairing a bulk copy of that segment in place.
//!
//! Procedures are expressed in a small block-based [`ir`] and never run at
//! generation time; a host executes them later against real memory.
//!
//! ## Menu
//!
//! - [`classify`], [`Verdict`], [`SkipReason`]: routing of one type.
//! - [`Generator`], [`Program`], [`Procedures`]: the dispatcher and its output.
//! - [`FunctionBuilder`] and [`ir`]: procedure construction and representation.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// no_std support

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod bare;
mod builder;
mod classify;
mod deserialise;
mod program;
mod serialise;

pub mod ir;

// -----------------------------------------------------------------------------
// Exports

pub use builder::FunctionBuilder;
pub use classify::{SkipReason, Verdict, classify};
pub use program::{Generator, Procedures, Program, SpecialisedGenerator};
