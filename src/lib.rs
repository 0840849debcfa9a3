//! Per-type serialisation code generation for relocatable object-graph buffers.
//!
//! - [`reach`]: the reachable type set and its physical layout.
//! - [`codegen`]: the classifier and the serialiser/deserialiser generators.
//! - [`runtime`]: a reference host that executes the generated procedures.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

pub use vc_codegen as codegen;
pub use vc_reach as reach;
pub use vc_runtime as runtime;
