use core::fmt;

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// TypeKind

/// The structural kind of a reachable type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// A value primitive, either a marker or a boxed machine word.
    Primitive,
    /// A heap-allocated reference class.
    Class,
    /// A concurrent entity whose state is owned by the scheduler.
    Actor,
    /// An anonymous product type, boxed or unboxed depending on use.
    Tuple,
    /// An opaque native struct without a descriptor header.
    Struct,
    /// A structural interface, never instantiated directly.
    Interface,
}

impl TypeKind {
    /// Whether values of this kind start with a descriptor slot when boxed.
    #[inline]
    pub const fn has_descriptor(self) -> bool {
        !matches!(self, Self::Struct | Self::Interface)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive => f.pad("Primitive"),
            Self::Class => f.pad("Class"),
            Self::Actor => f.pad("Actor"),
            Self::Tuple => f.pad("Tuple"),
            Self::Struct => f.pad("Struct"),
            Self::Interface => f.pad("Interface"),
        }
    }
}

// -----------------------------------------------------------------------------
// Builtin

/// Builtin types that never go through the generic algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    /// Growable array, serialised by a specialised generator.
    Array,
    /// Text buffer, serialised by a specialised generator.
    String,
    /// Raw address holder, never serialised.
    Pointer,
    /// Optional raw address holder, never serialised.
    MaybePointer,
}

impl Builtin {
    /// Whether the builtin is handed to a specialised generator.
    #[inline]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Array | Self::String)
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array => f.pad("Array"),
            Self::String => f.pad("String"),
            Self::Pointer => f.pad("Pointer"),
            Self::MaybePointer => f.pad("MaybePointer"),
        }
    }
}
