use alloc::string::String;

use thiserror::Error;

use crate::Addr;

// -----------------------------------------------------------------------------
// Error

/// Errors raised while executing generated procedures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RuntimeError {
    #[error("access of {len} bytes at {addr:#x} is out of bounds")]
    OutOfBounds { addr: Addr, len: u64 },

    #[error("address {0:#x} is read-only")]
    ReadOnly(Addr),

    #[error("heap exhausted")]
    OutOfMemory,

    #[error("address {0:#x} is not a type descriptor")]
    UnknownDescriptor(Addr),

    #[error("object at {0:#x} does not start with a type descriptor")]
    Untagged(Addr),

    #[error("no type with identity {0}")]
    UnknownType(u64),

    #[error("type `{0}` has no instance")]
    NoInstance(String),

    #[error("type `{0}` has no serialiser")]
    Unserialisable(String),

    #[error("type `{0}` has no deserialiser")]
    NotDeserialisable(String),

    #[error("type mismatch at offset {offset}: expected `{expect}`, found `{actual}`")]
    Mismatch {
        offset: u64,
        expect: String,
        actual: String,
    },

    #[error("segment at offset {offset} runs past the end of a {len}-byte buffer")]
    Truncated { offset: u64, len: u64 },

    #[error("address {0:#x} cannot be the root of a serialised graph")]
    InvalidRoot(Addr),

    #[error("custom hook `{0}` is not registered")]
    MissingHook(String),

    #[error("custom hook `{hook}` failed: {reason}")]
    Hook { hook: String, reason: String },

    #[error("field {index} of `{ty}` does not exist")]
    NoField { ty: String, index: usize },

    #[error("field {index} of `{ty}` is stored inline")]
    InlineField { ty: String, index: usize },
}
