use alloc::string::String;

use thiserror::Error;

/// Errors raised while building a [`ReachTable`](crate::ReachTable) from a description.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReachError {
    #[error("type `{0}` is declared more than once")]
    Duplicate(String),

    #[error("type `{owner}` refers to undeclared type `{name}`")]
    Unknown { owner: String, name: String },

    #[error("type `{0}` lists subtypes but is not a bare interface")]
    UnexpectedSubtypes(String),

    #[error("inline fields of `{0}` form a cycle")]
    EmbedCycle(String),

    #[cfg(feature = "ron")]
    #[error("malformed type set: {0}")]
    Parse(#[from] ron::error::SpannedError),
}
