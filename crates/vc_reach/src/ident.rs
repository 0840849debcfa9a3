use core::fmt;

use serde::{Deserialize, Serialize};

/// Dense numeric identity of a reachable type.
///
/// Identities are assigned in declaration order starting at zero, so they can
/// index the global descriptor table directly. The wire format stores an
/// identity wherever a live descriptor pointer would otherwise appear.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeIdent(u32);

impl TypeIdent {
    /// Creates an identity from its raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw identity, as written to the wire.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The identity as a table index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TypeIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for TypeIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
