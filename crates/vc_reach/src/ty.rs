use alloc::string::String;
use alloc::vec::Vec;

use crate::{Builtin, TypeIdent, TypeKind, Width};

// -----------------------------------------------------------------------------
// Field

/// A field of a reachable type, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    ty: TypeIdent,
    embed: bool,
}

impl Field {
    /// A field holding a reference to (or the raw word of) a value of type `ty`.
    #[inline]
    pub const fn new(ty: TypeIdent) -> Self {
        Self { ty, embed: false }
    }

    /// A field storing a value of type `ty` inline, by value.
    #[inline]
    pub const fn embedded(ty: TypeIdent) -> Self {
        Self { ty, embed: true }
    }

    /// The declared type of the field.
    #[inline]
    pub const fn ty(&self) -> TypeIdent {
        self.ty
    }

    /// Whether the field is stored inline in its owner.
    #[inline]
    pub const fn embed(&self) -> bool {
        self.embed
    }
}

// -----------------------------------------------------------------------------
// ReachableType

/// One node of the whole-program type set.
///
/// Created by [`ReachTable::declare`] and completed through the setters below.
/// Once the table is handed to layout computation it is treated as immutable.
///
/// [`ReachTable::declare`]: crate::ReachTable::declare
#[derive(Debug, Clone)]
pub struct ReachableType {
    name: String,
    id: TypeIdent,
    kind: TypeKind,
    builtin: Option<Builtin>,
    fields: Vec<Field>,
    word: Option<Width>,
    bare: bool,
    custom_serialise: Option<String>,
    subtypes: Vec<TypeIdent>,
}

impl ReachableType {
    pub(crate) fn new(name: String, id: TypeIdent, kind: TypeKind) -> Self {
        Self {
            name,
            id,
            kind,
            builtin: None,
            fields: Vec::new(),
            word: None,
            bare: false,
            custom_serialise: None,
            subtypes: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub const fn id(&self) -> TypeIdent {
        self.id
    }

    #[inline]
    pub const fn kind(&self) -> TypeKind {
        self.kind
    }

    #[inline]
    pub const fn builtin(&self) -> Option<Builtin> {
        self.builtin
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The raw machine word carried by a payload-bearing primitive.
    #[inline]
    pub const fn word(&self) -> Option<Width> {
        self.word
    }

    /// Whether a reference to this type is a plain function value.
    #[inline]
    pub const fn is_bare(&self) -> bool {
        self.bare
    }

    /// The external procedure appending a trailing payload, if any.
    #[inline]
    pub fn custom_serialise(&self) -> Option<&str> {
        self.custom_serialise.as_deref()
    }

    /// Concrete implementers of a bare interface, in enumeration order.
    #[inline]
    pub fn subtypes(&self) -> &[TypeIdent] {
        &self.subtypes
    }

    pub fn push_field(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn set_builtin(&mut self, builtin: Builtin) -> &mut Self {
        self.builtin = Some(builtin);
        self
    }

    pub fn set_word(&mut self, width: Width) -> &mut Self {
        self.word = Some(width);
        self
    }

    pub fn set_bare(&mut self) -> &mut Self {
        self.bare = true;
        self
    }

    pub fn set_custom_serialise(&mut self, hook: impl Into<String>) -> &mut Self {
        self.custom_serialise = Some(hook.into());
        self
    }

    pub fn push_subtype(&mut self, subtype: TypeIdent) -> &mut Self {
        self.subtypes.push(subtype);
        self
    }
}
