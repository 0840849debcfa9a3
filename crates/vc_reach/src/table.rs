use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Index;

use serde::Deserialize;

use crate::hash::{self, HashMap};
use crate::{Builtin, Field, ReachError, ReachableType, TypeIdent, TypeKind, Width};

// -----------------------------------------------------------------------------
// ReachTable

/// The whole-program set of reachable types.
///
/// Types are stored densely by [`TypeIdent`]; identities are handed out in
/// declaration order, so a type may refer to any other type declared in the
/// same table, including itself or types declared after it.
///
/// # Examples
///
/// ```
/// use vc_reach::{Field, ReachTable, TypeKind, Width};
///
/// let mut table = ReachTable::new();
/// let i64 = table.declare("I64", TypeKind::Primitive);
/// table.get_mut(i64).set_word(Width::W8);
///
/// let point = table.declare("Point", TypeKind::Class);
/// table
///     .get_mut(point)
///     .push_field(Field::new(i64))
///     .push_field(Field::new(i64));
///
/// assert_eq!(table.ident_of("Point"), Some(point));
/// assert_eq!(table[point].fields().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReachTable {
    types: Vec<ReachableType>,
    by_name: HashMap<String, TypeIdent>,
}

impl ReachTable {
    /// Create an empty table.
    #[inline]
    pub const fn new() -> Self {
        Self {
            types: Vec::new(),
            by_name: hash::new_map(),
        }
    }

    /// Declares a new type and returns its identity.
    ///
    /// # Panics
    /// - A type with the same name was already declared.
    pub fn declare(&mut self, name: impl Into<String>, kind: TypeKind) -> TypeIdent {
        let name = name.into();
        match self.try_declare(name, kind) {
            Ok(id) => id,
            Err(name) => panic!("type `{name}` is declared more than once"),
        }
    }

    fn try_declare(&mut self, name: String, kind: TypeKind) -> Result<TypeIdent, String> {
        if self.by_name.contains_key(&name) {
            return Err(name);
        }
        let id = TypeIdent::new(self.types.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.types.push(ReachableType::new(name, id, kind));
        Ok(id)
    }

    /// Returns the type with the given identity.
    #[inline]
    pub fn get(&self, id: TypeIdent) -> Option<&ReachableType> {
        self.types.get(id.index())
    }

    /// Returns the type with the given identity for completion.
    ///
    /// # Panics
    /// - `id` was not handed out by this table.
    pub fn get_mut(&mut self, id: TypeIdent) -> &mut ReachableType {
        match self.types.get_mut(id.index()) {
            Some(ty) => ty,
            None => panic!("type identity {id} is not part of this table"),
        }
    }

    /// Looks a type up by name.
    #[inline]
    pub fn ident_of(&self, name: &str) -> Option<TypeIdent> {
        self.by_name.get(name).copied()
    }

    /// Iterates over all types in identity order.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ReachableType> {
        self.types.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Builds a table from a by-name description.
    ///
    /// All names are declared first, so fields and subtypes may refer to
    /// types listed later in the description.
    pub fn from_desc(desc: TableDesc) -> Result<Self, ReachError> {
        let mut table = Self::new();

        for ty in &desc.types {
            table
                .try_declare(ty.name.clone(), ty.kind)
                .map_err(ReachError::Duplicate)?;
        }

        for ty in desc.types {
            let id = table.by_name[&ty.name];

            let resolve = |name: &String| {
                table.ident_of(name).ok_or_else(|| ReachError::Unknown {
                    owner: ty.name.clone(),
                    name: name.clone(),
                })
            };

            let fields = ty
                .fields
                .iter()
                .map(|f| {
                    let target = resolve(&f.ty)?;
                    Ok(if f.embed {
                        Field::embedded(target)
                    } else {
                        Field::new(target)
                    })
                })
                .collect::<Result<Vec<_>, ReachError>>()?;

            let subtypes = ty
                .subtypes
                .iter()
                .map(resolve)
                .collect::<Result<Vec<_>, ReachError>>()?;

            if !subtypes.is_empty() && !(ty.kind == TypeKind::Interface && ty.bare) {
                return Err(ReachError::UnexpectedSubtypes(ty.name));
            }

            let entry = table.get_mut(id);
            for field in fields {
                entry.push_field(field);
            }
            for subtype in subtypes {
                entry.push_subtype(subtype);
            }
            if let Some(builtin) = ty.builtin {
                entry.set_builtin(builtin);
            }
            if let Some(width) = ty.word {
                entry.set_word(width);
            }
            if ty.bare {
                entry.set_bare();
            }
            if let Some(hook) = ty.custom_serialise {
                entry.set_custom_serialise(hook);
            }
        }

        if let Some(id) = table.inline_cycle() {
            return Err(ReachError::EmbedCycle(table[id].name().into()));
        }

        log::debug!("reach table built with {} types", table.len());
        Ok(table)
    }

    /// A type lying on a cycle of inline fields, if there is one.
    ///
    /// Embedded fields and tuple-typed fields are stored inline; a cycle
    /// through them would need an infinitely large structure.
    fn inline_cycle(&self) -> Option<TypeIdent> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Fresh,
            Open,
            Closed,
        }

        fn visit(table: &ReachTable, id: TypeIdent, marks: &mut [Mark]) -> Option<TypeIdent> {
            match marks[id.index()] {
                Mark::Open => return Some(id),
                Mark::Closed => return None,
                Mark::Fresh => marks[id.index()] = Mark::Open,
            }
            for field in table[id].fields() {
                let inline = field.embed() || table[field.ty()].kind() == TypeKind::Tuple;
                if inline && let Some(found) = visit(table, field.ty(), marks) {
                    return Some(found);
                }
            }
            marks[id.index()] = Mark::Closed;
            None
        }

        let mut marks = alloc::vec![Mark::Fresh; self.len()];
        self.iter().find_map(|ty| visit(self, ty.id(), &mut marks))
    }

    /// Parses a RON [`TableDesc`] and builds the table from it.
    ///
    /// ```
    /// use vc_reach::{ReachTable, TypeKind};
    ///
    /// let table = ReachTable::from_ron(r#"(
    ///     types: [
    ///         (name: "Node", kind: Class, fields: [(ty: "Node")]),
    ///     ],
    /// )"#).unwrap();
    ///
    /// let node = table.ident_of("Node").unwrap();
    /// assert_eq!(table[node].kind(), TypeKind::Class);
    /// assert_eq!(table[node].fields()[0].ty(), node);
    /// ```
    #[cfg(feature = "ron")]
    pub fn from_ron(text: &str) -> Result<Self, ReachError> {
        let desc: TableDesc = ron::from_str(text)?;
        Self::from_desc(desc)
    }
}

impl Index<TypeIdent> for ReachTable {
    type Output = ReachableType;

    fn index(&self, id: TypeIdent) -> &ReachableType {
        match self.types.get(id.index()) {
            Some(ty) => ty,
            None => panic!("type identity {id} is not part of this table"),
        }
    }
}

// -----------------------------------------------------------------------------
// Descriptions

/// By-name description of a whole type set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableDesc {
    pub types: Vec<TypeDesc>,
}

/// By-name description of one type.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeDesc {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub builtin: Option<Builtin>,
    #[serde(default)]
    pub fields: Vec<FieldDesc>,
    #[serde(default)]
    pub word: Option<Width>,
    #[serde(default)]
    pub bare: bool,
    #[serde(default)]
    pub custom_serialise: Option<String>,
    #[serde(default)]
    pub subtypes: Vec<String>,
}

/// By-name description of one field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDesc {
    pub ty: String,
    #[serde(default)]
    pub embed: bool,
}
