use core::fmt;

use vc_reach::{Builtin, CompiledLayout, ReachableType, TypeKind};

// -----------------------------------------------------------------------------
// Verdict

/// Why a type gets no procedures at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Actor state belongs to the scheduler and has no serialised form.
    Actor,
    /// A builtin raw-address holder without a defined payload.
    RawAddress,
    /// An interface, which is never the runtime type of an object.
    Abstract,
}

/// The routing decision for one reachable type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// No procedures are generated.
    Skip(SkipReason),
    /// Procedures come from the specialised generator for this builtin.
    Delegate(Builtin),
    /// The generic algorithm runs; `deserialise` tells whether a
    /// deserialiser is generated next to the serialiser.
    Generate { deserialise: bool },
}

impl Verdict {
    /// Whether any procedure is expected for the type.
    #[inline]
    pub const fn is_skip(self) -> bool {
        matches!(self, Verdict::Skip(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Skip(reason) => write!(f, "skip ({reason:?})"),
            Verdict::Delegate(builtin) => write!(f, "delegate to {builtin}"),
            Verdict::Generate { deserialise: true } => f.pad("generate"),
            Verdict::Generate { deserialise: false } => f.pad("generate (serialise only)"),
        }
    }
}

// -----------------------------------------------------------------------------
// classify

/// Decides how procedures for `ty` are produced.
///
/// The decision depends only on the type's kind, builtin marker and layout,
/// so it is the same every time it is asked for one type.
pub fn classify(ty: &ReachableType, layout: &CompiledLayout) -> Verdict {
    match (ty.kind(), ty.builtin()) {
        (TypeKind::Actor, _) => Verdict::Skip(SkipReason::Actor),
        (TypeKind::Struct, Some(Builtin::Pointer | Builtin::MaybePointer)) => {
            Verdict::Skip(SkipReason::RawAddress)
        }
        (TypeKind::Class, Some(builtin @ (Builtin::Array | Builtin::String))) => {
            Verdict::Delegate(builtin)
        }
        (TypeKind::Interface, _) => Verdict::Skip(SkipReason::Abstract),
        // Marker primitives are singletons, never materialised from a buffer.
        (TypeKind::Primitive, _) => Verdict::Generate {
            deserialise: layout.primitive().is_some(),
        },
        (TypeKind::Class | TypeKind::Tuple | TypeKind::Struct, _) => {
            Verdict::Generate { deserialise: true }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vc_reach::{Field, LayoutTable, ReachTable, Target, Width};

    #[test]
    fn verdicts_by_kind() {
        let mut table = ReachTable::new();
        let u64_ty = table.declare("U64", TypeKind::Primitive);
        table.get_mut(u64_ty).set_word(Width::W8);
        let none = table.declare("None", TypeKind::Primitive);
        let main = table.declare("Main", TypeKind::Actor);
        let ptr = table.declare("Pointer[U8]", TypeKind::Struct);
        table.get_mut(ptr).set_builtin(Builtin::Pointer);
        let maybe = table.declare("NullablePointer[Foo]", TypeKind::Struct);
        table.get_mut(maybe).set_builtin(Builtin::MaybePointer);
        let array = table.declare("Array[U64]", TypeKind::Class);
        table.get_mut(array).set_builtin(Builtin::Array);
        let string = table.declare("String", TypeKind::Class);
        table.get_mut(string).set_builtin(Builtin::String);
        let iface = table.declare("Stringable", TypeKind::Interface);
        let tuple = table.declare("(U64, U64)", TypeKind::Tuple);
        table
            .get_mut(tuple)
            .push_field(Field::new(u64_ty))
            .push_field(Field::new(u64_ty));
        let native = table.declare("Native", TypeKind::Struct);
        table.get_mut(native).push_field(Field::new(u64_ty));
        let class = table.declare("Foo", TypeKind::Class);

        let layouts = LayoutTable::compute(&table, Target::default());
        let verdict = |id| classify(&table[id], layouts.get(id));

        assert_eq!(verdict(u64_ty), Verdict::Generate { deserialise: true });
        assert_eq!(verdict(none), Verdict::Generate { deserialise: false });
        assert_eq!(verdict(main), Verdict::Skip(SkipReason::Actor));
        assert_eq!(verdict(ptr), Verdict::Skip(SkipReason::RawAddress));
        assert_eq!(verdict(maybe), Verdict::Skip(SkipReason::RawAddress));
        assert_eq!(verdict(array), Verdict::Delegate(Builtin::Array));
        assert_eq!(verdict(string), Verdict::Delegate(Builtin::String));
        assert_eq!(verdict(iface), Verdict::Skip(SkipReason::Abstract));
        assert_eq!(verdict(tuple), Verdict::Generate { deserialise: true });
        assert_eq!(verdict(native), Verdict::Generate { deserialise: true });
        assert_eq!(verdict(class), Verdict::Generate { deserialise: true });
    }

    #[test]
    fn classification_is_stable() {
        let mut table = ReachTable::new();
        let a = table.declare("A", TypeKind::Class);
        let layouts = LayoutTable::compute(&table, Target::default());
        let first = classify(&table[a], layouts.get(a));
        let second = classify(&table[a], layouts.get(a));
        assert_eq!(first, second);
    }
}
