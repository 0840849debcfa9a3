use alloc::boxed::Box;
use alloc::vec::Vec;

use vc_reach::hash::{self, HashMap};
use vc_reach::{Builtin, CompiledLayout, LayoutTable, ReachTable, ReachableType, Target, TypeIdent};

use crate::classify::{Verdict, classify};
use crate::deserialise::make_deserialise;
use crate::ir::Function;
use crate::serialise::make_serialise;

// -----------------------------------------------------------------------------
// Procedures

/// The procedures attached to one type.
#[derive(Debug)]
pub struct Procedures {
    serialise: Function,
    deserialise: Option<Function>,
}

impl Procedures {
    #[inline]
    pub const fn new(serialise: Function, deserialise: Option<Function>) -> Self {
        Self {
            serialise,
            deserialise,
        }
    }

    #[inline]
    pub const fn serialise(&self) -> &Function {
        &self.serialise
    }

    #[inline]
    pub const fn deserialise(&self) -> Option<&Function> {
        self.deserialise.as_ref()
    }
}

/// Produces the procedures of a builtin container type.
///
/// Containers manage their own length and capacity, so the generic field
/// walk does not apply to them. A specialised generator receives the same
/// inputs as the generic one and must follow the same procedure signatures.
pub trait SpecialisedGenerator: Send + Sync {
    fn generate(&self, ty: &ReachableType, layout: &CompiledLayout, target: &Target) -> Procedures;
}

// -----------------------------------------------------------------------------
// Generator

/// Drives classification and generation over a whole type set.
///
/// # Examples
///
/// ```
/// use vc_codegen::{Generator, Verdict};
/// use vc_reach::{Field, ReachTable, Target, TypeKind, Width};
///
/// let mut table = ReachTable::new();
/// let i64 = table.declare("I64", TypeKind::Primitive);
/// table.get_mut(i64).set_word(Width::W8);
/// let point = table.declare("Point", TypeKind::Class);
/// table.get_mut(point).push_field(Field::new(i64)).push_field(Field::new(i64));
///
/// let program = Generator::new(table, Target::default()).generate_all();
/// assert_eq!(program.verdict(point), Verdict::Generate { deserialise: true });
/// assert_eq!(program.serialiser(point).unwrap().name(), "Point_Serialise");
/// ```
pub struct Generator {
    reach: ReachTable,
    layouts: LayoutTable,
    verdicts: Vec<Option<Verdict>>,
    procs: Vec<Option<Procedures>>,
    specialised: HashMap<Builtin, Box<dyn SpecialisedGenerator>>,
}

impl Generator {
    /// Computes the layouts of `reach` for `target`.
    pub fn new(reach: ReachTable, target: Target) -> Self {
        let layouts = LayoutTable::compute(&reach, target);
        let len = reach.len();
        Self {
            reach,
            layouts,
            verdicts: (0..len).map(|_| None).collect(),
            procs: (0..len).map(|_| None).collect(),
            specialised: hash::new_map(),
        }
    }

    /// Registers the generator used for a builtin container kind.
    pub fn with_specialised(
        mut self,
        builtin: Builtin,
        generator: impl SpecialisedGenerator + 'static,
    ) -> Self {
        self.specialised.insert(builtin, Box::new(generator));
        self
    }

    #[inline]
    pub fn reach(&self) -> &ReachTable {
        &self.reach
    }

    #[inline]
    pub fn layouts(&self) -> &LayoutTable {
        &self.layouts
    }

    /// Classifies type `id` and generates its procedures.
    ///
    /// Asking again for a type that was already handled returns the recorded
    /// verdict and generates nothing.
    pub fn generate_type(&mut self, id: TypeIdent) -> Verdict {
        if let Some(verdict) = self.verdicts[id.index()] {
            return verdict;
        }

        let ty = &self.reach[id];
        let layout = self.layouts.get(id);
        let verdict = classify(ty, layout);
        log::debug!("`{}`: {verdict}", ty.name());

        let procs = match verdict {
            Verdict::Skip(_) => None,
            Verdict::Delegate(builtin) => match self.specialised.get(&builtin) {
                Some(generator) => Some(generator.generate(ty, layout, self.layouts.target())),
                None => {
                    log::warn!(
                        "no specialised generator for {builtin}, `{}` gets no procedures",
                        ty.name()
                    );
                    None
                }
            },
            Verdict::Generate { deserialise } => {
                let serialise = make_serialise(&self.reach, &self.layouts, ty);
                let deserialise =
                    deserialise.then(|| make_deserialise(&self.reach, &self.layouts, ty));
                Some(Procedures::new(serialise, deserialise))
            }
        };

        if let Some(procs) = procs {
            log::debug!(
                "`{}`: serialiser with {} values, deserialiser with {} values",
                ty.name(),
                procs.serialise.value_count(),
                procs.deserialise.as_ref().map_or(0, Function::value_count),
            );
            self.attach(id, procs);
        }

        self.verdicts[id.index()] = Some(verdict);
        verdict
    }

    fn attach(&mut self, id: TypeIdent, procs: Procedures) {
        let slot = &mut self.procs[id.index()];
        if slot.is_some() {
            panic!("procedures of `{}` generated twice", self.reach[id].name());
        }
        *slot = Some(procs);
    }

    /// Handles every type in identity order and freezes the result.
    pub fn generate_all(mut self) -> Program {
        for index in 0..self.reach.len() {
            self.generate_type(TypeIdent::new(index as u32));
        }
        self.finish()
    }

    /// Freezes the result. Types never handed to
    /// [`generate_type`](Self::generate_type) are classified now but get no
    /// procedures.
    pub fn finish(self) -> Program {
        let verdicts = self
            .verdicts
            .iter()
            .zip(self.reach.iter())
            .map(|(verdict, ty)| {
                verdict.unwrap_or_else(|| classify(ty, self.layouts.get(ty.id())))
            })
            .collect();

        Program {
            reach: self.reach,
            layouts: self.layouts,
            verdicts,
            procs: self.procs,
        }
    }
}

// -----------------------------------------------------------------------------
// Program

/// The frozen output of generation: the type set, its layouts, and the
/// procedures attached to each type.
#[derive(Debug)]
pub struct Program {
    reach: ReachTable,
    layouts: LayoutTable,
    verdicts: Vec<Verdict>,
    procs: Vec<Option<Procedures>>,
}

impl Program {
    #[inline]
    pub fn reach(&self) -> &ReachTable {
        &self.reach
    }

    #[inline]
    pub fn layouts(&self) -> &LayoutTable {
        &self.layouts
    }

    #[inline]
    pub fn target(&self) -> &Target {
        self.layouts.target()
    }

    #[inline]
    pub fn verdict(&self, id: TypeIdent) -> Verdict {
        self.verdicts[id.index()]
    }

    #[inline]
    pub fn procedures(&self, id: TypeIdent) -> Option<&Procedures> {
        self.procs[id.index()].as_ref()
    }

    #[inline]
    pub fn serialiser(&self, id: TypeIdent) -> Option<&Function> {
        self.procedures(id).map(Procedures::serialise)
    }

    #[inline]
    pub fn deserialiser(&self, id: TypeIdent) -> Option<&Function> {
        self.procedures(id).and_then(Procedures::deserialise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FunctionBuilder, SkipReason};
    use crate::ir::{Inst, RuntimeFn, Symbol};
    use alloc::string::ToString;
    use vc_reach::{Field, TypeKind, Width};

    fn scalar(table: &mut ReachTable, name: &str, width: Width) -> TypeIdent {
        let id = table.declare(name, TypeKind::Primitive);
        table.get_mut(id).set_word(width);
        id
    }

    fn count(func: &Function, pred: impl Fn(&Inst) -> bool) -> usize {
        func.insts().filter(|inst| pred(inst)).count()
    }

    #[test]
    fn point_serialiser() {
        let mut table = ReachTable::new();
        let i64 = scalar(&mut table, "I64", Width::W8);
        let point = table.declare("Point", TypeKind::Class);
        table
            .get_mut(point)
            .push_field(Field::new(i64))
            .push_field(Field::new(i64));

        let program = Generator::new(table, Target::default()).generate_all();
        let text = program.serialiser(point).unwrap().to_string();
        let expected = "\
fn Point_Serialise(4) {
entry.0:
  %0 = param 0
  %1 = param 1
  %2 = param 2
  %3 = param 3
  %4 = add %2, %3
  %5 = const 1
  store.W8 %4, %5
  %6 = add %1, 8
  %7 = add %4, 8
  %8 = load.W8 %6
  store.W8 %7, %8
  %9 = add %1, 16
  %10 = add %4, 16
  %11 = load.W8 %9
  store.W8 %10, %11
  ret
}
";
        assert_eq!(text, expected);

        let text = program.deserialiser(point).unwrap().to_string();
        let expected = "\
fn Point_Deserialise(2) {
entry.0:
  %0 = param 0
  %1 = param 1
  %2 = @desc.1
  store.W8 %1, %2
  %3 = add %1, 8
  %4 = add %1, 16
  ret
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn bare_interface_chain() {
        let mut table = ReachTable::new();
        let subs = ["I1", "I2", "I3"].map(|name| {
            let id = table.declare(name, TypeKind::Primitive);
            table.get_mut(id).set_bare();
            id
        });
        let iface = table.declare("Callback", TypeKind::Interface);
        for sub in subs {
            table.get_mut(iface).push_subtype(sub);
        }
        table.get_mut(iface).set_bare();
        let holder = table.declare("Holder", TypeKind::Class);
        table.get_mut(holder).push_field(Field::new(iface));

        let program = Generator::new(table, Target::default()).generate_all();
        let ser = program.serialiser(holder).unwrap();

        assert_eq!(count(ser, |i| matches!(i, Inst::IcmpEq { .. })), 2);
        for (sub, tested) in subs.into_iter().zip([true, true, false]) {
            let found = count(ser, |i| {
                matches!(i, Inst::Symbol { symbol, .. } if *symbol == Symbol::Instance(sub))
            });
            assert_eq!(found == 1, tested);
        }

        let phi = ser
            .insts()
            .find_map(|inst| match inst {
                Inst::Phi { incoming, .. } => Some(incoming.len()),
                _ => None,
            })
            .unwrap();
        assert_eq!(phi, 3);

        // The merge block comes last, after every test block.
        let names = ser.blocks().map(|(_, b)| b.name()).collect::<Vec<_>>();
        assert_eq!(names, ["entry", "bare_subtype", "bare_subtype", "bare_post"]);

        let de = program.deserialiser(holder).unwrap();
        assert_eq!(count(de, |i| matches!(i, Inst::DescInstance { .. })), 1);
        assert_eq!(de.blocks().count(), 1);
    }

    #[test]
    fn single_implementer_needs_no_test() {
        let mut table = ReachTable::new();
        let only = table.declare("Only", TypeKind::Primitive);
        table.get_mut(only).set_bare();
        let iface = table.declare("Fn", TypeKind::Interface);
        table.get_mut(iface).set_bare().push_subtype(only);
        let holder = table.declare("Holder", TypeKind::Class);
        table.get_mut(holder).push_field(Field::new(iface));

        let program = Generator::new(table, Target::default()).generate_all();
        let ser = program.serialiser(holder).unwrap();
        assert_eq!(count(ser, |i| matches!(i, Inst::IcmpEq { .. })), 0);
        assert_eq!(ser.blocks().count(), 2);
    }

    #[test]
    fn empty_subtype_set_emits_nothing() {
        let mut table = ReachTable::new();
        let iface = table.declare("Never", TypeKind::Interface);
        table.get_mut(iface).set_bare();
        let holder = table.declare("Holder", TypeKind::Class);
        table.get_mut(holder).push_field(Field::new(iface));

        let program = Generator::new(table, Target::default()).generate_all();
        let ser = program.serialiser(holder).unwrap();
        assert_eq!(ser.blocks().count(), 1);
        assert_eq!(count(ser, |i| matches!(i, Inst::Load { .. })), 0);
    }

    #[test]
    fn actor_is_skipped_but_referenced_by_offset() {
        let mut table = ReachTable::new();
        let main = table.declare("Main", TypeKind::Actor);
        let holder = table.declare("Holder", TypeKind::Class);
        table.get_mut(holder).push_field(Field::new(main));

        let program = Generator::new(table, Target::default()).generate_all();
        assert!(program.verdict(main).is_skip());
        assert!(program.procedures(main).is_none());

        let ser = program.serialiser(holder).unwrap();
        let calls = count(ser, |i| {
            matches!(i, Inst::CallRuntime { func: RuntimeFn::SerialiseOffset, .. })
        });
        assert_eq!(calls, 1);

        let de = program.deserialiser(holder).unwrap();
        let expected = Symbol::Descriptor(main);
        assert_eq!(
            count(de, |i| matches!(i, Inst::Symbol { symbol, .. } if *symbol == expected)),
            1
        );
    }

    #[test]
    fn struct_reference_resolves_without_descriptor() {
        let mut table = ReachTable::new();
        let native = table.declare("Native", TypeKind::Struct);
        let holder = table.declare("Holder", TypeKind::Class);
        table.get_mut(holder).push_field(Field::new(native));

        let program = Generator::new(table, Target::default()).generate_all();
        let de = program.deserialiser(holder).unwrap();
        assert_eq!(count(de, |i| matches!(i, Inst::Const { value: 0, .. })), 1);
        assert_eq!(
            count(de, |i| matches!(i, Inst::Symbol { symbol: Symbol::Descriptor(_), .. })),
            1
        );
    }

    #[test]
    fn boxed_tuple_and_custom_hook() {
        let mut table = ReachTable::new();
        let i32 = scalar(&mut table, "I32", Width::W4);
        let bool_ty = scalar(&mut table, "Bool", Width::W1);
        let pair = table.declare("(I32, Bool)", TypeKind::Tuple);
        table
            .get_mut(pair)
            .push_field(Field::new(i32))
            .push_field(Field::new(bool_ty))
            .set_custom_serialise("pair_extra");

        let program = Generator::new(table, Target::default()).generate_all();
        let text = program.serialiser(pair).unwrap().to_string();
        assert!(text.contains("%6 = add %1, 8\n  %7 = add %4, 8\n"));
        assert!(text.contains("load.W4"));
        assert!(text.contains("load.W1"));
        assert!(text.contains("%12 = add %4, 16\n  call @pair_extra(%1, %12)\n"));
    }

    #[test]
    fn regeneration_is_a_no_op() {
        let mut table = ReachTable::new();
        let a = table.declare("A", TypeKind::Class);
        let mut generator = Generator::new(table, Target::default());
        let first = generator.generate_type(a);
        let second = generator.generate_type(a);
        assert_eq!(first, second);
        assert!(generator.procs[a.index()].is_some());
    }

    struct Opaque;

    impl SpecialisedGenerator for Opaque {
        fn generate(&self, ty: &ReachableType, _: &CompiledLayout, _: &Target) -> Procedures {
            let mut b = FunctionBuilder::new(ty.name().to_string() + "_Serialise", 4);
            b.ret();
            Procedures::new(b.finish(), None)
        }
    }

    #[test]
    fn containers_are_delegated() {
        let mut table = ReachTable::new();
        let array = table.declare("Array[U8]", TypeKind::Class);
        table.get_mut(array).set_builtin(Builtin::Array);
        let string = table.declare("String", TypeKind::Class);
        table.get_mut(string).set_builtin(Builtin::String);

        let program = Generator::new(table, Target::default())
            .with_specialised(Builtin::Array, Opaque)
            .generate_all();

        assert_eq!(program.verdict(array), Verdict::Delegate(Builtin::Array));
        assert_eq!(program.serialiser(array).unwrap().name(), "Array[U8]_Serialise");
        assert!(program.deserialiser(array).is_none());

        // No generator registered for strings.
        assert_eq!(program.verdict(string), Verdict::Delegate(Builtin::String));
        assert!(program.procedures(string).is_none());
    }

    #[test]
    #[should_panic(expected = "bare type `Bad` of kind Class")]
    fn bare_class_field_is_fatal() {
        let mut table = ReachTable::new();
        let bad = table.declare("Bad", TypeKind::Class);
        table.get_mut(bad).set_bare();
        let holder = table.declare("Holder", TypeKind::Class);
        table.get_mut(holder).push_field(Field::new(bad));
        Generator::new(table, Target::default()).generate_all();
    }

    #[test]
    fn finish_classifies_untouched_types() {
        let mut table = ReachTable::new();
        let a = table.declare("A", TypeKind::Class);
        let b = table.declare("B", TypeKind::Actor);
        let mut generator = Generator::new(table, Target::default());
        generator.generate_type(b);
        let program = generator.finish();
        assert_eq!(program.verdict(a), Verdict::Generate { deserialise: true });
        assert!(program.procedures(a).is_none());
        assert_eq!(program.verdict(b), Verdict::Skip(SkipReason::Actor));
    }
}
