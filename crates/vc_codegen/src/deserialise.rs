use alloc::format;

use vc_reach::{Field, LayoutTable, ReachTable, ReachableType, TypeIdent, TypeKind, Width};

use crate::bare;
use crate::builder::FunctionBuilder;
use crate::ir::{Function, RuntimeFn, Symbol, Value};

/// Emits `{name}_Deserialise(ctx, object)`.
///
/// `object` already holds a bulk copy of the serialised fixed region. The
/// procedure repairs the slots that do not survive as raw bytes: descriptor
/// slots, bare function values and references.
pub(crate) fn make_deserialise(
    reach: &ReachTable,
    layouts: &LayoutTable,
    ty: &ReachableType,
) -> Function {
    let mut b = FunctionBuilder::new(format!("{}_Deserialise", ty.name()), 2);
    let ctx = b.param(0);
    let object = b.param(1);

    let mut emitter = Deserialiser {
        reach,
        layouts,
        word: layouts.target().pointer_width,
        ctx,
        b,
    };
    emitter.deserialise(ty.id(), object, true);

    let mut b = emitter.b;
    b.ret();
    b.finish()
}

struct Deserialiser<'a> {
    reach: &'a ReachTable,
    layouts: &'a LayoutTable,
    word: Width,
    ctx: Value,
    b: FunctionBuilder,
}

impl Deserialiser<'_> {
    fn write_descriptor(&mut self, id: TypeIdent, object: Value) {
        let desc = self.b.symbol(Symbol::Descriptor(id));
        self.b.store(object, desc, self.word);
    }

    fn deserialise(&mut self, id: TypeIdent, mut object: Value, boxed: bool) {
        let (reach, layouts) = (self.reach, self.layouts);
        let ty = &reach[id];
        let layout = layouts.get(id);
        let mut structure = layout.structure();
        let mut extra = 0;

        match ty.kind() {
            TypeKind::Primitive | TypeKind::Class => {
                self.write_descriptor(id, object);
                extra = 1;
            }
            TypeKind::Actor => {
                self.write_descriptor(id, object);
                extra = 2;
            }
            TypeKind::Tuple => {
                if boxed {
                    self.write_descriptor(id, object);
                    object = self.b.byte_add(object, structure.offset_of(1));
                }
                structure = match layout.unboxed_tuple() {
                    Some(unboxed) => unboxed,
                    None => panic!("tuple `{}` has no unboxed layout", ty.name()),
                };
            }
            TypeKind::Struct | TypeKind::Interface => {}
        }

        for (index, field) in ty.fields().iter().enumerate() {
            let ptr = self.b.byte_add(object, structure.offset_of(index + extra));
            self.deserialise_element(ty, field, ptr);
        }
    }

    fn deserialise_element(&mut self, owner: &ReachableType, field: &Field, ptr: Value) {
        let reach = self.reach;
        let ty = &reach[field.ty()];

        if field.embed() || ty.kind() == TypeKind::Tuple {
            self.deserialise(ty.id(), ptr, false);
        } else if self.layouts.get(ty.id()).machine_word().is_some() {
            // Already in place after the bulk copy.
        } else if ty.is_bare() {
            match ty.kind() {
                TypeKind::Primitive => {
                    let value = self.b.symbol(Symbol::BareMethod(ty.id()));
                    self.b.store(ptr, value, self.word);
                }
                TypeKind::Interface => {
                    bare::deserialise_interface(&mut self.b, ty, ptr, self.word);
                }
                kind => panic!(
                    "field of `{}` has bare type `{}` of kind {kind}",
                    owner.name(),
                    ty.name(),
                ),
            }
        } else {
            let offset = self.b.load(ptr, self.word);
            let desc = if ty.kind().has_descriptor() {
                self.b.symbol(Symbol::Descriptor(ty.id()))
            } else {
                self.b.const_int(0)
            };
            let object = self
                .b
                .call_runtime(RuntimeFn::DeserialiseOffset, &[self.ctx, desc, offset]);
            self.b.store(ptr, object, self.word);
        }
    }
}
