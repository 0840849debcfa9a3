use alloc::format;

use vc_reach::{Field, LayoutTable, ReachTable, ReachableType, TypeIdent, TypeKind, Width};

use crate::bare;
use crate::builder::FunctionBuilder;
use crate::ir::{Function, RuntimeFn, Value};

// -----------------------------------------------------------------------------
// make_serialise

/// Emits `{name}_Serialise(ctx, object, buffer, offset)`.
///
/// The procedure writes the fixed region of `object` at `buffer + offset`
/// and then hands the bytes right after that region to the custom hook of
/// the type, if it has one.
pub(crate) fn make_serialise(
    reach: &ReachTable,
    layouts: &LayoutTable,
    ty: &ReachableType,
) -> Function {
    let mut b = FunctionBuilder::new(format!("{}_Serialise", ty.name()), 4);
    let ctx = b.param(0);
    let object = b.param(1);
    let buffer = b.param(2);
    let offset = b.param(3);
    let dest = b.add(buffer, offset);

    let mut emitter = Serialiser {
        reach,
        layouts,
        word: layouts.target().pointer_width,
        ctx,
        b,
    };
    emitter.serialise(ty.id(), object, dest, true);

    let mut b = emitter.b;
    if let Some(hook) = ty.custom_serialise() {
        let size = layouts.get(ty.id()).structure().size();
        let tail = b.byte_add(dest, size);
        b.call_custom(hook, object, tail);
    }
    b.ret();
    b.finish()
}

// -----------------------------------------------------------------------------
// Serialiser

struct Serialiser<'a> {
    reach: &'a ReachTable,
    layouts: &'a LayoutTable,
    word: Width,
    ctx: Value,
    b: FunctionBuilder,
}

impl Serialiser<'_> {
    fn emit_typeid(&mut self, id: TypeIdent, dest: Value) {
        let value = self.b.const_int(id.get() as u64);
        self.b.store(dest, value, self.word);
    }

    /// Writes the value of type `id` found at `object` to `dest`.
    ///
    /// `boxed` only matters for tuples: a boxed tuple carries a descriptor
    /// slot in front of its elements, an unboxed one does not.
    fn serialise(&mut self, id: TypeIdent, mut object: Value, mut dest: Value, boxed: bool) {
        let (reach, layouts) = (self.reach, self.layouts);
        let ty = &reach[id];
        let layout = layouts.get(id);
        let mut structure = layout.structure();
        let mut extra = 0;

        match ty.kind() {
            TypeKind::Primitive => {
                self.emit_typeid(id, dest);

                if let Some(width) = layout.machine_word() {
                    let offset = structure.offset_of(1);
                    let src = self.b.byte_add(object, offset);
                    let dst = self.b.byte_add(dest, offset);
                    let value = self.b.load(src, width);
                    self.b.store(dst, value, width);
                }
                return;
            }
            TypeKind::Class => {
                self.emit_typeid(id, dest);
                extra = 1;
            }
            TypeKind::Actor => {
                // The scheduling pad is left untouched.
                self.emit_typeid(id, dest);
                extra = 2;
            }
            TypeKind::Tuple => {
                if boxed {
                    self.emit_typeid(id, dest);
                    let offset = structure.offset_of(1);
                    object = self.b.byte_add(object, offset);
                    dest = self.b.byte_add(dest, offset);
                }
                structure = match layout.unboxed_tuple() {
                    Some(unboxed) => unboxed,
                    None => panic!("tuple `{}` has no unboxed layout", ty.name()),
                };
            }
            TypeKind::Struct | TypeKind::Interface => {}
        }

        for (index, field) in ty.fields().iter().enumerate() {
            let offset = structure.offset_of(index + extra);
            let src = self.b.byte_add(object, offset);
            let dst = self.b.byte_add(dest, offset);
            self.serialise_element(ty, field, src, dst);
        }
    }

    fn serialise_element(&mut self, owner: &ReachableType, field: &Field, ptr: Value, dest: Value) {
        let reach = self.reach;
        let ty = &reach[field.ty()];

        if field.embed() || ty.kind() == TypeKind::Tuple {
            log::trace!("{}: `{}` serialised in place", owner.name(), ty.name());
            self.serialise(ty.id(), ptr, dest, false);
        } else if let Some(width) = self.layouts.get(ty.id()).machine_word() {
            log::trace!("{}: `{}` copied as {width}", owner.name(), ty.name());
            let value = self.b.load(ptr, width);
            self.b.store(dest, value, width);
        } else if ty.is_bare() {
            match ty.kind() {
                TypeKind::Primitive => {
                    log::trace!("{}: `{}` written as bare tag", owner.name(), ty.name());
                    self.emit_typeid(ty.id(), dest);
                }
                TypeKind::Interface => {
                    log::trace!("{}: `{}` resolved by chain", owner.name(), ty.name());
                    bare::serialise_interface(&mut self.b, ty, ptr, dest, self.word);
                }
                kind => panic!(
                    "field of `{}` has bare type `{}` of kind {kind}",
                    owner.name(),
                    ty.name(),
                ),
            }
        } else {
            log::trace!("{}: `{}` written as offset", owner.name(), ty.name());
            let value = self.b.load(ptr, self.word);
            let offset = self
                .b
                .call_runtime(RuntimeFn::SerialiseOffset, &[self.ctx, value]);
            self.b.store(dest, offset, self.word);
        }
    }
}
