use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{ReachTable, ReachableType, TypeIdent, TypeKind};

// -----------------------------------------------------------------------------
// Width

/// Width of a memory operation or a raw machine word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Width {
    /// 1 byte
    W1,
    /// 2 bytes
    W2,
    /// 4 bytes
    W4,
    /// 8 bytes
    W8,
}

impl Width {
    /// The width in bytes.
    #[inline]
    pub const fn bytes(self) -> u32 {
        match self {
            Width::W1 => 1,
            Width::W2 => 2,
            Width::W4 => 4,
            Width::W8 => 8,
        }
    }

    /// Mask selecting the low `bytes()` bytes of a `u64`.
    #[inline]
    pub const fn mask(self) -> u64 {
        match self {
            Width::W1 => 0xFF,
            Width::W2 => 0xFFFF,
            Width::W4 => 0xFFFF_FFFF,
            Width::W8 => u64::MAX,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Width::W1 => f.pad("W1"),
            Width::W2 => f.pad("W2"),
            Width::W4 => f.pad("W4"),
            Width::W8 => f.pad("W8"),
        }
    }
}

// -----------------------------------------------------------------------------
// Target

/// The target machine the layout is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    /// Native address width, `W4` or `W8`.
    pub pointer_width: Width,
    /// Bytes reserved after an actor's descriptor for scheduler state.
    pub actor_pad: u32,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            pointer_width: Width::W8,
            actor_pad: 248,
        }
    }
}

impl Target {
    /// Pointer size in bytes.
    #[inline]
    pub const fn word(&self) -> u32 {
        self.pointer_width.bytes()
    }
}

// -----------------------------------------------------------------------------
// StructLayout

/// C-like layout of an ordered sequence of elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructLayout {
    offsets: Vec<u32>,
    size: u32,
    align: u32,
}

impl StructLayout {
    fn build(elements: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut offsets = Vec::new();
        let mut offset = 0u32;
        let mut max_align = 1u32;

        for (size, align) in elements {
            offset = offset.next_multiple_of(align);
            offsets.push(offset);
            offset += size;
            max_align = max_align.max(align);
        }

        Self {
            offsets,
            size: offset.next_multiple_of(max_align),
            align: max_align,
        }
    }

    /// Byte offset of element `index`.
    ///
    /// # Panics
    /// - `index` is out of range.
    #[inline]
    pub fn offset_of(&self, index: usize) -> u32 {
        self.offsets[index]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Total size including tail padding.
    #[inline]
    pub const fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub const fn align(&self) -> u32 {
        self.align
    }
}

// -----------------------------------------------------------------------------
// CompiledLayout

/// The unboxed representation of a type, when it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unboxed {
    /// The type collapses to a raw machine word.
    Word(Width),
    /// The element layout of a tuple without its descriptor.
    Tuple(StructLayout),
}

/// Physical counterpart of a [`ReachableType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledLayout {
    id: TypeIdent,
    structure: StructLayout,
    primitive: Option<Unboxed>,
    mem_size: u32,
    mem_align: u32,
}

impl CompiledLayout {
    #[inline]
    pub const fn id(&self) -> TypeIdent {
        self.id
    }

    /// The boxed (heap) layout, including any descriptor slot.
    #[inline]
    pub const fn structure(&self) -> &StructLayout {
        &self.structure
    }

    #[inline]
    pub const fn primitive(&self) -> Option<&Unboxed> {
        self.primitive.as_ref()
    }

    /// The raw machine word this type collapses to, if any.
    #[inline]
    pub const fn machine_word(&self) -> Option<Width> {
        match self.primitive {
            Some(Unboxed::Word(width)) => Some(width),
            _ => None,
        }
    }

    /// The unboxed element layout of a tuple.
    #[inline]
    pub const fn unboxed_tuple(&self) -> Option<&StructLayout> {
        match &self.primitive {
            Some(Unboxed::Tuple(layout)) => Some(layout),
            _ => None,
        }
    }

    /// Size occupied by a non-embedded field of this type.
    #[inline]
    pub const fn mem_size(&self) -> u32 {
        self.mem_size
    }

    #[inline]
    pub const fn mem_align(&self) -> u32 {
        self.mem_align
    }
}

// -----------------------------------------------------------------------------
// LayoutTable

/// Layouts of every type of a [`ReachTable`], indexed by [`TypeIdent`].
#[derive(Debug, Clone)]
pub struct LayoutTable {
    target: Target,
    layouts: Vec<CompiledLayout>,
}

impl LayoutTable {
    /// Computes the layout of every type in `table`.
    ///
    /// # Panics
    /// - The pointer width is neither `W4` nor `W8`.
    /// - Embedded fields form a cycle.
    pub fn compute(table: &ReachTable, target: Target) -> Self {
        assert!(
            matches!(target.pointer_width, Width::W4 | Width::W8),
            "unsupported pointer width {}",
            target.pointer_width,
        );

        let mut state = LayoutState {
            table,
            target,
            done: (0..table.len()).map(|_| None).collect(),
            active: Vec::new(),
        };

        for ty in table.iter() {
            state.layout(ty.id());
        }

        let layouts = state.done.into_iter().flatten().collect::<Vec<_>>();

        log::debug!("computed {} layouts", layouts.len());

        Self { target, layouts }
    }

    #[inline]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// Returns the layout of type `id`.
    ///
    /// # Panics
    /// - `id` is not part of the table the layouts were computed from.
    #[inline]
    pub fn get(&self, id: TypeIdent) -> &CompiledLayout {
        &self.layouts[id.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layouts.len()
    }
}

struct LayoutState<'a> {
    table: &'a ReachTable,
    target: Target,
    done: Vec<Option<CompiledLayout>>,
    active: Vec<TypeIdent>,
}

impl LayoutState<'_> {
    fn layout(&mut self, id: TypeIdent) -> &CompiledLayout {
        if self.done[id.index()].is_none() {
            if self.active.contains(&id) {
                panic!(
                    "embedded fields of `{}` form a cycle",
                    self.table[id].name()
                );
            }
            self.active.push(id);
            let table = self.table;
            let layout = self.compute(&table[id]);
            self.active.pop();
            self.done[id.index()] = Some(layout);
        }

        match &self.done[id.index()] {
            Some(layout) => layout,
            None => unreachable!(),
        }
    }

    // Size and alignment of one field inside its owner.
    // Only inline storage needs the field type's layout; references are one
    // word whatever they point to, so reference cycles never recurse.
    fn field_mem(&mut self, ty: TypeIdent, embed: bool) -> (u32, u32) {
        let table = self.table;
        let field_ty = &table[ty];
        match field_ty.kind() {
            TypeKind::Tuple => {
                let layout = self.layout(ty);
                (layout.mem_size(), layout.mem_align())
            }
            _ if embed => {
                let structure = self.layout(ty).structure();
                (structure.size(), structure.align())
            }
            _ => word_mem(field_ty, self.target.word()),
        }
    }

    fn compute(&mut self, ty: &ReachableType) -> CompiledLayout {
        let word = self.target.word();
        let fields = ty
            .fields()
            .iter()
            .map(|f| self.field_mem(f.ty(), f.embed()))
            .collect::<Vec<_>>();

        let (structure, primitive) = match ty.kind() {
            TypeKind::Primitive => match ty.word() {
                Some(width) => (
                    StructLayout::build([(word, word), (width.bytes(), width.bytes())]),
                    Some(Unboxed::Word(width)),
                ),
                None => (StructLayout::build([(word, word)]), None),
            },
            TypeKind::Class => {
                let header = [(word, word)].into_iter();
                (StructLayout::build(header.chain(fields)), None)
            }
            TypeKind::Actor => {
                let header = [(word, word), (self.target.actor_pad, word)].into_iter();
                (StructLayout::build(header.chain(fields)), None)
            }
            TypeKind::Tuple => {
                let unboxed = StructLayout::build(fields);
                let boxed = StructLayout::build([(word, word), (unboxed.size(), unboxed.align())]);
                (boxed, Some(Unboxed::Tuple(unboxed)))
            }
            TypeKind::Struct => (StructLayout::build(fields), None),
            TypeKind::Interface => (StructLayout::build([]), None),
        };

        let (mem_size, mem_align) = match &primitive {
            Some(Unboxed::Tuple(unboxed)) if !ty.is_bare() => (unboxed.size(), unboxed.align()),
            _ => word_mem(ty, word),
        };

        CompiledLayout {
            id: ty.id(),
            structure,
            primitive,
            mem_size,
            mem_align,
        }
    }
}

/// Storage of a non-inline value of type `ty`: the raw word of a
/// payload-bearing primitive, one pointer otherwise.
fn word_mem(ty: &ReachableType, word: u32) -> (u32, u32) {
    match ty.word() {
        Some(width) if ty.kind() == TypeKind::Primitive && !ty.is_bare() => {
            (width.bytes(), width.bytes())
        }
        _ => (word, word),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, ReachTable};

    fn scalar(table: &mut ReachTable, name: &str, width: Width) -> TypeIdent {
        let id = table.declare(name, TypeKind::Primitive);
        table.get_mut(id).set_word(width);
        id
    }

    #[test]
    fn class_of_words() {
        let mut table = ReachTable::new();
        let i64 = scalar(&mut table, "I64", Width::W8);
        let point = table.declare("Point", TypeKind::Class);
        table
            .get_mut(point)
            .push_field(Field::new(i64))
            .push_field(Field::new(i64));

        let layouts = LayoutTable::compute(&table, Target::default());
        let layout = layouts.get(point);
        assert_eq!(layout.structure().offset_of(0), 0);
        assert_eq!(layout.structure().offset_of(1), 8);
        assert_eq!(layout.structure().offset_of(2), 16);
        assert_eq!(layout.structure().size(), 24);
        assert_eq!(layout.mem_size(), 8);

        let i64_layout = layouts.get(i64);
        assert_eq!(i64_layout.machine_word(), Some(Width::W8));
        assert_eq!(i64_layout.structure().size(), 16);
    }

    #[test]
    fn tuple_boxed_and_unboxed() {
        let mut table = ReachTable::new();
        let i32 = scalar(&mut table, "I32", Width::W4);
        let bool_ty = scalar(&mut table, "Bool", Width::W1);
        let pair = table.declare("(I32, Bool)", TypeKind::Tuple);
        table
            .get_mut(pair)
            .push_field(Field::new(i32))
            .push_field(Field::new(bool_ty));

        let layouts = LayoutTable::compute(&table, Target::default());
        let layout = layouts.get(pair);
        let unboxed = layout.unboxed_tuple().unwrap();
        assert_eq!(unboxed.offset_of(0), 0);
        assert_eq!(unboxed.offset_of(1), 4);
        assert_eq!(unboxed.size(), 8);
        assert_eq!(layout.structure().offset_of(1), 8);
        assert_eq!(layout.structure().size(), 16);
        assert_eq!(layout.mem_size(), 8);
        assert_eq!(layout.machine_word(), None);
    }

    #[test]
    fn padding_and_embedding() {
        let mut table = ReachTable::new();
        let u8_ty = scalar(&mut table, "U8", Width::W1);
        let u64_ty = scalar(&mut table, "U64", Width::W8);

        let inner = table.declare("Inner", TypeKind::Class);
        table.get_mut(inner).push_field(Field::new(u8_ty));

        let outer = table.declare("Outer", TypeKind::Class);
        table
            .get_mut(outer)
            .push_field(Field::new(u8_ty))
            .push_field(Field::embedded(inner))
            .push_field(Field::new(u64_ty));

        let layouts = LayoutTable::compute(&table, Target::default());
        assert_eq!(layouts.get(inner).structure().size(), 16);

        let outer = layouts.get(outer).structure();
        assert_eq!(outer.offset_of(1), 8);
        assert_eq!(outer.offset_of(2), 16);
        assert_eq!(outer.offset_of(3), 32);
        assert_eq!(outer.size(), 40);
    }

    #[test]
    fn actor_pad_and_narrow_target() {
        let mut table = ReachTable::new();
        let u32_ty = scalar(&mut table, "U32", Width::W4);
        let actor = table.declare("Main", TypeKind::Actor);
        table.get_mut(actor).push_field(Field::new(u32_ty));
        let holder = table.declare("Holder", TypeKind::Class);
        table.get_mut(holder).push_field(Field::new(actor));

        let target = Target {
            pointer_width: Width::W4,
            actor_pad: 60,
        };
        let layouts = LayoutTable::compute(&table, target);
        let actor = layouts.get(actor).structure();
        assert_eq!(actor.offset_of(1), 4);
        assert_eq!(actor.offset_of(2), 64);
        assert_eq!(actor.size(), 68);

        let holder = layouts.get(holder).structure();
        assert_eq!(holder.offset_of(1), 4);
        assert_eq!(holder.size(), 8);
    }

    #[test]
    fn self_reference_is_one_word() {
        let mut table = ReachTable::new();
        let i64 = scalar(&mut table, "I64", Width::W8);
        let node = table.declare("Node", TypeKind::Class);
        table
            .get_mut(node)
            .push_field(Field::new(node))
            .push_field(Field::new(i64));
        let pair = table.declare("(I64, Node)", TypeKind::Tuple);
        table
            .get_mut(pair)
            .push_field(Field::new(i64))
            .push_field(Field::new(node));
        table.get_mut(node).push_field(Field::new(pair));

        let layouts = LayoutTable::compute(&table, Target::default());
        let structure = layouts.get(node).structure();
        assert_eq!(structure.offset_of(1), 8);
        assert_eq!(structure.offset_of(2), 16);
        assert_eq!(structure.offset_of(3), 24);
        assert_eq!(structure.size(), 40);
        assert_eq!(layouts.get(pair).unboxed_tuple().unwrap().size(), 16);
    }

    #[test]
    fn embedded_struct_refers_back_to_owner() {
        let mut table = ReachTable::new();
        let u32_ty = scalar(&mut table, "U32", Width::W4);
        let node = table.declare("Node", TypeKind::Class);
        let native = table.declare("Native", TypeKind::Struct);
        table
            .get_mut(native)
            .push_field(Field::new(u32_ty))
            .push_field(Field::new(node));
        table.get_mut(node).push_field(Field::embedded(native));

        let layouts = LayoutTable::compute(&table, Target::default());
        let native = layouts.get(native).structure();
        assert_eq!(native.offset_of(0), 0);
        assert_eq!(native.offset_of(1), 8);
        assert_eq!(native.size(), 16);

        let node = layouts.get(node).structure();
        assert_eq!(node.offset_of(1), 8);
        assert_eq!(node.size(), 24);
    }

    #[test]
    #[should_panic(expected = "form a cycle")]
    fn embedded_cycle_panics() {
        let mut table = ReachTable::new();
        let a = table.declare("A", TypeKind::Struct);
        table.get_mut(a).push_field(Field::embedded(a));
        LayoutTable::compute(&table, Target::default());
    }

    #[cfg(feature = "ron")]
    #[test]
    fn target_from_ron_uses_defaults() {
        let target: Target = ron::from_str("(pointer_width: W4)").unwrap();
        assert_eq!(target.pointer_width, Width::W4);
        assert_eq!(target.actor_pad, 248);
    }
}
