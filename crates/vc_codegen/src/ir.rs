//! Block-based SSA form for generated serialise and deserialise procedures.
//!
//! A [`Function`] is a list of basic blocks, each ending in a [`Terminator`].
//! Values are virtual registers assigned exactly once. Link-time constants
//! (descriptor addresses, singleton instances, bare function values) stay
//! symbolic until a host resolves them.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};

use vc_reach::{TypeIdent, Width};

// -----------------------------------------------------------------------------
// Ids

/// Index of a `T` inside one [`Function`].
///
/// Only the index takes part in comparisons, so `T` needs no bounds.
pub struct Id<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub(crate) const fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Id<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Id<T> {}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Append-only storage addressed by [`Id`].
pub(crate) struct Arena<T>(Vec<T>);

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self(Vec::new())
    }

    pub(crate) fn push(&mut self, item: T) -> Id<T> {
        self.0.push(item);
        Id::new(self.0.len() as u32 - 1)
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.0.iter_mut()
    }
}

impl<T> Index<Id<T>> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, id: Id<T>) -> &T {
        &self.0[id.index()]
    }
}

impl<T> IndexMut<Id<T>> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.0[id.index()]
    }
}

// -----------------------------------------------------------------------------
// Type aliases

/// Marker type for virtual register IDs.
pub struct ValueMarker;
/// A virtual register holding an address or an integer.
pub type Value = Id<ValueMarker>;

pub type BlockId = Id<Block>;

// -----------------------------------------------------------------------------
// Operands

/// A constant whose address is only known once the program is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// Address of a type's static descriptor.
    Descriptor(TypeIdent),
    /// Address of a type's singleton instance (its function value if bare).
    Instance(TypeIdent),
    /// The function value of a bare primitive.
    BareMethod(TypeIdent),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Descriptor(id) => write!(f, "@desc.{id}"),
            Symbol::Instance(id) => write!(f, "@inst.{id}"),
            Symbol::BareMethod(id) => write!(f, "@bare.{id}"),
        }
    }
}

/// Runtime entry points the generated code calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFn {
    /// `(ctx, object) -> offset`, registering `object` for output.
    SerialiseOffset,
    /// `(ctx, descriptor or 0, offset) -> object`, materialising on demand.
    DeserialiseOffset,
}

impl RuntimeFn {
    /// Number of arguments the entry point takes.
    #[inline]
    pub const fn arity(self) -> usize {
        match self {
            RuntimeFn::SerialiseOffset => 2,
            RuntimeFn::DeserialiseOffset => 3,
        }
    }
}

impl fmt::Display for RuntimeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeFn::SerialiseOffset => f.pad("serialise_offset"),
            RuntimeFn::DeserialiseOffset => f.pad("deserialise_offset"),
        }
    }
}

// -----------------------------------------------------------------------------
// Instructions

/// One non-terminating instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
    /// Function parameter `index`.
    Param { dst: Value, index: u8 },
    /// Integer constant.
    Const { dst: Value, value: u64 },
    /// Link-time constant.
    Symbol { dst: Value, symbol: Symbol },
    /// `lhs + rhs`.
    Add { dst: Value, lhs: Value, rhs: Value },
    /// `base + offset` with a static byte offset.
    ByteAdd { dst: Value, base: Value, offset: u32 },
    /// Zero-extending load of `width` bytes.
    Load { dst: Value, addr: Value, width: Width },
    /// Store of the low `width` bytes of `value`.
    Store { addr: Value, value: Value, width: Width },
    /// `1` if equal, `0` otherwise.
    IcmpEq { dst: Value, lhs: Value, rhs: Value },
    /// Selects the value flowing in from the predecessor block.
    Phi {
        dst: Value,
        incoming: Vec<(BlockId, Value)>,
    },
    /// Instance of the type whose identity is `type_id`, via the global table.
    DescInstance { dst: Value, type_id: Value },
    /// Call into the runtime.
    CallRuntime {
        dst: Value,
        func: RuntimeFn,
        args: Vec<Value>,
    },
    /// Call an external custom serialise hook with `(object, dest)`.
    CallCustom {
        hook: String,
        object: Value,
        dest: Value,
    },
}

impl Inst {
    /// The value defined by this instruction, if any.
    pub fn dst(&self) -> Option<Value> {
        match self {
            Inst::Param { dst, .. }
            | Inst::Const { dst, .. }
            | Inst::Symbol { dst, .. }
            | Inst::Add { dst, .. }
            | Inst::ByteAdd { dst, .. }
            | Inst::Load { dst, .. }
            | Inst::IcmpEq { dst, .. }
            | Inst::Phi { dst, .. }
            | Inst::DescInstance { dst, .. }
            | Inst::CallRuntime { dst, .. } => Some(*dst),
            Inst::Store { .. } | Inst::CallCustom { .. } => None,
        }
    }
}

/// How control leaves a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Jump(BlockId),
    Branch {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return,
}

/// A basic block.
#[derive(Debug, Clone)]
pub struct Block {
    pub(crate) name: &'static str,
    pub(crate) insts: Vec<Inst>,
    pub(crate) terminator: Option<Terminator>,
}

impl Block {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    /// The terminator; every block of a finished [`Function`] has one.
    #[inline]
    pub fn terminator(&self) -> Option<Terminator> {
        self.terminator
    }
}

// -----------------------------------------------------------------------------
// Function

/// A generated procedure.
pub struct Function {
    pub(crate) name: String,
    pub(crate) params: u8,
    pub(crate) blocks: Arena<Block>,
    pub(crate) order: Vec<BlockId>,
    pub(crate) value_count: u32,
}

impl Function {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn param_count(&self) -> usize {
        self.params as usize
    }

    /// Number of virtual registers used by the function.
    #[inline]
    pub fn value_count(&self) -> usize {
        self.value_count as usize
    }

    /// The entry block.
    #[inline]
    pub fn entry(&self) -> BlockId {
        self.order[0]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    /// Blocks in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.order.iter().map(|&id| (id, &self.blocks[id]))
    }

    /// All instructions in layout order.
    pub fn insts(&self) -> impl Iterator<Item = &Inst> {
        self.blocks().flat_map(|(_, block)| block.insts.iter())
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("blocks", &self.order)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// Display

struct V(Value);

impl fmt::Display for V {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0.index())
    }
}

struct B<'a>(&'a Function, BlockId);

impl fmt::Display for B<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.blocks[self.1].name, self.1.index())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn {}({}) {{", self.name, self.params)?;

        for (id, block) in self.blocks() {
            writeln!(f, "{}:", B(self, id))?;

            for inst in &block.insts {
                f.write_str("  ")?;
                match inst {
                    Inst::Param { dst, index } => write!(f, "{} = param {index}", V(*dst))?,
                    Inst::Const { dst, value } => write!(f, "{} = const {value}", V(*dst))?,
                    Inst::Symbol { dst, symbol } => write!(f, "{} = {symbol}", V(*dst))?,
                    Inst::Add { dst, lhs, rhs } => {
                        write!(f, "{} = add {}, {}", V(*dst), V(*lhs), V(*rhs))?;
                    }
                    Inst::ByteAdd { dst, base, offset } => {
                        write!(f, "{} = add {}, {offset}", V(*dst), V(*base))?;
                    }
                    Inst::Load { dst, addr, width } => {
                        write!(f, "{} = load.{width} {}", V(*dst), V(*addr))?;
                    }
                    Inst::Store { addr, value, width } => {
                        write!(f, "store.{width} {}, {}", V(*addr), V(*value))?;
                    }
                    Inst::IcmpEq { dst, lhs, rhs } => {
                        write!(f, "{} = icmp eq {}, {}", V(*dst), V(*lhs), V(*rhs))?;
                    }
                    Inst::Phi { dst, incoming } => {
                        write!(f, "{} = phi", V(*dst))?;
                        for (i, (from, value)) in incoming.iter().enumerate() {
                            let sep = if i == 0 { " " } else { ", " };
                            write!(f, "{sep}[{}, {}]", B(self, *from), V(*value))?;
                        }
                    }
                    Inst::DescInstance { dst, type_id } => {
                        write!(f, "{} = desc_instance {}", V(*dst), V(*type_id))?;
                    }
                    Inst::CallRuntime { dst, func, args } => {
                        write!(f, "{} = call {func}(", V(*dst))?;
                        for (i, arg) in args.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{}", V(*arg))?;
                        }
                        f.write_str(")")?;
                    }
                    Inst::CallCustom { hook, object, dest } => {
                        write!(f, "call @{hook}({}, {})", V(*object), V(*dest))?;
                    }
                }
                f.write_str("\n")?;
            }

            match block.terminator {
                Some(Terminator::Jump(to)) => writeln!(f, "  br {}", B(self, to))?,
                Some(Terminator::Branch {
                    cond,
                    then_block,
                    else_block,
                }) => writeln!(
                    f,
                    "  br {}, {}, {}",
                    V(cond),
                    B(self, then_block),
                    B(self, else_block)
                )?,
                Some(Terminator::Return) => writeln!(f, "  ret")?,
                None => writeln!(f, "  <unterminated>")?,
            }
        }

        writeln!(f, "}}")
    }
}
