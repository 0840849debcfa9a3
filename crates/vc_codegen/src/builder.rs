use alloc::string::String;
use alloc::vec::Vec;

use vc_reach::Width;

use crate::ir::{Arena, Block, BlockId, Function, Id, Inst, RuntimeFn, Symbol, Terminator, Value};

// -----------------------------------------------------------------------------
// FunctionBuilder

/// Incremental construction of a [`Function`].
///
/// The builder always has an insertion block. Instructions are appended to
/// its end; once the block is terminated, nothing more may be appended to it
/// until the builder is positioned elsewhere.
///
/// # Examples
///
/// ```
/// use vc_codegen::FunctionBuilder;
/// use vc_reach::Width;
///
/// let mut b = FunctionBuilder::new("copy_word", 2);
/// let (src, dst) = (b.param(0), b.param(1));
/// let value = b.load(src, Width::W8);
/// b.store(dst, value, Width::W8);
/// b.ret();
///
/// let func = b.finish();
/// assert_eq!(func.param_count(), 2);
/// assert_eq!(func.insts().count(), 4);
/// ```
pub struct FunctionBuilder {
    func: Function,
    current: BlockId,
}

impl FunctionBuilder {
    /// Creates a function with `params` parameters and an `entry` block
    /// holding one [`Inst::Param`] per parameter.
    pub fn new(name: impl Into<String>, params: u8) -> Self {
        let mut blocks = Arena::new();
        let entry = blocks.push(Block {
            name: "entry",
            insts: Vec::new(),
            terminator: None,
        });

        let mut builder = Self {
            func: Function {
                name: name.into(),
                params,
                blocks,
                order: alloc::vec![entry],
                value_count: 0,
            },
            current: entry,
        };

        for index in 0..params {
            let dst = builder.fresh();
            builder.push(Inst::Param { dst, index });
        }

        builder
    }

    /// The value holding parameter `index`.
    ///
    /// # Panics
    /// - `index` is not below the parameter count.
    #[inline]
    pub fn param(&self, index: u8) -> Value {
        assert!(
            index < self.func.params,
            "`{}` has no parameter {index}",
            self.func.name
        );
        Id::new(index as u32)
    }

    /// Appends a new empty block at the end of the layout order.
    pub fn append_block(&mut self, name: &'static str) -> BlockId {
        let id = self.func.blocks.push(Block {
            name,
            insts: Vec::new(),
            terminator: None,
        });
        self.func.order.push(id);
        id
    }

    #[inline]
    pub fn position_at_end(&mut self, block: BlockId) {
        self.current = block;
    }

    #[inline]
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Moves `block` so that it directly follows `after` in layout order.
    pub fn move_block_after(&mut self, block: BlockId, after: BlockId) {
        let order = &mut self.func.order;
        if let Some(pos) = order.iter().position(|&b| b == block) {
            order.remove(pos);
        }
        let pos = match order.iter().position(|&b| b == after) {
            Some(pos) => pos + 1,
            None => panic!("block {after:?} is not part of `{}`", self.func.name),
        };
        order.insert(pos, block);
    }

    fn fresh(&mut self) -> Value {
        let id = Id::new(self.func.value_count);
        self.func.value_count += 1;
        id
    }

    fn push(&mut self, inst: Inst) {
        let block = &mut self.func.blocks[self.current];
        if block.terminator.is_some() {
            panic!(
                "block `{}` of `{}` is already terminated",
                block.name, self.func.name
            );
        }
        block.insts.push(inst);
    }

    fn define(&mut self, make: impl FnOnce(Value) -> Inst) -> Value {
        let dst = self.fresh();
        self.push(make(dst));
        dst
    }

    // -------------------------------------------------------------------------
    // Instructions

    pub fn const_int(&mut self, value: u64) -> Value {
        self.define(|dst| Inst::Const { dst, value })
    }

    pub fn symbol(&mut self, symbol: Symbol) -> Value {
        self.define(|dst| Inst::Symbol { dst, symbol })
    }

    pub fn add(&mut self, lhs: Value, rhs: Value) -> Value {
        self.define(|dst| Inst::Add { dst, lhs, rhs })
    }

    /// `base + offset`. A zero offset yields `base` itself.
    pub fn byte_add(&mut self, base: Value, offset: u32) -> Value {
        if offset == 0 {
            return base;
        }
        self.define(|dst| Inst::ByteAdd { dst, base, offset })
    }

    pub fn load(&mut self, addr: Value, width: Width) -> Value {
        self.define(|dst| Inst::Load { dst, addr, width })
    }

    pub fn store(&mut self, addr: Value, value: Value, width: Width) {
        self.push(Inst::Store { addr, value, width });
    }

    pub fn icmp_eq(&mut self, lhs: Value, rhs: Value) -> Value {
        self.define(|dst| Inst::IcmpEq { dst, lhs, rhs })
    }

    /// Emits a phi with no incoming edges, see [`add_incoming`](Self::add_incoming).
    pub fn phi(&mut self) -> Value {
        self.define(|dst| Inst::Phi {
            dst,
            incoming: Vec::new(),
        })
    }

    /// Records that `phi` takes `value` when control arrives from `from`.
    ///
    /// # Panics
    /// - `phi` was not defined by [`phi`](Self::phi).
    pub fn add_incoming(&mut self, phi: Value, from: BlockId, value: Value) {
        for block in self.func.blocks.values_mut() {
            for inst in &mut block.insts {
                if let Inst::Phi { dst, incoming } = inst
                    && *dst == phi
                {
                    incoming.push((from, value));
                    return;
                }
            }
        }
        panic!("{phi:?} is not a phi of `{}`", self.func.name);
    }

    pub fn desc_instance(&mut self, type_id: Value) -> Value {
        self.define(|dst| Inst::DescInstance { dst, type_id })
    }

    /// # Panics
    /// - `args` does not match the arity of `func`.
    pub fn call_runtime(&mut self, func: RuntimeFn, args: &[Value]) -> Value {
        assert_eq!(args.len(), func.arity(), "wrong argument count for {func}");
        let args = args.to_vec();
        self.define(|dst| Inst::CallRuntime { dst, func, args })
    }

    pub fn call_custom(&mut self, hook: &str, object: Value, dest: Value) {
        self.push(Inst::CallCustom {
            hook: hook.into(),
            object,
            dest,
        });
    }

    // -------------------------------------------------------------------------
    // Terminators

    fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.func.blocks[self.current];
        if block.terminator.is_some() {
            panic!(
                "block `{}` of `{}` is already terminated",
                block.name, self.func.name
            );
        }
        block.terminator = Some(terminator);
    }

    pub fn jump(&mut self, to: BlockId) {
        self.terminate(Terminator::Jump(to));
    }

    pub fn branch(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::Branch {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self) {
        self.terminate(Terminator::Return);
    }

    /// Finishes construction.
    ///
    /// # Panics
    /// - Some block has no terminator.
    pub fn finish(self) -> Function {
        for (_, block) in self.func.blocks() {
            if block.terminator.is_none() {
                panic!(
                    "block `{}` of `{}` has no terminator",
                    block.name, self.func.name
                );
            }
        }
        self.func
    }
}
