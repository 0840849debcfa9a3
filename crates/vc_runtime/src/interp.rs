use alloc::vec;

use vc_codegen::ir::{BlockId, Function, Inst, RuntimeFn, Symbol, Terminator};
use vc_reach::Width;

use crate::RuntimeError;

/// The environment a generated procedure runs against.
pub(crate) trait Host {
    fn load(&self, addr: u64, width: Width) -> Result<u64, RuntimeError>;

    fn store(&mut self, addr: u64, value: u64, width: Width) -> Result<(), RuntimeError>;

    fn symbol(&self, symbol: Symbol) -> Result<u64, RuntimeError>;

    fn desc_instance(&self, type_id: u64) -> Result<u64, RuntimeError>;

    fn call_runtime(&mut self, func: RuntimeFn, args: &[u64]) -> Result<u64, RuntimeError>;

    fn call_custom(&mut self, hook: &str, object: u64, dest: u64) -> Result<(), RuntimeError>;
}

/// Runs `func` to completion.
///
/// # Panics
/// - `args` does not match the parameter count.
/// - A phi has no incoming value for the block control came from.
pub(crate) fn execute<H: Host>(
    func: &Function,
    args: &[u64],
    host: &mut H,
) -> Result<(), RuntimeError> {
    assert_eq!(
        args.len(),
        func.param_count(),
        "wrong argument count for `{}`",
        func.name()
    );

    let mut values = vec![0u64; func.value_count()];
    let mut block = func.entry();
    let mut prev: Option<BlockId> = None;

    loop {
        let current = func.block(block);

        for inst in current.insts() {
            match inst {
                Inst::Param { dst, index } => values[dst.index()] = args[*index as usize],
                Inst::Const { dst, value } => values[dst.index()] = *value,
                Inst::Symbol { dst, symbol } => values[dst.index()] = host.symbol(*symbol)?,
                Inst::Add { dst, lhs, rhs } => {
                    values[dst.index()] = values[lhs.index()].wrapping_add(values[rhs.index()]);
                }
                Inst::ByteAdd { dst, base, offset } => {
                    values[dst.index()] = values[base.index()].wrapping_add(*offset as u64);
                }
                Inst::Load { dst, addr, width } => {
                    values[dst.index()] = host.load(values[addr.index()], *width)?;
                }
                Inst::Store { addr, value, width } => {
                    host.store(values[addr.index()], values[value.index()], *width)?;
                }
                Inst::IcmpEq { dst, lhs, rhs } => {
                    values[dst.index()] = (values[lhs.index()] == values[rhs.index()]) as u64;
                }
                Inst::Phi { dst, incoming } => {
                    let Some(&(_, value)) = incoming.iter().find(|(from, _)| Some(*from) == prev)
                    else {
                        panic!(
                            "phi in `{}` of `{}` has no value for {prev:?}",
                            current.name(),
                            func.name()
                        );
                    };
                    values[dst.index()] = values[value.index()];
                }
                Inst::DescInstance { dst, type_id } => {
                    values[dst.index()] = host.desc_instance(values[type_id.index()])?;
                }
                Inst::CallRuntime { dst, func, args } => {
                    let mut raw = [0u64; 3];
                    for (slot, arg) in raw.iter_mut().zip(args) {
                        *slot = values[arg.index()];
                    }
                    values[dst.index()] = host.call_runtime(*func, &raw[..args.len()])?;
                }
                Inst::CallCustom { hook, object, dest } => {
                    host.call_custom(hook, values[object.index()], values[dest.index()])?;
                }
            }
        }

        let next = match current.terminator() {
            Some(Terminator::Jump(to)) => to,
            Some(Terminator::Branch {
                cond,
                then_block,
                else_block,
            }) => {
                if values[cond.index()] != 0 {
                    then_block
                } else {
                    else_block
                }
            }
            Some(Terminator::Return) => return Ok(()),
            None => panic!("block `{}` of `{}` is unterminated", current.name(), func.name()),
        };

        prev = Some(block);
        block = next;
    }
}
