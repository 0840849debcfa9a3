use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use vc_codegen::Program;
use vc_codegen::ir::Symbol;
use vc_reach::hash::{self, HashMap};
use vc_reach::{TypeIdent, TypeKind, Width};

use crate::memory::{DESC_BASE, FUNC_BASE, STATIC_BASE};
use crate::{Addr, RuntimeError};

// -----------------------------------------------------------------------------
// Descriptor

/// Runtime view of one type.
#[derive(Debug, Clone)]
pub struct Descriptor {
    id: TypeIdent,
    name: String,
    kind: TypeKind,
    addr: Addr,
    size: u32,
    align: u32,
    instance: Option<Addr>,
    function: Option<Addr>,
    custom: Option<String>,
}

impl Descriptor {
    #[inline]
    pub const fn id(&self) -> TypeIdent {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub const fn kind(&self) -> TypeKind {
        self.kind
    }

    /// The address stored in the descriptor slot of boxed values.
    #[inline]
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    /// Size of the boxed fixed region.
    #[inline]
    pub const fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub const fn align(&self) -> u32 {
        self.align
    }

    /// The process-wide instance: the singleton of a marker primitive or
    /// the function value of a bare type.
    #[inline]
    pub const fn instance(&self) -> Option<Addr> {
        self.instance
    }

    /// The function value of a bare type.
    #[inline]
    pub const fn function(&self) -> Option<Addr> {
        self.function
    }

    #[inline]
    pub fn custom_serialise(&self) -> Option<&str> {
        self.custom.as_deref()
    }
}

// -----------------------------------------------------------------------------
// DescriptorTable

/// The global identity to descriptor table.
///
/// Built once from a [`Program`] and never modified afterwards, so it can
/// be shared by every runtime of the process without synchronisation.
#[derive(Debug)]
pub struct DescriptorTable {
    word: Width,
    descs: Vec<Descriptor>,
    instances: HashMap<Addr, TypeIdent>,
    statics: Arc<[u8]>,
}

impl DescriptorTable {
    pub fn new(program: &Program) -> Self {
        let word = program.target().pointer_width;
        let bytes = word.bytes() as u64;
        let mut statics = Vec::<u8>::new();
        let mut instances = hash::new_map();

        let descs = program
            .reach()
            .iter()
            .map(|ty| {
                let id = ty.id();
                let layout = program.layouts().get(id);
                let addr = DESC_BASE + id.get() as u64 * bytes;

                let function = ty.is_bare().then(|| FUNC_BASE + id.get() as u64 * bytes);
                let instance = if ty.is_bare() {
                    function
                } else if ty.kind() == TypeKind::Primitive && layout.primitive().is_none() {
                    let structure = layout.structure();
                    let start = statics.len().next_multiple_of(structure.align() as usize);
                    statics.resize(start + structure.size() as usize, 0);
                    let raw = addr.to_le_bytes();
                    statics[start..start + bytes as usize].copy_from_slice(&raw[..bytes as usize]);
                    Some(STATIC_BASE + start as u64)
                } else {
                    None
                };

                if let Some(instance) = instance {
                    instances.insert(instance, id);
                }

                Descriptor {
                    id,
                    name: ty.name().into(),
                    kind: ty.kind(),
                    addr,
                    size: layout.structure().size(),
                    align: layout.structure().align(),
                    instance,
                    function,
                    custom: ty.custom_serialise().map(Into::into),
                }
            })
            .collect::<Vec<_>>();

        log::debug!(
            "descriptor table with {} types, {} static bytes",
            descs.len(),
            statics.len()
        );

        Self {
            word,
            descs,
            instances,
            statics: statics.into(),
        }
    }

    /// Pointer width of the target.
    #[inline]
    pub const fn word(&self) -> Width {
        self.word
    }

    /// The read-only image holding singleton instances.
    #[inline]
    pub fn statics(&self) -> Arc<[u8]> {
        self.statics.clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descs.len()
    }

    #[inline]
    pub fn get(&self, id: TypeIdent) -> Option<&Descriptor> {
        self.descs.get(id.index())
    }

    /// Looks up an identity read from memory or from the wire.
    pub fn by_raw(&self, id: u64) -> Result<&Descriptor, RuntimeError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.descs.get(index))
            .ok_or(RuntimeError::UnknownType(id))
    }

    /// Reverse lookup from a descriptor address.
    ///
    /// Kinds that are never boxed with a descriptor slot do not match.
    pub fn by_addr(&self, addr: Addr) -> Result<&Descriptor, RuntimeError> {
        let bytes = self.word.bytes() as u64;
        addr.checked_sub(DESC_BASE)
            .filter(|delta| delta % bytes == 0)
            .and_then(|delta| self.descs.get((delta / bytes) as usize))
            .filter(|desc| desc.kind.has_descriptor())
            .ok_or(RuntimeError::UnknownDescriptor(addr))
    }

    /// The type whose process-wide instance lives at `addr`, if any.
    #[inline]
    pub fn by_instance(&self, addr: Addr) -> Option<&Descriptor> {
        self.instances.get(&addr).map(|id| &self.descs[id.index()])
    }

    /// Resolves a link-time constant of generated code.
    pub fn resolve(&self, symbol: Symbol) -> Result<Addr, RuntimeError> {
        let (Symbol::Descriptor(id) | Symbol::Instance(id) | Symbol::BareMethod(id)) = symbol;
        let desc = self.by_raw(id.get() as u64)?;
        let value = match symbol {
            Symbol::Descriptor(_) => Some(desc.addr),
            Symbol::Instance(_) => desc.instance,
            Symbol::BareMethod(_) => desc.function,
        };
        value.ok_or_else(|| RuntimeError::NoInstance(desc.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vc_codegen::Generator;
    use vc_reach::{ReachTable, Target};

    fn program(target: Target) -> (Program, [TypeIdent; 4]) {
        let mut table = ReachTable::new();
        let none = table.declare("None", TypeKind::Primitive);
        let u8_ty = table.declare("U8", TypeKind::Primitive);
        table.get_mut(u8_ty).set_word(Width::W1);
        let lambda = table.declare("Lambda", TypeKind::Primitive);
        table.get_mut(lambda).set_bare();
        let class = table.declare("Foo", TypeKind::Class);
        let program = Generator::new(table, target).generate_all();
        (program, [none, u8_ty, lambda, class])
    }

    #[test]
    fn instances_and_symbols() {
        let (program, [none, u8_ty, lambda, class]) = program(Target::default());
        let table = DescriptorTable::new(&program);

        let none_desc = table.get(none).unwrap();
        let singleton = none_desc.instance().unwrap();
        assert_eq!(singleton, STATIC_BASE);
        assert_eq!(table.by_instance(singleton).unwrap().id(), none);
        // The singleton starts with its descriptor.
        assert_eq!(&table.statics()[..8], &none_desc.addr().to_le_bytes());

        assert!(table.get(u8_ty).unwrap().instance().is_none());
        assert!(table.get(class).unwrap().instance().is_none());

        let func = table.resolve(Symbol::BareMethod(lambda)).unwrap();
        assert_eq!(table.resolve(Symbol::Instance(lambda)).unwrap(), func);
        assert_eq!(table.by_instance(func).unwrap().id(), lambda);
        assert_eq!(table.get(lambda).unwrap().function(), Some(func));
        assert_eq!(none_desc.function(), None);

        assert_eq!(
            table.resolve(Symbol::Instance(class)),
            Err(RuntimeError::NoInstance("Foo".into()))
        );
    }

    #[test]
    fn reverse_lookup() {
        let (program, [_, _, _, class]) = program(Target {
            pointer_width: Width::W4,
            ..Target::default()
        });
        let table = DescriptorTable::new(&program);
        let addr = table.resolve(Symbol::Descriptor(class)).unwrap();
        assert_eq!(addr, DESC_BASE + 12);
        assert_eq!(table.by_addr(addr).unwrap().name(), "Foo");
        assert!(table.by_addr(addr + 1).is_err());
        assert!(table.by_addr(DESC_BASE + 400).is_err());
        assert_eq!(table.by_raw(9).unwrap_err(), RuntimeError::UnknownType(9));
    }
}
