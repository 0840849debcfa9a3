use alloc::sync::Arc;
use alloc::vec::Vec;

use vc_reach::{TypeIdent, TypeKind, Width};

use crate::memory::Memory;
use crate::session::{Deserialiser, Serialiser};
use crate::{Addr, Process, RuntimeError};

// -----------------------------------------------------------------------------
// Runtime

/// One execution unit: private memory plus a handle on the shared [`Process`].
///
/// Runtimes never share mutable state, so several of them can serialise and
/// deserialise on different threads against one process.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use vc_codegen::Generator;
/// use vc_reach::{Field, ReachTable, Target, TypeKind, Width};
/// use vc_runtime::{Process, Runtime};
///
/// let mut table = ReachTable::new();
/// let i64 = table.declare("I64", TypeKind::Primitive);
/// table.get_mut(i64).set_word(Width::W8);
/// let point = table.declare("Point", TypeKind::Class);
/// table.get_mut(point).push_field(Field::new(i64)).push_field(Field::new(i64));
///
/// let program = Arc::new(Generator::new(table, Target::default()).generate_all());
/// let mut rt = Runtime::new(Arc::new(Process::new(program)));
///
/// let p = rt.alloc_object(point).unwrap();
/// rt.write_field(p, 0, 3).unwrap();
/// rt.write_field(p, 1, 4).unwrap();
///
/// let bytes = rt.serialise(p).unwrap();
/// let q = rt.deserialise(&bytes).unwrap();
/// assert_ne!(p, q);
/// assert_eq!(rt.read_field(q, 0).unwrap(), 3);
/// assert_eq!(rt.read_field(q, 1).unwrap(), 4);
/// ```
#[derive(Debug)]
pub struct Runtime {
    process: Arc<Process>,
    memory: Memory,
}

impl Runtime {
    pub fn new(process: Arc<Process>) -> Self {
        let memory = Memory::new(process.descriptors().statics());
        Self { process, memory }
    }

    #[inline]
    pub fn process(&self) -> &Process {
        &self.process
    }

    #[inline]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    #[inline]
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    #[inline]
    fn word(&self) -> Width {
        self.process.descriptors().word()
    }

    /// Serialises the graph reachable from `root`.
    ///
    /// The root is placed at offset zero. It must be a heap object of a type
    /// with a serialiser; null and process-wide instances are rejected.
    /// Every reachable object must start with its descriptor, so reaching a
    /// struct by reference fails with [`RuntimeError::Untagged`].
    pub fn serialise(&mut self, root: Addr) -> Result<Vec<u8>, RuntimeError> {
        Serialiser::new(&self.process, &mut self.memory).run(root)
    }

    /// Rebuilds a graph from `bytes` and returns its root.
    pub fn deserialise(&mut self, bytes: &[u8]) -> Result<Addr, RuntimeError> {
        Deserialiser::new(&self.process, &mut self.memory, bytes)?.run()
    }

    /// The process-wide instance of type `id`, if it has one.
    pub fn instance_of(&self, id: TypeIdent) -> Option<Addr> {
        self.process.descriptors().get(id)?.instance()
    }

    /// Allocates a zeroed boxed object of type `id`.
    ///
    /// Descriptor slots are filled in, including those of embedded fields,
    /// as a constructor would.
    pub fn alloc_object(&mut self, id: TypeIdent) -> Result<Addr, RuntimeError> {
        let desc = self.process.descriptors().by_raw(id.get() as u64)?;
        let object = self.memory.alloc(desc.size(), desc.align())?;
        self.init_descriptors(id, object, true)?;
        Ok(object)
    }

    fn init_descriptors(
        &mut self,
        id: TypeIdent,
        object: Addr,
        boxed: bool,
    ) -> Result<(), RuntimeError> {
        let process = self.process.clone();
        let program = process.program();
        let ty = &program.reach()[id];
        let layout = program.layouts().get(id);

        let (base, structure, extra) = match ty.kind() {
            TypeKind::Struct | TypeKind::Interface => (object, layout.structure(), 0),
            TypeKind::Tuple if !boxed => match layout.unboxed_tuple() {
                Some(unboxed) => (object, unboxed, 0),
                None => return Ok(()),
            },
            kind => {
                let desc = process.descriptors().by_raw(id.get() as u64)?;
                self.memory.store(object, desc.addr(), self.word())?;
                match (kind, layout.unboxed_tuple()) {
                    (TypeKind::Tuple, Some(unboxed)) => {
                        (object + layout.structure().offset_of(1) as u64, unboxed, 0)
                    }
                    (TypeKind::Actor, _) => (object, layout.structure(), 2),
                    (TypeKind::Primitive, _) => return Ok(()),
                    _ => (object, layout.structure(), 1),
                }
            }
        };

        for (index, field) in ty.fields().iter().enumerate() {
            let inner = &program.reach()[field.ty()];
            if field.embed() || inner.kind() == TypeKind::Tuple {
                let addr = base + structure.offset_of(index + extra) as u64;
                self.init_descriptors(field.ty(), addr, false)?;
            }
        }
        Ok(())
    }

    /// Address of field `index` of a value of type `id` stored at `object`.
    ///
    /// Boxed tuples are addressed through their element layout.
    pub fn field_addr(
        &self,
        object: Addr,
        id: TypeIdent,
        index: usize,
    ) -> Result<Addr, RuntimeError> {
        let program = self.process.program();
        let ty = &program.reach()[id];
        let layout = program.layouts().get(id);

        let no_field = || RuntimeError::NoField {
            ty: ty.name().into(),
            index,
        };
        if index >= ty.fields().len() {
            return Err(no_field());
        }

        let offset = match (ty.kind(), layout.unboxed_tuple()) {
            (TypeKind::Tuple, Some(unboxed)) => {
                layout.structure().offset_of(1) + unboxed.offset_of(index)
            }
            (TypeKind::Class | TypeKind::Primitive, _) => layout.structure().offset_of(index + 1),
            (TypeKind::Actor, _) => layout.structure().offset_of(index + 2),
            _ => layout.structure().offset_of(index),
        };
        Ok(object + offset as u64)
    }

    /// Address of element `index` of an unboxed tuple of type `id` at `tuple`.
    pub fn element_addr(
        &self,
        tuple: Addr,
        id: TypeIdent,
        index: usize,
    ) -> Result<Addr, RuntimeError> {
        let program = self.process.program();
        let ty = &program.reach()[id];
        match program.layouts().get(id).unboxed_tuple() {
            Some(unboxed) if index < unboxed.len() => Ok(tuple + unboxed.offset_of(index) as u64),
            _ => Err(RuntimeError::NoField {
                ty: ty.name().into(),
                index,
            }),
        }
    }

    /// Type of the boxed object at `object`, read from its descriptor slot.
    pub fn tag_of(&self, object: Addr) -> Result<TypeIdent, RuntimeError> {
        let tag = self.memory.load(object, self.word())?;
        Ok(self.process.descriptors().by_addr(tag)?.id())
    }

    // Address and width of a non-inline field of a boxed object.
    fn field_slot(&self, object: Addr, index: usize) -> Result<(Addr, Width), RuntimeError> {
        let id = self.tag_of(object)?;
        let addr = self.field_addr(object, id, index)?;

        let program = self.process.program();
        let owner = &program.reach()[id];
        let field = owner.fields()[index];
        let ty = &program.reach()[field.ty()];
        if field.embed() || ty.kind() == TypeKind::Tuple {
            return Err(RuntimeError::InlineField {
                ty: owner.name().into(),
                index,
            });
        }

        let width = program
            .layouts()
            .get(field.ty())
            .machine_word()
            .unwrap_or(self.word());
        Ok((addr, width))
    }

    /// Reads a machine-word or reference field of the boxed object at `object`.
    pub fn read_field(&self, object: Addr, index: usize) -> Result<u64, RuntimeError> {
        let (addr, width) = self.field_slot(object, index)?;
        self.memory.load(addr, width)
    }

    /// Writes a machine-word or reference field of the boxed object at `object`.
    pub fn write_field(
        &mut self,
        object: Addr,
        index: usize,
        value: u64,
    ) -> Result<(), RuntimeError> {
        let (addr, width) = self.field_slot(object, index)?;
        self.memory.store(addr, value, width)
    }
}
