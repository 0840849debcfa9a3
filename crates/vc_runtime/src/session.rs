//! Serialise and deserialise sessions.
//!
//! A session owns the object-to-offset table of one call and implements the
//! two runtime entry points generated code calls into. Offsets are assigned
//! in registration order and objects are processed first in, first out, so
//! the root always lands at offset zero.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use vc_codegen::ir::{RuntimeFn, Symbol};
use vc_reach::hash::{self, HashMap};
use vc_reach::{TypeIdent, Width};

use crate::interp::{Host, execute};
use crate::memory::{BUFFER_BASE, Memory};
use crate::{Addr, Descriptor, Process, RuntimeError};

/// Offset written for a null reference.
#[inline]
pub(crate) const fn null_offset(word: Width) -> u64 {
    word.mask()
}

/// Bit marking an offset as the identity of a process-wide instance.
#[inline]
pub(crate) const fn high_bit(word: Width) -> u64 {
    1 << (word.bytes() * 8 - 1)
}

// -----------------------------------------------------------------------------
// Shared host operations

fn symbol(process: &Process, symbol: Symbol) -> Result<u64, RuntimeError> {
    process.descriptors().resolve(symbol)
}

fn desc_instance(process: &Process, type_id: u64) -> Result<u64, RuntimeError> {
    let desc = process.descriptors().by_raw(type_id)?;
    desc.instance()
        .ok_or_else(|| RuntimeError::NoInstance(desc.name().into()))
}

// -----------------------------------------------------------------------------
// Serialiser

struct Pending {
    object: Addr,
    id: TypeIdent,
    offset: u64,
}

pub(crate) struct Serialiser<'a> {
    process: &'a Process,
    memory: &'a mut Memory,
    word: Width,
    offsets: HashMap<Addr, u64>,
    queue: VecDeque<Pending>,
    size: u64,
}

impl<'a> Serialiser<'a> {
    pub(crate) fn new(process: &'a Process, memory: &'a mut Memory) -> Self {
        memory.reset_buffer();
        Self {
            process,
            memory,
            word: process.descriptors().word(),
            offsets: hash::new_map(),
            queue: VecDeque::new(),
            size: 0,
        }
    }

    /// Serialises the graph reachable from `root` and returns the buffer.
    pub(crate) fn run(mut self, root: Addr) -> Result<Vec<u8>, RuntimeError> {
        if root == 0 || self.process.descriptors().by_instance(root).is_some() {
            return Err(RuntimeError::InvalidRoot(root));
        }
        self.register(root)?;

        let process = self.process;
        while let Some(Pending { object, id, offset }) = self.queue.pop_front() {
            let func = match process.program().serialiser(id) {
                Some(func) => func,
                None => unreachable!("registered objects have a serialiser"),
            };
            execute(func, &[0, object, BUFFER_BASE, offset], &mut self)?;
        }

        log::debug!("serialised {} objects into {} bytes", self.offsets.len(), self.size);
        Ok(self.memory.buffer()[..self.size as usize].to_vec())
    }

    /// Returns the offset standing for `object` in the output buffer.
    fn register(&mut self, object: Addr) -> Result<u64, RuntimeError> {
        let process = self.process;
        let descriptors = process.descriptors();

        if object == 0 {
            return Ok(null_offset(self.word));
        }
        if let Some(desc) = descriptors.by_instance(object) {
            return Ok(desc.id().get() as u64 | high_bit(self.word));
        }
        if let Some(&offset) = self.offsets.get(&object) {
            return Ok(offset);
        }

        // Only heap objects that begin with a descriptor can be placed.
        // Structs carry none, so a reference to one is rejected here.
        let untagged = || RuntimeError::Untagged(object);
        let size = self.memory.allocation(object).ok_or_else(untagged)?;
        if size < self.word.bytes() {
            return Err(untagged());
        }
        let tag = self.memory.load(object, self.word)?;
        let desc = descriptors.by_addr(tag).map_err(|_| untagged())?;
        if desc.size() > size {
            return Err(untagged());
        }
        if process.program().serialiser(desc.id()).is_none() {
            return Err(RuntimeError::Unserialisable(desc.name().into()));
        }

        let extra = match desc.custom_serialise() {
            Some(name) => process.hook(name)?.space(self.memory, object)?,
            None => 0,
        };

        let offset = self.size.next_multiple_of(self.word.bytes() as u64);
        self.size = offset + desc.size() as u64 + extra as u64;
        self.memory.grow_buffer(self.size)?;

        log::trace!("`{}` at {object:#x} placed at offset {offset}", desc.name());
        self.offsets.insert(object, offset);
        self.queue.push_back(Pending {
            object,
            id: desc.id(),
            offset,
        });
        Ok(offset)
    }
}

impl Host for Serialiser<'_> {
    fn load(&self, addr: u64, width: Width) -> Result<u64, RuntimeError> {
        self.memory.load(addr, width)
    }

    fn store(&mut self, addr: u64, value: u64, width: Width) -> Result<(), RuntimeError> {
        self.memory.store(addr, value, width)
    }

    fn symbol(&self, sym: Symbol) -> Result<u64, RuntimeError> {
        symbol(self.process, sym)
    }

    fn desc_instance(&self, type_id: u64) -> Result<u64, RuntimeError> {
        desc_instance(self.process, type_id)
    }

    fn call_runtime(&mut self, func: RuntimeFn, args: &[u64]) -> Result<u64, RuntimeError> {
        match func {
            RuntimeFn::SerialiseOffset => self.register(args[1]),
            RuntimeFn::DeserialiseOffset => panic!("serialiser called {func}"),
        }
    }

    fn call_custom(&mut self, hook: &str, object: u64, dest: u64) -> Result<(), RuntimeError> {
        self.process.hook(hook)?.serialise(self.memory, object, dest)
    }
}

// -----------------------------------------------------------------------------
// Deserialiser

pub(crate) struct Deserialiser<'a> {
    process: &'a Process,
    memory: &'a mut Memory,
    word: Width,
    len: u64,
    objects: HashMap<u64, Addr>,
    queue: VecDeque<(Addr, &'a Descriptor, u64)>,
}

impl<'a> Deserialiser<'a> {
    pub(crate) fn new(
        process: &'a Process,
        memory: &'a mut Memory,
        bytes: &[u8],
    ) -> Result<Self, RuntimeError> {
        memory.set_buffer(bytes)?;
        Ok(Self {
            process,
            memory,
            word: process.descriptors().word(),
            len: bytes.len() as u64,
            objects: hash::new_map(),
            queue: VecDeque::new(),
        })
    }

    /// Rebuilds the graph whose root segment starts at offset zero.
    pub(crate) fn run(mut self) -> Result<Addr, RuntimeError> {
        let root = self.resolve(0, 0)?;

        let process = self.process;
        while let Some((object, desc, offset)) = self.queue.pop_front() {
            let func = match process.program().deserialiser(desc.id()) {
                Some(func) => func,
                None => unreachable!("materialised objects have a deserialiser"),
            };
            execute(func, &[0, object], &mut self)?;

            if let Some(name) = desc.custom_serialise() {
                let src = BUFFER_BASE + offset + desc.size() as u64;
                process.hook(name)?.deserialise(self.memory, object, src)?;
            }
        }

        log::debug!("deserialised {} objects from {} bytes", self.objects.len(), self.len);
        Ok(root)
    }

    /// Returns the live object for `offset`, materialising it on first use.
    ///
    /// The object is recorded before its own fields are repaired, so
    /// references back to it resolve to the same address.
    fn resolve(&mut self, expected: Addr, offset: u64) -> Result<Addr, RuntimeError> {
        let process = self.process;
        let descriptors = process.descriptors();

        if offset == null_offset(self.word) {
            return Ok(0);
        }
        if offset & high_bit(self.word) != 0 {
            return desc_instance(process, offset & !high_bit(self.word));
        }
        if let Some(&object) = self.objects.get(&offset) {
            return Ok(object);
        }

        let truncated = RuntimeError::Truncated {
            offset,
            len: self.len,
        };
        if offset + self.word.bytes() as u64 > self.len {
            return Err(truncated);
        }

        let raw = self.memory.load(BUFFER_BASE + offset, self.word)?;
        let desc = descriptors.by_raw(raw)?;

        if expected != 0 {
            let expect = descriptors.by_addr(expected)?;
            if expect.id() != desc.id() {
                return Err(RuntimeError::Mismatch {
                    offset,
                    expect: expect.name().into(),
                    actual: desc.name().into(),
                });
            }
        }

        if process.program().deserialiser(desc.id()).is_none() {
            return Err(RuntimeError::NotDeserialisable(desc.name().into()));
        }
        if offset + desc.size() as u64 > self.len {
            return Err(truncated);
        }

        let object = self.memory.alloc(desc.size(), desc.align())?;
        self.memory
            .copy(BUFFER_BASE + offset, object, desc.size() as u64)?;

        log::trace!("`{}` at offset {offset} restored to {object:#x}", desc.name());
        self.objects.insert(offset, object);
        self.queue.push_back((object, desc, offset));
        Ok(object)
    }
}

impl Host for Deserialiser<'_> {
    fn load(&self, addr: u64, width: Width) -> Result<u64, RuntimeError> {
        self.memory.load(addr, width)
    }

    fn store(&mut self, addr: u64, value: u64, width: Width) -> Result<(), RuntimeError> {
        self.memory.store(addr, value, width)
    }

    fn symbol(&self, sym: Symbol) -> Result<u64, RuntimeError> {
        symbol(self.process, sym)
    }

    fn desc_instance(&self, type_id: u64) -> Result<u64, RuntimeError> {
        desc_instance(self.process, type_id)
    }

    fn call_runtime(&mut self, func: RuntimeFn, args: &[u64]) -> Result<u64, RuntimeError> {
        match func {
            RuntimeFn::DeserialiseOffset => self.resolve(args[1], args[2]),
            RuntimeFn::SerialiseOffset => panic!("deserialiser called {func}"),
        }
    }

    fn call_custom(&mut self, hook: &str, _: u64, _: u64) -> Result<(), RuntimeError> {
        panic!("deserialiser called custom hook `{hook}`")
    }
}
