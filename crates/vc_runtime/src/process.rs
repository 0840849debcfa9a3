use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;

use vc_codegen::Program;
use vc_reach::hash::{self, HashMap};

use crate::memory::Memory;
use crate::{Addr, DescriptorTable, RuntimeError};

// -----------------------------------------------------------------------------
// CustomHook

/// An external procedure appending a variable-length payload after the
/// fixed region of an object.
///
/// The serialiser generated for a type calls the hook named in its
/// `custom_serialise` attribute with the object and the first byte after
/// its fixed region. The paired [`deserialise`](CustomHook::deserialise)
/// half is optional and is called by the runtime, after the generated
/// deserialiser, with the same two addresses on the read side.
pub trait CustomHook: Send + Sync {
    /// Number of payload bytes `object` needs.
    fn space(&self, memory: &Memory, object: Addr) -> Result<u32, RuntimeError>;

    /// Writes the payload of `object` at `dest`.
    fn serialise(&self, memory: &mut Memory, object: Addr, dest: Addr)
    -> Result<(), RuntimeError>;

    /// Consumes the payload at `src` into the freshly restored `object`.
    fn deserialise(
        &self,
        memory: &mut Memory,
        object: Addr,
        src: Addr,
    ) -> Result<(), RuntimeError> {
        let _ = (memory, object, src);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Process

/// Everything the generated procedures share across runtimes.
///
/// The generated program, the descriptor table and the custom hooks are all
/// fixed once the process is built. Wrap it in an [`Arc`] and hand one
/// clone to every [`Runtime`](crate::Runtime).
pub struct Process {
    program: Arc<Program>,
    descriptors: DescriptorTable,
    hooks: HashMap<String, Box<dyn CustomHook>>,
}

impl Process {
    pub fn new(program: Arc<Program>) -> Self {
        let descriptors = DescriptorTable::new(&program);
        Self {
            program,
            descriptors,
            hooks: hash::new_map(),
        }
    }

    /// Registers the hook called by serialisers naming `name`.
    pub fn with_hook(mut self, name: impl Into<String>, hook: impl CustomHook + 'static) -> Self {
        self.hooks.insert(name.into(), Box::new(hook));
        self
    }

    #[inline]
    pub fn program(&self) -> &Program {
        &self.program
    }

    #[inline]
    pub fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    pub fn hook(&self, name: &str) -> Result<&dyn CustomHook, RuntimeError> {
        match self.hooks.get(name) {
            Some(hook) => Ok(hook.as_ref()),
            None => Err(RuntimeError::MissingHook(name.into())),
        }
    }
}

impl core::fmt::Debug for Process {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Process")
            .field("types", &self.descriptors.len())
            .field("hooks", &self.hooks.keys().collect::<alloc::vec::Vec<_>>())
            .finish()
    }
}
