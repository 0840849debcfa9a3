use alloc::sync::Arc;
use alloc::vec::Vec;

use vc_reach::Width;
use vc_reach::hash::{self, HashMap};

use crate::{Addr, RuntimeError};

// -----------------------------------------------------------------------------
// Address map

/// Start of the heap. Nothing lives below it, so `0` is never a valid object.
pub const HEAP_BASE: Addr = 0x0001_0000;
/// Start of the serialisation buffer.
pub const BUFFER_BASE: Addr = 0x4000_0000;
/// Start of the read-only image holding singleton instances.
pub const STATIC_BASE: Addr = 0x6000_0000;
/// Start of the descriptor address range. Descriptors are never dereferenced.
pub const DESC_BASE: Addr = 0x7000_0000;
/// Start of the bare function value range. Function values are never dereferenced.
pub const FUNC_BASE: Addr = 0x7800_0000;

// All regions stay below 4 GiB so addresses fit 32-bit targets.
const HEAP_LIMIT: u64 = BUFFER_BASE - HEAP_BASE;
const BUFFER_LIMIT: u64 = STATIC_BASE - BUFFER_BASE;

// -----------------------------------------------------------------------------
// Memory

/// Byte-addressed little-endian memory of one runtime.
///
/// Three regions are mapped: a growable heap with bump allocation, the
/// buffer a serialise or deserialise session works on, and a shared
/// read-only image of static objects. The heap remembers the size of every
/// allocation by its start address.
#[derive(Debug, Clone)]
pub struct Memory {
    statics: Arc<[u8]>,
    heap: Vec<u8>,
    allocations: HashMap<Addr, u32>,
    buffer: Vec<u8>,
}

impl Memory {
    pub fn new(statics: Arc<[u8]>) -> Self {
        Self {
            statics,
            heap: Vec::new(),
            allocations: hash::new_map(),
            buffer: Vec::new(),
        }
    }

    /// Allocates `size` zeroed bytes aligned to `align`.
    ///
    /// Every allocation gets a distinct address, even for `size == 0`.
    pub fn alloc(&mut self, size: u32, align: u32) -> Result<Addr, RuntimeError> {
        let align = align.max(1) as u64;
        let start = (HEAP_BASE + self.heap.len() as u64).next_multiple_of(align) - HEAP_BASE;
        let end = start + size.max(1) as u64;
        if end > HEAP_LIMIT {
            return Err(RuntimeError::OutOfMemory);
        }
        self.heap.resize(end as usize, 0);
        self.allocations.insert(HEAP_BASE + start, size);
        Ok(HEAP_BASE + start)
    }

    /// Requested size of the heap allocation starting at `addr`.
    #[inline]
    pub fn allocation(&self, addr: Addr) -> Option<u32> {
        self.allocations.get(&addr).copied()
    }

    /// The current contents of the buffer region.
    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub(crate) fn reset_buffer(&mut self) {
        self.buffer.clear();
    }

    pub(crate) fn grow_buffer(&mut self, len: u64) -> Result<(), RuntimeError> {
        if len > BUFFER_LIMIT {
            return Err(RuntimeError::OutOfMemory);
        }
        if len as usize > self.buffer.len() {
            self.buffer.resize(len as usize, 0);
        }
        Ok(())
    }

    pub(crate) fn set_buffer(&mut self, bytes: &[u8]) -> Result<(), RuntimeError> {
        if bytes.len() as u64 > BUFFER_LIMIT {
            return Err(RuntimeError::OutOfMemory);
        }
        self.buffer.clear();
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn range(len: usize, base: Addr, addr: Addr, size: u64) -> Option<core::ops::Range<usize>> {
        let start = addr.checked_sub(base)?;
        let end = start.checked_add(size)?;
        (end <= len as u64).then_some(start as usize..end as usize)
    }

    /// Reads `len` bytes at `addr`.
    pub fn read(&self, addr: Addr, len: u64) -> Result<&[u8], RuntimeError> {
        let out_of_bounds = RuntimeError::OutOfBounds { addr, len };
        let (bytes, base) = match addr {
            ..HEAP_BASE => return Err(out_of_bounds),
            ..BUFFER_BASE => (self.heap.as_slice(), HEAP_BASE),
            ..STATIC_BASE => (self.buffer.as_slice(), BUFFER_BASE),
            _ => (&self.statics[..], STATIC_BASE),
        };
        match Self::range(bytes.len(), base, addr, len) {
            Some(range) => Ok(&bytes[range]),
            None => Err(out_of_bounds),
        }
    }

    /// Writes `data` at `addr`. The static image cannot be written.
    pub fn write(&mut self, addr: Addr, data: &[u8]) -> Result<(), RuntimeError> {
        let len = data.len() as u64;
        let out_of_bounds = RuntimeError::OutOfBounds { addr, len };
        let (bytes, base) = match addr {
            ..HEAP_BASE => return Err(out_of_bounds),
            ..BUFFER_BASE => (&mut self.heap, HEAP_BASE),
            ..STATIC_BASE => (&mut self.buffer, BUFFER_BASE),
            _ => return Err(RuntimeError::ReadOnly(addr)),
        };
        match Self::range(bytes.len(), base, addr, len) {
            Some(range) => {
                bytes[range].copy_from_slice(data);
                Ok(())
            }
            None => Err(out_of_bounds),
        }
    }

    /// Zero-extending load.
    pub fn load(&self, addr: Addr, width: Width) -> Result<u64, RuntimeError> {
        let bytes = self.read(addr, width.bytes() as u64)?;
        let mut raw = [0u8; 8];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Stores the low `width` bytes of `value`.
    pub fn store(&mut self, addr: Addr, value: u64, width: Width) -> Result<(), RuntimeError> {
        let raw = value.to_le_bytes();
        self.write(addr, &raw[..width.bytes() as usize])
    }

    /// Copies `len` bytes from `src` to `dst`.
    pub fn copy(&mut self, src: Addr, dst: Addr, len: u64) -> Result<(), RuntimeError> {
        let data = self.read(src, len)?.to_vec();
        self.write(dst, &data)
    }
}
