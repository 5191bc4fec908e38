//! Object heap
//!
//! Objects live in one growable byte region and are addressed by offset.
//! Every object, whether free-standing or embedded in a container, starts
//! with an 8-byte header:
//!
//! ```text
//! +0  u32  type tag (TypeId + 1, 0 = no object)
//! +4  u32  flags    (bit 0 = constructed)
//! ```
//!
//! Arrays additionally store their length as a `u64` at `+8`, elements start
//! at `+16`. Out-of-line slots hold an 8-byte handle (`offset`, 0 = null).
//! Offset 0 is never handed out, so a zero handle is always null.

mod allocator;

pub use allocator::{align_up, checked_align_up, MemoryError, MemoryLayout, WORD_SIZE};

use crate::runtime::value::{PrimitiveKind, TypeId, Value};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Size of the object header
pub const HEADER_SIZE: usize = 8;
/// Size of an array header (object header + length word)
pub const ARRAY_HEADER_SIZE: usize = HEADER_SIZE + WORD_SIZE;

const FLAG_CONSTRUCTED: u32 = 1;

/// Heap configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapConfig {
    /// Bytes reserved up front
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    /// Hard limit; allocations beyond it fail with `OutOfMemory`
    #[serde(default = "default_max_capacity")]
    pub max_capacity: usize,
}

fn default_initial_capacity() -> usize {
    64 * 1024
}

fn default_max_capacity() -> usize {
    64 * 1024 * 1024
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
            max_capacity: default_max_capacity(),
        }
    }
}

/// Decoded object header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Type of the object, `None` if nothing was ever placed here
    pub ty: Option<TypeId>,
    pub flags: u32,
}

impl ObjectHeader {
    pub fn is_constructed(&self) -> bool {
        self.flags & FLAG_CONSTRUCTED != 0
    }
}

/// Offset-addressed object heap
#[derive(Debug)]
pub struct Heap {
    /// Memory buffer
    buffer: Vec<u8>,
    /// Allocation limit
    max_capacity: usize,
    /// Total allocations
    total_allocations: usize,
}

impl Heap {
    /// Create a new heap with the default configuration
    pub fn new() -> Self {
        Self::with_config(&HeapConfig::default())
    }

    /// Create a heap from configuration
    pub fn with_config(config: &HeapConfig) -> Self {
        let mut buffer = Vec::with_capacity(config.initial_capacity.max(WORD_SIZE));
        // Offset 0 is reserved so that a zero handle means null
        buffer.resize(WORD_SIZE, 0);
        Self {
            buffer,
            max_capacity: config.max_capacity,
            total_allocations: 0,
        }
    }

    /// Allocate zeroed memory, returning its offset
    pub fn alloc(
        &mut self,
        layout: MemoryLayout,
    ) -> Result<usize, MemoryError> {
        let out_of_memory = || MemoryError::OutOfMemory {
            requested: layout.size(),
            used: self.buffer.len(),
            limit: self.max_capacity,
        };
        let offset = align_up(self.buffer.len(), layout.align());
        let end = offset
            .checked_add(layout.size())
            .filter(|&end| end <= self.max_capacity)
            .ok_or_else(out_of_memory)?;
        self.buffer.resize(end, 0);
        self.total_allocations += 1;
        trace!(offset, size = layout.size(), "heap alloc");
        Ok(offset)
    }

    /// Borrow `len` bytes at `offset`
    pub fn bytes(
        &self,
        offset: usize,
        len: usize,
    ) -> Result<&[u8], MemoryError> {
        offset
            .checked_add(len)
            .and_then(|end| self.buffer.get(offset..end))
            .ok_or(MemoryError::OutOfBounds { offset, len })
    }

    fn bytes_mut(
        &mut self,
        offset: usize,
        len: usize,
    ) -> Result<&mut [u8], MemoryError> {
        offset
            .checked_add(len)
            .and_then(|end| self.buffer.get_mut(offset..end))
            .ok_or(MemoryError::OutOfBounds { offset, len })
    }

    /// Copy `data` into the heap at `offset`
    pub fn write_bytes(
        &mut self,
        offset: usize,
        data: &[u8],
    ) -> Result<(), MemoryError> {
        self.bytes_mut(offset, data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// Clear `len` bytes at `offset`
    pub fn zero(
        &mut self,
        offset: usize,
        len: usize,
    ) -> Result<(), MemoryError> {
        self.bytes_mut(offset, len)?.fill(0);
        Ok(())
    }

    pub fn read_u32(
        &self,
        offset: usize,
    ) -> Result<u32, MemoryError> {
        let mut word = [0u8; 4];
        word.copy_from_slice(self.bytes(offset, 4)?);
        Ok(u32::from_le_bytes(word))
    }

    pub fn write_u32(
        &mut self,
        offset: usize,
        value: u32,
    ) -> Result<(), MemoryError> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn read_u64(
        &self,
        offset: usize,
    ) -> Result<u64, MemoryError> {
        let mut word = [0u8; 8];
        word.copy_from_slice(self.bytes(offset, 8)?);
        Ok(u64::from_le_bytes(word))
    }

    pub fn write_u64(
        &mut self,
        offset: usize,
        value: u64,
    ) -> Result<(), MemoryError> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// Read a primitive of the given kind
    pub fn read_value(
        &self,
        offset: usize,
        kind: PrimitiveKind,
    ) -> Result<Value, MemoryError> {
        let bytes = self.bytes(offset, kind.size())?;
        Value::from_bytes(kind, bytes).ok_or(MemoryError::OutOfBounds {
            offset,
            len: kind.size(),
        })
    }

    /// Write a primitive value
    pub fn write_value(
        &mut self,
        offset: usize,
        value: Value,
    ) -> Result<(), MemoryError> {
        let bytes = value.to_bytes().ok_or(MemoryError::NotPrimitive)?;
        self.write_bytes(offset, &bytes)
    }

    /// Decode the object header at `offset`
    pub fn header(
        &self,
        offset: usize,
    ) -> Result<ObjectHeader, MemoryError> {
        Ok(ObjectHeader {
            ty: TypeId::from_header_tag(self.read_u32(offset)?),
            flags: self.read_u32(offset + 4)?,
        })
    }

    /// Write a fresh, not yet constructed header for an object of type `ty`
    pub fn init_header(
        &mut self,
        offset: usize,
        ty: TypeId,
    ) -> Result<(), MemoryError> {
        self.write_u32(offset, ty.header_tag())?;
        self.write_u32(offset + 4, 0)
    }

    /// Flag the object at `offset` as fully constructed
    pub fn mark_constructed(
        &mut self,
        offset: usize,
    ) -> Result<(), MemoryError> {
        let flags = self.read_u32(offset + 4)?;
        self.write_u32(offset + 4, flags | FLAG_CONSTRUCTED)
    }

    /// Length of the array whose header is at `offset`
    pub fn array_length(
        &self,
        offset: usize,
    ) -> Result<usize, MemoryError> {
        Ok(self.read_u64(offset + HEADER_SIZE)? as usize)
    }

    pub fn set_array_length(
        &mut self,
        offset: usize,
        length: usize,
    ) -> Result<(), MemoryError> {
        self.write_u64(offset + HEADER_SIZE, length as u64)
    }

    /// Follow an out-of-line handle; `None` when it is still null
    pub fn handle(
        &self,
        offset: usize,
    ) -> Result<Option<usize>, MemoryError> {
        let target = self.read_u64(offset)? as usize;
        Ok((target != 0).then_some(target))
    }

    pub fn set_handle(
        &mut self,
        offset: usize,
        target: usize,
    ) -> Result<(), MemoryError> {
        self.write_u64(offset, target as u64)
    }

    /// Get total capacity
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Get used size
    pub fn used(&self) -> usize {
        self.buffer.len()
    }

    /// Get the allocation limit
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Get total allocations
    pub fn total_allocations(&self) -> usize {
        self.total_allocations
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
