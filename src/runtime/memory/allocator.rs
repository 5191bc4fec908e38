//! Allocation primitives for the object heap
//!
//! `MemoryLayout` describes the size/alignment of an allocation request and
//! `MemoryError` reports heap failures. Allocation itself is offset based: the
//! heap hands out byte offsets, never raw pointers, so handles stay valid when
//! the backing buffer grows.

use thiserror::Error;

/// Heap failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Not enough memory to satisfy the allocation
    #[error("out of memory: requested {requested} bytes with {used} of {limit} bytes in use")]
    OutOfMemory {
        requested: usize,
        used: usize,
        limit: usize,
    },
    /// Access outside the allocated part of the heap
    #[error("access of {len} bytes at offset {offset} is out of bounds")]
    OutOfBounds { offset: usize, len: usize },
    /// Tried to store a reference value in object memory
    #[error("reference values cannot be stored in object memory")]
    NotPrimitive,
    /// The requested size does not fit in the address space
    #[error("allocation of {count} x {unit} bytes overflows the address space")]
    SizeOverflow { count: usize, unit: usize },
    /// Alignment is zero or not a power of two
    #[error("invalid alignment {align}")]
    BadAlignment { align: usize },
}

/// Memory layout helper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    size: usize,
    align: usize,
}

impl MemoryLayout {
    /// Create a layout from size and alignment
    ///
    /// The size is rounded up to the alignment, which must be a power of two.
    pub fn from_size_align(
        size: usize,
        align: usize,
    ) -> Result<Self, MemoryError> {
        if align == 0 || !align.is_power_of_two() {
            return Err(MemoryError::BadAlignment { align });
        }

        Ok(Self {
            size: checked_align_up(size, align).ok_or(MemoryError::SizeOverflow {
                count: size,
                unit: 1,
            })?,
            align,
        })
    }

    /// Layout for an object of `size` bytes on the heap's word alignment
    pub fn object(size: usize) -> Result<Self, MemoryError> {
        Self::from_size_align(size, WORD_SIZE)
    }

    /// Get the size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the alignment
    pub fn align(&self) -> usize {
        self.align
    }
}

/// Object alignment and handle width
pub const WORD_SIZE: usize = 8;

/// Round `value` up to the next multiple of `align` (a power of two)
#[inline]
pub fn align_up(
    value: usize,
    align: usize,
) -> usize {
    (value + align - 1) & !(align - 1)
}

/// `align_up` that reports overflow instead of wrapping
#[inline]
pub fn checked_align_up(
    value: usize,
    align: usize,
) -> Option<usize> {
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}
