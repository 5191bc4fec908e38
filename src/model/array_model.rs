//! Array shape descriptors
//!
//! An array embedded in a slot is described by its array class, its element
//! type and its length. Two descriptors are equal iff all three agree; the
//! dispatcher relies on that to match builders against slots.

use crate::runtime::memory::{checked_align_up, ARRAY_HEADER_SIZE, WORD_SIZE};
use crate::runtime::value::{PrimitiveKind, TypeId};

/// Shape of an array of primitive elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimitiveArrayModel {
    array_class: TypeId,
    element: PrimitiveKind,
    length: usize,
}

impl PrimitiveArrayModel {
    pub fn new(
        array_class: TypeId,
        element: PrimitiveKind,
        length: usize,
    ) -> Self {
        Self {
            array_class,
            element,
            length,
        }
    }

    pub fn array_class(&self) -> TypeId {
        self.array_class
    }

    pub fn element(&self) -> PrimitiveKind {
        self.element
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Bytes occupied by the whole array, header included; `None` if that
    /// overflows `usize`
    pub fn footprint(&self) -> Option<usize> {
        self.length
            .checked_mul(self.element.size())
            .and_then(|bytes| bytes.checked_add(ARRAY_HEADER_SIZE))
            .and_then(|bytes| checked_align_up(bytes, WORD_SIZE))
    }

    /// Offset of element `index` from the array header; in range whenever
    /// `index < length` and the footprint exists
    pub fn element_offset(
        &self,
        index: usize,
    ) -> usize {
        ARRAY_HEADER_SIZE + index * self.element.size()
    }
}

/// Shape of an array of embedded structured elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructuredArrayModel {
    array_class: TypeId,
    element_class: TypeId,
    length: usize,
}

impl StructuredArrayModel {
    pub fn new(
        array_class: TypeId,
        element_class: TypeId,
        length: usize,
    ) -> Self {
        Self {
            array_class,
            element_class,
            length,
        }
    }

    pub fn array_class(&self) -> TypeId {
        self.array_class
    }

    pub fn element_class(&self) -> TypeId {
        self.element_class
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Bytes occupied by the whole array for elements `stride` bytes apart
    pub fn footprint(
        &self,
        stride: usize,
    ) -> Option<usize> {
        self.length
            .checked_mul(stride)
            .and_then(|bytes| bytes.checked_add(ARRAY_HEADER_SIZE))
    }

    pub fn element_offset(
        &self,
        index: usize,
        stride: usize,
    ) -> usize {
        ARRAY_HEADER_SIZE + index * stride
    }
}
