//! Embedding slot model
//!
//! A `SlotModel` describes one embeddable slot of a container type: where it
//! sits, what it embeds, and whether that is a single object, an array of
//! primitives or an array of structured elements. Models are built once when
//! a [`TypeRegistry`] is finalized and shared by every construction of that
//! slot, on any thread.
//!
//! [`TypeRegistry`]: crate::layout::TypeRegistry

mod array_model;

pub use array_model::{PrimitiveArrayModel, StructuredArrayModel};

use crate::construct::{EmbedError, InvalidModelReason};
use crate::runtime::value::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Where a slot's storage lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The sub-object's bytes are part of the container, `size` bytes reserved
    Inline { size: usize },
    /// The slot holds a handle to separately allocated storage
    OutOfLine,
}

/// Location of a slot, as reported by the layout pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLocation {
    pub container: TypeId,
    pub container_name: String,
    pub name: String,
    pub element_type: TypeId,
    pub element_name: String,
    /// Offset of the slot from the container's header
    pub offset: usize,
    pub placement: Placement,
}

impl SlotLocation {
    /// `Container.slot`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.container_name, self.name)
    }
}

struct SlotModelInner {
    location: SlotLocation,
    qualified_name: String,
    primitive_array: Option<PrimitiveArrayModel>,
    structured_array: Option<StructuredArrayModel>,
}

/// Immutable, shareable descriptor of one embedding slot
#[derive(Clone)]
pub struct SlotModel {
    inner: Arc<SlotModelInner>,
}

impl SlotModel {
    /// Build a model for `location`.
    ///
    /// At most one array shape may be given, and its array class must be the
    /// slot's declared element type.
    pub fn build(
        location: SlotLocation,
        primitive_array: Option<PrimitiveArrayModel>,
        structured_array: Option<StructuredArrayModel>,
    ) -> Result<Self, EmbedError> {
        let qualified_name = location.qualified_name();
        let invalid = |reason| EmbedError::InvalidModel {
            slot: qualified_name.clone(),
            reason,
        };

        let shape_class = match (&primitive_array, &structured_array) {
            (Some(_), Some(_)) => return Err(invalid(InvalidModelReason::BothArrayShapes)),
            (Some(shape), None) => Some(shape.array_class()),
            (None, Some(shape)) => Some(shape.array_class()),
            (None, None) => None,
        };
        if let Some(shape_class) = shape_class {
            if shape_class != location.element_type {
                return Err(invalid(InvalidModelReason::ArrayClassMismatch {
                    shape_class,
                    element_type: location.element_type,
                    element: location.element_name.clone(),
                }));
            }
        }

        Ok(Self {
            inner: Arc::new(SlotModelInner {
                qualified_name,
                location,
                primitive_array,
                structured_array,
            }),
        })
    }

    pub fn location(&self) -> &SlotLocation {
        &self.inner.location
    }

    pub fn container_type(&self) -> TypeId {
        self.inner.location.container
    }

    pub fn element_type(&self) -> TypeId {
        self.inner.location.element_type
    }

    pub fn name(&self) -> &str {
        &self.inner.location.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.inner.qualified_name
    }

    pub fn placement(&self) -> Placement {
        self.inner.location.placement
    }

    pub fn is_primitive_array(&self) -> bool {
        self.inner.primitive_array.is_some()
    }

    pub fn is_structured_array(&self) -> bool {
        self.inner.structured_array.is_some()
    }

    pub fn primitive_array_model(&self) -> Option<&PrimitiveArrayModel> {
        self.inner.primitive_array.as_ref()
    }

    pub fn structured_array_model(&self) -> Option<&StructuredArrayModel> {
        self.inner.structured_array.as_ref()
    }
}

// Identity is the slot itself: container type plus slot name.
impl PartialEq for SlotModel {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.container_type() == other.container_type() && self.name() == other.name())
    }
}

impl Eq for SlotModel {}

impl Hash for SlotModel {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.container_type().hash(state);
        self.name().hash(state);
    }
}

impl fmt::Debug for SlotModel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let shape = if self.is_primitive_array() {
            "primitive-array"
        } else if self.is_structured_array() {
            "structured-array"
        } else {
            "object"
        };
        f.debug_struct("SlotModel")
            .field("slot", &self.qualified_name())
            .field("shape", &shape)
            .field("offset", &self.location().offset)
            .field("placement", &self.placement())
            .finish()
    }
}
