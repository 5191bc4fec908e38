//! Type declarations and field layout
//!
//! Types are declared on a [`TypeRegistry`], by name so that they may refer to
//! each other in any order. [`TypeRegistry::finalize`] runs the layout pass:
//! it decides for every embedding slot whether its storage can live inside
//! the container (inline) or must be allocated separately (out-of-line),
//! assigns byte offsets, and builds the shared [`SlotModel`]s.
//!
//! The result, a [`TypeSystem`], is immutable and can be shared between
//! threads.
//!
//! # Layout of a struct
//!
//! ```text
//! @0   header
//! @8   primitive fields, declaration order, naturally aligned
//!      handles of out-of-line slots
//!      --- intrinsic fields, word aligned ---
//!      inline slots, declaration order
//! ```

mod access;
mod field_layout;

pub use access::PathPlace;

use crate::construct::{BuildError, Constructor, EmbedError, ObjectScope};
use crate::model::{PrimitiveArrayModel, SlotModel, StructuredArrayModel};
use crate::runtime::memory::MemoryError;
use crate::runtime::value::{PrimitiveKind, TypeId, Value, ValueKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Layout / introspection failure
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("type {name} is declared twice")]
    DuplicateType { name: String },

    #[error("field {field} is declared twice in {ty}")]
    DuplicateField { ty: String, field: String },

    #[error("unknown type {name}")]
    UnknownType { name: String },

    #[error("unknown type {0:?}")]
    UnknownTypeId(TypeId),

    #[error("{ty} has no field {field}")]
    UnknownField { ty: String, field: String },

    #[error("{ty} is not a struct")]
    NotAStruct { ty: String },

    #[error("{path} is not an array")]
    NotAnArray { path: String },

    #[error("{path} is not a primitive field")]
    NotAPrimitive { path: String },

    #[error("{path} is a primitive field, not an object")]
    NotAnObject { path: String },

    #[error("index {index} out of bounds for {path} of length {length}")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        length: usize,
    },

    #[error("{slot} is stored out-of-line; its offset is only known at run time")]
    NotInline { slot: String },

    #[error("{slot} has not been constructed")]
    NotConstructed { slot: String },

    #[error("{path} holds {expected} values, got {found}")]
    KindMismatch {
        path: String,
        expected: PrimitiveKind,
        found: ValueKind,
    },

    #[error("instance size of {ty} overflows the address space")]
    TooLarge { ty: String },

    #[error("malformed path {path:?}")]
    BadPath { path: String },

    #[error(transparent)]
    Model(Box<EmbedError>),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl From<EmbedError> for LayoutError {
    fn from(err: EmbedError) -> Self {
        LayoutError::Model(Box::new(err))
    }
}

/// Layout pass configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Embed sub-objects inline whenever the embedding graph allows it.
    /// When off, every slot is stored out-of-line behind a handle.
    #[serde(default = "default_optimize_layout")]
    pub optimize_layout: bool,
}

fn default_optimize_layout() -> bool {
    true
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            optimize_layout: default_optimize_layout(),
        }
    }
}

/// Declared shape of an embedding slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotShape {
    /// A single embedded object
    Scalar,
    /// An embedded array of primitives
    PrimitiveArray { length: usize },
    /// An embedded array of structured elements
    StructuredArray { length: usize },
}

#[derive(Debug, Clone)]
pub(crate) enum FieldDecl {
    Primitive {
        name: String,
        kind: PrimitiveKind,
    },
    Slot {
        name: String,
        ty: String,
        shape: SlotShape,
    },
}

impl FieldDecl {
    fn name(&self) -> &str {
        match self {
            FieldDecl::Primitive { name, .. } | FieldDecl::Slot { name, .. } => name,
        }
    }
}

/// Declaration of a struct type
#[derive(Debug, Clone)]
pub struct StructDecl {
    name: String,
    fields: Vec<FieldDecl>,
}

impl StructDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a primitive field
    pub fn field(
        mut self,
        name: impl Into<String>,
        kind: PrimitiveKind,
    ) -> Self {
        self.fields.push(FieldDecl::Primitive {
            name: name.into(),
            kind,
        });
        self
    }

    /// Add a slot embedding one object of type `ty`
    pub fn embedded(
        self,
        name: impl Into<String>,
        ty: impl Into<String>,
    ) -> Self {
        self.embedded_with_shape(name, ty, SlotShape::Scalar)
    }

    /// Add a slot embedding a primitive array of class `class`
    pub fn embedded_primitive_array(
        self,
        name: impl Into<String>,
        class: impl Into<String>,
        length: usize,
    ) -> Self {
        self.embedded_with_shape(name, class, SlotShape::PrimitiveArray { length })
    }

    /// Add a slot embedding a structured array of class `class`
    pub fn embedded_structured_array(
        self,
        name: impl Into<String>,
        class: impl Into<String>,
        length: usize,
    ) -> Self {
        self.embedded_with_shape(name, class, SlotShape::StructuredArray { length })
    }

    pub fn embedded_with_shape(
        mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
        shape: SlotShape,
    ) -> Self {
        self.fields.push(FieldDecl::Slot {
            name: name.into(),
            ty: ty.into(),
            shape,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub(crate) enum TypeDecl {
    Struct(Vec<FieldDecl>),
    PrimitiveArray { element: PrimitiveKind },
    StructuredArray { element: String },
}

/// Mutable registry of type declarations and constructors
#[derive(Default)]
pub struct TypeRegistry {
    names: IndexMap<String, TypeId>,
    decls: Vec<TypeDecl>,
    constructors: Vec<Vec<Constructor>>,
    defaults: HashMap<TypeId, Constructor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(
        &mut self,
        name: String,
        decl: TypeDecl,
    ) -> Result<TypeId, LayoutError> {
        if self.names.contains_key(&name) {
            return Err(LayoutError::DuplicateType { name });
        }
        let id = TypeId(self.decls.len() as u32);
        self.names.insert(name, id);
        self.decls.push(decl);
        self.constructors.push(Vec::new());
        Ok(id)
    }

    /// Declare a struct type
    pub fn declare_struct(
        &mut self,
        decl: StructDecl,
    ) -> Result<TypeId, LayoutError> {
        let mut seen = std::collections::HashSet::new();
        for field in &decl.fields {
            if !seen.insert(field.name()) {
                return Err(LayoutError::DuplicateField {
                    ty: decl.name.clone(),
                    field: field.name().to_string(),
                });
            }
        }
        self.declare(decl.name, TypeDecl::Struct(decl.fields))
    }

    /// Declare an array class with primitive elements
    pub fn declare_primitive_array(
        &mut self,
        name: impl Into<String>,
        element: PrimitiveKind,
    ) -> Result<TypeId, LayoutError> {
        self.declare(name.into(), TypeDecl::PrimitiveArray { element })
    }

    /// Declare an array class whose elements are embedded `element` structs
    pub fn declare_structured_array(
        &mut self,
        name: impl Into<String>,
        element: impl Into<String>,
    ) -> Result<TypeId, LayoutError> {
        self.declare(
            name.into(),
            TypeDecl::StructuredArray {
                element: element.into(),
            },
        )
    }

    pub fn type_id(
        &self,
        name: &str,
    ) -> Option<TypeId> {
        self.names.get(name).copied()
    }

    fn type_name(
        &self,
        ty: TypeId,
    ) -> Result<&str, LayoutError> {
        self.names
            .get_index(ty.0 as usize)
            .map(|(name, _)| name.as_str())
            .ok_or(LayoutError::UnknownTypeId(ty))
    }

    /// Register a constructor for `ty`
    ///
    /// The body runs on the freshly placed, zeroed object and may construct
    /// the object's own embedded slots through the scope.
    pub fn constructor<I, F>(
        &mut self,
        ty: TypeId,
        params: I,
        body: F,
    ) -> Result<Constructor, LayoutError>
    where
        I: IntoIterator,
        I::Item: Into<ValueKind>,
        F: Fn(&mut ObjectScope<'_, '_>, &[Value]) -> Result<(), BuildError> + Send + Sync + 'static,
    {
        let name = self.type_name(ty)?.to_string();
        let params: Vec<ValueKind> = params.into_iter().map(Into::into).collect();
        let ctor = Constructor::new(ty, name, params, Box::new(body));
        if ctor.params().is_empty() {
            self.defaults.insert(ty, ctor.clone());
        }
        self.constructors[ty.0 as usize].push(ctor.clone());
        Ok(ctor)
    }

    /// Register the no-argument constructor of `ty`
    pub fn default_constructor<F>(
        &mut self,
        ty: TypeId,
        body: F,
    ) -> Result<Constructor, LayoutError>
    where
        F: Fn(&mut ObjectScope<'_, '_>, &[Value]) -> Result<(), BuildError> + Send + Sync + 'static,
    {
        self.constructor(ty, std::iter::empty::<ValueKind>(), body)
    }

    /// Run the layout pass and freeze the registry
    pub fn finalize(
        self,
        config: &LayoutConfig,
    ) -> Result<TypeSystem, LayoutError> {
        field_layout::finalize(self, config)
    }
}

/// Kind and layout of a finalized type
#[derive(Debug)]
pub enum TypeKind {
    Struct(StructLayout),
    PrimitiveArray { element: PrimitiveKind },
    StructuredArray { element: TypeId },
}

/// Field layout of a struct type
#[derive(Debug)]
pub struct StructLayout {
    /// Total size, header included
    pub instance_size: usize,
    /// End of primitive fields and out-of-line handles
    pub instance_fields_end: usize,
    /// Fields in declaration order
    pub fields: IndexMap<String, FieldLayout>,
}

/// One field of a struct
#[derive(Debug)]
pub enum FieldLayout {
    Primitive { offset: usize, kind: PrimitiveKind },
    Slot(SlotModel),
}

impl FieldLayout {
    pub fn offset(&self) -> usize {
        match self {
            FieldLayout::Primitive { offset, .. } => *offset,
            FieldLayout::Slot(model) => model.location().offset,
        }
    }
}

#[derive(Debug)]
pub(crate) struct TypeInfo {
    pub(crate) name: String,
    pub(crate) kind: TypeKind,
}

/// Finalized, immutable set of types, their layouts and slot models
pub struct TypeSystem {
    pub(crate) types: Vec<TypeInfo>,
    pub(crate) names: HashMap<String, TypeId>,
    pub(crate) defaults: HashMap<TypeId, Constructor>,
    pub(crate) optimize_layout: bool,
}

impl TypeSystem {
    pub fn type_id(
        &self,
        name: &str,
    ) -> Option<TypeId> {
        self.names.get(name).copied()
    }

    /// Name of `ty`, or `"<unknown>"`
    pub fn type_name(
        &self,
        ty: TypeId,
    ) -> &str {
        self.types
            .get(ty.0 as usize)
            .map(|info| info.name.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn kind(
        &self,
        ty: TypeId,
    ) -> Option<&TypeKind> {
        self.types.get(ty.0 as usize).map(|info| &info.kind)
    }

    pub fn struct_layout(
        &self,
        ty: TypeId,
    ) -> Result<&StructLayout, LayoutError> {
        match self.kind(ty) {
            Some(TypeKind::Struct(layout)) => Ok(layout),
            Some(_) => Err(LayoutError::NotAStruct {
                ty: self.type_name(ty).to_string(),
            }),
            None => Err(LayoutError::UnknownTypeId(ty)),
        }
    }

    /// Size of an instance of struct `ty`
    pub fn instance_size(
        &self,
        ty: TypeId,
    ) -> Option<usize> {
        self.struct_layout(ty).ok().map(|layout| layout.instance_size)
    }

    /// Model of slot `slot` on container type `ty`
    pub fn slot_model(
        &self,
        ty: TypeId,
        slot: &str,
    ) -> Result<&SlotModel, LayoutError> {
        match self.struct_layout(ty)?.fields.get(slot) {
            Some(FieldLayout::Slot(model)) => Ok(model),
            _ => Err(LayoutError::UnknownField {
                ty: self.type_name(ty).to_string(),
                field: slot.to_string(),
            }),
        }
    }

    /// Every slot model, grouped by container in declaration order
    pub fn slot_models(&self) -> impl Iterator<Item = &SlotModel> {
        self.types.iter().flat_map(|info| match &info.kind {
            TypeKind::Struct(layout) => layout
                .fields
                .values()
                .filter_map(|field| match field {
                    FieldLayout::Slot(model) => Some(model),
                    FieldLayout::Primitive { .. } => None,
                })
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        })
    }

    pub fn default_constructor(
        &self,
        ty: TypeId,
    ) -> Option<&Constructor> {
        self.defaults.get(&ty)
    }

    /// Primitive array shape for `class` with `length` elements
    pub fn primitive_array_model(
        &self,
        class: TypeId,
        length: usize,
    ) -> Result<PrimitiveArrayModel, LayoutError> {
        match self.kind(class) {
            Some(TypeKind::PrimitiveArray { element }) => {
                Ok(PrimitiveArrayModel::new(class, *element, length))
            }
            Some(_) => Err(LayoutError::NotAnArray {
                path: self.type_name(class).to_string(),
            }),
            None => Err(LayoutError::UnknownTypeId(class)),
        }
    }

    /// Structured array shape for `class` with `length` elements
    pub fn structured_array_model(
        &self,
        class: TypeId,
        length: usize,
    ) -> Result<StructuredArrayModel, LayoutError> {
        match self.kind(class) {
            Some(TypeKind::StructuredArray { element }) => {
                Ok(StructuredArrayModel::new(class, *element, length))
            }
            Some(_) => Err(LayoutError::NotAnArray {
                path: self.type_name(class).to_string(),
            }),
            None => Err(LayoutError::UnknownTypeId(class)),
        }
    }

    /// Whether the layout pass was allowed to inline slots
    pub fn optimize_layout(&self) -> bool {
        self.optimize_layout
    }
}

impl std::fmt::Debug for TypeSystem {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("TypeSystem")
            .field("types", &self.types.len())
            .field("optimize_layout", &self.optimize_layout)
            .finish()
    }
}
