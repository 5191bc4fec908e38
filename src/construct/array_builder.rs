//! Array builders and the adapters that construct embedded arrays

use super::context::ConstructionContext;
use super::errors::{BuildError, EmbedError, ShapeMismatchDetail};
use super::request::{Constructor, CtorAndArgs};
use crate::layout::{LayoutError, TypeSystem};
use crate::model::{PrimitiveArrayModel, SlotModel, StructuredArrayModel};
use crate::runtime::memory::MemoryError;
use crate::runtime::value::{ObjectRef, TypeId, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builder for an embedded array of primitives
#[derive(Debug, Clone)]
pub struct PrimitiveArrayBuilder {
    model: PrimitiveArrayModel,
    array_ctor: Option<CtorAndArgs>,
    fill: Option<Value>,
}

impl PrimitiveArrayBuilder {
    pub fn new(model: PrimitiveArrayModel) -> Self {
        Self {
            model,
            array_ctor: None,
            fill: None,
        }
    }

    /// Constructor of the array class, run after the elements are initialized
    pub fn array_ctor_and_args(
        mut self,
        ctor: &Constructor,
        args: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.array_ctor = Some(CtorAndArgs::new(ctor, args));
        self
    }

    /// Initialize every element to `value` instead of zero
    pub fn fill(
        mut self,
        value: impl Into<Value>,
    ) -> Self {
        self.fill = Some(value.into());
        self
    }

    pub fn array_model(&self) -> &PrimitiveArrayModel {
        &self.model
    }

    pub fn array_class(&self) -> TypeId {
        self.model.array_class()
    }

    pub fn array_ctor(&self) -> Option<&CtorAndArgs> {
        self.array_ctor.as_ref()
    }

    pub fn fill_value(&self) -> Option<Value> {
        self.fill
    }
}

/// Produces the constructor call for element `index`
pub type ElementCtorProvider = Arc<dyn Fn(usize) -> CtorAndArgs + Send + Sync>;

/// How the elements of a structured array are constructed
#[derive(Clone)]
pub enum ElementInit {
    /// The element class's default constructor
    Default,
    /// The same constructor call for every element
    Uniform(CtorAndArgs),
    /// A constructor call chosen per index
    PerIndex(ElementCtorProvider),
}

impl fmt::Debug for ElementInit {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ElementInit::Default => f.write_str("Default"),
            ElementInit::Uniform(call) => f.debug_tuple("Uniform").field(call).finish(),
            ElementInit::PerIndex(_) => f.write_str("PerIndex(..)"),
        }
    }
}

/// Builder for an embedded array of structured elements
#[derive(Debug, Clone)]
pub struct StructuredArrayBuilder {
    model: StructuredArrayModel,
    array_ctor: Option<CtorAndArgs>,
    elements: ElementInit,
}

impl StructuredArrayBuilder {
    pub fn new(model: StructuredArrayModel) -> Self {
        Self {
            model,
            array_ctor: None,
            elements: ElementInit::Default,
        }
    }

    /// Constructor of the array class, run after the elements are built
    pub fn array_ctor_and_args(
        mut self,
        ctor: &Constructor,
        args: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.array_ctor = Some(CtorAndArgs::new(ctor, args));
        self
    }

    /// Build every element with `ctor(args)`
    pub fn element_ctor_and_args(
        mut self,
        ctor: &Constructor,
        args: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.elements = ElementInit::Uniform(CtorAndArgs::new(ctor, args));
        self
    }

    /// Build element `i` with `provider(i)`
    pub fn element_ctor_provider<F>(
        mut self,
        provider: F,
    ) -> Self
    where
        F: Fn(usize) -> CtorAndArgs + Send + Sync + 'static,
    {
        self.elements = ElementInit::PerIndex(Arc::new(provider));
        self
    }

    /// Fill in defaults and check declaring types against the array model
    ///
    /// Per-index providers are checked element by element at construction.
    pub fn resolve(
        mut self,
        types: &TypeSystem,
    ) -> Result<Self, BuildError> {
        let element = self.model.element_class();
        if let ElementInit::Default = self.elements {
            let ctor = types.default_constructor(element).ok_or_else(|| {
                BuildError::NoDefaultConstructor {
                    ty: types.type_name(element).to_string(),
                }
            })?;
            self.elements = ElementInit::Uniform(CtorAndArgs::new(ctor, []));
        }
        if let ElementInit::Uniform(call) = &self.elements {
            check_declaring(types, call, element)?;
        }
        if let Some(call) = &self.array_ctor {
            check_declaring(types, call, self.model.array_class())?;
        }
        Ok(self)
    }

    pub fn array_model(&self) -> &StructuredArrayModel {
        &self.model
    }

    pub fn array_class(&self) -> TypeId {
        self.model.array_class()
    }

    pub fn array_ctor(&self) -> Option<&CtorAndArgs> {
        self.array_ctor.as_ref()
    }

    pub fn elements(&self) -> &ElementInit {
        &self.elements
    }
}

fn check_declaring(
    types: &TypeSystem,
    call: &CtorAndArgs,
    expected: TypeId,
) -> Result<(), BuildError> {
    if call.ctor().declaring_type() == expected {
        Ok(())
    } else {
        Err(BuildError::ConstructorClass {
            expected: types.type_name(expected).to_string(),
            found: call.ctor().declaring_name().to_string(),
        })
    }
}

fn shape_mismatch(
    model: &SlotModel,
    detail: ShapeMismatchDetail,
) -> BuildError {
    EmbedError::ShapeMismatch {
        slot: model.qualified_name().to_string(),
        detail,
    }
    .into()
}

/// Construct the primitive array described by `builder` in `model`'s slot
/// of `container`.
pub fn construct_primitive_array_within(
    ctx: &mut ConstructionContext<'_>,
    container: ObjectRef,
    model: &SlotModel,
    builder: &PrimitiveArrayBuilder,
) -> Result<ObjectRef, BuildError> {
    let shape = model
        .primitive_array_model()
        .ok_or_else(|| shape_mismatch(model, ShapeMismatchDetail::NotPrimitiveArray))?;
    if shape != builder.array_model() {
        return Err(shape_mismatch(model, ShapeMismatchDetail::ArrayModel));
    }
    let element = shape.element();
    if let Some(value) = builder.fill_value() {
        if value.primitive_kind() != Some(element) {
            return Err(LayoutError::KindMismatch {
                path: model.qualified_name().to_string(),
                expected: element,
                found: value.kind(),
            }
            .into());
        }
    }

    let footprint = shape.footprint().ok_or(MemoryError::SizeOverflow {
        count: shape.length(),
        unit: element.size(),
    })?;
    let offset = ctx.place_slot(container, model, footprint)?;
    let heap = ctx.heap_mut();
    heap.init_header(offset, shape.array_class())?;
    heap.set_array_length(offset, shape.length())?;
    if let Some(value) = builder.fill_value() {
        for index in 0..shape.length() {
            heap.write_value(offset + shape.element_offset(index), value)?;
        }
    }

    let array = ObjectRef::new(shape.array_class(), offset);
    if let Some(call) = builder.array_ctor() {
        ctx.invoke(array, call.ctor(), call.args())?;
    }
    ctx.publish_slot(container, model, offset)?;
    debug!(
        slot = model.qualified_name(),
        length = shape.length(),
        element = %element,
        "primitive array constructed"
    );
    Ok(array)
}

/// Construct the structured array described by `builder` in `model`'s slot
/// of `container`.
///
/// Each element is placed at its fixed stride and built in place; slots the
/// element constructors build go through the same cycle guard as `ctx`.
pub fn construct_structured_array_within(
    ctx: &mut ConstructionContext<'_>,
    container: ObjectRef,
    model: &SlotModel,
    builder: &StructuredArrayBuilder,
) -> Result<ObjectRef, BuildError> {
    let shape = model
        .structured_array_model()
        .ok_or_else(|| shape_mismatch(model, ShapeMismatchDetail::NotStructuredArray))?;
    if shape != builder.array_model() {
        return Err(shape_mismatch(model, ShapeMismatchDetail::ArrayModel));
    }

    let types = ctx.types();
    let element = shape.element_class();
    let stride = types.struct_layout(element)?.instance_size;
    let footprint = shape.footprint(stride).ok_or(MemoryError::SizeOverflow {
        count: shape.length(),
        unit: stride,
    })?;
    let offset = ctx.place_slot(container, model, footprint)?;
    ctx.heap_mut().init_header(offset, shape.array_class())?;
    ctx.heap_mut().set_array_length(offset, shape.length())?;

    for index in 0..shape.length() {
        let element_offset = offset + shape.element_offset(index, stride);
        let call = match builder.elements() {
            ElementInit::Uniform(call) => call.clone(),
            ElementInit::PerIndex(provider) => provider(index),
            ElementInit::Default => {
                let ctor = types.default_constructor(element).ok_or_else(|| {
                    BuildError::NoDefaultConstructor {
                        ty: types.type_name(element).to_string(),
                    }
                })?;
                CtorAndArgs::new(ctor, [])
            }
        };
        ctx.heap_mut().init_header(element_offset, element)?;
        ctx.invoke(
            ObjectRef::new(element, element_offset),
            call.ctor(),
            call.args(),
        )?;
        ctx.heap_mut().mark_constructed(element_offset)?;
    }

    let array = ObjectRef::new(shape.array_class(), offset);
    if let Some(call) = builder.array_ctor() {
        ctx.invoke(array, call.ctor(), call.args())?;
    }
    ctx.publish_slot(container, model, offset)?;
    debug!(
        slot = model.qualified_name(),
        length = shape.length(),
        stride,
        "structured array constructed"
    );
    Ok(array)
}
