//! Construction dispatcher
//!
//! `construct` is the single entry point for building the sub-object of an
//! embedding slot. A request is checked against the slot model before
//! anything is touched; only then does the slot enter the cycle guard, and it
//! leaves the guard again however the build ends.

use super::array_builder::{
    construct_primitive_array_within, construct_structured_array_within, PrimitiveArrayBuilder,
    StructuredArrayBuilder,
};
use super::context::ConstructionContext;
use super::errors::{normalize_failure, BuildError, EmbedError, ShapeMismatchDetail};
use super::request::{ConstructionRequest, CtorAndArgs};
use crate::model::{Placement, SlotModel};
use crate::runtime::value::{ObjectRef, TypeId};
use tracing::debug;

/// A validated request
enum BuildPlan {
    Scalar(CtorAndArgs),
    PrimitiveArray(PrimitiveArrayBuilder),
    StructuredArray(StructuredArrayBuilder),
}

impl ConstructionContext<'_> {
    /// Construct the sub-object of `model`'s slot inside `container`
    pub fn construct(
        &mut self,
        container: ObjectRef,
        model: &SlotModel,
        request: ConstructionRequest,
    ) -> Result<ObjectRef, EmbedError> {
        let slot = model.qualified_name();
        debug!(slot, form = request.form(), "construct embedded slot");
        let plan = self.validate(model, request)?;

        let guard = self.guard();
        let _in_progress = guard.enter(model)?;

        self.sanity_check(container, model)
            .and_then(|()| self.build(container, model, plan))
            .map_err(|cause| normalize_failure(slot, cause))
    }

    fn shape_mismatch(
        &self,
        model: &SlotModel,
        detail: ShapeMismatchDetail,
    ) -> EmbedError {
        EmbedError::ShapeMismatch {
            slot: model.qualified_name().to_string(),
            detail,
        }
    }

    fn check_array_class(
        &self,
        model: &SlotModel,
        found: TypeId,
    ) -> Result<(), EmbedError> {
        if found == model.element_type() {
            return Ok(());
        }
        let types = self.types();
        Err(self.shape_mismatch(
            model,
            ShapeMismatchDetail::ArrayClass {
                expected: types.type_name(model.element_type()).to_string(),
                found: types.type_name(found).to_string(),
            },
        ))
    }

    /// Check `request` against `model` and turn it into a build plan
    fn validate(
        &self,
        model: &SlotModel,
        request: ConstructionRequest,
    ) -> Result<BuildPlan, EmbedError> {
        let types = self.types();
        let element = model.element_type();

        let call = match request {
            ConstructionRequest::Default => match types.default_constructor(element) {
                Some(ctor) => CtorAndArgs::new(ctor, []),
                None => {
                    return Err(EmbedError::BuildFailure {
                        slot: model.qualified_name().to_string(),
                        cause: BuildError::NoDefaultConstructor {
                            ty: types.type_name(element).to_string(),
                        },
                    })
                }
            },
            ConstructionRequest::WithArgs { ctor, args } => CtorAndArgs::new(&ctor, args),
            ConstructionRequest::Bundle(bundle) => bundle,
            ConstructionRequest::StructuredArray(builder) => {
                let shape = model.structured_array_model().ok_or_else(|| {
                    self.shape_mismatch(model, ShapeMismatchDetail::NotStructuredArray)
                })?;
                self.check_array_class(model, builder.array_class())?;
                if builder.array_model() != shape {
                    return Err(self.shape_mismatch(model, ShapeMismatchDetail::ArrayModel));
                }
                return self.resolve_structured(model, builder);
            }
            ConstructionRequest::PrimitiveArray(builder) => {
                let shape = model.primitive_array_model().ok_or_else(|| {
                    self.shape_mismatch(model, ShapeMismatchDetail::NotPrimitiveArray)
                })?;
                self.check_array_class(model, builder.array_class())?;
                if builder.array_model() != shape {
                    return Err(self.shape_mismatch(model, ShapeMismatchDetail::ArrayModel));
                }
                if let Some(call) = builder.array_ctor() {
                    self.check_constructor_class(model, call)?;
                }
                return Ok(BuildPlan::PrimitiveArray(builder));
            }
        };
        self.check_constructor_class(model, &call)?;

        // A plain constructor call on an array slot is the array class's
        // constructor; wrap it in a builder for the slot's shape.
        if let Some(shape) = model.structured_array_model() {
            let builder = StructuredArrayBuilder::new(shape.clone())
                .array_ctor_and_args(call.ctor(), call.args().iter().copied());
            self.resolve_structured(model, builder)
        } else if let Some(shape) = model.primitive_array_model() {
            let builder = PrimitiveArrayBuilder::new(shape.clone())
                .array_ctor_and_args(call.ctor(), call.args().iter().copied());
            Ok(BuildPlan::PrimitiveArray(builder))
        } else {
            Ok(BuildPlan::Scalar(call))
        }
    }

    fn check_constructor_class(
        &self,
        model: &SlotModel,
        call: &CtorAndArgs,
    ) -> Result<(), EmbedError> {
        if call.ctor().declaring_type() == model.element_type() {
            return Ok(());
        }
        Err(self.shape_mismatch(
            model,
            ShapeMismatchDetail::ConstructorClass {
                expected: self.types().type_name(model.element_type()).to_string(),
                found: call.ctor().declaring_name().to_string(),
            },
        ))
    }

    fn resolve_structured(
        &self,
        model: &SlotModel,
        builder: StructuredArrayBuilder,
    ) -> Result<BuildPlan, EmbedError> {
        match builder.resolve(self.types()) {
            Ok(builder) => Ok(BuildPlan::StructuredArray(builder)),
            Err(BuildError::ConstructorClass { expected, found }) => Err(self.shape_mismatch(
                model,
                ShapeMismatchDetail::ConstructorClass { expected, found },
            )),
            Err(cause) => Err(EmbedError::BuildFailure {
                slot: model.qualified_name().to_string(),
                cause,
            }),
        }
    }

    /// The container must be of the slot's type and the slot still empty
    fn sanity_check(
        &self,
        container: ObjectRef,
        model: &SlotModel,
    ) -> Result<(), BuildError> {
        let types = self.types();
        let header = self.heap().header(container.offset)?;
        if container.ty != model.container_type() || header.ty != Some(model.container_type()) {
            let found = header.ty.unwrap_or(container.ty);
            return Err(BuildError::ContainerMismatch {
                expected: types.type_name(model.container_type()).to_string(),
                found: types.type_name(found).to_string(),
            });
        }

        let slot_offset = container.offset + model.location().offset;
        let occupied = match model.placement() {
            Placement::Inline { .. } => self.heap().header(slot_offset)?.is_constructed(),
            Placement::OutOfLine => self.heap().handle(slot_offset)?.is_some(),
        };
        if occupied {
            return Err(BuildError::AlreadyConstructed {
                slot: model.qualified_name().to_string(),
            });
        }
        Ok(())
    }

    fn build(
        &mut self,
        container: ObjectRef,
        model: &SlotModel,
        plan: BuildPlan,
    ) -> Result<ObjectRef, BuildError> {
        match plan {
            BuildPlan::Scalar(call) => self.construct_scalar_within(container, model, &call),
            BuildPlan::PrimitiveArray(builder) => {
                construct_primitive_array_within(self, container, model, &builder)
            }
            BuildPlan::StructuredArray(builder) => {
                construct_structured_array_within(self, container, model, &builder)
            }
        }
    }

    fn construct_scalar_within(
        &mut self,
        container: ObjectRef,
        model: &SlotModel,
        call: &CtorAndArgs,
    ) -> Result<ObjectRef, BuildError> {
        let element = model.element_type();
        let size = self.types().struct_layout(element)?.instance_size;
        let offset = self.place_slot(container, model, size)?;
        self.heap_mut().init_header(offset, element)?;

        let obj = ObjectRef::new(element, offset);
        self.invoke(obj, call.ctor(), call.args())?;
        self.publish_slot(container, model, offset)?;
        Ok(obj)
    }
}
