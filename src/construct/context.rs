//! Construction context and object scopes

use super::errors::{normalize_failure, BuildError, EmbedError, ShapeMismatchDetail};
use super::guard::CycleGuard;
use super::request::{ConstructionRequest, Constructor, CtorAndArgs};
use crate::layout::{LayoutError, TypeKind, TypeSystem};
use crate::model::{Placement, SlotModel};
use crate::runtime::memory::{Heap, MemoryLayout};
use crate::runtime::value::{ObjectRef, TypeId, Value};
use tracing::{debug, trace};

/// Everything a construction needs: the types, the heap objects live in,
/// and the current thread's cycle guard.
pub struct ConstructionContext<'a> {
    types: &'a TypeSystem,
    heap: &'a mut Heap,
    guard: &'a CycleGuard,
}

impl<'a> ConstructionContext<'a> {
    pub fn new(
        types: &'a TypeSystem,
        heap: &'a mut Heap,
        guard: &'a CycleGuard,
    ) -> Self {
        Self { types, heap, guard }
    }

    pub fn types(&self) -> &'a TypeSystem {
        self.types
    }

    pub fn heap(&self) -> &Heap {
        &*self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut *self.heap
    }

    pub fn guard(&self) -> &'a CycleGuard {
        self.guard
    }

    /// Allocate and construct a free-standing object of struct type `ty`
    pub fn instantiate(
        &mut self,
        ty: TypeId,
        request: ConstructionRequest,
    ) -> Result<ObjectRef, EmbedError> {
        let name = self.types.type_name(ty).to_string();
        let size = match self.types.kind(ty) {
            Some(TypeKind::Struct(layout)) => layout.instance_size,
            Some(_) => {
                return Err(EmbedError::ShapeMismatch {
                    slot: name,
                    detail: ShapeMismatchDetail::FreeStandingArray,
                })
            }
            None => {
                return Err(normalize_failure(
                    &name,
                    LayoutError::UnknownTypeId(ty).into(),
                ))
            }
        };

        let call = match request {
            ConstructionRequest::Default => match self.types.default_constructor(ty) {
                Some(ctor) => CtorAndArgs::new(ctor, []),
                None => {
                    return Err(EmbedError::BuildFailure {
                        cause: BuildError::NoDefaultConstructor { ty: name.clone() },
                        slot: name,
                    })
                }
            },
            ConstructionRequest::WithArgs { ctor, args } => CtorAndArgs::new(&ctor, args),
            ConstructionRequest::Bundle(bundle) => bundle,
            ConstructionRequest::StructuredArray(_) | ConstructionRequest::PrimitiveArray(_) => {
                return Err(EmbedError::ShapeMismatch {
                    slot: name,
                    detail: ShapeMismatchDetail::FreeStandingArray,
                })
            }
        };
        if call.ctor().declaring_type() != ty {
            return Err(EmbedError::ShapeMismatch {
                detail: ShapeMismatchDetail::ConstructorClass {
                    expected: name.clone(),
                    found: call.ctor().declaring_name().to_string(),
                },
                slot: name,
            });
        }

        debug!(ty = %name, size, "instantiating");
        self.allocate_and_invoke(ty, size, &call)
            .map_err(|cause| normalize_failure(&name, cause))
    }

    fn allocate_and_invoke(
        &mut self,
        ty: TypeId,
        size: usize,
        call: &CtorAndArgs,
    ) -> Result<ObjectRef, BuildError> {
        let offset = self.heap.alloc(MemoryLayout::object(size)?)?;
        self.heap.init_header(offset, ty)?;
        let obj = ObjectRef::new(ty, offset);
        self.invoke(obj, call.ctor(), call.args())?;
        self.heap.mark_constructed(offset)?;
        Ok(obj)
    }

    /// Run `ctor` on the already placed object `obj`
    pub(crate) fn invoke(
        &mut self,
        obj: ObjectRef,
        ctor: &Constructor,
        args: &[Value],
    ) -> Result<(), BuildError> {
        if ctor.declaring_type() != obj.ty {
            return Err(BuildError::ConstructorClass {
                expected: self.types.type_name(obj.ty).to_string(),
                found: ctor.declaring_name().to_string(),
            });
        }
        ctor.check_args(args)?;
        trace!(ty = ctor.declaring_name(), offset = obj.offset, "invoke constructor");
        let mut scope = ObjectScope { ctx: self, this: obj };
        ctor.call(&mut scope, args)
    }

    /// Reserve `size` bytes for `model` in `container`: the slot itself when
    /// inline, a fresh allocation otherwise.
    pub(crate) fn place_slot(
        &mut self,
        container: ObjectRef,
        model: &SlotModel,
        size: usize,
    ) -> Result<usize, BuildError> {
        match model.placement() {
            Placement::Inline { .. } => {
                let offset = container.offset + model.location().offset;
                self.heap.zero(offset, size)?;
                Ok(offset)
            }
            Placement::OutOfLine => {
                let offset = self.heap.alloc(MemoryLayout::object(size)?)?;
                trace!(slot = model.qualified_name(), offset, size, "out-of-line storage");
                Ok(offset)
            }
        }
    }

    /// Make a finished sub-object visible through its slot
    pub(crate) fn publish_slot(
        &mut self,
        container: ObjectRef,
        model: &SlotModel,
        offset: usize,
    ) -> Result<(), BuildError> {
        if model.placement() == Placement::OutOfLine {
            self.heap
                .set_handle(container.offset + model.location().offset, offset)?;
        }
        self.heap.mark_constructed(offset)?;
        Ok(())
    }
}

/// The object a constructor body is running on
pub struct ObjectScope<'s, 'a> {
    ctx: &'s mut ConstructionContext<'a>,
    this: ObjectRef,
}

impl<'a> ObjectScope<'_, 'a> {
    pub fn this(&self) -> ObjectRef {
        self.this
    }

    pub fn types(&self) -> &'a TypeSystem {
        self.ctx.types
    }

    pub fn heap(&self) -> &Heap {
        &*self.ctx.heap
    }

    /// The underlying context, to construct into other objects
    pub fn context(&mut self) -> &mut ConstructionContext<'a> {
        &mut *self.ctx
    }

    /// Write the primitive at `path` relative to this object
    pub fn set(
        &mut self,
        path: &str,
        value: impl Into<Value>,
    ) -> Result<(), BuildError> {
        let types = self.ctx.types;
        types.write(&mut *self.ctx.heap, self.this, path, value.into())?;
        Ok(())
    }

    /// Read the primitive at `path` relative to this object
    pub fn get(
        &self,
        path: &str,
    ) -> Result<Value, BuildError> {
        Ok(self.ctx.types.read(&*self.ctx.heap, self.this, path)?)
    }

    /// Model of this object's slot `name`
    pub fn slot(
        &self,
        name: &str,
    ) -> Result<SlotModel, BuildError> {
        Ok(self.ctx.types.slot_model(self.this.ty, name)?.clone())
    }

    /// Construct this object's slot `name`
    pub fn construct_slot(
        &mut self,
        name: &str,
        request: ConstructionRequest,
    ) -> Result<ObjectRef, BuildError> {
        let model = self.slot(name)?;
        Ok(self.ctx.construct(self.this, &model, request)?)
    }

    /// Length of the array at `path` (`""` for this object)
    pub fn array_len(
        &self,
        path: &str,
    ) -> Result<usize, BuildError> {
        let array = self.ctx.types.resolve(&*self.ctx.heap, self.this, path)?;
        match self.ctx.types.kind(array.ty) {
            Some(TypeKind::PrimitiveArray { .. } | TypeKind::StructuredArray { .. }) => {
                Ok(self.ctx.heap.array_length(array.offset)?)
            }
            _ => Err(LayoutError::NotAnArray {
                path: path.to_string(),
            }
            .into()),
        }
    }

    /// Slots under construction on this thread, outermost first
    pub fn in_progress(&self) -> Vec<String> {
        self.ctx.guard.in_progress()
    }
}
