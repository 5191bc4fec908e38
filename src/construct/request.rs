//! Constructors and construction requests

use super::array_builder::{PrimitiveArrayBuilder, StructuredArrayBuilder};
use super::context::ObjectScope;
use super::errors::BuildError;
use crate::runtime::value::{TypeId, Value, ValueKind};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Constructor arguments; most constructors take a handful
pub type Args = SmallVec<[Value; 4]>;

/// Constructor body: runs on the placed, zeroed object
pub(crate) type ConstructorBody =
    Box<dyn Fn(&mut ObjectScope<'_, '_>, &[Value]) -> Result<(), BuildError> + Send + Sync>;

struct ConstructorInner {
    declaring_type: TypeId,
    declaring_name: String,
    params: Vec<ValueKind>,
    body: ConstructorBody,
}

/// A registered constructor of a struct or array class
///
/// Cheap to clone; clones share the body.
#[derive(Clone)]
pub struct Constructor {
    inner: Arc<ConstructorInner>,
}

impl Constructor {
    pub(crate) fn new(
        declaring_type: TypeId,
        declaring_name: String,
        params: Vec<ValueKind>,
        body: ConstructorBody,
    ) -> Self {
        Self {
            inner: Arc::new(ConstructorInner {
                declaring_type,
                declaring_name,
                params,
                body,
            }),
        }
    }

    pub fn declaring_type(&self) -> TypeId {
        self.inner.declaring_type
    }

    pub fn declaring_name(&self) -> &str {
        &self.inner.declaring_name
    }

    pub fn params(&self) -> &[ValueKind] {
        &self.inner.params
    }

    /// Check `args` against the parameter kinds
    pub fn check_args(
        &self,
        args: &[Value],
    ) -> Result<(), BuildError> {
        if args.len() != self.inner.params.len() {
            return Err(BuildError::Arity {
                ty: self.inner.declaring_name.clone(),
                expected: self.inner.params.len(),
                found: args.len(),
            });
        }
        for (index, (param, arg)) in self.inner.params.iter().zip(args).enumerate() {
            if arg.kind() != *param {
                return Err(BuildError::ArgumentKind {
                    ty: self.inner.declaring_name.clone(),
                    index,
                    expected: *param,
                    found: arg.kind(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn call(
        &self,
        scope: &mut ObjectScope<'_, '_>,
        args: &[Value],
    ) -> Result<(), BuildError> {
        (self.inner.body)(scope, args)
    }
}

impl PartialEq for Constructor {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("declaring_type", &self.inner.declaring_name)
            .field("params", &self.inner.params)
            .finish()
    }
}

/// A constructor together with the arguments to call it with
#[derive(Debug, Clone, PartialEq)]
pub struct CtorAndArgs {
    ctor: Constructor,
    args: Args,
}

impl CtorAndArgs {
    pub fn new(
        ctor: &Constructor,
        args: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            ctor: ctor.clone(),
            args: args.into_iter().collect(),
        }
    }

    pub fn ctor(&self) -> &Constructor {
        &self.ctor
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

/// What to build in a slot; exactly one form per call
#[derive(Debug, Clone)]
pub enum ConstructionRequest {
    /// Run the element type's default constructor
    Default,
    /// Run `ctor` with `args`
    WithArgs { ctor: Constructor, args: Args },
    /// Pre-packaged constructor and arguments
    Bundle(CtorAndArgs),
    /// Build a structured array
    StructuredArray(StructuredArrayBuilder),
    /// Build a primitive array
    PrimitiveArray(PrimitiveArrayBuilder),
}

impl ConstructionRequest {
    pub fn with_args(
        ctor: &Constructor,
        args: impl IntoIterator<Item = Value>,
    ) -> Self {
        ConstructionRequest::WithArgs {
            ctor: ctor.clone(),
            args: args.into_iter().collect(),
        }
    }

    /// Short name of the request form, for logging
    pub fn form(&self) -> &'static str {
        match self {
            ConstructionRequest::Default => "default",
            ConstructionRequest::WithArgs { .. } => "with-args",
            ConstructionRequest::Bundle(_) => "bundle",
            ConstructionRequest::StructuredArray(_) => "structured-array",
            ConstructionRequest::PrimitiveArray(_) => "primitive-array",
        }
    }
}

impl From<CtorAndArgs> for ConstructionRequest {
    fn from(bundle: CtorAndArgs) -> Self {
        ConstructionRequest::Bundle(bundle)
    }
}

impl From<StructuredArrayBuilder> for ConstructionRequest {
    fn from(builder: StructuredArrayBuilder) -> Self {
        ConstructionRequest::StructuredArray(builder)
    }
}

impl From<PrimitiveArrayBuilder> for ConstructionRequest {
    fn from(builder: PrimitiveArrayBuilder) -> Self {
        ConstructionRequest::PrimitiveArray(builder)
    }
}
