//! Error taxonomy for embedded construction
//!
//! `EmbedError` is what callers of the dispatcher see. `BuildError` is what a
//! build step (constructor body, array adapter, heap) fails with; the
//! dispatcher turns it into `EmbedError::BuildFailure`, except for a nested
//! `CycleDetected`, which is passed through unchanged.

use crate::layout::LayoutError;
use crate::runtime::memory::MemoryError;
use crate::runtime::value::{TypeId, ValueKind};
use thiserror::Error;

/// Construction failure
#[derive(Debug, Error)]
pub enum EmbedError {
    /// A slot model was built with an impossible or inconsistent shape
    #[error("invalid slot model for {slot}: {reason}")]
    InvalidModel {
        slot: String,
        reason: InvalidModelReason,
    },

    /// The request does not fit the slot it was issued against
    #[error("shape mismatch constructing {slot}: {detail}")]
    ShapeMismatch {
        slot: String,
        detail: ShapeMismatchDetail,
    },

    /// A slot is being embedded inside its own construction
    #[error("recursively embedding the slot {slot}")]
    CycleDetected {
        slot: String,
        /// Slots in progress from the first entry of `slot` up to the re-entry
        path: Vec<String>,
    },

    /// The build step itself failed
    #[error("failed to build {slot}: {cause}")]
    BuildFailure {
        slot: String,
        #[source]
        cause: BuildError,
    },
}

impl EmbedError {
    pub fn is_cycle(&self) -> bool {
        matches!(self, EmbedError::CycleDetected { .. })
    }

    /// Qualified name of the slot (or type) the error is about
    pub fn slot(&self) -> &str {
        match self {
            EmbedError::InvalidModel { slot, .. }
            | EmbedError::ShapeMismatch { slot, .. }
            | EmbedError::CycleDetected { slot, .. }
            | EmbedError::BuildFailure { slot, .. } => slot,
        }
    }
}

/// Why a slot model was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidModelReason {
    #[error("both a primitive-array and a structured-array shape were supplied")]
    BothArrayShapes,

    #[error("the array shape describes type #{} but the slot declares {element} (#{})", .shape_class.0, .element_type.0)]
    ArrayClassMismatch {
        shape_class: TypeId,
        element_type: TypeId,
        element: String,
    },

    #[error("{class} is an array class but the slot declares no array shape")]
    MissingArrayShape { class: String },

    #[error("{element} is not a {expected} class")]
    UnexpectedArrayShape {
        element: String,
        expected: &'static str,
    },

    #[error("an array of {length} elements does not fit in memory")]
    ArrayTooLarge { length: usize },
}

/// How a request disagrees with its slot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeMismatchDetail {
    #[error(
        "the declaring type of the constructor ({found}) does not match the embedded type declared in the model ({expected})"
    )]
    ConstructorClass { expected: String, found: String },

    #[error("a structured-array builder cannot be used on a slot that does not embed a structured array")]
    NotStructuredArray,

    #[error("a primitive-array builder cannot be used on a slot that does not embed a primitive array")]
    NotPrimitiveArray,

    #[error("the class in the array builder ({found}) does not match the embedded type declared in the model ({expected})")]
    ArrayClass { expected: String, found: String },

    #[error("the array model in the supplied builder does not match the array model of the slot")]
    ArrayModel,

    #[error("arrays can only be constructed within a containing object")]
    FreeStandingArray,
}

/// Failure inside a build step
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("constructor of {ty} expects {expected} arguments, got {found}")]
    Arity {
        ty: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {index} of the {ty} constructor: expected {expected}, got {found}")]
    ArgumentKind {
        ty: String,
        index: usize,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("{ty} has no default constructor")]
    NoDefaultConstructor { ty: String },

    #[error("container is {found}, but the slot belongs to {expected}")]
    ContainerMismatch { expected: String, found: String },

    #[error("slot {slot} has already been constructed")]
    AlreadyConstructed { slot: String },

    #[error("a constructor declared by {found} cannot build {expected}")]
    ConstructorClass { expected: String, found: String },

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Failure raised by a constructor body
    #[error("{0}")]
    Constructor(String),

    /// A nested construction failed inside a constructor body
    #[error("nested construction failed: {0}")]
    Nested(Box<EmbedError>),
}

impl BuildError {
    /// Failure raised from inside a constructor body
    pub fn constructor(message: impl Into<String>) -> Self {
        BuildError::Constructor(message.into())
    }
}

impl From<EmbedError> for BuildError {
    fn from(err: EmbedError) -> Self {
        BuildError::Nested(Box::new(err))
    }
}

/// Turn a build failure into the error reported for `slot`.
///
/// A cycle detected by a nested construction keeps its identity; everything
/// else becomes `BuildFailure`.
pub(crate) fn normalize_failure(
    slot: &str,
    cause: BuildError,
) -> EmbedError {
    match cause {
        BuildError::Nested(inner) if inner.is_cycle() => *inner,
        cause => EmbedError::BuildFailure {
            slot: slot.to_string(),
            cause,
        },
    }
}
