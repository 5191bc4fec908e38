//! Embedded construction
//!
//! Builds the sub-object of an embedding slot in place, inside its container:
//!
//! 1. the request is validated against the [`SlotModel`],
//! 2. the slot enters the thread's [`CycleGuard`],
//! 3. the container and slot are sanity checked,
//! 4. the single object, primitive array or structured array is built,
//! 5. the slot leaves the guard (always).
//!
//! [`SlotModel`]: crate::model::SlotModel

mod array_builder;
mod context;
mod dispatcher;
mod errors;
mod guard;
mod request;

pub use array_builder::{
    construct_primitive_array_within, construct_structured_array_within, ElementCtorProvider,
    ElementInit, PrimitiveArrayBuilder, StructuredArrayBuilder,
};
pub use context::{ConstructionContext, ObjectScope};
pub use errors::{BuildError, EmbedError, InvalidModelReason, ShapeMismatchDetail};
pub use guard::{CycleGuard, CycleResetPolicy, InProgress};
pub use request::{Args, ConstructionRequest, Constructor, CtorAndArgs};

#[cfg(test)]
mod tests;
