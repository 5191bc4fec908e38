//! Intrinsic object layout
//!
//! Embeds the storage of sub-objects inside the memory layout of their
//! container instead of pointing to separately allocated objects. Fields of
//! embedded objects then sit at fixed offsets from the container's header and
//! can be reached by dead reckoning.
//!
//! # Example
//!
//! ```rust
//! use intrinsic_layout::construct::{ConstructionContext, CycleGuard};
//! use intrinsic_layout::layout::LayoutConfig;
//! use intrinsic_layout::runtime::memory::Heap;
//! use intrinsic_layout::samples::Geometry;
//!
//! let geometry = Geometry::new(&LayoutConfig::default()).unwrap();
//! let types = geometry.types();
//! let mut heap = Heap::new();
//! let guard = CycleGuard::new();
//! let mut ctx = ConstructionContext::new(types, &mut heap, &guard);
//!
//! let t = geometry.triangle(&mut ctx, [(1, 1), (2, 2), (3, 3)]).unwrap();
//! let offset = types.dead_reckon(geometry.triangle, "l.p1.x").unwrap();
//! assert_eq!(offset, 24);
//! assert_eq!(types.read(&heap, t, "l.p1.x").unwrap().as_i32(), Some(1));
//! ```

#![warn(rust_2018_idioms)]

pub mod construct;
pub mod layout;
pub mod model;
pub mod runtime;
pub mod samples;
pub mod util;

// Re-exports
pub use construct::{
    BuildError, ConstructionContext, ConstructionRequest, Constructor, CtorAndArgs, CycleGuard,
    CycleResetPolicy, EmbedError,
};
pub use layout::{LayoutConfig, LayoutError, StructDecl, TypeRegistry, TypeSystem};
pub use model::SlotModel;
pub use runtime::memory::Heap;
pub use runtime::value::{ObjectRef, PrimitiveKind, TypeId, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "intrinsic-layout";
