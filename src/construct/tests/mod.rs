//! Construct 单元测试
//!
//! 测试循环守卫、构造分发器和数组构造

use crate::construct::{
    BuildError, ConstructionContext, ConstructionRequest, Constructor, CtorAndArgs, CycleGuard,
    CycleResetPolicy, EmbedError, PrimitiveArrayBuilder, ShapeMismatchDetail,
    StructuredArrayBuilder,
};
use crate::layout::{LayoutConfig, LayoutError, StructDecl, TypeRegistry, TypeSystem};
use crate::model::SlotModel;
use crate::runtime::memory::Heap;
use crate::runtime::value::{ObjectRef, PrimitiveKind, TypeId, Value};
use parking_lot::Mutex;
use std::sync::Arc;

struct Fixture {
    types: TypeSystem,
    point: TypeId,
    fixed: TypeId,
    longs: TypeId,
    ints: TypeId,
    points: TypeId,
    holder: TypeId,
    pair: TypeId,
    point_xy: Constructor,
    fixed_xy: Constructor,
    pair_v: Constructor,
    /// Guard contents observed by the `Point` default constructor
    seen: Arc<Mutex<Vec<Vec<String>>>>,
}

fn fixture(optimize_layout: bool) -> Fixture {
    use PrimitiveKind::{I32, I64};

    let mut registry = TypeRegistry::new();
    let point = registry
        .declare_struct(StructDecl::new("Point").field("x", I32).field("y", I32))
        .unwrap();
    let fixed = registry
        .declare_struct(StructDecl::new("FixedPoint").field("x", I32).field("y", I32))
        .unwrap();
    let broken = registry
        .declare_struct(StructDecl::new("Broken").field("x", I32))
        .unwrap();
    let longs = registry.declare_primitive_array("Longs", I64).unwrap();
    let ints = registry.declare_primitive_array("Ints", I32).unwrap();
    let points = registry.declare_structured_array("Points", "Point").unwrap();
    let holder = registry
        .declare_struct(
            StructDecl::new("Holder")
                .embedded("p", "Point")
                .embedded("q", "FixedPoint")
                .embedded("broken", "Broken")
                .embedded_primitive_array("values", "Longs", 4)
                .embedded_structured_array("points", "Points", 3),
        )
        .unwrap();
    let pair = registry
        .declare_struct(StructDecl::new("Pair").embedded("a", "Point").embedded("b", "Point"))
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    registry
        .default_constructor(point, move |scope, _| {
            log.lock().push(scope.in_progress());
            Ok(())
        })
        .unwrap();
    let point_xy = registry
        .constructor(point, [I32, I32], |scope, args| {
            scope.set("x", args[0])?;
            scope.set("y", args[1])
        })
        .unwrap();
    let fixed_xy = registry
        .constructor(fixed, [I32, I32], |scope, args| {
            scope.set("x", args[0])?;
            scope.set("y", args[1])
        })
        .unwrap();
    registry
        .default_constructor(broken, |_, _| Err(BuildError::constructor("boom")))
        .unwrap();

    let xy = point_xy.clone();
    let pair_v = registry
        .constructor(pair, [I32], move |scope, args| {
            scope.construct_slot("a", ConstructionRequest::with_args(&xy, [args[0], args[0]]))?;
            scope.construct_slot("b", ConstructionRequest::Default)?;
            Ok(())
        })
        .unwrap();

    let types = registry
        .finalize(&LayoutConfig { optimize_layout })
        .unwrap();
    Fixture {
        types,
        point,
        fixed,
        longs,
        ints,
        points,
        holder,
        pair,
        point_xy,
        fixed_xy,
        pair_v,
        seen,
    }
}

impl Fixture {
    fn slot(
        &self,
        name: &str,
    ) -> SlotModel {
        self.types.slot_model(self.holder, name).unwrap().clone()
    }
}

fn ints(values: &[i32]) -> Vec<Value> {
    values.iter().copied().map(Value::I32).collect()
}

#[cfg(test)]
mod guard_tests {
    use super::*;

    #[test]
    fn test_enter_and_leave() {
        let f = fixture(true);
        let guard = CycleGuard::new();
        let p = f.slot("p");
        {
            let _token = guard.enter(&p).unwrap();
            assert!(guard.contains(&p));
            assert_eq!(guard.len(), 1);
            assert_eq!(guard.in_progress(), vec!["Holder.p".to_string()]);
        }
        assert!(guard.is_empty());
    }

    #[test]
    fn test_reentry_is_a_cycle() {
        let f = fixture(true);
        let guard = CycleGuard::new();
        let (p, q) = (f.slot("p"), f.slot("q"));

        let _p = guard.enter(&p).unwrap();
        let _q = guard.enter(&q).unwrap();
        match guard.enter(&p) {
            Err(EmbedError::CycleDetected { slot, path }) => {
                assert_eq!(slot, "Holder.p");
                assert_eq!(path, vec!["Holder.p", "Holder.q", "Holder.p"]);
            }
            other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
        }
        // Full reset
        assert!(guard.is_empty());
    }

    #[test]
    fn test_subtree_reset_keeps_outer_entries() {
        let f = fixture(true);
        let guard = CycleGuard::with_policy(CycleResetPolicy::Subtree);
        assert_eq!(guard.policy(), CycleResetPolicy::Subtree);
        let (p, q, values) = (f.slot("p"), f.slot("q"), f.slot("values"));

        let _p = guard.enter(&p).unwrap();
        let q_token = guard.enter(&q).unwrap();
        let _values = guard.enter(&values).unwrap();
        let err = guard.enter(&q).err().unwrap();
        assert!(err.is_cycle());
        assert_eq!(guard.in_progress(), vec!["Holder.p".to_string()]);

        // Tokens of reset entries leave quietly
        drop(q_token);
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_slot_models_compare_by_slot() {
        let f = fixture(true);
        let p1 = f.slot("p");
        let p2 = f.types.slot_model(f.holder, "p").unwrap().clone();
        let a = f.types.slot_model(f.pair, "a").unwrap();
        assert_eq!(p1, p2);
        assert_ne!(&p1, a);
    }
}

#[cfg(test)]
mod dispatcher_tests {
    use super::*;

    #[test]
    fn test_construct_forms() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();

        let p = ctx
            .construct(
                holder,
                &f.slot("p"),
                ConstructionRequest::with_args(&f.point_xy, ints(&[3, 4])),
            )
            .unwrap();
        assert_eq!(p.ty, f.point);
        assert_eq!(p.offset, holder.offset + f.slot("p").location().offset);
        assert_eq!(f.types.read(ctx.heap(), holder, "p.y").unwrap(), Value::I32(4));

        let bundle = CtorAndArgs::new(&f.fixed_xy, ints(&[5, 6]));
        ctx.construct(holder, &f.slot("q"), bundle.into()).unwrap();
        assert_eq!(f.types.read(ctx.heap(), holder, "q.x").unwrap(), Value::I32(5));
        assert!(ctx.heap().header(p.offset).unwrap().is_constructed());
        assert!(guard.is_empty());
    }

    #[test]
    fn test_slot_cannot_be_constructed_twice() {
        for optimize_layout in [true, false] {
            let f = fixture(optimize_layout);
            let mut heap = Heap::new();
            let guard = CycleGuard::new();
            let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
            let holder = ctx
                .instantiate(f.holder, ConstructionRequest::Default)
                .unwrap();

            ctx.construct(holder, &f.slot("p"), ConstructionRequest::Default)
                .unwrap();
            let err = ctx
                .construct(holder, &f.slot("p"), ConstructionRequest::Default)
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    EmbedError::BuildFailure {
                        cause: BuildError::AlreadyConstructed { .. },
                        ..
                    }
                ),
                "{err}"
            );
            assert!(guard.is_empty());
        }
    }

    #[test]
    fn test_out_of_line_slot_gets_a_handle() {
        let f = fixture(false);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();

        let model = f.slot("p");
        let p = ctx
            .construct(
                holder,
                &model,
                ConstructionRequest::with_args(&f.point_xy, ints(&[1, 2])),
            )
            .unwrap();
        let handle = ctx
            .heap()
            .handle(holder.offset + model.location().offset)
            .unwrap();
        assert_eq!(handle, Some(p.offset));
        assert!(p.offset >= holder.offset + f.types.instance_size(f.holder).unwrap());
        assert_eq!(f.types.read(ctx.heap(), holder, "p.y").unwrap(), Value::I32(2));
    }

    #[test]
    fn test_container_must_match_slot() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let point = ctx
            .instantiate(f.point, ConstructionRequest::Default)
            .unwrap();

        let err = ctx
            .construct(point, &f.slot("p"), ConstructionRequest::Default)
            .unwrap_err();
        assert!(matches!(
            err,
            EmbedError::BuildFailure {
                cause: BuildError::ContainerMismatch { .. },
                ..
            }
        ));

        // A handle that lies about its type is caught by the header
        let forged = ObjectRef::new(f.holder, point.offset);
        match ctx.construct(forged, &f.slot("p"), ConstructionRequest::Default) {
            Err(EmbedError::BuildFailure {
                cause: BuildError::ContainerMismatch { expected, found },
                ..
            }) => {
                assert_eq!(expected, "Holder");
                assert_eq!(found, "Point");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(guard.is_empty());
    }

    #[test]
    fn test_constructor_of_another_type() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();

        let err = ctx
            .construct(
                holder,
                &f.slot("p"),
                ConstructionRequest::with_args(&f.fixed_xy, ints(&[1, 2])),
            )
            .unwrap_err();
        match err {
            EmbedError::ShapeMismatch {
                slot,
                detail: ShapeMismatchDetail::ConstructorClass { expected, found },
            } => {
                assert_eq!(slot, "Holder.p");
                assert_eq!(expected, "Point");
                assert_eq!(found, "FixedPoint");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Rejected before anything was touched; the slot is still free
        ctx.construct(holder, &f.slot("p"), ConstructionRequest::Default)
            .unwrap();
    }

    #[test]
    fn test_missing_default_constructor() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();

        let err = ctx
            .construct(holder, &f.slot("q"), ConstructionRequest::Default)
            .unwrap_err();
        assert!(matches!(
            err,
            EmbedError::BuildFailure {
                cause: BuildError::NoDefaultConstructor { ref ty },
                ..
            } if ty == "FixedPoint"
        ));
        assert!(guard.is_empty());
    }

    #[test]
    fn test_argument_checks() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();

        let err = ctx
            .construct(
                holder,
                &f.slot("p"),
                ConstructionRequest::with_args(&f.point_xy, ints(&[1])),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EmbedError::BuildFailure {
                cause: BuildError::Arity {
                    expected: 2,
                    found: 1,
                    ..
                },
                ..
            }
        ));

        let err = ctx
            .construct(
                holder,
                &f.slot("p"),
                ConstructionRequest::with_args(&f.point_xy, [Value::I64(1), Value::I32(2)]),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EmbedError::BuildFailure {
                cause: BuildError::ArgumentKind { index: 0, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_constructor_failure_is_reported() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();

        let err = ctx
            .construct(holder, &f.slot("broken"), ConstructionRequest::Default)
            .unwrap_err();
        assert_eq!(err.slot(), "Holder.broken");
        assert_eq!(err.to_string(), "failed to build Holder.broken: boom");
        assert!(guard.is_empty());
    }

    #[test]
    fn test_array_request_on_scalar_slot() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();

        let longs = PrimitiveArrayBuilder::new(f.types.primitive_array_model(f.longs, 4).unwrap());
        let err = ctx
            .construct(holder, &f.slot("p"), longs.into())
            .unwrap_err();
        assert!(matches!(
            err,
            EmbedError::ShapeMismatch {
                detail: ShapeMismatchDetail::NotPrimitiveArray,
                ..
            }
        ));

        let points =
            StructuredArrayBuilder::new(f.types.structured_array_model(f.points, 3).unwrap());
        let err = ctx
            .construct(holder, &f.slot("values"), points.into())
            .unwrap_err();
        assert!(matches!(
            err,
            EmbedError::ShapeMismatch {
                detail: ShapeMismatchDetail::NotStructuredArray,
                ..
            }
        ));
    }

    #[test]
    fn test_nested_construction_runs_inside_the_guard() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);

        let pair = ctx
            .instantiate(f.pair, ConstructionRequest::with_args(&f.pair_v, ints(&[9])))
            .unwrap();
        assert_eq!(f.types.read(ctx.heap(), pair, "a.x").unwrap(), Value::I32(9));
        assert_eq!(f.types.read(ctx.heap(), pair, "b.y").unwrap(), Value::I32(0));
        assert_eq!(
            f.seen.lock().last().cloned(),
            Some(vec!["Pair.b".to_string()])
        );
        assert!(guard.is_empty());
    }

    #[test]
    fn test_self_embedding_is_refused() {
        let mut registry = TypeRegistry::new();
        let node = registry
            .declare_struct(
                StructDecl::new("Node")
                    .field("v", PrimitiveKind::I32)
                    .embedded("next", "Node"),
            )
            .unwrap();
        registry
            .default_constructor(node, |scope, _| {
                scope.construct_slot("next", ConstructionRequest::Default)?;
                Ok(())
            })
            .unwrap();
        let types = registry.finalize(&LayoutConfig::default()).unwrap();

        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&types, &mut heap, &guard);
        match ctx.instantiate(node, ConstructionRequest::Default) {
            Err(EmbedError::CycleDetected { slot, path }) => {
                assert_eq!(slot, "Node.next");
                assert_eq!(path, vec!["Node.next", "Node.next"]);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
        assert!(guard.is_empty());
    }
}

#[cfg(test)]
mod instantiate_tests {
    use super::*;

    #[test]
    fn test_arrays_cannot_stand_alone() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);

        let err = ctx
            .instantiate(f.longs, ConstructionRequest::Default)
            .unwrap_err();
        assert!(matches!(
            err,
            EmbedError::ShapeMismatch {
                detail: ShapeMismatchDetail::FreeStandingArray,
                ..
            }
        ));

        let builder = PrimitiveArrayBuilder::new(f.types.primitive_array_model(f.longs, 4).unwrap());
        let err = ctx.instantiate(f.holder, builder.into()).unwrap_err();
        assert!(matches!(
            err,
            EmbedError::ShapeMismatch {
                detail: ShapeMismatchDetail::FreeStandingArray,
                ..
            }
        ));
    }

    #[test]
    fn test_instantiate_checks_constructor() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);

        let err = ctx
            .instantiate(f.point, ConstructionRequest::with_args(&f.fixed_xy, ints(&[1, 2])))
            .unwrap_err();
        assert!(matches!(
            err,
            EmbedError::ShapeMismatch {
                detail: ShapeMismatchDetail::ConstructorClass { .. },
                ..
            }
        ));

        let err = ctx
            .instantiate(f.fixed, ConstructionRequest::Default)
            .unwrap_err();
        assert!(matches!(
            err,
            EmbedError::BuildFailure {
                cause: BuildError::NoDefaultConstructor { .. },
                ..
            }
        ));

        let err = ctx
            .instantiate(TypeId(99), ConstructionRequest::Default)
            .unwrap_err();
        assert!(matches!(
            err,
            EmbedError::BuildFailure {
                cause: BuildError::Layout(LayoutError::UnknownTypeId(TypeId(99))),
                ..
            }
        ));
    }

    #[test]
    fn test_instantiate_allocates_fresh_objects() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);

        let a = ctx
            .instantiate(f.point, ConstructionRequest::with_args(&f.point_xy, ints(&[1, 2])))
            .unwrap();
        let b = ctx
            .instantiate(f.point, ConstructionRequest::Default)
            .unwrap();
        assert_ne!(a.offset, b.offset);
        assert!(ctx.heap().header(a.offset).unwrap().is_constructed());
        assert_eq!(ctx.heap().header(b.offset).unwrap().ty, Some(f.point));
        assert_eq!(ctx.heap().total_allocations(), 2);
    }
}

#[cfg(test)]
mod array_tests {
    use super::*;

    #[test]
    fn test_primitive_array_fill() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();

        let builder =
            PrimitiveArrayBuilder::new(f.types.primitive_array_model(f.longs, 4).unwrap()).fill(7i64);
        let values = ctx
            .construct(holder, &f.slot("values"), builder.into())
            .unwrap();
        assert_eq!(values.ty, f.longs);
        assert_eq!(ctx.heap().array_length(values.offset).unwrap(), 4);
        for index in 0..4 {
            assert_eq!(
                f.types
                    .read(ctx.heap(), holder, &format!("values[{index}]"))
                    .unwrap(),
                Value::I64(7)
            );
        }
        assert!(matches!(
            f.types.read(ctx.heap(), holder, "values[4]"),
            Err(LayoutError::IndexOutOfBounds { length: 4, .. })
        ));
    }

    #[test]
    fn test_default_request_on_array_slot() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();

        ctx.construct(holder, &f.slot("values"), ConstructionRequest::Default)
            .unwrap();
        assert_eq!(
            f.types.read(ctx.heap(), holder, "values[2]").unwrap(),
            Value::I64(0)
        );

        let points = ctx
            .construct(holder, &f.slot("points"), ConstructionRequest::Default)
            .unwrap();
        assert_eq!(ctx.heap().array_length(points.offset).unwrap(), 3);
        let second = f.types.resolve(ctx.heap(), holder, "points[1]").unwrap();
        assert_eq!(second.ty, f.point);
        assert!(ctx.heap().header(second.offset).unwrap().is_constructed());
    }

    #[test]
    fn test_primitive_array_shape_checks() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();
        let values = f.slot("values");

        let wrong_class = PrimitiveArrayBuilder::new(f.types.primitive_array_model(f.ints, 4).unwrap());
        match ctx.construct(holder, &values, wrong_class.into()) {
            Err(EmbedError::ShapeMismatch {
                detail: ShapeMismatchDetail::ArrayClass { expected, found },
                ..
            }) => {
                assert_eq!(expected, "Longs");
                assert_eq!(found, "Ints");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let wrong_length =
            PrimitiveArrayBuilder::new(f.types.primitive_array_model(f.longs, 5).unwrap());
        assert!(matches!(
            ctx.construct(holder, &values, wrong_length.into()),
            Err(EmbedError::ShapeMismatch {
                detail: ShapeMismatchDetail::ArrayModel,
                ..
            })
        ));

        let wrong_fill =
            PrimitiveArrayBuilder::new(f.types.primitive_array_model(f.longs, 4).unwrap()).fill(1i32);
        assert!(matches!(
            ctx.construct(holder, &values, wrong_fill.into()),
            Err(EmbedError::BuildFailure {
                cause: BuildError::Layout(LayoutError::KindMismatch { .. }),
                ..
            })
        ));
        assert!(guard.is_empty());
    }

    #[test]
    fn test_structured_array_per_index() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();

        let xy = f.point_xy.clone();
        let builder = StructuredArrayBuilder::new(f.types.structured_array_model(f.points, 3).unwrap())
            .element_ctor_provider(move |i| {
                CtorAndArgs::new(&xy, [Value::I32(i as i32), Value::I32(-(i as i32))])
            });
        ctx.construct(holder, &f.slot("points"), builder.into())
            .unwrap();

        for i in 0..3 {
            assert_eq!(
                f.types
                    .read(ctx.heap(), holder, &format!("points[{i}].x"))
                    .unwrap(),
                Value::I32(i)
            );
            assert_eq!(
                f.types
                    .read(ctx.heap(), holder, &format!("points[{i}].y"))
                    .unwrap(),
                Value::I32(-i)
            );
        }
        // Elements sit at a fixed stride inside the container
        assert_eq!(
            f.types.dead_reckon(f.holder, "points[2].y").unwrap(),
            f.slot("points").location().offset + 16 + 2 * 16 + 12
        );
    }

    #[test]
    fn test_structured_array_element_class_checks() {
        let f = fixture(true);
        let mut heap = Heap::new();
        let guard = CycleGuard::new();
        let mut ctx = ConstructionContext::new(&f.types, &mut heap, &guard);
        let holder = ctx
            .instantiate(f.holder, ConstructionRequest::Default)
            .unwrap();
        let model = f.types.structured_array_model(f.points, 3).unwrap();

        let uniform = StructuredArrayBuilder::new(model.clone())
            .element_ctor_and_args(&f.fixed_xy, ints(&[0, 0]));
        assert!(matches!(
            ctx.construct(holder, &f.slot("points"), uniform.into()),
            Err(EmbedError::ShapeMismatch {
                detail: ShapeMismatchDetail::ConstructorClass { .. },
                ..
            })
        ));

        let fixed_xy = f.fixed_xy.clone();
        let per_index = StructuredArrayBuilder::new(model)
            .element_ctor_provider(move |_| CtorAndArgs::new(&fixed_xy, ints(&[0, 0])));
        assert!(matches!(
            ctx.construct(holder, &f.slot("points"), per_index.into()),
            Err(EmbedError::BuildFailure {
                cause: BuildError::ConstructorClass { .. },
                ..
            })
        ));
        assert!(guard.is_empty());
    }
}
