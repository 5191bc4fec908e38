use intrinsic_layout::construct::{ConstructionContext, ConstructionRequest, CycleGuard};
use intrinsic_layout::layout::{LayoutConfig, LayoutError, StructDecl, TypeRegistry, TypeSystem};
use intrinsic_layout::{Heap, PrimitiveKind, TypeId, Value};

const DEPTH: usize = 6;

/// `Level0` embeds `Level1` embeds ... `Level5`, each with a byte and a long
fn nested(config: &LayoutConfig) -> (TypeSystem, TypeId) {
    let mut registry = TypeRegistry::new();
    for level in 0..DEPTH {
        let mut decl = StructDecl::new(format!("Level{level}"))
            .field("tag", PrimitiveKind::I8)
            .field("value", PrimitiveKind::I64);
        if level + 1 < DEPTH {
            decl = decl.embedded("inner", format!("Level{}", level + 1));
        }
        let ty = registry.declare_struct(decl).unwrap();
        if level + 1 < DEPTH {
            registry
                .default_constructor(ty, |this, _| {
                    this.construct_slot("inner", ConstructionRequest::Default)?;
                    Ok(())
                })
                .unwrap();
        }
    }
    let types = registry.finalize(config).unwrap();
    let top = types.type_id("Level0").unwrap();
    (types, top)
}

fn path_to(depth: usize, field: &str) -> String {
    let mut path = "inner.".repeat(depth);
    path.push_str(field);
    path
}

#[test]
fn test_nested_offsets() {
    let (types, top) = nested(&LayoutConfig::default());

    // Innermost: header, tag @8, value @16 -> 24 bytes; every outer level adds 24
    assert_eq!(types.instance_size(top), Some(24 * DEPTH));
    for depth in 0..DEPTH {
        assert_eq!(
            types.dead_reckon(top, &path_to(depth, "value")).unwrap(),
            24 * depth + 16
        );
    }
}

#[test]
fn test_dead_reckoning_matches_path_walk() {
    let (types, top) = nested(&LayoutConfig::default());
    let mut heap = Heap::new();
    let guard = CycleGuard::new();
    let mut ctx = ConstructionContext::new(&types, &mut heap, &guard);
    let obj = ctx
        .instantiate(top, ConstructionRequest::Default)
        .unwrap();

    for depth in 0..DEPTH {
        let path = path_to(depth, "value");
        types
            .write(ctx.heap_mut(), obj, &path, Value::I64(depth as i64 * 100))
            .unwrap();
    }
    for depth in 0..DEPTH {
        let offset = types.dead_reckon(top, &path_to(depth, "value")).unwrap();
        assert_eq!(
            ctx.heap()
                .read_value(obj.offset + offset, PrimitiveKind::I64)
                .unwrap(),
            Value::I64(depth as i64 * 100)
        );
    }
}

#[test]
fn test_out_of_line_levels_need_the_heap() {
    let (types, top) = nested(&LayoutConfig {
        optimize_layout: false,
    });
    assert!(matches!(
        types.dead_reckon(top, "inner.value"),
        Err(LayoutError::NotInline { slot }) if slot == "Level0.inner"
    ));
    // Fields of the object itself are still fixed
    assert_eq!(types.dead_reckon(top, "value").unwrap(), 16);

    let mut heap = Heap::new();
    let guard = CycleGuard::new();
    let mut ctx = ConstructionContext::new(&types, &mut heap, &guard);
    let obj = ctx
        .instantiate(top, ConstructionRequest::Default)
        .unwrap();
    let deepest = path_to(DEPTH - 1, "value");
    types
        .write(ctx.heap_mut(), obj, &deepest, Value::I64(42))
        .unwrap();
    assert_eq!(
        types.read(ctx.heap(), obj, &deepest).unwrap(),
        Value::I64(42)
    );
    assert_eq!(ctx.heap().total_allocations(), DEPTH);
}

#[test]
fn test_paths_that_do_not_exist() {
    let (types, top) = nested(&LayoutConfig::default());
    assert!(matches!(
        types.dead_reckon(top, &path_to(DEPTH, "value")),
        Err(LayoutError::UnknownField { .. })
    ));
    assert!(matches!(
        types.dead_reckon(top, "inner.tag.x"),
        Err(LayoutError::UnknownField { .. })
    ));
    assert!(matches!(
        types.dead_reckon(top, "inner[0]"),
        Err(LayoutError::NotAnArray { .. })
    ));
    assert!(matches!(
        types.dead_reckon(top, "inner."),
        Err(LayoutError::BadPath { .. })
    ));
}
