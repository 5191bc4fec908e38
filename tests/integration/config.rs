use intrinsic_layout::construct::{
    BuildError, ConstructionContext, CycleGuard, CycleResetPolicy, EmbedError,
};
use intrinsic_layout::layout::LayoutError;
use intrinsic_layout::runtime::memory::MemoryError;
use intrinsic_layout::samples::{Geometry, TriangleOffsets};
use intrinsic_layout::util::config::{load_config, load_or_default, EmbedConfig};
use intrinsic_layout::Heap;
use std::fs;

#[test]
fn test_config_file_drives_layout_and_guard() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layout.toml");
    fs::write(
        &path,
        "[layout]\noptimize_layout = false\n\n[guard]\nreset_policy = \"subtree\"\n",
    )
    .unwrap();

    let config = load_or_default(Some(path.as_path())).unwrap();
    assert_eq!(config.guard.reset_policy, CycleResetPolicy::Subtree);

    let geometry = Geometry::new(&config.layout).unwrap();
    assert!(!geometry.types().optimize_layout());
    assert!(matches!(
        TriangleOffsets::new(&geometry),
        Err(LayoutError::NotInline { .. })
    ));

    let guard = CycleGuard::with_policy(config.guard.reset_policy);
    let mut heap = Heap::with_config(&config.heap);
    let mut ctx = ConstructionContext::new(geometry.types(), &mut heap, &guard);
    geometry
        .triangle(&mut ctx, [(1, 1), (2, 2), (3, 3)])
        .unwrap();
}

#[test]
fn test_heap_limit_from_config() {
    let config = EmbedConfig::from_toml_str("[heap]\ninitial_capacity = 64\nmax_capacity = 128\n")
        .unwrap();
    let geometry = Geometry::new(&config.layout).unwrap();
    let guard = CycleGuard::new();
    let mut heap = Heap::with_config(&config.heap);
    let mut ctx = ConstructionContext::new(geometry.types(), &mut heap, &guard);

    // 8 reserved bytes + 64 per triangle: the second one no longer fits
    geometry
        .triangle(&mut ctx, [(1, 1), (2, 2), (3, 3)])
        .unwrap();
    let err = geometry
        .triangle(&mut ctx, [(1, 1), (2, 2), (3, 3)])
        .unwrap_err();
    assert!(matches!(
        err,
        EmbedError::BuildFailure {
            cause: BuildError::Memory(MemoryError::OutOfMemory { limit: 128, .. }),
            ..
        }
    ));
    assert!(guard.is_empty());
}

#[test]
fn test_written_config_loads_back() {
    let mut config = EmbedConfig::default();
    config.layout.optimize_layout = false;
    config.heap.max_capacity = 1 << 20;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("written.toml");
    fs::write(&path, config.to_toml_string().unwrap()).unwrap();
    assert_eq!(load_config(&path).unwrap(), config);
}
