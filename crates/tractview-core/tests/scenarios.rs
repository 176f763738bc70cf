//! End-to-end scenarios over the viewer context: loading, admission rules,
//! fiber selection, batches and scene files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tractview_core::{
    Context, DatasetData, DatasetKind, FiberData, InMemoryLoader, IsoSurfaceGenerator, LoadError,
    LoadRequest, LoadedPayload, MeshData, Notification, ParseError, ParseStage, RawVolumeLoader,
    SceneDocument, TractviewError, Vec3, VolumeData, VolumeDims, VoxelFormat,
};

fn anatomy(columns: u32, rows: u32, frames: u32) -> LoadedPayload {
    let dims = VolumeDims::new(columns, rows, frames);
    let volume = VolumeData::new(dims, VoxelFormat::Byte, vec![0.25; dims.voxel_count()]).unwrap();
    LoadedPayload::new(DatasetData::Anatomy(volume))
}

/// Ten straight fibers along x at y = 0..10, z = 5.
fn ladder() -> FiberData {
    FiberData::new((0..10).map(|i| {
        let y = i as f32;
        vec![Vec3::new(0.0, y, 5.0), Vec3::new(20.0, y, 5.0)]
    }))
}

/// A scratch directory unique to this test process and `name`.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tractview-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_raw_volume(dir: &Path, stem: &str, dims: VolumeDims) -> PathBuf {
    let header = serde_json::json!({
        "columns": dims.columns,
        "rows": dims.rows,
        "frames": dims.frames,
        "format": "byte",
    });
    let path = dir.join(format!("{stem}.hdr"));
    std::fs::write(&path, header.to_string()).unwrap();
    let voxels: Vec<u8> = (0..dims.voxel_count()).map(|i| (i % 256) as u8).collect();
    std::fs::write(dir.join(format!("{stem}.ima")), voxels).unwrap();
    path
}

#[test]
fn test_grid_mismatch_rejected_without_side_effects() {
    let mut ctx = Context::default();
    ctx.register(PathBuf::from("a.nii"), anatomy(64, 64, 32)).unwrap();
    ctx.drain_notifications();

    let err = ctx.register(PathBuf::from("b.nii"), anatomy(64, 64, 30)).unwrap_err();
    match err {
        LoadError::DimensionMismatch { expected, actual } => {
            assert_eq!((expected.frames, actual.frames), (32, 30));
        }
        other => panic!("expected a dimension mismatch, got {other:?}"),
    }
    assert_eq!(ctx.registry.len(), 1);
    assert_eq!(ctx.registry.dims(), Some(VolumeDims::new(64, 64, 32)));
    assert!(matches!(ctx.drain_notifications().as_slice(), [Notification::Status(_)]));
}

#[test]
fn test_duplicate_source_rejected() {
    let mut loader = InMemoryLoader::new();
    loader.insert("t1.nii", anatomy(8, 8, 8));
    let mut ctx = Context::default();

    ctx.load(&LoadRequest::new("t1.nii"), &loader).unwrap();
    let err = ctx.load(&LoadRequest::new("t1.nii"), &loader).unwrap_err();
    assert_eq!(err, LoadError::DuplicateSource(PathBuf::from("t1.nii")));
    assert_eq!(ctx.registry.len(), 1);
}

#[test]
fn test_fibers_need_anatomy_and_load_once() {
    let mut ctx = Context::default();
    let err = ctx
        .register(PathBuf::from("a.fib"), LoadedPayload::new(DatasetData::Fibers(ladder())))
        .unwrap_err();
    assert_eq!(err, LoadError::MissingPrerequisite(DatasetKind::Fibers));

    ctx.register(PathBuf::from("t1.nii"), anatomy(20, 20, 10)).unwrap();
    ctx.register(PathBuf::from("a.fib"), LoadedPayload::new(DatasetData::Fibers(ladder())))
        .unwrap();
    assert!(ctx.fibers_loaded());
    let err = ctx
        .register(PathBuf::from("b.fib"), LoadedPayload::new(DatasetData::Fibers(ladder())))
        .unwrap_err();
    assert_eq!(err, LoadError::AlreadyLoaded);
}

#[test]
fn test_not_child_excludes_fibers() {
    let mut ctx = Context::default();
    ctx.register(PathBuf::from("t1.nii"), anatomy(20, 20, 10)).unwrap();
    let fibers_id = ctx
        .register(PathBuf::from("a.fib"), LoadedPayload::new(DatasetData::Fibers(ladder())))
        .unwrap();
    ctx.selection.clear();

    // Master spans every fiber, the NOT child fibers 2, 3 and 4
    let master = ctx
        .selection
        .create_master(Vec3::new(10.0, 4.5, 5.0), Vec3::new(4.0, 10.0, 2.0));
    ctx.selection
        .add_child(master, Vec3::new(10.0, 3.0, 5.0), Vec3::new(4.0, 3.0, 2.0), true)
        .unwrap();

    let fibers = ctx.registry.get(fibers_id).unwrap().fibers().unwrap().clone();
    let visible = ctx.selection.visible_fibers(&fibers);
    let shown: Vec<usize> = (0..10).filter(|&i| visible[i]).collect();
    assert_eq!(shown, vec![0, 1, 5, 6, 7, 8, 9]);

    ctx.selection.set_active(master, false).unwrap();
    assert!(ctx.selection.visible_fibers(&fibers).iter().all(|&v| v));
}

#[test]
fn test_batch_registers_in_request_order() {
    let mut loader = InMemoryLoader::new();
    loader.insert("t1.nii", anatomy(20, 20, 10));
    loader.insert("a.fib", LoadedPayload::new(DatasetData::Fibers(ladder())));
    loader.insert_failure("bad.nii", ParseError::Data("truncated".into()));

    let mut ctx = Context::default();
    ctx.load(&LoadRequest::new("t1.nii"), &loader).unwrap();
    let requests = vec![
        LoadRequest::new("a.fib"),
        LoadRequest::new("bad.nii"),
        LoadRequest::new("t1.nii"),
    ];
    let batch = ctx.spawn_batch(requests, Arc::new(loader));
    assert_eq!(batch.len(), 3);
    let results = ctx.finish_batch(batch.wait());

    assert!(results[0].is_ok());
    assert!(matches!(
        &results[1],
        Err(LoadError::ParseFailure { stage: ParseStage::Data, .. })
    ));
    assert!(matches!(results[2], Err(LoadError::DuplicateSource(_))));
    assert!(ctx.fibers_loaded());
    assert_eq!(ctx.selection.fiber_count(), 10);
    assert_eq!(
        ctx.drain_notifications()
            .iter()
            .filter(|n| **n == Notification::RepaintRequested)
            .count(),
        1
    );
}

struct FixedMesh(Option<MeshData>);

impl IsoSurfaceGenerator for FixedMesh {
    fn generate(&self, _volume: &VolumeData, _iso_level: f32) -> Option<MeshData> {
        self.0.clone()
    }
}

#[test]
fn test_iso_surface_creation() {
    let mut ctx = Context::default();
    assert!(matches!(
        ctx.create_iso_surface(&FixedMesh(None)),
        Err(TractviewError::NoVolume)
    ));

    ctx.register(PathBuf::from("t1.nii"), anatomy(8, 8, 8)).unwrap();
    assert!(matches!(
        ctx.create_iso_surface(&FixedMesh(None)),
        Err(TractviewError::InvalidIsoSurface)
    ));

    let mesh = MeshData::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 2]]);
    let id = ctx.create_iso_surface(&FixedMesh(Some(mesh))).unwrap();
    let dataset = ctx.registry.get(id).unwrap();
    assert_eq!(dataset.kind(), DatasetKind::IsoSurface);
    assert_eq!(dataset.status.threshold, ctx.options.iso_level);
}

#[test]
fn test_scene_round_trip_through_files() {
    let dir = scratch_dir("scene");
    let dims = VolumeDims::new(16, 12, 6);
    let t1 = write_raw_volume(&dir, "t1", dims);
    let t2 = write_raw_volume(&dir, "t2", dims);

    let mut ctx = Context::default();
    ctx.open(&t1, &RawVolumeLoader).unwrap();
    ctx.open(&t2, &RawVolumeLoader).unwrap();
    let t2_id = ctx.registry.order()[0];
    ctx.registry.get_mut(t2_id).unwrap().status.alpha = 0.4;
    let master = ctx.selection.create_master(Vec3::new(8.0, 6.0, 3.0), Vec3::splat(2.0));
    ctx.selection
        .add_child(master, Vec3::new(8.0, 6.0, 3.0), Vec3::ONE, true)
        .unwrap();

    let scene = dir.join("session.scn");
    ctx.save_scene(&scene).unwrap();

    let mut restored = Context::default();
    restored.open(&scene, &RawVolumeLoader).unwrap();
    assert_eq!(restored.registry.len(), 2);
    assert_eq!(restored.registry.dims(), Some(dims));
    assert_eq!(restored.view.slices(), ctx.view.slices());
    assert_eq!(restored.selection.len(), 2);
    let alphas: Vec<f32> = restored
        .registry
        .iter()
        .map(|(_, d)| d.status.alpha)
        .collect();
    assert!(alphas.contains(&0.4));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_raw_volume_with_short_file_fails_at_data_stage() {
    let dir = scratch_dir("short");
    let path = write_raw_volume(&dir, "t1", VolumeDims::new(4, 4, 4));
    std::fs::write(dir.join("t1.ima"), [0_u8; 10]).unwrap();

    let mut ctx = Context::default();
    let err = ctx.load(&LoadRequest::new(&path), &RawVolumeLoader).unwrap_err();
    assert!(matches!(err, LoadError::ParseFailure { stage: ParseStage::Data, .. }));
    assert!(ctx.registry.is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_clear_resets_grid() {
    let mut ctx = Context::default();
    ctx.register(PathBuf::from("a.nii"), anatomy(8, 8, 8)).unwrap();
    ctx.clear();
    assert!(ctx.registry.dims().is_none());
    ctx.register(PathBuf::from("b.nii"), anatomy(4, 4, 4)).unwrap();
    assert_eq!(ctx.registry.dims(), Some(VolumeDims::new(4, 4, 4)));
}

#[test]
fn test_scene_lists_datasets_oldest_first() {
    let mut loader = InMemoryLoader::new();
    loader.insert("t1.nii", anatomy(20, 20, 10));
    loader.insert("t2.nii", anatomy(20, 20, 10));
    loader.insert("a.fib", LoadedPayload::new(DatasetData::Fibers(ladder())));

    let mut ctx = Context::default();
    for path in ["t1.nii", "t2.nii", "a.fib"] {
        ctx.load(&LoadRequest::new(path), &loader).unwrap();
    }

    let dir = scratch_dir("order");
    let scene = dir.join("order.scn");
    ctx.save_scene(&scene).unwrap();

    let doc = SceneDocument::load(&scene).unwrap();
    let saved: Vec<&Path> = doc.datasets.iter().map(|e| e.path.as_path()).collect();
    assert_eq!(saved, [Path::new("t1.nii"), Path::new("t2.nii"), Path::new("a.fib")]);

    let mut restored = Context::default();
    restored.load_scene(&scene, &loader).unwrap();
    let paths = |c: &Context| -> Vec<PathBuf> {
        c.registry.iter().map(|(_, d)| d.path().to_path_buf()).collect()
    };
    assert_eq!(paths(&restored), paths(&ctx));

    std::fs::remove_dir_all(&dir).ok();
}
