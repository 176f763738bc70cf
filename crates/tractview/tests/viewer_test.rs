//! A full viewer session against the recording backend.

use std::sync::Arc;

use tractview::*;

fn anatomy() -> LoadedPayload {
    let dims = VolumeDims::new(20, 20, 10);
    let volume = VolumeData::new(dims, VoxelFormat::Byte, vec![0.5; dims.voxel_count()]).unwrap();
    LoadedPayload::new(DatasetData::Anatomy(volume))
}

fn fibers() -> LoadedPayload {
    let bundle = FiberData::new((0..10).map(|i| {
        let y = i as f32 * 2.0;
        vec![Vec3::new(0.0, y, 5.0), Vec3::new(19.0, y, 5.0)]
    }));
    LoadedPayload::new(DatasetData::Fibers(bundle))
}

fn session_loader() -> Arc<InMemoryLoader> {
    let mut loader = InMemoryLoader::new();
    loader.insert("t1.nii", anatomy());
    loader.insert("tracts.fib", fibers());
    Arc::new(loader)
}

#[test]
fn test_viewer_session() {
    init_logging();
    let mut viewer = Viewer::with_loader(Options::default(), session_loader());

    // Fibers are admitted against the grid fixed by the anatomy volume
    viewer.open("t1.nii").unwrap();
    let results = viewer.open_many(["tracts.fib"]);
    assert!(results.iter().all(|r| r.is_ok()));
    assert!(viewer.context().fibers_loaded());
    let notifications = viewer.drain_notifications();
    assert!(notifications.contains(&Notification::DatasetListChanged));
    assert!(notifications.contains(&Notification::RepaintRequested));

    let mut backend = RecordingBackend::new();
    let stats = viewer.render(&mut backend).unwrap();
    assert!(stats.fiber_visibility_recomputed);
    assert!(stats.passes.contains(&PassKind::Fibers));
    assert!(stats.passes.contains(&PassKind::SelectionObjects));

    // Rotation changes the camera every frame
    viewer.context_mut().view.set_rotating(Axis::Y, true);
    let before = viewer.renderer().frustum().generation();
    for _ in 0..3 {
        viewer.render(&mut backend).unwrap();
    }
    assert!(viewer.renderer().frustum().generation() >= before + 2);
    assert_eq!(viewer.context().view.rotation().y, 3.0);
}

#[test]
fn test_scene_round_trip() {
    let dir = std::env::temp_dir().join(format!("tractview-viewer-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let scene = dir.join("session.scn");

    let mut viewer = Viewer::with_loader(Options::default(), session_loader());
    viewer.open("t1.nii").unwrap();
    viewer.open("tracts.fib").unwrap();
    let (master, _) = viewer.context().selection.groups().next().unwrap();
    viewer
        .context_mut()
        .selection
        .add_child(master, Vec3::new(10.0, 10.0, 5.0), Vec3::splat(3.0), true)
        .unwrap();
    viewer.save_scene(&scene).unwrap();

    let mut restored = Viewer::with_loader(Options::default(), session_loader());
    restored.open(&scene).unwrap();
    assert_eq!(restored.context().registry.len(), 2);
    assert!(restored.context().fibers_loaded());
    assert_eq!(restored.context().selection.len(), 2);
    let roles: Vec<BoxRole> = restored
        .context()
        .selection
        .iter()
        .map(|(_, b)| b.role())
        .collect();
    assert_eq!(roles, vec![BoxRole::Master, BoxRole::Not]);

    let mut backend = RecordingBackend::new();
    let stats = restored.render(&mut backend).unwrap();
    assert!(stats.fiber_visibility_recomputed);

    std::fs::remove_dir_all(&dir).ok();
}
