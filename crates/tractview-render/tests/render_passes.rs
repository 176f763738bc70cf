//! Frame-level tests for the scene renderer, run against the recording backend.

use std::path::PathBuf;

use tractview_core::{
    Context, DatasetData, DatasetId, DatasetStatus, FiberData, LoadedPayload, MeshData, OdfField,
    TensorField, Vec3, VolumeData, VolumeDims, VoxelFormat,
};
use tractview_render::{
    Command, PassKind, ProgramKind, RecordingBackend, RenderState, SceneRenderer, Topology, Uniform,
};

fn dims() -> VolumeDims {
    VolumeDims::new(8, 8, 4)
}

fn anatomy() -> LoadedPayload {
    let values = vec![0.5; dims().voxel_count()];
    let volume = VolumeData::new(dims(), VoxelFormat::Byte, values).unwrap();
    LoadedPayload::new(DatasetData::Anatomy(volume))
}

fn triangle() -> MeshData {
    MeshData::new(
        vec![Vec3::new(1.0, 1.0, 1.0), Vec3::new(6.0, 1.0, 1.0), Vec3::new(1.0, 6.0, 1.0)],
        vec![[0, 1, 2]],
    )
}

/// Four fibers along x through the middle of the grid.
fn fibers() -> FiberData {
    FiberData::new((2..6).map(|y| {
        let y = y as f32;
        vec![Vec3::new(0.5, y, 2.0), Vec3::new(7.5, y, 2.0)]
    }))
}

fn register(ctx: &mut Context, path: &str, payload: LoadedPayload) -> DatasetId {
    ctx.register(PathBuf::from(path), payload).unwrap()
}

fn setup() -> (Context, SceneRenderer, RecordingBackend) {
    let ctx = Context::default();
    let mut renderer = SceneRenderer::new();
    renderer.initialize(&ctx.options);
    (ctx, renderer, RecordingBackend::new())
}

#[test]
fn test_pass_order() {
    let (mut ctx, mut renderer, mut backend) = setup();
    register(&mut ctx, "t1.hdr", anatomy());
    let tensors = TensorField::new(dims(), vec![[1.0, 0.0, 0.0, 0.5, 0.0, 0.25]; dims().voxel_count()]).unwrap();
    register(&mut ctx, "dti.ten", LoadedPayload::new(DatasetData::Tensors(tensors)));
    register(&mut ctx, "brain.mesh", LoadedPayload::new(DatasetData::Mesh(triangle())));
    register(&mut ctx, "tracts.fib", LoadedPayload::new(DatasetData::Fibers(fibers())));
    ctx.view.show_legend = true;

    let stats = renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(
        stats.passes,
        vec![
            PassKind::Slices,
            PassKind::Legend,
            PassKind::Tensors,
            PassKind::Mesh,
            PassKind::Fibers,
            PassKind::SelectionObjects,
        ]
    );
    assert_eq!(backend.commands().first(), Some(&Command::BeginFrame));
    assert_eq!(backend.commands().last(), Some(&Command::EndFrame));
    assert_eq!(stats.gpu_errors, 0);
}

#[test]
fn test_empty_scene_only_clears() {
    let (mut ctx, mut renderer, mut backend) = setup();
    for _ in 0..3 {
        let stats = renderer.render_frame(&mut ctx, &mut backend).unwrap();
        assert_eq!(stats.draw_calls, 0);
    }
    assert_eq!(backend.draw_count(), 0);
    assert!(!backend.commands().iter().any(|c| matches!(c, Command::UseProgram(_))));
}

#[test]
fn test_frustum_recomputed_only_on_camera_change() {
    let (mut ctx, mut renderer, mut backend) = setup();
    register(&mut ctx, "t1.hdr", anatomy());

    renderer.render_frame(&mut ctx, &mut backend).unwrap();
    renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(renderer.frustum().generation(), 1);

    ctx.view.set_zoom(2.0);
    renderer.render_frame(&mut ctx, &mut backend).unwrap();
    renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(renderer.frustum().generation(), 2);
}

#[test]
fn test_gpu_errors_do_not_abort_the_frame() {
    let (mut ctx, mut renderer, mut backend) = setup();
    register(&mut ctx, "t1.hdr", anatomy());
    register(&mut ctx, "brain.mesh", LoadedPayload::new(DatasetData::Mesh(triangle())));
    backend.inject_error("out of memory");
    backend.inject_error("invalid bind group");

    let stats = renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(stats.gpu_errors, 2);
    assert!(stats.passes.contains(&PassKind::Mesh));
    assert_eq!(backend.commands().last(), Some(&Command::EndFrame));
}

#[test]
fn test_at_most_ten_textures_bound() {
    let (mut ctx, mut renderer, mut backend) = setup();
    for i in 0..12 {
        register(&mut ctx, &format!("vol{i}.hdr"), anatomy());
    }

    let stats = renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(stats.textures_bound, 10);
    let uploads = backend
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::Upload { .. }))
        .count();
    assert_eq!(uploads, 10);
    assert_eq!(backend.resident_textures(), 10);
}

#[test]
fn test_translucent_mesh_does_not_write_depth() {
    let (mut ctx, mut renderer, mut backend) = setup();
    register(&mut ctx, "t1.hdr", anatomy());
    let mut payload = LoadedPayload::new(DatasetData::Mesh(triangle()));
    payload.status = Some(DatasetStatus {
        alpha: 0.5,
        ..DatasetStatus::default()
    });
    register(&mut ctx, "brain.mesh", payload);

    renderer.render_frame(&mut ctx, &mut backend).unwrap();
    let commands = backend.commands();
    let draw = commands
        .iter()
        .position(|c| matches!(c, Command::Draw { topology: Topology::Triangles, vertex_count: 3 }))
        .expect("mesh draw");
    let state = commands[..draw]
        .iter()
        .rev()
        .find_map(|c| match c {
            Command::SetRenderState(s) => Some(*s),
            _ => None,
        })
        .expect("render state before the mesh draw");
    assert_eq!(
        state,
        RenderState {
            blend: true,
            depth_write: false,
            lighting: true,
            ..RenderState::default()
        }
    );
}

#[test]
fn test_fiber_visibility_recomputed_only_after_selection_change() {
    let (mut ctx, mut renderer, mut backend) = setup();
    register(&mut ctx, "t1.hdr", anatomy());
    register(&mut ctx, "tracts.fib", LoadedPayload::new(DatasetData::Fibers(fibers())));
    let (master, _) = ctx.selection.groups().next().expect("default master box");

    let first = renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(first.fiber_visibility_recomputed);
    assert!(!ctx.selection.is_changed());

    let second = renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(!second.fiber_visibility_recomputed);

    ctx.selection.set_center(master, Vec3::new(4.0, 2.0, 2.0)).unwrap();
    let third = renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(third.fiber_visibility_recomputed);
    assert!(!ctx.selection.is_changed());
    assert!(ctx.selection.iter().all(|(_, b)| !b.is_dirty()));
}

#[test]
fn test_hidden_fibers_still_consume_selection_changes() {
    let (mut ctx, mut renderer, mut backend) = setup();
    register(&mut ctx, "t1.hdr", anatomy());
    let id = register(&mut ctx, "tracts.fib", LoadedPayload::new(DatasetData::Fibers(fibers())));
    ctx.registry.get_mut(id).unwrap().status.visible = false;

    let stats = renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(stats.fiber_visibility_recomputed);
    assert!(!stats.passes.contains(&PassKind::Fibers));
    assert!(!ctx.selection.is_changed());
}

#[test]
fn test_unloaded_textures_released_on_next_frame() {
    let (mut ctx, mut renderer, mut backend) = setup();
    let id = register(&mut ctx, "t1.hdr", anatomy());
    renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(backend.resident_textures(), 1);

    assert!(ctx.unload(id));
    backend.clear();
    renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(matches!(backend.commands()[0], Command::Release(_)));
    assert_eq!(backend.resident_textures(), 0);
    assert_eq!(backend.draw_count(), 0);
}

#[test]
fn test_navigation_advances_one_slice_per_frame() {
    let (mut ctx, mut renderer, mut backend) = setup();
    register(&mut ctx, "t1.hdr", anatomy());
    let start = ctx.view.slices().z;
    ctx.view.set_navigating(tractview_core::Axis::Z, true);

    renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(ctx.view.slices().z, (start + 1) % 4);
    renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(ctx.view.slices().z, (start + 2) % 4);
}

#[test]
fn test_mesh_with_out_of_range_indices_still_draws() {
    let (mut ctx, mut renderer, mut backend) = setup();
    register(&mut ctx, "t1.hdr", anatomy());
    let mut mesh = triangle();
    mesh.triangles.insert(0, [0, 1, 7]);
    register(&mut ctx, "broken.mesh", LoadedPayload::new(DatasetData::Mesh(mesh)));

    let stats = renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(stats.passes.contains(&PassKind::Mesh));
    assert!(backend
        .commands()
        .iter()
        .any(|c| *c == Command::Draw { topology: Topology::Triangles, vertex_count: 3 }));
    assert_eq!(backend.commands().last(), Some(&Command::EndFrame));
}

#[test]
fn test_empty_glyph_fields_draw_nothing() {
    let (mut ctx, mut renderer, mut backend) = setup();
    register(&mut ctx, "t1.hdr", anatomy());
    let tensors = TensorField::new(dims(), vec![[0.0; 6]; dims().voxel_count()]).unwrap();
    register(&mut ctx, "zero.ten", LoadedPayload::new(DatasetData::Tensors(tensors)));
    let odfs = OdfField::new(dims(), Vec::new(), Vec::new()).unwrap();
    register(&mut ctx, "empty.odf", LoadedPayload::new(DatasetData::Odfs(odfs)));

    let stats = renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(stats.gpu_errors, 0);
    assert!(!backend
        .commands()
        .iter()
        .any(|c| matches!(c, Command::Draw { topology: Topology::Lines, .. })));
}

#[test]
fn test_zero_size_grid_renders() {
    let (mut ctx, mut renderer, mut backend) = setup();
    let empty = VolumeData::new(VolumeDims::new(0, 0, 0), VoxelFormat::Byte, Vec::new()).unwrap();
    register(&mut ctx, "empty.hdr", LoadedPayload::new(DatasetData::Anatomy(empty)));
    ctx.view.set_navigating(tractview_core::Axis::Z, true);

    let stats = renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(stats.passes.first(), Some(&PassKind::Slices));
    assert_eq!(ctx.view.slices().z, 0);
    assert_eq!(backend.commands().last(), Some(&Command::EndFrame));
}

#[test]
fn test_point_graph_uses_graph_program() {
    let (mut ctx, mut renderer, mut backend) = setup();
    register(&mut ctx, "t1.hdr", anatomy());
    ctx.set_spline_points(vec![
        Vec3::new(4.0, 1.0, 1.0),
        Vec3::new(4.0, 6.0, 1.0),
        Vec3::new(4.0, 1.0, 3.0),
    ])
    .unwrap();
    ctx.view.show_graph = true;

    let stats = renderer.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(stats.passes.contains(&PassKind::Points));
    let commands = backend.commands();
    let graph = commands
        .iter()
        .position(|c| *c == Command::UseProgram(Some(ProgramKind::Graph)))
        .expect("graph program");
    assert_eq!(commands[graph + 1], Command::SetUniform(Uniform::Color(tractview_core::Vec4::ZERO)));
    assert!(commands[graph..]
        .iter()
        .any(|c| *c == Command::Draw { topology: Topology::Lines, vertex_count: 6 }));
}
