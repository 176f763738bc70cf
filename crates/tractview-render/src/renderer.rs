//! Per-frame scene orchestration.
//!
//! [`SceneRenderer::render_frame`] updates the frustum, advances animation
//! and slice navigation, then runs the render passes in a fixed order:
//!
//! 1. volume slices (and the crosshair)
//! 2. spline surface
//! 3. point markers, in point mode
//! 4. vector glyphs
//! 5. color-map legend
//! 6. tensor glyphs
//! 7. ODF glyphs
//! 8. meshes and iso-surfaces, blended
//! 9. fibers
//! 10. selection box wireframes
//!
//! Opaque passes come before blended ones. GPU errors raised by a pass are
//! logged and counted but never stop the frame.

use glam::Vec4;
use tractview_core::{Context, Dataset, DatasetId, DatasetKind, DatasetRegistry, DatasetType, FrustumCache, Options};

use crate::backend::{GpuBackend, GpuVertex, RenderState, Topology};
use crate::binder::{PassUniforms, ShaderTextureBinder};
use crate::camera::Camera;
use crate::color_maps::ColorMapRegistry;
use crate::error::{RenderError, RenderResult};
use crate::geometry;

/// Render pass categories, in drawing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Slices,
    SplineSurface,
    Points,
    Vectors,
    Legend,
    Tensors,
    Odfs,
    Mesh,
    Fibers,
    SelectionObjects,
}

/// What happened during one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Passes that ran, in order.
    pub passes: Vec<PassKind>,
    pub draw_calls: usize,
    pub textures_bound: usize,
    pub gpu_errors: usize,
    /// Whether fiber visibility was recomputed from the selection tree.
    pub fiber_visibility_recomputed: bool,
}

/// Draws a [`Context`] through a [`GpuBackend`].
pub struct SceneRenderer {
    binder: Option<ShaderTextureBinder>,
    frustum: FrustumCache,
    color_maps: ColorMapRegistry,
}

impl Default for SceneRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneRenderer {
    /// Creates a renderer. It must be initialized before drawing.
    pub fn new() -> Self {
        Self {
            binder: None,
            frustum: FrustumCache::new(),
            color_maps: ColorMapRegistry::new(),
        }
    }

    /// Sets up the texture binder from the options.
    pub fn initialize(&mut self, options: &Options) {
        self.binder = Some(ShaderTextureBinder::new(options.max_bound_textures));
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.binder.is_some()
    }

    #[must_use]
    pub fn frustum(&self) -> &FrustumCache {
        &self.frustum
    }

    #[must_use]
    pub fn color_maps(&self) -> &ColorMapRegistry {
        &self.color_maps
    }

    pub fn color_maps_mut(&mut self) -> &mut ColorMapRegistry {
        &mut self.color_maps
    }

    /// Renders one frame of `ctx`.
    ///
    /// Returns [`RenderError::NotInitialized`] before [`Self::initialize`].
    /// Any other failure is logged and the frame continues.
    pub fn render_frame(&mut self, ctx: &mut Context, backend: &mut dyn GpuBackend) -> RenderResult<FrameStats> {
        let binder = self
            .binder
            .as_mut()
            .ok_or(RenderError::NotInitialized("texture binder"))?;
        let mut stats = FrameStats::default();

        let dims = ctx.registry.dims().unwrap_or_default();
        let depth = ctx.options.ortho_depth;
        let camera = Camera::from_view(&ctx.view, &dims, depth).with_animation(&ctx.view, &dims);
        self.frustum.update(&camera.projection, &camera.modelview);

        let clear = ctx.options.background_color.extend(1.0);
        binder.begin_frame(backend, &mut ctx.registry);
        backend.begin_frame(clear);
        if ctx.registry.is_empty() {
            finish(backend, &mut stats);
            return Ok(stats);
        }

        ctx.view.advance_rotation();
        let camera = Camera::from_view(&ctx.view, &dims, depth).with_animation(&ctx.view, &dims);
        backend.set_matrices(camera.projection, camera.modelview);

        ctx.view.advance_navigation(&dims);

        let mut frame = Frame {
            backend,
            binder,
            stats: &mut stats,
        };

        frame.pass(PassKind::Slices, |f| f.slices(ctx));
        frame.pass(PassKind::SplineSurface, |f| f.spline_surface(ctx));
        frame.pass(PassKind::Points, |f| f.points(ctx));
        frame.pass(PassKind::Vectors, |f| f.vectors(ctx));
        let color_maps = &self.color_maps;
        frame.pass(PassKind::Legend, |f| f.legend(ctx, color_maps, camera));
        frame.pass(PassKind::Tensors, |f| f.tensors(ctx));
        frame.pass(PassKind::Odfs, |f| f.odfs(ctx));
        frame.pass(PassKind::Mesh, |f| f.meshes(ctx));
        let frustum = &self.frustum;
        frame.pass(PassKind::Fibers, |f| f.fibers(ctx, frustum));
        ctx.selection.finish_frame();
        frame.pass(PassKind::SelectionObjects, |f| f.selection_objects(ctx));

        frame.backend.unbind_textures();
        frame.backend.set_render_state(RenderState::default());
        finish(frame.backend, frame.stats);
        Ok(stats)
    }
}

fn finish(backend: &mut dyn GpuBackend, stats: &mut FrameStats) {
    if let Err(e) = backend.end_frame() {
        log::warn!("frame submission failed: {e}");
        stats.gpu_errors += 1;
    }
}

/// First visible dataset in display order matching `pred`.
fn first_visible(registry: &DatasetRegistry, pred: impl Fn(&Dataset) -> bool) -> Option<(DatasetId, &Dataset)> {
    registry
        .order()
        .iter()
        .filter_map(|&id| registry.get(id).map(|d| (id, d)))
        .find(|(_, d)| d.status.visible && pred(d))
}

fn has_visible_surface(registry: &DatasetRegistry) -> bool {
    first_visible(registry, |d| d.kind() == DatasetKind::Surface).is_some()
}

/// Per-frame drawing state shared by the passes.
struct Frame<'a> {
    backend: &'a mut dyn GpuBackend,
    binder: &'a mut ShaderTextureBinder,
    stats: &'a mut FrameStats,
}

impl Frame<'_> {
    /// Runs a pass body. The body returns false when there was nothing to draw.
    fn pass(&mut self, kind: PassKind, body: impl FnOnce(&mut Self) -> bool) {
        if !body(self) {
            return;
        }
        self.stats.passes.push(kind);
        while let Some(e) = self.backend.take_error() {
            log::warn!("{kind:?} pass: {e}");
            self.stats.gpu_errors += 1;
        }
    }

    fn draw(&mut self, topology: Topology, vertices: &[GpuVertex]) {
        if vertices.is_empty() {
            return;
        }
        self.backend.draw(topology, vertices);
        self.stats.draw_calls += 1;
    }

    fn activate(&mut self, uniforms: PassUniforms) {
        self.binder.activate(self.backend, &uniforms);
    }

    fn slices(&mut self, ctx: &mut Context) -> bool {
        let view = &ctx.view;
        if !view.show_slices.iter().any(|&s| s) && !view.show_crosshair {
            return false;
        }
        let Some(dims) = ctx.registry.dims() else {
            return false;
        };
        let bound = self.binder.bind_visible_volume_textures(self.backend, &mut ctx.registry);
        self.stats.textures_bound = bound;
        let view = &ctx.view;
        if bound == 0 && !view.show_crosshair {
            return false;
        }

        if bound > 0 {
            self.backend.set_render_state(RenderState {
                blend: view.blend_alpha,
                alpha_test: !view.blend_alpha,
                ..RenderState::default()
            });
            self.activate(PassUniforms::Slices {
                use_color_map: view.use_color_map,
            });
            let quads = geometry::slice_quads(&dims, view.slices(), view.show_slices);
            self.draw(Topology::Triangles, &quads);
        }
        if view.show_crosshair {
            self.backend.set_render_state(RenderState::default());
            self.activate(PassUniforms::FixedFunction);
            self.draw(Topology::Lines, &geometry::crosshair(&dims, view.slices()));
        }
        true
    }

    fn spline_surface(&mut self, ctx: &Context) -> bool {
        let Some((_, surface)) = first_visible(&ctx.registry, |d| d.kind() == DatasetKind::Surface) else {
            return false;
        };
        let Some(mesh) = surface.mesh() else {
            return false;
        };
        let status = surface.status;
        let dims = ctx.registry.dims().unwrap_or_default();
        self.backend.set_render_state(RenderState {
            blend: status.alpha < ctx.options.opaque_alpha,
            lighting: ctx.view.lighting,
            ..RenderState::default()
        });
        self.activate(PassUniforms::SplineSurface {
            show_fs: status.show_fs,
            use_tex: status.use_tex,
            use_color_map: ctx.view.use_color_map,
            use_lic: status.use_lic,
        });
        let color = status.color.truncate().extend(status.alpha);
        self.draw(Topology::Triangles, &geometry::mesh_triangles(mesh, color, &dims));
        true
    }

    fn points(&mut self, ctx: &Context) -> bool {
        let view = &ctx.view;
        if !view.point_mode && !view.show_graph {
            return false;
        }
        let points = ctx
            .registry
            .iter()
            .find_map(|(_, d)| d.surface())
            .map(|s| s.points().to_vec())
            .unwrap_or_default();
        if points.is_empty() {
            return false;
        }
        if view.point_mode {
            self.backend.set_render_state(RenderState {
                lighting: view.lighting,
                ..RenderState::default()
            });
            self.activate(PassUniforms::FixedFunction);
            self.draw(Topology::Triangles, &geometry::point_markers(&points));
        }
        if view.show_graph && points.len() > 1 {
            self.backend.set_render_state(RenderState::default());
            self.activate(PassUniforms::Graph {
                global_color: Vec4::ZERO,
            });
            self.draw(Topology::Lines, &geometry::point_graph(&points));
        }
        true
    }

    fn vectors(&mut self, ctx: &Context) -> bool {
        let Some((_, dataset)) = first_visible(&ctx.registry, |d| d.dataset_type() == DatasetType::Vectors) else {
            return false;
        };
        let Some(volume) = dataset.volume() else {
            return false;
        };
        self.backend.set_render_state(RenderState::default());
        self.activate(PassUniforms::FixedFunction);
        let status = dataset.status;
        let lines = geometry::vector_glyphs(volume, ctx.view.slices().z, status.use_tex, status.color);
        self.draw(Topology::Lines, &lines);
        true
    }

    fn legend(&mut self, ctx: &Context, color_maps: &ColorMapRegistry, scene: Camera) -> bool {
        if !ctx.view.show_legend {
            return false;
        }
        let Some(map) = color_maps.get_or_default(&ctx.options.color_map) else {
            return false;
        };
        let dims = ctx.registry.dims().unwrap_or_default();
        let overlay = Camera::overlay(&dims);
        let (bar, ticks) = geometry::legend(dims.max_extent() as f32, map);

        self.backend.set_matrices(overlay.projection, overlay.modelview);
        self.backend.set_render_state(RenderState {
            depth_test: false,
            depth_write: false,
            ..RenderState::default()
        });
        self.activate(PassUniforms::Legend {
            use_color_map: ctx.view.use_color_map,
        });
        self.draw(Topology::Triangles, &bar);
        self.activate(PassUniforms::FixedFunction);
        self.draw(Topology::Lines, &ticks);
        self.backend.set_matrices(scene.projection, scene.modelview);
        true
    }

    fn tensors(&mut self, ctx: &Context) -> bool {
        let Some((_, dataset)) = first_visible(&ctx.registry, |d| d.kind() == DatasetKind::Tensors) else {
            return false;
        };
        let tractview_core::DatasetData::Tensors(field) = dataset.data() else {
            return false;
        };
        self.backend.set_render_state(RenderState::default());
        self.activate(PassUniforms::FixedFunction);
        self.draw(Topology::Lines, &geometry::tensor_glyphs(field, ctx.view.slices().z));
        true
    }

    fn odfs(&mut self, ctx: &Context) -> bool {
        let Some((_, dataset)) = first_visible(&ctx.registry, |d| d.kind() == DatasetKind::Odfs) else {
            return false;
        };
        let tractview_core::DatasetData::Odfs(field) = dataset.data() else {
            return false;
        };
        self.backend.set_render_state(RenderState::default());
        self.activate(PassUniforms::FixedFunction);
        self.draw(Topology::Lines, &geometry::odf_glyphs(field, ctx.view.slices().z));
        true
    }

    /// Meshes and iso-surfaces, blended. Nearly transparent meshes don't write
    /// depth so they cannot hide their own far side.
    fn meshes(&mut self, ctx: &Context) -> bool {
        let dims = ctx.registry.dims().unwrap_or_default();
        let cut_at_surface = has_visible_surface(&ctx.registry);
        let mut drew = false;
        for &id in ctx.registry.order() {
            let Some(dataset) = ctx.registry.get(id) else {
                continue;
            };
            if !dataset.status.visible || !matches!(dataset.kind(), DatasetKind::Mesh | DatasetKind::IsoSurface) {
                continue;
            }
            let Some(mesh) = dataset.mesh() else {
                continue;
            };
            let status = dataset.status;
            self.backend.set_render_state(RenderState {
                blend: true,
                depth_write: status.alpha >= ctx.options.opaque_alpha,
                lighting: ctx.view.lighting,
                ..RenderState::default()
            });
            self.activate(PassUniforms::Mesh {
                show_fs: status.show_fs,
                use_tex: status.use_tex,
                alpha: status.alpha,
                use_lic: status.use_lic,
                is_glyph: status.is_glyph,
                cut_at_surface,
                light_on: ctx.view.lighting,
            });
            let color = status.color.truncate().extend(status.alpha);
            self.draw(Topology::Triangles, &geometry::mesh_triangles(mesh, color, &dims));
            drew = true;
        }
        drew
    }

    /// Fiber tracts. Visibility is recomputed from the selection tree only
    /// when the selection changed since the last frame.
    fn fibers(&mut self, ctx: &mut Context, frustum: &FrustumCache) -> bool {
        let Some(id) = ctx.registry.fibers_id() else {
            return false;
        };
        if ctx.selection.is_changed() {
            let visible = match ctx.registry.get(id).and_then(Dataset::fibers) {
                Some(fibers) => ctx.selection.visible_fibers(fibers),
                None => return false,
            };
            if let Some(fibers) = ctx.registry.get_mut(id).and_then(Dataset::fibers_mut) {
                fibers.set_visible(visible);
                self.stats.fiber_visibility_recomputed = true;
            }
        }

        let Some(dataset) = ctx.registry.get(id) else {
            return false;
        };
        if !dataset.status.visible {
            return false;
        }
        let Some(fibers) = dataset.fibers() else {
            return false;
        };
        self.backend.set_render_state(RenderState::default());
        self.activate(PassUniforms::FixedFunction);
        self.draw(Topology::Lines, &geometry::fiber_lines(fibers, frustum.frustum()));
        true
    }

    fn selection_objects(&mut self, ctx: &Context) -> bool {
        if !ctx.view.show_objects || ctx.selection.is_empty() {
            return false;
        }
        let lines: Vec<GpuVertex> = ctx
            .selection
            .iter()
            .filter(|(_, b)| b.is_visible())
            .flat_map(|(_, b)| geometry::box_wireframe(b))
            .collect();
        self.backend.set_render_state(RenderState {
            blend: true,
            ..RenderState::default()
        });
        self.activate(PassUniforms::FixedFunction);
        self.draw(Topology::Lines, &lines);
        true
    }
}
