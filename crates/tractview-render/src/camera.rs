//! Camera matrices derived from the view state.

use glam::{Mat4, Vec3};
use tractview_core::{ViewState, VolumeDims};

/// Default half-depth of the orthographic volume.
pub const DEFAULT_ORTHO_DEPTH: f32 = 3000.0;

/// Projection and modelview for one frame.
///
/// Matrices follow the OpenGL convention (clip z in `[-1, 1]`); the wgpu
/// backend remaps depth when it uploads them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub projection: Mat4,
    pub modelview: Mat4,
}

impl Camera {
    /// Builds the scene camera.
    ///
    /// The view is an orthographic square as wide as the largest volume
    /// dimension. The volume is centered at the origin, oriented by the view
    /// transform, scaled by zoom, then moved to the middle of the square and
    /// offset by the pan.
    #[must_use]
    pub fn from_view(view: &ViewState, dims: &VolumeDims, depth: f32) -> Self {
        let size = dims.max_extent().max(1) as f32;
        let projection = Mat4::orthographic_rh_gl(0.0, size, 0.0, size, -depth, depth);

        let half = size / 2.0;
        let pan = view.pan();
        let extent = Vec3::new(dims.columns as f32, dims.rows as f32, dims.frames as f32);
        let modelview = Mat4::from_translation(Vec3::new(half + pan.x, half + pan.y, half))
            * Mat4::from_scale(Vec3::splat(view.zoom()))
            * view.transform()
            * Mat4::from_translation(-extent / 2.0);

        Self { projection, modelview }
    }

    /// Applies the running rotation animation on top of the modelview.
    #[must_use]
    pub fn with_animation(mut self, view: &ViewState, dims: &VolumeDims) -> Self {
        self.modelview *= view.animation_matrix(dims);
        self
    }

    /// Screen-space camera for 2D overlays such as the legend.
    #[must_use]
    pub fn overlay(dims: &VolumeDims) -> Self {
        let size = dims.max_extent().max(1) as f32;
        Self {
            projection: Mat4::orthographic_rh_gl(0.0, size, 0.0, size, -1.0, 1.0),
            modelview: Mat4::IDENTITY,
        }
    }

    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.modelview
    }
}
