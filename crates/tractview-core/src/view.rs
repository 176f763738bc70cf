//! Camera and navigation state shared by input handling and the renderer.

use glam::{Mat4, UVec3, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::dataset::VolumeDims;

/// Smallest zoom factor.
pub const MIN_ZOOM: f32 = 1.0;
/// Largest zoom factor.
pub const MAX_ZOOM: f32 = 10.0;

/// Anatomical axis. X runs along columns (sagittal slices), Y along rows
/// (coronal slices), Z along frames (axial slices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn unit(self) -> Vec3 {
        match self {
            Self::X => Vec3::X,
            Self::Y => Vec3::Y,
            Self::Z => Vec3::Z,
        }
    }

    /// Grid count along this axis.
    #[must_use]
    pub fn extent(self, dims: &VolumeDims) -> u32 {
        match self {
            Self::X => dims.columns,
            Self::Y => dims.rows,
            Self::Z => dims.frames,
        }
    }
}

/// Wraps an angle in degrees into `[0, 360)`.
#[must_use]
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Zoom, pan, orientation, animation and slice position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    zoom: f32,
    pan: Vec2,
    transform: Mat4,
    rotation: Vec3,
    rotating: [bool; 3],
    navigating: [bool; 3],
    slices: UVec3,
    /// Degrees added per frame on each rotating axis.
    pub rotation_step: f32,
    /// Axial, coronal and sagittal slice visibility, indexed by [`Axis`].
    pub show_slices: [bool; 3],
    pub show_crosshair: bool,
    /// Spline point editing: draws the control points.
    pub point_mode: bool,
    /// Connects every pair of spline control points with a line.
    pub show_graph: bool,
    /// Draws selection box wireframes.
    pub show_objects: bool,
    pub show_legend: bool,
    pub use_color_map: bool,
    /// Blend slices instead of alpha-testing them.
    pub blend_alpha: bool,
    pub lighting: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: MIN_ZOOM,
            pan: Vec2::ZERO,
            transform: Mat4::IDENTITY,
            rotation: Vec3::ZERO,
            rotating: [false; 3],
            navigating: [false; 3],
            slices: UVec3::ZERO,
            rotation_step: 1.0,
            show_slices: [true; 3],
            show_crosshair: false,
            point_mode: false,
            show_graph: false,
            show_objects: true,
            show_legend: false,
            use_color_map: false,
            blend_alpha: false,
            lighting: true,
        }
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Zooms in for `direction >= 0`, out otherwise.
    ///
    /// The step is a tenth of the integer part of the current zoom, so zooming
    /// speeds up as the view gets closer.
    pub fn zoom_step(&mut self, direction: f32) {
        let delta = self.zoom.floor() * 0.1;
        self.zoom = if direction >= 0.0 {
            (self.zoom + delta).min(MAX_ZOOM)
        } else {
            (self.zoom - delta).max(MIN_ZOOM)
        };
    }

    /// Sets the zoom, clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    #[must_use]
    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    /// Drags the scene by a screen-space offset.
    pub fn move_scene(&mut self, dx: f32, dy: f32) {
        self.pan.x -= dx;
        self.pan.y += dy;
    }

    /// User-controlled orientation (arcball result).
    #[must_use]
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Animation angles in degrees, each in `[0, 360)`.
    #[must_use]
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn set_rotating(&mut self, axis: Axis, on: bool) {
        self.rotating[axis.index()] = on;
    }

    #[must_use]
    pub fn is_rotating(&self, axis: Axis) -> bool {
        self.rotating[axis.index()]
    }

    pub fn set_navigating(&mut self, axis: Axis, on: bool) {
        self.navigating[axis.index()] = on;
    }

    #[must_use]
    pub fn is_navigating(&self, axis: Axis) -> bool {
        self.navigating[axis.index()]
    }

    /// Advances the rotation of every rotating axis by one step.
    ///
    /// Returns true if any angle changed.
    pub fn advance_rotation(&mut self) -> bool {
        let mut changed = false;
        for axis in Axis::ALL {
            if self.rotating[axis.index()] {
                let angle = &mut self.rotation[axis.index()];
                *angle = wrap_degrees(*angle + self.rotation_step);
                changed = true;
            }
        }
        changed
    }

    /// Rotation about the grid center for the rotating axes.
    #[must_use]
    pub fn animation_matrix(&self, dims: &VolumeDims) -> Mat4 {
        let center = dims.extent() * dims.voxel * 0.5;
        let mut m = Mat4::IDENTITY;
        for axis in Axis::ALL {
            if self.rotating[axis.index()] {
                let angle = self.rotation[axis.index()].to_radians();
                m = m
                    * Mat4::from_translation(center)
                    * Mat4::from_axis_angle(axis.unit(), angle)
                    * Mat4::from_translation(-center);
            }
        }
        m
    }

    /// Moves every navigating slice forward by one, wrapping to 0 past the end.
    ///
    /// Returns true if any slice changed.
    pub fn advance_navigation(&mut self, dims: &VolumeDims) -> bool {
        let mut changed = false;
        for axis in Axis::ALL {
            if self.navigating[axis.index()] {
                let next = self.slices[axis.index()] + 1;
                self.slices[axis.index()] = if next >= axis.extent(dims) { 0 } else { next };
                changed = true;
            }
        }
        changed
    }

    #[must_use]
    pub fn slices(&self) -> UVec3 {
        self.slices
    }

    /// Sets the slice position, clamping each index into the grid.
    pub fn set_slices(&mut self, slices: UVec3, dims: &VolumeDims) {
        let last = dims.as_uvec3().saturating_sub(UVec3::ONE);
        self.slices = slices.min(last);
    }

    /// Moves the slices to the middle of the grid.
    pub fn center_slices(&mut self, dims: &VolumeDims) {
        self.set_slices(dims.as_uvec3() / 2, dims);
    }
}
