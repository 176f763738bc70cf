//! The GPU seam.
//!
//! The scene renderer talks to the GPU only through [`GpuBackend`]. The wgpu
//! implementation draws for real; the recording implementation captures the
//! command stream for tests.

use glam::{Mat4, UVec3, Vec3, Vec4};
use tractview_core::TextureId;

use crate::error::{RenderError, RenderResult};

/// Texture filtering used when sampling a bound volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// Shader program of a render pass. Passes without one use the flat program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Slices,
    Mesh,
    SplineSurface,
    Legend,
    Graph,
}

/// Kind of texture content, so the slice shader knows how to color it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureContent {
    /// Gray intensities.
    Scalar,
    /// Float overlay, colored through the color map.
    Overlay,
    /// Precomputed colors.
    Color,
}

/// A uniform value pushed to the active program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Uniform {
    UseColorMap(bool),
    UseTex(bool),
    ShowFs(bool),
    UseLic(bool),
    IsGlyph(bool),
    CutAtSurface(bool),
    LightOn(bool),
    Alpha(f32),
    Color(Vec4),
    TextureCount(u32),
    TextureThreshold { unit: usize, value: f32 },
    TextureAlpha { unit: usize, value: f32 },
    TextureContent { unit: usize, content: TextureContent },
}

/// Fixed-function state for subsequent draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderState {
    pub blend: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    /// Discard fully transparent fragments.
    pub alpha_test: bool,
    pub lighting: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            blend: false,
            depth_test: true,
            depth_write: true,
            alpha_test: false,
            lighting: false,
        }
    }
}

/// Primitive assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    Lines,
}

/// Vertex layout shared by every program.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
    /// Normalized volume coordinate for texture lookups.
    pub texcoord: [f32; 3],
}

impl GpuVertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 4] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x4, 3 => Float32x3];

    #[must_use]
    pub fn new(position: Vec3, normal: Vec3, color: Vec4, texcoord: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            color: color.to_array(),
            texcoord: texcoord.to_array(),
        }
    }

    /// A vertex with color only, for lines and overlays.
    #[must_use]
    pub fn colored(position: Vec3, color: Vec4) -> Self {
        Self::new(position, Vec3::Z, color, Vec3::ZERO)
    }

    /// Vertex buffer layout for pipelines.
    #[must_use]
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Operations the scene renderer needs from a GPU.
pub trait GpuBackend {
    /// Starts a frame, clearing color and depth.
    fn begin_frame(&mut self, clear_color: Vec4);

    /// Uploads an RGBA volume of size `dims`, returning its handle.
    fn upload_volume_texture(&mut self, dims: UVec3, rgba: &[f32]) -> RenderResult<TextureId>;

    /// Frees a texture. Unknown handles are ignored.
    fn release_texture(&mut self, texture: TextureId);

    /// Binds a volume texture to `unit`.
    fn bind_texture_3d(&mut self, unit: usize, texture: TextureId, filter: TextureFilter);

    /// Unbinds every texture unit.
    fn unbind_textures(&mut self);

    /// Activates a program; `None` selects the flat program.
    fn use_program(&mut self, program: Option<ProgramKind>);

    fn set_uniform(&mut self, uniform: Uniform);

    fn set_render_state(&mut self, state: RenderState);

    fn set_matrices(&mut self, projection: Mat4, modelview: Mat4);

    fn draw(&mut self, topology: Topology, vertices: &[GpuVertex]);

    /// Returns the oldest error raised since the last call, if any.
    fn take_error(&mut self) -> Option<RenderError>;

    /// Finishes the frame and submits the work.
    fn end_frame(&mut self) -> RenderResult<()>;
}
