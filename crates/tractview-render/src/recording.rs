//! A backend that records commands instead of drawing.
//!
//! Used by tests to check pass order, bindings and uniforms without a GPU.

use std::collections::{HashSet, VecDeque};

use glam::{Mat4, UVec3, Vec4};
use tractview_core::TextureId;

use crate::backend::{GpuBackend, GpuVertex, ProgramKind, RenderState, TextureFilter, Topology, Uniform};
use crate::error::{RenderError, RenderResult};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginFrame,
    Upload { texture: TextureId, dims: UVec3 },
    Release(TextureId),
    BindTexture { unit: usize, texture: TextureId, filter: TextureFilter },
    UnbindTextures,
    UseProgram(Option<ProgramKind>),
    SetUniform(Uniform),
    SetRenderState(RenderState),
    SetMatrices { projection: Mat4, modelview: Mat4 },
    Draw { topology: Topology, vertex_count: usize },
    EndFrame,
}

/// Records every call into a command list.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<Command>,
    resident: HashSet<TextureId>,
    next_texture: u64,
    errors: VecDeque<String>,
    fail_uploads: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Number of draw calls recorded.
    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .count()
    }

    /// Textures uploaded and not yet released.
    #[must_use]
    pub fn resident_textures(&self) -> usize {
        self.resident.len()
    }

    /// Queues an error to be reported by the next `take_error`.
    pub fn inject_error(&mut self, message: impl Into<String>) {
        self.errors.push_back(message.into());
    }

    /// Makes every texture upload fail.
    pub fn set_fail_uploads(&mut self, fail: bool) {
        self.fail_uploads = fail;
    }
}

impl GpuBackend for RecordingBackend {
    fn begin_frame(&mut self, _clear_color: Vec4) {
        self.commands.push(Command::BeginFrame);
    }

    fn upload_volume_texture(&mut self, dims: UVec3, rgba: &[f32]) -> RenderResult<TextureId> {
        if self.fail_uploads {
            return Err(RenderError::TextureCreationFailed("uploads disabled".into()));
        }
        let expected = (dims.x * dims.y * dims.z * 4) as usize;
        if rgba.len() != expected {
            return Err(RenderError::TextureCreationFailed(format!(
                "expected {expected} floats, got {}",
                rgba.len()
            )));
        }
        self.next_texture += 1;
        let texture = TextureId(self.next_texture);
        self.resident.insert(texture);
        self.commands.push(Command::Upload { texture, dims });
        Ok(texture)
    }

    fn release_texture(&mut self, texture: TextureId) {
        self.resident.remove(&texture);
        self.commands.push(Command::Release(texture));
    }

    fn bind_texture_3d(&mut self, unit: usize, texture: TextureId, filter: TextureFilter) {
        self.commands.push(Command::BindTexture { unit, texture, filter });
    }

    fn unbind_textures(&mut self) {
        self.commands.push(Command::UnbindTextures);
    }

    fn use_program(&mut self, program: Option<ProgramKind>) {
        self.commands.push(Command::UseProgram(program));
    }

    fn set_uniform(&mut self, uniform: Uniform) {
        self.commands.push(Command::SetUniform(uniform));
    }

    fn set_render_state(&mut self, state: RenderState) {
        self.commands.push(Command::SetRenderState(state));
    }

    fn set_matrices(&mut self, projection: Mat4, modelview: Mat4) {
        self.commands.push(Command::SetMatrices { projection, modelview });
    }

    fn draw(&mut self, topology: Topology, vertices: &[GpuVertex]) {
        self.commands.push(Command::Draw {
            topology,
            vertex_count: vertices.len(),
        });
    }

    fn take_error(&mut self) -> Option<RenderError> {
        self.errors.pop_front().map(RenderError::Gpu)
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        self.commands.push(Command::EndFrame);
        Ok(())
    }
}
