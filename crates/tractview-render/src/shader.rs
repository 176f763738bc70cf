//! WGSL shader sources and module assembly.

use crate::backend::ProgramKind;
use crate::error::{RenderError, RenderResult};

/// Uniform block, bindings and helpers shared by every shader.
pub const COMMON_SOURCE: &str = include_str!("shaders/common.wgsl");
pub const SLICES_SOURCE: &str = include_str!("shaders/slices.wgsl");
pub const MESH_SOURCE: &str = include_str!("shaders/mesh.wgsl");
pub const FLAT_SOURCE: &str = include_str!("shaders/flat.wgsl");

/// Shader module backing one or more programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    /// Volume slices, compositing every bound texture.
    Slices,
    /// Lit, optionally textured triangles: meshes and the spline surface.
    Mesh,
    /// Vertex colors: glyphs, fibers, wireframes, legend, graph.
    Flat,
}

impl ShaderKind {
    pub const ALL: [Self; 3] = [Self::Slices, Self::Mesh, Self::Flat];

    #[must_use]
    pub fn for_program(program: Option<ProgramKind>) -> Self {
        match program {
            Some(ProgramKind::Slices) => Self::Slices,
            Some(ProgramKind::Mesh | ProgramKind::SplineSurface) => Self::Mesh,
            Some(ProgramKind::Legend | ProgramKind::Graph) | None => Self::Flat,
        }
    }

    #[must_use]
    pub fn source(self) -> &'static str {
        match self {
            Self::Slices => SLICES_SOURCE,
            Self::Mesh => MESH_SOURCE,
            Self::Flat => FLAT_SOURCE,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Slices => "slices shader",
            Self::Mesh => "mesh shader",
            Self::Flat => "flat shader",
        }
    }
}

/// Builder for shader modules.
pub struct ShaderBuilder {
    common_source: Option<String>,
    vertex_source: Option<String>,
    fragment_source: Option<String>,
    label: Option<String>,
}

impl ShaderBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            common_source: None,
            vertex_source: None,
            fragment_source: None,
            label: None,
        }
    }

    /// Builder for one of the built-in shaders, with the common block prepended.
    #[must_use]
    pub fn for_kind(kind: ShaderKind) -> Self {
        Self::new()
            .with_common(COMMON_SOURCE)
            .with_vertex(kind.source())
            .with_fragment(kind.source())
            .with_label(kind.label())
    }

    /// Sets declarations prepended to both stages.
    pub fn with_common(mut self, source: impl Into<String>) -> Self {
        self.common_source = Some(source.into());
        self
    }

    /// Sets the vertex shader source (WGSL).
    pub fn with_vertex(mut self, source: impl Into<String>) -> Self {
        self.vertex_source = Some(source.into());
        self
    }

    /// Sets the fragment shader source (WGSL).
    pub fn with_fragment(mut self, source: impl Into<String>) -> Self {
        self.fragment_source = Some(source.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builds the shader module.
    pub fn build_module(self, device: &wgpu::Device) -> RenderResult<wgpu::ShaderModule> {
        let source = self.combined_source()?;
        Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: self.label.as_deref(),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        }))
    }

    fn combined_source(&self) -> RenderResult<String> {
        let vertex = self
            .vertex_source
            .as_ref()
            .ok_or_else(|| RenderError::ShaderCompilationFailed("missing vertex shader".into()))?;
        let fragment = self.fragment_source.as_ref().ok_or_else(|| {
            RenderError::ShaderCompilationFailed("missing fragment shader".into())
        })?;

        let mut source = self.common_source.clone().unwrap_or_default();
        source.push_str("\n\n");
        source.push_str(vertex);
        // Both stages usually live in one file
        if vertex != fragment {
            source.push_str("\n\n");
            source.push_str(fragment);
        }
        Ok(source)
    }
}

impl Default for ShaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
