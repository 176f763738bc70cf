//! Rendering for tractview.
//!
//! This crate turns a [`tractview_core::Context`] into frames:
//! - [`SceneRenderer`] runs the fixed sequence of render passes
//! - [`ShaderTextureBinder`] binds volume textures and per-pass programs
//! - [`GpuBackend`] is the seam to the GPU, implemented by [`WgpuBackend`]
//!   (headless wgpu) and [`RecordingBackend`] (command capture for tests)

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
// Vertex and texel math mixes u32 grid sizes with f32 coordinates
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::struct_excessive_bools)]

pub mod backend;
pub mod binder;
pub mod buffer;
pub mod camera;
pub mod color_maps;
pub mod error;
pub mod geometry;
pub mod recording;
pub mod renderer;
pub mod shader;
pub mod wgpu_backend;

pub use backend::{
    GpuBackend, GpuVertex, ProgramKind, RenderState, TextureContent, TextureFilter, Topology, Uniform,
};
pub use binder::{BoundTexture, PassUniforms, ShaderTextureBinder, MAX_TEXTURES};
pub use camera::{Camera, DEFAULT_ORTHO_DEPTH};
pub use color_maps::{ColorMap, ColorMapRegistry};
pub use error::{RenderError, RenderResult};
pub use recording::{Command, RecordingBackend};
pub use renderer::{FrameStats, PassKind, SceneRenderer};
pub use shader::{ShaderBuilder, ShaderKind};
pub use wgpu_backend::{DrawUniforms, WgpuBackend};
