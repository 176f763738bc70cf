//! tractview: a Rust-native viewer core for MRI volumes and diffusion tractography.
//!
//! The viewer loads anatomy volumes, fiber bundles, meshes and glyph fields
//! that share one voxel grid, filters fibers through a hierarchy of selection
//! boxes and draws everything as a fixed sequence of render passes.
//!
//! # Quick Start
//!
//! ```no_run
//! use tractview::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let mut viewer = Viewer::new(Options::default());
//!     viewer.open("t1.hdr")?;
//!
//!     // Zoom in and look at the middle axial slice
//!     viewer.context_mut().view.set_zoom(2.0);
//!
//!     let pixels = viewer.render_to_image(512, 512)?;
//!     assert_eq!(pixels.len(), 512 * 512 * 4);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`tractview_core`] holds the data model: [`DatasetRegistry`],
//!   [`SelectionTree`], [`ViewState`] and the [`Context`] tying them together.
//! - [`tractview_render`] turns a context into frames through the
//!   [`GpuBackend`] seam, with [`WgpuBackend`] for headless wgpu rendering and
//!   [`RecordingBackend`] for tests.
//! - [`Viewer`] wires both together for hosts that just want to load files
//!   and get pixels back.

mod headless;
mod viewer;

pub use headless::render_context_to_image;
pub use viewer::Viewer;

// Re-export core types
pub use tractview_core::{
    Axis, BoxId, BoxRole, Context, Dataset, DatasetData, DatasetId, DatasetKind, DatasetLoader,
    DatasetRegistry, DatasetStatus, DatasetType, FiberData, Frustum, FrustumCache,
    InMemoryLoader, IsoSurfaceGenerator, LoadError, LoadRequest, LoadedPayload, MeshData,
    Notification, Options, ParseError, RawVolumeLoader, SceneDocument, SelectionBox,
    SelectionTree, SurfaceData, TractviewError, ViewState, VolumeData, VolumeDims, VoxelFormat,
    Mat4, UVec3, Vec2, Vec3, Vec4,
};

// Re-export render types
pub use tractview_render::{
    Camera, ColorMap, ColorMapRegistry, FrameStats, GpuBackend, PassKind, RecordingBackend,
    RenderError, SceneRenderer, ShaderTextureBinder, WgpuBackend,
};

use thiserror::Error;

/// Errors surfaced by the [`Viewer`].
#[derive(Error, Debug)]
pub enum Error {
    /// A core operation failed.
    #[error(transparent)]
    Core(#[from] TractviewError),

    /// A dataset load was rejected.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Rendering failed.
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// A specialized Result type for viewer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Installs `env_logger` as the global logger, honouring `RUST_LOG`.
///
/// Safe to call more than once; later calls do nothing.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
