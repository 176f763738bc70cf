//! Core data model for tractview.
//!
//! This crate owns everything the viewer knows about the scene independent of
//! the GPU:
//! - [`DatasetRegistry`] for loaded volumes, fiber bundles, meshes and glyph fields
//! - [`SelectionTree`] for master/AND/NOT selection boxes filtering fibers
//! - [`FrustumCache`] for clip planes derived from the camera matrices
//! - [`ViewState`] for zoom, pan, rotation and slice navigation
//! - [`Context`] tying them together with a notification queue for the host shell

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Display flags are legitimately many booleans
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
// Voxel grids index with u32 dimensions and f32 coordinates
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod context;
pub mod dataset;
pub mod error;
pub mod frustum;
pub mod loader;
pub mod options;
pub mod registry;
pub mod scene_file;
pub mod selection;
pub mod view;

pub use batch::{BatchOutcome, LoadBatch};
pub use context::{Context, Notification};
pub use dataset::{
    Dataset, DatasetData, DatasetKind, DatasetStatus, DatasetType, FiberData, FiberGeometry,
    MeshData, OdfField, SurfaceData, TensorField, TextureId, VolumeData, VolumeDims, VoxelFormat,
};
pub use error::{LoadError, ParseError, ParseStage, Result, TractviewError};
pub use frustum::{Frustum, FrustumCache, PlaneSide};
pub use loader::{
    DatasetLoader, FileKind, InMemoryLoader, IsoSurfaceGenerator, LoadRequest, LoadedPayload,
    RawVolumeLoader,
};
pub use options::Options;
pub use registry::{DatasetId, DatasetRegistry};
pub use scene_file::SceneDocument;
pub use selection::{BoxId, BoxRole, SelectionBox, SelectionTree};
pub use view::{Axis, ViewState, MAX_ZOOM, MIN_ZOOM};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec3, Vec2, Vec3, Vec4};
