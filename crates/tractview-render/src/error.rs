//! Rendering error types.

use thiserror::Error;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(String),

    /// Rendering was requested before a backend and binder were set up.
    #[error("renderer not initialized: {0}")]
    NotInitialized(&'static str),

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// Texture creation or upload failed.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    /// A texture handle that the backend does not know.
    #[error("unknown texture {0}")]
    UnknownTexture(u64),

    /// An error raised by the device while executing a pass.
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Reading back the render target failed.
    #[error("failed to map readback buffer")]
    BufferMapFailed,
}

impl From<wgpu::RequestDeviceError> for RenderError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        Self::DeviceCreationFailed(e.to_string())
    }
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
