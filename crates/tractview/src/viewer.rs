//! The [`Viewer`]: a context, a renderer and a loader in one place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tractview_core::{
    Context, DatasetId, DatasetLoader, IsoSurfaceGenerator, LoadError, LoadRequest, Notification,
    Options, RawVolumeLoader,
};
use tractview_render::{FrameStats, GpuBackend, SceneRenderer};

use crate::Result;

/// A ready-to-draw viewer.
pub struct Viewer {
    context: Context,
    renderer: SceneRenderer,
    loader: Arc<dyn DatasetLoader>,
}

impl Viewer {
    /// Creates a viewer reading volumes with [`RawVolumeLoader`].
    pub fn new(options: Options) -> Self {
        Self::with_loader(options, Arc::new(RawVolumeLoader))
    }

    /// Creates a viewer with a custom loader.
    pub fn with_loader(options: Options, loader: Arc<dyn DatasetLoader>) -> Self {
        let mut renderer = SceneRenderer::new();
        renderer.initialize(&options);
        log::info!("tractview viewer initialized");
        Self {
            context: Context::new(options),
            renderer,
            loader,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn renderer(&self) -> &SceneRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut SceneRenderer {
        &mut self.renderer
    }

    /// Opens a dataset or a `.scn` scene.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.context.open(path.as_ref(), self.loader.as_ref())?;
        Ok(())
    }

    /// Loads several files in parallel and registers them in request order.
    ///
    /// Each file succeeds or fails on its own; the outer result is always `Ok`.
    pub fn open_many<I, P>(&mut self, paths: I) -> Vec<std::result::Result<DatasetId, LoadError>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let requests: Vec<LoadRequest> = paths.into_iter().map(LoadRequest::new).collect();
        if requests.is_empty() {
            return Vec::new();
        }
        let batch = self.context.spawn_batch(requests, Arc::clone(&self.loader));
        let outcome = batch.wait();
        self.context.finish_batch(outcome)
    }

    /// Removes a dataset. Returns false for a stale handle.
    pub fn unload(&mut self, id: DatasetId) -> bool {
        self.context.unload(id)
    }

    /// Removes every dataset and selection box.
    pub fn clear(&mut self) {
        self.context.clear();
    }

    pub fn save_scene(&self, path: impl AsRef<Path>) -> Result<()> {
        self.context.save_scene(path.as_ref())?;
        Ok(())
    }

    pub fn load_scene(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.context.load_scene(path.as_ref(), self.loader.as_ref())?;
        Ok(())
    }

    /// Builds an iso-surface of the first scalar volume at the configured level.
    pub fn create_iso_surface(&mut self, generator: &dyn IsoSurfaceGenerator) -> Result<DatasetId> {
        Ok(self.context.create_iso_surface(generator)?)
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.context.drain_notifications()
    }

    /// Draws one frame through `backend`.
    pub fn render(&mut self, backend: &mut dyn GpuBackend) -> Result<FrameStats> {
        Ok(self.renderer.render_frame(&mut self.context, backend)?)
    }

    /// Renders one frame headlessly and returns RGBA8 pixels, row by row from the top.
    pub fn render_to_image(&mut self, width: u32, height: u32) -> Result<Vec<u8>> {
        crate::headless::render_context_to_image(&mut self.renderer, &mut self.context, width, height)
    }

    /// Renders at the size given by [`Options::render_width`] and [`Options::render_height`].
    pub fn render_default_size(&mut self) -> Result<Vec<u8>> {
        let (width, height) = (
            self.context.options.render_width,
            self.context.options.render_height,
        );
        self.render_to_image(width, height)
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tractview_core::{DatasetData, InMemoryLoader, LoadedPayload, VolumeData, VolumeDims, VoxelFormat};
    use tractview_render::{PassKind, RecordingBackend};

    fn anatomy(columns: u32, rows: u32, frames: u32) -> LoadedPayload {
        let dims = VolumeDims::new(columns, rows, frames);
        let values = vec![0.5; dims.voxel_count()];
        let volume = VolumeData::new(dims, VoxelFormat::Byte, values).unwrap();
        LoadedPayload::new(DatasetData::Anatomy(volume))
    }

    fn viewer_with(entries: &[(&str, LoadedPayload)]) -> Viewer {
        let mut loader = InMemoryLoader::new();
        for (path, payload) in entries {
            loader.insert(*path, payload.clone());
        }
        Viewer::with_loader(Options::default(), Arc::new(loader))
    }

    #[test]
    fn test_open_and_render() {
        let mut viewer = viewer_with(&[("t1.hdr", anatomy(8, 8, 4))]);
        viewer.open("t1.hdr").unwrap();
        assert_eq!(viewer.context().registry.len(), 1);

        let mut backend = RecordingBackend::new();
        let stats = viewer.render(&mut backend).unwrap();
        assert_eq!(stats.passes.first(), Some(&PassKind::Slices));
        assert_eq!(stats.textures_bound, 1);
    }

    #[test]
    fn test_open_many_keeps_request_order() {
        let mut viewer = viewer_with(&[
            ("a.hdr", anatomy(8, 8, 4)),
            ("b.hdr", anatomy(8, 8, 4)),
            ("c.hdr", anatomy(8, 8, 3)),
        ]);
        let results = viewer.open_many(["a.hdr", "b.hdr", "c.hdr"]);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(LoadError::DimensionMismatch { .. })));
        assert_eq!(viewer.context().registry.len(), 2);
    }

    #[test]
    fn test_open_unknown_extension() {
        let mut viewer = Viewer::default();
        let err = viewer.open("notes.txt").unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Core(tractview_core::TractviewError::Load(LoadError::UnsupportedFormat(_)))
        ));
    }
}
