//! The viewer context.
//!
//! [`Context`] owns the registry, the selection tree, the view and the
//! options. All mutation happens through it on the owning thread; the host
//! shell learns about changes by draining [`Notification`]s.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec3;

use crate::batch::{BatchOutcome, LoadBatch};
use crate::dataset::{DatasetData, DatasetKind, DatasetStatus, DatasetType, SurfaceData};
use crate::error::{LoadError, Result, TractviewError};
use crate::loader::{DatasetLoader, FileKind, IsoSurfaceGenerator, LoadRequest, LoadedPayload};
use crate::options::Options;
use crate::registry::{DatasetId, DatasetRegistry};
use crate::scene_file::SceneDocument;
use crate::selection::SelectionTree;
use crate::view::ViewState;

/// Path under which the spline surface is registered.
const SPLINE_SURFACE_PATH: &str = "spline surface";

/// Messages for the host shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Datasets were added, removed or renamed.
    DatasetListChanged,
    /// The scene needs to be drawn again.
    RepaintRequested,
    /// Text for the status bar.
    Status(String),
}

/// All viewer state.
pub struct Context {
    pub registry: DatasetRegistry,
    pub selection: SelectionTree,
    pub view: ViewState,
    pub options: Options,
    fibers_loaded: bool,
    iso_surfaces: usize,
    notifications: VecDeque<Notification>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Context {
    pub fn new(options: Options) -> Self {
        Self {
            registry: DatasetRegistry::new(),
            selection: SelectionTree::new(),
            view: ViewState::new(),
            options,
            fibers_loaded: false,
            iso_surfaces: 0,
            notifications: VecDeque::new(),
        }
    }

    /// Opens a dataset or a scene, dispatching on the extension.
    pub fn open(&mut self, path: &Path, loader: &dyn DatasetLoader) -> Result<()> {
        match FileKind::from_path(path) {
            Ok(FileKind::Scene) => self.load_scene(path, loader),
            Ok(FileKind::Dataset(_)) => {
                self.load(&LoadRequest::new(path), loader)?;
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e.into())
            }
        }
    }

    /// Loads one dataset on the current thread.
    pub fn load(&mut self, request: &LoadRequest, loader: &dyn DatasetLoader) -> std::result::Result<DatasetId, LoadError> {
        let result = self.registry.load(request, loader);
        self.settle(result, true)
    }

    /// Registers a payload parsed elsewhere.
    pub fn register(&mut self, path: PathBuf, payload: LoadedPayload) -> std::result::Result<DatasetId, LoadError> {
        let result = self.registry.register(path, payload);
        self.settle(result, true)
    }

    fn settle(
        &mut self,
        result: std::result::Result<DatasetId, LoadError>,
        finish_fibers: bool,
    ) -> std::result::Result<DatasetId, LoadError> {
        match result {
            Ok(id) => {
                let is_fibers = self.finish_loading(id);
                if is_fibers && finish_fibers {
                    self.loading_finished();
                }
                Ok(id)
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Starts parsing `requests` on worker threads.
    pub fn spawn_batch(&self, requests: Vec<LoadRequest>, loader: Arc<dyn DatasetLoader>) -> LoadBatch {
        LoadBatch::spawn(&self.registry, requests, loader)
    }

    /// Registers the payloads of a completed batch, then runs the
    /// "loading finished" transition once for the whole batch.
    pub fn finish_batch(&mut self, outcome: BatchOutcome) -> Vec<std::result::Result<DatasetId, LoadError>> {
        let mut results = Vec::with_capacity(outcome.results.len());
        for (path, result) in outcome.results {
            let result = result.and_then(|payload| self.registry.register(path, payload));
            results.push(self.settle(result, false));
        }
        self.loading_finished();
        results
    }

    /// Per-dataset bookkeeping after registration. Returns true for fibers.
    fn finish_loading(&mut self, id: DatasetId) -> bool {
        let Some(dataset) = self.registry.get(id) else {
            return false;
        };
        let name = dataset.name().to_string();
        let is_fibers = dataset.kind() == DatasetKind::Fibers;

        if self.registry.len() == 1 {
            if let Some(dims) = self.registry.dims() {
                self.view.center_slices(&dims);
            }
        }
        if is_fibers {
            self.prepare_selection_for_fibers();
        }

        self.notify(Notification::DatasetListChanged);
        self.notify(Notification::Status(format!("{name} loaded")));
        is_fibers
    }

    /// Sizes the membership caches for the new bundle and makes sure there is
    /// a master box to select with.
    fn prepare_selection_for_fibers(&mut self) {
        if self.selection.is_empty() {
            if let Some(dims) = self.registry.dims() {
                let center = self.view.slices().as_vec3();
                self.selection.create_master(center, dims.extent() / 8.0);
            }
        }
        self.selection.resize_membership(self.registry.fiber_count());
    }

    fn loading_finished(&mut self) {
        self.fibers_loaded = self.registry.fibers_id().is_some();
        self.selection.mark_all_dirty();
        self.notify(Notification::RepaintRequested);
    }

    /// Whether a fiber bundle has finished loading.
    #[must_use]
    pub fn fibers_loaded(&self) -> bool {
        self.fibers_loaded
    }

    /// Unloads a dataset. Returns false if the handle is stale.
    pub fn unload(&mut self, id: DatasetId) -> bool {
        let Some(dataset) = self.registry.unload(id) else {
            return false;
        };
        if dataset.kind() == DatasetKind::Fibers {
            self.fibers_loaded = false;
            self.selection.resize_membership(0);
        }
        self.notify(Notification::DatasetListChanged);
        self.notify(Notification::RepaintRequested);
        true
    }

    /// Unloads every dataset and removes every selection box.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.selection.clear();
        self.selection.resize_membership(0);
        self.fibers_loaded = false;
        self.notify(Notification::DatasetListChanged);
        self.notify(Notification::RepaintRequested);
    }

    /// Builds an iso-surface of the topmost scalar anatomy volume.
    pub fn create_iso_surface(&mut self, generator: &dyn IsoSurfaceGenerator) -> Result<DatasetId> {
        let iso_level = self.options.iso_level;
        let (_, source) = self
            .registry
            .first_volume_with_type_below(DatasetType::Rgb)
            .ok_or(TractviewError::NoVolume)?;
        let volume = source.volume().ok_or(TractviewError::NoVolume)?;
        let path = PathBuf::from(format!("{}#iso{}", source.path().display(), self.iso_surfaces));

        let Some(mesh) = generator.generate(volume, iso_level).filter(|m| !m.is_empty()) else {
            log::error!("iso surface at level {iso_level} is not valid");
            self.notify(Notification::Status("couldn't create iso surface".to_string()));
            return Err(TractviewError::InvalidIsoSurface);
        };

        let mut payload = LoadedPayload::new(DatasetData::IsoSurface(mesh)).with_name("iso surface");
        payload.status = Some(DatasetStatus {
            threshold: iso_level,
            ..DatasetStatus::default()
        });
        let id = self.register(path, payload)?;
        self.iso_surfaces += 1;
        Ok(id)
    }

    /// Replaces the spline surface with one through `points`.
    pub fn set_spline_points(&mut self, points: Vec<Vec3>) -> Result<DatasetId> {
        let existing: Vec<DatasetId> = self
            .registry
            .list_by_type(|d| d.kind() == DatasetKind::Surface)
            .map(|(id, _)| id)
            .collect();
        for id in existing {
            self.registry.unload(id);
        }
        let surface = SurfaceData::from_points(points, self.options.surface_resolution);
        let payload = LoadedPayload::new(DatasetData::Surface(surface)).with_name("spline surface");
        Ok(self.register(PathBuf::from(SPLINE_SURFACE_PATH), payload)?)
    }

    /// Writes the session to `path`.
    pub fn save_scene(&self, path: &Path) -> Result<()> {
        SceneDocument::capture(&self.registry, &self.selection, &self.view).save(path)?;
        log::info!("scene saved to {}", path.display());
        Ok(())
    }

    /// Loads every file listed in a scene and restores its state.
    ///
    /// Files that fail to load are reported and skipped.
    pub fn load_scene(&mut self, path: &Path, loader: &dyn DatasetLoader) -> Result<()> {
        let doc = SceneDocument::load(path)?;

        for entry in &doc.datasets {
            if let Ok(id) = self.load(&LoadRequest::new(&entry.path), loader) {
                if let Some(dataset) = self.registry.get_mut(id) {
                    dataset.status = entry.status;
                }
            }
        }

        if let Some(dims) = self.registry.dims() {
            self.view.set_slices(doc.position, &dims);
        }
        if let Some(rotation) = doc.rotation {
            self.view.set_transform(rotation);
        }
        doc.restore_selection(&mut self.selection)?;
        if !doc.points.is_empty() {
            self.set_spline_points(doc.points.clone())?;
        }

        log::info!("scene loaded from {}", path.display());
        self.notify(Notification::Status(format!("{} loaded", path.display())));
        self.notify(Notification::RepaintRequested);
        Ok(())
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push_back(notification);
    }

    pub fn request_repaint(&mut self) {
        self.notify(Notification::RepaintRequested);
    }

    /// Takes every pending notification, oldest first.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    fn report(&mut self, error: &LoadError) {
        log::warn!("{error}");
        self.notify(Notification::Status(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{FiberData, MeshData, VolumeData, VolumeDims, VoxelFormat};
    use crate::loader::InMemoryLoader;

    fn anatomy(dims: VolumeDims) -> LoadedPayload {
        LoadedPayload::new(DatasetData::Anatomy(
            VolumeData::new(dims, VoxelFormat::Byte, vec![0.5; dims.voxel_count()]).unwrap(),
        ))
    }

    fn bundle(n: usize) -> LoadedPayload {
        LoadedPayload::new(DatasetData::Fibers(FiberData::new(
            (0..n).map(|i| vec![Vec3::new(i as f32, 0.0, 0.0), Vec3::new(i as f32, 8.0, 0.0)]),
        )))
    }

    #[test]
    fn test_first_load_centers_slices_and_notifies() {
        let mut ctx = Context::default();
        ctx.register("t1.nii".into(), anatomy(VolumeDims::new(64, 64, 32))).unwrap();
        assert_eq!(ctx.view.slices(), glam::UVec3::new(32, 32, 16));
        assert_eq!(
            ctx.drain_notifications(),
            vec![
                Notification::DatasetListChanged,
                Notification::Status("t1.nii loaded".to_string()),
            ]
        );
        assert!(ctx.drain_notifications().is_empty());
    }

    #[test]
    fn test_fiber_load_creates_default_master() {
        let mut ctx = Context::default();
        ctx.register("t1.nii".into(), anatomy(VolumeDims::new(64, 64, 32))).unwrap();
        ctx.register("tracts.fib".into(), bundle(5)).unwrap();

        assert!(ctx.fibers_loaded());
        assert_eq!(ctx.selection.len(), 1);
        let (_, master) = ctx.selection.iter().next().unwrap();
        assert_eq!(master.size(), Vec3::new(8.0, 8.0, 4.0));
        assert_eq!(master.center(), Vec3::new(32.0, 32.0, 16.0));
        assert_eq!(master.membership().len(), 5);
        assert!(ctx.drain_notifications().contains(&Notification::RepaintRequested));
    }

    #[test]
    fn test_failed_load_reports_status() {
        let mut ctx = Context::default();
        let err = ctx.register("tracts.fib".into(), bundle(2)).unwrap_err();
        assert!(matches!(err, LoadError::MissingPrerequisite(DatasetKind::Fibers)));
        assert!(ctx.registry.is_empty());
        assert_eq!(
            ctx.drain_notifications(),
            vec![Notification::Status(err.to_string())]
        );
    }

    #[test]
    fn test_batch_finishes_once() {
        let mut loader = InMemoryLoader::new();
        loader.insert("tracts.fib", bundle(3));
        loader.insert("t2.nii", anatomy(VolumeDims::new(4, 4, 4)));

        let mut ctx = Context::default();
        ctx.register("t1.nii".into(), anatomy(VolumeDims::new(4, 4, 4))).unwrap();
        ctx.drain_notifications();

        let batch = ctx.spawn_batch(
            vec![LoadRequest::new("tracts.fib"), LoadRequest::new("t2.nii")],
            Arc::new(loader),
        );
        let results = ctx.finish_batch(batch.wait());
        assert!(results.iter().all(std::result::Result::is_ok));
        assert_eq!(ctx.selection.fiber_count(), 3);

        let repaints = ctx
            .drain_notifications()
            .into_iter()
            .filter(|n| *n == Notification::RepaintRequested)
            .count();
        assert_eq!(repaints, 1);
    }

    #[test]
    fn test_unload_fibers_resets_membership() {
        let mut ctx = Context::default();
        ctx.register("t1.nii".into(), anatomy(VolumeDims::new(4, 4, 4))).unwrap();
        let f = ctx.register("tracts.fib".into(), bundle(3)).unwrap();
        assert!(ctx.unload(f));
        assert!(!ctx.fibers_loaded());
        assert_eq!(ctx.selection.fiber_count(), 0);
        assert!(ctx.selection.iter().all(|(_, b)| b.membership().is_empty()));
        assert!(!ctx.unload(f));
    }

    struct FixedMesh(Option<MeshData>);

    impl IsoSurfaceGenerator for FixedMesh {
        fn generate(&self, _volume: &VolumeData, _iso_level: f32) -> Option<MeshData> {
            self.0.clone()
        }
    }

    #[test]
    fn test_iso_surface_from_topmost_scalar_volume() {
        let mut ctx = Context::default();
        assert!(matches!(
            ctx.create_iso_surface(&FixedMesh(None)),
            Err(TractviewError::NoVolume)
        ));

        ctx.register("t1.nii".into(), anatomy(VolumeDims::new(4, 4, 4))).unwrap();
        assert!(matches!(
            ctx.create_iso_surface(&FixedMesh(None)),
            Err(TractviewError::InvalidIsoSurface)
        ));
        assert_eq!(ctx.registry.len(), 1);

        let mesh = MeshData::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 2]]);
        let id = ctx.create_iso_surface(&FixedMesh(Some(mesh))).unwrap();
        let iso = ctx.registry.get(id).unwrap();
        assert_eq!(iso.name(), "iso surface");
        assert!((iso.status.threshold - 0.4).abs() < 1e-6);
        assert_eq!(iso.dataset_type(), DatasetType::IsoSurface);
    }

    #[test]
    fn test_spline_points_replace_surface() {
        let mut ctx = Context::default();
        let points = vec![Vec3::new(2.0, 0.0, 0.0), Vec3::new(2.0, 4.0, 0.0), Vec3::new(2.0, 0.0, 4.0)];
        let first = ctx.set_spline_points(points.clone()).unwrap();
        let second = ctx.set_spline_points(points).unwrap();
        assert!(ctx.registry.get(first).is_none());
        assert_eq!(ctx.registry.len(), 1);
        assert_eq!(ctx.registry.get(second).unwrap().surface().unwrap().points().len(), 3);
    }
}
