//! Dataset registry.
//!
//! Datasets live in a slot map so handles carry a generation: a [`DatasetId`]
//! kept after `unload` simply stops resolving instead of aliasing whatever is
//! loaded next. Display order is tracked separately, most recent first.

use std::path::{Path, PathBuf};

use slotmap::SlotMap;

use crate::dataset::{Dataset, DatasetKind, DatasetType, TextureId, VolumeDims};
use crate::error::LoadError;
use crate::loader::{DatasetLoader, LoadRequest, LoadedPayload};

slotmap::new_key_type! {
    /// Generational handle of a registered dataset.
    pub struct DatasetId;
}

/// Owns every loaded dataset.
#[derive(Default)]
pub struct DatasetRegistry {
    datasets: SlotMap<DatasetId, Dataset>,
    /// Display order, most recently loaded first.
    order: Vec<DatasetId>,
    /// Grid fixed by the first anatomy volume.
    dims: Option<VolumeDims>,
    /// Textures of unloaded datasets, waiting for the renderer to free them.
    pending_release: Vec<TextureId>,
}

impl DatasetRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and registers a dataset.
    ///
    /// Admission checks run before the loader is invoked, and again before
    /// registration, so a failed load never leaves a partial entry behind.
    pub fn load(
        &mut self,
        request: &LoadRequest,
        loader: &dyn DatasetLoader,
    ) -> Result<DatasetId, LoadError> {
        let kind = request.resolve_kind()?;
        self.check_admission(&request.path, kind)?;
        let payload = loader
            .parse(&request.path, kind)
            .map_err(|e| e.into_load_error(request.path.clone()))?;
        self.register(request.path.clone(), payload)
    }

    /// Rejects requests that cannot succeed regardless of file contents.
    pub fn check_admission(&self, path: &Path, kind: DatasetKind) -> Result<(), LoadError> {
        if self.contains_path(path) {
            return Err(LoadError::DuplicateSource(path.to_path_buf()));
        }
        if kind.requires_anatomy() && self.dims.is_none() {
            return Err(LoadError::MissingPrerequisite(kind));
        }
        if kind == DatasetKind::Fibers && self.fibers_id().is_some() {
            return Err(LoadError::AlreadyLoaded);
        }
        Ok(())
    }

    /// Registers an already parsed payload under `path`.
    ///
    /// The first anatomy volume fixes the session grid; any later payload
    /// with a grid must match it.
    pub fn register(&mut self, path: PathBuf, payload: LoadedPayload) -> Result<DatasetId, LoadError> {
        let kind = payload.data.kind();
        self.check_admission(&path, kind)?;

        let grid = payload.grid();
        if let (Some(expected), Some(actual)) = (self.dims, grid) {
            if !expected.same_grid(&actual) {
                return Err(LoadError::DimensionMismatch { expected, actual });
            }
        }
        if self.dims.is_none() && kind == DatasetKind::Anatomy {
            self.dims = grid;
        }

        let name = payload.name.unwrap_or_else(|| display_name(&path));
        let mut dataset = Dataset::new(name, path, payload.data);
        if let Some(status) = payload.status {
            dataset.status = status;
        }
        log::info!("registered {} '{}'", kind, dataset.name());
        let id = self.datasets.insert(dataset);
        self.order.insert(0, id);
        Ok(id)
    }

    /// Removes a dataset, queueing its texture for release.
    ///
    /// Unknown or stale handles are ignored.
    pub fn unload(&mut self, id: DatasetId) -> Option<Dataset> {
        let mut dataset = self.datasets.remove(id)?;
        self.order.retain(|&o| o != id);
        if let Some(texture) = dataset.take_texture() {
            self.pending_release.push(texture);
        }
        if self.datasets.is_empty() {
            self.dims = None;
        }
        log::info!("unloaded '{}'", dataset.name());
        Some(dataset)
    }

    /// Unloads everything.
    pub fn clear(&mut self) {
        for id in std::mem::take(&mut self.order) {
            self.unload(id);
        }
        self.dims = None;
    }

    /// Textures released since the last call.
    pub fn take_pending_releases(&mut self) -> Vec<TextureId> {
        std::mem::take(&mut self.pending_release)
    }

    #[must_use]
    pub fn get(&self, id: DatasetId) -> Option<&Dataset> {
        self.datasets.get(id)
    }

    pub fn get_mut(&mut self, id: DatasetId) -> Option<&mut Dataset> {
        self.datasets.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: DatasetId) -> bool {
        self.datasets.contains_key(id)
    }

    /// Returns true if a dataset was loaded from `path`.
    #[must_use]
    pub fn contains_path(&self, path: &Path) -> bool {
        self.datasets.values().any(|d| d.path() == path)
    }

    /// Handles in display order.
    #[must_use]
    pub fn order(&self) -> &[DatasetId] {
        &self.order
    }

    /// Datasets in display order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (DatasetId, &Dataset)> + '_ {
        self.order.iter().map(move |&id| (id, &self.datasets[id]))
    }

    /// Datasets matching `predicate`, in display order.
    pub fn list_by_type<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = (DatasetId, &'a Dataset)> + 'a
    where
        P: Fn(&Dataset) -> bool + 'a,
    {
        self.iter().filter(move |(_, d)| predicate(d))
    }

    /// The first dataset in display order ranked strictly below `threshold`.
    #[must_use]
    pub fn first_volume_with_type_below(&self, threshold: DatasetType) -> Option<(DatasetId, &Dataset)> {
        self.iter().find(|(_, d)| d.dataset_type() < threshold)
    }

    /// The loaded fiber bundle, if any.
    #[must_use]
    pub fn fibers_id(&self) -> Option<DatasetId> {
        self.iter()
            .find(|(_, d)| d.kind() == DatasetKind::Fibers)
            .map(|(id, _)| id)
    }

    /// Fiber count of the loaded bundle, zero without one.
    #[must_use]
    pub fn fiber_count(&self) -> usize {
        self.fibers_id()
            .and_then(|id| self.datasets[id].fibers())
            .map_or(0, crate::dataset::FiberData::fiber_count)
    }

    /// Session grid, fixed by the first anatomy volume.
    #[must_use]
    pub fn dims(&self) -> Option<VolumeDims> {
        self.dims
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string()
}
