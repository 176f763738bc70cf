//! Background load batches.
//!
//! Parsing runs on one worker thread per request. Workers only produce
//! payloads; registration happens on the owning thread once the whole batch
//! has completed, so the registry never sees a half-finished batch and the
//! "loading finished" transition happens exactly once per batch.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{LoadError, ParseStage};
use crate::loader::{DatasetLoader, LoadRequest, LoadedPayload};
use crate::registry::DatasetRegistry;

type TaskResult = Result<LoadedPayload, LoadError>;

/// Results of a completed batch, in request order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<(PathBuf, TaskResult)>,
}

/// A set of outstanding load tasks with a join barrier.
pub struct LoadBatch {
    paths: Vec<PathBuf>,
    results: Vec<Option<TaskResult>>,
    received: usize,
    receiver: mpsc::Receiver<(usize, TaskResult)>,
    handles: Vec<JoinHandle<()>>,
}

impl LoadBatch {
    /// Starts parsing every request.
    ///
    /// Requests that `registry` would reject outright (duplicates, missing
    /// prerequisites, unknown formats) fail immediately without a worker.
    pub fn spawn(
        registry: &DatasetRegistry,
        requests: Vec<LoadRequest>,
        loader: Arc<dyn DatasetLoader>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        let mut batch = Self {
            paths: Vec::with_capacity(requests.len()),
            results: Vec::with_capacity(requests.len()),
            received: 0,
            receiver,
            handles: Vec::new(),
        };

        for (index, request) in requests.into_iter().enumerate() {
            batch.paths.push(request.path.clone());
            batch.results.push(None);

            let admitted = request
                .resolve_kind()
                .and_then(|kind| registry.check_admission(&request.path, kind).map(|()| kind));
            let kind = match admitted {
                Ok(kind) => kind,
                Err(e) => {
                    batch.store(index, Err(e));
                    continue;
                }
            };

            let sender = sender.clone();
            let loader = Arc::clone(&loader);
            let path = request.path;
            batch.handles.push(std::thread::spawn(move || {
                let result = loader
                    .parse(&path, kind)
                    .map_err(|e| e.into_load_error(path.clone()));
                // The batch may have been dropped; nobody is waiting then.
                let _ = sender.send((index, result));
            }));
        }
        batch
    }

    fn store(&mut self, index: usize, result: TaskResult) {
        if self.results[index].is_none() {
            self.received += 1;
        }
        self.results[index] = Some(result);
    }

    /// Number of requests in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Requests still being parsed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.paths.len() - self.received
    }

    /// Collects finished tasks without blocking. Returns true once all are done.
    pub fn poll(&mut self) -> bool {
        while let Ok((index, result)) = self.receiver.try_recv() {
            self.store(index, result);
        }
        self.pending() == 0
    }

    /// Returns the outcome if every task has finished, or the batch otherwise.
    pub fn try_finish(mut self) -> Result<BatchOutcome, Self> {
        if self.poll() {
            Ok(self.into_outcome())
        } else {
            Err(self)
        }
    }

    /// Blocks until every task has finished.
    pub fn wait(mut self) -> BatchOutcome {
        // `recv` fails once every worker has exited.
        while self.pending() > 0 {
            match self.receiver.recv() {
                Ok((index, result)) => self.store(index, result),
                Err(_) => break,
            }
        }
        self.into_outcome()
    }

    fn into_outcome(self) -> BatchOutcome {
        for handle in self.handles {
            if handle.join().is_err() {
                log::error!("loader thread panicked");
            }
        }
        let results = self
            .paths
            .into_iter()
            .zip(self.results)
            .map(|(path, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(LoadError::ParseFailure {
                        path: path.clone(),
                        stage: ParseStage::Data,
                        message: "loader thread stopped before finishing".to_string(),
                    })
                });
                (path, result)
            })
            .collect();
        BatchOutcome { results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DatasetData, FiberData, VolumeData, VolumeDims, VoxelFormat};
    use crate::loader::InMemoryLoader;
    use glam::Vec3;

    #[test]
    fn test_batch_collects_in_request_order() {
        let mut loader = InMemoryLoader::new();
        let dims = VolumeDims::new(2, 2, 2);
        loader.insert(
            "a.nii",
            LoadedPayload::new(DatasetData::Anatomy(
                VolumeData::new(dims, VoxelFormat::Byte, vec![0.0; 8]).unwrap(),
            )),
        );
        let registry = DatasetRegistry::new();
        let batch = LoadBatch::spawn(
            &registry,
            vec![
                LoadRequest::new("a.nii"),
                LoadRequest::new("missing.nii"),
                LoadRequest::new("notes.txt"),
            ],
            Arc::new(loader),
        );
        assert_eq!(batch.len(), 3);

        let outcome = batch.wait();
        let paths: Vec<_> = outcome.results.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("a.nii"), "missing.nii".into(), "notes.txt".into()]);
        assert!(outcome.results[0].1.is_ok());
        assert!(matches!(
            outcome.results[1].1,
            Err(LoadError::ParseFailure { stage: ParseStage::Header, .. })
        ));
        assert!(matches!(outcome.results[2].1, Err(LoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_prerequisites_checked_before_spawning() {
        let mut loader = InMemoryLoader::new();
        loader.insert(
            "t.fib",
            LoadedPayload::new(DatasetData::Fibers(FiberData::new(vec![vec![Vec3::ZERO]]))),
        );
        let batch = LoadBatch::spawn(
            &DatasetRegistry::new(),
            vec![LoadRequest::new("t.fib")],
            Arc::new(loader),
        );
        assert_eq!(batch.pending(), 0);
        let outcome = batch.try_finish().ok().unwrap();
        assert!(matches!(
            outcome.results[0].1,
            Err(LoadError::MissingPrerequisite(_))
        ));
    }
}
