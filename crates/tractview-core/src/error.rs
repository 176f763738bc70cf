//! Error types for tractview.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::dataset::{DatasetKind, VolumeDims};

/// Which part of a file a loader failed to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    /// The header describing dimensions and voxel format.
    Header,
    /// The voxel or geometry payload.
    Data,
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => f.write_str("header"),
            Self::Data => f.write_str("data"),
        }
    }
}

/// Failure reported by a [`DatasetLoader`](crate::DatasetLoader).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The header could not be read or understood.
    #[error("couldn't parse header: {0}")]
    Header(String),

    /// The header was fine but the payload could not be read.
    #[error("couldn't load data: {0}")]
    Data(String),
}

impl ParseError {
    /// Returns the stage at which parsing failed.
    #[must_use]
    pub fn stage(&self) -> ParseStage {
        match self {
            Self::Header(_) => ParseStage::Header,
            Self::Data(_) => ParseStage::Data,
        }
    }

    /// Attaches the source path, producing the registry-level error.
    #[must_use]
    pub fn into_load_error(self, path: PathBuf) -> LoadError {
        let stage = self.stage();
        let message = match self {
            Self::Header(m) | Self::Data(m) => m,
        };
        LoadError::ParseFailure {
            path,
            stage,
            message,
        }
    }
}

/// Reasons a dataset load is rejected.
///
/// A rejected load never mutates the registry or the selection tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// A dataset with the same source path is already registered.
    #[error("dataset already loaded: {}", .0.display())]
    DuplicateSource(PathBuf),

    /// The dataset's grid differs from the one fixed by the first anatomy volume.
    #[error("dimensions of loaded files must be the same (expected {expected}, got {actual})")]
    DimensionMismatch {
        expected: VolumeDims,
        actual: VolumeDims,
    },

    /// The loader could not read the file.
    #[error("couldn't parse {stage} of {}: {message}", .path.display())]
    ParseFailure {
        path: PathBuf,
        stage: ParseStage,
        message: String,
    },

    /// The file extension maps to no known dataset kind.
    #[error("unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The kind needs an anatomy volume loaded first.
    #[error("no anatomy file loaded, {0} needs one")]
    MissingPrerequisite(DatasetKind),

    /// Only one fiber bundle can be loaded at a time.
    #[error("fibers already loaded")]
    AlreadyLoaded,
}

/// The main error type for tractview operations.
#[derive(Error, Debug)]
pub enum TractviewError {
    /// A dataset load was rejected.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The dataset handle is stale or was never issued.
    #[error("dataset not found")]
    DatasetNotFound,

    /// The selection box handle is stale or was never issued.
    #[error("selection box not found")]
    BoxNotFound,

    /// A child box was attached to something that is not a master box.
    #[error("selection box is not a master box")]
    NotAMaster,

    /// No scalar anatomy volume is loaded.
    #[error("no anatomy volume loaded")]
    NoVolume,

    /// The iso-surface generator produced no usable geometry.
    #[error("iso-surface generation produced no geometry")]
    InvalidIsoSurface,

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for tractview operations.
pub type Result<T> = std::result::Result<T, TractviewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_keeps_stage() {
        let err = ParseError::Header("bad magic".into()).into_load_error("a.hdr".into());
        match err {
            LoadError::ParseFailure { stage, message, .. } => {
                assert_eq!(stage, ParseStage::Header);
                assert_eq!(message, "bad magic");
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = ParseError::Data("short read".into()).into_load_error("a.ima".into());
        assert!(err.to_string().contains("data of a.ima"));
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = LoadError::DimensionMismatch {
            expected: VolumeDims::new(64, 64, 32),
            actual: VolumeDims::new(64, 64, 30),
        };
        assert_eq!(
            err.to_string(),
            "dimensions of loaded files must be the same (expected 64x64x32, got 64x64x30)"
        );
    }
}
