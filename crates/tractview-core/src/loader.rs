//! Loader collaborators and load requests.
//!
//! The registry never reads files itself. A [`DatasetLoader`] turns a path into
//! a [`LoadedPayload`]; the registry validates and registers it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::Deserialize;

use crate::dataset::{
    DatasetData, DatasetKind, DatasetStatus, MeshData, VolumeData, VolumeDims, VoxelFormat,
};
use crate::error::{LoadError, ParseError};

/// What a path on disk refers to, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A saved scene document.
    Scene,
    /// A single dataset.
    Dataset(DatasetKind),
}

impl FileKind {
    /// Classifies `path` by extension.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let kind = match ext.as_str() {
            "scn" | "json" => return Ok(Self::Scene),
            "nii" | "gz" | "hdr" | "ima" => DatasetKind::Anatomy,
            "mesh" | "obj" | "ply" => DatasetKind::Mesh,
            "fib" | "vtk" | "trk" | "tck" => DatasetKind::Fibers,
            "ten" => DatasetKind::Tensors,
            "odf" => DatasetKind::Odfs,
            _ => return Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        };
        Ok(Self::Dataset(kind))
    }
}

/// A request to load one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub path: PathBuf,
    /// Overrides extension-based dispatch.
    pub kind: Option<DatasetKind>,
}

impl LoadRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: None,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: DatasetKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Resolves the dataset kind, from the override or the extension.
    pub fn resolve_kind(&self) -> Result<DatasetKind, LoadError> {
        if let Some(kind) = self.kind {
            return Ok(kind);
        }
        match FileKind::from_path(&self.path)? {
            FileKind::Dataset(kind) => Ok(kind),
            FileKind::Scene => Err(LoadError::UnsupportedFormat(self.path.clone())),
        }
    }
}

/// What a loader hands back for registration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPayload {
    /// Display name; the file stem is used when absent.
    pub name: Option<String>,
    /// Grid the payload was produced on, for kinds without their own voxels.
    pub dims: Option<VolumeDims>,
    /// Initial display attributes.
    pub status: Option<DatasetStatus>,
    pub data: DatasetData,
}

impl LoadedPayload {
    #[must_use]
    pub fn new(data: DatasetData) -> Self {
        Self {
            name: None,
            dims: None,
            status: None,
            data,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_dims(mut self, dims: VolumeDims) -> Self {
        self.dims = Some(dims);
        self
    }

    /// The grid this payload must agree with, if any.
    #[must_use]
    pub fn grid(&self) -> Option<VolumeDims> {
        self.data.dims().or(self.dims)
    }
}

/// Parses files into payloads.
///
/// Implementations run on loader threads, so they must not touch viewer state.
pub trait DatasetLoader: Send + Sync {
    fn parse(&self, path: &Path, kind: DatasetKind) -> Result<LoadedPayload, ParseError>;
}

/// Produces a triangle mesh at an iso level of a scalar volume.
pub trait IsoSurfaceGenerator {
    /// Returns `None` when no valid surface exists at `iso_level`.
    fn generate(&self, volume: &VolumeData, iso_level: f32) -> Option<MeshData>;
}

/// Loader serving payloads that were parsed elsewhere.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLoader {
    entries: HashMap<PathBuf, Result<LoadedPayload, ParseError>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, payload: LoadedPayload) {
        self.entries.insert(path.into(), Ok(payload));
    }

    /// Makes every parse of `path` fail with `error`.
    pub fn insert_failure(&mut self, path: impl Into<PathBuf>, error: ParseError) {
        self.entries.insert(path.into(), Err(error));
    }
}

impl DatasetLoader for InMemoryLoader {
    fn parse(&self, path: &Path, _kind: DatasetKind) -> Result<LoadedPayload, ParseError> {
        self.entries
            .get(path)
            .cloned()
            .unwrap_or_else(|| Err(ParseError::Header(format!("no such file: {}", path.display()))))
    }
}

#[derive(Debug, Deserialize)]
struct RawHeader {
    columns: u32,
    rows: u32,
    frames: u32,
    #[serde(default = "unit_voxel")]
    voxel: [f32; 3],
    format: VoxelFormat,
    /// Data file, relative to the header. Defaults to the header path with `.ima`.
    #[serde(default)]
    data: Option<PathBuf>,
}

fn unit_voxel() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Reads volumes stored as a JSON header plus a raw little-endian voxel file.
///
/// ```json
/// { "columns": 64, "rows": 64, "frames": 32, "voxel": [1, 1, 2], "format": "byte" }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct RawVolumeLoader;

impl DatasetLoader for RawVolumeLoader {
    fn parse(&self, path: &Path, kind: DatasetKind) -> Result<LoadedPayload, ParseError> {
        if kind != DatasetKind::Anatomy {
            return Err(ParseError::Header(format!(
                "raw volume loader cannot read {kind}"
            )));
        }
        let text = fs::read_to_string(path).map_err(|e| ParseError::Header(e.to_string()))?;
        let header: RawHeader =
            serde_json::from_str(&text).map_err(|e| ParseError::Header(e.to_string()))?;

        let data_path = match &header.data {
            Some(p) if p.is_relative() => path.parent().unwrap_or(Path::new("")).join(p),
            Some(p) => p.clone(),
            None => path.with_extension("ima"),
        };
        let bytes = fs::read(&data_path)
            .map_err(|e| ParseError::Data(format!("{}: {e}", data_path.display())))?;

        let dims = VolumeDims::new(header.columns, header.rows, header.frames)
            .with_voxel(Vec3::from(header.voxel));
        let values = decode_voxels(&bytes, header.format, dims.voxel_count())?;
        let volume = VolumeData::new(dims, header.format, values)?;
        log::debug!("read {dims} {:?} volume from {}", header.format, path.display());
        Ok(LoadedPayload::new(DatasetData::Anatomy(volume)))
    }
}

/// Decodes `count` voxels of raw little-endian data into normalized floats.
///
/// Bytes are divided by 255 and shorts by 65536. Color volumes are stored as
/// three planes (all red, then green, then blue) and come back interleaved.
pub fn decode_voxels(bytes: &[u8], format: VoxelFormat, count: usize) -> Result<Vec<f32>, ParseError> {
    let bytes_per_voxel = match format {
        VoxelFormat::Byte => 1,
        VoxelFormat::Short => 2,
        VoxelFormat::Float => 4,
        VoxelFormat::Rgb => 3,
        VoxelFormat::Vectors => 12,
    };
    let expected = count * bytes_per_voxel;
    if bytes.len() < expected {
        return Err(ParseError::Data(format!(
            "expected {expected} bytes of voxel data, found {}",
            bytes.len()
        )));
    }

    let values = match format {
        VoxelFormat::Byte => bytes[..count].iter().map(|&b| f32::from(b) / 255.0).collect(),
        VoxelFormat::Short => bytes[..expected]
            .chunks_exact(2)
            .map(|c| f32::from(u16::from_le_bytes([c[0], c[1]])) / 65536.0)
            .collect(),
        VoxelFormat::Float | VoxelFormat::Vectors => bytes[..expected]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        VoxelFormat::Rgb => {
            let (r, rest) = bytes.split_at(count);
            let (g, b) = rest.split_at(count);
            (0..count)
                .flat_map(|i| [r[i], g[i], b[i]])
                .map(|v| f32::from(v) / 255.0)
                .collect()
        }
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_dispatch() {
        assert_eq!(
            FileKind::from_path(Path::new("brain.NII")).unwrap(),
            FileKind::Dataset(DatasetKind::Anatomy)
        );
        assert_eq!(
            FileKind::from_path(Path::new("tracts.fib")).unwrap(),
            FileKind::Dataset(DatasetKind::Fibers)
        );
        assert_eq!(
            FileKind::from_path(Path::new("session.scn")).unwrap(),
            FileKind::Scene
        );
        assert!(matches!(
            FileKind::from_path(Path::new("notes.txt")),
            Err(LoadError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            FileKind::from_path(Path::new("no_extension")),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_request_kind_override() {
        let req = LoadRequest::new("volume.bin").with_kind(DatasetKind::Anatomy);
        assert_eq!(req.resolve_kind().unwrap(), DatasetKind::Anatomy);
        assert!(LoadRequest::new("session.scn").resolve_kind().is_err());
    }

    #[test]
    fn test_decode_bytes_and_shorts() {
        let v = decode_voxels(&[0, 255, 51], VoxelFormat::Byte, 3).unwrap();
        assert_eq!(v, vec![0.0, 1.0, 0.2]);

        let v = decode_voxels(&[0, 128, 0, 0], VoxelFormat::Short, 2).unwrap();
        assert_eq!(v, vec![0.5, 0.0]);
    }

    #[test]
    fn test_decode_planar_rgb() {
        // Two voxels: red plane, green plane, blue plane.
        let bytes = [255, 0, 0, 255, 0, 0];
        let v = decode_voxels(&bytes, VoxelFormat::Rgb, 2).unwrap();
        assert_eq!(v, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_decode_short_input() {
        assert!(matches!(
            decode_voxels(&[0; 7], VoxelFormat::Float, 2),
            Err(ParseError::Data(_))
        ));
    }

    #[test]
    fn test_raw_loader_reads_header_and_data() {
        let dir = std::env::temp_dir().join(format!("tractview-raw-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let header = dir.join("t1.hdr");
        fs::write(
            &header,
            r#"{ "columns": 2, "rows": 1, "frames": 1, "format": "byte" }"#,
        )
        .unwrap();
        fs::write(dir.join("t1.ima"), [0u8, 255]).unwrap();

        let payload = RawVolumeLoader.parse(&header, DatasetKind::Anatomy).unwrap();
        let DatasetData::Anatomy(volume) = payload.data else {
            panic!("expected anatomy payload");
        };
        assert_eq!(volume.values(), &[0.0, 1.0]);

        fs::write(&header, "not json").unwrap();
        assert!(matches!(
            RawVolumeLoader.parse(&header, DatasetKind::Anatomy),
            Err(ParseError::Header(_))
        ));

        fs::write(
            &header,
            r#"{ "columns": 4, "rows": 1, "frames": 1, "format": "byte" }"#,
        )
        .unwrap();
        assert!(matches!(
            RawVolumeLoader.parse(&header, DatasetKind::Anatomy),
            Err(ParseError::Data(_))
        ));

        let _ = fs::remove_dir_all(&dir);
    }
}
