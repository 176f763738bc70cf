//! Datasets and their kind-specific payloads.
//!
//! Every loaded file becomes a [`Dataset`]: a set of display attributes shared by
//! all kinds plus a [`DatasetData`] variant carrying the actual voxels, polylines
//! or triangles. Rendering dispatches on the variant with an explicit `match`.

use std::fmt;
use std::path::{Path, PathBuf};

use glam::{UVec3, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Handle of a GPU texture owned by a resident dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Grid size shared by every volume in a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeDims {
    /// Voxels along x.
    pub columns: u32,
    /// Voxels along y.
    pub rows: u32,
    /// Voxels along z.
    pub frames: u32,
    /// Physical voxel size on each axis.
    pub voxel: Vec3,
}

impl VolumeDims {
    /// Creates dimensions with unit voxel size.
    #[must_use]
    pub fn new(columns: u32, rows: u32, frames: u32) -> Self {
        Self {
            columns,
            rows,
            frames,
            voxel: Vec3::ONE,
        }
    }

    /// Sets the voxel size.
    #[must_use]
    pub fn with_voxel(mut self, voxel: Vec3) -> Self {
        self.voxel = voxel;
        self
    }

    /// Returns true if both describe the same voxel grid.
    ///
    /// Voxel size is not compared; only the grid counts must agree.
    #[must_use]
    pub fn same_grid(&self, other: &Self) -> bool {
        self.columns == other.columns && self.rows == other.rows && self.frames == other.frames
    }

    /// Total number of voxels.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.columns as usize * self.rows as usize * self.frames as usize
    }

    /// Grid counts as a vector.
    #[must_use]
    pub fn as_uvec3(&self) -> UVec3 {
        UVec3::new(self.columns, self.rows, self.frames)
    }

    /// Grid extent in voxel units.
    #[must_use]
    pub fn extent(&self) -> Vec3 {
        self.as_uvec3().as_vec3()
    }

    /// Largest of the three grid counts.
    #[must_use]
    pub fn max_extent(&self) -> u32 {
        self.columns.max(self.rows).max(self.frames)
    }

    /// Geometric center of the grid in voxel units.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        self.extent() * 0.5
    }

    /// Linear index of a voxel, x fastest.
    #[must_use]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        x as usize + y as usize * self.columns as usize + z as usize * self.columns as usize * self.rows as usize
    }
}

impl Default for VolumeDims {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl fmt::Display for VolumeDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.columns, self.rows, self.frames)
    }
}

/// Broad category of a dataset, used for load dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Anatomy,
    Fibers,
    Mesh,
    Surface,
    Tensors,
    Odfs,
    IsoSurface,
}

impl DatasetKind {
    /// Returns true if this kind can only be loaded on top of an anatomy volume.
    #[must_use]
    pub fn requires_anatomy(self) -> bool {
        matches!(self, Self::Mesh | Self::Fibers)
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Anatomy => "anatomy",
            Self::Fibers => "fibers",
            Self::Mesh => "mesh",
            Self::Surface => "surface",
            Self::Tensors => "tensors",
            Self::Odfs => "odfs",
            Self::IsoSurface => "iso surface",
        };
        f.write_str(name)
    }
}

/// Ordered type rank.
///
/// Queries such as "volumes below `Mesh`" rely on the declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DatasetType {
    HeadByte,
    HeadShort,
    Overlay,
    Rgb,
    Vectors,
    Tensors,
    Odfs,
    Mesh,
    IsoSurface,
    Surface,
    Fibers,
}

/// Storage format of anatomy voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoxelFormat {
    /// 8-bit intensities, normalized by 255.
    Byte,
    /// 16-bit intensities, normalized by 65536.
    Short,
    /// 32-bit float overlay.
    Float,
    /// Color volume, three components per voxel.
    Rgb,
    /// Vector field, three float components per voxel.
    Vectors,
}

impl VoxelFormat {
    /// Values stored per voxel.
    #[must_use]
    pub fn components(self) -> usize {
        match self {
            Self::Byte | Self::Short | Self::Float => 1,
            Self::Rgb | Self::Vectors => 3,
        }
    }

    /// The type rank of a volume in this format.
    #[must_use]
    pub fn dataset_type(self) -> DatasetType {
        match self {
            Self::Byte => DatasetType::HeadByte,
            Self::Short => DatasetType::HeadShort,
            Self::Float => DatasetType::Overlay,
            Self::Rgb => DatasetType::Rgb,
            Self::Vectors => DatasetType::Vectors,
        }
    }
}

/// Voxel payload of an anatomy dataset, already normalized to `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeData {
    dims: VolumeDims,
    format: VoxelFormat,
    values: Vec<f32>,
}

impl VolumeData {
    /// Creates a volume, checking that `values` covers the grid exactly.
    pub fn new(
        dims: VolumeDims,
        format: VoxelFormat,
        values: Vec<f32>,
    ) -> std::result::Result<Self, ParseError> {
        let expected = dims.voxel_count() * format.components();
        if values.len() != expected {
            return Err(ParseError::Data(format!(
                "expected {expected} values for a {dims} grid, got {}",
                values.len()
            )));
        }
        Ok(Self {
            dims,
            format,
            values,
        })
    }

    #[must_use]
    pub fn dims(&self) -> VolumeDims {
        self.dims
    }

    #[must_use]
    pub fn format(&self) -> VoxelFormat {
        self.format
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// First component of the voxel at `(x, y, z)`.
    #[must_use]
    pub fn scalar(&self, x: u32, y: u32, z: u32) -> f32 {
        self.values[self.dims.index(x, y, z) * self.format.components()]
    }

    /// Three components of the voxel at `(x, y, z)`; scalar volumes repeat the value.
    #[must_use]
    pub fn vector(&self, x: u32, y: u32, z: u32) -> Vec3 {
        let i = self.dims.index(x, y, z);
        if self.format.components() == 3 {
            Vec3::from_slice(&self.values[i * 3..i * 3 + 3])
        } else {
            Vec3::splat(self.values[i])
        }
    }

    /// Expands the voxels to RGBA for texture upload.
    ///
    /// Scalars are replicated into the color channels; vector fields store
    /// their absolute components so the texture doubles as a direction map.
    #[must_use]
    pub fn to_rgba(&self) -> Vec<f32> {
        let mut rgba = Vec::with_capacity(self.dims.voxel_count() * 4);
        match self.format {
            VoxelFormat::Byte | VoxelFormat::Short | VoxelFormat::Float => {
                for &v in &self.values {
                    rgba.extend_from_slice(&[v, v, v, 1.0]);
                }
            }
            VoxelFormat::Rgb => {
                for c in self.values.chunks_exact(3) {
                    rgba.extend_from_slice(&[c[0], c[1], c[2], 1.0]);
                }
            }
            VoxelFormat::Vectors => {
                for c in self.values.chunks_exact(3) {
                    rgba.extend_from_slice(&[c[0].abs(), c[1].abs(), c[2].abs(), 1.0]);
                }
            }
        }
        rgba
    }
}

/// Containment queries used by the selection tree.
pub trait FiberGeometry {
    /// Number of fibers.
    fn fiber_count(&self) -> usize;

    /// Returns true if fiber `fiber` passes through the box `[min, max]`.
    fn fiber_intersects(&self, fiber: usize, min: Vec3, max: Vec3) -> bool;
}

/// A bundle of streamlines stored as one flat point array.
#[derive(Debug, Clone, PartialEq)]
pub struct FiberData {
    points: Vec<Vec3>,
    /// `offsets[i]..offsets[i + 1]` are the points of fiber `i`.
    offsets: Vec<usize>,
    bounds: Vec<(Vec3, Vec3)>,
    visible: Vec<bool>,
}

impl FiberData {
    /// Builds a bundle from individual polylines.
    pub fn new<I>(polylines: I) -> Self
    where
        I: IntoIterator<Item = Vec<Vec3>>,
    {
        let mut points = Vec::new();
        let mut offsets = vec![0];
        let mut bounds = Vec::new();
        for line in polylines {
            let (min, max) = line.iter().fold(
                (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
                |(lo, hi), p| (lo.min(*p), hi.max(*p)),
            );
            bounds.push((min, max));
            points.extend(line);
            offsets.push(points.len());
        }
        let count = bounds.len();
        Self {
            points,
            offsets,
            bounds,
            visible: vec![true; count],
        }
    }

    #[must_use]
    pub fn fiber_count(&self) -> usize {
        self.bounds.len()
    }

    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Points of fiber `i`.
    #[must_use]
    pub fn fiber(&self, i: usize) -> &[Vec3] {
        &self.points[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Axis-aligned bounds of fiber `i`.
    #[must_use]
    pub fn bounds(&self, i: usize) -> (Vec3, Vec3) {
        self.bounds[i]
    }

    /// Per-fiber visibility from the last selection evaluation.
    #[must_use]
    pub fn visible(&self) -> &[bool] {
        &self.visible
    }

    /// Replaces the visibility vector.
    pub fn set_visible(&mut self, visible: Vec<bool>) {
        assert_eq!(
            visible.len(),
            self.bounds.len(),
            "fiber visibility must cover every fiber"
        );
        self.visible = visible;
    }

    /// Iterates over all fibers in order.
    pub fn iter(&self) -> impl Iterator<Item = &[Vec3]> + '_ {
        self.offsets.windows(2).map(|w| &self.points[w[0]..w[1]])
    }
}

impl FiberGeometry for FiberData {
    fn fiber_count(&self) -> usize {
        self.bounds.len()
    }

    fn fiber_intersects(&self, fiber: usize, min: Vec3, max: Vec3) -> bool {
        let (lo, hi) = self.bounds[fiber];
        if lo.cmpgt(max).any() || hi.cmplt(min).any() {
            return false;
        }
        let line = self.fiber(fiber);
        match line {
            [] => false,
            [p] => p.cmpge(min).all() && p.cmple(max).all(),
            _ => line
                .windows(2)
                .any(|s| segment_hits_box(s[0], s[1], min, max)),
        }
    }
}

/// Slab test of the segment `a..b` against the box `[min, max]`.
fn segment_hits_box(a: Vec3, b: Vec3, min: Vec3, max: Vec3) -> bool {
    let d = b - a;
    let mut t0 = 0.0_f32;
    let mut t1 = 1.0_f32;
    for axis in 0..3 {
        if d[axis].abs() < f32::EPSILON {
            if a[axis] < min[axis] || a[axis] > max[axis] {
                return false;
            }
            continue;
        }
        let inv = 1.0 / d[axis];
        let mut near = (min[axis] - a[axis]) * inv;
        let mut far = (max[axis] - a[axis]) * inv;
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }
        t0 = t0.max(near);
        t1 = t1.min(far);
        if t0 > t1 {
            return false;
        }
    }
    true
}

/// Indexed triangle geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl MeshData {
    /// Creates a mesh and computes area-weighted vertex normals.
    #[must_use]
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        let mut normals = vec![Vec3::ZERO; vertices.len()];
        for &[a, b, c] in &triangles {
            let (a, b, c) = (a as usize, b as usize, c as usize);
            if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
                continue;
            }
            let n = (vertices[b] - vertices[a]).cross(vertices[c] - vertices[a]);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        Self {
            vertices,
            normals,
            triangles,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Axis-aligned bounds, or `None` for an empty mesh.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
        )
    }
}

/// A spline surface through user-placed control points.
///
/// The surface is a height field `x = f(y, z)` over the control points'
/// y/z bounds, interpolated by inverse distance weighting.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceData {
    points: Vec<Vec3>,
    mesh: MeshData,
}

impl SurfaceData {
    /// Fits a surface of `resolution` × `resolution` cells through `points`.
    #[must_use]
    pub fn from_points(points: Vec<Vec3>, resolution: u32) -> Self {
        let mesh = if points.len() < 3 || resolution == 0 {
            MeshData::default()
        } else {
            fit_height_field(&points, resolution)
        };
        Self { points, mesh }
    }

    #[must_use]
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    #[must_use]
    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }
}

fn fit_height_field(points: &[Vec3], resolution: u32) -> MeshData {
    let (lo, hi) = points.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(lo, hi), p| (lo.min(*p), hi.max(*p)),
    );
    let n = resolution + 1;
    let mut vertices = Vec::with_capacity((n * n) as usize);
    for iz in 0..n {
        for iy in 0..n {
            let y = lo.y + (hi.y - lo.y) * iy as f32 / resolution as f32;
            let z = lo.z + (hi.z - lo.z) * iz as f32 / resolution as f32;
            let mut weight_sum = 0.0;
            let mut x_sum = 0.0;
            let mut exact = None;
            for p in points {
                let d2 = (p.y - y).powi(2) + (p.z - z).powi(2);
                if d2 < 1e-6 {
                    exact = Some(p.x);
                    break;
                }
                let w = 1.0 / d2;
                weight_sum += w;
                x_sum += w * p.x;
            }
            let x = exact.unwrap_or(x_sum / weight_sum);
            vertices.push(Vec3::new(x, y, z));
        }
    }
    let mut triangles = Vec::with_capacity((resolution * resolution * 2) as usize);
    for iz in 0..resolution {
        for iy in 0..resolution {
            let i = iz * n + iy;
            triangles.push([i, i + 1, i + n]);
            triangles.push([i + 1, i + n + 1, i + n]);
        }
    }
    MeshData::new(vertices, triangles)
}

/// Symmetric diffusion tensors, one per voxel, stored as `xx xy xz yy yz zz`.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorField {
    dims: VolumeDims,
    tensors: Vec<[f32; 6]>,
}

impl TensorField {
    pub fn new(dims: VolumeDims, tensors: Vec<[f32; 6]>) -> std::result::Result<Self, ParseError> {
        if tensors.len() != dims.voxel_count() {
            return Err(ParseError::Data(format!(
                "expected {} tensors, got {}",
                dims.voxel_count(),
                tensors.len()
            )));
        }
        Ok(Self { dims, tensors })
    }

    #[must_use]
    pub fn dims(&self) -> VolumeDims {
        self.dims
    }

    #[must_use]
    pub fn tensor(&self, x: u32, y: u32, z: u32) -> [f32; 6] {
        self.tensors[self.dims.index(x, y, z)]
    }
}

/// Orientation distribution functions sampled on a shared direction set.
#[derive(Debug, Clone, PartialEq)]
pub struct OdfField {
    dims: VolumeDims,
    directions: Vec<Vec3>,
    radii: Vec<f32>,
}

impl OdfField {
    pub fn new(
        dims: VolumeDims,
        directions: Vec<Vec3>,
        radii: Vec<f32>,
    ) -> std::result::Result<Self, ParseError> {
        let expected = dims.voxel_count() * directions.len();
        if radii.len() != expected {
            return Err(ParseError::Data(format!(
                "expected {expected} ODF samples, got {}",
                radii.len()
            )));
        }
        Ok(Self {
            dims,
            directions,
            radii,
        })
    }

    #[must_use]
    pub fn dims(&self) -> VolumeDims {
        self.dims
    }

    #[must_use]
    pub fn directions(&self) -> &[Vec3] {
        &self.directions
    }

    /// Radii of the ODF at `(x, y, z)`, one per direction.
    #[must_use]
    pub fn radii(&self, x: u32, y: u32, z: u32) -> &[f32] {
        let n = self.directions.len();
        let i = self.dims.index(x, y, z) * n;
        &self.radii[i..i + n]
    }
}

/// Kind-specific payload of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetData {
    Anatomy(VolumeData),
    Fibers(FiberData),
    Mesh(MeshData),
    Surface(SurfaceData),
    Tensors(TensorField),
    Odfs(OdfField),
    IsoSurface(MeshData),
}

impl DatasetData {
    #[must_use]
    pub fn kind(&self) -> DatasetKind {
        match self {
            Self::Anatomy(_) => DatasetKind::Anatomy,
            Self::Fibers(_) => DatasetKind::Fibers,
            Self::Mesh(_) => DatasetKind::Mesh,
            Self::Surface(_) => DatasetKind::Surface,
            Self::Tensors(_) => DatasetKind::Tensors,
            Self::Odfs(_) => DatasetKind::Odfs,
            Self::IsoSurface(_) => DatasetKind::IsoSurface,
        }
    }

    #[must_use]
    pub fn dataset_type(&self) -> DatasetType {
        match self {
            Self::Anatomy(v) => v.format().dataset_type(),
            Self::Fibers(_) => DatasetType::Fibers,
            Self::Mesh(_) => DatasetType::Mesh,
            Self::Surface(_) => DatasetType::Surface,
            Self::Tensors(_) => DatasetType::Tensors,
            Self::Odfs(_) => DatasetType::Odfs,
            Self::IsoSurface(_) => DatasetType::IsoSurface,
        }
    }

    /// Grid of voxel-based payloads.
    #[must_use]
    pub fn dims(&self) -> Option<VolumeDims> {
        match self {
            Self::Anatomy(v) => Some(v.dims()),
            Self::Tensors(t) => Some(t.dims()),
            Self::Odfs(o) => Some(o.dims()),
            Self::Fibers(_) | Self::Mesh(_) | Self::Surface(_) | Self::IsoSurface(_) => None,
        }
    }
}

/// Display attributes shared by every dataset kind.
///
/// This is also the per-dataset status persisted in scene documents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetStatus {
    /// Whether the dataset is drawn.
    pub visible: bool,
    /// Values below this are discarded by the slice shader.
    pub threshold: f32,
    /// Opacity.
    pub alpha: f32,
    /// Linear texture filtering instead of nearest.
    pub full_smoothing: bool,
    /// Color meshes from the bound volume textures.
    pub use_tex: bool,
    /// Line integral convolution shading.
    pub use_lic: bool,
    /// Draw front-facing triangles. Turning this off opens closed surfaces.
    pub show_fs: bool,
    /// Draw as glyph geometry.
    pub is_glyph: bool,
    /// Base color.
    pub color: Vec4,
}

impl Default for DatasetStatus {
    fn default() -> Self {
        Self {
            visible: true,
            threshold: 0.0,
            alpha: 1.0,
            full_smoothing: true,
            use_tex: true,
            use_lic: false,
            show_fs: true,
            is_glyph: false,
            color: Vec4::ONE,
        }
    }
}

/// A loaded dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    path: PathBuf,
    /// Display attributes.
    pub status: DatasetStatus,
    data: DatasetData,
    texture: Option<TextureId>,
}

impl Dataset {
    /// Creates a non-resident dataset.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, data: DatasetData) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            status: DatasetStatus::default(),
            data,
            texture: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn data(&self) -> &DatasetData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DatasetData {
        &mut self.data
    }

    #[must_use]
    pub fn kind(&self) -> DatasetKind {
        self.data.kind()
    }

    #[must_use]
    pub fn dataset_type(&self) -> DatasetType {
        self.data.dataset_type()
    }

    /// Returns true for texture-backed volumes (ranked below `Mesh`).
    #[must_use]
    pub fn is_volume(&self) -> bool {
        self.dataset_type() < DatasetType::Mesh
    }

    #[must_use]
    pub fn volume(&self) -> Option<&VolumeData> {
        match &self.data {
            DatasetData::Anatomy(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn fibers(&self) -> Option<&FiberData> {
        match &self.data {
            DatasetData::Fibers(f) => Some(f),
            _ => None,
        }
    }

    pub fn fibers_mut(&mut self) -> Option<&mut FiberData> {
        match &mut self.data {
            DatasetData::Fibers(f) => Some(f),
            _ => None,
        }
    }

    /// Triangle geometry of meshes, iso-surfaces and spline surfaces.
    #[must_use]
    pub fn mesh(&self) -> Option<&MeshData> {
        match &self.data {
            DatasetData::Mesh(m) | DatasetData::IsoSurface(m) => Some(m),
            DatasetData::Surface(s) => Some(s.mesh()),
            _ => None,
        }
    }

    #[must_use]
    pub fn surface(&self) -> Option<&SurfaceData> {
        match &self.data {
            DatasetData::Surface(s) => Some(s),
            _ => None,
        }
    }

    /// The GPU texture, present only while resident.
    #[must_use]
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    #[must_use]
    pub fn is_resident(&self) -> bool {
        self.texture.is_some()
    }

    /// Records the texture uploaded for this dataset.
    pub fn set_texture(&mut self, texture: TextureId) {
        self.texture = Some(texture);
    }

    /// Gives up the texture handle, leaving the dataset non-resident.
    pub fn take_texture(&mut self) -> Option<TextureId> {
        self.texture.take()
    }
}
