//! Vertex builders for every render pass.
//!
//! All positions are in grid space: one unit per voxel, the origin at the
//! corner of voxel `(0, 0, 0)`. Voxel centers sit at `index + 0.5`.

use glam::{UVec3, Vec3, Vec4};
use tractview_core::{
    Axis, BoxRole, FiberData, Frustum, MeshData, OdfField, SelectionBox, TensorField, VolumeData,
    VolumeDims, VoxelFormat,
};

use crate::backend::GpuVertex;
use crate::color_maps::ColorMap;

const CROSSHAIR_COLOR: Vec4 = Vec4::new(1.0, 1.0, 0.0, 1.0);
const MASTER_COLOR: Vec4 = Vec4::new(0.0, 1.0, 1.0, 1.0);
const AND_COLOR: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);
const NOT_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
const POINT_COLOR: Vec4 = Vec4::new(1.0, 0.2, 0.2, 1.0);
const POINT_HALF_SIZE: f32 = 0.75;

/// Number of tick marks under the legend bar.
pub const LEGEND_TICKS: usize = 5;
const LEGEND_SEGMENTS: usize = 32;

/// Normalized texture coordinate of a grid-space position.
fn texcoord(p: Vec3, dims: &VolumeDims) -> Vec3 {
    let size = dims.as_uvec3().as_vec3().max(Vec3::ONE);
    p / size
}

fn push_quad(out: &mut Vec<GpuVertex>, corners: [Vec3; 4], normal: Vec3, color: Vec4, dims: &VolumeDims) {
    let v = |p: Vec3| GpuVertex::new(p, normal, color, texcoord(p, dims));
    out.extend([
        v(corners[0]),
        v(corners[1]),
        v(corners[2]),
        v(corners[0]),
        v(corners[2]),
        v(corners[3]),
    ]);
}

/// Textured quads of the enabled axial, coronal and sagittal slices.
///
/// Each plane passes through the center of its slice, so the texture is
/// sampled at `(slice + 0.5) / dim` along the slice axis.
pub fn slice_quads(dims: &VolumeDims, slices: UVec3, show: [bool; 3]) -> Vec<GpuVertex> {
    let size = dims.as_uvec3().as_vec3();
    let pos = slices.as_vec3() + Vec3::splat(0.5);
    let mut out = Vec::with_capacity(18);
    if show[Axis::Z.index()] {
        let z = pos.z;
        push_quad(
            &mut out,
            [
                Vec3::new(0.0, 0.0, z),
                Vec3::new(size.x, 0.0, z),
                Vec3::new(size.x, size.y, z),
                Vec3::new(0.0, size.y, z),
            ],
            Vec3::Z,
            Vec4::ONE,
            dims,
        );
    }
    if show[Axis::Y.index()] {
        let y = pos.y;
        push_quad(
            &mut out,
            [
                Vec3::new(0.0, y, 0.0),
                Vec3::new(size.x, y, 0.0),
                Vec3::new(size.x, y, size.z),
                Vec3::new(0.0, y, size.z),
            ],
            Vec3::Y,
            Vec4::ONE,
            dims,
        );
    }
    if show[Axis::X.index()] {
        let x = pos.x;
        push_quad(
            &mut out,
            [
                Vec3::new(x, 0.0, 0.0),
                Vec3::new(x, size.y, 0.0),
                Vec3::new(x, size.y, size.z),
                Vec3::new(x, 0.0, size.z),
            ],
            Vec3::X,
            Vec4::ONE,
            dims,
        );
    }
    out
}

/// Three lines through the current slice position.
pub fn crosshair(dims: &VolumeDims, slices: UVec3) -> Vec<GpuVertex> {
    let size = dims.as_uvec3().as_vec3();
    let p = slices.as_vec3() + Vec3::splat(0.5);
    let line = |a: Vec3, b: Vec3| [GpuVertex::colored(a, CROSSHAIR_COLOR), GpuVertex::colored(b, CROSSHAIR_COLOR)];
    let mut out = Vec::with_capacity(6);
    out.extend(line(Vec3::new(0.0, p.y, p.z), Vec3::new(size.x, p.y, p.z)));
    out.extend(line(Vec3::new(p.x, 0.0, p.z), Vec3::new(p.x, size.y, p.z)));
    out.extend(line(Vec3::new(p.x, p.y, 0.0), Vec3::new(p.x, p.y, size.z)));
    out
}

/// One line per voxel of the axial slice, along the voxel's vector.
///
/// Glyph intensity is `min(1, |v| * 1.2)`. With `use_tex` the glyph takes
/// the direction color of the vector, otherwise `color`.
pub fn vector_glyphs(volume: &VolumeData, slice: u32, use_tex: bool, color: Vec4) -> Vec<GpuVertex> {
    if volume.format() != VoxelFormat::Vectors {
        return Vec::new();
    }
    let dims = volume.dims();
    let z = slice.min(dims.frames.saturating_sub(1));
    let mut out = Vec::new();
    for y in 0..dims.rows {
        for x in 0..dims.columns {
            let v = volume.vector(x, y, z);
            let len = v.length();
            if len <= f32::EPSILON {
                continue;
            }
            let intensity = (len * 1.2).min(1.0);
            let c = if use_tex {
                (v.abs() / len * intensity).extend(1.0)
            } else {
                (color.truncate() * intensity).extend(color.w)
            };
            let center = Vec3::new(x as f32, y as f32, z as f32) + Vec3::splat(0.5);
            out.push(GpuVertex::colored(center - v * 0.5, c));
            out.push(GpuVertex::colored(center + v * 0.5, c));
        }
    }
    out
}

/// Principal-axis crosses for the tensors on the axial slice.
///
/// Each voxel gets three lines along x, y and z scaled by the diagonal
/// entries, normalized by the largest diagonal in the slice.
pub fn tensor_glyphs(field: &TensorField, slice: u32) -> Vec<GpuVertex> {
    let dims = field.dims();
    let z = slice.min(dims.frames.saturating_sub(1));
    let diag = |t: [f32; 6]| Vec3::new(t[0].abs(), t[3].abs(), t[5].abs());
    let mut max = 0.0_f32;
    for y in 0..dims.rows {
        for x in 0..dims.columns {
            max = max.max(diag(field.tensor(x, y, z)).max_element());
        }
    }
    if max <= 0.0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for y in 0..dims.rows {
        for x in 0..dims.columns {
            let d = diag(field.tensor(x, y, z)) / max * 0.5;
            let center = Vec3::new(x as f32, y as f32, z as f32) + Vec3::splat(0.5);
            for (axis, len) in [(Vec3::X, d.x), (Vec3::Y, d.y), (Vec3::Z, d.z)] {
                if len <= 0.0 {
                    continue;
                }
                let c = axis.extend(1.0);
                out.push(GpuVertex::colored(center - axis * len, c));
                out.push(GpuVertex::colored(center + axis * len, c));
            }
        }
    }
    out
}

/// Star glyphs of the ODFs on the axial slice: one spoke per direction.
pub fn odf_glyphs(field: &OdfField, slice: u32) -> Vec<GpuVertex> {
    let dims = field.dims();
    let z = slice.min(dims.frames.saturating_sub(1));
    let mut out = Vec::new();
    for y in 0..dims.rows {
        for x in 0..dims.columns {
            let radii = field.radii(x, y, z);
            let max = radii.iter().copied().fold(0.0_f32, f32::max);
            if max <= 0.0 {
                continue;
            }
            let center = Vec3::new(x as f32, y as f32, z as f32) + Vec3::splat(0.5);
            for (dir, r) in field.directions().iter().zip(radii) {
                let c = dir.abs().normalize_or_zero().extend(1.0);
                out.push(GpuVertex::colored(center, c));
                out.push(GpuVertex::colored(center + *dir * (r / max * 0.5), c));
            }
        }
    }
    out
}

/// Flat triangle list of a mesh.
///
/// Triangles referencing a vertex past the end of the vertex list are skipped.
pub fn mesh_triangles(mesh: &MeshData, color: Vec4, dims: &VolumeDims) -> Vec<GpuVertex> {
    let mut out = Vec::with_capacity(mesh.triangles.len() * 3);
    let mut skipped = 0_usize;
    for tri in &mesh.triangles {
        let Some(corners) = tri
            .iter()
            .map(|&i| mesh.vertices.get(i as usize).map(|&p| (i as usize, p)))
            .collect::<Option<Vec<_>>>()
        else {
            skipped += 1;
            continue;
        };
        for (i, p) in corners {
            let n = mesh.normals.get(i).copied().unwrap_or(Vec3::Z);
            out.push(GpuVertex::new(p, n, color, texcoord(p, dims)));
        }
    }
    if skipped > 0 {
        log::warn!(
            "skipped {skipped} of {} mesh triangles with out-of-range vertex indices",
            mesh.triangles.len()
        );
    }
    out
}

/// Line segments of the visible fibers that reach into the frustum.
///
/// Segments are colored by the absolute value of their direction.
pub fn fiber_lines(fibers: &FiberData, frustum: &Frustum) -> Vec<GpuVertex> {
    let mut out = Vec::new();
    for (i, &shown) in fibers.visible().iter().enumerate() {
        if !shown {
            continue;
        }
        let (min, max) = fibers.bounds(i);
        if !frustum.intersects_aabb(min, max) {
            continue;
        }
        for seg in fibers.fiber(i).windows(2) {
            let c = (seg[1] - seg[0]).normalize_or_zero().abs().extend(1.0);
            out.push(GpuVertex::colored(seg[0], c));
            out.push(GpuVertex::colored(seg[1], c));
        }
    }
    out
}

/// Color of a selection box wireframe by role.
#[must_use]
pub fn box_color(role: BoxRole) -> Vec4 {
    match role {
        BoxRole::Master => MASTER_COLOR,
        BoxRole::And => AND_COLOR,
        BoxRole::Not => NOT_COLOR,
    }
}

/// The twelve edges of a selection box.
pub fn box_wireframe(b: &SelectionBox) -> Vec<GpuVertex> {
    let (lo, hi) = (b.min(), b.max());
    let mut color = box_color(b.role());
    if !b.is_active() {
        color.w *= 0.3;
    }
    let corner = |i: usize| {
        Vec3::new(
            if i & 1 == 0 { lo.x } else { hi.x },
            if i & 2 == 0 { lo.y } else { hi.y },
            if i & 4 == 0 { lo.z } else { hi.z },
        )
    };
    let mut out = Vec::with_capacity(24);
    for a in 0..8 {
        for bit in [1, 2, 4] {
            if a & bit == 0 {
                out.push(GpuVertex::colored(corner(a), color));
                out.push(GpuVertex::colored(corner(a | bit), color));
            }
        }
    }
    out
}

/// Small cubes marking the spline control points.
pub fn point_markers(points: &[Vec3]) -> Vec<GpuVertex> {
    const FACES: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];
    let mut out = Vec::with_capacity(points.len() * 36);
    for &p in points {
        for (n, u, v) in FACES {
            let c = p + n * POINT_HALF_SIZE;
            let (u, v) = (u * POINT_HALF_SIZE, v * POINT_HALF_SIZE);
            let quad = [c - u - v, c + u - v, c + u + v, c - u + v];
            let vert = |q: Vec3| GpuVertex::new(q, n, POINT_COLOR, Vec3::ZERO);
            out.extend([
                vert(quad[0]),
                vert(quad[1]),
                vert(quad[2]),
                vert(quad[0]),
                vert(quad[2]),
                vert(quad[3]),
            ]);
        }
    }
    out
}

/// One line between every pair of spline points.
///
/// Edge `(i, j)` is colored `(i / 10, j / 10, i + j / 20)`, clamped to 1.
pub fn point_graph(points: &[Vec3]) -> Vec<GpuVertex> {
    let mut out = Vec::new();
    for (i, &a) in points.iter().enumerate() {
        for (j, &b) in points.iter().enumerate().skip(i + 1) {
            let (fi, fj) = (i as f32, j as f32);
            let color = Vec3::new(fi / 10.0, fj / 10.0, fi + fj / 20.0)
                .min(Vec3::ONE)
                .extend(1.0);
            let normal = a - b;
            out.push(GpuVertex::new(a, normal, color, Vec3::ZERO));
            out.push(GpuVertex::new(b, normal, color, Vec3::ZERO));
        }
    }
    out
}

/// Legend bar and its tick marks, in overlay coordinates.
///
/// The bar spans `size - 60` to `size - 20` horizontally at `y = 10`.
pub fn legend(size: f32, map: &ColorMap) -> (Vec<GpuVertex>, Vec<GpuVertex>) {
    let (x0, x1) = (size - 60.0, size - 20.0);
    let (y0, y1) = (10.0, 14.0);
    let mut bar = Vec::with_capacity(LEGEND_SEGMENTS * 6);
    for i in 0..LEGEND_SEGMENTS {
        let t0 = i as f32 / LEGEND_SEGMENTS as f32;
        let t1 = (i + 1) as f32 / LEGEND_SEGMENTS as f32;
        let (a, b) = (x0 + (x1 - x0) * t0, x0 + (x1 - x0) * t1);
        let (c0, c1) = (map.sample_rgba(t0), map.sample_rgba(t1));
        let v = |x: f32, y: f32, c: Vec4| GpuVertex::new(Vec3::new(x, y, 0.0), Vec3::Z, c, Vec3::new((x - x0) / (x1 - x0), 0.0, 0.0));
        bar.extend([
            v(a, y0, c0),
            v(b, y0, c1),
            v(b, y1, c1),
            v(a, y0, c0),
            v(b, y1, c1),
            v(a, y1, c0),
        ]);
    }
    let mut ticks = Vec::with_capacity(LEGEND_TICKS * 2);
    for i in 0..LEGEND_TICKS {
        let x = x0 + (x1 - x0) * i as f32 / (LEGEND_TICKS - 1) as f32;
        ticks.push(GpuVertex::colored(Vec3::new(x, y0 - 4.0, 0.0), Vec4::ONE));
        ticks.push(GpuVertex::colored(Vec3::new(x, y0, 0.0), Vec4::ONE));
    }
    (bar, ticks)
}
