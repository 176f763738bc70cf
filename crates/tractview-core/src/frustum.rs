//! View frustum planes and their cache.

use glam::{Mat4, Vec3, Vec4};

/// Index of a plane in [`Frustum::planes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    Right = 0,
    Left = 1,
    Bottom = 2,
    Top = 3,
    Far = 4,
    Near = 5,
}

/// Six clip planes `(A, B, C, D)` with unit normals pointing into the frustum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extracts the planes of `projection * modelview`.
    ///
    /// Uses OpenGL clip conventions (`-w <= z <= w`).
    #[must_use]
    pub fn from_matrices(projection: &Mat4, modelview: &Mat4) -> Self {
        let clip = *projection * *modelview;
        let (r0, r1, r2, r3) = (clip.row(0), clip.row(1), clip.row(2), clip.row(3));
        let planes = [r3 - r0, r3 + r0, r3 + r1, r3 - r1, r3 - r2, r3 + r2].map(normalize_plane);
        Self { planes }
    }

    /// All planes in the order right, left, bottom, top, far, near.
    #[must_use]
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    #[must_use]
    pub fn plane(&self, side: PlaneSide) -> Vec4 {
        self.planes[side as usize]
    }

    /// Signed distance of `point` from the plane; positive is inside.
    #[must_use]
    pub fn distance(&self, side: PlaneSide, point: Vec3) -> f32 {
        self.plane(side).dot(point.extend(1.0))
    }

    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        let p = point.extend(1.0);
        self.planes.iter().all(|plane| plane.dot(p) >= 0.0)
    }

    /// Conservative box test: false only if the box is fully outside one plane.
    #[must_use]
    pub fn intersects_aabb(&self, min: Vec3, max: Vec3) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            let positive = Vec3::select(normal.cmpge(Vec3::ZERO), max, min);
            normal.dot(positive) + plane.w >= 0.0
        })
    }
}

impl Default for Frustum {
    fn default() -> Self {
        Self {
            planes: [Vec4::ZERO; 6],
        }
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let length = plane.truncate().length();
    if length > 0.0 {
        plane / length
    } else {
        plane
    }
}

/// Frustum recomputed only when the camera matrices change.
#[derive(Debug, Clone)]
pub struct FrustumCache {
    projection: Mat4,
    modelview: Mat4,
    frustum: Frustum,
    generation: u64,
}

impl Default for FrustumCache {
    fn default() -> Self {
        Self {
            projection: Mat4::ZERO,
            modelview: Mat4::ZERO,
            frustum: Frustum::default(),
            generation: 0,
        }
    }
}

impl FrustumCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the planes for the given matrices, recomputing them only if
    /// either matrix differs bit-for-bit from the previous call.
    pub fn update(&mut self, projection: &Mat4, modelview: &Mat4) -> &Frustum {
        if !bits_equal(projection, &self.projection) || !bits_equal(modelview, &self.modelview) {
            self.projection = *projection;
            self.modelview = *modelview;
            self.frustum = Frustum::from_matrices(projection, modelview);
            self.generation += 1;
            log::debug!("frustum recomputed (generation {})", self.generation);
        }
        &self.frustum
    }

    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Number of recomputations so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn bits_equal(a: &Mat4, b: &Mat4) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| x.to_bits() == y.to_bits())
}
