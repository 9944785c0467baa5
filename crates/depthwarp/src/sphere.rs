//! Inside-out UV sphere shared by every layer.

use glam::Vec3;

/// One vertex of the sphere mesh. Must match the vertex inputs in `common.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SphereVertex {
    /// Undisplaced position on the sphere.
    pub position: [f32; 3],
    /// Equirectangular texture coordinate, origin at the top-left image corner.
    pub uv: [f32; 2],
}

/// An inverted (viewer-enclosing) UV sphere. Immutable once built.
#[derive(Debug, Clone)]
pub struct SphereGeometry {
    width_segments: u32,
    height_segments: u32,
    vertices: Vec<SphereVertex>,
    indices: Vec<u32>,
}

impl SphereGeometry {
    pub const DEFAULT_RADIUS: f32 = 6.0;
    pub const DEFAULT_SEGMENTS: u32 = 256;

    /// Builds a `(width_segments + 1) x (height_segments + 1)` vertex grid.
    ///
    /// `u` runs with azimuth, `v` from the north pole (0) to the south pole (1).
    /// The X axis is mirrored so the texture reads correctly from inside.
    pub fn inverted(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let ws = width_segments.max(3);
        let hs = height_segments.max(2);

        let mut vertices = Vec::with_capacity(((ws + 1) * (hs + 1)) as usize);
        for iy in 0..=hs {
            let v = iy as f32 / hs as f32;
            let theta = v * std::f32::consts::PI;
            let (sin_t, cos_t) = theta.sin_cos();

            for ix in 0..=ws {
                let u = ix as f32 / ws as f32;
                let phi = u * std::f32::consts::TAU;
                let (sin_p, cos_p) = phi.sin_cos();

                // Outward sphere, then mirrored in X.
                let x = -radius * cos_p * sin_t;
                let y = radius * cos_t;
                let z = radius * sin_p * sin_t;

                vertices.push(SphereVertex {
                    position: [-x, y, z],
                    uv: [u, v],
                });
            }
        }

        let stride = ws + 1;
        let mut indices = Vec::with_capacity((ws * hs * 6) as usize);
        for iy in 0..hs {
            for ix in 0..ws {
                let a = iy * stride + ix + 1;
                let b = iy * stride + ix;
                let c = (iy + 1) * stride + ix;
                let d = (iy + 1) * stride + ix + 1;

                // The pole rows collapse to a single point; skip their degenerate halves.
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != hs - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        Self {
            width_segments: ws,
            height_segments: hs,
            vertices,
            indices,
        }
    }

    #[inline]
    pub fn segments(&self) -> (u32, u32) {
        (self.width_segments, self.height_segments)
    }

    #[inline]
    pub fn vertices(&self) -> &[SphereVertex] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn position(&self, index: usize) -> Vec3 {
        Vec3::from(self.vertices[index].position)
    }
}

impl Default for SphereGeometry {
    fn default() -> Self {
        Self::inverted(Self::DEFAULT_RADIUS, Self::DEFAULT_SEGMENTS, Self::DEFAULT_SEGMENTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertices_lie_on_radius() {
        let g = SphereGeometry::inverted(6.0, 16, 8);
        assert_eq!(g.vertices().len(), 17 * 9);
        for v in g.vertices() {
            let r = Vec3::from(v.position).length();
            assert!((r - 6.0).abs() < 1e-4, "radius {r}");
        }
    }

    #[test]
    fn index_count_skips_pole_triangles() {
        let g = SphereGeometry::inverted(1.0, 16, 8);
        // Two triangles per quad, minus one per quad on each pole row.
        assert_eq!(g.indices().len(), (16 * 8 * 2 - 16 * 2) * 3);
        let max = *g.indices().iter().max().unwrap() as usize;
        assert!(max < g.vertices().len());
    }

    #[test]
    fn uv_covers_unit_square() {
        let g = SphereGeometry::inverted(1.0, 4, 4);
        let first = g.vertices().first().unwrap();
        let last = g.vertices().last().unwrap();
        assert_eq!(first.uv, [0.0, 0.0]);
        assert_eq!(last.uv, [1.0, 1.0]);
        // North pole at v = 0.
        assert!((first.position[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mirrored_in_x() {
        let g = SphereGeometry::inverted(1.0, 4, 2);
        // Equator, u = 0: outward x would be -1; mirrored is +1.
        let equator_start = g.position(5);
        assert!((equator_start.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn segment_counts_have_a_floor() {
        let g = SphereGeometry::inverted(1.0, 0, 0);
        assert_eq!(g.segments(), (3, 2));
    }
}
