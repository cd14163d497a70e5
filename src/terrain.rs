//! Heightfield terrain.
//!
//! A [`Heightfield`] turns an RGBA heightmap into a square grid mesh and
//! answers continuous height queries over it. The grid edge length is
//! `ceil(sqrt(pixels))`; grid point `(x, z)` reads pixel `x * size + z`, so the
//! image row runs along X.
//!
//! Two sample encodings are understood:
//!
//! | [`BitDepth`] | Height |
//! |--------------|--------|
//! | `Eight`      | `(r + g + b) / 255 / 3 · size / 4` |
//! | `Sixteen`    | `(r │ g << 8 │ b << 16) / 255² · size / 4` |
//!
//! The `size / 4` factor ties vertical exaggeration to grid resolution.
//!
//! Queries go through [`Heightfield::height`], which maps world coordinates
//! into grid space using the terrain's [`Transform`] and blends the four
//! surrounding samples. Grid indices outside the field are clamped to the
//! border, so any finite input yields a height.

use glam::Vec3;
use image::RgbaImage;

use crate::camera::HeightQuery;
use crate::geometry::RawGeometry;
use crate::mesh::Vertex3d;
use crate::transform::Transform;

/// Encoding of height samples in the heightmap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BitDepth {
    #[default]
    Eight,
    Sixteen,
}

impl BitDepth {
    /// Maps a declared bit depth (8 or 16) to an encoding.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(BitDepth::Eight),
            16 => Some(BitDepth::Sixteen),
            _ => None,
        }
    }
}

/// Generation progress of a [`Heightfield`].
///
/// `Generating` is only held while [`Heightfield::generate`] runs, which
/// borrows the field mutably, so callers observe `Empty` or `Ready`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerrainState {
    Empty,
    Generating,
    Ready,
}

/// Grid terrain built from heightmap samples.
#[derive(Debug)]
pub struct Heightfield {
    state: TerrainState,
    samples: Vec<u8>,
    bit_depth: BitDepth,
    size: usize,
    geometry: RawGeometry,
}

impl Default for Heightfield {
    fn default() -> Self {
        Self {
            state: TerrainState::Empty,
            samples: Vec::new(),
            bit_depth: BitDepth::Eight,
            size: 0,
            geometry: RawGeometry::new(Vec::new(), Vec::new()),
        }
    }
}

impl Heightfield {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ready heightfield from RGBA samples.
    pub fn from_samples(samples: Vec<u8>, uv_repeat: f32, bit_depth: BitDepth) -> Self {
        let mut field = Self::new();
        field.generate(samples, uv_repeat, bit_depth);
        field
    }

    /// Builds a ready heightfield from a decoded image.
    pub fn from_image(image: &RgbaImage, uv_repeat: f32, bit_depth: BitDepth) -> Self {
        Self::from_samples(image.as_raw().clone(), uv_repeat, bit_depth)
    }

    pub fn state(&self) -> TerrainState {
        self.state
    }

    /// Grid edge length in samples.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn geometry(&self) -> &RawGeometry {
        &self.geometry
    }

    /// Replaces the samples and rebuilds the mesh.
    ///
    /// Vertices sit at `(x, h(x, z), z)`, each grid cell is split into the
    /// triangles `(x,z) (x,z+1) (x+1,z)` and `(x+1,z) (x,z+1) (x+1,z+1)`, and
    /// texture coordinates span `0..uv_repeat` across the field.
    pub fn generate(&mut self, samples: Vec<u8>, uv_repeat: f32, bit_depth: BitDepth) {
        self.state = TerrainState::Generating;
        self.size = ((samples.len() / 4) as f64).sqrt().ceil() as usize;
        self.samples = samples;
        self.bit_depth = bit_depth;

        let size = self.size;
        let uv_step = if size > 1 {
            uv_repeat / (size - 1) as f32
        } else {
            0.0
        };

        let mut vertices = Vec::with_capacity(size * size);
        for x in 0..size {
            for z in 0..size {
                let h = self.sample(x as i64, z as i64);
                vertices.push(Vertex3d::new(
                    [x as f32, h, z as f32],
                    [0.0, 0.0, 0.0],
                    [z as f32 * uv_step, x as f32 * uv_step],
                ));
            }
        }

        let cells = size.saturating_sub(1);
        let mut indices = Vec::with_capacity(cells * cells * 6);
        for x in 0..cells {
            for z in 0..cells {
                let here = (x * size + z) as u32;
                let right = here + 1;
                let below = here + size as u32;
                let diagonal = below + 1;
                indices.extend_from_slice(&[here, right, below, below, right, diagonal]);
            }
        }

        let mut geometry = RawGeometry::new(vertices, indices);
        geometry.recalculate_normals();
        geometry.generate_tangents();
        self.geometry = geometry;
        self.state = TerrainState::Ready;

        log::info!(
            "heightfield generated: {}x{} grid, {} vertices, {} indices",
            size,
            size,
            self.geometry.vertices.len(),
            self.geometry.indices.len()
        );
    }

    /// Stored height of grid point `(x, z)` in grid units.
    ///
    /// Indices are clamped to the grid; a point the sample buffer does not
    /// cover (non-square heightmaps) reads as zero.
    pub fn sample(&self, x: i64, z: i64) -> f32 {
        if self.size == 0 {
            return 0.0;
        }
        let last = self.size as i64 - 1;
        let (x, z) = (x.clamp(0, last) as usize, z.clamp(0, last) as usize);
        let offset = (x * self.size + z) * 4;
        let Some(px) = self.samples.get(offset..offset + 3) else {
            return 0.0;
        };
        let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
        let exaggeration = self.size as f32 / 4.0;
        match self.bit_depth {
            BitDepth::Eight => (r + g + b) as f32 / 255.0 / 3.0 * exaggeration,
            BitDepth::Sixteen => {
                (r | (g << 8) | (b << 16)) as f32 / (255.0 * 255.0) * exaggeration
            }
        }
    }

    /// World-space surface height under world `(x, z)`.
    ///
    /// `transform` is the terrain's own placement; only its translation and
    /// scale are used.
    pub fn height(&self, transform: &Transform, x: f32, z: f32) -> f32 {
        let t = transform.translation;
        let s = transform.scale;
        let real_x = (x - t.x) / s.x;
        let real_z = (z - t.z) / s.z;

        let (i, j) = (real_x.floor(), real_z.floor());
        let (fi, fj) = (real_x - i, real_z - j);
        let (nfi, nfj) = (1.0 - fi, 1.0 - fj);
        // One cell of margin keeps `i + 1` in range for huge inputs.
        let bound = self.size as i64;
        let (i, j) = ((i as i64).clamp(-1, bound), (j as i64).clamp(-1, bound));

        let near_row = self.sample(i, j) * nfi + self.sample(i + 1, j) * fi;
        let far_row = self.sample(i, j + 1) * nfi + self.sample(i + 1, j + 1) * fi;
        (near_row * nfj + far_row * fj) * s.y + t.y
    }

    /// Placement that centres the field on the origin at the given scale.
    pub fn centered(&self, scale: f32) -> Transform {
        let half = self.size as f32 * scale / 2.0;
        Transform::new()
            .position(Vec3::new(-half, 0.0, -half))
            .uniform_scale(scale)
    }
}

/// A heightfield together with its placement, usable as a walking surface.
pub struct TerrainView<'a> {
    pub field: &'a Heightfield,
    pub transform: &'a Transform,
}

impl HeightQuery for TerrainView<'_> {
    fn height(&self, x: f32, z: f32) -> f32 {
        self.field.height(self.transform, x, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `size x size` grid whose 8-bit sample at `(x, z)` is `f(x, z)`.
    fn grid(size: usize, f: impl Fn(usize, usize) -> u8) -> Vec<u8> {
        let mut px = Vec::with_capacity(size * size * 4);
        for x in 0..size {
            for z in 0..size {
                let v = f(x, z);
                px.extend_from_slice(&[v, v, v, 255]);
            }
        }
        px
    }

    #[test]
    fn four_pixels_make_a_single_vertex() {
        let field = Heightfield::from_samples(vec![0; 4], 1.0, BitDepth::Eight);
        assert_eq!(field.size(), 1);
        assert_eq!(field.geometry().vertices.len(), 1);
        assert!(field.geometry().indices.is_empty());
        assert_eq!(field.state(), TerrainState::Ready);
    }

    #[test]
    fn grid_counts_follow_size() {
        let field = Heightfield::from_samples(vec![0; 256 * 256 * 4], 1.0, BitDepth::Eight);
        assert_eq!(field.size(), 256);
        assert_eq!(field.geometry().vertices.len(), 256 * 256);
        assert_eq!(field.geometry().indices.len(), 6 * 255 * 255);
    }

    #[test]
    fn starts_empty() {
        let field = Heightfield::new();
        assert_eq!(field.state(), TerrainState::Empty);
        assert_eq!(field.height(&Transform::new(), 3.0, 4.0), 0.0);
    }

    #[test]
    fn first_cell_winding_is_fixed() {
        let field = Heightfield::from_samples(grid(3, |_, _| 0), 1.0, BitDepth::Eight);
        assert_eq!(&field.geometry().indices[..6], &[0, 1, 3, 3, 1, 4]);
    }

    #[test]
    fn eight_bit_samples_average_channels() {
        // size 4 => exaggeration 1
        let mut px = vec![0u8; 16 * 4];
        px[..4].copy_from_slice(&[255, 0, 0, 255]);
        let field = Heightfield::from_samples(px, 1.0, BitDepth::Eight);
        assert!((field.sample(0, 0) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn sixteen_bit_samples_pack_channels() {
        let mut px = vec![0u8; 16 * 4];
        px[..4].copy_from_slice(&[0x10, 0x02, 0x00, 255]);
        let field = Heightfield::from_samples(px, 1.0, BitDepth::Sixteen);
        let expected = 0x0210 as f32 / (255.0 * 255.0);
        assert!((field.sample(0, 0) - expected).abs() < 1e-6);
    }

    #[test]
    fn integer_points_return_stored_samples() {
        let field = Heightfield::from_samples(
            grid(8, |x, z| (x * 20 + z * 3) as u8),
            1.0,
            BitDepth::Eight,
        );
        let t = Transform::new();
        for x in 0..8 {
            for z in 0..8 {
                assert_eq!(
                    field.height(&t, x as f32, z as f32),
                    field.sample(x as i64, z as i64)
                );
            }
        }
    }

    #[test]
    fn half_steps_lie_strictly_between_neighbours() {
        let field = Heightfield::from_samples(grid(8, |x, _| (x * 30) as u8), 1.0, BitDepth::Eight);
        let t = Transform::new();
        for x in 0..7 {
            let lo = field.height(&t, x as f32, 2.0);
            let mid = field.height(&t, x as f32 + 0.5, 2.0);
            let hi = field.height(&t, x as f32 + 1.0, 2.0);
            assert!(lo < mid && mid < hi, "{} {} {}", lo, mid, hi);
        }
    }

    #[test]
    fn height_honours_terrain_placement() {
        let field = Heightfield::from_samples(grid(4, |x, z| (x + z) as u8 * 40), 1.0, BitDepth::Eight);
        let t = Transform::new()
            .position(Vec3::new(-4.0, 10.0, -4.0))
            .uniform_scale(2.0);
        // world (0, 0) -> grid (2, 2)
        let expected = field.sample(2, 2) * 2.0 + 10.0;
        assert!((field.height(&t, 0.0, 0.0) - expected).abs() < 1e-5);

        let view = TerrainView { field: &field, transform: &t };
        assert!((view.height(0.0, 0.0) - expected).abs() < 1e-5);
    }

    #[test]
    fn queries_outside_the_grid_clamp_to_the_border() {
        let field = Heightfield::from_samples(grid(4, |x, z| (x * 4 + z) as u8 * 10), 1.0, BitDepth::Eight);
        let t = Transform::new();
        assert!((field.height(&t, -5.5, -2.25) - field.sample(0, 0)).abs() < 1e-5);
        assert_eq!(field.height(&t, 3.0, 3.0), field.sample(3, 3));
        assert_eq!(field.height(&t, 40.0, 1.0), field.sample(3, 1));
        assert!(field.height(&t, 3.7, -0.4).is_finite());
    }

    #[test]
    fn extreme_queries_stay_finite() {
        let field = Heightfield::from_samples(vec![100u8; 64], 1.0, BitDepth::Eight);
        let t = Transform::new();
        let corner = field.sample(3, 3);
        assert_eq!(field.height(&t, 1.0e20, 1.0e20), corner);
        assert_eq!(field.height(&t, -1.0e20, 2.0), field.sample(0, 2));
        assert!(field.height(&t, 1.0e20, -1.0e20).is_finite());
        assert!(field.height(&t, f32::MAX, f32::MIN).is_finite());
    }

    #[test]
    fn non_square_heightmaps_do_not_panic() {
        let field = Heightfield::from_samples(vec![200u8; 5 * 4], 1.0, BitDepth::Eight);
        assert_eq!(field.size(), 3);
        assert_eq!(field.sample(2, 2), 0.0);
        assert!(field.height(&Transform::new(), 1.5, 1.5).is_finite());
    }

    #[test]
    fn flat_terrain_faces_up_with_tangents_along_u() {
        let field = Heightfield::from_samples(grid(5, |_, _| 90), 4.0, BitDepth::Eight);
        for v in &field.geometry().vertices {
            assert!((Vec3::from(v.normal) - Vec3::Y).length() < 1e-5);
            assert!((Vec3::from(v.tangent) - Vec3::Z).length() < 1e-5);
        }
        let last = field.geometry().vertices.last().map(|v| v.uv);
        assert_eq!(last, Some([4.0, 4.0]));
    }

    #[test]
    fn centered_placement_straddles_origin() {
        let field = Heightfield::from_samples(grid(4, |_, _| 0), 1.0, BitDepth::Eight);
        let t = field.centered(2.0);
        assert_eq!(t.translation, Vec3::new(-4.0, 0.0, -4.0));
        assert_eq!(t.scale, Vec3::splat(2.0));
        assert_eq!(BitDepth::from_bits(16), Some(BitDepth::Sixteen));
        assert_eq!(BitDepth::from_bits(12), None);
    }
}
