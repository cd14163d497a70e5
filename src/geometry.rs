//! CPU-side geometry: model parsing, primitives and vertex attribute generation.
//!
//! Geometry is built or loaded into [`RawGeometry`] first, adjusted there
//! (recentred, scaled, normals and tangents regenerated), and only then
//! uploaded as a [`Mesh`](crate::Mesh). Loading never touches the GPU, so it
//! can run on the resource loader's worker threads.
//!
//! # Supported Formats
//!
//! | Format | Extensions | Notes |
//! |--------|------------|-------|
//! | OBJ    | `.obj`     | `v`/`vt`/`vn`/`f`, polygons fan-triangulated, negative indices |
//! | STL    | `.stl`     | Binary and ASCII, no UV coordinates |
//!
//! ```
//! use lunar_walk::PendingGeometry;
//!
//! let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
//! let tri = PendingGeometry::from_obj_str(text).centered().build().unwrap();
//! assert_eq!(tri.indices.len(), 3);
//! ```

use crate::mesh::Vertex3d;
use glam::{Quat, Vec2, Vec3};
use std::collections::HashMap;
use std::path::Path;

/// Errors that can occur when loading geometry.
#[derive(Debug)]
pub enum GeometryError {
    /// File could not be read.
    Io(std::io::Error),
    /// File format could not be determined from extension.
    UnknownFormat(String),
    /// The geometry data was invalid or corrupt.
    ParseError(String),
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::Io(e) => write!(f, "IO error: {}", e),
            GeometryError::UnknownFormat(ext) => {
                write!(f, "Unknown geometry format: '{}'", ext)
            }
            GeometryError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for GeometryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeometryError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GeometryError {
    fn from(e: std::io::Error) -> Self {
        GeometryError::Io(e)
    }
}

/// Raw geometry data before GPU upload.
#[derive(Clone, Debug, Default)]
pub struct RawGeometry {
    /// Vertex positions, normals, UVs and tangents.
    pub vertices: Vec<Vertex3d>,
    /// Triangle indices.
    pub indices: Vec<u32>,
}

impl RawGeometry {
    /// Creates raw geometry from vertices and indices.
    pub fn new(vertices: Vec<Vertex3d>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Unit cube centred on the origin, 4 vertices per face.
    pub fn cube() -> Self {
        #[rustfmt::skip]
        let vertices = vec![
            // Front face (Z+)
            Vertex3d::new([-0.5, -0.5,  0.5], [ 0.0,  0.0,  1.0], [0.0, 1.0]),
            Vertex3d::new([ 0.5, -0.5,  0.5], [ 0.0,  0.0,  1.0], [1.0, 1.0]),
            Vertex3d::new([ 0.5,  0.5,  0.5], [ 0.0,  0.0,  1.0], [1.0, 0.0]),
            Vertex3d::new([-0.5,  0.5,  0.5], [ 0.0,  0.0,  1.0], [0.0, 0.0]),
            // Back face (Z-)
            Vertex3d::new([ 0.5, -0.5, -0.5], [ 0.0,  0.0, -1.0], [0.0, 1.0]),
            Vertex3d::new([-0.5, -0.5, -0.5], [ 0.0,  0.0, -1.0], [1.0, 1.0]),
            Vertex3d::new([-0.5,  0.5, -0.5], [ 0.0,  0.0, -1.0], [1.0, 0.0]),
            Vertex3d::new([ 0.5,  0.5, -0.5], [ 0.0,  0.0, -1.0], [0.0, 0.0]),
            // Top face (Y+)
            Vertex3d::new([-0.5,  0.5,  0.5], [ 0.0,  1.0,  0.0], [0.0, 1.0]),
            Vertex3d::new([ 0.5,  0.5,  0.5], [ 0.0,  1.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([ 0.5,  0.5, -0.5], [ 0.0,  1.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([-0.5,  0.5, -0.5], [ 0.0,  1.0,  0.0], [0.0, 0.0]),
            // Bottom face (Y-)
            Vertex3d::new([-0.5, -0.5, -0.5], [ 0.0, -1.0,  0.0], [0.0, 1.0]),
            Vertex3d::new([ 0.5, -0.5, -0.5], [ 0.0, -1.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([ 0.5, -0.5,  0.5], [ 0.0, -1.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([-0.5, -0.5,  0.5], [ 0.0, -1.0,  0.0], [0.0, 0.0]),
            // Right face (X+)
            Vertex3d::new([ 0.5, -0.5,  0.5], [ 1.0,  0.0,  0.0], [0.0, 1.0]),
            Vertex3d::new([ 0.5, -0.5, -0.5], [ 1.0,  0.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([ 0.5,  0.5, -0.5], [ 1.0,  0.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([ 0.5,  0.5,  0.5], [ 1.0,  0.0,  0.0], [0.0, 0.0]),
            // Left face (X-)
            Vertex3d::new([-0.5, -0.5, -0.5], [-1.0,  0.0,  0.0], [0.0, 1.0]),
            Vertex3d::new([-0.5, -0.5,  0.5], [-1.0,  0.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([-0.5,  0.5,  0.5], [-1.0,  0.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([-0.5,  0.5, -0.5], [-1.0,  0.0,  0.0], [0.0, 0.0]),
        ];

        #[rustfmt::skip]
        let indices: Vec<u32> = vec![
            0,  1,  2,  2,  3,  0,  // front
            4,  5,  6,  6,  7,  4,  // back
            8,  9,  10, 10, 11, 8,  // top
            12, 13, 14, 14, 15, 12, // bottom
            16, 17, 18, 18, 19, 16, // right
            20, 21, 22, 22, 23, 20, // left
        ];

        let mut cube = Self::new(vertices, indices);
        cube.generate_tangents();
        cube
    }

    /// Unit quad in the XY plane facing +Z.
    pub fn quad() -> Self {
        let n = [0.0, 0.0, 1.0];
        let vertices = vec![
            Vertex3d::new([-0.5, -0.5, 0.0], n, [0.0, 1.0]),
            Vertex3d::new([0.5, -0.5, 0.0], n, [1.0, 1.0]),
            Vertex3d::new([0.5, 0.5, 0.0], n, [1.0, 0.0]),
            Vertex3d::new([-0.5, 0.5, 0.0], n, [0.0, 0.0]),
        ];
        let mut quad = Self::new(vertices, vec![0, 1, 2, 2, 3, 0]);
        quad.generate_tangents();
        quad
    }

    /// Computes the axis-aligned bounding box.
    ///
    /// Returns `(min, max)` corners of the bounding box.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);

        for v in &self.vertices {
            let p = Vec3::from(v.position);
            min = min.min(p);
            max = max.max(p);
        }

        (min, max)
    }

    /// Returns the center point of the geometry.
    pub fn center(&self) -> Vec3 {
        let (min, max) = self.bounds();
        (min + max) * 0.5
    }

    /// Returns the size of the bounding box.
    pub fn size(&self) -> Vec3 {
        let (min, max) = self.bounds();
        max - min
    }

    /// Translates all vertices by the given offset.
    pub fn translate(&mut self, offset: Vec3) {
        for v in &mut self.vertices {
            v.position = (Vec3::from(v.position) + offset).into();
        }
    }

    /// Scales all vertices uniformly around the origin.
    pub fn scale(&mut self, factor: f32) {
        for v in &mut self.vertices {
            v.position = (Vec3::from(v.position) * factor).into();
        }
    }

    /// Rotates positions, normals and tangents.
    pub fn rotate(&mut self, rotation: Quat) {
        for v in &mut self.vertices {
            v.position = (rotation * Vec3::from(v.position)).into();
            v.normal = (rotation * Vec3::from(v.normal)).into();
            v.tangent = (rotation * Vec3::from(v.tangent)).into();
        }
    }

    /// Centers the geometry at the origin.
    pub fn recenter(&mut self) {
        let center = self.center();
        self.translate(-center);
    }

    /// Scales the geometry to fit within a unit cube (-0.5 to 0.5).
    pub fn normalize(&mut self) {
        let size = self.size();
        let max_dim = size.x.max(size.y).max(size.z);
        if max_dim > 0.0 {
            self.scale(1.0 / max_dim);
        }
    }

    /// Recalculates smooth vertex normals.
    ///
    /// Each triangle contributes its unit normal to its three vertices, so
    /// large and small faces weigh the same; the sums are normalised at the
    /// end.
    pub fn recalculate_normals(&mut self) {
        for v in &mut self.vertices {
            v.normal = [0.0, 0.0, 0.0];
        }

        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if i0.max(i1).max(i2) >= self.vertices.len() {
                continue;
            }

            let p0 = Vec3::from(self.vertices[i0].position);
            let p1 = Vec3::from(self.vertices[i1].position);
            let p2 = Vec3::from(self.vertices[i2].position);
            let face_normal = (p1 - p0).cross(p2 - p1).normalize_or_zero();

            for i in [i0, i1, i2] {
                let n = Vec3::from(self.vertices[i].normal) + face_normal;
                self.vertices[i].normal = n.into();
            }
        }

        for v in &mut self.vertices {
            v.normal = Vec3::from(v.normal).normalize_or_zero().into();
        }
    }

    /// Derives per-vertex tangents from texture-space edge deltas.
    ///
    /// Triangles with degenerate UVs are skipped.
    pub fn generate_tangents(&mut self) {
        for v in &mut self.vertices {
            v.tangent = [0.0, 0.0, 0.0];
        }

        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if i0.max(i1).max(i2) >= self.vertices.len() {
                continue;
            }
            let (v0, v1, v2) = (&self.vertices[i0], &self.vertices[i1], &self.vertices[i2]);

            let eo1 = Vec3::from(v1.position) - Vec3::from(v0.position);
            let eo2 = Vec3::from(v2.position) - Vec3::from(v0.position);
            let et1 = Vec2::from(v1.uv) - Vec2::from(v0.uv);
            let et2 = Vec2::from(v2.uv) - Vec2::from(v0.uv);

            let det = et1.x * et2.y - et2.x * et1.y;
            if det == 0.0 {
                continue;
            }
            let tangent = ((et2.y * eo1 - et1.y * eo2) / det).normalize_or_zero();

            for i in [i0, i1, i2] {
                let t = Vec3::from(self.vertices[i].tangent) + tangent;
                self.vertices[i].tangent = t.into();
            }
        }

        for v in &mut self.vertices {
            v.tangent = Vec3::from(v.tangent).normalize_or_zero().into();
        }
    }
}

/// Parses Wavefront OBJ text.
///
/// Faces with more than three corners are fan-triangulated. Each distinct
/// `position/uv/normal` index triple becomes one output vertex. Missing UVs or
/// normals are zero; if the file has no normals at all they are recomputed.
/// OBJ texture space has its origin bottom-left, so `v` is flipped.
pub fn parse_obj(text: &str) -> Result<RawGeometry, GeometryError> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut uvs: Vec<Vec2> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();

    let mut geometry = RawGeometry::default();
    let mut seen: HashMap<(usize, Option<usize>, Option<usize>), u32> = HashMap::new();

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();
        let line_no = line_no + 1;

        match keyword {
            "v" => positions.push(Vec3::from(parse_floats::<3>(&args, line_no)?)),
            "vn" => normals.push(Vec3::from(parse_floats::<3>(&args, line_no)?)),
            "vt" => uvs.push(Vec2::from(parse_floats::<2>(&args, line_no)?)),
            "f" => {
                if args.len() < 3 {
                    return Err(GeometryError::ParseError(format!(
                        "line {}: face needs at least 3 vertices",
                        line_no
                    )));
                }
                let mut corners = Vec::with_capacity(args.len());
                for corner in &args {
                    let key = parse_corner(corner, &positions, &uvs, &normals, line_no)?;
                    let index = match seen.get(&key) {
                        Some(&index) => index,
                        None => {
                            let (p, t, n) = key;
                            let uv = t.map(|t| [uvs[t].x, 1.0 - uvs[t].y]).unwrap_or([0.0; 2]);
                            let normal = n.map(|n| normals[n].into()).unwrap_or([0.0; 3]);
                            let index = geometry.vertices.len() as u32;
                            geometry
                                .vertices
                                .push(Vertex3d::new(positions[p].into(), normal, uv));
                            seen.insert(key, index);
                            index
                        }
                    };
                    corners.push(index);
                }
                for i in 1..corners.len() - 1 {
                    geometry
                        .indices
                        .extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
                }
            }
            other => log::debug!("obj: ignoring '{}' at line {}", other, line_no),
        }
    }

    if normals.is_empty() {
        geometry.recalculate_normals();
    }
    Ok(geometry)
}

fn parse_floats<const N: usize>(args: &[&str], line_no: usize) -> Result<[f32; N], GeometryError> {
    let mut out = [0.0; N];
    if args.len() < N {
        return Err(GeometryError::ParseError(format!(
            "line {}: expected {} numbers, found {}",
            line_no,
            N,
            args.len()
        )));
    }
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.parse().map_err(|_| {
            GeometryError::ParseError(format!("line {}: invalid number '{}'", line_no, arg))
        })?;
    }
    Ok(out)
}

/// Resolves one `p/t/n` face corner to zero-based indices.
fn parse_corner(
    corner: &str,
    positions: &[Vec3],
    uvs: &[Vec2],
    normals: &[Vec3],
    line_no: usize,
) -> Result<(usize, Option<usize>, Option<usize>), GeometryError> {
    let mut fields = corner.split('/');
    let resolve = |field: Option<&str>, len: usize| -> Result<Option<usize>, GeometryError> {
        let Some(field) = field.filter(|f| !f.is_empty()) else {
            return Ok(None);
        };
        let raw: i64 = field.parse().map_err(|_| {
            GeometryError::ParseError(format!("line {}: invalid index '{}'", line_no, field))
        })?;
        let index = if raw < 0 { len as i64 + raw } else { raw - 1 };
        if index < 0 || index >= len as i64 {
            return Err(GeometryError::ParseError(format!(
                "line {}: index {} out of range",
                line_no, raw
            )));
        }
        Ok(Some(index as usize))
    };

    let p = resolve(fields.next(), positions.len())?.ok_or_else(|| {
        GeometryError::ParseError(format!("line {}: face corner without position", line_no))
    })?;
    let t = resolve(fields.next(), uvs.len())?;
    let n = resolve(fields.next(), normals.len())?;
    Ok((p, t, n))
}

/// A geometry load plus the adjustments to apply before upload.
///
/// Errors are kept until [`PendingGeometry::build`] so the builder chain stays
/// fluent.
#[derive(Clone)]
pub struct PendingGeometry {
    result: Result<RawGeometry, String>,
    center: bool,
    normalize: bool,
    smooth_normals: bool,
    tangents: bool,
    scale_factor: Option<f32>,
    translation: Option<Vec3>,
    rotation: Option<Quat>,
}

impl PendingGeometry {
    fn with_result(result: Result<RawGeometry, String>) -> Self {
        Self {
            result,
            center: false,
            normalize: false,
            smooth_normals: false,
            tangents: false,
            scale_factor: None,
            translation: None,
            rotation: None,
        }
    }

    /// Load geometry from a file path, picking the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self::with_result(Self::load_file(path.as_ref()).map_err(|e| e.to_string()))
    }

    /// Parse OBJ text.
    pub fn from_obj_str(text: &str) -> Self {
        Self::with_result(parse_obj(text).map_err(|e| e.to_string()))
    }

    /// Load STL geometry from bytes.
    pub fn from_stl_bytes(bytes: &[u8]) -> Self {
        Self::with_result(Self::parse_stl_bytes(bytes).map_err(|e| e.to_string()))
    }

    /// Create from existing raw geometry.
    pub fn from_raw(geometry: RawGeometry) -> Self {
        Self::with_result(Ok(geometry))
    }

    /// Centers the geometry at the origin.
    pub fn centered(mut self) -> Self {
        self.center = true;
        self
    }

    /// Scales the geometry to fit within a unit cube.
    pub fn normalized(mut self) -> Self {
        self.normalize = true;
        self
    }

    /// Recalculates smooth vertex normals.
    pub fn smooth_normals(mut self) -> Self {
        self.smooth_normals = true;
        self
    }

    /// Generates tangents for normal mapping.
    pub fn with_tangents(mut self) -> Self {
        self.tangents = true;
        self
    }

    /// Applies a uniform scale factor.
    pub fn scaled(mut self, factor: f32) -> Self {
        self.scale_factor = Some(factor);
        self
    }

    /// Translates the geometry by the given offset.
    pub fn translated(mut self, offset: Vec3) -> Self {
        self.translation = Some(offset);
        self
    }

    /// Reorients the geometry from Z-up to Y-up.
    pub fn upright(mut self) -> Self {
        // -90 degrees around X converts Z-up to Y-up
        self.rotation = Some(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2));
        self
    }

    /// Rotates the geometry by a custom quaternion.
    pub fn rotated_by(mut self, rotation: Quat) -> Self {
        self.rotation = Some(rotation);
        self
    }

    /// Applies the requested adjustments in order: center, rotate, normalize,
    /// scale, smooth normals, tangents, translate.
    pub fn build(self) -> Result<RawGeometry, GeometryError> {
        let mut geometry = self.result.map_err(GeometryError::ParseError)?;

        if self.center {
            geometry.recenter();
        }

        if let Some(rotation) = self.rotation {
            geometry.rotate(rotation);
        }

        if self.normalize {
            geometry.normalize();
        }

        if let Some(scale) = self.scale_factor {
            geometry.scale(scale);
        }

        if self.smooth_normals {
            geometry.recalculate_normals();
        }

        if self.tangents {
            geometry.generate_tangents();
        }

        if let Some(offset) = self.translation {
            geometry.translate(offset);
        }

        Ok(geometry)
    }

    // Internal: Load file with format detection
    fn load_file(path: &Path) -> Result<RawGeometry, GeometryError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "obj" => parse_obj(&std::fs::read_to_string(path)?),
            "stl" => {
                let file = std::fs::File::open(path)?;
                let mut reader = std::io::BufReader::new(file);
                Self::parse_stl(&mut reader)
            }
            _ => Err(GeometryError::UnknownFormat(ext)),
        }
    }

    // Internal: Parse STL from reader
    fn parse_stl<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
    ) -> Result<RawGeometry, GeometryError> {
        let stl = stl_io::read_stl(reader)
            .map_err(|e| GeometryError::ParseError(format!("STL parse error: {}", e)))?;

        let mut vertices = Vec::with_capacity(stl.faces.len() * 3);
        let mut indices = Vec::with_capacity(stl.faces.len() * 3);

        // stl_io returns an IndexedMesh with a vertex list and indexed triangles
        for (i, face) in stl.faces.iter().enumerate() {
            let normal: [f32; 3] = face.normal.into();

            for &vertex_idx in &face.vertices {
                let position: [f32; 3] = stl.vertices[vertex_idx].into();
                vertices.push(Vertex3d::new(position, normal, [0.0, 0.0]));
            }

            let base = (i * 3) as u32;
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }

        Ok(RawGeometry::new(vertices, indices))
    }

    // Internal: Parse STL from bytes
    fn parse_stl_bytes(bytes: &[u8]) -> Result<RawGeometry, GeometryError> {
        let mut cursor = std::io::Cursor::new(bytes);
        Self::parse_stl(&mut cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_OBJ: &str = "\
# a square made of one polygon
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
o square
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn raw_geometry_bounds() {
        let vertices = vec![
            Vertex3d::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex3d::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex3d::new([-1.0, -1.0, -1.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
        ];
        let geom = RawGeometry::new(vertices, vec![0, 1, 2]);

        let (min, max) = geom.bounds();
        assert_eq!(min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn raw_geometry_recenter() {
        let vertices = vec![
            Vertex3d::new([2.0, 2.0, 2.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex3d::new([4.0, 4.0, 4.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
        ];
        let mut geom = RawGeometry::new(vertices, vec![0, 1, 0]);

        geom.recenter();

        assert!(geom.center().length() < 0.001);
    }

    #[test]
    fn obj_polygons_are_fan_triangulated() {
        let geom = parse_obj(QUAD_OBJ).unwrap();
        assert_eq!(geom.vertices.len(), 4);
        assert_eq!(geom.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(geom.vertices[0].normal, [0.0, 0.0, 1.0]);
        // v flipped into top-left texture space
        assert_eq!(geom.vertices[3].uv, [0.0, 0.0]);
        assert_eq!(geom.vertices[0].uv, [0.0, 1.0]);
    }

    #[test]
    fn obj_deduplicates_identical_corners() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nf 1 2 3\nf 3 2 4\n";
        let geom = parse_obj(text).unwrap();
        assert_eq!(geom.vertices.len(), 4);
        assert_eq!(geom.indices, vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn obj_same_position_different_uv_stays_separate() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 1\nf 1/1 2/1 3/1\nf 1/2 2/2 3/2\n";
        let geom = parse_obj(text).unwrap();
        assert_eq!(geom.vertices.len(), 6);
    }

    #[test]
    fn obj_negative_indices_count_from_the_end() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let geom = parse_obj(text).unwrap();
        assert_eq!(geom.vertices[2].position, [0.0, 1.0, 0.0]);
        // no normals in the file: recomputed, facing +Z for this winding
        assert_eq!(geom.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn obj_rejects_bad_indices() {
        assert!(parse_obj("v 0 0 0\nf 1 2 3\n").is_err());
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2\n").is_err());
        assert!(parse_obj("v 0 zero 0\n").is_err());
    }

    #[test]
    fn unknown_extension_is_reported() {
        let err = PendingGeometry::from_file("model.fbx").build();
        assert!(matches!(err, Err(GeometryError::ParseError(msg)) if msg.contains("fbx")));
    }

    #[test]
    fn normals_are_not_area_weighted() {
        // Two triangles sharing vertex 0: a large one facing +Z, a small one facing +Y.
        let vertices = vec![
            Vertex3d::new([0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex3d::new([10.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex3d::new([0.0, 10.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex3d::new([0.0, 0.0, -0.1], [0.0; 3], [0.0; 2]),
            Vertex3d::new([0.1, 0.0, 0.0], [0.0; 3], [0.0; 2]),
        ];
        let mut geom = RawGeometry::new(vertices, vec![0, 1, 2, 0, 4, 3]);
        geom.recalculate_normals();
        let n = Vec3::from(geom.vertices[0].normal);
        assert!((n - Vec3::new(0.0, 1.0, 1.0).normalize()).length() < 1e-5);
    }

    #[test]
    fn cube_tangents_are_unit_and_perpendicular() {
        let cube = RawGeometry::cube();
        for v in &cube.vertices {
            let t = Vec3::from(v.tangent);
            assert!((t.length() - 1.0).abs() < 1e-5);
            assert!(t.dot(Vec3::from(v.normal)).abs() < 1e-5);
        }
    }

    #[test]
    fn builder_applies_adjustments() {
        let geom = PendingGeometry::from_obj_str(QUAD_OBJ)
            .centered()
            .scaled(2.0)
            .translated(Vec3::Y)
            .with_tangents()
            .build()
            .unwrap();
        let (min, max) = geom.bounds();
        assert!((min - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-5);
        assert!((max - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
        assert!((Vec3::from(geom.vertices[0].tangent) - Vec3::X).length() < 1e-5);
    }
}
