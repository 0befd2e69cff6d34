//! CPU-side geometry and the built-in primitive shapes.
//!
//! A [`Geometry`] is a vertex list, an index list and a [`Topology`]. The
//! primitive constructors are pure functions; upload the result with
//! [`Geometry::upload`] or use the matching [`Mesh`] constructor directly.
//!
//! ```
//! use brazier::Geometry;
//!
//! let cube = Geometry::cube(1.0);
//! assert_eq!(cube.vertices.len(), 24);
//! assert_eq!(cube.indices.len(), 36);
//! ```
//!
//! Segment, ring and division counts below 1 are treated as 1.
//!
//! # Winding Order
//!
//! Triangle primitives use counter-clockwise winding for front faces, seen
//! from outside the shape.

use crate::context::RenderContext;
use crate::device::Topology;
use crate::mesh::{Mesh, Vertex3d};
use glam::{Mat3, Mat4, Vec3};
use std::f32::consts::{PI, TAU};

/// Geometry data before GPU upload.
#[derive(Clone, Debug, Default)]
pub struct Geometry {
    /// Vertex positions, normals, and UVs.
    pub vertices: Vec<Vertex3d>,
    /// Indices into `vertices`, grouped by `topology`.
    pub indices: Vec<u32>,
    pub topology: Topology,
}

impl Geometry {
    /// Creates triangle-list geometry from vertices and indices.
    pub fn new(vertices: Vec<Vertex3d>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            topology: Topology::TriangleList,
        }
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
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

    /// Center of the bounding box.
    pub fn center(&self) -> Vec3 {
        let (min, max) = self.bounds();
        (min + max) * 0.5
    }

    /// Size of the bounding box.
    pub fn size(&self) -> Vec3 {
        let (min, max) = self.bounds();
        max - min
    }

    /// Translates every vertex by `offset`.
    pub fn translate(&mut self, offset: Vec3) {
        for v in &mut self.vertices {
            v.position = (Vec3::from(v.position) + offset).into();
        }
    }

    /// Scales every vertex uniformly about the origin.
    pub fn scale(&mut self, factor: f32) {
        for v in &mut self.vertices {
            v.position = (Vec3::from(v.position) * factor).into();
        }
    }

    /// Bakes an affine transform into the vertices.
    ///
    /// Normals are transformed by the inverse transpose so they stay
    /// perpendicular under non-uniform scale.
    pub fn transform(&mut self, matrix: Mat4) {
        let normal_matrix = Mat3::from_mat4(matrix).inverse().transpose();
        for v in &mut self.vertices {
            v.position = matrix.transform_point3(Vec3::from(v.position)).into();
            v.normal = (normal_matrix * Vec3::from(v.normal))
                .normalize_or_zero()
                .into();
        }
    }

    /// Recalculates vertex normals from face geometry.
    ///
    /// Each vertex gets the area-weighted average of the normals of the
    /// triangles sharing it. Line geometry is left untouched.
    pub fn recalculate_normals(&mut self) {
        if self.topology != Topology::TriangleList {
            return;
        }
        for v in &mut self.vertices {
            v.normal = [0.0, 0.0, 0.0];
        }

        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let p0 = Vec3::from(self.vertices[i0].position);
            let p1 = Vec3::from(self.vertices[i1].position);
            let p2 = Vec3::from(self.vertices[i2].position);
            let face_normal = (p1 - p0).cross(p2 - p0);

            for i in [i0, i1, i2] {
                let n = Vec3::from(self.vertices[i].normal) + face_normal;
                self.vertices[i].normal = n.into();
            }
        }

        for v in &mut self.vertices {
            v.normal = Vec3::from(v.normal).normalize_or_zero().into();
        }
    }

    /// Uploads this geometry as a [`Mesh`].
    pub fn upload(&self, ctx: &RenderContext) -> Mesh {
        Mesh::new(ctx, &self.vertices, &self.indices, self.topology)
    }

    /// A flat `width × depth` rectangle on the XZ plane facing +Y.
    pub fn plane(width: f32, depth: f32) -> Self {
        let hw = width / 2.0;
        let hd = depth / 2.0;
        let up = [0.0, 1.0, 0.0];
        let vertices = vec![
            Vertex3d::new([-hw, 0.0, hd], up, [0.0, 0.0]),
            Vertex3d::new([hw, 0.0, hd], up, [1.0, 0.0]),
            Vertex3d::new([hw, 0.0, -hd], up, [1.0, 1.0]),
            Vertex3d::new([-hw, 0.0, -hd], up, [0.0, 1.0]),
        ];
        Self::new(vertices, vec![0, 1, 2, 0, 2, 3])
    }

    /// A square [`plane`](Self::plane).
    pub fn plane_square(size: f32) -> Self {
        Self::plane(size, size)
    }

    /// A lined grid on the XZ plane, drawn as a line list.
    ///
    /// `divisions_x + 1` lines run parallel to Z, followed by
    /// `divisions_z + 1` lines parallel to X.
    pub fn grid(width: f32, depth: f32, divisions_x: u32, divisions_z: u32) -> Self {
        let divisions_x = divisions_x.max(1);
        let divisions_z = divisions_z.max(1);
        let hw = width / 2.0;
        let hd = depth / 2.0;
        let step_x = width / divisions_x as f32;
        let step_z = depth / divisions_z as f32;
        let up = [0.0, 1.0, 0.0];

        let mut vertices = Vec::with_capacity(2 * (divisions_x + divisions_z + 2) as usize);
        for i in 0..=divisions_x {
            let x = -hw + i as f32 * step_x;
            vertices.push(Vertex3d::new([x, 0.0, -hd], up, [0.0, 0.0]));
            vertices.push(Vertex3d::new([x, 0.0, hd], up, [0.0, 0.0]));
        }
        for i in 0..=divisions_z {
            let z = -hd + i as f32 * step_z;
            vertices.push(Vertex3d::new([-hw, 0.0, z], up, [0.0, 0.0]));
            vertices.push(Vertex3d::new([hw, 0.0, z], up, [0.0, 0.0]));
        }
        let indices = (0..vertices.len() as u32).collect();

        Self::new(vertices, indices).with_topology(Topology::LineList)
    }

    /// A box centered at the origin with flat-shaded faces.
    ///
    /// Faces come in the order +Z, -Z, +X, -X, +Y, -Y, four vertices each.
    pub fn rectangular_prism(width: f32, height: f32, depth: f32) -> Self {
        let (x, y, z) = (width / 2.0, height / 2.0, depth / 2.0);

        #[rustfmt::skip]
        let vertices = vec![
            // +Z
            Vertex3d::new([-x, -y,  z], [ 0.0,  0.0,  1.0], [0.0, 0.0]),
            Vertex3d::new([ x, -y,  z], [ 0.0,  0.0,  1.0], [1.0, 0.0]),
            Vertex3d::new([ x,  y,  z], [ 0.0,  0.0,  1.0], [1.0, 1.0]),
            Vertex3d::new([-x,  y,  z], [ 0.0,  0.0,  1.0], [0.0, 1.0]),
            // -Z
            Vertex3d::new([ x, -y, -z], [ 0.0,  0.0, -1.0], [0.0, 0.0]),
            Vertex3d::new([-x, -y, -z], [ 0.0,  0.0, -1.0], [1.0, 0.0]),
            Vertex3d::new([-x,  y, -z], [ 0.0,  0.0, -1.0], [1.0, 1.0]),
            Vertex3d::new([ x,  y, -z], [ 0.0,  0.0, -1.0], [0.0, 1.0]),
            // +X
            Vertex3d::new([ x, -y,  z], [ 1.0,  0.0,  0.0], [0.0, 0.0]),
            Vertex3d::new([ x, -y, -z], [ 1.0,  0.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([ x,  y, -z], [ 1.0,  0.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([ x,  y,  z], [ 1.0,  0.0,  0.0], [0.0, 1.0]),
            // -X
            Vertex3d::new([-x, -y, -z], [-1.0,  0.0,  0.0], [0.0, 0.0]),
            Vertex3d::new([-x, -y,  z], [-1.0,  0.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([-x,  y,  z], [-1.0,  0.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([-x,  y, -z], [-1.0,  0.0,  0.0], [0.0, 1.0]),
            // +Y
            Vertex3d::new([-x,  y,  z], [ 0.0,  1.0,  0.0], [0.0, 0.0]),
            Vertex3d::new([ x,  y,  z], [ 0.0,  1.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([ x,  y, -z], [ 0.0,  1.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([-x,  y, -z], [ 0.0,  1.0,  0.0], [0.0, 1.0]),
            // -Y
            Vertex3d::new([ x, -y,  z], [ 0.0, -1.0,  0.0], [0.0, 0.0]),
            Vertex3d::new([-x, -y,  z], [ 0.0, -1.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([-x, -y, -z], [ 0.0, -1.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([ x, -y, -z], [ 0.0, -1.0,  0.0], [0.0, 1.0]),
        ];

        let indices = (0..6u32)
            .flat_map(|face| {
                let b = face * 4;
                [b, b + 1, b + 2, b, b + 2, b + 3]
            })
            .collect();

        Self::new(vertices, indices)
    }

    /// A cube with edge length `size`.
    pub fn cube(size: f32) -> Self {
        Self::rectangular_prism(size, size, size)
    }

    /// A capped cylinder along Y, centered at the origin.
    ///
    /// Each of the `segments + 1` ring steps contributes four vertices: side
    /// top, side bottom, top cap and bottom cap.
    pub fn cylinder(radius: f32, height: f32, segments: u32) -> Self {
        let segments = segments.max(1);
        let half = height / 2.0;

        let mut vertices = Vec::with_capacity(4 * (segments as usize + 1));
        for i in 0..=segments {
            let t = i as f32 / segments as f32;
            let (sin, cos) = (t * TAU).sin_cos();
            let x = cos * radius;
            let z = -sin * radius;
            let side = [cos, 0.0, -sin];
            let (cu, cv) = (cos * 0.5 + 0.5, sin * 0.5 + 0.5);

            vertices.push(Vertex3d::new([x, half, z], side, [t, 1.0]));
            vertices.push(Vertex3d::new([x, -half, z], side, [t, 0.0]));
            vertices.push(Vertex3d::new([x, half, z], [0.0, 1.0, 0.0], [cu, cv]));
            vertices.push(Vertex3d::new([x, -half, z], [0.0, -1.0, 0.0], [-cu, cv]));
        }

        let mut indices = Vec::with_capacity(12 * segments as usize);
        for i in 0..segments {
            let i0 = i * 4;
            let (i1, i2, i3) = (i0 + 1, i0 + 4, i0 + 5);
            indices.extend_from_slice(&[i0, i1, i2, i1, i3, i2]);
        }
        for i in 0..segments {
            indices.extend_from_slice(&[2, i * 4 + 2, (i + 1) * 4 + 2]);
        }
        for i in 0..segments {
            indices.extend_from_slice(&[i * 4 + 3, 3, (i + 1) * 4 + 3]);
        }

        Self::new(vertices, indices)
    }

    /// A UV sphere centered at the origin.
    ///
    /// Rings run from the south pole (`v = 0`) to the north pole (`v = 1`).
    pub fn sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(1);
        let rings = rings.max(1);

        let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
        for i in 0..=rings {
            let v = i as f32 / rings as f32;
            let (ring_radius, cos_y) = (v * PI).sin_cos();
            let y = -cos_y;
            for j in 0..=segments {
                let u = j as f32 / segments as f32;
                let (sin, cos) = (u * TAU).sin_cos();
                let n = Vec3::new(cos * ring_radius, y, -sin * ring_radius);
                vertices.push(Vertex3d::new((n * radius).into(), n.into(), [u, v]));
            }
        }

        let stride = segments + 1;
        let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
        for i in 0..rings {
            for j in 0..segments {
                let i0 = i * stride + j;
                let i1 = i0 + 1;
                let i2 = (i + 1) * stride + j + 1;
                let i3 = (i + 1) * stride + j;
                indices.extend_from_slice(&[i0, i1, i2, i0, i2, i3]);
            }
        }

        Self::new(vertices, indices)
    }

    /// A cone along Y with its apex at `+height / 2`.
    ///
    /// Each of the `segments + 1` steps contributes a side rim vertex, an apex
    /// vertex and a base rim vertex. The base fan is anchored on the first
    /// base rim vertex and covers `segments - 1` triangles, so the wedge
    /// between the first and second rim vertices is left open.
    pub fn cone(radius: f32, height: f32, segments: u32) -> Self {
        let segments = segments.max(1);
        let half = height / 2.0;

        let mut vertices = Vec::with_capacity(3 * (segments as usize + 1));
        for i in 0..=segments {
            let t = i as f32 / segments as f32;
            let (x, z) = (t * TAU).sin_cos();
            let normal: [f32; 3] = Vec3::new(x * height, radius, z * height)
                .normalize_or_zero()
                .into();
            let rim = [x * radius, -half, z * radius];

            vertices.push(Vertex3d::new(rim, normal, [x / 2.0 + 0.5, -z / 2.0 + 0.5]));
            vertices.push(Vertex3d::new([0.0, half, 0.0], normal, [0.5, 0.5]));
            vertices.push(Vertex3d::new(rim, [0.0, -1.0, 0.0], [x / 2.0 + 0.5, z / 2.0 + 0.5]));
        }

        let mut indices = Vec::with_capacity(6 * segments as usize);
        for i in 0..segments {
            let one = i * 3;
            indices.extend_from_slice(&[one, (i + 1) * 3, one + 1]);
        }
        for i in 0..segments - 1 {
            indices.extend_from_slice(&[2, (i + 2) * 3 + 2, (i + 1) * 3 + 2]);
        }

        Self::new(vertices, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_normal(g: &Geometry, tri: &[u32]) -> Vec3 {
        let p = |i: u32| Vec3::from(g.vertices[i as usize].position);
        (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]))
    }

    #[test]
    fn bounds_and_center() {
        let vertices = vec![
            Vertex3d::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex3d::new([2.0, 4.0, 6.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex3d::new([-1.0, -1.0, -1.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
        ];
        let geom = Geometry::new(vertices, vec![0, 1, 2]);

        let (min, max) = geom.bounds();
        assert_eq!(min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(max, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(geom.center(), Vec3::new(0.5, 1.5, 2.5));
    }

    #[test]
    fn cube_faces_have_one_axis_normal_each() {
        let cube = Geometry::cube(2.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);

        let mut seen = Vec::new();
        for face in cube.vertices.chunks(4) {
            let n = face[0].normal;
            assert!(face.iter().all(|v| v.normal == n));
            let axis = Vec3::from(n);
            assert_eq!(axis.abs().max_element(), 1.0);
            assert_eq!(axis.length_squared(), 1.0);
            assert!(!seen.contains(&n), "normal {n:?} repeated");
            seen.push(n);
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn cube_triangles_face_outward() {
        let cube = Geometry::cube(1.0);
        for tri in cube.indices.chunks(3) {
            let n = triangle_normal(&cube, tri);
            let expected = Vec3::from(cube.vertices[tri[0] as usize].normal);
            assert!(n.dot(expected) > 0.0);
        }
    }

    #[test]
    fn prism_extents() {
        let prism = Geometry::rectangular_prism(2.0, 4.0, 6.0);
        assert_eq!(prism.size(), Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(prism.center(), Vec3::ZERO);
    }

    #[test]
    fn sphere_counts_and_radius() {
        let (radius, segments, rings) = (2.5, 12, 7);
        let sphere = Geometry::sphere(radius, segments, rings);
        assert_eq!(sphere.vertices.len(), ((rings + 1) * (segments + 1)) as usize);
        assert_eq!(sphere.indices.len(), (rings * segments * 6) as usize);
        for v in &sphere.vertices {
            let r = Vec3::from(v.position).length();
            assert!((r - radius).abs() < 1e-4, "radius {r}");
        }
        assert_eq!(sphere.vertices[0].position[1], -radius);
    }

    #[test]
    fn plane_faces_up() {
        let plane = Geometry::plane(2.0, 3.0);
        assert_eq!(plane.vertices.len(), 4);
        assert_eq!(plane.indices.len(), 6);
        assert_eq!(plane.size(), Vec3::new(2.0, 0.0, 3.0));
        for tri in plane.indices.chunks(3) {
            assert!(triangle_normal(&plane, tri).y > 0.0);
        }
    }

    #[test]
    fn grid_is_a_line_list() {
        let grid = Geometry::grid(10.0, 6.0, 5, 3);
        assert_eq!(grid.topology, Topology::LineList);
        assert_eq!(grid.vertices.len(), 2 * (6 + 4));
        assert_eq!(grid.indices.len(), grid.vertices.len());
        assert_eq!(grid.vertices[0].position, [-5.0, 0.0, -3.0]);
        // Last line parallel to Z, then the first line parallel to X.
        assert_eq!(grid.vertices[11].position, [5.0, 0.0, 3.0]);
        assert_eq!(grid.vertices[12].position, [-5.0, 0.0, -3.0]);
        assert_eq!(grid.vertices[19].position, [5.0, 0.0, 3.0]);
    }

    #[test]
    fn cylinder_counts() {
        let cylinder = Geometry::cylinder(0.5, 1.0, 16);
        assert_eq!(cylinder.vertices.len(), 17 * 4);
        // Sides: 2 triangles per segment, caps: 1 per segment each.
        assert_eq!(cylinder.indices.len(), 16 * 4 * 3);
        assert!(cylinder.indices.iter().all(|&i| (i as usize) < cylinder.vertices.len()));
    }

    #[test]
    fn cone_base_fan_leaves_one_wedge_open() {
        let segments = 8;
        let cone = Geometry::cone(0.5, 1.0, segments);
        assert_eq!(cone.vertices.len(), 3 * (segments as usize + 1));
        assert_eq!(cone.indices.len(), 3 * (2 * segments as usize - 1));
        assert!(cone.indices.iter().all(|&i| (i as usize) < cone.vertices.len()));
        // Apex normals lean outward and up.
        let n = Vec3::from(cone.vertices[1].normal);
        assert!(n.y > 0.0 && (n.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn transform_bakes_positions_and_normals() {
        let mut plane = Geometry::plane_square(2.0);
        plane.transform(
            Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2)
                * Mat4::from_scale(Vec3::new(1.0, 1.0, 3.0)),
        );
        for v in &plane.vertices {
            let n = Vec3::from(v.normal);
            assert!((n - Vec3::Z).length() < 1e-5, "{n:?}");
        }
        assert!((plane.size().y - 6.0).abs() < 1e-5);
    }

    #[test]
    fn recalculate_normals_matches_flat_faces() {
        let mut plane = Geometry::plane_square(1.0);
        for v in &mut plane.vertices {
            v.normal = [0.0, 0.0, 0.0];
        }
        plane.recalculate_normals();
        assert!(plane.vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));
    }
}
