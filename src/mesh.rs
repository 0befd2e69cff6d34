//! GPU-resident meshes.
//!
//! - [`Vertex3d`] is the vertex format every mesh uses.
//! - [`Mesh`] owns one vertex/index buffer pair on the device.
//!
//! # Vertex Layout
//!
//! | Attribute | Format    | Offset | Shader Location |
//! |-----------|-----------|--------|-----------------|
//! | position  | Float32x3 | 0      | 0               |
//! | normal    | Float32x3 | 12     | 1               |
//! | uv        | Float32x2 | 24     | 2               |
//!
//! This layout is exposed via [`Vertex3d::LAYOUT`] for pipeline creation.

use crate::context::RenderContext;
use crate::device::{GeometryId, GraphicsDevice, Topology};
use crate::geometry::Geometry;
use std::path::Path;
use std::rc::Rc;

/// A vertex with position, normal, and texture coordinates.
///
/// `#[repr(C)]` and [`bytemuck::Pod`] let vertex slices be uploaded as
/// bytes directly. Each vertex occupies 32 bytes.
///
/// ```
/// use brazier::Vertex3d;
///
/// let vertex = Vertex3d::new(
///     [0.0, 1.0, 0.0],  // position
///     [0.0, 1.0, 0.0],  // normal (pointing up)
///     [0.5, 0.5],       // uv (center of texture)
/// );
/// assert_eq!(std::mem::size_of_val(&vertex), 32);
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    /// The 3D position of this vertex in model space.
    pub position: [f32; 3],
    /// The surface normal vector (should be normalized for correct lighting).
    pub normal: [f32; 3],
    /// Texture coordinates, typically in the range [0, 1].
    pub uv: [f32; 2],
}

impl Vertex3d {
    /// Floats per vertex in an interleaved array.
    pub const FLOATS: usize = 8;

    /// The wgpu vertex buffer layout for this vertex type.
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// GPU-resident geometry with vertex and index buffers.
///
/// Meshes are immutable once created and release their buffers when dropped.
/// Share one mesh between drawables with `Rc<Mesh>`.
///
/// # Creating Meshes
///
/// ```
/// use brazier::{Mesh, RenderContext, Topology, Vertex3d};
///
/// let (ctx, _device) = RenderContext::headless();
///
/// // Built-in primitives
/// let cube = Mesh::cube(&ctx, 1.0);
/// let sphere = Mesh::sphere(&ctx, 0.5, 32, 16);
/// let grid = Mesh::grid(&ctx, 10.0, 10.0, 10, 10);
///
/// // Custom geometry
/// let vertices = [
///     Vertex3d::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.5, 0.0]),
///     Vertex3d::new([-1.0, -1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
///     Vertex3d::new([1.0, -1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
/// ];
/// let triangle = Mesh::new(&ctx, &vertices, &[0, 1, 2], Topology::TriangleList);
/// assert_eq!(triangle.index_count(), 3);
/// ```
pub struct Mesh {
    device: Rc<dyn GraphicsDevice>,
    id: GeometryId,
    vertex_count: u32,
    index_count: u32,
    topology: Topology,
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("id", &self.id)
            .field("vertex_count", &self.vertex_count)
            .field("index_count", &self.index_count)
            .field("topology", &self.topology)
            .finish()
    }
}

impl Mesh {
    /// Uploads vertices and indices verbatim.
    pub fn new(
        ctx: &RenderContext,
        vertices: &[Vertex3d],
        indices: &[u32],
        topology: Topology,
    ) -> Self {
        let device = Rc::clone(ctx.device());
        let id = device.create_geometry(vertices, indices);
        log::debug!(
            "created mesh {id:?}: {} vertices, {} indices, {topology:?}",
            vertices.len(),
            indices.len()
        );
        Self {
            device,
            id,
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
            topology,
        }
    }

    /// Uploads an interleaved float array, 8 floats per vertex
    /// (position, normal, uv).
    ///
    /// Trailing floats that do not make up a whole vertex are dropped.
    pub fn from_interleaved(
        ctx: &RenderContext,
        data: &[f32],
        indices: &[u32],
        topology: Topology,
    ) -> Self {
        let chunks = data.chunks_exact(Vertex3d::FLOATS);
        if !chunks.remainder().is_empty() {
            log::warn!(
                "interleaved vertex data has {} trailing float(s); ignoring them",
                chunks.remainder().len()
            );
        }
        let vertices: Vec<Vertex3d> = chunks
            .map(|c| Vertex3d::new([c[0], c[1], c[2]], [c[3], c[4], c[5]], [c[6], c[7]]))
            .collect();
        Self::new(ctx, &vertices, indices, topology)
    }

    /// Issues one indexed draw with the current program and state.
    pub fn draw(&self) {
        self.device
            .draw_indexed(self.id, self.topology, self.index_count);
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// See [`Geometry::plane`].
    pub fn plane(ctx: &RenderContext, width: f32, depth: f32) -> Self {
        Geometry::plane(width, depth).upload(ctx)
    }

    /// See [`Geometry::plane_square`].
    pub fn plane_square(ctx: &RenderContext, size: f32) -> Self {
        Geometry::plane_square(size).upload(ctx)
    }

    /// See [`Geometry::grid`].
    pub fn grid(
        ctx: &RenderContext,
        width: f32,
        depth: f32,
        divisions_x: u32,
        divisions_z: u32,
    ) -> Self {
        Geometry::grid(width, depth, divisions_x, divisions_z).upload(ctx)
    }

    /// See [`Geometry::rectangular_prism`].
    pub fn rectangular_prism(ctx: &RenderContext, width: f32, height: f32, depth: f32) -> Self {
        Geometry::rectangular_prism(width, height, depth).upload(ctx)
    }

    /// See [`Geometry::cube`].
    pub fn cube(ctx: &RenderContext, size: f32) -> Self {
        Geometry::cube(size).upload(ctx)
    }

    /// See [`Geometry::cylinder`].
    pub fn cylinder(ctx: &RenderContext, radius: f32, height: f32, segments: u32) -> Self {
        Geometry::cylinder(radius, height, segments).upload(ctx)
    }

    /// See [`Geometry::sphere`].
    pub fn sphere(ctx: &RenderContext, radius: f32, segments: u32, rings: u32) -> Self {
        Geometry::sphere(radius, segments, rings).upload(ctx)
    }

    /// See [`Geometry::cone`].
    pub fn cone(ctx: &RenderContext, radius: f32, height: f32, segments: u32) -> Self {
        Geometry::cone(radius, height, segments).upload(ctx)
    }

    /// Imports every mesh of a glTF file (`.gltf` or `.glb`) or the mesh of
    /// an STL file (`.stl`).
    ///
    /// Node transforms are baked into the vertices and the result is scaled by
    /// `scale`. This never fails: primitives without positions, normals or
    /// texture coordinates come back as unit cubes, and if the file cannot be
    /// imported at all the result is a single unit cube. Problems are logged
    /// as warnings.
    pub fn load_from_file(ctx: &RenderContext, path: impl AsRef<Path>, scale: f32) -> Vec<Mesh> {
        let path = path.as_ref();
        let geometries = match crate::import::import_file(path, scale) {
            Ok(geometries) => geometries,
            Err(e) => {
                log::warn!("{}: {e}; using a unit cube", path.display());
                vec![Geometry::cube(1.0)]
            }
        };
        geometries.iter().map(|g| g.upload(ctx)).collect()
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        self.device.delete_geometry(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceCommand;

    #[test]
    fn layout_matches_struct() {
        assert_eq!(Vertex3d::LAYOUT.array_stride, 32);
        assert_eq!(std::mem::size_of::<Vertex3d>(), Vertex3d::FLOATS * 4);
    }

    #[test]
    fn upload_is_verbatim() {
        let (ctx, device) = RenderContext::headless();
        let geometry = Geometry::sphere(1.0, 8, 4);
        let mesh = geometry.upload(&ctx);

        let data = device.geometry(mesh.id()).unwrap();
        assert_eq!(data.vertices, geometry.vertices);
        assert_eq!(data.indices, geometry.indices);
        assert_eq!(mesh.vertex_count(), 45);
    }

    #[test]
    fn cube_draw_issues_36_indices() {
        let (ctx, device) = RenderContext::headless();
        let program = crate::shader::ShaderProgram::from_sources(
            &ctx,
            crate::reflect::tests::VERTEX,
            crate::reflect::tests::FRAGMENT,
        );
        let cube = Mesh::cube(&ctx, 1.0);
        program.use_program();
        cube.draw();

        let calls = device.draw_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].index_count, 36);
        assert_eq!(calls[0].topology, Topology::TriangleList);
        assert_eq!(device.geometry(cube.id()).unwrap().vertices.len(), 24);
    }

    #[test]
    fn grid_keeps_line_topology() {
        let (ctx, _device) = RenderContext::headless();
        let grid = Mesh::grid(&ctx, 4.0, 4.0, 2, 2);
        assert_eq!(grid.topology(), Topology::LineList);
        assert_eq!(grid.index_count(), 12);
    }

    #[test]
    fn from_interleaved_reads_eight_floats_per_vertex() {
        let (ctx, device) = RenderContext::headless();
        #[rustfmt::skip]
        let data = [
            0.0, 0.0, 0.0,  0.0, 0.0, 1.0,  0.0, 0.0,
            1.0, 0.0, 0.0,  0.0, 0.0, 1.0,  1.0, 0.0,
            0.0, 1.0, 0.0,  0.0, 0.0, 1.0,  0.0, 1.0,
            9.0,
        ];
        let mesh = Mesh::from_interleaved(&ctx, &data, &[0, 1, 2], Topology::TriangleList);
        assert_eq!(mesh.vertex_count(), 3);
        let uploaded = device.geometry(mesh.id()).unwrap();
        assert_eq!(uploaded.vertices[2].uv, [0.0, 1.0]);
    }

    #[test]
    fn drop_releases_once() {
        let (ctx, device) = RenderContext::headless();
        let mesh = Mesh::cube(&ctx, 1.0);
        let id = mesh.id();
        drop(mesh);
        let deletes = device
            .commands()
            .iter()
            .filter(|c| **c == DeviceCommand::DeleteGeometry(id))
            .count();
        assert_eq!(deletes, 1);
        assert_eq!(device.live_geometries(), 0);
    }

    #[test]
    fn missing_file_falls_back_to_cube() {
        let (ctx, _device) = RenderContext::headless();
        let meshes = Mesh::load_from_file(&ctx, "no/such/model.glb", 1.0);
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].vertex_count(), 24);
        assert_eq!(meshes[0].index_count(), 36);
    }

    #[test]
    fn corrupt_stl_falls_back_to_cube() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.stl");
        std::fs::write(&path, [7u8; 10]).unwrap();

        let (ctx, _device) = RenderContext::headless();
        let meshes = Mesh::load_from_file(&ctx, &path, 1.0);
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].vertex_count(), 24);
    }
}
