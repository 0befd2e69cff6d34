//! Mesh file import.
//!
//! glTF: the default scene (or the first scene) is walked from its root
//! nodes; each mesh primitive becomes one [`Geometry`] with its node's world
//! transform and the import scale baked in.
//!
//! STL (binary or ASCII): the whole file becomes one flat-shaded triangle
//! list without texture coordinates.

use crate::device::Topology;
use crate::error::ImportError;
use crate::geometry::Geometry;
use crate::mesh::Vertex3d;
use glam::{Mat4, Vec3};
use std::path::Path;

/// Imports every primitive of a `.gltf` / `.glb` file, or the single mesh of
/// an `.stl` file. The format is picked from the extension.
///
/// Primitives that cannot be represented (missing positions, normals or
/// `TEXCOORD_0`, attributes of differing lengths, indices past the last
/// vertex, or a mode other than triangles or lines) are replaced by a unit
/// cube so the mesh count still matches the file.
pub fn import_file(path: &Path, scale: f32) -> Result<Vec<Geometry>, ImportError> {
    let is_stl = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("stl"));
    if is_stl {
        let mut geometry = import_stl(path)?;
        geometry.scale(scale);
        log::debug!("imported STL mesh from {}", path.display());
        return Ok(vec![geometry]);
    }

    let gltf::Gltf { document, blob } = gltf::Gltf::open(path)?;
    let buffers = gltf::import_buffers(&document, path.parent(), blob)?;
    let root = Mat4::from_scale(Vec3::splat(scale));

    let mut out = Vec::new();
    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            for node in scene.nodes() {
                visit(&node, root, &buffers, &mut out);
            }
        }
        None => {
            for mesh in document.meshes() {
                load_mesh(&mesh, root, &buffers, &mut out);
            }
        }
    }

    if out.is_empty() {
        return Err(ImportError::Empty);
    }
    log::debug!("imported {} mesh(es) from {}", out.len(), path.display());
    Ok(out)
}

fn import_stl(path: &Path) -> Result<Geometry, ImportError> {
    let file = std::fs::File::open(path).map_err(ImportError::Stl)?;
    let stl = stl_io::read_stl(&mut std::io::BufReader::new(file)).map_err(ImportError::Stl)?;
    if stl.faces.is_empty() {
        return Err(ImportError::Empty);
    }

    let mut vertices = Vec::with_capacity(stl.faces.len() * 3);
    for face in &stl.faces {
        let corners = face.vertices.map(|i| Vec3::from(<[f32; 3]>::from(stl.vertices[i])));
        // Exporters often leave facet normals zeroed.
        let mut normal = Vec3::from(<[f32; 3]>::from(face.normal));
        if normal.length_squared() < 1e-12 {
            normal = (corners[1] - corners[0])
                .cross(corners[2] - corners[0])
                .normalize_or_zero();
        }
        for corner in corners {
            vertices.push(Vertex3d::new(corner.into(), normal.into(), [0.0, 0.0]));
        }
    }
    let indices = (0..vertices.len() as u32).collect();
    Ok(Geometry::new(vertices, indices))
}

fn visit(
    node: &gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<Geometry>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        load_mesh(&mesh, world, buffers, out);
    }
    for child in node.children() {
        visit(&child, world, buffers, out);
    }
}

fn load_mesh(
    mesh: &gltf::Mesh<'_>,
    world: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<Geometry>,
) {
    for primitive in mesh.primitives() {
        let geometry = match load_primitive(&primitive, buffers) {
            Ok(mut geometry) => {
                geometry.transform(world);
                if world.determinant() < 0.0 && geometry.topology == Topology::TriangleList {
                    for tri in geometry.indices.chunks_exact_mut(3) {
                        tri.swap(1, 2);
                    }
                }
                geometry
            }
            Err(e) => {
                log::warn!(
                    "mesh {:?} primitive {}: {e}; using a unit cube",
                    mesh.name().unwrap_or("<unnamed>"),
                    primitive.index()
                );
                Geometry::cube(1.0)
            }
        };
        out.push(geometry);
    }
}

fn load_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
) -> Result<Geometry, ImportError> {
    let topology = match primitive.mode() {
        gltf::mesh::Mode::Triangles => Topology::TriangleList,
        gltf::mesh::Mode::Lines => Topology::LineList,
        other => return Err(ImportError::UnsupportedMode(other)),
    };

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));
    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or(ImportError::MissingAttribute("POSITION"))?
        .collect();
    let normals: Vec<[f32; 3]> = reader
        .read_normals()
        .ok_or(ImportError::MissingAttribute("NORMAL"))?
        .collect();
    let uvs: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .ok_or(ImportError::MissingAttribute("TEXCOORD_0"))?
        .into_f32()
        .collect();
    for (attribute, actual) in [("NORMAL", normals.len()), ("TEXCOORD_0", uvs.len())] {
        if actual != positions.len() {
            return Err(ImportError::AttributeCount {
                attribute,
                expected: positions.len(),
                actual,
            });
        }
    }

    let vertices: Vec<Vertex3d> = positions
        .into_iter()
        .zip(normals)
        .zip(uvs)
        .map(|((p, n), uv)| Vertex3d::new(p, n, uv))
        .collect();
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        return Err(ImportError::IndexOutOfRange {
            index,
            vertices: vertices.len(),
        });
    }

    Ok(Geometry::new(vertices, indices).with_topology(topology))
}
