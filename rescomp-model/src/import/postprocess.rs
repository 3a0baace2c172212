use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use log::debug;
use meshopt::{generate_vertex_remap, optimize_vertex_cache, remap_index_buffer, remap_vertex_buffer};

use crate::scene::{Face, ImportedMesh};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
struct WeldVertex {
    p: [f32; 3],
    n: [f32; 3],
    u: [f32; 2],
}

fn flatten(faces: &[Face]) -> (Vec<u32>, Vec<usize>) {
    let mut indices = Vec::new();
    let mut arities = Vec::with_capacity(faces.len());
    for face in faces {
        indices.extend_from_slice(face.indices());
        arities.push(face.indices().len());
    }
    (indices, arities)
}

fn unflatten(indices: &[u32], arities: &[usize]) -> Vec<Face> {
    let mut faces = Vec::with_capacity(arities.len());
    let mut offset = 0;
    for &arity in arities {
        faces.push(Face::new(indices[offset..offset + arity].to_vec()));
        offset += arity;
    }
    faces
}

/// Welds vertices identical in position, normal and uv.
/// Only triangle lists are welded; meshopt requires a multiple of three indices.
pub fn join_identical_vertices(mesh: &mut ImportedMesh) {
    if mesh.faces.is_empty() || mesh.uv_channels.len() > 1 || !mesh.faces.iter().all(Face::is_triangle) {
        return;
    }

    let has_normals = !mesh.normals.is_empty();
    let uvs = mesh.uv_channels.first();
    let vertices: Vec<WeldVertex> = (0..mesh.positions.len())
        .map(|i| WeldVertex {
            p: mesh.positions[i].to_array(),
            n: if has_normals { mesh.normals[i].to_array() } else { [0.0; 3] },
            u: uvs.map(|uv| uv[i].to_array()).unwrap_or([0.0; 2]),
        })
        .collect();

    let (indices, arities) = flatten(&mesh.faces);
    let (vertex_count, remap) = generate_vertex_remap(&vertices, Some(&indices));
    if vertex_count == vertices.len() {
        return;
    }

    let welded = remap_vertex_buffer(&vertices, vertex_count, &remap);
    let indices = remap_index_buffer(Some(&indices), vertex_count, &remap);
    debug!("'{}': welded {} vertices into {}", mesh.name, vertices.len(), vertex_count);

    mesh.positions = welded.iter().map(|v| Vec3::from_array(v.p)).collect();
    if has_normals {
        mesh.normals = welded.iter().map(|v| Vec3::from_array(v.n)).collect();
    }
    if uvs.is_some() {
        mesh.uv_channels = vec![welded.iter().map(|v| Vec2::from_array(v.u)).collect()];
    }
    mesh.faces = unflatten(&indices, &arities);
}

/// Area-weighted vertex normals; vertices without adjacent area point up.
pub fn generate_normals(mesh: &mut ImportedMesh) {
    let mut normals = vec![Vec3::ZERO; mesh.positions.len()];
    for face in &mesh.faces {
        for [a, b, c] in face.fan() {
            let (pa, pb, pc) = (mesh.positions[a as usize], mesh.positions[b as usize], mesh.positions[c as usize]);
            let n = (pb - pa).cross(pc - pa);
            normals[a as usize] += n;
            normals[b as usize] += n;
            normals[c as usize] += n;
        }
    }
    mesh.normals = normals
        .into_iter()
        .map(|n| {
            let n = n.normalize_or_zero();
            if n == Vec3::ZERO { Vec3::Y } else { n }
        })
        .collect();
}

fn bounds(points: impl Iterator<Item = Vec3>) -> (Vec3, Vec3) {
    points.fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(min, max), p| (min.min(p), max.max(p)))
}

/// Flips normals and winding when the normals point into the mesh.
///
/// Offsetting every vertex along an outward normal grows the bounding box; if the
/// offset box has no more volume than the unshifted one, the normals face inward.
/// Returns whether the mesh was flipped.
pub fn fix_infacing_normals(mesh: &mut ImportedMesh) -> bool {
    if mesh.positions.is_empty() || mesh.normals.len() != mesh.positions.len() {
        return false;
    }

    let (min0, max0) = bounds(mesh.positions.iter().copied());
    let (min1, max1) = bounds(mesh.positions.iter().zip(&mesh.normals).map(|(p, n)| *p + *n));
    let d0 = max0 - min0;
    let d1 = max1 - min1;

    // Planar meshes give no volume to compare.
    if d1.x < 0.05 * (d1.y * d1.z).sqrt() || d1.y < 0.05 * (d1.z * d1.x).sqrt() || d1.z < 0.05 * (d1.y * d1.x).sqrt() {
        return false;
    }
    if (d0.x * d0.y * d0.z).abs() < (d1.x * d1.y * d1.z).abs() {
        return false;
    }

    debug!("'{}': normals face inward, flipping", mesh.name);
    for n in &mut mesh.normals {
        *n = -*n;
    }
    for face in &mut mesh.faces {
        face.indices_mut().reverse();
    }
    true
}

fn orthogonal(n: Vec3) -> Vec3 {
    let axis = if n.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    axis.cross(n).normalize_or_zero()
}

/// Per-vertex tangents and bitangents derived from the first uv channel.
pub fn calc_tangent_space(mesh: &mut ImportedMesh) {
    let Some(uvs) = mesh.uv_channels.first() else {
        debug!("'{}': no uv channel, skipping tangent space", mesh.name);
        return;
    };
    if mesh.normals.len() != mesh.positions.len() {
        return;
    }

    let count = mesh.positions.len();
    let mut tangents = vec![Vec3::ZERO; count];
    let mut bitangents = vec![Vec3::ZERO; count];

    for face in &mesh.faces {
        for tri in face.fan() {
            let [a, b, c] = tri.map(|i| i as usize);
            let e1 = mesh.positions[b] - mesh.positions[a];
            let e2 = mesh.positions[c] - mesh.positions[a];
            let t1 = uvs[b] - uvs[a];
            let t2 = uvs[c] - uvs[a];

            let det = t1.x * t2.y - t2.x * t1.y;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let tangent = (e1 * t2.y - e2 * t1.y) * r;
            let bitangent = (e2 * t1.x - e1 * t2.x) * r;
            for v in [a, b, c] {
                tangents[v] += tangent;
                bitangents[v] += bitangent;
            }
        }
    }

    for i in 0..count {
        let n = mesh.normals[i];
        let mut t = (tangents[i] - n * n.dot(tangents[i])).normalize_or_zero();
        if t == Vec3::ZERO {
            t = orthogonal(n);
        }
        let b = bitangents[i];
        let mut bt = (b - n * n.dot(b) - t * t.dot(b)).normalize_or_zero();
        if bt == Vec3::ZERO {
            bt = n.cross(t);
        }
        tangents[i] = t;
        bitangents[i] = bt;
    }

    mesh.tangents = tangents;
    mesh.bitangents = bitangents;
}

/// Merges meshes that share a material and vertex layout, keeping first-seen order.
pub fn merge_meshes(meshes: Vec<ImportedMesh>) -> Vec<ImportedMesh> {
    let mut merged: Vec<ImportedMesh> = Vec::with_capacity(meshes.len());
    for mesh in meshes {
        let target = merged.iter_mut().find(|m| {
            m.material_index == mesh.material_index
                && m.uv_channels.len() == mesh.uv_channels.len()
                && m.tangents.is_empty() == mesh.tangents.is_empty()
        });
        match target {
            Some(target) => append(target, mesh),
            None => merged.push(mesh),
        }
    }
    merged
}

fn append(target: &mut ImportedMesh, mesh: ImportedMesh) {
    let offset = target.positions.len() as u32;
    debug!("merging '{}' into '{}'", mesh.name, target.name);

    target.positions.extend(mesh.positions);
    target.normals.extend(mesh.normals);
    target.tangents.extend(mesh.tangents);
    target.bitangents.extend(mesh.bitangents);
    for (dst, src) in target.uv_channels.iter_mut().zip(mesh.uv_channels) {
        dst.extend(src);
    }
    target.faces.extend(
        mesh.faces
            .into_iter()
            .map(|f| Face::new(f.indices().iter().map(|i| i + offset).collect())),
    );
}

/// Reorders triangles for the post-transform vertex cache.
pub fn optimize_triangle_order(mesh: &mut ImportedMesh) {
    if mesh.faces.is_empty() || !mesh.faces.iter().all(Face::is_triangle) {
        return;
    }
    let (indices, arities) = flatten(&mesh.faces);
    let optimized = optimize_vertex_cache(&indices, mesh.positions.len());
    mesh.faces = unflatten(&optimized, &arities);
}
