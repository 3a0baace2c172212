pub mod postprocess;

use std::path::Path;

use bitflags::bitflags;
use glam::{Vec2, Vec3};
use log::{debug, info, warn};
use rescomp_core::{CompileError, CompileResult};

use crate::scene::{Face, ImportedMesh, ImportedScene};

/// Name given to the material of meshes that don't reference one.
pub const DEFAULT_MATERIAL: &str = "DefaultMaterial";

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PostProcessSteps: u32 {
        const CALC_TANGENT_SPACE = 1 << 0;
        const TRIANGULATE = 1 << 1;
        const JOIN_IDENTICAL_VERTICES = 1 << 2;
        const FIX_INFACING_NORMALS = 1 << 3;
        const SORT_BY_PTYPE = 1 << 4;
        const OPTIMIZE_MESHES = 1 << 5;
        const OPTIMIZE_GRAPH = 1 << 6;

        /// The fixed pipeline every model compilation uses.
        const MODEL_COMPILER = Self::CALC_TANGENT_SPACE.bits()
            | Self::TRIANGULATE.bits()
            | Self::JOIN_IDENTICAL_VERTICES.bits()
            | Self::FIX_INFACING_NORMALS.bits()
            | Self::SORT_BY_PTYPE.bits()
            | Self::OPTIMIZE_MESHES.bits()
            | Self::OPTIMIZE_GRAPH.bits();
    }
}

/// Loads a Wavefront OBJ scene (and its MTL library) and runs `steps` over it.
pub fn import_scene(path: &Path, steps: PostProcessSteps) -> CompileResult<ImportedScene> {
    if !path.is_file() {
        return Err(CompileError::SourceNotFound { path: path.to_path_buf() });
    }

    let options = tobj::LoadOptions {
        single_index: true,
        triangulate: steps.contains(PostProcessSteps::TRIANGULATE),
        // a triangle-only index stream has no room for points or lines
        ignore_points: steps.intersects(PostProcessSteps::SORT_BY_PTYPE | PostProcessSteps::TRIANGULATE),
        ignore_lines: steps.intersects(PostProcessSteps::SORT_BY_PTYPE | PostProcessSteps::TRIANGULATE),
        ..Default::default()
    };

    let (models, materials) = tobj::load_obj(path, &options).map_err(|e| CompileError::ImportFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut material_names: Vec<String> = match materials {
        Ok(materials) => materials.into_iter().map(|m| m.name).collect(),
        Err(e) => {
            warn!("Failed to load material library for {}: {}", path.display(), e);
            Vec::new()
        }
    };
    let library_len = material_names.len();

    let mut meshes = Vec::with_capacity(models.len());
    for model in models {
        let material_index = match model.mesh.material_id.filter(|&id| id < library_len) {
            Some(id) => id,
            None => default_material(&mut material_names),
        };
        meshes.push(convert_mesh(model.name, model.mesh, material_index));
    }

    let meshes = postprocess_meshes(meshes, steps);
    let scene = ImportedScene::new(material_names, meshes)?;
    info!(
        "Imported {}: {} meshes, {} materials",
        path.display(),
        scene.mesh_count(),
        scene.material_count()
    );
    Ok(scene)
}

fn default_material(names: &mut Vec<String>) -> usize {
    match names.iter().position(|n| n == DEFAULT_MATERIAL) {
        Some(index) => index,
        None => {
            names.push(DEFAULT_MATERIAL.to_string());
            names.len() - 1
        }
    }
}

fn convert_mesh(name: String, mesh: tobj::Mesh, material_index: usize) -> ImportedMesh {
    let positions = mesh.positions.chunks_exact(3).map(Vec3::from_slice).collect();

    let faces = if mesh.face_arities.is_empty() {
        mesh.indices
            .chunks_exact(3)
            .map(|tri| Face::triangle(tri[0], tri[1], tri[2]))
            .collect()
    } else {
        let mut faces = Vec::with_capacity(mesh.face_arities.len());
        let mut offset = 0;
        for &arity in &mesh.face_arities {
            let arity = arity as usize;
            faces.push(Face::new(mesh.indices[offset..offset + arity].to_vec()));
            offset += arity;
        }
        faces
    };

    let mut imported = ImportedMesh::new(name, material_index, positions, faces);
    if !mesh.normals.is_empty() {
        imported = imported.with_normals(mesh.normals.chunks_exact(3).map(Vec3::from_slice).collect());
    }
    if !mesh.texcoords.is_empty() {
        imported = imported.with_uv_channel(mesh.texcoords.chunks_exact(2).map(Vec2::from_slice).collect());
    }
    imported
}

fn postprocess_meshes(mut meshes: Vec<ImportedMesh>, steps: PostProcessSteps) -> Vec<ImportedMesh> {
    if steps.contains(PostProcessSteps::OPTIMIZE_GRAPH) {
        let before = meshes.len();
        meshes.retain(|m| !m.faces().is_empty());
        if meshes.len() != before {
            debug!("dropped {} empty meshes", before - meshes.len());
        }
    }

    for mesh in &mut meshes {
        if steps.contains(PostProcessSteps::JOIN_IDENTICAL_VERTICES) {
            postprocess::join_identical_vertices(mesh);
        }
        if mesh.normals().len() != mesh.vertex_count() {
            postprocess::generate_normals(mesh);
        }
        if steps.contains(PostProcessSteps::FIX_INFACING_NORMALS) {
            postprocess::fix_infacing_normals(mesh);
        }
        if steps.contains(PostProcessSteps::CALC_TANGENT_SPACE) {
            postprocess::calc_tangent_space(mesh);
        }
    }

    if steps.contains(PostProcessSteps::OPTIMIZE_MESHES) {
        meshes = postprocess::merge_meshes(meshes);
        for mesh in &mut meshes {
            postprocess::optimize_triangle_order(mesh);
        }
    }
    meshes
}
