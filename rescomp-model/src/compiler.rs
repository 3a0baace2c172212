use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use rescomp_core::{BuiltResource, CompileError, CompileResult, Compiler, CompilerContext};

use crate::descriptor::{AssetDescriptor, MaterialSet};
use crate::format::{self, Mesh, Model, ModelMaterial, UvChannel};
use crate::import::{PostProcessSteps, import_scene};
use crate::scene::{ImportedMesh, ImportedScene};
use crate::validate::validate_materials;

/// Compiles a model asset descriptor into a `.gmdl` file.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModelCompiler;

impl Compiler for ModelCompiler {
    fn name(&self) -> &'static str {
        "model"
    }

    fn compile(&self, ctx: &CompilerContext) -> CompileResult<BuiltResource> {
        let descriptor = AssetDescriptor::read(&ctx.file)?;
        let scene = import_scene(&descriptor.source_path, PostProcessSteps::MODEL_COMPILER)?;

        if !validate_materials(&descriptor.materials, &scene) {
            return Err(CompileError::MaterialMismatch {
                declared: descriptor.materials.names().map(str::to_owned).collect(),
                found: scene.material_names().map(str::to_owned).collect(),
            });
        }

        let target = target_model_path(ctx, &descriptor.source_path)?;
        compile_model(&scene, &descriptor.materials, &target)?;

        Ok(BuiltResource {
            source: descriptor.source_path,
            target,
        })
    }
}

/// `data_dir / <descriptor dir relative to assets_dir> / <source stem>.gmdl`.
/// Creates the target directory if it is missing.
pub fn target_model_path(ctx: &CompilerContext, source: &Path) -> CompileResult<PathBuf> {
    let invalid = || CompileError::InvalidAssetPath {
        asset: ctx.file.clone(),
        assets_dir: ctx.assets_dir.clone(),
    };

    let asset_dir = match ctx.file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let (asset_dir, assets_dir) = normalize_pair(asset_dir, &ctx.assets_dir).map_err(|_| invalid())?;
    let relative = asset_dir.strip_prefix(&assets_dir).map_err(|_| invalid())?;
    let target_dir = ctx.data_dir.join(relative);
    fs::create_dir_all(&target_dir).map_err(|e| CompileError::write(&target_dir, e))?;

    let stem = source.file_stem().ok_or_else(invalid)?;
    let mut file_name = stem.to_os_string();
    file_name.push(".");
    file_name.push(format::EXTENSION);
    Ok(target_dir.join(file_name))
}

/// Brings both paths to the same spelling: canonical when both exist, otherwise
/// absolute against the working directory with `.` components dropped.
fn normalize_pair(a: &Path, b: &Path) -> std::io::Result<(PathBuf, PathBuf)> {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        _ => Ok((std::path::absolute(a)?, std::path::absolute(b)?)),
    }
}

/// Serializes `scene` with the declared `materials` to `target`.
pub fn compile_model(scene: &ImportedScene, materials: &MaterialSet, target: &Path) -> CompileResult<()> {
    let model = build_model(scene, materials)?;
    model.save_to_file(target).map_err(|e| CompileError::write(target, e))?;
    info!(
        "Wrote {} ({} materials, {} meshes)",
        target.display(),
        model.header.materials,
        model.header.meshes
    );
    Ok(())
}

/// Materials are emitted in scene order so mesh material indices address them directly.
pub fn build_model(scene: &ImportedScene, materials: &MaterialSet) -> CompileResult<Model> {
    let model_materials = scene
        .material_names()
        .map(|name| {
            let spec = materials.get(name).ok_or_else(|| CompileError::MaterialMismatch {
                declared: materials.names().map(str::to_owned).collect(),
                found: scene.material_names().map(str::to_owned).collect(),
            })?;
            Ok(ModelMaterial {
                name: spec.name.clone(),
                shader: spec.shader.clone(),
                bindings: spec.bindings.clone(),
            })
        })
        .collect::<CompileResult<Vec<_>>>()?;

    let meshes = scene
        .meshes()
        .enumerate()
        .map(|(i, mesh)| build_mesh(i, mesh))
        .collect::<CompileResult<Vec<_>>>()?;

    Model::new(model_materials, meshes).map_err(|e| CompileError::InvalidScene(e.to_string()))
}

fn build_mesh(index: usize, mesh: &ImportedMesh) -> CompileResult<Mesh> {
    let invalid = |what: String| CompileError::InvalidScene(format!("mesh {} ('{}'): {}", index, mesh.name(), what));

    let material_index = u32::try_from(mesh.material_index()).map_err(|_| invalid("material index overflow".into()))?;

    let vertices = mesh.positions().iter().map(|p| p.to_array()).collect();

    // Only triangles can be stored; import triangulates, anything else is a broken scene.
    let faces = mesh
        .faces()
        .iter()
        .enumerate()
        .map(|(f, face)| match *face.indices() {
            [a, b, c] => Ok([a, b, c]),
            ref other => Err(invalid(format!("face {} has {} indices, expected 3", f, other.len()))),
        })
        .collect::<CompileResult<Vec<_>>>()?;

    let uv_channels = (0..mesh.uv_channel_count())
        .filter_map(|channel| mesh.uv_channel(channel))
        .map(|uvs| UvChannel {
            uvs: uvs.iter().map(|uv| uv.to_array()).collect(),
        })
        .collect();

    let normals = mesh.normals().iter().map(|n| n.to_array()).collect();

    Mesh::new(material_index, vertices, faces, uv_channels, normals).map_err(|e| invalid(e.to_string()))
}
