//! Read-only view over an imported scene: materials by name, meshes by index.

use glam::{Vec2, Vec3};
use rescomp_core::{CompileError, CompileResult};

/// A polygon as a list of vertex indices; triangles once the scene is triangulated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Face {
    indices: Vec<u32>,
}

impl Face {
    pub fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    pub fn triangle(a: u32, b: u32, c: u32) -> Self {
        Self { indices: vec![a, b, c] }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn is_triangle(&self) -> bool {
        self.indices.len() == 3
    }

    pub(crate) fn indices_mut(&mut self) -> &mut Vec<u32> {
        &mut self.indices
    }

    /// Triangle fan over the polygon, `(0, i, i + 1)`.
    pub(crate) fn fan(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        let first = self.indices.first().copied().unwrap_or(0);
        self.indices.windows(2).skip(1).map(move |w| [first, w[0], w[1]])
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedMesh {
    pub(crate) name: String,
    pub(crate) material_index: usize,
    pub(crate) positions: Vec<Vec3>,
    pub(crate) normals: Vec<Vec3>,
    pub(crate) tangents: Vec<Vec3>,
    pub(crate) bitangents: Vec<Vec3>,
    pub(crate) uv_channels: Vec<Vec<Vec2>>,
    pub(crate) faces: Vec<Face>,
}

impl ImportedMesh {
    pub fn new(name: impl Into<String>, material_index: usize, positions: Vec<Vec3>, faces: Vec<Face>) -> Self {
        Self {
            name: name.into(),
            material_index,
            positions,
            faces,
            ..Default::default()
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_uv_channel(mut self, uvs: Vec<Vec2>) -> Self {
        self.uv_channels.push(uvs);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn material_index(&self) -> usize {
        self.material_index
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Empty unless tangent space was computed on import.
    pub fn tangents(&self) -> &[Vec3] {
        &self.tangents
    }

    pub fn bitangents(&self) -> &[Vec3] {
        &self.bitangents
    }

    pub fn uv_channel_count(&self) -> usize {
        self.uv_channels.len()
    }

    pub fn uv_channel(&self, channel: usize) -> Option<&[Vec2]> {
        self.uv_channels.get(channel).map(Vec::as_slice)
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn face(&self, index: usize) -> Option<&Face> {
        self.faces.get(index)
    }

    fn check(&self, index: usize, material_count: usize) -> Result<(), String> {
        let vertices = self.positions.len();
        if self.material_index >= material_count {
            return Err(format!(
                "mesh {} ('{}') uses material {} but the scene has {} materials",
                index, self.name, self.material_index, material_count
            ));
        }
        if self.normals.len() != vertices {
            return Err(format!("mesh {} ('{}') has {} normals for {} vertices", index, self.name, self.normals.len(), vertices));
        }
        if !self.tangents.is_empty() && (self.tangents.len() != vertices || self.bitangents.len() != vertices) {
            return Err(format!("mesh {} ('{}') has a partial tangent space", index, self.name));
        }
        for (channel, uvs) in self.uv_channels.iter().enumerate() {
            if uvs.len() != vertices {
                return Err(format!(
                    "mesh {} ('{}') uv channel {} has {} entries for {} vertices",
                    index,
                    self.name,
                    channel,
                    uvs.len(),
                    vertices
                ));
            }
        }
        for (f, face) in self.faces.iter().enumerate() {
            if let Some(&bad) = face.indices().iter().find(|&&i| i as usize >= vertices) {
                return Err(format!(
                    "mesh {} ('{}') face {} references vertex {} of {}",
                    index, self.name, f, bad, vertices
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedScene {
    materials: Vec<String>,
    meshes: Vec<ImportedMesh>,
}

impl ImportedScene {
    /// Wraps materials and meshes, rejecting out-of-range material or vertex references.
    pub fn new(materials: Vec<String>, meshes: Vec<ImportedMesh>) -> CompileResult<Self> {
        for (i, mesh) in meshes.iter().enumerate() {
            mesh.check(i, materials.len()).map_err(CompileError::InvalidScene)?;
        }
        Ok(Self { materials, meshes })
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn material_name(&self, index: usize) -> Option<&str> {
        self.materials.get(index).map(String::as_str)
    }

    pub fn material_names(&self) -> impl Iterator<Item = &str> {
        self.materials.iter().map(String::as_str)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn mesh(&self, index: usize) -> Option<&ImportedMesh> {
        self.meshes.get(index)
    }

    pub fn meshes(&self) -> impl Iterator<Item = &ImportedMesh> {
        self.meshes.iter()
    }
}
