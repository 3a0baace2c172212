//! The `.gmdl` binary model container.
//!
//! Encoded with bincode using fixed-width little-endian integers and `u64`
//! length prefixes for every array, map and string:
//!
//! ```text
//! [0..4]   format tag  b"GMDL"
//! [4..8]   version     u32
//! [8]      materials   u8
//! [9]      meshes      u8
//! materials: u64 count, then { name, shader, bindings: u64 count + (name, filename)* }
//! meshes:    u64 count, then {
//!     header   { material_index u32, vertices u32, faces u32, uv_channels u32 }
//!     vertices u64 count + [f32; 3]*
//!     faces    u64 count + [u32; 3]*
//!     uvs      u64 count + (u64 count + [f32; 2]*)*
//!     normals  u64 count + [f32; 3]*
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use bincode::Options;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"GMDL";
pub const VERSION: u32 = 1;
pub const EXTENSION: &str = "gmdl";

const HEADER_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Invalid GMDL magic header")]
    InvalidMagic,

    #[error("Unsupported GMDL version {0} (expected {})", VERSION)]
    UnsupportedVersion(u32),

    #[error("File too small to be a GMDL file")]
    Truncated,

    #[error("Too many {what} for a GMDL header: {count} (max {})", u8::MAX)]
    TooMany { what: &'static str, count: usize },

    #[error("Inconsistent model: {0}")]
    Inconsistent(String),

    #[error("Encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHeader {
    pub format: [u8; 4],
    pub version: u32,
    pub materials: u8,
    pub meshes: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMaterial {
    pub name: String,
    pub shader: String,
    pub bindings: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshHeader {
    pub material_index: u32,
    pub vertices: u32,
    pub faces: u32,
    pub uv_channels: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UvChannel {
    pub uvs: Vec<[f32; 2]>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub header: MeshHeader,
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
    pub uv_channels: Vec<UvChannel>,
    pub normals: Vec<[f32; 3]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub header: ModelHeader,
    pub materials: Vec<ModelMaterial>,
    pub meshes: Vec<Mesh>,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_little_endian()
        .with_fixint_encoding()
}

fn count_u32(what: &str, count: usize) -> Result<u32, FormatError> {
    u32::try_from(count).map_err(|_| FormatError::Inconsistent(format!("{} count {} exceeds u32", what, count)))
}

impl Mesh {
    /// Builds a mesh whose header is derived from the arrays it carries.
    pub fn new(
        material_index: u32,
        vertices: Vec<[f32; 3]>,
        faces: Vec<[u32; 3]>,
        uv_channels: Vec<UvChannel>,
        normals: Vec<[f32; 3]>,
    ) -> Result<Self, FormatError> {
        let header = MeshHeader {
            material_index,
            vertices: count_u32("vertex", vertices.len())?,
            faces: count_u32("face", faces.len())?,
            uv_channels: count_u32("uv channel", uv_channels.len())?,
        };
        Ok(Self {
            header,
            vertices,
            faces,
            uv_channels,
            normals,
        })
    }

    fn validate(&self, index: usize, material_count: usize) -> Result<(), FormatError> {
        let h = &self.header;
        let fail = |what: String| Err(FormatError::Inconsistent(format!("mesh {}: {}", index, what)));

        if h.material_index as usize >= material_count {
            return fail(format!("material index {} out of range ({} materials)", h.material_index, material_count));
        }
        if h.vertices as usize != self.vertices.len() {
            return fail(format!("header declares {} vertices, found {}", h.vertices, self.vertices.len()));
        }
        if self.normals.len() != self.vertices.len() {
            return fail(format!("{} normals for {} vertices", self.normals.len(), self.vertices.len()));
        }
        if h.faces as usize != self.faces.len() {
            return fail(format!("header declares {} faces, found {}", h.faces, self.faces.len()));
        }
        if let Some(face) = self.faces.iter().find(|f| f.iter().any(|&i| i >= h.vertices)) {
            return fail(format!("face {:?} references a vertex out of range", face));
        }
        if h.uv_channels as usize != self.uv_channels.len() {
            return fail(format!("header declares {} uv channels, found {}", h.uv_channels, self.uv_channels.len()));
        }
        for (channel, uvs) in self.uv_channels.iter().enumerate() {
            if uvs.uvs.len() != self.vertices.len() {
                return fail(format!("uv channel {} has {} entries for {} vertices", channel, uvs.uvs.len(), self.vertices.len()));
            }
        }
        Ok(())
    }
}

impl Model {
    /// Builds a model with a header matching `materials` and `meshes`.
    pub fn new(materials: Vec<ModelMaterial>, meshes: Vec<Mesh>) -> Result<Self, FormatError> {
        let header = ModelHeader {
            format: MAGIC,
            version: VERSION,
            materials: u8::try_from(materials.len()).map_err(|_| FormatError::TooMany {
                what: "materials",
                count: materials.len(),
            })?,
            meshes: u8::try_from(meshes.len()).map_err(|_| FormatError::TooMany {
                what: "meshes",
                count: meshes.len(),
            })?,
        };
        let model = Self {
            header,
            materials,
            meshes,
        };
        model.validate()?;
        Ok(model)
    }

    /// Checks every count invariant of the container.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.header.format != MAGIC {
            return Err(FormatError::InvalidMagic);
        }
        if self.header.version != VERSION {
            return Err(FormatError::UnsupportedVersion(self.header.version));
        }
        if self.header.materials as usize != self.materials.len() {
            return Err(FormatError::Inconsistent(format!(
                "header declares {} materials, found {}",
                self.header.materials,
                self.materials.len()
            )));
        }
        if self.header.meshes as usize != self.meshes.len() {
            return Err(FormatError::Inconsistent(format!(
                "header declares {} meshes, found {}",
                self.header.meshes,
                self.meshes.len()
            )));
        }
        for (i, mesh) in self.meshes.iter().enumerate() {
            mesh.validate(i, self.materials.len())?;
        }
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), FormatError> {
        self.validate()?;
        codec().serialize_into(writer, self)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Writes to a uniquely named file next to `path` and renames it into place once
    /// everything is flushed, so a failed or concurrent write never leaves a truncated
    /// model behind. The temporary file is removed if anything fails.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), FormatError> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::with_capacity(1024 * 1024, tmp.as_file_mut());
            self.write_to(&mut writer)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_LEN {
            return Err(FormatError::Truncated);
        }
        if bytes[0..4] != MAGIC {
            return Err(FormatError::InvalidMagic);
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let model: Model = codec().with_limit(bytes.len() as u64).deserialize(bytes)?;
        model.validate()?;
        Ok(model)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let file = File::open(path.as_ref())?;
        if file.metadata()?.len() < HEADER_LEN as u64 {
            return Err(FormatError::Truncated);
        }
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }

    pub fn material_index(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }
}
