use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, warn};
use rescomp_core::{CompileError, CompileResult};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterialSpec {
    pub name: String,
    pub shader: String,
    /// Binding slot -> resource file, e.g. `"diffuse" -> "hull_d.png"`.
    pub bindings: BTreeMap<String, String>,
}

/// Materials in declaration order, unique by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterialSet {
    materials: Vec<MaterialSpec>,
}

impl MaterialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `material`, replacing (in place) any earlier material with the same name.
    /// Returns the replaced material.
    pub fn insert(&mut self, material: MaterialSpec) -> Option<MaterialSpec> {
        match self.materials.iter_mut().find(|m| m.name == material.name) {
            Some(existing) => Some(std::mem::replace(existing, material)),
            None => {
                self.materials.push(material);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&MaterialSpec> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialSpec> {
        self.materials.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.materials.iter().map(|m| m.name.as_str())
    }
}

impl FromIterator<MaterialSpec> for MaterialSet {
    fn from_iter<I: IntoIterator<Item = MaterialSpec>>(iter: I) -> Self {
        let mut set = MaterialSet::new();
        for material in iter {
            set.insert(material);
        }
        set
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetDescriptor {
    /// Path of the descriptor file itself.
    pub asset_path: PathBuf,
    /// Scene file, resolved against the descriptor's directory.
    pub source_path: PathBuf,
    pub materials: MaterialSet,
}

impl AssetDescriptor {
    pub fn read<P: AsRef<Path>>(path: P) -> CompileResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CompileError::DescriptorRead {
            asset: path.to_path_buf(),
            source,
        })?;
        Self::from_json(path, &text)
    }

    /// Parses descriptor text as if it had been read from `asset_path`.
    pub fn from_json(asset_path: &Path, text: &str) -> CompileResult<Self> {
        let root: Value = serde_json::from_str(text).map_err(|source| CompileError::DescriptorParse {
            asset: asset_path.to_path_buf(),
            source,
        })?;
        let reader = Reader { asset: asset_path };
        reader.descriptor(&root).inspect_err(|e| error!("{}", e))
    }
}

struct Reader<'a> {
    asset: &'a Path,
}

impl Reader<'_> {
    fn missing(&self, field: &'static str, material: Option<&str>) -> CompileError {
        CompileError::MissingField {
            asset: self.asset.to_path_buf(),
            field,
            material: material.map(str::to_owned),
        }
    }

    fn string<'v>(&self, object: &'v Map<String, Value>, field: &'static str, material: Option<&str>) -> CompileResult<&'v str> {
        object
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| self.missing(field, material))
    }

    fn array<'v>(&self, object: &'v Map<String, Value>, field: &'static str, material: Option<&str>) -> CompileResult<&'v [Value]> {
        object
            .get(field)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .filter(|items| !items.is_empty())
            .ok_or_else(|| self.missing(field, material))
    }

    fn descriptor(&self, root: &Value) -> CompileResult<AssetDescriptor> {
        let root = root.as_object().ok_or_else(|| self.missing("source", None))?;

        let source = self.string(root, "source", None)?;
        let base = self.asset.parent().unwrap_or_else(|| Path::new(""));
        let source_path = base.join(source);

        let mut materials = MaterialSet::new();
        for entry in self.array(root, "materials", None)? {
            let material = self.material(entry)?;
            if let Some(previous) = materials.insert(material) {
                warn!(
                    "Material '{}' is declared more than once in asset {}, keeping the last declaration",
                    previous.name,
                    self.asset.display()
                );
            }
        }

        Ok(AssetDescriptor {
            asset_path: self.asset.to_path_buf(),
            source_path,
            materials,
        })
    }

    fn material(&self, entry: &Value) -> CompileResult<MaterialSpec> {
        let entry = entry.as_object().ok_or_else(|| self.missing("name", None))?;

        let name = self.string(entry, "name", None)?;
        let shader = self.string(entry, "shader", Some(name))?;

        let mut bindings = BTreeMap::new();
        for binding in self.array(entry, "bindings", Some(name))? {
            let binding = binding.as_object().ok_or_else(|| self.missing("name", Some(name)))?;
            let slot = self.string(binding, "name", Some(name))?;
            let filename = self.string(binding, "filename", Some(name))?;
            bindings.insert(slot.to_string(), filename.to_string());
        }

        Ok(MaterialSpec {
            name: name.to_string(),
            shader: shader.to_string(),
            bindings,
        })
    }
}
