use std::path::PathBuf;

use thiserror::Error;

/// Coarse failure classes reported to the asset-pipeline driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingField,
    SourceNotFound,
    ImportFailed,
    MaterialMismatch,
    IoError,
    NotImplemented,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Couldn't find required '{field}' field{} in asset {}", material_suffix(.material), .asset.display())]
    MissingField {
        asset: PathBuf,
        field: &'static str,
        material: Option<String>,
    },

    #[error("Failed to read asset {}: {source}", .asset.display())]
    DescriptorRead {
        asset: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Asset {} is not valid JSON: {source}", .asset.display())]
    DescriptorParse {
        asset: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Model file {} doesn't exist", .path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Failed to import {}: {reason}", .path.display())]
    ImportFailed { path: PathBuf, reason: String },

    #[error("Imported scene is malformed: {0}")]
    InvalidScene(String),

    #[error("Material mismatch between asset and model file (asset: [{}], model file: [{}])", .declared.join(", "), .found.join(", "))]
    MaterialMismatch {
        declared: Vec<String>,
        found: Vec<String>,
    },

    #[error("Asset {} is not inside assets directory {}", .asset.display(), .assets_dir.display())]
    InvalidAssetPath { asset: PathBuf, assets_dir: PathBuf },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Not implemented")]
    NotImplemented,
}

fn material_suffix(material: &Option<String>) -> String {
    match material {
        Some(name) => format!(" for material '{}'", name),
        None => String::new(),
    }
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::MissingField { .. } | CompileError::DescriptorParse { .. } => ErrorKind::MissingField,
            CompileError::SourceNotFound { .. } => ErrorKind::SourceNotFound,
            CompileError::ImportFailed { .. } | CompileError::InvalidScene(_) => ErrorKind::ImportFailed,
            CompileError::MaterialMismatch { .. } => ErrorKind::MaterialMismatch,
            CompileError::DescriptorRead { .. }
            | CompileError::InvalidAssetPath { .. }
            | CompileError::Write { .. } => ErrorKind::IoError,
            CompileError::NotImplemented => ErrorKind::NotImplemented,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        CompileError::Write {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
