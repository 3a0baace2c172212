pub mod compiler;
pub mod descriptor;
pub mod format;
pub mod import;
pub mod scene;
pub mod validate;

pub use compiler::{ModelCompiler, build_model, compile_model, target_model_path};
pub use descriptor::{AssetDescriptor, MaterialSet, MaterialSpec};
pub use format::{FormatError, Model};
pub use import::{PostProcessSteps, import_scene};
pub use scene::{Face, ImportedMesh, ImportedScene};
pub use validate::validate_materials;
