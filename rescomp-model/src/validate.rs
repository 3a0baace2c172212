use log::error;

use crate::descriptor::MaterialSet;
use crate::scene::ImportedScene;

/// Checks that the asset declares exactly the materials the scene uses.
///
/// Fails on a count difference or on any declared name that has no exact
/// (case-sensitive) match in the scene. Both sets are logged on failure.
pub fn validate_materials(materials: &MaterialSet, scene: &ImportedScene) -> bool {
    let mut mismatch = false;

    if materials.len() != scene.material_count() {
        error!("Different number of materials between model file and asset.");
        mismatch = true;
    }

    if let Some(name) = materials.names().find(|name| !scene.material_names().any(|found| found == *name)) {
        error!("Material '{}' is not present in the model file.", name);
        mismatch = true;
    }

    if mismatch {
        error!("Material mismatch between asset and model file.");
        error!("Asset:");
        for name in materials.names() {
            error!("- {}", name);
        }
        error!("Model file:");
        for name in scene.material_names() {
            error!("- {}", name);
        }
    }

    !mismatch
}
