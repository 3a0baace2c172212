use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use glam::{Vec2, Vec3};
use rescomp_core::{Compiler, CompilerContext, CompilerEvents, ErrorKind, RunStatus};
use rescomp_model::{
    Face, ImportedMesh, ImportedScene, MaterialSet, MaterialSpec, Model, ModelCompiler, compile_model,
};

const FIGHTER_OBJ: &str = "\
mtllib fighter.mtl
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
o Body
usemtl Hull
f 1/1/1 2/2/1 3/3/1
o Canopy
usemtl Glass
f 1/1/1 3/3/1 4/2/1
";

const FIGHTER_MTL: &str = "\
newmtl Hull
Kd 0.5 0.5 0.5
newmtl Glass
Kd 0.2 0.2 0.9
";

const FIGHTER_ASSET: &str = r#"{
    "source": "fighter.obj",
    "materials": [
        { "name": "Hull", "shader": "ship",
          "bindings": [ { "name": "diffuse", "filename": "hull_d.png" },
                        { "name": "normal", "filename": "hull_n.png" } ] },
        { "name": "Glass", "shader": "glass",
          "bindings": [ { "name": "diffuse", "filename": "glass_d.png" } ] }
    ]
}"#;

#[derive(Default)]
struct Recorder {
    failed: Mutex<Vec<String>>,
    built: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl CompilerEvents for Recorder {
    fn on_asset_compilation_failed(&self, _asset: &Path, reason: &str) {
        self.failed.lock().unwrap().push(reason.to_string());
    }

    fn on_resource_built(&self, _asset: &Path, source: &Path, target: &Path) {
        self.built.lock().unwrap().push((source.to_path_buf(), target.to_path_buf()));
    }
}

struct Workspace {
    _root: tempfile::TempDir,
    assets: PathBuf,
    data: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let assets = root.path().join("assets");
        let data = root.path().join("data");
        fs::create_dir_all(assets.join("ships")).unwrap();
        Self {
            _root: root,
            assets,
            data,
        }
    }

    fn write(&self, relative: &str, text: &str) -> PathBuf {
        let path = self.assets.join(relative);
        fs::write(&path, text).unwrap();
        path
    }

    fn ctx(&self, asset: &Path) -> CompilerContext {
        CompilerContext::new(&self.assets, &self.data, asset)
    }
}

fn spec(name: &str, shader: &str, bindings: &[(&str, &str)]) -> MaterialSpec {
    MaterialSpec {
        name: name.into(),
        shader: shader.into(),
        bindings: bindings.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
    }
}

#[test]
fn compiles_fighter_end_to_end() {
    let ws = Workspace::new();
    ws.write("ships/fighter.obj", FIGHTER_OBJ);
    ws.write("ships/fighter.mtl", FIGHTER_MTL);
    let asset = ws.write("ships/fighter.json", FIGHTER_ASSET);

    let events = Recorder::default();
    let status = ModelCompiler.run(&ws.ctx(&asset), &events);
    assert_eq!(status, RunStatus::Success, "failures: {:?}", events.failed.lock().unwrap());

    let target = ws.data.join("ships/fighter.gmdl");
    let built = events.built.lock().unwrap();
    assert_eq!(built.as_slice(), &[(ws.assets.join("ships/fighter.obj"), target.clone())]);

    let model = Model::load_from_file(&target).unwrap();
    assert_eq!(&model.header.format, b"GMDL");
    assert_eq!(model.header.version, 1);
    assert_eq!(model.header.materials, 2);
    assert_eq!(model.header.meshes, 2);

    let names: Vec<_> = model.materials.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["Hull", "Glass"]);
    assert_eq!(model.materials[0].shader, "ship");
    assert_eq!(
        model.materials[0].bindings,
        BTreeMap::from([
            ("diffuse".to_string(), "hull_d.png".to_string()),
            ("normal".to_string(), "hull_n.png".to_string()),
        ])
    );

    let mut used: Vec<_> = model
        .meshes
        .iter()
        .map(|m| model.materials[m.header.material_index as usize].name.as_str())
        .collect();
    used.sort();
    assert_eq!(used, ["Glass", "Hull"]);

    for mesh in &model.meshes {
        assert_eq!(mesh.header.vertices, 3);
        assert_eq!(mesh.header.faces, 1);
        assert_eq!(mesh.header.uv_channels, 1);
        assert_eq!(mesh.normals.len(), 3);
        assert_eq!(mesh.uv_channels[0].uvs.len(), 3);
        assert!(mesh.faces[0].iter().all(|&i| i < 3));
    }
}

#[test]
fn extra_scene_material_aborts_without_output() {
    let ws = Workspace::new();
    ws.write("ships/fighter.obj", FIGHTER_OBJ);
    ws.write("ships/fighter.mtl", &format!("{}newmtl Cockpit\nKd 0 0 0\n", FIGHTER_MTL));
    let asset = ws.write("ships/fighter.json", FIGHTER_ASSET);

    let err = ModelCompiler.compile(&ws.ctx(&asset)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MaterialMismatch);
    assert!(err.to_string().contains("Cockpit"));
    assert!(!ws.data.join("ships/fighter.gmdl").exists());

    let events = Recorder::default();
    assert_eq!(ModelCompiler.run(&ws.ctx(&asset), &events), RunStatus::Failure);
    assert_eq!(events.failed.lock().unwrap().len(), 1);
    assert!(events.built.lock().unwrap().is_empty());
}

#[test]
fn missing_source_fails_before_import() {
    let ws = Workspace::new();
    let asset = ws.write(
        "ships/ghost.json",
        r#"{ "source": "ghost.obj",
             "materials": [ { "name": "Hull", "shader": "ship", "bindings": [ { "name": "diffuse", "filename": "h.png" } ] } ] }"#,
    );

    let err = ModelCompiler.compile(&ws.ctx(&asset)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceNotFound);
    assert!(err.to_string().contains("ghost.obj"));
    assert!(!ws.data.exists());
}

#[test]
fn malformed_descriptor_fails_with_missing_field() {
    let ws = Workspace::new();
    ws.write("ships/fighter.obj", FIGHTER_OBJ);
    ws.write("ships/fighter.mtl", FIGHTER_MTL);
    let asset = ws.write(
        "ships/fighter.json",
        r#"{ "source": "fighter.obj", "materials": [ { "name": "Hull", "bindings": [] } ] }"#,
    );

    let err = ModelCompiler.compile(&ws.ctx(&asset)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingField);
    assert!(!ws.data.exists());
}

#[test]
fn unparsable_scene_is_an_import_failure() {
    let ws = Workspace::new();
    ws.write("ships/broken.obj", "v 0 0 zero\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
    let asset = ws.write(
        "ships/broken.json",
        r#"{ "source": "broken.obj",
             "materials": [ { "name": "DefaultMaterial", "shader": "s", "bindings": [ { "name": "d", "filename": "f" } ] } ] }"#,
    );

    let err = ModelCompiler.compile(&ws.ctx(&asset)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImportFailed);
}

fn round_trip(scene: &ImportedScene, materials: &MaterialSet) -> Model {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("model.gmdl");
    compile_model(scene, materials, &target).unwrap();
    Model::load_from_file(&target).unwrap()
}

#[test]
fn empty_mesh_round_trips() {
    let materials: MaterialSet = [spec("Hull", "ship", &[("diffuse", "h.png")])].into_iter().collect();
    let scene = ImportedScene::new(vec!["Hull".into()], vec![ImportedMesh::new("empty", 0, Vec::new(), Vec::new())]).unwrap();

    let model = round_trip(&scene, &materials);
    assert_eq!(model.header.meshes, 1);
    let mesh = &model.meshes[0];
    assert_eq!(mesh.header.vertices, 0);
    assert_eq!(mesh.header.faces, 0);
    assert_eq!(mesh.header.uv_channels, 0);
    assert!(mesh.vertices.is_empty() && mesh.faces.is_empty() && mesh.normals.is_empty());
}

#[test]
fn single_triangle_with_uvs_round_trips() {
    let materials: MaterialSet = [spec("Hull", "ship", &[("diffuse", "h.png"), ("normal", "n.png")])]
        .into_iter()
        .collect();
    let mesh = ImportedMesh::new(
        "tri",
        0,
        vec![Vec3::new(0.5, -1.0, 2.0), Vec3::new(1.5, 0.0, 2.0), Vec3::new(0.5, 1.0, 2.25)],
        vec![Face::triangle(0, 1, 2)],
    )
    .with_normals(vec![Vec3::new(0.0, 0.6, 0.8); 3])
    .with_uv_channel(vec![Vec2::new(0.0, 0.25), Vec2::new(1.0, 0.25), Vec2::new(0.5, 1.0)]);
    let scene = ImportedScene::new(vec!["Hull".into()], vec![mesh]).unwrap();

    let model = round_trip(&scene, &materials);
    assert_eq!(model.materials[0].bindings.len(), 2);
    assert_eq!(model.materials[0].bindings["normal"], "n.png");
    let mesh = &model.meshes[0];
    assert_eq!(mesh.vertices, vec![[0.5, -1.0, 2.0], [1.5, 0.0, 2.0], [0.5, 1.0, 2.25]]);
    assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    assert_eq!(mesh.uv_channels.len(), 1);
    assert_eq!(mesh.uv_channels[0].uvs, vec![[0.0, 0.25], [1.0, 0.25], [0.5, 1.0]]);
    assert_eq!(mesh.normals, vec![[0.0, 0.6, 0.8]; 3]);
}

#[test]
fn multi_mesh_multi_material_round_trips() {
    let materials: MaterialSet = [
        spec("Hull", "ship", &[("diffuse", "h.png")]),
        spec("Glass", "glass", &[("diffuse", "g.png")]),
        spec("Engine", "emissive", &[("diffuse", "e.png"), ("glow", "e_glow.png")]),
    ]
    .into_iter()
    .collect();

    let quad = |material: usize, z: f32| {
        ImportedMesh::new(
            format!("quad{}", material),
            material,
            vec![Vec3::new(0.0, 0.0, z), Vec3::new(1.0, 0.0, z), Vec3::new(1.0, 1.0, z), Vec3::new(0.0, 1.0, z)],
            vec![Face::triangle(0, 1, 2), Face::triangle(0, 2, 3)],
        )
        .with_normals(vec![Vec3::Z; 4])
    };
    let scene = ImportedScene::new(
        vec!["Engine".into(), "Hull".into(), "Glass".into()],
        vec![
            quad(1, 0.0),
            quad(2, 1.0).with_uv_channel(vec![Vec2::ZERO; 4]).with_uv_channel(vec![Vec2::ONE; 4]),
            quad(0, 2.0),
        ],
    )
    .unwrap();

    let model = round_trip(&scene, &materials);
    assert_eq!(model.header.materials as usize, model.materials.len());
    assert_eq!(model.header.meshes as usize, model.meshes.len());
    assert_eq!(
        model.materials.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
        ["Engine", "Hull", "Glass"]
    );
    assert_eq!(model.materials[0].bindings["glow"], "e_glow.png");

    let indices: Vec<u32> = model.meshes.iter().map(|m| m.header.material_index).collect();
    assert_eq!(indices, [1, 2, 0]);
    assert_eq!(model.meshes[1].header.uv_channels, 2);
    assert_eq!(model.meshes[1].uv_channels[1].uvs, vec![[1.0, 1.0]; 4]);
    assert_eq!(model.meshes[2].vertices[0], [0.0, 0.0, 2.0]);
    for mesh in &model.meshes {
        assert_eq!(mesh.header.vertices as usize, mesh.vertices.len());
        assert_eq!(mesh.header.faces as usize, mesh.faces.len());
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }
}

#[test]
fn recompiling_overwrites_previous_output() {
    let ws = Workspace::new();
    ws.write("ships/fighter.obj", FIGHTER_OBJ);
    ws.write("ships/fighter.mtl", FIGHTER_MTL);
    let asset = ws.write("ships/fighter.json", FIGHTER_ASSET);
    let target = ws.data.join("ships/fighter.gmdl");

    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, b"stale").unwrap();

    ModelCompiler.compile(&ws.ctx(&asset)).unwrap();
    assert!(Model::load_from_file(&target).is_ok());
    assert_eq!(fs::read_dir(ws.data.join("ships")).unwrap().count(), 1);
}
