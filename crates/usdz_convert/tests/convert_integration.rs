use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use glam::Vec3;
use usdz_convert::{ConvertError, Converter};
use usdz_core::{load_usda_from_string, Stage, Value};
use zip::{CompressionMethod, ZipArchive};

const CUBE_OBJ: &str = "v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
v 0 0 1
v 1 0 1
f 1 2 3 4
f 1 2 6 5
";

const VASE_OBJ: &str = "mtllib vase.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
o body
usemtl body
f 1/1 2/2 3/3
o rim
usemtl body
f 1/1 3/3 4/4
";

const VASE_MTL: &str = "newmtl body
Kd 0.8 0.8 0.8
";

fn run(args: &[&str]) -> Result<i32, ConvertError> {
    Converter::default().run(args)
}

fn archive_names(package: &Path) -> Vec<String> {
    let archive = ZipArchive::new(File::open(package).unwrap()).unwrap();
    archive.file_names().map(String::from).collect()
}

fn root_layer(package: &Path) -> Stage {
    let mut archive = ZipArchive::new(File::open(package).unwrap()).unwrap();
    let mut entry = archive.by_index(0).unwrap();
    assert_eq!(entry.compression(), CompressionMethod::Stored);
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    load_usda_from_string(&text).unwrap()
}

#[test]
fn test_constant_color_on_plain_obj() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("cube.obj");
    fs::write(&source, CUBE_OBJ).unwrap();

    let status = run(&[source.to_str().unwrap(), "-diffuseColor", "1,0,0"]).unwrap();
    assert_eq!(status, 0);

    let package = dir.path().join("cube.usdz");
    assert_eq!(archive_names(&package), vec!["cube.usda"]);

    let stage = root_layer(&package);
    assert_eq!(
        stage.metadata.custom_layer_data.get("creator"),
        Some(&Value::String("usdzconvert preview 0.62".into()))
    );

    let materials = stage.material_paths();
    assert_eq!(materials, vec!["/cube/Materials/defaultMaterial"]);
    for mesh in stage.geometry_paths() {
        assert_eq!(stage.bound_material(&mesh).as_deref(), Some(materials[0].as_str()));
    }

    let shader = stage.prim("/cube/Materials/defaultMaterial/surfaceShader").unwrap();
    assert_eq!(
        shader.attribute("inputs:diffuseColor").unwrap().value,
        Some(Value::Float3(Vec3::new(1.0, 0.0, 0.0)))
    );
    assert!(stage.texture_asset_paths().is_empty());
}

#[test]
fn test_named_material_with_shared_texture() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("vase.obj"), VASE_OBJ).unwrap();
    fs::write(dir.path().join("vase.mtl"), VASE_MTL).unwrap();
    fs::write(dir.path().join("body.png"), b"body").unwrap();
    fs::write(dir.path().join("mr.png"), b"metallic-roughness").unwrap();

    let source = dir.path().join("vase.obj");
    let output = dir.path().join("out").join("vase.usdz");
    let status = run(&[
        source.to_str().unwrap(),
        output.to_str().unwrap(),
        "-m",
        "body",
        "-diffuseColor",
        "body.png",
        "-metallic",
        "r",
        "mr.png",
        "-roughness",
        "g",
        "mr.png",
    ])
    .unwrap();
    assert_eq!(status, 0);

    let mut names = archive_names(&output);
    assert_eq!(names[0], "vase.usda");
    names.sort();
    assert_eq!(names, vec!["body.png", "mr.png", "vase.usda"]);

    let stage = root_layer(&output);
    assert_eq!(stage.material_paths(), vec!["/vase/Materials/body"]);
    let geometry = stage.geometry_paths();
    assert_eq!(geometry.len(), 2);
    for mesh in &geometry {
        assert_eq!(stage.bound_material(mesh).as_deref(), Some("/vase/Materials/body"));
    }

    let metallic = stage.prim("/vase/Materials/body/metallic_texture").unwrap();
    assert_eq!(
        metallic.attribute("inputs:file").unwrap().value,
        Some(Value::Asset("mr.png".into()))
    );
    assert!(stage.prim("/vase/Materials/body/roughness_texture").is_some());
}

#[test]
fn test_named_material_binds_obj_without_mtl() {
    let dir = tempfile::tempdir().unwrap();
    let obj: Vec<&str> = VASE_OBJ
        .lines()
        .filter(|line| !line.starts_with("mtllib") && !line.starts_with("usemtl"))
        .collect();
    fs::write(dir.path().join("vase.obj"), obj.join("\n")).unwrap();
    fs::write(dir.path().join("body.png"), b"body").unwrap();
    fs::write(dir.path().join("mr.png"), b"metallic-roughness").unwrap();

    let source = dir.path().join("vase.obj");
    let status = run(&[
        source.to_str().unwrap(),
        "-m",
        "body",
        "-diffuseColor",
        "body.png",
        "-metallic",
        "r",
        "mr.png",
        "-roughness",
        "g",
        "mr.png",
    ])
    .unwrap();
    assert_eq!(status, 0);

    let package = dir.path().join("vase.usdz");
    let mut names = archive_names(&package);
    names.sort();
    assert_eq!(names, vec!["body.png", "mr.png", "vase.usda"]);

    let stage = root_layer(&package);
    assert_eq!(stage.material_paths(), vec!["/vase/Materials/body"]);
    let geometry = stage.geometry_paths();
    assert_eq!(geometry.len(), 2);
    for mesh in &geometry {
        assert_eq!(stage.bound_material(mesh).as_deref(), Some("/vase/Materials/body"));
    }
}

#[test]
fn test_parent_relative_texture_is_packaged() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    fs::create_dir(&models).unwrap();
    fs::create_dir(dir.path().join("tex")).unwrap();
    fs::write(models.join("cube.obj"), CUBE_OBJ).unwrap();
    fs::write(dir.path().join("tex").join("albedo.png"), b"albedo").unwrap();

    let source = models.join("cube.obj");
    let status = run(&[source.to_str().unwrap(), "-diffuseColor", "../tex/albedo.png"]).unwrap();
    assert_eq!(status, 0);

    let package = models.join("cube.usdz");
    assert_eq!(archive_names(&package), vec!["cube.usda", "textures/albedo.png"]);
    assert_eq!(listing(dir.path()), vec!["models", "tex"]);
    assert_eq!(listing(&dir.path().join("tex")), vec!["albedo.png"]);
}

#[test]
fn test_loose_layer_with_copied_textures() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cube.obj"), CUBE_OBJ).unwrap();
    fs::write(dir.path().join("albedo.png"), b"albedo").unwrap();

    let source = dir.path().join("cube.obj");
    let output = dir.path().join("export").join("cube.usda");
    let status = run(&[
        source.to_str().unwrap(),
        output.to_str().unwrap(),
        "-copytextures",
        "-diffuseColor",
        "albedo.png",
    ])
    .unwrap();
    assert_eq!(status, 0);

    assert!(output.is_file());
    assert_eq!(fs::read(dir.path().join("export").join("albedo.png")).unwrap(), b"albedo");
}

#[test]
fn test_file_list_front_end() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cube.obj"), CUBE_OBJ).unwrap();
    fs::write(dir.path().join("cube_albedo.png"), b"albedo").unwrap();

    let files = [
        dir.path().join("cube.obj").to_string_lossy().to_string(),
        dir.path().join("cube_albedo.png").to_string_lossy().to_string(),
    ];
    let mut options = BTreeMap::new();
    options.insert("diffuseColor".to_string(), "_albedo".to_string());

    assert_eq!(Converter::default().run_files(&files, &options).unwrap(), 0);
    let names = archive_names(&dir.path().join("cube.usdz"));
    assert_eq!(names, vec!["cube.usda", "cube_albedo.png"]);
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn test_help_returns_zero() {
    assert_eq!(run(&["-h"]).unwrap(), 0);
    assert_eq!(run(&[]).unwrap(), 0);
}

#[test]
fn test_help_leaves_filesystem_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("cube.obj");
    fs::write(&source, CUBE_OBJ).unwrap();
    let output = dir.path().join("out").join("cube.usdz");

    let before = listing(dir.path());
    let args = [source.to_str().unwrap(), output.to_str().unwrap(), "-diffuseColor", "1,0,0", "-h"];
    assert_eq!(run(&args).unwrap(), 0);
    assert_eq!(listing(dir.path()), before);
    assert!(!output.exists());
}

#[test]
fn test_invalid_material_name_is_conversion_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("cube.obj");
    fs::write(&source, CUBE_OBJ).unwrap();

    let error = run(&[source.to_str().unwrap(), "-m", "1bad name", "-metallic", "1"]).unwrap_err();
    assert!(matches!(error, ConvertError::Conversion(_)));
    assert_eq!(error.exit_status(), 2);
    assert!(!dir.path().join("cube.usdz").exists());
}

#[test]
fn test_missing_input_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("missing.obj");
    let error = run(&[source.to_str().unwrap()]).unwrap_err();
    assert_eq!(error.exit_status(), 1);
}
