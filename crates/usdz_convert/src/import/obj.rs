//! Wavefront OBJ importer.

use std::collections::HashSet;

use glam::{Vec2, Vec3};
use usdz_core::{path, prim_types, Mesh, Stage};

use crate::error::ConvertResult;
use crate::import::{asset_name, ImportContext, Importer};
use crate::material::{ChannelRole, Channels, Input, TextureMap, DEFAULT_TEX_COORD_SET};
use crate::shading;

/// Loads OBJ files (and their MTL libraries) with `tobj`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjImporter;

impl Importer for ObjImporter {
    fn import(&self, context: &ImportContext) -> ConvertResult<Stage> {
        log::info!("Loading OBJ: {}", context.source.display());

        let (models, materials) = tobj::load_obj(
            &context.source,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: true,
                ..Default::default()
            },
        )?;

        let materials = match materials {
            Ok(materials) => materials,
            Err(e) => {
                log::warn!("Failed to load materials for {}: {}", context.source.display(), e);
                Vec::new()
            }
        };

        let asset = asset_name(&context.source);
        let root = path::join(path::ROOT, &asset);
        let materials_root = path::join(&root, "Materials");

        let mut stage = Stage::new();
        stage.define_prim(&root, prim_types::XFORM)?;
        stage.set_default_prim(asset.clone());
        stage.metadata.up_axis = Some("Y".to_string());

        let mut material_paths = Vec::with_capacity(materials.len());
        let mut used_names = HashSet::new();
        for material in &materials {
            let name = unique_name(&material.name, "material", &mut used_names);
            let material_path = path::join(&materials_root, &name);
            shading::define_material(&mut stage, &material_path)?;
            for (role, input) in material_inputs(material) {
                shading::apply_input(&mut stage, &material_path, role, &input)?;
            }
            log::debug!("Material {} -> {}", material.name, material_path);
            material_paths.push(material_path);
        }

        let mut used_names = HashSet::new();
        for model in &models {
            let name = unique_name(&model.name, "mesh", &mut used_names);
            let mesh = convert_mesh(&model.mesh);
            log::debug!(
                "Mesh {}: {} vertices, {} triangles",
                name,
                mesh.vertex_count(),
                mesh.triangle_count()
            );

            let mesh_path = path::join(&root, &name);
            let prim = mesh.to_prim(&name);
            *stage.define_prim(&mesh_path, prim_types::MESH)? = prim;

            if let Some(material_path) = model.mesh.material_id.and_then(|id| material_paths.get(id)) {
                stage.bind_material(&mesh_path, material_path)?;
            }
        }

        log::info!("Loaded {} meshes, {} materials", models.len(), materials.len());
        Ok(stage)
    }
}

fn unique_name(raw: &str, fallback: &str, used: &mut HashSet<String>) -> String {
    let base = if raw.trim().is_empty() {
        fallback.to_string()
    } else {
        path::make_valid_identifier(raw.trim())
    };
    let mut name = base.clone();
    let mut counter = 1;
    while !used.insert(name.clone()) {
        name = format!("{}_{}", base, counter);
        counter += 1;
    }
    name
}

fn convert_mesh(source: &tobj::Mesh) -> Mesh {
    let positions: Vec<Vec3> = source
        .positions
        .chunks_exact(3)
        .map(Vec3::from_slice)
        .collect();

    let normals = (source.normals.len() == source.positions.len())
        .then(|| source.normals.chunks_exact(3).map(Vec3::from_slice).collect());

    let mut mesh = Mesh::new(positions, source.indices.clone(), normals);
    mesh.ensure_normals();

    if !source.texcoords.is_empty() && source.texcoords.len() / 2 == mesh.vertex_count() {
        let uvs: Vec<Vec2> = source.texcoords.chunks_exact(2).map(Vec2::from_slice).collect();
        mesh = mesh.with_uvs(uvs);
    }
    mesh
}

fn texture(file: &str, channels: Channels) -> Input {
    Input::Texture(TextureMap {
        file: file.replace('\\', "/"),
        channels,
        fallback: None,
        tex_coord_set: DEFAULT_TEX_COORD_SET.to_string(),
    })
}

/// UsdPreviewSurface inputs for an MTL material.
fn material_inputs(material: &tobj::Material) -> Vec<(ChannelRole, Input)> {
    let mut inputs = Vec::new();

    match (&material.diffuse_texture, material.diffuse) {
        (Some(file), _) if !file.is_empty() => inputs.push((ChannelRole::DiffuseColor, texture(file, Channels::Rgb))),
        (_, Some(kd)) => inputs.push((ChannelRole::DiffuseColor, Input::Constant(kd.to_vec()))),
        _ => {}
    }

    match (&material.dissolve_texture, material.dissolve) {
        (Some(file), _) if !file.is_empty() => inputs.push((ChannelRole::Opacity, texture(file, Channels::R))),
        (_, Some(d)) if d < 1.0 => inputs.push((ChannelRole::Opacity, Input::Constant(vec![d]))),
        _ => {}
    }

    let normal_map = material
        .normal_texture
        .clone()
        .or_else(|| material.unknown_param.get("norm").cloned());
    if let Some(file) = normal_map.filter(|f| !f.is_empty()) {
        inputs.push((ChannelRole::Normal, texture(&file, Channels::Rgb)));
    }

    if let Some(ke) = material.unknown_param.get("Ke") {
        let values: Vec<f32> = ke.split_whitespace().filter_map(|v| v.parse().ok()).collect();
        if values.len() == 3 && values.iter().any(|v| *v > 0.0) {
            inputs.push((ChannelRole::EmissiveColor, Input::Constant(values)));
        }
    }

    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use usdz_core::Value;

    const CUBE_OBJ: &str = "mtllib cube.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl red
f 1/1 2/2 3/3 4/4
";

    const CUBE_MTL: &str = "newmtl red
Kd 1 0 0
d 0.5
map_Bump normal.png
";

    fn context(source: &Path, work: &Path) -> ImportContext {
        ImportContext {
            source: source.to_path_buf(),
            output_path: work.join("cube.usda"),
            working_dir: work.to_path_buf(),
            copy_textures: false,
            ios12: false,
            verbose: false,
        }
    }

    #[test]
    fn test_import_with_materials() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cube.obj"), CUBE_OBJ).unwrap();
        std::fs::write(dir.path().join("cube.mtl"), CUBE_MTL).unwrap();

        let source = dir.path().join("cube.obj");
        let stage = ObjImporter.import(&context(&source, dir.path())).unwrap();

        assert_eq!(stage.default_prim_path().as_deref(), Some("/cube"));
        let meshes = stage.geometry_paths();
        assert_eq!(meshes.len(), 1);

        let mesh = stage.prim(&meshes[0]).unwrap();
        assert_eq!(
            mesh.attribute("faceVertexCounts").unwrap().value,
            Some(Value::IntArray(vec![3, 3]))
        );
        assert!(mesh.attribute("primvars:st").is_some());
        assert!(mesh.attribute("normals").is_some());

        assert_eq!(stage.bound_material(&meshes[0]).as_deref(), Some("/cube/Materials/red"));
        let shader = stage.prim("/cube/Materials/red/surfaceShader").unwrap();
        assert_eq!(
            shader.attribute("inputs:diffuseColor").unwrap().value,
            Some(Value::Float3(Vec3::new(1.0, 0.0, 0.0)))
        );
        assert_eq!(shader.attribute("inputs:opacity").unwrap().value, Some(Value::Float(0.5)));
        assert!(stage.prim("/cube/Materials/red/normal_texture").is_some());
    }

    #[test]
    fn test_missing_mtl_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cube.obj"), CUBE_OBJ).unwrap();

        let source = dir.path().join("cube.obj");
        let stage = ObjImporter.import(&context(&source, dir.path())).unwrap();
        assert_eq!(stage.geometry_paths().len(), 1);
        assert!(stage.material_paths().is_empty());
    }

    #[test]
    fn test_missing_obj_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("nope.obj");
        assert!(ObjImporter.import(&context(&source, dir.path())).is_err());
    }

    #[test]
    fn test_unique_names() {
        let mut used = HashSet::new();
        assert_eq!(unique_name("body", "mesh", &mut used), "body");
        assert_eq!(unique_name("body", "mesh", &mut used), "body_1");
        assert_eq!(unique_name("", "mesh", &mut used), "mesh");
        assert_eq!(unique_name("my part", "mesh", &mut used), "my_part");
    }
}
