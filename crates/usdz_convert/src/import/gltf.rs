//! glTF 2.0 importer (.gltf and .glb).

use std::collections::HashSet;
use std::path::Path;

use glam::{Quat, Vec2, Vec3};
use image::{DynamicImage, ImageBuffer, Luma, LumaA, Rgb, Rgba};
use usdz_core::{path, prim_types, Mesh, Prim, Stage, XformOp};

use crate::error::{ConvertError, ConvertResult};
use crate::import::{asset_name, ImportContext, Importer};
use crate::material::{ChannelRole, Channels, Input, TextureMap, DEFAULT_TEX_COORD_SET};
use crate::shading;

const TEXTURES_DIR: &str = "textures";

/// Loads glTF and GLB files with the `gltf` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct GltfImporter;

impl Importer for GltfImporter {
    fn import(&self, context: &ImportContext) -> ConvertResult<Stage> {
        log::info!("Loading glTF: {}", context.source.display());

        let (document, buffers, images) = ::gltf::import(&context.source)?;
        let asset = asset_name(&context.source);
        let root = path::join(path::ROOT, &asset);

        let mut stage = Stage::new();
        stage.define_prim(&root, prim_types::XFORM)?;
        stage.set_default_prim(asset.clone());
        stage.metadata.up_axis = Some("Y".to_string());
        stage.metadata.meters_per_unit = Some(1.0);

        let image_files = image_files(&document, &images, &asset, context)?;
        let material_paths = import_materials(&mut stage, &document, &image_files, &root)?;

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| ConvertError::conversion("glTF file has no scenes"))?;

        let mut builder = SceneBuilder {
            stage: &mut stage,
            buffers: &buffers,
            material_paths: &material_paths,
            mesh_count: 0,
        };
        let mut names = HashSet::new();
        for node in scene.nodes() {
            builder.add_node(&node, &root, &mut names)?;
        }
        let mesh_count = builder.mesh_count;

        log::info!(
            "Loaded {} meshes, {} materials from scene {}",
            mesh_count,
            material_paths.len(),
            scene.index()
        );
        Ok(stage)
    }
}

/// Asset path authored for each glTF image, by image index.
///
/// External images are referenced as written; embedded images are decoded
/// and written as PNG under `textures/` in the working folder.
fn image_files(
    document: &::gltf::Document,
    images: &[::gltf::image::Data],
    asset: &str,
    context: &ImportContext,
) -> ConvertResult<Vec<Option<String>>> {
    let mut files = Vec::with_capacity(images.len());
    for image in document.images() {
        let file = match image.source() {
            ::gltf::image::Source::Uri { uri, .. } if !uri.starts_with("data:") => Some(uri.to_string()),
            _ => match images.get(image.index()) {
                Some(data) => {
                    let relative = format!("{}/{}_image_{}.png", TEXTURES_DIR, asset, image.index());
                    if write_png(data, &context.working_dir.join(&relative))? {
                        Some(relative)
                    } else {
                        None
                    }
                }
                None => None,
            },
        };
        files.push(file);
    }
    Ok(files)
}

/// Returns false when the pixel format has no PNG mapping.
fn write_png(data: &::gltf::image::Data, target: &Path) -> ConvertResult<bool> {
    use ::gltf::image::Format;

    let pixels = data.pixels.clone();
    let (width, height) = (data.width, data.height);
    let invalid = || ConvertError::conversion("embedded image has inconsistent dimensions");

    let image = match data.format {
        Format::R8 => {
            DynamicImage::ImageLuma8(ImageBuffer::<Luma<u8>, _>::from_raw(width, height, pixels).ok_or_else(invalid)?)
        }
        Format::R8G8 => {
            DynamicImage::ImageLumaA8(ImageBuffer::<LumaA<u8>, _>::from_raw(width, height, pixels).ok_or_else(invalid)?)
        }
        Format::R8G8B8 => {
            DynamicImage::ImageRgb8(ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, pixels).ok_or_else(invalid)?)
        }
        Format::R8G8B8A8 => {
            DynamicImage::ImageRgba8(ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, pixels).ok_or_else(invalid)?)
        }
        other => {
            log::warn!("Skipping embedded image with unsupported format {:?}", other);
            return Ok(false);
        }
    };

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    image.save_with_format(target, image::ImageFormat::Png)?;
    log::debug!("Wrote embedded image {}", target.display());
    Ok(true)
}

fn import_materials(
    stage: &mut Stage,
    document: &::gltf::Document,
    image_files: &[Option<String>],
    root: &str,
) -> ConvertResult<Vec<String>> {
    let materials_root = path::join(root, "Materials");
    let mut names = HashSet::new();
    let mut paths = Vec::new();

    for material in document.materials() {
        let raw = material
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("material_{}", paths.len()));
        let name = unique(path::make_valid_identifier(&raw), &mut names);
        let material_path = path::join(&materials_root, &name);

        shading::define_material(stage, &material_path)?;
        for (role, input) in material_inputs(&material, image_files) {
            shading::apply_input(stage, &material_path, role, &input)?;
        }
        paths.push(material_path);
    }
    Ok(paths)
}

fn texture_input(texture: ::gltf::Texture<'_>, image_files: &[Option<String>], channels: Channels) -> Option<Input> {
    let file = image_files.get(texture.source().index())?.clone()?;
    Some(Input::Texture(TextureMap {
        file,
        channels,
        fallback: None,
        tex_coord_set: DEFAULT_TEX_COORD_SET.to_string(),
    }))
}

/// UsdPreviewSurface inputs for a glTF PBR material.
fn material_inputs(material: &::gltf::Material<'_>, image_files: &[Option<String>]) -> Vec<(ChannelRole, Input)> {
    let mut inputs = Vec::new();
    let pbr = material.pbr_metallic_roughness();
    let blended = material.alpha_mode() != ::gltf::material::AlphaMode::Opaque;
    let [r, g, b, a] = pbr.base_color_factor();

    let base_texture = pbr.base_color_texture().map(|info| info.texture());
    match base_texture.clone().and_then(|t| texture_input(t, image_files, Channels::Rgb)) {
        Some(input) => inputs.push((ChannelRole::DiffuseColor, input)),
        None => inputs.push((ChannelRole::DiffuseColor, Input::Constant(vec![r, g, b]))),
    }
    if blended {
        match base_texture.and_then(|t| texture_input(t, image_files, Channels::A)) {
            Some(input) => inputs.push((ChannelRole::Opacity, input)),
            None => inputs.push((ChannelRole::Opacity, Input::Constant(vec![a]))),
        }
    }

    match pbr.metallic_roughness_texture().map(|info| info.texture()) {
        Some(texture) => {
            if let Some(input) = texture_input(texture.clone(), image_files, Channels::B) {
                inputs.push((ChannelRole::Metallic, input));
            }
            if let Some(input) = texture_input(texture, image_files, Channels::G) {
                inputs.push((ChannelRole::Roughness, input));
            }
        }
        None => {
            inputs.push((ChannelRole::Metallic, Input::Constant(vec![pbr.metallic_factor()])));
            inputs.push((ChannelRole::Roughness, Input::Constant(vec![pbr.roughness_factor()])));
        }
    }

    if let Some(normal) = material.normal_texture() {
        if let Some(input) = texture_input(normal.texture(), image_files, Channels::Rgb) {
            inputs.push((ChannelRole::Normal, input));
        }
    }
    if let Some(occlusion) = material.occlusion_texture() {
        if let Some(input) = texture_input(occlusion.texture(), image_files, Channels::R) {
            inputs.push((ChannelRole::Occlusion, input));
        }
    }

    match material.emissive_texture().map(|info| info.texture()) {
        Some(texture) => {
            if let Some(input) = texture_input(texture, image_files, Channels::Rgb) {
                inputs.push((ChannelRole::EmissiveColor, input));
            }
        }
        None => {
            let emissive = material.emissive_factor();
            if emissive.iter().any(|c| *c > 0.0) {
                inputs.push((ChannelRole::EmissiveColor, Input::Constant(emissive.to_vec())));
            }
        }
    }

    inputs
}

fn unique(base: String, used: &mut HashSet<String>) -> String {
    let mut name = base.clone();
    let mut counter = 1;
    while !used.insert(name.clone()) {
        name = format!("{}_{}", base, counter);
        counter += 1;
    }
    name
}

struct SceneBuilder<'a> {
    stage: &'a mut Stage,
    buffers: &'a [::gltf::buffer::Data],
    material_paths: &'a [String],
    mesh_count: usize,
}

impl SceneBuilder<'_> {
    fn add_node(&mut self, node: &::gltf::Node<'_>, parent: &str, siblings: &mut HashSet<String>) -> ConvertResult<()> {
        let raw = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let name = unique(path::make_valid_identifier(&raw), siblings);
        let node_path = path::join(parent, &name);

        let xform = self.stage.define_prim(&node_path, prim_types::XFORM)?;
        let (translation, rotation, scale) = node.transform().decomposed();
        let translation = Vec3::from_array(translation);
        let rotation = Quat::from_array(rotation);
        let scale = Vec3::from_array(scale);
        if translation != Vec3::ZERO {
            xform.add_xform_op(XformOp::Translate(translation), None);
        }
        if rotation != Quat::IDENTITY {
            xform.add_xform_op(XformOp::Orient(rotation), None);
        }
        if scale != Vec3::ONE {
            xform.add_xform_op(XformOp::Scale(scale), None);
        }

        let mut children = HashSet::new();
        if let Some(mesh) = node.mesh() {
            let base = path::make_valid_identifier(mesh.name().unwrap_or("mesh"));
            for primitive in mesh.primitives() {
                if primitive.mode() != ::gltf::mesh::Mode::Triangles {
                    log::warn!("Skipping non-triangle primitive in mesh {}", base);
                    continue;
                }
                let Some(prim) = self.primitive_prim(&primitive, &unique(base.clone(), &mut children)) else {
                    continue;
                };
                let mesh_path = path::join(&node_path, &prim.name);
                *self.stage.define_prim(&mesh_path, prim_types::MESH)? = prim;
                self.mesh_count += 1;

                if let Some(material) = primitive.material().index().and_then(|i| self.material_paths.get(i)) {
                    self.stage.bind_material(&mesh_path, material)?;
                }
            }
        }

        for child in node.children() {
            self.add_node(&child, &node_path, &mut children)?;
        }
        Ok(())
    }

    fn primitive_prim(&self, primitive: &::gltf::Primitive<'_>, name: &str) -> Option<Prim> {
        let reader = primitive.reader(|buffer| self.buffers.get(buffer.index()).map(|data| &data.0[..]));

        let positions: Vec<Vec3> = reader.read_positions()?.map(Vec3::from_array).collect();
        let normals: Option<Vec<Vec3>> = reader
            .read_normals()
            .map(|iter| iter.map(Vec3::from_array).collect());
        let indices: Vec<u32> = match reader.read_indices() {
            Some(iter) => iter.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let mut mesh = Mesh::new(positions, indices, normals);
        mesh.ensure_normals();
        if let Some(uvs) = reader.read_tex_coords(0) {
            let uvs: Vec<Vec2> = uvs.into_f32().map(|[u, v]| Vec2::new(u, 1.0 - v)).collect();
            if uvs.len() == mesh.vertex_count() {
                mesh = mesh.with_uvs(uvs);
            }
        }
        Some(mesh.to_prim(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usdz_core::Value;

    // One triangle, translated, with a red half-metal material.
    const TRIANGLE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [ { "nodes": [0] } ],
  "nodes": [ { "name": "Tri", "mesh": 0, "translation": [1.0, 2.0, 3.0] } ],
  "meshes": [ { "name": "triangle", "primitives": [ { "attributes": { "POSITION": 0 }, "material": 0 } ] } ],
  "materials": [ {
    "name": "red",
    "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.0, 0.0, 1.0], "metallicFactor": 0.5, "roughnessFactor": 0.25 }
  } ],
  "accessors": [ {
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
  } ],
  "bufferViews": [ { "buffer": 0, "byteLength": 36 } ],
  "buffers": [ { "byteLength": 36, "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA" } ]
}"#;

    #[test]
    fn test_import_triangle() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tri.gltf");
        std::fs::write(&source, TRIANGLE_GLTF).unwrap();

        let context = ImportContext {
            source: source.clone(),
            output_path: dir.path().join("tri.usda"),
            working_dir: dir.path().to_path_buf(),
            copy_textures: false,
            ios12: false,
            verbose: false,
        };
        let stage = GltfImporter.import(&context).unwrap();

        assert_eq!(stage.default_prim_path().as_deref(), Some("/tri"));
        let node = stage.prim("/tri/Tri").unwrap();
        assert_eq!(
            node.attribute("xformOp:translate").unwrap().value,
            Some(Value::Float3(Vec3::new(1.0, 2.0, 3.0)))
        );

        let meshes = stage.geometry_paths();
        assert_eq!(meshes, vec!["/tri/Tri/triangle"]);
        assert_eq!(stage.bound_material(&meshes[0]).as_deref(), Some("/tri/Materials/red"));

        let shader = stage.prim("/tri/Materials/red/surfaceShader").unwrap();
        assert_eq!(shader.attribute("inputs:metallic").unwrap().value, Some(Value::Float(0.5)));
        assert_eq!(shader.attribute("inputs:roughness").unwrap().value, Some(Value::Float(0.25)));
        assert_eq!(
            shader.attribute("inputs:diffuseColor").unwrap().value,
            Some(Value::Float3(Vec3::new(1.0, 0.0, 0.0)))
        );
        assert!(shader.attribute("inputs:opacity").is_none());
    }

    #[test]
    fn test_write_png_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let data = ::gltf::image::Data {
            pixels: vec![255, 0, 0, 0, 255, 0],
            format: ::gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        let target = dir.path().join("textures/out.png");
        assert!(write_png(&data, &target).unwrap());
        assert!(target.is_file());
    }
}
