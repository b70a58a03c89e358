//! UsdPreviewSurface authoring.
//!
//! Every material this crate writes has the same shape:
//!
//! ```text
//! Material
//!   outputs:surface.connect -> surfaceShader.outputs:surface
//!   surfaceShader          (UsdPreviewSurface)
//!   uvReader_<set>         (UsdPrimvarReader_float2)
//!   <role>_texture         (UsdUVTexture)
//! ```
//!
//! Both the material binder and the importers go through this module.

use glam::{Vec3, Vec4};
use usdz_core::{path, prim_types, Stage, Value};

use crate::error::{ConvertError, ConvertResult};
use crate::material::{ChannelRole, Input, MaterialSpec, TextureMap};

pub const PREVIEW_SURFACE: &str = "UsdPreviewSurface";
pub const UV_TEXTURE: &str = "UsdUVTexture";
pub const PRIMVAR_READER: &str = "UsdPrimvarReader_float2";

const SURFACE_SHADER_NAME: &str = "surfaceShader";
const SURFACE_OUTPUT: &str = "outputs:surface";

/// Define a Material prim wired to a fresh surface shader.
///
/// Returns the surface shader path.
pub fn define_material(stage: &mut Stage, material_path: &str) -> ConvertResult<String> {
    stage.define_prim(material_path, prim_types::MATERIAL)?;
    surface_shader(stage, material_path)
}

/// Path of the material's surface shader, creating one when the material's
/// surface output is not connected to an existing shader.
pub fn surface_shader(stage: &mut Stage, material_path: &str) -> ConvertResult<String> {
    let material = stage
        .prim(material_path)
        .ok_or_else(|| ConvertError::conversion(format!("material {} does not exist", material_path)))?;

    let connected = material
        .attribute(SURFACE_OUTPUT)
        .and_then(|a| a.connection.as_deref())
        .map(|target| path::split_property(target).0.to_string());

    if let Some(shader_path) = connected {
        if stage.prim(&shader_path).map_or(false, |p| p.is_shader()) {
            return Ok(shader_path);
        }
    }

    let shader_path = path::join(material_path, SURFACE_SHADER_NAME);
    let shader = stage.define_prim(&shader_path, prim_types::SHADER)?;
    shader.set_uniform("info:id", "token", Value::Token(PREVIEW_SURFACE.into()));
    shader.declare(SURFACE_OUTPUT, "token");

    if let Some(material) = stage.prim_mut(material_path) {
        material.connect(SURFACE_OUTPUT, "token", format!("{}.{}", shader_path, SURFACE_OUTPUT));
    }
    log::debug!("Created surface shader {}", shader_path);
    Ok(shader_path)
}

/// Write every input of `spec` into the material's surface shader.
pub fn apply_spec(stage: &mut Stage, material_path: &str, spec: &MaterialSpec) -> ConvertResult<()> {
    for (role, input) in &spec.inputs {
        apply_input(stage, material_path, *role, input)?;
    }
    Ok(())
}

/// Write one channel input into the material's surface shader.
pub fn apply_input(stage: &mut Stage, material_path: &str, role: ChannelRole, input: &Input) -> ConvertResult<()> {
    let shader_path = surface_shader(stage, material_path)?;
    match input {
        Input::Constant(values) => {
            let value = typed_value(role, values);
            let shader = shader_prim(stage, &shader_path)?;
            let name = role.shader_input();
            shader.set_attribute(&name, role.info().usd_type, value);
            shader.disconnect(&name);
        }
        Input::Texture(map) => {
            let output = add_texture(stage, material_path, role, map)?;
            let shader = shader_prim(stage, &shader_path)?;
            let name = role.shader_input();
            shader.connect(&name, role.info().usd_type, output);
            if let Some(fallback) = &map.fallback {
                shader.set_attribute(&name, role.info().usd_type, typed_value(role, fallback));
            }
        }
    }
    Ok(())
}

fn shader_prim<'a>(stage: &'a mut Stage, shader_path: &str) -> ConvertResult<&'a mut usdz_core::Prim> {
    stage
        .prim_mut(shader_path)
        .ok_or_else(|| ConvertError::conversion(format!("shader {} does not exist", shader_path)))
}

/// Author the reader and texture nodes for `map`.
///
/// Returns the connectable output path of the texture node.
fn add_texture(stage: &mut Stage, material_path: &str, role: ChannelRole, map: &TextureMap) -> ConvertResult<String> {
    let reader_path = path::join(
        material_path,
        &path::make_valid_identifier(&format!("uvReader_{}", map.tex_coord_set)),
    );
    if stage.prim(&reader_path).is_none() {
        let reader = stage.define_prim(&reader_path, prim_types::SHADER)?;
        reader.set_uniform("info:id", "token", Value::Token(PRIMVAR_READER.into()));
        reader.set_attribute("inputs:varname", "token", Value::Token(map.tex_coord_set.clone()));
        reader.declare("outputs:result", "float2");
    }

    let texture_path = path::join(material_path, &format!("{}_texture", role.name()));
    let texture = stage.define_prim(&texture_path, prim_types::SHADER)?;
    texture.set_uniform("info:id", "token", Value::Token(UV_TEXTURE.into()));
    texture.set_attribute("inputs:file", "asset", Value::Asset(map.file.clone()));
    texture.connect("inputs:st", "float2", format!("{}.outputs:result", reader_path));
    texture.set_attribute("inputs:wrapS", "token", Value::Token("repeat".into()));
    texture.set_attribute("inputs:wrapT", "token", Value::Token("repeat".into()));
    texture.set_attribute(
        "inputs:sourceColorSpace",
        "token",
        Value::Token(role.info().color_space.token().into()),
    );

    if role == ChannelRole::Normal {
        texture.set_attribute("inputs:scale", "float4", Value::Float4(Vec4::new(2.0, 2.0, 2.0, 1.0)));
        texture.set_attribute("inputs:bias", "float4", Value::Float4(Vec4::new(-1.0, -1.0, -1.0, 0.0)));
    }

    match &map.fallback {
        Some(fallback) => {
            texture.set_attribute("inputs:fallback", "float4", Value::Float4(fallback_color(fallback)));
        }
        None => texture.remove_attribute("inputs:fallback"),
    }

    let output = format!("outputs:{}", map.channels);
    texture.declare(&output, map.channels.output_type());
    Ok(format!("{}.{}", texture_path, output))
}

fn typed_value(role: ChannelRole, values: &[f32]) -> Value {
    let get = |i: usize| values.get(i).copied().unwrap_or(0.0);
    if role.components() == 3 {
        Value::Float3(Vec3::new(get(0), get(1), get(2)))
    } else {
        Value::Float(get(0))
    }
}

fn fallback_color(values: &[f32]) -> Vec4 {
    match values {
        [v] => Vec4::new(*v, *v, *v, 1.0),
        [r, g, b] => Vec4::new(*r, *g, *b, 1.0),
        [r, g, b, a, ..] => Vec4::new(*r, *g, *b, *a),
        _ => Vec4::new(0.0, 0.0, 0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Channels;

    fn texture(file: &str, channels: Channels, fallback: Option<Vec<f32>>) -> Input {
        Input::Texture(TextureMap {
            file: file.into(),
            channels,
            fallback,
            tex_coord_set: "st".into(),
        })
    }

    #[test]
    fn test_define_material_network() {
        let mut stage = Stage::new();
        let shader = define_material(&mut stage, "/Asset/Materials/body").unwrap();
        assert_eq!(shader, "/Asset/Materials/body/surfaceShader");

        let material = stage.prim("/Asset/Materials/body").unwrap();
        assert!(material.is_material());
        assert_eq!(
            material.attribute("outputs:surface").unwrap().connection.as_deref(),
            Some("/Asset/Materials/body/surfaceShader.outputs:surface")
        );
        assert_eq!(stage.prim(&shader).unwrap().shader_id(), Some(PREVIEW_SURFACE));

        // Idempotent.
        assert_eq!(surface_shader(&mut stage, "/Asset/Materials/body").unwrap(), shader);
    }

    #[test]
    fn test_existing_connection_is_followed() {
        let mut stage = usdz_core::load_usda_from_string(
            r#"#usda 1.0
def Material "M"
{
    token outputs:surface.connect = </M/PBR.outputs:surface>

    def Shader "PBR"
    {
        uniform token info:id = "UsdPreviewSurface"
        token outputs:surface
    }
}
"#,
        )
        .unwrap();
        assert_eq!(surface_shader(&mut stage, "/M").unwrap(), "/M/PBR");
        assert!(stage.prim("/M/surfaceShader").is_none());
    }

    #[test]
    fn test_constant_replaces_connection() {
        let mut stage = Stage::new();
        define_material(&mut stage, "/M").unwrap();
        apply_input(&mut stage, "/M", ChannelRole::DiffuseColor, &texture("a.png", Channels::Rgb, None)).unwrap();
        apply_input(&mut stage, "/M", ChannelRole::DiffuseColor, &Input::Constant(vec![1.0, 0.0, 0.0])).unwrap();

        let attribute = stage
            .prim("/M/surfaceShader")
            .unwrap()
            .attribute("inputs:diffuseColor")
            .unwrap();
        assert_eq!(attribute.type_name, "color3f");
        assert_eq!(attribute.value, Some(Value::Float3(Vec3::new(1.0, 0.0, 0.0))));
        assert_eq!(attribute.connection, None);
    }

    #[test]
    fn test_texture_network() {
        let mut stage = Stage::new();
        define_material(&mut stage, "/M").unwrap();
        apply_input(&mut stage, "/M", ChannelRole::Metallic, &texture("mr.png", Channels::R, Some(vec![0.5]))).unwrap();
        apply_input(&mut stage, "/M", ChannelRole::Roughness, &texture("mr.png", Channels::G, None)).unwrap();

        let shader = stage.prim("/M/surfaceShader").unwrap();
        let metallic = shader.attribute("inputs:metallic").unwrap();
        assert_eq!(metallic.connection.as_deref(), Some("/M/metallic_texture.outputs:r"));
        assert_eq!(metallic.value, Some(Value::Float(0.5)));
        assert_eq!(
            shader.attribute("inputs:roughness").unwrap().connection.as_deref(),
            Some("/M/roughness_texture.outputs:g")
        );

        let node = stage.prim("/M/metallic_texture").unwrap();
        assert_eq!(node.shader_id(), Some(UV_TEXTURE));
        assert_eq!(node.attribute("inputs:file").unwrap().value, Some(Value::Asset("mr.png".into())));
        assert_eq!(node.attribute("inputs:sourceColorSpace").unwrap().value, Some(Value::Token("raw".into())));
        assert_eq!(node.attribute("outputs:r").unwrap().type_name, "float");
        assert_eq!(
            node.attribute("inputs:fallback").unwrap().value,
            Some(Value::Float4(Vec4::new(0.5, 0.5, 0.5, 1.0)))
        );

        // One shared reader.
        let readers = stage.collect_paths(|p| p.shader_id() == Some(PRIMVAR_READER));
        assert_eq!(readers, vec!["/M/uvReader_st"]);
    }

    #[test]
    fn test_normal_map_scale_bias() {
        let mut stage = Stage::new();
        define_material(&mut stage, "/M").unwrap();
        apply_input(&mut stage, "/M", ChannelRole::Normal, &texture("n.png", Channels::Rgb, None)).unwrap();
        let node = stage.prim("/M/normal_texture").unwrap();
        assert!(node.attribute("inputs:scale").is_some());
        assert!(node.attribute("inputs:bias").is_some());
        assert_eq!(node.attribute("outputs:rgb").unwrap().type_name, "float3");
    }

    #[test]
    fn test_diffuse_texture_is_srgb() {
        let mut stage = Stage::new();
        define_material(&mut stage, "/M").unwrap();
        apply_input(&mut stage, "/M", ChannelRole::DiffuseColor, &texture("d.png", Channels::Rgb, None)).unwrap();
        let node = stage.prim("/M/diffuseColor_texture").unwrap();
        assert_eq!(node.attribute("inputs:sourceColorSpace").unwrap().value, Some(Value::Token("sRGB".into())));
    }
}
