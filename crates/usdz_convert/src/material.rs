//! Material model: channel roles and per-material inputs.
//!
//! A [`MaterialSpec`] records what the directives asked for, independent of
//! any stage. The role table here is the only place that knows component
//! counts, default channels, ranges and USD types; the directive parser and
//! the shading author both read it.

use std::collections::BTreeMap;
use std::fmt;

use usdz_core::path;

/// Default texture coordinate set.
pub const DEFAULT_TEX_COORD_SET: &str = "st";

/// How texture samples are decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
    Raw,
}

impl ColorSpace {
    /// `inputs:sourceColorSpace` token.
    pub fn token(&self) -> &'static str {
        match self {
            ColorSpace::Srgb => "sRGB",
            ColorSpace::Raw => "raw",
        }
    }
}

/// Texture channel selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channels {
    R,
    G,
    B,
    A,
    Rgb,
}

impl Channels {
    /// Parse a selector token (`r`, `g`, `b`, `a`, `rgb`).
    pub fn from_selector(token: &str) -> Option<Self> {
        match token {
            "r" => Some(Channels::R),
            "g" => Some(Channels::G),
            "b" => Some(Channels::B),
            "a" => Some(Channels::A),
            "rgb" => Some(Channels::Rgb),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channels::R => "r",
            Channels::G => "g",
            Channels::B => "b",
            Channels::A => "a",
            Channels::Rgb => "rgb",
        }
    }

    pub fn components(&self) -> usize {
        match self {
            Channels::Rgb => 3,
            _ => 1,
        }
    }

    /// USD type of the texture output carrying these channels.
    pub fn output_type(&self) -> &'static str {
        match self {
            Channels::Rgb => "float3",
            _ => "float",
        }
    }
}

impl fmt::Display for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the role table.
#[derive(Clone, Copy, Debug)]
pub struct RoleInfo {
    pub name: &'static str,
    pub components: usize,
    pub default_channels: Channels,
    pub range: (f32, f32),
    pub usd_type: &'static str,
    pub color_space: ColorSpace,
}

/// PBR channel roles of a UsdPreviewSurface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelRole {
    DiffuseColor,
    Normal,
    EmissiveColor,
    Metallic,
    Roughness,
    Occlusion,
    Opacity,
    Clearcoat,
    ClearcoatRoughness,
}

const fn role(
    name: &'static str,
    components: usize,
    default_channels: Channels,
    range: (f32, f32),
    usd_type: &'static str,
    color_space: ColorSpace,
) -> RoleInfo {
    RoleInfo {
        name,
        components,
        default_channels,
        range,
        usd_type,
        color_space,
    }
}

// Indexed by `ChannelRole as usize`.
const ROLE_TABLE: [RoleInfo; 9] = [
    role("diffuseColor", 3, Channels::Rgb, (0.0, 1.0), "color3f", ColorSpace::Srgb),
    role("normal", 3, Channels::Rgb, (-1.0, 1.0), "normal3f", ColorSpace::Raw),
    role("emissiveColor", 3, Channels::Rgb, (0.0, 1.0), "color3f", ColorSpace::Srgb),
    role("metallic", 1, Channels::R, (0.0, 1.0), "float", ColorSpace::Raw),
    role("roughness", 1, Channels::R, (0.0, 1.0), "float", ColorSpace::Raw),
    role("occlusion", 1, Channels::R, (0.0, 1.0), "float", ColorSpace::Raw),
    role("opacity", 1, Channels::A, (0.0, 1.0), "float", ColorSpace::Raw),
    role("clearcoat", 1, Channels::R, (0.0, 1.0), "float", ColorSpace::Raw),
    role("clearcoatRoughness", 1, Channels::R, (0.0, 1.0), "float", ColorSpace::Raw),
];

impl ChannelRole {
    /// All roles in table order.
    pub const ALL: [ChannelRole; 9] = [
        ChannelRole::DiffuseColor,
        ChannelRole::Normal,
        ChannelRole::EmissiveColor,
        ChannelRole::Metallic,
        ChannelRole::Roughness,
        ChannelRole::Occlusion,
        ChannelRole::Opacity,
        ChannelRole::Clearcoat,
        ChannelRole::ClearcoatRoughness,
    ];

    pub fn info(self) -> &'static RoleInfo {
        &ROLE_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn components(self) -> usize {
        self.info().components
    }

    pub fn default_channels(self) -> Channels {
        self.info().default_channels
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.name() == name)
    }

    /// Match a directive flag such as `-diffuseColor`.
    pub fn from_flag(flag: &str) -> Option<Self> {
        flag.strip_prefix('-').and_then(Self::from_name)
    }

    /// Whether a channel selector fits this role's component count.
    pub fn accepts(self, channels: Channels) -> bool {
        channels.components() == self.components()
    }

    /// Components of `values` outside this role's valid range.
    pub fn out_of_range(self, values: &[f32]) -> Vec<f32> {
        let (min, max) = self.info().range;
        values.iter().copied().filter(|v| *v < min || *v > max).collect()
    }

    /// Shader input attribute name (`inputs:diffuseColor`).
    pub fn shader_input(self) -> String {
        format!("inputs:{}", self.name())
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A texture reference with channel selection.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureMap {
    pub file: String,
    pub channels: Channels,
    pub fallback: Option<Vec<f32>>,
    pub tex_coord_set: String,
}

/// Value of one channel role.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Constant(Vec<f32>),
    Texture(TextureMap),
}

/// Channel inputs for one material.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialSpec {
    /// Material name; empty for the anonymous spec
    pub name: String,

    /// Explicit prim path, when the directive named one
    pub path: Option<String>,

    /// Texture coordinate set for texture inputs added next
    pub tex_coord_set: String,

    pub inputs: BTreeMap<ChannelRole, Input>,
}

impl Default for MaterialSpec {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl MaterialSpec {
    /// The spec that applies to every material.
    pub fn anonymous() -> Self {
        Self {
            name: String::new(),
            path: None,
            tex_coord_set: DEFAULT_TEX_COORD_SET.to_string(),
            inputs: BTreeMap::new(),
        }
    }

    /// A named spec. A name starting with `/` is an explicit prim path and the
    /// name becomes its last segment.
    pub fn named(name: &str) -> Self {
        let mut spec = Self::anonymous();
        if name.starts_with('/') {
            spec.path = Some(name.to_string());
            spec.name = path::name(name).to_string();
        } else {
            spec.name = name.to_string();
        }
        spec
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty() && self.path.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn set_input(&mut self, role: ChannelRole, input: Input) {
        self.inputs.insert(role, input);
    }

    /// Texture inputs, for relocation.
    pub fn textures_mut(&mut self) -> impl Iterator<Item = (ChannelRole, &mut TextureMap)> {
        self.inputs.iter_mut().filter_map(|(role, input)| match input {
            Input::Texture(map) => Some((*role, map)),
            Input::Constant(_) => None,
        })
    }

    /// The lookup key used against the stage: explicit path or name.
    pub fn lookup_key(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }
}
