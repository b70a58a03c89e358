//! USD prim, property and value types.
//!
//! These types are the in-memory form of a USDA layer. Anything the reader
//! does not model (prim metadata, variant sets, time samples) is kept as
//! verbatim text so that a layer can be re-exported without losing data.

use std::fmt;

use glam::{Quat, Vec2, Vec3, Vec4};

/// Well-known prim type names.
pub mod prim_types {
    pub const MESH: &str = "Mesh";
    pub const GEOM_SUBSET: &str = "GeomSubset";
    pub const MATERIAL: &str = "Material";
    pub const SHADER: &str = "Shader";
    pub const XFORM: &str = "Xform";
    pub const SCOPE: &str = "Scope";
}

/// Relationship used for direct material bindings.
pub const MATERIAL_BINDING: &str = "material:binding";

/// An attribute value.
///
/// Tuple values keep the component order of the text format, so a `quatf`
/// stored as [`Value::Float4`] is `(real, i, j, k)`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Double(f64),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
    Token(String),
    String(String),
    /// Asset path, written as `@path@`
    Asset(String),
    IntArray(Vec<i32>),
    Float2Array(Vec<Vec2>),
    Float3Array(Vec<Vec3>),
    TokenArray(Vec<String>),
    /// Unmodelled value text, written back verbatim
    Raw(String),
}

impl Value {
    /// Parse a value from its USDA text given the attribute's type name.
    ///
    /// Falls back to [`Value::Raw`] whenever the text does not match the
    /// modelled shape, so parsing never fails.
    pub fn parse(type_name: &str, text: &str) -> Value {
        let text = text.trim();
        Self::parse_typed(type_name, text).unwrap_or_else(|| Value::Raw(text.to_string()))
    }

    fn parse_typed(type_name: &str, text: &str) -> Option<Value> {
        match type_name {
            "bool" => match text {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            "int" => text.parse().ok().map(Value::Int),
            "float" | "half" => text.parse().ok().map(Value::Float),
            "double" => text.parse().ok().map(Value::Double),
            "float2" | "texCoord2f" | "half2" => {
                let v = parse_tuple(text)?;
                (v.len() == 2).then(|| Value::Float2(Vec2::new(v[0], v[1])))
            }
            "float3" | "color3f" | "normal3f" | "point3f" | "vector3f" | "half3" => {
                let v = parse_tuple(text)?;
                (v.len() == 3).then(|| Value::Float3(Vec3::new(v[0], v[1], v[2])))
            }
            "float4" | "color4f" | "quatf" | "half4" => {
                let v = parse_tuple(text)?;
                (v.len() == 4).then(|| Value::Float4(Vec4::new(v[0], v[1], v[2], v[3])))
            }
            "token" => parse_quoted(text).map(Value::Token),
            "string" => parse_quoted(text).map(Value::String),
            "asset" => parse_asset(text).map(Value::Asset),
            "int[]" => {
                let inner = strip_brackets(text)?;
                let mut result = Vec::new();
                for part in inner.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    result.push(part.parse().ok()?);
                }
                Some(Value::IntArray(result))
            }
            "float2[]" | "texCoord2f[]" => {
                let tuples = parse_tuple_array(text)?;
                let mut result = Vec::with_capacity(tuples.len());
                for t in tuples {
                    if t.len() != 2 {
                        return None;
                    }
                    result.push(Vec2::new(t[0], t[1]));
                }
                Some(Value::Float2Array(result))
            }
            "float3[]" | "point3f[]" | "normal3f[]" | "color3f[]" | "vector3f[]" => {
                let tuples = parse_tuple_array(text)?;
                let mut result = Vec::with_capacity(tuples.len());
                for t in tuples {
                    if t.len() != 3 {
                        return None;
                    }
                    result.push(Vec3::new(t[0], t[1], t[2]));
                }
                Some(Value::Float3Array(result))
            }
            "token[]" => {
                let inner = strip_brackets(text)?;
                let mut result = Vec::new();
                for part in inner.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    result.push(parse_quoted(part)?);
                }
                Some(Value::TokenArray(result))
            }
            _ => None,
        }
    }

    /// The value as a token or string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Token(s) | Value::String(s) | Value::Asset(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Float2(v) => write!(f, "({}, {})", v.x, v.y),
            Value::Float3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Value::Float4(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
            Value::Token(s) | Value::String(s) => write!(f, "\"{}\"", escape(s)),
            Value::Asset(s) => write!(f, "@{}@", s),
            Value::IntArray(values) => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Float2Array(values) => {
                let items: Vec<String> = values.iter().map(|v| format!("({}, {})", v.x, v.y)).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Float3Array(values) => {
                let items: Vec<String> = values
                    .iter()
                    .map(|v| format!("({}, {}, {})", v.x, v.y, v.z))
                    .collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::TokenArray(values) => {
                let items: Vec<String> = values.iter().map(|v| format!("\"{}\"", escape(v))).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Raw(text) => write!(f, "{}", text),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn parse_quoted(text: &str) -> Option<String> {
    let text = text.trim();
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            result.push(chars.next()?);
        } else if c == '"' {
            return None;
        } else {
            result.push(c);
        }
    }
    Some(result)
}

fn parse_asset(text: &str) -> Option<String> {
    let inner = text.trim().strip_prefix('@')?.strip_suffix('@')?;
    if inner.contains('@') {
        return None;
    }
    Some(inner.to_string())
}

fn strip_brackets(text: &str) -> Option<&str> {
    text.trim().strip_prefix('[')?.strip_suffix(']')
}

fn parse_tuple(text: &str) -> Option<Vec<f32>> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
    inner.split(',').map(|s| s.trim().parse::<f32>().ok()).collect()
}

/// Parse `[(1, 2, 3), (4, 5, 6)]` into tuples.
fn parse_tuple_array(text: &str) -> Option<Vec<Vec<f32>>> {
    let inner = strip_brackets(text)?;
    let mut result = Vec::new();
    let mut rest = inner.trim();
    while !rest.is_empty() {
        let start = rest.find('(')?;
        let end = rest.find(')')?;
        if end < start {
            return None;
        }
        result.push(parse_tuple(&rest[start..=end])?);
        rest = rest[end + 1..].trim_start().trim_start_matches(',').trim_start();
    }
    Some(result)
}

/// How a prim is introduced in a layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Specifier {
    #[default]
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn keyword(&self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "def" => Some(Specifier::Def),
            "over" => Some(Specifier::Over),
            "class" => Some(Specifier::Class),
            _ => None,
        }
    }
}

/// A typed attribute with an optional value and an optional connection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attribute {
    /// Namespaced name (e.g. `inputs:diffuseColor`)
    pub name: String,

    /// USD value type name (e.g. `color3f`, `token[]`)
    pub type_name: String,

    /// Authored default value
    pub value: Option<Value>,

    /// Connection source (`/Mat/Tex.outputs:rgb`)
    pub connection: Option<String>,

    pub uniform: bool,
    pub custom: bool,

    /// Attribute metadata block, verbatim including parentheses
    pub metadata: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            ..Default::default()
        }
    }
}

/// A relationship with its target paths.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub targets: Vec<String>,
}

/// Transform operations that importers author onto Xform prims.
#[derive(Clone, Copy, Debug)]
pub enum XformOp {
    /// Translation (xformOp:translate)
    Translate(Vec3),

    /// Rotation as a quaternion (xformOp:orient)
    Orient(Quat),

    /// Scale (xformOp:scale)
    Scale(Vec3),
}

impl XformOp {
    /// Attribute name of this op, with an optional suffix (`xformOp:scale:metersPerUnit`).
    pub fn attribute_name(&self, suffix: Option<&str>) -> String {
        let base = match self {
            XformOp::Translate(_) => "xformOp:translate",
            XformOp::Orient(_) => "xformOp:orient",
            XformOp::Scale(_) => "xformOp:scale",
        };
        match suffix {
            Some(suffix) => format!("{}:{}", base, suffix),
            None => base.to_string(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            XformOp::Translate(_) | XformOp::Scale(_) => "float3",
            XformOp::Orient(_) => "quatf",
        }
    }

    fn value(&self) -> Value {
        match self {
            XformOp::Translate(v) | XformOp::Scale(v) => Value::Float3(*v),
            XformOp::Orient(q) => Value::Float4(Vec4::new(q.w, q.x, q.y, q.z)),
        }
    }
}

/// A prim with its properties and children.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Prim {
    pub specifier: Specifier,

    /// Schema type name (`Mesh`, `Material`, ...), empty for typeless prims
    pub type_name: String,

    /// Prim name (last component of its path)
    pub name: String,

    /// Prim metadata statements, verbatim
    pub metadata: Vec<String>,

    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,

    /// Statements the reader does not model (variant sets), verbatim
    pub extra: Vec<String>,

    /// Child prims in authored order
    pub children: Vec<Prim>,
}

impl Prim {
    /// Create a `def` prim of the given type.
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_mesh(&self) -> bool {
        self.type_name == prim_types::MESH
    }

    pub fn is_geom_subset(&self) -> bool {
        self.type_name == prim_types::GEOM_SUBSET
    }

    /// Meshes and geometry subsets carry material bindings.
    pub fn is_geometry(&self) -> bool {
        self.is_mesh() || self.is_geom_subset()
    }

    pub fn is_material(&self) -> bool {
        self.type_name == prim_types::MATERIAL
    }

    pub fn is_shader(&self) -> bool {
        self.type_name == prim_types::SHADER
    }

    /// The `info:id` of a shader prim.
    pub fn shader_id(&self) -> Option<&str> {
        self.attribute("info:id")?.value.as_ref()?.as_str()
    }

    pub fn child(&self, name: &str) -> Option<&Prim> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Prim> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get an attribute, creating it with `type_name` if missing.
    ///
    /// An existing attribute keeps its position; its type name is replaced.
    pub fn attribute_mut(&mut self, name: &str, type_name: &str) -> &mut Attribute {
        let idx = match self.attributes.iter().position(|a| a.name == name) {
            Some(idx) => idx,
            None => {
                self.attributes.push(Attribute::new(name, type_name));
                self.attributes.len() - 1
            }
        };
        let attribute = &mut self.attributes[idx];
        attribute.type_name = type_name.to_string();
        attribute
    }

    /// Author a default value, leaving any connection in place.
    pub fn set_attribute(&mut self, name: &str, type_name: &str, value: Value) {
        self.attribute_mut(name, type_name).value = Some(value);
    }

    /// Author a `uniform` default value.
    pub fn set_uniform(&mut self, name: &str, type_name: &str, value: Value) {
        let attribute = self.attribute_mut(name, type_name);
        attribute.value = Some(value);
        attribute.uniform = true;
    }

    /// Connect an attribute to a source property path.
    pub fn connect(&mut self, name: &str, type_name: &str, source: impl Into<String>) {
        self.attribute_mut(name, type_name).connection = Some(source.into());
    }

    /// Declare an attribute without a value (used for outputs).
    pub fn declare(&mut self, name: &str, type_name: &str) {
        self.attribute_mut(name, type_name);
    }

    /// Remove a connection from an attribute, if any.
    pub fn disconnect(&mut self, name: &str) {
        if let Some(attribute) = self.attributes.iter_mut().find(|a| a.name == name) {
            attribute.connection = None;
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|a| a.name != name);
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn set_relationship(&mut self, name: &str, targets: Vec<String>) {
        match self.relationships.iter_mut().find(|r| r.name == name) {
            Some(rel) => rel.targets = targets,
            None => self.relationships.push(Relationship {
                name: name.to_string(),
                targets,
            }),
        }
    }

    /// Path of the directly bound material, if any.
    pub fn material_binding(&self) -> Option<&str> {
        self.relationship(MATERIAL_BINDING)?
            .targets
            .first()
            .map(String::as_str)
    }

    /// Record an applied API schema in the prim metadata.
    pub fn add_api_schema(&mut self, schema: &str) {
        if self.metadata.iter().any(|m| m.contains("apiSchemas") && m.contains(schema)) {
            return;
        }
        let quoted = format!("\"{}\"", schema);
        for line in self.metadata.iter_mut() {
            if line.contains("apiSchemas") {
                if let Some(end) = line.rfind(']') {
                    let separator = if line[..end].trim_end().ends_with('[') { "" } else { ", " };
                    line.insert_str(end, &format!("{}{}", separator, quoted));
                    return;
                }
            }
        }
        self.metadata.push(format!("prepend apiSchemas = [{}]", quoted));
    }

    /// Append a transform op and register it in `xformOpOrder`.
    pub fn add_xform_op(&mut self, op: XformOp, suffix: Option<&str>) {
        let name = op.attribute_name(suffix);
        self.set_attribute(&name, op.type_name(), op.value());

        let order = self.attribute_mut("xformOpOrder", "token[]");
        order.uniform = true;
        let mut ops = match order.value.take() {
            Some(Value::TokenArray(ops)) => ops,
            _ => Vec::new(),
        };
        if !ops.contains(&name) {
            ops.push(name);
        }
        order.value = Some(Value::TokenArray(ops));
    }
}
