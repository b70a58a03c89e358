//! USDA (ASCII) writer.

use std::fmt::Write as _;

use super::types::{Attribute, Prim, Relationship, Value};
use crate::stage::Stage;

const INDENT: &str = "    ";

/// Serialize a stage as USDA text.
pub fn write_usda(stage: &Stage) -> String {
    let mut out = String::from("#usda 1.0\n");

    let header = header_statements(stage);
    if !header.is_empty() {
        out.push_str("(\n");
        for statement in header {
            push_statement(&mut out, &statement, 1);
        }
        out.push_str(")\n");
    }

    for prim in stage.root_prims() {
        out.push('\n');
        write_prim(&mut out, prim, 0);
    }

    out
}

fn header_statements(stage: &Stage) -> Vec<String> {
    let meta = &stage.metadata;
    let mut statements = Vec::new();

    let entries: Vec<String> = meta
        .custom_layer_data
        .iter()
        .filter_map(|(key, value)| {
            let type_name = dictionary_type(value)?;
            Some(format!("{}{} {} = {}", INDENT, type_name, key, value))
        })
        .collect();
    if !entries.is_empty() {
        statements.push(format!("customLayerData = {{\n{}\n}}", entries.join("\n")));
    }

    if let Some(default_prim) = &meta.default_prim {
        statements.push(format!("defaultPrim = \"{}\"", default_prim));
    }
    if let Some(mpu) = meta.meters_per_unit {
        statements.push(format!("metersPerUnit = {}", mpu));
    }
    if let Some(up_axis) = &meta.up_axis {
        statements.push(format!("upAxis = \"{}\"", up_axis));
    }
    statements.extend(meta.extra.iter().cloned());
    statements
}

fn dictionary_type(value: &Value) -> Option<&'static str> {
    match value {
        Value::Bool(_) => Some("bool"),
        Value::Int(_) => Some("int"),
        Value::Float(_) => Some("float"),
        Value::Double(_) => Some("double"),
        Value::Token(_) => Some("token"),
        Value::String(_) => Some("string"),
        Value::Asset(_) => Some("asset"),
        _ => None,
    }
}

/// Write a possibly multi-line statement at `depth`.
///
/// Continuation lines keep their indentation relative to the least indented
/// one, which is usually the closing bracket.
fn push_statement(out: &mut String, statement: &str, depth: usize) {
    let indent = INDENT.repeat(depth);
    let mut lines = statement.lines();
    if let Some(first) = lines.next() {
        let _ = writeln!(out, "{}{}", indent, first.trim());
    }
    let rest: Vec<&str> = lines.collect();
    // Keep the relative indentation of nested lines.
    let common = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    for line in rest {
        let stripped = line.get(common..).unwrap_or_else(|| line.trim_start());
        let _ = writeln!(out, "{}{}", indent, stripped.trim_end());
    }
}

fn write_prim(out: &mut String, prim: &Prim, depth: usize) {
    let indent = INDENT.repeat(depth);

    let _ = write!(out, "{}{} ", indent, prim.specifier.keyword());
    if !prim.type_name.is_empty() {
        let _ = write!(out, "{} ", prim.type_name);
    }
    let _ = write!(out, "\"{}\"", prim.name);

    if prim.metadata.is_empty() {
        out.push('\n');
    } else {
        out.push_str(" (\n");
        for statement in &prim.metadata {
            push_statement(out, statement, depth + 1);
        }
        let _ = writeln!(out, "{})", indent);
    }
    let _ = writeln!(out, "{}{{", indent);

    for attribute in &prim.attributes {
        for line in attribute_lines(attribute) {
            push_statement(out, &line, depth + 1);
        }
    }
    for relationship in &prim.relationships {
        push_statement(out, &relationship_line(relationship), depth + 1);
    }
    for statement in &prim.extra {
        push_statement(out, statement, depth + 1);
    }

    for (i, child) in prim.children.iter().enumerate() {
        let has_properties = !prim.attributes.is_empty() || !prim.relationships.is_empty() || !prim.extra.is_empty();
        if i > 0 || has_properties {
            out.push('\n');
        }
        write_prim(out, child, depth + 1);
    }

    let _ = writeln!(out, "{}}}", indent);
}

fn attribute_lines(attribute: &Attribute) -> Vec<String> {
    let mut qualifiers = String::new();
    if attribute.custom {
        qualifiers.push_str("custom ");
    }
    if attribute.uniform {
        qualifiers.push_str("uniform ");
    }

    let mut lines = Vec::new();
    if attribute.value.is_some() || attribute.connection.is_none() {
        let mut line = format!("{}{} {}", qualifiers, attribute.type_name, attribute.name);
        if let Some(value) = &attribute.value {
            let _ = write!(line, " = {}", value);
        }
        if let Some(metadata) = &attribute.metadata {
            let _ = write!(line, " {}", metadata);
        }
        lines.push(line);
    }
    if let Some(target) = &attribute.connection {
        lines.push(format!(
            "{}{} {}.connect = <{}>",
            qualifiers, attribute.type_name, attribute.name, target
        ));
    }
    lines
}

fn relationship_line(relationship: &Relationship) -> String {
    match relationship.targets.as_slice() {
        [] => format!("rel {}", relationship.name),
        [target] => format!("rel {} = <{}>", relationship.name, target),
        targets => {
            let items: Vec<String> = targets.iter().map(|t| format!("<{}>", t)).collect();
            format!("rel {} = [{}]", relationship.name, items.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usd::parser::parse_usda;
    use crate::usd::types::prim_types;
    use glam::Vec3;

    #[test]
    fn test_write_header_and_prims() {
        let mut stage = Stage::new();
        stage.set_default_prim("Asset");
        stage.metadata.meters_per_unit = Some(0.01);
        stage
            .metadata
            .custom_layer_data
            .insert("creator".into(), Value::String("usdzconvert preview 0.62".into()));

        let mesh = stage.define_prim("/Asset/Body", prim_types::MESH).unwrap();
        mesh.set_attribute("doubleSided", "bool", Value::Bool(false));
        stage.define_prim("/Asset", prim_types::XFORM).unwrap();
        stage.bind_material("/Asset/Body", "/Asset/Materials/body").unwrap();

        let text = stage.to_usda_string();
        assert!(text.starts_with("#usda 1.0\n(\n"));
        assert!(text.contains("    customLayerData = {\n        string creator = \"usdzconvert preview 0.62\"\n    }\n"));
        assert!(text.contains("    defaultPrim = \"Asset\"\n"));
        assert!(text.contains("def Xform \"Asset\"\n{\n"));
        assert!(text.contains("    def Mesh \"Body\" (\n        prepend apiSchemas = [\"MaterialBindingAPI\"]\n    )\n"));
        assert!(text.contains("        bool doubleSided = 0\n"));
        assert!(text.contains("        rel material:binding = </Asset/Materials/body>\n"));
    }

    #[test]
    fn test_written_layer_reads_back() {
        let mut stage = Stage::new();
        stage.set_default_prim("Asset");
        stage.define_prim("/Asset", prim_types::XFORM).unwrap();
        let shader = stage
            .define_prim("/Asset/Materials/body/surfaceShader", prim_types::SHADER)
            .unwrap();
        shader.set_uniform("info:id", "token", Value::Token("UsdPreviewSurface".into()));
        shader.set_attribute("inputs:diffuseColor", "color3f", Value::Float3(Vec3::new(1.0, 0.0, 0.0)));
        shader.connect("inputs:diffuseColor", "color3f", "/Asset/Materials/body/diffuseColor_texture.outputs:rgb");
        shader.declare("outputs:surface", "token");

        let reread = parse_usda(&stage.to_usda_string()).unwrap();
        assert_eq!(reread, stage);
    }
}
