//! USDA (ASCII) file parser.
//!
//! This module provides line-by-line parsing of USDA text files into a
//! [`Stage`]. The parser understands the parts of the grammar the converter
//! edits and keeps everything else as verbatim text.
//!
//! # Supported Syntax
//!
//! - Layer header: `defaultPrim`, `metersPerUnit`, `upAxis`, `customLayerData`
//! - `def`/`over`/`class` prims, typed or typeless, with metadata blocks
//! - Attributes with qualifiers (`custom`, `uniform`), default values,
//!   `.connect` targets and trailing metadata
//! - `rel name = </Path>` and `rel name = [</A>, </B>]`
//! - Multi-line values and metadata (balanced brackets)
//!
//! Variant sets, time samples and list-edited properties are kept verbatim.

use std::collections::VecDeque;

use thiserror::Error;

use super::types::*;
use crate::stage::{LayerMetadata, Stage};

/// Errors that can occur during USDA parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid number format: {0}")]
    InvalidNumber(String),

    #[error("Unclosed block starting at line {0}")]
    UnclosedBlock(usize),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// USDA file parser.
pub struct UsdaParser {
    lines: VecDeque<(usize, String)>,
    current_line: usize,
}

impl UsdaParser {
    /// Create a new parser from file contents.
    pub fn new(content: &str) -> Self {
        let lines: VecDeque<_> = content
            .lines()
            .enumerate()
            .map(|(i, s)| (i + 1, s.to_string()))
            .collect();

        Self {
            lines,
            current_line: 0,
        }
    }

    /// Parse the USDA content into a stage.
    pub fn parse(&mut self) -> ParseResult<Stage> {
        let metadata = self.parse_header()?;

        let mut prims = Vec::new();
        while let Some((line_num, line)) = self.next_significant() {
            let trimmed = line.trim();
            if is_prim_statement(trimmed) {
                prims.push(self.parse_prim(trimmed, line_num)?);
            } else {
                return Err(ParseError::Parse {
                    line: line_num,
                    message: format!("expected a prim definition, found: {}", trimmed),
                });
            }
        }

        Ok(Stage::from_parts(metadata, prims))
    }

    /// Pop the next line that is neither blank nor a comment.
    fn next_significant(&mut self) -> Option<(usize, String)> {
        while let Some((num, line)) = self.lines.pop_front() {
            let trimmed = line.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') {
                self.current_line = num;
                return Some((num, line));
            }
        }
        None
    }

    /// Parse the `#usda 1.0` comment and the optional layer metadata block.
    fn parse_header(&mut self) -> ParseResult<LayerMetadata> {
        let mut metadata = LayerMetadata::default();

        let (line_num, line) = match self.next_significant() {
            Some(x) => x,
            None => return Ok(metadata),
        };
        let trimmed = line.trim();
        if !trimmed.starts_with('(') {
            self.lines.push_front((line_num, line));
            return Ok(metadata);
        }

        let block = self.collect_until_balanced(trimmed, line_num)?;
        let inner = strip_outer(&block, '(', ')').ok_or_else(|| ParseError::Parse {
            line: line_num,
            message: "malformed layer metadata".to_string(),
        })?;

        for statement in split_statements(inner) {
            let key = statement.split(|c: char| c.is_whitespace() || c == '=').next().unwrap_or("");
            let value = statement.split_once('=').map(|(_, v)| v.trim()).unwrap_or("");
            match key {
                "defaultPrim" => metadata.default_prim = Some(unquote(value).to_string()),
                "upAxis" => metadata.up_axis = Some(unquote(value).to_string()),
                "metersPerUnit" => {
                    let mpu = value
                        .parse::<f64>()
                        .map_err(|_| ParseError::InvalidNumber(value.to_string()))?;
                    metadata.meters_per_unit = Some(mpu);
                }
                "customLayerData" => {
                    let dict = strip_outer(value, '{', '}').unwrap_or("");
                    for entry in split_statements(dict) {
                        match parse_dictionary_entry(&entry) {
                            Some((key, value)) => {
                                metadata.custom_layer_data.insert(key, value);
                            }
                            None => log::warn!("Dropping unsupported customLayerData entry: {}", entry),
                        }
                    }
                }
                _ => metadata.extra.push(statement),
            }
        }

        Ok(metadata)
    }

    /// Accumulate lines starting with `first` until brackets balance.
    fn collect_until_balanced(&mut self, first: &str, start_line: usize) -> ParseResult<String> {
        let mut text = first.to_string();
        while balance(&text) > 0 {
            match self.lines.pop_front() {
                Some((num, line)) => {
                    self.current_line = num;
                    text.push('\n');
                    text.push_str(&line);
                }
                None => return Err(ParseError::UnclosedBlock(start_line)),
            }
        }
        Ok(text)
    }

    /// Parse a `def Type "Name" (...) { ... }` block.
    fn parse_prim(&mut self, line: &str, start_line: usize) -> ParseResult<Prim> {
        let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let specifier = Specifier::from_keyword(keyword).ok_or_else(|| ParseError::Parse {
            line: start_line,
            message: format!("unknown specifier: {}", keyword),
        })?;

        let rest = rest.trim_start();
        let (type_name, rest) = if rest.starts_with('"') {
            ("", rest)
        } else {
            let (ty, rest) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            (ty, rest.trim_start())
        };

        let name_end = rest
            .strip_prefix('"')
            .and_then(|r| r.find('"'))
            .ok_or_else(|| ParseError::Parse {
                line: start_line,
                message: format!("expected a quoted prim name in: {}", line),
            })?;
        let name = &rest[1..name_end + 1];
        let after_name = &rest[name_end + 2..];

        let mut prim = Prim {
            specifier,
            type_name: type_name.to_string(),
            name: name.to_string(),
            ..Default::default()
        };

        // Gather the prim metadata until the opening brace of the body.
        let mut head = after_name.to_string();
        let brace = loop {
            if let Some(idx) = find_body_brace(&head) {
                break idx;
            }
            match self.lines.pop_front() {
                Some((num, next)) => {
                    self.current_line = num;
                    head.push('\n');
                    head.push_str(&next);
                }
                None => return Err(ParseError::UnclosedBlock(start_line)),
            }
        };

        let meta = head[..brace].trim();
        if !meta.is_empty() {
            let inner = strip_outer(meta, '(', ')').ok_or_else(|| ParseError::Parse {
                line: start_line,
                message: format!("malformed metadata for prim {}", name),
            })?;
            prim.metadata = split_statements(inner);
        }

        // Content that shares a line with the opening brace.
        let body_rest = head[brace + 1..].trim();
        if !body_rest.is_empty() {
            let line_num = self.current_line;
            if body_rest.ends_with('}') && brace_balance(body_rest) < 0 {
                let content = body_rest[..body_rest.len() - 1].trim();
                self.lines.push_front((line_num, "}".to_string()));
                if !content.is_empty() {
                    self.lines.push_front((line_num, content.to_string()));
                }
            } else {
                self.lines.push_front((line_num, body_rest.to_string()));
            }
        }

        loop {
            let (line_num, line) = match self.lines.pop_front() {
                Some(x) => x,
                None => return Err(ParseError::UnclosedBlock(start_line)),
            };
            self.current_line = line_num;

            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if trimmed == "}" {
                break;
            }

            if is_prim_statement(trimmed) {
                let child = self.parse_prim(trimmed, line_num)?;
                prim.children.push(child);
                continue;
            }

            let statement = self.collect_until_balanced(trimmed, line_num)?;
            self.parse_property(statement, line_num, &mut prim)?;
        }

        Ok(prim)
    }

    /// Parse an attribute or relationship statement into `prim`.
    fn parse_property(&self, statement: String, line_num: usize, prim: &mut Prim) -> ParseResult<()> {
        if statement.starts_with("variantSet") || statement.starts_with("reorder") {
            prim.extra.push(statement);
            return Ok(());
        }

        let mut rest = statement.as_str();
        let mut custom = false;
        let mut uniform = false;
        loop {
            let (word, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            match word {
                "custom" => custom = true,
                "uniform" => uniform = true,
                "varying" => {}
                "prepend" | "append" | "add" | "delete" => {
                    prim.extra.push(statement.clone());
                    return Ok(());
                }
                _ => break,
            }
            rest = tail.trim_start();
        }

        let (type_name, tail) = rest.split_once(char::is_whitespace).ok_or_else(|| ParseError::Parse {
            line: line_num,
            message: format!("unrecognized statement: {}", statement),
        })?;
        let tail = tail.trim_start();
        let name_len = tail
            .find(|c: char| c.is_whitespace() || c == '=' || c == '(')
            .unwrap_or(tail.len());
        let name = &tail[..name_len];
        let after = tail[name_len..].trim();

        if name.is_empty() {
            return Err(ParseError::Parse {
                line: line_num,
                message: format!("missing property name: {}", statement),
            });
        }

        if type_name == "rel" {
            prim.set_relationship(name, extract_targets(after));
            return Ok(());
        }

        if name.contains(".timeSamples") || name.contains(".spline") {
            prim.extra.push(statement.clone());
            return Ok(());
        }

        if let Some(base) = name.strip_suffix(".connect") {
            let target = extract_targets(after).into_iter().next().ok_or_else(|| ParseError::Parse {
                line: line_num,
                message: format!("connection without a target: {}", statement),
            })?;
            let attribute = prim.attribute_mut(base, type_name);
            attribute.connection = Some(target);
            attribute.uniform |= uniform;
            attribute.custom |= custom;
            return Ok(());
        }

        let (value, metadata) = match after.strip_prefix('=') {
            Some(value_text) => {
                let (value_text, metadata) = split_value(value_text);
                (Some(Value::parse(type_name, value_text)), metadata)
            }
            None if after.starts_with('(') => (None, Some(after)),
            None => (None, None),
        };

        let attribute = prim.attribute_mut(name, type_name);
        if value.is_some() {
            attribute.value = value;
        }
        attribute.uniform |= uniform;
        attribute.custom |= custom;
        if let Some(metadata) = metadata {
            attribute.metadata = Some(metadata.to_string());
        }
        Ok(())
    }
}

/// Parse a USDA string into a stage.
pub fn parse_usda(content: &str) -> ParseResult<Stage> {
    let mut parser = UsdaParser::new(content);
    parser.parse()
}

fn is_prim_statement(line: &str) -> bool {
    ["def", "over", "class"].iter().any(|kw| {
        line.strip_prefix(kw)
            .map(|rest| rest.starts_with(char::is_whitespace))
            .unwrap_or(false)
    })
}

/// Walk `text` outside of string and asset literals, calling `f` on each char.
fn scan_unquoted(text: &str, mut f: impl FnMut(usize, char) -> bool) {
    let mut in_string = false;
    let mut in_asset = false;
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if in_asset {
            if c == '@' {
                in_asset = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '@' => in_asset = true,
            _ => {
                if !f(idx, c) {
                    return;
                }
            }
        }
    }
}

/// Net count of open brackets of all kinds.
fn balance(text: &str) -> i32 {
    let mut depth = 0;
    scan_unquoted(text, |_, c| {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
        true
    });
    depth
}

fn brace_balance(text: &str) -> i32 {
    let mut depth = 0;
    scan_unquoted(text, |_, c| {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        true
    });
    depth
}

/// Index of the `{` that opens a prim body (outside the metadata parentheses).
fn find_body_brace(text: &str) -> Option<usize> {
    let mut depth = 0;
    let mut found = None;
    scan_unquoted(text, |idx, c| {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            '{' if depth == 0 => {
                found = Some(idx);
                return false;
            }
            _ => {}
        }
        true
    });
    found
}

fn strip_outer(text: &str, open: char, close: char) -> Option<&str> {
    text.trim().strip_prefix(open)?.strip_suffix(close)
}

fn unquote(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

/// Split a block body into top-level statements, one per balanced line group.
fn split_statements(inner: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    for line in inner.lines() {
        let trimmed = line.trim();
        if current.is_empty() && (trimmed.is_empty() || trimmed.starts_with('#')) {
            continue;
        }
        if current.is_empty() {
            current.push_str(trimmed);
        } else {
            current.push('\n');
            current.push_str(line);
        }
        if balance(&current) <= 0 {
            statements.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        statements.push(current);
    }
    statements
}

/// Parse `string creator = "..."` inside a dictionary.
fn parse_dictionary_entry(entry: &str) -> Option<(String, Value)> {
    let (decl, value) = entry.split_once('=')?;
    let mut words = decl.split_whitespace();
    let type_name = words.next()?;
    let key = unquote(words.next()?);
    match Value::parse(type_name, value) {
        Value::Raw(_) => None,
        value => Some((key.to_string(), value)),
    }
}

/// Split an attribute value from trailing attribute metadata.
fn split_value(text: &str) -> (&str, Option<&str>) {
    let text = text.trim();
    let end = value_end(text);
    let value = text[..end].trim();
    let rest = text[end..].trim();
    (value, (!rest.is_empty()).then_some(rest))
}

fn value_end(text: &str) -> usize {
    let bytes = text.as_bytes();
    match bytes.first() {
        Some(b'(') | Some(b'[') => {
            let mut depth = 0;
            let mut end = text.len();
            scan_unquoted(text, |idx, c| {
                match c {
                    '(' | '[' => depth += 1,
                    ')' | ']' => {
                        depth -= 1;
                        if depth == 0 {
                            end = idx + 1;
                            return false;
                        }
                    }
                    _ => {}
                }
                true
            });
            end
        }
        Some(b'"') => {
            if text.starts_with("\"\"\"") {
                return text[3..].find("\"\"\"").map(|i| i + 6).unwrap_or(text.len());
            }
            let mut escaped = false;
            for (idx, c) in text.char_indices().skip(1) {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    return idx + 1;
                }
            }
            text.len()
        }
        Some(b'@') => text[1..].find('@').map(|i| i + 2).unwrap_or(text.len()),
        Some(b'<') => text.find('>').map(|i| i + 1).unwrap_or(text.len()),
        _ => text.find(char::is_whitespace).unwrap_or(text.len()),
    }
}

/// Extract every `<path>` target from a relationship or connection value.
fn extract_targets(text: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        match after.find('>') {
            Some(end) => {
                if end > 0 {
                    result.push(after[..end].to_string());
                }
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    result
}
