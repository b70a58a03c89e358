//! In-memory USD stage.
//!
//! A [`Stage`] is a single layer: layer metadata plus a tree of [`Prim`]s
//! under a pseudo-root. It is what importers produce, what the material
//! binder edits and what the USDA writer serializes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::path;
use crate::usd::ParseError;
use crate::usd::{prim_types, Prim, Value, MATERIAL_BINDING};
use crate::usd::writer;

/// Errors that can occur while loading, editing or saving a stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("binary USD layers are not supported: {}", .0.display())]
    BinaryLayer(PathBuf),

    #[error("invalid prim path: {0}")]
    InvalidPath(String),
}

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Layer-level metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerMetadata {
    pub default_prim: Option<String>,
    pub meters_per_unit: Option<f64>,
    pub up_axis: Option<String>,

    /// `customLayerData` entries (string, token, numeric and bool values)
    pub custom_layer_data: BTreeMap<String, Value>,

    /// Other header statements, verbatim
    pub extra: Vec<String>,
}

/// What a [`Stage::walk`] visitor wants to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    Continue,
    SkipChildren,
    Stop,
}

/// A single-layer USD stage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stage {
    pub metadata: LayerMetadata,
    root: Prim,
}

impl Stage {
    /// Create an empty stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a stage from parsed metadata and root prims.
    pub fn from_parts(metadata: LayerMetadata, root_prims: Vec<Prim>) -> Self {
        Self {
            metadata,
            root: Prim {
                children: root_prims,
                ..Default::default()
            },
        }
    }

    /// Top-level prims in authored order.
    pub fn root_prims(&self) -> &[Prim] {
        &self.root.children
    }

    /// The pseudo-root prim.
    pub fn pseudo_root(&self) -> &Prim {
        &self.root
    }

    /// Path of the default prim, if it is set and exists.
    pub fn default_prim_path(&self) -> Option<String> {
        let name = self.metadata.default_prim.as_deref()?;
        let path = path::join(path::ROOT, name);
        self.prim(&path).map(|_| path)
    }

    pub fn set_default_prim(&mut self, name: impl Into<String>) {
        self.metadata.default_prim = Some(name.into());
    }

    /// Look up a prim by absolute path.
    pub fn prim(&self, prim_path: &str) -> Option<&Prim> {
        if !prim_path.starts_with('/') {
            return None;
        }
        let mut current = &self.root;
        for segment in path::segments(prim_path) {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Look up a prim by absolute path for editing.
    pub fn prim_mut(&mut self, prim_path: &str) -> Option<&mut Prim> {
        if !prim_path.starts_with('/') {
            return None;
        }
        let mut current = &mut self.root;
        for segment in path::segments(prim_path) {
            current = current.child_mut(segment)?;
        }
        Some(current)
    }

    /// Define a prim at `prim_path`.
    ///
    /// Missing ancestors are created as typeless `def` prims. An existing
    /// prim is reused; its type name is replaced when `type_name` is not empty.
    pub fn define_prim(&mut self, prim_path: &str, type_name: &str) -> StageResult<&mut Prim> {
        if !path::is_valid_prim_path(prim_path) || prim_path == path::ROOT {
            return Err(StageError::InvalidPath(prim_path.to_string()));
        }

        let mut current = &mut self.root;
        for segment in path::segments(prim_path) {
            let idx = match current.children.iter().position(|c| c.name == segment) {
                Some(idx) => idx,
                None => {
                    current.children.push(Prim::new("", segment));
                    current.children.len() - 1
                }
            };
            current = &mut current.children[idx];
        }

        if !type_name.is_empty() {
            current.type_name = type_name.to_string();
        }
        Ok(current)
    }

    /// Remove a prim and its subtree. Returns the removed prim.
    pub fn remove_prim(&mut self, prim_path: &str) -> Option<Prim> {
        let parent = self.prim_mut(path::parent(prim_path))?;
        let name = path::name(prim_path);
        let idx = parent.children.iter().position(|c| c.name == name)?;
        Some(parent.children.remove(idx))
    }

    /// Depth-first pre-order traversal in child order.
    ///
    /// The visitor receives each prim's path and the prim itself. The
    /// pseudo-root is not visited.
    pub fn walk<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, &Prim) -> Visit,
    {
        for child in &self.root.children {
            let child_path = path::join(path::ROOT, &child.name);
            if !walk_prim(&child_path, child, &mut visitor) {
                return;
            }
        }
    }

    /// Paths of every prim matching `predicate`, in traversal order.
    pub fn collect_paths<F>(&self, mut predicate: F) -> Vec<String>
    where
        F: FnMut(&Prim) -> bool,
    {
        let mut result = Vec::new();
        self.walk(|prim_path, prim| {
            if predicate(prim) {
                result.push(prim_path.to_string());
            }
            Visit::Continue
        });
        result
    }

    /// Path of the first prim under `start` (inclusive) matching `predicate`.
    pub fn find_first<F>(&self, start: &str, mut predicate: F) -> Option<String>
    where
        F: FnMut(&str, &Prim) -> bool,
    {
        let mut found = None;
        let mut visitor = |prim_path: &str, prim: &Prim| {
            if predicate(prim_path, prim) {
                found = Some(prim_path.to_string());
                return Visit::Stop;
            }
            Visit::Continue
        };

        if start == path::ROOT {
            self.walk(visitor);
        } else if let Some(prim) = self.prim(start) {
            walk_prim(start, prim, &mut visitor);
        }
        found
    }

    /// Material bound to a geometry prim, if the binding targets a Material.
    pub fn bound_material(&self, prim_path: &str) -> Option<String> {
        let target = self.prim(prim_path)?.material_binding()?;
        match self.prim(target) {
            Some(material) if material.is_material() => Some(target.to_string()),
            _ => None,
        }
    }

    /// Bind `material_path` to the prim at `prim_path`.
    pub fn bind_material(&mut self, prim_path: &str, material_path: &str) -> StageResult<()> {
        let prim = self
            .prim_mut(prim_path)
            .ok_or_else(|| StageError::InvalidPath(prim_path.to_string()))?;
        prim.add_api_schema("MaterialBindingAPI");
        prim.set_relationship(MATERIAL_BINDING, vec![material_path.to_string()]);
        Ok(())
    }

    /// Asset paths of every `UsdUVTexture` file input, in traversal order.
    ///
    /// Duplicates are removed.
    pub fn texture_asset_paths(&self) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();
        self.walk(|_, prim| {
            if prim.is_shader() && prim.shader_id() == Some("UsdUVTexture") {
                if let Some(Value::Asset(file)) = prim.attribute("inputs:file").and_then(|a| a.value.as_ref()) {
                    if !file.is_empty() && !result.contains(file) {
                        result.push(file.clone());
                    }
                }
            }
            Visit::Continue
        });
        result
    }

    /// Serialize the stage as USDA text.
    pub fn to_usda_string(&self) -> String {
        writer::write_usda(self)
    }

    /// Write the stage as a USDA file.
    pub fn export<P: AsRef<Path>>(&self, path: P) -> StageResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_usda_string())?;
        log::debug!("Exported stage to {}", path.display());
        Ok(())
    }

    /// Paths of all Mesh and GeomSubset prims.
    pub fn geometry_paths(&self) -> Vec<String> {
        self.collect_paths(Prim::is_geometry)
    }

    /// Paths of all Material prims.
    pub fn material_paths(&self) -> Vec<String> {
        self.collect_paths(|prim| prim.type_name == prim_types::MATERIAL)
    }
}

/// Returns false when the visitor asked to stop.
fn walk_prim<F>(prim_path: &str, prim: &Prim, visitor: &mut F) -> bool
where
    F: FnMut(&str, &Prim) -> Visit,
{
    match visitor(prim_path, prim) {
        Visit::Stop => return false,
        Visit::SkipChildren => return true,
        Visit::Continue => {}
    }
    for child in &prim.children {
        let child_path = path::join(prim_path, &child.name);
        if !walk_prim(&child_path, child, visitor) {
            return false;
        }
    }
    true
}
