//! Material binder.
//!
//! Applies the material specs of a request to a stage: discovers bound
//! materials, backfills a default material for unbound geometry, and
//! creates, replaces or updates UsdPreviewSurface materials.

use std::collections::HashMap;

use usdz_core::{path, Stage, Visit};

use crate::error::{ConvertError, ConvertResult};
use crate::import::SourceFormat;
use crate::material::MaterialSpec;
use crate::relocate::TextureRelocator;
use crate::shading;

pub const DEFAULT_MATERIAL_NAME: &str = "defaultMaterial";

/// Materials known to the binder for one run.
#[derive(Clone, Debug, Default)]
pub struct SceneMaterialIndex {
    /// Material paths in discovery order
    paths: Vec<String>,

    /// Short name -> path, last discovered wins
    by_name: HashMap<String, String>,
}

impl SceneMaterialIndex {
    /// Add a material path. A path is never indexed twice.
    pub fn insert(&mut self, material_path: &str) -> bool {
        if self.contains(material_path) {
            return false;
        }
        self.paths.push(material_path.to_string());
        self.by_name
            .insert(path::name(material_path).to_string(), material_path.to_string());
        true
    }

    pub fn remove(&mut self, material_path: &str) {
        self.paths.retain(|p| p != material_path);
        self.by_name.retain(|_, p| p != material_path);
    }

    pub fn contains(&self, material_path: &str) -> bool {
        self.paths.iter().any(|p| p == material_path)
    }

    pub fn by_name(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Binds material specs onto one stage.
pub struct MaterialBinder<'a> {
    stage: &'a mut Stage,
    index: SceneMaterialIndex,
    materials_path: String,
    default_material: Option<String>,
}

impl<'a> MaterialBinder<'a> {
    /// Create a binder and index the materials already bound in `stage`.
    pub fn new(stage: &'a mut Stage) -> Self {
        let materials_path = match stage.default_prim_path() {
            Some(default_prim) => path::join(&default_prim, "Materials"),
            None => "/Materials".to_string(),
        };

        let mut binder = Self {
            stage,
            index: SceneMaterialIndex::default(),
            materials_path,
            default_material: None,
        };
        binder.discover();
        binder
    }

    pub fn index(&self) -> &SceneMaterialIndex {
        &self.index
    }

    /// Container path for created materials.
    pub fn materials_path(&self) -> &str {
        &self.materials_path
    }

    /// Index every material bound to a Mesh or GeomSubset.
    fn discover(&mut self) {
        let mut found = Vec::new();
        let stage = &*self.stage;
        stage.walk(|prim_path, prim| {
            if prim.is_geometry() {
                if let Some(material) = stage.bound_material(prim_path) {
                    found.push(material);
                }
            }
            Visit::Continue
        });

        for material in found {
            if self.index.insert(&material) {
                log::debug!("Found material {}", material);
            }
        }
    }

    /// Bind a shared default material to every geometry prim without one.
    pub fn backfill_default_material(&mut self) -> ConvertResult<()> {
        if self.unbound_geometry().is_empty() {
            return Ok(());
        }
        let material = match &self.default_material {
            Some(material) => material.clone(),
            None => {
                let material = self.create_material(DEFAULT_MATERIAL_NAME)?;
                self.default_material = Some(material.clone());
                material
            }
        };
        self.bind_unbound(&material)?;
        self.index.insert(&material);
        Ok(())
    }

    fn unbound_geometry(&self) -> Vec<String> {
        let stage = &*self.stage;
        stage
            .collect_paths(|prim| prim.is_geometry())
            .into_iter()
            .filter(|p| stage.bound_material(p).is_none())
            .collect()
    }

    /// Bind `material` to every geometry prim without a material.
    fn bind_unbound(&mut self, material: &str) -> ConvertResult<usize> {
        let unbound = self.unbound_geometry();
        for geometry in &unbound {
            self.stage.bind_material(geometry, material)?;
            log::debug!("Bound {} to {}", geometry, material);
        }
        Ok(unbound.len())
    }

    /// Apply all specs in order.
    ///
    /// `source_format` decides whether material directives apply at all;
    /// `relocator` copies the textures each spec references.
    pub fn apply(
        &mut self,
        specs: &[MaterialSpec],
        source_format: SourceFormat,
        relocator: &mut TextureRelocator,
    ) -> ConvertResult<()> {
        if source_format.is_usd_family() {
            if specs.iter().any(|spec| !spec.is_empty()) {
                log::warn!("Material arguments are ignored for .usda/usdc input files.");
            }
            return Ok(());
        }

        for spec in specs {
            let mut spec = spec.clone();
            if spec.is_anonymous() {
                self.apply_anonymous(&mut spec, relocator)?;
            } else {
                self.apply_named(&mut spec, relocator)?;
            }
        }
        Ok(())
    }

    fn apply_anonymous(&mut self, spec: &mut MaterialSpec, relocator: &mut TextureRelocator) -> ConvertResult<()> {
        if spec.is_empty() {
            return Ok(());
        }

        self.backfill_default_material()?;
        relocator.relocate(spec)?;

        for material in self.index.paths().to_vec() {
            shading::apply_spec(self.stage, &material, spec)?;
        }
        Ok(())
    }

    fn apply_named(&mut self, spec: &mut MaterialSpec, relocator: &mut TextureRelocator) -> ConvertResult<()> {
        let target = self.target_path(spec)?;

        let replaced = self.find_material(spec.lookup_key());
        if let Some(existing) = &replaced {
            log::debug!("Replacing material {}", existing);
            self.index.remove(existing);
            self.stage.remove_prim(existing);
        }

        relocator.relocate(spec)?;

        log::debug!("Creating material at path: {}", target);
        shading::define_material(self.stage, &target)?;
        shading::apply_spec(self.stage, &target, spec)?;

        match replaced {
            Some(existing) if existing != target => self.rebind(&existing, &target)?,
            Some(_) => {}
            None => {
                self.bind_unbound(&target)?;
            }
        }
        self.index.insert(&target);
        Ok(())
    }

    /// Path a named spec's material is created at.
    fn target_path(&self, spec: &MaterialSpec) -> ConvertResult<String> {
        let invalid = || ConvertError::conversion("failed to create material by specified path.");
        match &spec.path {
            Some(explicit) => {
                if path::is_valid_prim_path(explicit) && explicit != path::ROOT {
                    Ok(explicit.clone())
                } else {
                    Err(invalid())
                }
            }
            None => {
                if path::is_valid_identifier(&spec.name) {
                    Ok(path::join(&self.materials_path, &spec.name))
                } else {
                    Err(invalid())
                }
            }
        }
    }

    fn create_material(&mut self, name: &str) -> ConvertResult<String> {
        if !path::is_valid_identifier(name) {
            return Err(ConvertError::conversion("failed to create material by specified path."));
        }
        let material_path = path::join(&self.materials_path, name);
        log::debug!("Creating material at path: {}", material_path);
        shading::define_material(self.stage, &material_path)?;
        Ok(material_path)
    }

    /// Resolve a material by path or name.
    pub fn find_material(&self, key: &str) -> Option<String> {
        if key.is_empty() {
            return None;
        }
        if self.index.contains(key) {
            return Some(key.to_string());
        }

        let name = path::make_valid_identifier(key);
        if let Some(found) = self.index.by_name(&name) {
            return Some(found.to_string());
        }

        for candidate in [path::join(&self.materials_path, &name), path::join(path::ROOT, &name)] {
            if self.index.contains(&candidate) {
                return Some(candidate);
            }
        }

        let by_path = key.starts_with('/');
        self.stage.find_first(path::ROOT, |prim_path, prim| {
            prim.is_material() && (if by_path { prim_path == key } else { prim.name == key })
        })
    }

    fn rebind(&mut self, from: &str, to: &str) -> ConvertResult<()> {
        let bound: Vec<String> = self
            .stage
            .collect_paths(|prim| prim.material_binding() == Some(from));
        for geometry in bound {
            self.stage.bind_material(&geometry, to)?;
            log::debug!("Rebound {} to {}", geometry, to);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{ChannelRole, Input};
    use usdz_core::{load_usda_from_string, Value};

    const SCENE: &str = r#"#usda 1.0
(
    defaultPrim = "Asset"
)

def Xform "Asset"
{
    def Mesh "body"
    {
        rel material:binding = </Asset/Materials/body>
    }

    def Mesh "lid"
    {
    }

    def Mesh "base"
    {
        def GeomSubset "bottom"
        {
            rel material:binding = </Asset/Materials/body>
        }
    }

    def Scope "Materials"
    {
        def Material "body"
        {
        }
    }
}
"#;

    fn work_dirs() -> (tempfile::TempDir, TextureRelocator) {
        let dir = tempfile::tempdir().unwrap();
        let relocator = TextureRelocator::new(dir.path(), dir.path(), dir.path());
        (dir, relocator)
    }

    fn constant(role: ChannelRole, values: &[f32]) -> MaterialSpec {
        let mut spec = MaterialSpec::anonymous();
        spec.set_input(role, Input::Constant(values.to_vec()));
        spec
    }

    #[test]
    fn test_discovery_indexes_bound_materials_once() {
        let mut stage = load_usda_from_string(SCENE).unwrap();
        let binder = MaterialBinder::new(&mut stage);
        assert_eq!(binder.index().paths(), ["/Asset/Materials/body"]);
        assert_eq!(binder.materials_path(), "/Asset/Materials");
    }

    #[test]
    fn test_default_backfill() {
        let mut stage = load_usda_from_string(SCENE).unwrap();
        let (_dir, mut relocator) = work_dirs();

        let mut binder = MaterialBinder::new(&mut stage);
        let spec = constant(ChannelRole::Metallic, &[1.0]);
        binder.apply(&[spec], SourceFormat::Obj, &mut relocator).unwrap();
        assert_eq!(binder.index().len(), 2);

        let default = "/Asset/Materials/defaultMaterial";
        assert_eq!(stage.bound_material("/Asset/lid").as_deref(), Some(default));
        assert_eq!(stage.bound_material("/Asset/base").as_deref(), Some(default));
        assert_eq!(stage.bound_material("/Asset/body").as_deref(), Some("/Asset/Materials/body"));

        for material in ["/Asset/Materials/body", default] {
            let shader = shading::surface_shader(&mut stage, material).unwrap();
            assert_eq!(
                stage.prim(&shader).unwrap().attribute("inputs:metallic").unwrap().value,
                Some(Value::Float(1.0))
            );
        }
    }

    #[test]
    fn test_exact_path_replacement() {
        let mut stage = load_usda_from_string(SCENE).unwrap();
        let (_dir, mut relocator) = work_dirs();

        let mut spec = MaterialSpec::named("/Asset/Materials/body");
        spec.set_input(ChannelRole::Roughness, Input::Constant(vec![0.25]));

        let mut binder = MaterialBinder::new(&mut stage);
        binder
            .apply(&[MaterialSpec::anonymous(), spec], SourceFormat::Gltf, &mut relocator)
            .unwrap();
        assert_eq!(binder.index().paths(), ["/Asset/Materials/body"]);

        assert_eq!(stage.material_paths(), vec!["/Asset/Materials/body"]);
        let shader = stage.prim("/Asset/Materials/body/surfaceShader").unwrap();
        assert_eq!(shader.attribute("inputs:roughness").unwrap().value, Some(Value::Float(0.25)));
        assert_eq!(stage.bound_material("/Asset/body").as_deref(), Some("/Asset/Materials/body"));
        assert_eq!(
            stage.bound_material("/Asset/base/bottom").as_deref(),
            Some("/Asset/Materials/body")
        );
        // Anonymous empty spec never creates the default material.
        assert!(stage.prim("/Asset/Materials/defaultMaterial").is_none());
    }

    #[test]
    fn test_replacement_elsewhere_rebinds_geometry() {
        let mut stage = load_usda_from_string(
            r#"#usda 1.0
(
    defaultPrim = "Asset"
)

def Xform "Asset"
{
    def Mesh "handle"
    {
        rel material:binding = </Asset/Looks/chrome>
    }

    def Scope "Looks"
    {
        def Material "chrome"
        {
        }
    }
}
"#,
        )
        .unwrap();
        let (_dir, mut relocator) = work_dirs();

        let mut binder = MaterialBinder::new(&mut stage);
        binder
            .apply(&[MaterialSpec::named("chrome")], SourceFormat::Obj, &mut relocator)
            .unwrap();
        assert_eq!(binder.index().paths(), ["/Asset/Materials/chrome"]);

        assert!(stage.prim("/Asset/Looks/chrome").is_none());
        assert_eq!(
            stage.bound_material("/Asset/handle").as_deref(),
            Some("/Asset/Materials/chrome")
        );
    }

    #[test]
    fn test_named_replacement_keeps_bindings() {
        let mut stage = load_usda_from_string(SCENE).unwrap();
        let (_dir, mut relocator) = work_dirs();

        let mut spec = MaterialSpec::named("body");
        spec.set_input(ChannelRole::DiffuseColor, Input::Constant(vec![0.0, 1.0, 0.0]));
        MaterialBinder::new(&mut stage)
            .apply(&[spec], SourceFormat::Obj, &mut relocator)
            .unwrap();

        let shader = stage.prim("/Asset/Materials/body/surfaceShader").unwrap();
        assert!(shader.attribute("inputs:diffuseColor").is_some());
        assert_eq!(stage.bound_material("/Asset/body").as_deref(), Some("/Asset/Materials/body"));
    }

    #[test]
    fn test_named_spec_creates_new_material() {
        let mut stage = load_usda_from_string(SCENE).unwrap();
        let (_dir, mut relocator) = work_dirs();

        let spec = MaterialSpec::named("trim");
        let mut binder = MaterialBinder::new(&mut stage);
        binder.apply(&[spec], SourceFormat::Obj, &mut relocator).unwrap();
        assert!(binder.index().contains("/Asset/Materials/trim"));
        assert!(stage.prim("/Asset/Materials/trim/surfaceShader").is_some());

        assert_eq!(stage.bound_material("/Asset/lid").as_deref(), Some("/Asset/Materials/trim"));
        assert_eq!(stage.bound_material("/Asset/base").as_deref(), Some("/Asset/Materials/trim"));
        assert_eq!(stage.bound_material("/Asset/body").as_deref(), Some("/Asset/Materials/body"));
    }

    #[test]
    fn test_named_spec_binds_unbound_geometry_once() {
        let mut stage = load_usda_from_string(
            r#"#usda 1.0
(
    defaultPrim = "vase"
)

def Xform "vase"
{
    def Mesh "body"
    {
    }

    def Mesh "rim"
    {
    }
}
"#,
        )
        .unwrap();
        let (_dir, mut relocator) = work_dirs();

        let specs = [MaterialSpec::named("body"), MaterialSpec::named("glaze")];
        MaterialBinder::new(&mut stage)
            .apply(&specs, SourceFormat::Obj, &mut relocator)
            .unwrap();

        for mesh in ["/vase/body", "/vase/rim"] {
            assert_eq!(stage.bound_material(mesh).as_deref(), Some("/vase/Materials/body"));
        }
        assert!(stage.prim("/vase/Materials/glaze").is_some());
    }

    #[test]
    fn test_invalid_names_fail() {
        for name in ["9lives", "/Asset/Materials/bad name", "with-dash"] {
            let mut stage = load_usda_from_string(SCENE).unwrap();
            let (_dir, mut relocator) = work_dirs();
            let result = MaterialBinder::new(&mut stage).apply(
                &[MaterialSpec::named(name)],
                SourceFormat::Obj,
                &mut relocator,
            );
            match result {
                Err(ConvertError::Conversion(message)) => {
                    assert_eq!(message, "failed to create material by specified path.")
                }
                other => panic!("Expected conversion error for {}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_usd_sources_ignore_directives() {
        let mut stage = load_usda_from_string(SCENE).unwrap();
        let before = stage.clone();
        let (_dir, mut relocator) = work_dirs();

        MaterialBinder::new(&mut stage)
            .apply(&[constant(ChannelRole::Opacity, &[0.5])], SourceFormat::Usda, &mut relocator)
            .unwrap();
        assert_eq!(stage, before);
    }

    #[test]
    fn test_find_by_name_recursively() {
        let mut stage = load_usda_from_string(
            r#"#usda 1.0
def Xform "Root"
{
    def Scope "Looks"
    {
        def Material "chrome"
        {
        }
    }
}
"#,
        )
        .unwrap();
        let binder = MaterialBinder::new(&mut stage);
        assert!(binder.index().is_empty());
        assert_eq!(binder.materials_path(), "/Materials");
        assert_eq!(binder.find_material("chrome").as_deref(), Some("/Root/Looks/chrome"));
        assert_eq!(binder.find_material("/Root/Looks/chrome").as_deref(), Some("/Root/Looks/chrome"));
        assert_eq!(binder.find_material("/Looks/chrome"), None);
    }
}
