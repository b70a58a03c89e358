//! Source format importers.
//!
//! Each importer turns a source asset into a [`Stage`]. OBJ and glTF are
//! built in; FBX and Alembic are slots a host can fill with its own
//! [`Importer`].

mod gltf;
mod obj;

use std::fmt;
use std::path::{Path, PathBuf};

use usdz_core::Stage;

use crate::error::{ConvertError, ConvertResult};

pub use self::gltf::GltfImporter;
pub use self::obj::ObjImporter;

/// Source formats the converter accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Obj,
    Gltf,
    Glb,
    Fbx,
    Usd,
    Usda,
    Usdc,
    Usdz,
    Abc,
}

impl SourceFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "obj" => Some(SourceFormat::Obj),
            "gltf" => Some(SourceFormat::Gltf),
            "glb" => Some(SourceFormat::Glb),
            "fbx" => Some(SourceFormat::Fbx),
            "usd" => Some(SourceFormat::Usd),
            "usda" => Some(SourceFormat::Usda),
            "usdc" => Some(SourceFormat::Usdc),
            "usdz" => Some(SourceFormat::Usdz),
            "abc" => Some(SourceFormat::Abc),
            _ => None,
        }
    }

    /// Loose USD layers. Material directives do not apply to these.
    pub fn is_usd_family(&self) -> bool {
        matches!(self, SourceFormat::Usd | SourceFormat::Usda | SourceFormat::Usdc)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Obj => "obj",
            SourceFormat::Gltf => "gltf",
            SourceFormat::Glb => "glb",
            SourceFormat::Fbx => "fbx",
            SourceFormat::Usd => "usd",
            SourceFormat::Usda => "usda",
            SourceFormat::Usdc => "usdc",
            SourceFormat::Usdz => "usdz",
            SourceFormat::Abc => "abc",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

/// Inputs handed to an importer.
#[derive(Clone, Debug)]
pub struct ImportContext {
    /// Source asset
    pub source: PathBuf,

    /// Path the stage will be exported to inside the working folder
    pub output_path: PathBuf,

    /// Working folder; importers write extracted textures here
    pub working_dir: PathBuf,

    pub copy_textures: bool,
    pub ios12: bool,
    pub verbose: bool,
}

impl ImportContext {
    /// Directory containing the source asset.
    pub fn source_dir(&self) -> &Path {
        self.source.parent().unwrap_or(Path::new(""))
    }
}

/// Builds a stage from a source asset.
pub trait Importer {
    fn import(&self, context: &ImportContext) -> ConvertResult<Stage>;
}

/// The importer set a converter dispatches to.
pub struct Importers {
    pub obj: Box<dyn Importer>,
    pub gltf: Box<dyn Importer>,
    pub fbx: Option<Box<dyn Importer>>,
    pub alembic: Option<Box<dyn Importer>>,
}

impl Default for Importers {
    fn default() -> Self {
        Self {
            obj: Box::new(ObjImporter),
            gltf: Box::new(GltfImporter),
            fbx: None,
            alembic: None,
        }
    }
}

impl Importers {
    /// The importer for a non-USD source format.
    pub fn for_format(&self, format: SourceFormat) -> ConvertResult<&dyn Importer> {
        let missing = |name: &str| {
            ConvertError::conversion(format!("no importer is available for {} files", name))
        };
        match format {
            SourceFormat::Obj => Ok(self.obj.as_ref()),
            SourceFormat::Gltf | SourceFormat::Glb => Ok(self.gltf.as_ref()),
            SourceFormat::Fbx => self.fbx.as_deref().ok_or_else(|| missing("FBX")),
            SourceFormat::Abc => self.alembic.as_deref().ok_or_else(|| missing("Alembic")),
            other => Err(ConvertError::conversion(format!(
                "{} files are opened directly, not imported",
                other
            ))),
        }
    }
}

/// Name of the root prim for an imported asset: the sanitized file stem.
pub(crate) fn asset_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    usdz_core::path::make_valid_identifier(&stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(SourceFormat::from_path(Path::new("a/b.OBJ")), Some(SourceFormat::Obj));
        assert_eq!(SourceFormat::from_path(Path::new("x.glb")), Some(SourceFormat::Glb));
        assert_eq!(SourceFormat::from_path(Path::new("x.txt")), None);
        assert_eq!(SourceFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_usd_family_excludes_usdz() {
        assert!(SourceFormat::Usda.is_usd_family());
        assert!(SourceFormat::Usdc.is_usd_family());
        assert!(!SourceFormat::Usdz.is_usd_family());
        assert!(!SourceFormat::Obj.is_usd_family());
    }

    #[test]
    fn test_missing_plugins_are_conversion_errors() {
        let importers = Importers::default();
        assert!(importers.for_format(SourceFormat::Obj).is_ok());
        match importers.for_format(SourceFormat::Fbx) {
            Err(ConvertError::Conversion(message)) => assert!(message.contains("FBX")),
            _ => panic!("Expected a conversion error"),
        }
    }

    #[test]
    fn test_asset_name() {
        assert_eq!(asset_name(Path::new("dir/my model.obj")), "my_model");
        assert_eq!(asset_name(Path::new("3d.gltf")), "_3d");
    }
}
