//! usdzconvert: convert OBJ, glTF and USD assets to USD layers and USDZ
//! packages, overriding materials from command-line directives.

pub mod binder;
pub mod checker;
pub mod convert;
pub mod directive;
pub mod error;
pub mod import;
pub mod material;
pub mod package;
pub mod relocate;
pub mod shading;

/// Version reported in the usage banner and the layer's `creator` field.
pub const TOOL_VERSION: &str = "0.62";

pub use binder::{MaterialBinder, SceneMaterialIndex};
pub use checker::{ArkitChecker, CompatibilityChecker};
pub use convert::Converter;
pub use directive::{arguments_from_files, parse_arguments, ConversionRequest, LoopMode, ParseOutcome};
pub use error::{ConvertError, ConvertResult};
pub use import::{ImportContext, Importer, Importers, SourceFormat};
pub use material::{ChannelRole, Channels, Input, MaterialSpec, TextureMap};
pub use relocate::TextureRelocator;
