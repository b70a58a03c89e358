//! Conversion orchestration.
//!
//! A run goes ParseArgs -> ResolvePaths -> Import -> ApplyMetadata ->
//! BindMaterials -> Export -> Package -> Validate. Every intermediate file
//! lives in a temporary working folder that is removed when the run ends.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use usdz_core::{load_usda, Stage, Value, XformOp};

use crate::binder::MaterialBinder;
use crate::checker::{ArkitChecker, CompatibilityChecker};
use crate::directive::{arguments_from_files, parse_arguments, usage, ConversionRequest, LoopMode, ParseOutcome};
use crate::error::{ConvertError, ConvertResult};
use crate::import::{ImportContext, Importers, SourceFormat};
use crate::package::{self, PackageEntry};
use crate::relocate::TextureRelocator;
use crate::TOOL_VERSION;

/// Stage units assumed by iOS 12 viewers.
const IOS12_METERS_PER_UNIT: f64 = 0.01;

/// Destination file kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Destination {
    Usdz,
    Usd,
    Usda,
    Usdc,
}

impl Destination {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "usdz" => Some(Destination::Usdz),
            "usd" => Some(Destination::Usd),
            "usda" => Some(Destination::Usda),
            "usdc" => Some(Destination::Usdc),
            _ => None,
        }
    }
}

/// Resolved locations for one run.
#[derive(Clone, Debug)]
struct RunPaths {
    source: PathBuf,
    format: SourceFormat,
    destination: PathBuf,
    kind: Destination,
}

impl RunPaths {
    fn source_dir(&self) -> PathBuf {
        parent_dir(&self.source)
    }

    fn destination_dir(&self) -> PathBuf {
        parent_dir(&self.destination)
    }

    /// File name of the exported root layer.
    fn layer_name(&self) -> String {
        let stem = self
            .destination
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "model".to_string());
        format!("{}.usda", stem)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Runs conversions with a fixed set of importers and a package checker.
pub struct Converter {
    importers: Importers,
    checker: Box<dyn CompatibilityChecker>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(Importers::default(), Box::new(ArkitChecker))
    }
}

impl Converter {
    pub fn new(importers: Importers, checker: Box<dyn CompatibilityChecker>) -> Self {
        Self { importers, checker }
    }

    /// Parse `args` and run the conversion they describe.
    ///
    /// Help and the bare usage banner are printed here and return status 0.
    pub fn run<I, S>(&self, args: I) -> ConvertResult<i32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match parse_arguments(args)? {
            ParseOutcome::ShowHelp => {
                println!("{}", usage::help_text());
                Ok(0)
            }
            ParseOutcome::ShowUsage => {
                println!("{}", usage::usage_text());
                Ok(0)
            }
            ParseOutcome::Convert(request) => self.convert(&request),
        }
    }

    /// Convert a list of files, mapping file-name suffixes to channel roles.
    pub fn run_files<S: AsRef<str>>(&self, files: &[S], options: &BTreeMap<String, String>) -> ConvertResult<i32> {
        self.run(arguments_from_files(files, options))
    }

    /// Run one parsed request. Returns the checker status for packages and
    /// 0 for loose layers.
    pub fn convert(&self, request: &ConversionRequest) -> ConvertResult<i32> {
        if request.verbose && log::max_level() < log::LevelFilter::Debug {
            log::set_max_level(log::LevelFilter::Debug);
        }
        let paths = resolve_paths(request)?;

        let work = tempfile::Builder::new().prefix("usdzconvert").tempdir()?;
        log::debug!("Working folder: {}", work.path().display());

        let result = self.convert_in(request, &paths, work.path());

        let work_path = work.path().to_path_buf();
        if let Err(e) = work.close() {
            log::error!("Failed to remove working folder {}: {}", work_path.display(), e);
        }
        result
    }

    fn convert_in(&self, request: &ConversionRequest, paths: &RunPaths, work: &Path) -> ConvertResult<i32> {
        let is_package = paths.kind == Destination::Usdz;
        if request.ios12 {
            log::info!("Converting in iOS12 compatiblity mode.");
        }
        if request.copy_textures && is_package {
            log::warn!("argument -copytextures works for .usda and .usdc output files only.");
        }
        let copy_textures = request.copy_textures && !is_package;

        let layer_path = work.join(paths.layer_name());
        let mut stage = self.import(request, paths, work, &layer_path, copy_textures)?;

        apply_metadata(&mut stage, request, paths.format)?;

        let source_dir = paths.source_dir();
        if paths.format.is_usd_family() && is_package {
            package::copy_stage_textures(&stage, &[source_dir.as_path()], work)?;
        }

        let mut relocator = TextureRelocator::new(&source_dir, &paths.destination_dir(), work);
        MaterialBinder::new(&mut stage).apply(&request.materials, paths.format, &mut relocator)?;

        stage.export(&layer_path)?;

        let destination_dir = paths.destination_dir();
        if !destination_dir.is_dir() {
            log::debug!("Creating folder: {}", destination_dir.display());
            fs::create_dir_all(&destination_dir)?;
        }

        let search_dirs = [work, source_dir.as_path()];
        if is_package {
            let mut entries = vec![PackageEntry::new(paths.layer_name(), &layer_path)];
            entries.extend(package::stage_texture_entries(&stage, &search_dirs));
            package::write_usdz(&paths.destination, &entries)?;
        } else {
            fs::copy(&layer_path, &paths.destination)?;
            if copy_textures {
                let copied = package::copy_stage_textures(&stage, &search_dirs, &destination_dir)?;
                log::debug!("Copied {} textures to {}", copied, destination_dir.display());
            }
        }
        log::info!("Output file: {}", paths.destination.display());

        if is_package {
            Ok(self.checker.check(&paths.destination, request.verbose))
        } else {
            Ok(0)
        }
    }

    fn import(
        &self,
        request: &ConversionRequest,
        paths: &RunPaths,
        work: &Path,
        layer_path: &Path,
        copy_textures: bool,
    ) -> ConvertResult<Stage> {
        let context = ImportContext {
            source: paths.source.clone(),
            output_path: layer_path.to_path_buf(),
            working_dir: work.to_path_buf(),
            copy_textures,
            ios12: request.ios12,
            verbose: request.verbose,
        };

        match paths.format {
            SourceFormat::Usd | SourceFormat::Usda => Ok(load_usda(&paths.source)?),
            SourceFormat::Usdc => Err(ConvertError::conversion(format!(
                "binary input file {} is not supported",
                paths.source.display()
            ))),
            SourceFormat::Usdz => {
                let root = package::extract_usdz(&paths.source, work)?.ok_or_else(|| {
                    ConvertError::conversion(format!("can't open input usdz file {}", request.input.display()))
                })?;
                Ok(load_usda(root)?)
            }
            SourceFormat::Abc => {
                let stage = self.importers.for_format(SourceFormat::Abc)?.import(&context)?;
                // Round-trip through the working folder so edits apply to a plain layer.
                let reopened = work.join(format!("{}.abc.usda", paths.layer_name()));
                stage.export(&reopened)?;
                log::debug!("Temporary layer: {}", reopened.display());
                Ok(load_usda(&reopened)?)
            }
            format => self.importers.for_format(format)?.import(&context),
        }
    }
}

fn resolve_paths(request: &ConversionRequest) -> ConvertResult<RunPaths> {
    let input = &request.input;
    let source = if input.is_file() {
        input.clone()
    } else {
        let from_directive_dir = request
            .directive_file
            .as_deref()
            .filter(|_| input.parent().map_or(true, |p| p.as_os_str().is_empty()))
            .and_then(Path::parent)
            .map(|dir| dir.join(input))
            .filter(|candidate| candidate.is_file());
        from_directive_dir.ok_or_else(|| {
            ConvertError::usage(format!("input file {} does not exist.", input.display()))
        })?
    };

    let format = SourceFormat::from_path(&source).ok_or_else(|| {
        ConvertError::usage(format!("input file {} has unsupported file extension.", input.display()))
    })?;
    log::info!("Input file: {}", source.display());

    let destination = request
        .output
        .clone()
        .unwrap_or_else(|| source.with_extension("usdz"));
    let kind = Destination::from_path(&destination).ok_or_else(|| {
        ConvertError::usage(format!(
            "output file {} should have .usdz, .usdc, .usda or .usd extension.",
            destination.display()
        ))
    })?;
    if kind == Destination::Usdc {
        return Err(ConvertError::conversion(format!(
            "binary output file {} is not supported, use .usda or .usdz",
            destination.display()
        )));
    }

    Ok(RunPaths {
        source,
        format,
        destination,
        kind,
    })
}

fn apply_metadata(stage: &mut Stage, request: &ConversionRequest, format: SourceFormat) -> ConvertResult<()> {
    let data = &mut stage.metadata.custom_layer_data;
    data.insert(
        "creator".to_string(),
        Value::String(format!("usdzconvert preview {}", TOOL_VERSION)),
    );
    if let Some(url) = &request.url {
        data.insert("url".to_string(), Value::String(url.clone()));
    }
    if let Some(copyright) = &request.copyright {
        data.insert("copyright".to_string(), Value::String(copyright.clone()));
    }

    match request.loop_mode {
        Some(LoopMode::Loop) if format.is_usd_family() || format == SourceFormat::Usdz => {
            data.insert("loopStartToEndTimeCode".to_string(), Value::Bool(true));
        }
        Some(LoopMode::NoLoop) => {
            data.insert("loopStartToEndTimeCode".to_string(), Value::Bool(false));
        }
        _ => {}
    }

    if let Some(meters_per_unit) = request.meters_per_unit {
        if request.ios12 {
            apply_ios12_scale(stage, meters_per_unit)?;
        } else {
            stage.metadata.meters_per_unit = Some(meters_per_unit);
        }
    }
    Ok(())
}

/// Scale the default prim so the asset reads correctly in centimeter units.
fn apply_ios12_scale(stage: &mut Stage, meters_per_unit: f64) -> ConvertResult<()> {
    let scale = (meters_per_unit / IOS12_METERS_PER_UNIT) as f32;
    if (scale - 1.0).abs() <= f32::EPSILON {
        return Ok(());
    }
    let Some(default_prim) = stage.default_prim_path() else {
        log::warn!("No default prim, metersPerUnit is ignored in iOS12 mode");
        return Ok(());
    };
    if let Some(prim) = stage.prim_mut(&default_prim) {
        prim.add_xform_op(XformOp::Scale(Vec3::splat(scale)), Some("metersPerUnit"));
    }
    Ok(())
}
