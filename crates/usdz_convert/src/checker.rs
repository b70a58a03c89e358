//! Package compatibility checking.
//!
//! The converter runs a [`CompatibilityChecker`] over every `.usdz` it
//! writes; the checker's status becomes the process exit status.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use usdz_core::{load_usda_from_string, Stage};
use zip::{CompressionMethod, ZipArchive};

use crate::error::ConvertResult;
use crate::package::{entry_name, USDZ_ALIGNMENT};
use crate::shading::PREVIEW_SURFACE;

/// Extensions allowed inside an ARKit package.
pub const ALLOWED_EXTENSIONS: [&str; 9] = ["usda", "usdc", "usd", "png", "jpg", "jpeg", "m4a", "mp3", "wav"];

const LAYER_EXTENSIONS: [&str; 3] = ["usda", "usdc", "usd"];

/// Validates a written package. Returns 0 when the package is compliant.
pub trait CompatibilityChecker {
    fn check(&self, package: &Path, verbose: bool) -> i32;
}

/// Package-level ARKit rules.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArkitChecker;

impl CompatibilityChecker for ArkitChecker {
    fn check(&self, package: &Path, verbose: bool) -> i32 {
        let failures = match check_package(package) {
            Ok(failures) => failures,
            Err(e) => vec![format!("can't open package: {}", e)],
        };

        if failures.is_empty() {
            if verbose {
                log::info!("{} passed ARKit compatibility checks", package.display());
            }
            return 0;
        }
        for failure in &failures {
            log::error!("{}", failure);
        }
        log::error!("{} is not ARKit compatible ({} issues)", package.display(), failures.len());
        1
    }
}

fn extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Run every rule; returns one message per failure.
fn check_package(package: &Path) -> ConvertResult<Vec<String>> {
    let mut archive = ZipArchive::new(File::open(package)?)?;
    let mut failures = Vec::new();

    if archive.len() == 0 {
        failures.push("package is empty".to_string());
        return Ok(failures);
    }

    let mut names = HashSet::new();
    let mut header_starts = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        if i == 0 && !LAYER_EXTENSIONS.contains(&extension(&name).as_str()) {
            failures.push(format!("first entry {} is not a USD layer", name));
        }
        if entry.compression() != CompressionMethod::Stored {
            failures.push(format!("entry {} is compressed", name));
        }
        if !ALLOWED_EXTENSIONS.contains(&extension(&name).as_str()) {
            failures.push(format!("entry {} has an unsupported file type", name));
        }
        header_starts.push((name.clone(), entry.header_start()));
        names.insert(name);
    }

    let mut raw = File::open(package)?;
    for (name, header_start) in header_starts {
        let data_start = data_start(&mut raw, header_start)?;
        if data_start % u64::from(USDZ_ALIGNMENT) != 0 {
            failures.push(format!("entry {} is not {}-byte aligned", name, USDZ_ALIGNMENT));
        }
    }

    let mut root = archive.by_index(0)?;
    let mut bytes = Vec::new();
    root.read_to_end(&mut bytes)?;
    drop(root);

    if bytes.starts_with(b"#usda") {
        let stage = load_usda_from_string(&String::from_utf8_lossy(&bytes))?;
        failures.extend(check_stage(&stage, &names));
    }
    Ok(failures)
}

// Local file header: fixed 30 bytes, then name and extra field.
fn data_start(file: &mut File, header_start: u64) -> std::io::Result<u64> {
    let mut header = [0u8; 30];
    file.seek(SeekFrom::Start(header_start))?;
    file.read_exact(&mut header)?;
    let name_len = u16::from_le_bytes([header[26], header[27]]) as u64;
    let extra_len = u16::from_le_bytes([header[28], header[29]]) as u64;
    Ok(header_start + 30 + name_len + extra_len)
}

/// Layer rules: textures present, meshes bound, preview surfaces only.
fn check_stage(stage: &Stage, entries: &HashSet<String>) -> Vec<String> {
    let mut failures = Vec::new();

    for asset in stage.texture_asset_paths() {
        let present = entry_name(&asset).map_or(false, |name| entries.contains(&name));
        if !present {
            failures.push(format!("texture {} is missing from the package", asset));
        }
    }

    for mesh_path in stage.collect_paths(|prim| prim.is_mesh()) {
        let Some(mesh) = stage.prim(&mesh_path) else {
            continue;
        };
        let bound = mesh.material_binding().is_some()
            || mesh
                .children
                .iter()
                .any(|child| child.is_geom_subset() && child.material_binding().is_some());
        if !bound {
            failures.push(format!("mesh {} has no material binding", mesh_path));
        }
    }

    for material_path in stage.material_paths() {
        let Some(material) = stage.prim(&material_path) else {
            continue;
        };
        let Some(target) = material
            .attribute("outputs:surface")
            .and_then(|a| a.connection.as_deref())
        else {
            failures.push(format!("material {} has no surface shader", material_path));
            continue;
        };
        let shader_path = usdz_core::path::split_property(target).0;
        let id = stage.prim(shader_path).and_then(|shader| shader.shader_id());
        if id != Some(PREVIEW_SURFACE) {
            failures.push(format!(
                "material {} uses surface shader {:?}, expected {}",
                material_path,
                id.unwrap_or("none"),
                PREVIEW_SURFACE
            ));
        }
    }

    failures
}
