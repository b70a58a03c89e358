//! USDZ package I/O.
//!
//! A `.usdz` file is a zip archive whose entries are stored uncompressed with
//! their data 64-byte aligned. The root layer is the first entry.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use usdz_core::Stage;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ConvertResult;

/// Required alignment of entry data inside a package.
pub const USDZ_ALIGNMENT: u16 = 64;

/// One file to store in a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageEntry {
    /// Name inside the archive
    pub name: String,

    /// File on disk
    pub source: PathBuf,
}

impl PackageEntry {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Write a package. Entries are stored in the given order.
pub fn write_usdz(destination: &Path, entries: &[PackageEntry]) -> ConvertResult<()> {
    let file = File::create(destination)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .with_alignment(USDZ_ALIGNMENT);

    for entry in entries {
        let data = fs::read(&entry.source)?;
        zip.start_file(entry.name.as_str(), options)?;
        zip.write_all(&data)?;
        log::debug!("Packaged {} ({} bytes)", entry.name, data.len());
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(())
}

/// Normalize a layer asset path into an archive entry name.
///
/// Absolute paths and paths leaving the package root cannot resolve inside a
/// package and yield `None`.
pub fn entry_name(asset_path: &str) -> Option<String> {
    let name = asset_path.replace('\\', "/");
    let name = name.trim_start_matches("./");
    if name.is_empty() || name.starts_with('/') || name.split('/').any(|s| s == "..") || name.contains(':') {
        return None;
    }
    Some(name.to_string())
}

/// Texture files referenced by `stage`, resolved against `search_dirs` in
/// order. Unresolvable textures are logged and skipped.
pub fn stage_texture_entries(stage: &Stage, search_dirs: &[&Path]) -> Vec<PackageEntry> {
    let mut entries = Vec::new();
    for asset in stage.texture_asset_paths() {
        let Some(name) = entry_name(&asset) else {
            log::warn!("texture {} has no package-relative path, skipping", asset);
            continue;
        };
        match search_dirs.iter().map(|dir| dir.join(&name)).find(|p| p.is_file()) {
            Some(source) => entries.push(PackageEntry::new(name, source)),
            None => log::warn!("texture file {} not found", asset),
        }
    }
    entries
}

/// Copy every texture `stage` references into `target_dir`.
///
/// Returns the number of files copied.
pub fn copy_stage_textures(stage: &Stage, search_dirs: &[&Path], target_dir: &Path) -> ConvertResult<usize> {
    let mut copied = 0;
    for entry in stage_texture_entries(stage, search_dirs) {
        let target = target_dir.join(&entry.name);
        if target == entry.source {
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&entry.source, &target)?;
        log::debug!("Copied {} to {}", entry.source.display(), target.display());
        copied += 1;
    }
    Ok(copied)
}

/// Extract a package into `output_dir`.
///
/// Returns the path of the first entry, or `None` for an empty archive.
pub fn extract_usdz(package: &Path, output_dir: &Path) -> ConvertResult<Option<PathBuf>> {
    let mut archive = ZipArchive::new(File::open(package)?)?;
    if archive.len() == 0 {
        return Ok(None);
    }
    let first = archive.by_index(0)?.name().to_string();
    archive.extract(output_dir)?;
    log::debug!("Extracted {} entries from {}", archive.len(), package.display());
    Ok(Some(output_dir.join(first)))
}
