//! USD layer loading.
//!
//! Only text layers are read. A binary crate file (`PXR-USDC` magic) is
//! reported as [`StageError::BinaryLayer`] so callers can explain the
//! limitation instead of failing with a parse error.

use std::path::Path;

use crate::stage::{Stage, StageError, StageResult};
use crate::usd::parser::parse_usda;

const USDC_MAGIC: &[u8] = b"PXR-USDC";

/// Check whether a file starts with the binary crate header.
pub fn is_binary_layer<P: AsRef<Path>>(path: P) -> StageResult<bool> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(bytes.starts_with(USDC_MAGIC))
}

/// Load a USDA layer (`.usda`, or text `.usd`) from disk.
pub fn load_usda<P: AsRef<Path>>(path: P) -> StageResult<Stage> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    if bytes.starts_with(USDC_MAGIC) {
        return Err(StageError::BinaryLayer(path.to_path_buf()));
    }

    let content = String::from_utf8(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    log::info!("Loading USDA: {}", path.display());
    let stage = load_usda_from_string(&content)?;
    log::debug!(
        "Loaded {} root prims, default prim {:?}",
        stage.root_prims().len(),
        stage.metadata.default_prim
    );
    Ok(stage)
}

/// Load a USDA layer from a string.
pub fn load_usda_from_string(content: &str) -> StageResult<Stage> {
    Ok(parse_usda(content)?)
}
