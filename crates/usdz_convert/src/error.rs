//! Error types for conversion runs.

use thiserror::Error;
use usdz_core::StageError;

/// Errors that end a conversion run.
///
/// [`ConvertError::Usage`] is a malformed invocation and is reported with the
/// usage banner. Every other variant is a conversion failure.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Conversion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Stage(#[from] StageError),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Exit status for usage errors.
pub const USAGE_ERROR_STATUS: u8 = 1;

/// Exit status for conversion errors.
pub const CONVERSION_ERROR_STATUS: u8 = 2;

impl ConvertError {
    pub fn usage(message: impl Into<String>) -> Self {
        ConvertError::Usage(message.into())
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        ConvertError::Conversion(message.into())
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, ConvertError::Usage(_))
    }

    /// Process exit status for this error.
    pub fn exit_status(&self) -> u8 {
        if self.is_usage() {
            USAGE_ERROR_STATUS
        } else {
            CONVERSION_ERROR_STATUS
        }
    }
}
