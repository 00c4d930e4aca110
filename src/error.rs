// ============================================================================
// ERROR TAXONOMY — surface invariants, file codec, editor actions
// ============================================================================

use thiserror::Error;

/// Violations of the PixelSurface size invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("invalid surface dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("buffer holds {actual} bytes, surface needs {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Failures while reading or writing `.slop` files and raster images.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("header error: {0}")]
    Header(String),

    #[error("not a slop file (magic {found:#010x})")]
    BadMagic { found: u32 },

    #[error("unsupported slop version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<Box<bincode::ErrorKind>> for CodecError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        match *e {
            bincode::ErrorKind::Io(io) => CodecError::Io(io),
            other => CodecError::Header(other.to_string()),
        }
    }
}

/// Everything an editor action can refuse or fail with.
///
/// Validation variants are meant to be shown to the user verbatim; the rest
/// are faults that are logged and then surfaced.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Active Layers must be contiguous; there must be 2 or more selected layers.")]
    NonContiguousMerge,

    #[error("Layer size {width}x{height} is out of range (1-{max} per side).")]
    InvalidResize { width: u32, height: u32, max: u32 },

    #[error("No layer is enabled.")]
    NoActiveLayer,

    #[error("The last remaining layer cannot be removed.")]
    LastLayer,

    #[error("Layer index {0} is out of range.")]
    LayerIndex(usize),

    #[error("Please Specify a model path. Generate -> Generation Settings.")]
    ModelPathNotSet,

    #[error("No inpaint mask has been started.")]
    NoInpaintMask,

    #[error("Image generation failed: {0}")]
    Generation(String),

    #[error("Inpaint request failed: {0}")]
    Inpaint(String),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl EditorError {
    /// True for refusals caused by user input rather than a failing resource.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            EditorError::NonContiguousMerge
                | EditorError::InvalidResize { .. }
                | EditorError::NoActiveLayer
                | EditorError::LastLayer
                | EditorError::LayerIndex(_)
                | EditorError::ModelPathNotSet
                | EditorError::NoInpaintMask
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bincode_io_errors_stay_io() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        let err: CodecError = Box::new(bincode::ErrorKind::Io(eof)).into();
        assert!(matches!(err, CodecError::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn validation_errors_are_user_facing() {
        assert!(EditorError::NonContiguousMerge.is_user_facing());
        assert!(EditorError::ModelPathNotSet.is_user_facing());
        assert!(!EditorError::Inpaint("timeout".into()).is_user_facing());
        assert_eq!(
            EditorError::NonContiguousMerge.to_string(),
            "Active Layers must be contiguous; there must be 2 or more selected layers."
        );
    }
}
