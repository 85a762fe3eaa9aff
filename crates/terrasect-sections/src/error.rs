//! Error types of the section generator and its runtime.

use std::path::PathBuf;

use terrasect_config::ConfigError;
use terrasect_scene::SceneError;

/// Reasons the generator refuses to run on the current selection.
///
/// Detected before any scene mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// The active object has no mesh.
    #[error("Selected object not suited for this application")]
    WrongObject,
    /// Editable objects are selected but none of them is active.
    #[error("No active object selected")]
    NoActiveObjectSelected,
    /// Objects are selected but none is editable.
    #[error("Selected object not in active layer")]
    WrongLayer,
    /// Nothing is selected.
    #[error("No object selected")]
    NoObjectSelected,
}

/// Errors that abort a generation run.
#[derive(Debug, thiserror::Error)]
pub enum SectionsError {
    /// A scene operation failed.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// The options failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Writing the normal record failed.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A vertex position cannot be keyed at the requested precision.
    #[error(transparent)]
    Normals(#[from] NormalsError),

    /// The grid cannot be built from the footprint and options.
    #[error("degenerate grid: {0}")]
    DegenerateGrid(String),

    /// The baked source has no faces.
    #[error("object '{0}' has no geometry to section")]
    EmptyMesh(String),

    /// A mesh references a material outside the collected set.
    #[error("material '{0}' was not collected for LOD variants")]
    UnknownMaterial(String),
}

/// Errors keying vertex positions for normal transfer.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum NormalsError {
    /// The scaled coordinate does not fit a 64-bit key.
    #[error("coordinate {value} does not fit a normal key at {digits} digits")]
    KeyOverflow {
        /// Offending coordinate.
        value: f32,
        /// Requested digits.
        digits: u32,
    },

    /// The footprint is too wide for every key to fit at the requested digits.
    #[error("extent {extent} is too large for normal keys at {digits} digits")]
    ExtentOverflow {
        /// Largest footprint extent.
        extent: f32,
        /// Requested digits.
        digits: u32,
    },
}

/// Errors reading or writing a normal record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The data does not start with the expected magic bytes.
    #[error("invalid magic bytes")]
    InvalidMagic,

    /// The format version is not supported by this build.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// The data is shorter than expected.
    #[error("data truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected byte count.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },

    /// An object name does not fit the 16-bit length prefix.
    #[error("object name of {0} bytes exceeds the 65535-byte limit")]
    NameTooLong(usize),

    /// The record has more objects or entries than a 32-bit count holds.
    #[error("{0} entries exceed the 32-bit count limit")]
    TooManyEntries(usize),

    /// The quantisation digits do not fit the 8-bit header field.
    #[error("{0} digits do not fit the record header")]
    DigitsOutOfRange(u32),

    /// An object name is not valid UTF-8.
    #[error("object name is not valid UTF-8")]
    InvalidName(#[source] std::string::FromUtf8Error),

    /// A table quantised with different digits was added to the record.
    #[error("table quantised to {actual} digits added to a {expected}-digit record")]
    DigitsMismatch {
        /// Digits of the record.
        expected: u32,
        /// Digits of the rejected table.
        actual: u32,
    },

    /// The record file could not be read or written.
    #[error("failed to access normal record {}: {source}", path.display())]
    Io {
        /// File that was accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors on the runtime load path.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A scene operation failed.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// The normal record could not be loaded.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A section vertex cannot be keyed at the record's precision.
    #[error(transparent)]
    Normals(#[from] NormalsError),

    /// The record names an object the scene does not contain.
    #[error("normal record references unknown object '{0}'")]
    UnknownObject(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_messages() {
        assert_eq!(
            SelectionError::WrongObject.to_string(),
            "Selected object not suited for this application"
        );
        assert_eq!(
            SelectionError::NoActiveObjectSelected.to_string(),
            "No active object selected"
        );
        assert_eq!(
            SelectionError::WrongLayer.to_string(),
            "Selected object not in active layer"
        );
        assert_eq!(SelectionError::NoObjectSelected.to_string(), "No object selected");
    }

    #[test]
    fn test_record_io_error_names_path() {
        let err = RecordError::Io {
            path: PathBuf::from("data/Terrain.nrm"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("data/Terrain.nrm"));
    }
}
