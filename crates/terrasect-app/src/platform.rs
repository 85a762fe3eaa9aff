//! Platform directory resolution.
//!
//! Config, data and log locations follow OS conventions (XDG on Linux, Known
//! Folders on Windows, Library on macOS).

use std::path::{Path, PathBuf};
use std::{fmt, io};

/// Errors that can occur while preparing platform directories.
#[derive(Debug)]
pub enum PlatformError {
    /// The OS did not provide a configuration directory.
    NoConfigDir,
    /// A directory could not be created.
    Io(io::Error),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConfigDir => write!(f, "could not determine OS configuration directory"),
            Self::Io(e) => write!(f, "platform I/O error: {e}"),
        }
    }
}

impl std::error::Error for PlatformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PlatformError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Directories used by the generator.
pub struct PlatformDirs {
    /// Holds `terrasect.ron`.
    pub config_dir: PathBuf,
    /// Root of relative record directories.
    pub data_dir: PathBuf,
    /// JSON log files of debug builds.
    pub log_dir: PathBuf,
}

const APP_NAME: &str = "terrasect";

impl PlatformDirs {
    /// Resolve the OS directories without creating them.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NoConfigDir`] if the OS does not expose a
    /// configuration directory.
    pub fn resolve() -> Result<Self, PlatformError> {
        let app_config = dirs::config_dir()
            .ok_or(PlatformError::NoConfigDir)?
            .join(APP_NAME);
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| app_config.clone())
            .join(APP_NAME);

        Ok(Self {
            config_dir: app_config.clone(),
            data_dir,
            log_dir: app_config.join("logs"),
        })
    }

    /// Resolve the OS directories and create them on disk.
    pub fn resolve_and_create() -> Result<Self, PlatformError> {
        let dirs = Self::resolve()?;
        dirs.create_dirs()?;
        Ok(dirs)
    }

    /// Directories rooted under `root` instead of the OS locations.
    #[cfg(test)]
    pub fn resolve_with_root(root: &Path) -> Self {
        let app_dir = root.join(APP_NAME);
        Self {
            config_dir: app_dir.join("config"),
            data_dir: app_dir.join("data"),
            log_dir: app_dir.join("logs"),
        }
    }

    /// Create every directory on disk.
    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }

    /// Resolves a configured path: relative paths land under the data directory.
    pub fn data_path(&self, configured: &Path) -> PathBuf {
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.data_dir.join(configured)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_absolute() {
        let Ok(dirs) = PlatformDirs::resolve() else {
            // Headless CI images may lack a home directory.
            return;
        };
        assert!(dirs.config_dir.is_absolute(), "config_dir is not absolute");
        assert!(dirs.data_dir.is_absolute(), "data_dir is not absolute");
        assert!(dirs.log_dir.starts_with(&dirs.config_dir));
    }

    #[test]
    fn test_directory_creation() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = PlatformDirs::resolve_with_root(tmp.path());
        dirs.create_dirs().expect("create_dirs failed for temp root");

        assert!(dirs.config_dir.exists(), "config_dir was not created");
        assert!(dirs.data_dir.exists(), "data_dir was not created");
        assert!(dirs.log_dir.exists(), "log_dir was not created");
    }

    #[test]
    fn test_data_path() {
        let dirs = PlatformDirs::resolve_with_root(Path::new("/srv"));
        assert_eq!(dirs.data_path(Path::new(".")), dirs.data_dir.join("."));
        let absolute = std::env::temp_dir();
        assert_eq!(dirs.data_path(&absolute), absolute);
    }
}
