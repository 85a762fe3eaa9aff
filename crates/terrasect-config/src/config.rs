//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the persisted configuration inside the config directory.
pub const CONFIG_FILE: &str = "terrasect.ron";

/// Top-level generator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SectionsConfig {
    /// How the grid is derived from the source footprint.
    pub generation: GenerationConfig,
    /// Limited-dissolve cleanup before cutting.
    pub dissolve: DissolveConfig,
    /// LOD chain settings.
    pub lod: LodConfig,
    /// What the generator writes out.
    pub output: OutputConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Whether the grid is given by cell count or by cell size.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum GenerationMode {
    /// Fixed number of sections per axis.
    #[default]
    ByNumber,
    /// Fixed section size; the count follows from the footprint.
    BySize,
}

/// Parity rounding applied to counts derived from a section size.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum NumberMode {
    /// Use the derived count as is.
    Automatic,
    /// Round up to an even count.
    #[default]
    Even,
    /// Round up to an odd count.
    Odd,
}

/// Grid generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Count or size driven grid.
    pub mode: GenerationMode,
    /// Sections along X and Y in [`GenerationMode::ByNumber`].
    pub number: [u32; 2],
    /// Section size along X and Y in [`GenerationMode::BySize`].
    pub size: [f32; 2],
    /// Parity rounding in [`GenerationMode::BySize`].
    pub number_mode: NumberMode,
}

/// Limited dissolve settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DissolveConfig {
    /// Dissolve flat regions of the base before cutting.
    pub enabled: bool,
    /// Maximum angle between faces considered flat, in radians.
    pub angle_limit: f32,
}

/// LOD chain settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Generate LOD children.
    pub enabled: bool,
    /// Number of levels, including the terminal placeholder.
    pub number: u32,
    /// Decimation ratio of the first level; level `i` uses `factor / (i + 1)`.
    pub factor: f32,
}

/// What the generator produces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputMode {
    /// Sections only.
    Sections,
    /// Sections plus the boundary normal record.
    #[default]
    SectionsAndNormals,
}

impl OutputMode {
    /// Returns `true` when a normal record is written.
    pub fn exports_normals(self) -> bool {
        matches!(self, OutputMode::SectionsAndNormals)
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Sections only, or sections plus normals.
    pub mode: OutputMode,
    /// Quantise normal keys to `digits` decimals instead of whole units.
    pub approximate: bool,
    /// Decimal digits kept when quantising normal keys.
    pub digits: u32,
    /// Directory under which the normal record directory is created.
    pub data_dir: PathBuf,
}

impl OutputConfig {
    /// Digits actually used for quantisation (0 unless approximating).
    pub fn effective_digits(&self) -> u32 {
        if self.approximate { self.digits } else { 0 }
    }
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: GenerationMode::ByNumber,
            number: [8, 8],
            size: [8.0, 8.0],
            number_mode: NumberMode::Even,
        }
    }
}

impl Default for DissolveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            angle_limit: 1.0_f32.to_radians(),
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            number: 4,
            factor: 0.25,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::SectionsAndNormals,
            approximate: true,
            digits: 2,
            data_dir: PathBuf::from("."),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Validation ---

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl SectionsConfig {
    /// Checks every option against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let generation = &self.generation;
        if generation.number.iter().any(|&n| n < 1) {
            return Err(invalid("generation.number", "must be at least 1"));
        }
        if generation.size.iter().any(|&s| !(s >= 1.0)) {
            return Err(invalid("generation.size", "must be at least 1.0"));
        }
        if !(0.0..=std::f32::consts::PI).contains(&self.dissolve.angle_limit) {
            return Err(invalid("dissolve.angle_limit", "must lie in 0..=pi radians"));
        }
        if !(1..=8).contains(&self.lod.number) {
            return Err(invalid("lod.number", "must lie in 1..=8"));
        }
        if !(self.lod.factor > 0.0 && self.lod.factor <= 1.0) {
            return Err(invalid("lod.factor", "must lie in (0, 1]"));
        }
        if self.output.digits > 15 {
            return Err(invalid("output.digits", "must lie in 0..=15"));
        }
        Ok(())
    }

    /// Returns `true` when LOD children will be generated.
    pub fn generates_lod(&self) -> bool {
        self.lod.enabled && self.lod.number > 1
    }
}

// --- Load / Save / Reload ---

impl SectionsConfig {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: SectionsConfig =
                ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = SectionsConfig::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `terrasect.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: SectionsConfig =
            ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
