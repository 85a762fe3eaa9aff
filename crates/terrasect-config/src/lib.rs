//! Configuration for the section generator.
//!
//! Every option of the generator persists to disk as a RON file. Supports CLI
//! overrides via clap, hot-reload detection, validation of option ranges, and
//! forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE, DebugConfig, DissolveConfig, GenerationConfig, GenerationMode, LodConfig,
    NumberMode, OutputConfig, OutputMode, SectionsConfig,
};
pub use error::ConfigError;
