//! Command-line argument parsing for the section generator.

use std::path::PathBuf;

use clap::Parser;

use crate::{GenerationMode, NumberMode, OutputMode, SectionsConfig};

/// Section generator command-line arguments.
///
/// CLI values override settings loaded from `terrasect.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "terrasect", about = "Cut a terrain mesh into LOD sections")]
pub struct CliArgs {
    /// Derive the grid from a section count (`number`) or a section size (`size`).
    #[arg(long, value_parser = parse_generation_mode)]
    pub mode: Option<GenerationMode>,

    /// Sections along X.
    #[arg(long)]
    pub number_x: Option<u32>,

    /// Sections along Y.
    #[arg(long)]
    pub number_y: Option<u32>,

    /// Section size along X.
    #[arg(long)]
    pub size_x: Option<f32>,

    /// Section size along Y.
    #[arg(long)]
    pub size_y: Option<f32>,

    /// Parity of derived counts (automatic, even, odd).
    #[arg(long, value_parser = parse_number_mode)]
    pub number_mode: Option<NumberMode>,

    /// Run the limited dissolve before cutting.
    #[arg(long)]
    pub dissolve: Option<bool>,

    /// Dissolve angle limit in degrees.
    #[arg(long)]
    pub angle_limit_deg: Option<f32>,

    /// Generate LOD children.
    #[arg(long)]
    pub lod: Option<bool>,

    /// Number of LOD levels.
    #[arg(long)]
    pub lod_number: Option<u32>,

    /// First-level decimation ratio.
    #[arg(long)]
    pub lod_factor: Option<f32>,

    /// Write the boundary normal record.
    #[arg(long)]
    pub export_normals: Option<bool>,

    /// Decimal digits kept in normal keys.
    #[arg(long)]
    pub digits: Option<u32>,

    /// Directory the normal record is written under.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_generation_mode(s: &str) -> Result<GenerationMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "number" | "by-number" => Ok(GenerationMode::ByNumber),
        "size" | "by-size" => Ok(GenerationMode::BySize),
        other => Err(format!("unknown generation mode '{other}'")),
    }
}

fn parse_number_mode(s: &str) -> Result<NumberMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "automatic" | "auto" => Ok(NumberMode::Automatic),
        "even" => Ok(NumberMode::Even),
        "odd" => Ok(NumberMode::Odd),
        other => Err(format!("unknown number mode '{other}'")),
    }
}

impl SectionsConfig {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(mode) = args.mode {
            self.generation.mode = mode;
        }
        if let Some(x) = args.number_x {
            self.generation.number[0] = x;
        }
        if let Some(y) = args.number_y {
            self.generation.number[1] = y;
        }
        if let Some(x) = args.size_x {
            self.generation.size[0] = x;
        }
        if let Some(y) = args.size_y {
            self.generation.size[1] = y;
        }
        if let Some(mode) = args.number_mode {
            self.generation.number_mode = mode;
        }
        if let Some(enabled) = args.dissolve {
            self.dissolve.enabled = enabled;
        }
        if let Some(deg) = args.angle_limit_deg {
            self.dissolve.angle_limit = deg.to_radians();
        }
        if let Some(enabled) = args.lod {
            self.lod.enabled = enabled;
        }
        if let Some(n) = args.lod_number {
            self.lod.number = n;
        }
        if let Some(f) = args.lod_factor {
            self.lod.factor = f;
        }
        if let Some(export) = args.export_normals {
            self.output.mode = if export {
                OutputMode::SectionsAndNormals
            } else {
                OutputMode::Sections
            };
        }
        if let Some(d) = args.digits {
            self.output.digits = d;
        }
        if let Some(ref dir) = args.data_dir {
            self.output.data_dir = dir.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
