//! Generates LOD sections for a procedural terrain and replays the runtime
//! along a camera sweep.

mod demo;
mod platform;

use std::process::ExitCode;

use clap::Parser;
use terrasect_config::{CliArgs, ConfigError, SectionsConfig};
use terrasect_log::init_logging;
use terrasect_mesh::ReferenceKernel;
use terrasect_scene::{Scene, Selection};
use terrasect_sections::{
    Action, ExecuteOutcome, LodSections, RuntimeError, SectionsError, SectionsRuntime,
    SelectionError,
};
use tracing::{error, info};

use crate::demo::{DemoParams, build_scene, camera_path};
use crate::platform::PlatformDirs;

/// Camera height above the terrain during the sweep.
const CAMERA_ALTITUDE: f32 = 20.0;
const CAMERA_STEPS: usize = 24;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Sections(#[from] SectionsError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let dirs = match PlatformDirs::resolve_and_create() {
        Ok(dirs) => dirs,
        Err(e) => {
            eprintln!("Failed to initialize platform directories: {e}");
            return ExitCode::FAILURE;
        }
    };
    let config_dir = args.config.clone().unwrap_or_else(|| dirs.config_dir.clone());
    let mut config = match SectionsConfig::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config, using defaults: {e}");
            SectionsConfig::default()
        }
    };
    config.apply_cli_overrides(&args);
    config.output.data_dir = dirs.data_path(&config.output.data_dir);

    init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));
    info!("Config: {}", config_dir.display());
    info!("Records: {}", config.output.data_dir.display());

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: SectionsConfig) -> Result<(), AppError> {
    config.validate()?;
    let params = DemoParams::default();
    let mut scene = Scene::new();
    let terrain = build_scene(&mut scene, &params);

    let operator = LodSections::new(config);
    let source = operator.invoke(&scene, &Selection::single(terrain))?;
    let report = match operator.execute(&mut scene, &ReferenceKernel, source, Action::Update)? {
        ExecuteOutcome::Generated(report) => report,
        ExecuteOutcome::Cleared { removed } => {
            info!("Cleared {removed} objects");
            return Ok(());
        }
    };
    info!(
        "{} sections of {} x {}, {} LOD levels, {} particle clusters",
        report.sections.len(),
        report.size.x,
        report.size.y,
        report.lod_levels,
        report.particles
    );
    if let Some(path) = &report.record {
        info!("Normal record: {}", path.display());
    }

    let mut runtime = SectionsRuntime::new(&operator.config().output.data_dir);
    for camera in camera_path(params.extent, CAMERA_ALTITUDE, CAMERA_STEPS) {
        scene.update_lod_levels(camera);
        for (_, delta) in runtime.tick_all(&mut scene)? {
            if !delta.is_empty() {
                info!(
                    "Camera at {camera}: {} sections gained collision, {} lost it",
                    delta.activated.len(),
                    delta.deactivated.len()
                );
            }
        }
    }
    Ok(())
}
