//! Headless driver that renders a few frames with atmospheric scattering.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p aether-demo -- --frames 10 --msaa 1`.
//! Edits to `config.ron` are picked up between frames.

mod camera;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use aether_config::{CliArgs, Config};
use aether_render::{
    BackendError, PassError, RenderContextError, Renderer, WgpuBackend, init_gpu_blocking,
};
use aether_scatter::{
    AssetRegistry, AtmosphericScatteringFeature, SINGLE_SCATTERING_SHADER_NAME,
    SINGLE_SCATTERING_SHADER_SOURCE, ScatteringSettings,
};
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Gpu(#[from] RenderContextError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Pass(#[from] PassError),
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = Config::config_dir(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("{e}, using the current directory");
        PathBuf::from(".")
    });

    // Keep the on-disk config separate so reloads compare like with like.
    let file_config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    let mut config = file_config.clone();
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    aether_log::init_logging(
        Some(&log_dir),
        cfg!(debug_assertions) || config.debug.file_logging,
        Some(&config),
    );

    match run(&args, &config_dir, file_config, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("aether-demo failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    args: &CliArgs,
    config_dir: &Path,
    mut file_config: Config,
    mut config: Config,
) -> Result<(), DemoError> {
    let gpu = init_gpu_blocking()?;
    let mut backend = WgpuBackend::new(gpu.device, gpu.queue);
    if let Some(budget) = config.render.transient_budget_bytes() {
        backend = backend.with_budget(budget);
    }

    let shader =
        backend.create_shader(SINGLE_SCATTERING_SHADER_NAME, SINGLE_SCATTERING_SHADER_SOURCE);
    let material = backend.create_material(SINGLE_SCATTERING_SHADER_NAME, shader)?;
    let mut assets = AssetRegistry::new();
    assets.register_shader(SINGLE_SCATTERING_SHADER_NAME, shader);
    assets.register_material(SINGLE_SCATTERING_SHADER_NAME, material);

    let mut camera = camera::create(&mut backend, &config.render)?;
    let mut renderer = Renderer::new();
    renderer.add_feature(scattering_feature(&config, &assets));
    info!(
        width = camera.desc.width,
        height = camera.desc.height,
        samples = camera.desc.sample_count,
        frames = config.render.frames,
        "Rendering"
    );

    let mut frame = 0;
    while frame < config.render.frames {
        camera::draw_sky(&backend, &camera, frame)?;
        let stats = renderer.render_frame(&mut backend, camera)?;
        let trimmed = renderer
            .pool_mut()
            .trim(&mut backend, config.render.transient_idle_frames);
        info!(
            frame = stats.frame_index,
            passes = stats.passes,
            commands = stats.submitted_commands,
            leaked = stats.leaked_transients,
            trimmed,
            bytes_in_use = backend.bytes_in_use(),
            "Frame rendered"
        );
        if stats.leaked_transients > 0 {
            warn!(
                "{} transient texture(s) were not released in frame {}",
                stats.leaked_transients, stats.frame_index
            );
        }

        match file_config.reload(config_dir) {
            Ok(Some(new_file_config)) => {
                let mut new_config = new_file_config.clone();
                new_config.apply_cli_overrides(args);
                if new_config.render != config.render {
                    match camera::create(&mut backend, &new_config.render) {
                        Ok(next) => {
                            camera::destroy(&mut backend, camera);
                            camera = next;
                        }
                        Err(e) => {
                            warn!("Render settings rejected, keeping the current camera: {e}");
                            new_config.render = config.render.clone();
                        }
                    }
                }
                if new_config.scattering != config.scattering {
                    renderer.clear_features();
                    renderer.add_feature(scattering_feature(&new_config, &assets));
                }
                file_config = new_file_config;
                config = new_config;
            }
            Ok(None) => {}
            Err(e) => warn!("Config reload failed, keeping current settings: {e}"),
        }
        frame += 1;
    }

    renderer.pool_mut().clear(&mut backend);
    camera::destroy(&mut backend, camera);
    info!("Done");
    Ok(())
}

fn scattering_feature(
    config: &Config,
    assets: &AssetRegistry,
) -> Box<AtmosphericScatteringFeature> {
    Box::new(AtmosphericScatteringFeature::new(
        ScatteringSettings::from_config(&config.scattering, assets),
    ))
}
