//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Aether headless renderer command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "aether", about = "Headless atmospheric scattering renderer")]
pub struct CliArgs {
    /// Camera target width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Camera target height.
    #[arg(long)]
    pub height: Option<u32>,

    /// MSAA sample count of the camera target.
    #[arg(long)]
    pub msaa: Option<u32>,

    /// Number of frames to render.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Atmospheric density multiplier.
    #[arg(long)]
    pub density: Option<f32>,

    /// Run with the scattering material unset (the effect becomes a no-op).
    #[arg(long)]
    pub disable_material: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.render.width = w;
        }
        if let Some(h) = args.height {
            self.render.height = h;
        }
        if let Some(samples) = args.msaa {
            self.render.msaa_samples = samples;
        }
        if let Some(frames) = args.frames {
            self.render.frames = frames;
        }
        if let Some(density) = args.density {
            self.scattering.atmospheric_density = density;
        }
        if args.disable_material {
            self.scattering.material = None;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            width: Some(640),
            msaa: Some(1),
            density: Some(2.5),
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.render.width, 640);
        assert_eq!(config.render.msaa_samples, 1);
        assert_eq!(config.scattering.atmospheric_density, 2.5);
        // Non-overridden fields retain defaults
        assert_eq!(config.render.height, 1080);
        assert!(config.scattering.material.is_some());
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_disable_material_flag() {
        let args = CliArgs::parse_from(["aether", "--disable-material", "--frames", "1"]);
        let mut config = Config::default();
        config.apply_cli_overrides(&args);
        assert!(config.scattering.material.is_none());
        assert_eq!(config.render.frames, 1);
    }
}
