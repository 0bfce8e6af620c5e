//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use aether_render::InsertionPoint;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

const SUPPORTED_SAMPLE_COUNTS: [u32; 4] = [1, 2, 4, 8];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Camera target and frame loop settings.
    pub render: RenderConfig,
    /// Atmospheric scattering effect settings.
    pub scattering: ScatteringConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Camera target width in pixels.
    pub width: u32,
    /// Camera target height in pixels.
    pub height: u32,
    /// MSAA sample count of the camera target (1, 2, 4, 8).
    pub msaa_samples: u32,
    /// Use a 16-bit float camera target instead of 8-bit sRGB.
    pub hdr: bool,
    /// Number of frames the headless driver renders.
    pub frames: u32,
    /// Upper bound on transient texture memory, in MiB. 0 = unlimited.
    pub transient_budget_mb: u64,
    /// Free transient textures idle for this many frames are destroyed.
    pub transient_idle_frames: u32,
}

/// Atmospheric scattering configuration.
///
/// Assets are referenced by name and resolved at pipeline build time. A name
/// that is `None` or does not resolve disables the effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScatteringConfig {
    pub shader: Option<String>,
    pub material: Option<String>,
    pub insertion_point: InsertionPoint,
    /// Planet radius in meters.
    pub planet_radius: f32,
    /// Atmosphere thickness above the surface in meters.
    pub atmospheric_height: f32,
    pub atmospheric_density: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write the JSON log file even in release builds.
    pub file_logging: bool,
}

// --- Default implementations ---

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            msaa_samples: 4,
            hdr: true,
            frames: 3,
            transient_budget_mb: 512,
            transient_idle_frames: 4,
        }
    }
}

impl Default for ScatteringConfig {
    fn default() -> Self {
        Self {
            shader: Some("single_scattering".to_string()),
            material: Some("single_scattering".to_string()),
            insertion_point: InsertionPoint::AfterRenderingSkybox,
            planet_radius: 64_000_000.0,
            atmospheric_height: 8_000_000.0,
            atmospheric_density: 1.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            file_logging: false,
        }
    }
}

impl RenderConfig {
    /// Configured sample count, or 1 if the value is not one wgpu accepts.
    pub fn sample_count(&self) -> u32 {
        if SUPPORTED_SAMPLE_COUNTS.contains(&self.msaa_samples) {
            self.msaa_samples
        } else {
            log::warn!(
                "Unsupported msaa_samples {}, falling back to 1",
                self.msaa_samples
            );
            1
        }
    }

    /// Transient memory budget in bytes, `None` when unlimited.
    pub fn transient_budget_bytes(&self) -> Option<u64> {
        (self.transient_budget_mb > 0)
            .then(|| self.transient_budget_mb.saturating_mul(1024 * 1024))
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Resolve the config directory: an explicit override, else the platform
    /// config dir joined with `aether`.
    pub fn config_dir(override_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
        match override_dir {
            Some(dir) => Ok(dir.to_path_buf()),
            None => dirs::config_dir()
                .map(|dir| dir.join("aether"))
                .ok_or(ConfigError::NoConfigDir),
        }
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
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
        let new_config = Self::read(&config_dir.join(CONFIG_FILE_NAME))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        ron::from_str(&contents).map_err(ConfigError::ParseError)
    }
}
