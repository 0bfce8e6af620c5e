//! Runtime settings for the scattering feature.

use aether_config::ScatteringConfig;
use aether_render::{InsertionPoint, MaterialHandle, ShaderHandle};
use rustc_hash::FxHashMap;
use tracing::warn;

/// Default planet radius in meters.
pub const DEFAULT_PLANET_RADIUS: f32 = 64_000_000.0;
/// Default atmosphere thickness in meters.
pub const DEFAULT_ATMOSPHERIC_HEIGHT: f32 = 8_000_000.0;
/// Default density multiplier.
pub const DEFAULT_ATMOSPHERIC_DENSITY: f32 = 1.0;

/// Resolved settings: handles instead of asset names.
///
/// The physical values are passed to the shader verbatim; nothing here checks
/// them for plausibility.
#[derive(Clone, Debug, PartialEq)]
pub struct ScatteringSettings {
    pub shader: Option<ShaderHandle>,
    pub material: Option<MaterialHandle>,
    pub insertion_point: InsertionPoint,
    pub planet_radius: f32,
    pub atmospheric_height: f32,
    pub atmospheric_density: f32,
}

impl Default for ScatteringSettings {
    fn default() -> Self {
        Self {
            shader: None,
            material: None,
            insertion_point: InsertionPoint::AfterRenderingSkybox,
            planet_radius: DEFAULT_PLANET_RADIUS,
            atmospheric_height: DEFAULT_ATMOSPHERIC_HEIGHT,
            atmospheric_density: DEFAULT_ATMOSPHERIC_DENSITY,
        }
    }
}

impl ScatteringSettings {
    /// Build settings from config, looking asset names up in `assets`.
    ///
    /// A configured name that does not resolve leaves the handle unset, which
    /// disables the effect instead of failing.
    pub fn from_config(config: &ScatteringConfig, assets: &impl AssetResolver) -> Self {
        let shader = config.shader.as_deref().and_then(|name| {
            let handle = assets.shader(name);
            if handle.is_none() {
                warn!(shader = name, "scattering shader not found");
            }
            handle
        });
        let material = config.material.as_deref().and_then(|name| {
            let handle = assets.material(name);
            if handle.is_none() {
                warn!(material = name, "scattering material not found");
            }
            handle
        });

        Self {
            shader,
            material,
            insertion_point: config.insertion_point,
            planet_radius: config.planet_radius,
            atmospheric_height: config.atmospheric_height,
            atmospheric_density: config.atmospheric_density,
        }
    }
}

/// Name to handle lookup supplied by whoever loads assets.
pub trait AssetResolver {
    fn shader(&self, name: &str) -> Option<ShaderHandle>;
    fn material(&self, name: &str) -> Option<MaterialHandle>;
}

/// In-memory [`AssetResolver`].
#[derive(Debug, Default)]
pub struct AssetRegistry {
    shaders: FxHashMap<String, ShaderHandle>,
    materials: FxHashMap<String, MaterialHandle>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_shader(&mut self, name: impl Into<String>, handle: ShaderHandle) {
        self.shaders.insert(name.into(), handle);
    }

    pub fn register_material(&mut self, name: impl Into<String>, handle: MaterialHandle) {
        self.materials.insert(name.into(), handle);
    }
}

impl AssetResolver for AssetRegistry {
    fn shader(&self, name: &str) -> Option<ShaderHandle> {
        self.shaders.get(name).copied()
    }

    fn material(&self, name: &str) -> Option<MaterialHandle> {
        self.materials.get(name).copied()
    }
}
