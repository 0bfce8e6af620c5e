use aether_render::{MaterialHandle, ShaderHandle, ShaderParams};

use crate::settings::ScatteringSettings;

/// Immutable bundle of what the pass needs to shade: program, material and
/// the parameters forwarded to it.
///
/// Built once per pipeline build and shared read-only with the pass.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectDescriptor {
    shader: Option<ShaderHandle>,
    material: Option<MaterialHandle>,
    parameters: ShaderParams,
}

impl EffectDescriptor {
    pub fn new(
        shader: Option<ShaderHandle>,
        material: Option<MaterialHandle>,
        parameters: ShaderParams,
    ) -> Self {
        Self {
            shader,
            material,
            parameters,
        }
    }

    pub fn from_settings(settings: &ScatteringSettings) -> Self {
        let parameters = ShaderParams::new()
            .with("planet_radius", settings.planet_radius)
            .with("atmospheric_height", settings.atmospheric_height)
            .with("atmospheric_density", settings.atmospheric_density);
        Self::new(settings.shader, settings.material, parameters)
    }

    pub fn shader(&self) -> Option<ShaderHandle> {
        self.shader
    }

    pub fn material(&self) -> Option<MaterialHandle> {
        self.material
    }

    pub fn parameters(&self) -> &ShaderParams {
        &self.parameters
    }

    /// Both the shader and the material are set.
    pub fn is_valid(&self) -> bool {
        self.shader.is_some() && self.material.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_requires_both_handles() {
        let shader = Some(ShaderHandle::from_raw(0));
        let material = Some(MaterialHandle::from_raw(1));
        assert!(EffectDescriptor::new(shader, material, ShaderParams::new()).is_valid());
        assert!(!EffectDescriptor::new(shader, None, ShaderParams::new()).is_valid());
        assert!(!EffectDescriptor::new(None, material, ShaderParams::new()).is_valid());
        assert!(!EffectDescriptor::new(None, None, ShaderParams::new()).is_valid());
    }

    #[test]
    fn test_parameters_forwarded_in_order() {
        let settings = ScatteringSettings {
            planet_radius: 6_371_000.0,
            atmospheric_height: 100_000.0,
            atmospheric_density: 2.5,
            ..ScatteringSettings::default()
        };
        let descriptor = EffectDescriptor::from_settings(&settings);
        let params: Vec<_> = descriptor.parameters().iter().collect();
        assert_eq!(
            params,
            [
                ("planet_radius", 6_371_000.0),
                ("atmospheric_height", 100_000.0),
                ("atmospheric_density", 2.5),
            ]
        );
    }
}
