use std::sync::Arc;

use aether_render::{CameraTarget, PassQueue, RendererFeature};
use tracing::{info, warn};

use crate::descriptor::EffectDescriptor;
use crate::pass::{PROFILER_TAG, ScatteringPass};
use crate::settings::ScatteringSettings;

/// Registers the scattering pass with the renderer.
///
/// Without a shader no pass is built at all, so the scheduler never sees it.
/// With a shader but no material the pass is built and runs as a no-op.
#[derive(Debug)]
pub struct AtmosphericScatteringFeature {
    settings: ScatteringSettings,
    pass: Option<ScatteringPass>,
}

impl AtmosphericScatteringFeature {
    pub fn new(settings: ScatteringSettings) -> Self {
        Self {
            settings,
            pass: None,
        }
    }

    pub fn settings(&self) -> &ScatteringSettings {
        &self.settings
    }

    /// Replace the settings. Takes effect on the next `create`.
    pub fn set_settings(&mut self, settings: ScatteringSettings) {
        self.settings = settings;
    }

    pub fn pass(&self) -> Option<&ScatteringPass> {
        self.pass.as_ref()
    }

    /// A pass was built and will be enqueued each frame.
    pub fn is_active(&self) -> bool {
        self.pass.is_some()
    }
}

impl RendererFeature for AtmosphericScatteringFeature {
    fn name(&self) -> &str {
        PROFILER_TAG
    }

    fn create(&mut self) {
        if self.settings.shader.is_none() {
            warn!("atmospheric scattering shader unset; feature disabled");
            self.pass = None;
            return;
        }

        let descriptor = Arc::new(EffectDescriptor::from_settings(&self.settings));
        if !descriptor.is_valid() {
            warn!("atmospheric scattering material unset; pass will not modify the frame");
        }
        info!(
            insertion_point = self.settings.insertion_point.name(),
            planet_radius = self.settings.planet_radius,
            atmospheric_height = self.settings.atmospheric_height,
            atmospheric_density = self.settings.atmospheric_density,
            "atmospheric scattering pass created"
        );
        self.pass = Some(ScatteringPass::new(descriptor, self.settings.insertion_point));
    }

    fn add_render_passes<'a>(&'a mut self, queue: &mut PassQueue<'a>, camera: &CameraTarget) {
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        pass.setup(camera.color);
        queue.enqueue(pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_render::{
        InsertionPoint, MaterialHandle, RecordingBackend, Renderer, ScriptablePass, ShaderHandle,
        TextureDesc, TextureHandle,
    };

    fn settings(shader: bool, material: bool) -> ScatteringSettings {
        ScatteringSettings {
            shader: shader.then(|| ShaderHandle::from_raw(1)),
            material: material.then(|| MaterialHandle::from_raw(2)),
            ..ScatteringSettings::default()
        }
    }

    fn camera() -> CameraTarget {
        CameraTarget {
            color: TextureHandle::from_raw(0),
            desc: TextureDesc::new(1920, 1080, wgpu::TextureFormat::Rgba16Float).with_samples(4),
        }
    }

    #[test]
    fn test_unset_shader_builds_no_pass() {
        let mut feature = AtmosphericScatteringFeature::new(settings(false, true));
        feature.create();
        assert!(!feature.is_active());
        assert!(feature.pass().is_none());

        let mut queue = PassQueue::new();
        feature.add_render_passes(&mut queue, &camera());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_missing_material_builds_inert_pass() {
        let mut feature = AtmosphericScatteringFeature::new(settings(true, false));
        feature.create();
        assert!(feature.is_active());
        assert!(feature.pass().is_some_and(|p| !p.descriptor().is_valid()));
    }

    #[test]
    fn test_enqueue_records_target() {
        let mut feature = AtmosphericScatteringFeature::new(settings(true, true));
        feature.create();

        let camera = camera();
        {
            let mut queue = PassQueue::new();
            feature.add_render_passes(&mut queue, &camera);
            assert_eq!(queue.names(), ["Atmospheric Scattering"]);
        }
        let pass = feature.pass().unwrap();
        assert_eq!(pass.target(), Some(camera.color));
        assert!(pass.is_enabled());
        assert_eq!(pass.insertion_point(), InsertionPoint::AfterRenderingSkybox);
    }

    #[test]
    fn test_create_applies_new_settings() {
        let mut feature = AtmosphericScatteringFeature::new(settings(true, true));
        feature.create();

        feature.set_settings(ScatteringSettings {
            insertion_point: InsertionPoint::BeforeRenderingPostProcessing,
            atmospheric_density: 3.0,
            ..settings(true, true)
        });
        feature.create();
        let pass = feature.pass().unwrap();
        assert_eq!(
            pass.insertion_point(),
            InsertionPoint::BeforeRenderingPostProcessing
        );
        assert_eq!(
            pass.descriptor().parameters().get("atmospheric_density"),
            Some(3.0)
        );

        feature.set_settings(settings(false, true));
        feature.create();
        assert!(!feature.is_active());
    }

    #[test]
    fn test_renderer_drives_full_frame() {
        let mut backend = RecordingBackend::new();
        let material = backend.create_material();
        let desc = TextureDesc::new(1920, 1080, wgpu::TextureFormat::Rgba16Float).with_samples(4);
        let camera = CameraTarget {
            color: backend.import_texture("camera", desc),
            desc,
        };

        let mut renderer = Renderer::new();
        renderer.add_feature(Box::new(AtmosphericScatteringFeature::new(
            ScatteringSettings {
                material: Some(material),
                ..settings(true, false)
            },
        )));

        let stats = renderer.render_frame(&mut backend, camera).unwrap();
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.submitted_commands, 2);
        assert_eq!(stats.leaked_transients, 0);
        assert_eq!(renderer.pool().stats().outstanding, 0);
        assert_eq!(backend.created_count(), 1);
    }

    #[test]
    fn test_renderer_skips_unset_shader() {
        let mut backend = RecordingBackend::new();
        let desc = TextureDesc::new(64, 64, wgpu::TextureFormat::Rgba16Float);
        let camera = CameraTarget {
            color: backend.import_texture("camera", desc),
            desc,
        };

        let feature = AtmosphericScatteringFeature::new(settings(false, true));
        let mut renderer = Renderer::new();
        renderer.add_feature(Box::new(feature));
        let stats = renderer.render_frame(&mut backend, camera).unwrap();
        assert_eq!(stats.passes, 0);
        assert!(backend.submissions().is_empty());
    }
}
