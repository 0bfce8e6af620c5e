//! Full-screen atmospheric scattering as an injectable post-processing pass.
//!
//! [`AtmosphericScatteringFeature`] validates [`ScatteringSettings`] once per
//! pipeline build and owns a [`ScatteringPass`], which copies the camera color
//! buffer into a single-sampled scratch texture and shades it back through the
//! scattering material every frame.

pub mod descriptor;
pub mod feature;
pub mod pass;
pub mod settings;
pub mod shader;

pub use descriptor::EffectDescriptor;
pub use feature::AtmosphericScatteringFeature;
pub use pass::{PROFILER_TAG, PassPhase, SCRATCH_NAME, ScatteringPass};
pub use settings::{AssetRegistry, AssetResolver, ScatteringSettings};
pub use shader::{SINGLE_SCATTERING_SHADER_NAME, SINGLE_SCATTERING_SHADER_SOURCE};
