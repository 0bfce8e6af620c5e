//! Built-in single-scattering shader.
//!
//! Follows the full-screen blit contract of `aether_render::WgpuBackend`; its
//! uniform block matches the parameter order of
//! [`EffectDescriptor::from_settings`](crate::EffectDescriptor::from_settings).

/// Asset name the built-in shader is registered under.
pub const SINGLE_SCATTERING_SHADER_NAME: &str = "single_scattering";

/// WGSL source for the built-in shader.
pub const SINGLE_SCATTERING_SHADER_SOURCE: &str = include_str!("single_scattering.wgsl");
