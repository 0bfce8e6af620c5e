//! Texture descriptions shared by the scheduler, passes, and backends.

use crate::backend::BackendError;

/// Sample counts accepted for color targets.
const VALID_SAMPLE_COUNTS: [u32; 4] = [1, 2, 4, 8];

/// Size, format, and sample count of a 2D color texture.
///
/// The host describes the camera color buffer with one of these every frame;
/// passes derive their scratch descriptions from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
}

impl TextureDesc {
    /// A single-sampled description.
    pub const fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            sample_count: 1,
        }
    }

    /// Same description with a different sample count.
    pub const fn with_samples(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Copy of this description with multisampling disabled.
    ///
    /// Compositing buffers are sampled, never resolved, so they are always
    /// single-sample regardless of the camera's MSAA setting.
    pub const fn single_sampled(self) -> Self {
        self.with_samples(1)
    }

    pub const fn is_multisampled(&self) -> bool {
        self.sample_count > 1
    }

    /// Estimated GPU memory footprint in bytes.
    pub fn byte_size(&self) -> u64 {
        let bpp = u64::from(self.format.block_copy_size(None).unwrap_or(4));
        u64::from(self.width) * u64::from(self.height) * bpp * u64::from(self.sample_count.max(1))
    }

    /// Reject descriptions no backend can allocate.
    pub fn validate(&self) -> Result<(), BackendError> {
        if self.width == 0 || self.height == 0 {
            return Err(BackendError::InvalidDescriptor {
                reason: format!("zero dimensions {}x{}", self.width, self.height),
            });
        }
        if !VALID_SAMPLE_COUNTS.contains(&self.sample_count) {
            return Err(BackendError::InvalidDescriptor {
                reason: format!("unsupported sample count {}", self.sample_count),
            });
        }
        Ok(())
    }

    pub(crate) fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HDR: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    #[test]
    fn test_single_sampled_forces_one_sample() {
        for samples in [1, 2, 4, 8] {
            let desc = TextureDesc::new(1920, 1080, HDR).with_samples(samples);
            let scratch = desc.single_sampled();
            assert_eq!(scratch.sample_count, 1);
            assert_eq!(scratch.width, 1920);
            assert_eq!(scratch.height, 1080);
            assert_eq!(scratch.format, HDR);
        }
    }

    #[test]
    fn test_byte_size_accounts_for_samples() {
        let desc = TextureDesc::new(4, 4, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(desc.byte_size(), 64);
        assert_eq!(desc.with_samples(4).byte_size(), 256);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let desc = TextureDesc::new(0, 720, HDR);
        assert!(matches!(
            desc.validate(),
            Err(BackendError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_odd_sample_count_rejected() {
        let desc = TextureDesc::new(64, 64, HDR).with_samples(3);
        assert!(desc.validate().is_err());
        assert!(desc.with_samples(4).validate().is_ok());
    }
}
