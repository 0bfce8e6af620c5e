//! The seam between frame logic and a concrete graphics API.
//!
//! Passes and the scheduler only ever talk to [`RenderBackend`]; the wgpu
//! implementation lives in [`WgpuBackend`] and a deterministic, GPU-free one
//! in [`RecordingBackend`].

mod recording;
mod wgpu_backend;

pub use recording::{RecordedTexture, RecordingBackend};
pub use wgpu_backend::WgpuBackend;

use crate::command::CommandBuffer;
use crate::handle::{MaterialHandle, ShaderHandle, TextureHandle};
use crate::texture::TextureDesc;

/// Errors reported by a backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Allocation would exceed the backend's memory budget.
    #[error("out of GPU memory: requested {requested} bytes with {available} of {budget} available")]
    OutOfMemory {
        requested: u64,
        available: u64,
        budget: u64,
    },

    /// The texture description cannot be allocated.
    #[error("invalid texture description: {reason}")]
    InvalidDescriptor { reason: String },

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureHandle),

    #[error("unknown shader {0:?}")]
    UnknownShader(ShaderHandle),

    #[error("unknown material {0:?}")]
    UnknownMaterial(MaterialHandle),

    /// The command cannot be expressed between these two textures.
    #[error("unsupported blit: {reason}")]
    UnsupportedBlit { reason: String },
}

/// Resource allocation and command execution for one device.
pub trait RenderBackend {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Allocate a color texture usable as copy source/destination, sampled
    /// input, and render attachment.
    fn create_texture(&mut self, label: &str, desc: &TextureDesc)
    -> Result<TextureHandle, BackendError>;

    /// Free a texture. Unknown handles are ignored.
    fn destroy_texture(&mut self, handle: TextureHandle);

    /// Description of a live texture.
    fn texture_desc(&self, handle: TextureHandle) -> Option<TextureDesc>;

    /// Replay `commands` in order on the device queue.
    fn submit(&mut self, commands: CommandBuffer) -> Result<(), BackendError>;
}

/// Check an allocation against a byte budget.
pub(crate) fn check_budget(
    desc: &TextureDesc,
    in_use: u64,
    budget: Option<u64>,
) -> Result<(), BackendError> {
    let Some(budget) = budget else {
        return Ok(());
    };
    let requested = desc.byte_size();
    let available = budget.saturating_sub(in_use);
    if requested > available {
        return Err(BackendError::OutOfMemory {
            requested,
            available,
            budget,
        });
    }
    Ok(())
}
