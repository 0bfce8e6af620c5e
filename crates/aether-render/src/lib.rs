//! Backend-neutral post-processing infrastructure: typed GPU handles, command
//! recording, a frame-scoped transient texture pool, and the pass scheduler.

pub mod backend;
pub mod command;
pub mod error;
pub mod gpu;
pub mod handle;
pub mod renderer;
pub mod stage;
pub mod texture;
pub mod transient;

pub use backend::{BackendError, RecordedTexture, RecordingBackend, RenderBackend, WgpuBackend};
pub use command::{Command, CommandBuffer, CommandScope, ShaderParams};
pub use error::PassError;
pub use gpu::{GpuContext, RenderContextError, camera_color_format, init_gpu_blocking};
pub use handle::{Handle, MaterialHandle, ShaderHandle, TextureHandle};
pub use renderer::{
    CameraTarget, FrameContext, FrameStats, PassQueue, Renderer, RendererFeature, ScriptablePass,
};
pub use stage::InsertionPoint;
pub use texture::TextureDesc;
pub use transient::{PoolStats, TransientPool, TransientTexture};
