//! Stand-in for the host's camera color buffer.

use aether_config::RenderConfig;
use aether_render::{
    BackendError, CameraTarget, RenderBackend, TextureDesc, WgpuBackend, camera_color_format,
};

/// Camera description for the configured size, format and MSAA count.
pub fn camera_desc(render: &RenderConfig) -> TextureDesc {
    TextureDesc::new(render.width, render.height, camera_color_format(render.hdr))
        .with_samples(render.sample_count())
}

/// Create the camera texture and hand it to `backend` as an imported target.
///
/// Descriptions wgpu would reject (zero size, over the device limit) are
/// returned as errors instead of reaching the device.
pub fn create(
    backend: &mut WgpuBackend,
    render: &RenderConfig,
) -> Result<CameraTarget, BackendError> {
    let desc = camera_desc(render);
    check_limits(&desc, backend.device().limits().max_texture_dimension_2d)?;
    let usage = if desc.is_multisampled() {
        wgpu::TextureUsages::RENDER_ATTACHMENT
    } else {
        wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST
    };
    let texture = backend.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("camera-color"),
        size: wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: desc.sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: desc.format,
        usage,
        view_formats: &[],
    });
    let color = backend.import_texture(texture);
    Ok(CameraTarget { color, desc })
}

fn check_limits(desc: &TextureDesc, max_dimension: u32) -> Result<(), BackendError> {
    desc.validate()?;
    if desc.width > max_dimension || desc.height > max_dimension {
        return Err(BackendError::InvalidDescriptor {
            reason: format!(
                "camera {}x{} exceeds the device limit of {max_dimension}",
                desc.width, desc.height
            ),
        });
    }
    Ok(())
}

pub fn destroy(backend: &mut WgpuBackend, camera: CameraTarget) {
    backend.destroy_texture(camera.color);
}

/// Clear the camera to a sky color, as the host's skybox stage would.
pub fn draw_sky(
    backend: &WgpuBackend,
    camera: &CameraTarget,
    frame: u32,
) -> Result<(), BackendError> {
    let texture = backend
        .texture(camera.color)
        .ok_or(BackendError::UnknownTexture(camera.color))?;
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder = backend
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sky"),
        });
    {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("sky-clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(sky_color(frame)),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }
    backend.queue().submit(std::iter::once(encoder.finish()));
    Ok(())
}

/// Slowly brightening sky so consecutive frames differ.
fn sky_color(frame: u32) -> wgpu::Color {
    let t = f64::from(frame % 60) / 60.0;
    wgpu::Color {
        r: 0.05 + 0.1 * t,
        g: 0.1 + 0.2 * t,
        b: 0.3 + 0.4 * t,
        a: 1.0,
    }
}
