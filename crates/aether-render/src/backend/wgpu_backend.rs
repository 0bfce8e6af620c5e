//! wgpu implementation of [`RenderBackend`].
//!
//! Shaders follow a single full-screen contract:
//!
//! - vertex entry `vs_fullscreen` (no vertex buffers, 3 vertices)
//! - fragment entry `fs_main` for pass 0, `fs_pass{n}` for pass `n`
//! - `@group(0) @binding(0)` a uniform block of `vec4<f32>` rows holding the
//!   blit's [`ShaderParams`](crate::ShaderParams) in insertion order
//! - `@group(1) @binding(0)` the source `texture_2d<f32>`
//! - `@group(1) @binding(1)` a non-filtering sampler

use log::{debug, info};
use rustc_hash::FxHashMap;
use wgpu::util::DeviceExt;

use super::{BackendError, RenderBackend, check_budget};
use crate::command::{Command, CommandBuffer, ShaderParams};
use crate::handle::{HandleAllocator, MaterialHandle, ShaderHandle, TextureHandle};
use crate::texture::TextureDesc;

struct GpuTexture {
    desc: TextureDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    imported: bool,
}

struct Material {
    label: String,
    shader: ShaderHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    material: MaterialHandle,
    pass_index: u32,
    format: wgpu::TextureFormat,
    sample_count: u32,
}

/// Render backend driving a wgpu device and queue.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    handles: HandleAllocator,
    textures: FxHashMap<TextureHandle, GpuTexture>,
    shaders: FxHashMap<ShaderHandle, wgpu::ShaderModule>,
    materials: FxHashMap<MaterialHandle, Material>,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
    params_bgl: wgpu::BindGroupLayout,
    texture_bgl: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    budget: Option<u64>,
    in_use: u64,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let params_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit-params-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(16),
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit-texture-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit-layout"),
            bind_group_layouts: &[&params_bgl, &texture_bgl],
            immediate_size: 0,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blit-sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            handles: HandleAllocator::default(),
            textures: FxHashMap::default(),
            shaders: FxHashMap::default(),
            materials: FxHashMap::default(),
            pipelines: FxHashMap::default(),
            params_bgl,
            texture_bgl,
            layout,
            sampler,
            budget: None,
            in_use: 0,
        }
    }

    /// Cap the bytes of textures created through [`RenderBackend::create_texture`].
    pub fn with_budget(mut self, bytes: u64) -> Self {
        self.budget = Some(bytes);
        self
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn bytes_in_use(&self) -> u64 {
        self.in_use
    }

    /// Compile a WGSL module following the full-screen contract.
    pub fn create_shader(&mut self, name: &str, source: &str) -> ShaderHandle {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let handle = self.handles.next();
        self.shaders.insert(handle, module);
        info!("Loaded shader '{}' as {:?}", name, handle);
        handle
    }

    /// Create a material instance of `shader`.
    pub fn create_material(
        &mut self,
        label: &str,
        shader: ShaderHandle,
    ) -> Result<MaterialHandle, BackendError> {
        if !self.shaders.contains_key(&shader) {
            return Err(BackendError::UnknownShader(shader));
        }
        let handle = self.handles.next();
        self.materials.insert(
            handle,
            Material {
                label: label.to_string(),
                shader,
            },
        );
        Ok(handle)
    }

    /// Wrap a caller-owned texture. It must have been created with
    /// `COPY_SRC | COPY_DST | TEXTURE_BINDING | RENDER_ATTACHMENT` usage.
    /// `destroy_texture` only forgets imported textures; it never frees them.
    pub fn import_texture(&mut self, texture: wgpu::Texture) -> TextureHandle {
        let desc = TextureDesc::new(texture.width(), texture.height(), texture.format())
            .with_samples(texture.sample_count());
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let handle = self.handles.next();
        self.textures.insert(
            handle,
            GpuTexture {
                desc,
                texture,
                view,
                imported: true,
            },
        );
        handle
    }

    /// The underlying wgpu texture, e.g. for readback.
    pub fn texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        self.textures.get(&handle).map(|t| &t.texture)
    }

    /// Compile pipelines for every blit in `commands` that has none cached.
    fn prepare_pipelines(&mut self, commands: &CommandBuffer) -> Result<(), BackendError> {
        for command in commands.commands() {
            let Command::Blit {
                destination,
                material,
                pass_index,
                ..
            } = command
            else {
                continue;
            };
            let desc = self.require(*destination)?.desc;
            let key = PipelineKey {
                material: *material,
                pass_index: *pass_index,
                format: desc.format,
                sample_count: desc.sample_count,
            };
            if self.pipelines.contains_key(&key) {
                continue;
            }
            let mat = self
                .materials
                .get(material)
                .ok_or(BackendError::UnknownMaterial(*material))?;
            let module = self
                .shaders
                .get(&mat.shader)
                .ok_or(BackendError::UnknownShader(mat.shader))?;
            let entry = fragment_entry(*pass_index);
            debug!(
                "Compiling pipeline for material '{}' pass {} ({:?}, {}x)",
                mat.label, pass_index, desc.format, desc.sample_count
            );
            let pipeline = create_fullscreen_pipeline(
                &self.device,
                module,
                &self.layout,
                &entry,
                desc.format,
                desc.sample_count,
                &mat.label,
            );
            self.pipelines.insert(key, pipeline);
        }
        Ok(())
    }

    fn require(&self, handle: TextureHandle) -> Result<&GpuTexture, BackendError> {
        self.textures
            .get(&handle)
            .ok_or(BackendError::UnknownTexture(handle))
    }

    fn encode_copy(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: TextureHandle,
        destination: TextureHandle,
    ) -> Result<(), BackendError> {
        let src = self.require(source)?;
        let dst = self.require(destination)?;
        if src.desc.format != dst.desc.format
            || (src.desc.width, src.desc.height) != (dst.desc.width, dst.desc.height)
        {
            return Err(BackendError::UnsupportedBlit {
                reason: format!("copy {:?} -> {:?}", src.desc, dst.desc),
            });
        }

        if !src.desc.is_multisampled() && !dst.desc.is_multisampled() {
            encoder.copy_texture_to_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &src.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyTextureInfo {
                    texture: &dst.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                src.desc.extent(),
            );
            return Ok(());
        }

        if !src.desc.is_multisampled() || dst.desc.is_multisampled() {
            return Err(BackendError::UnsupportedBlit {
                reason: format!(
                    "cannot copy {}x samples into {}x samples",
                    src.desc.sample_count, dst.desc.sample_count
                ),
            });
        }

        // Empty pass whose only effect is the resolve at its end.
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("resolve"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &src.view,
                resolve_target: Some(&dst.view),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        Ok(())
    }

    fn encode_blit(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: TextureHandle,
        destination: TextureHandle,
        key: PipelineKey,
        params: &ShaderParams,
    ) -> Result<(), BackendError> {
        if source == destination {
            return Err(BackendError::UnsupportedBlit {
                reason: "source and destination alias".to_string(),
            });
        }
        let src = self.require(source)?;
        let dst = self.require(destination)?;
        if src.desc.is_multisampled() {
            return Err(BackendError::UnsupportedBlit {
                reason: "multisampled textures cannot be sampled".to_string(),
            });
        }
        let pipeline = self
            .pipelines
            .get(&key)
            .ok_or(BackendError::UnknownMaterial(key.material))?;

        let words = params.uniform_words();
        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("blit-params"),
                contents: bytemuck::cast_slice(&words),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let params_bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit-params-bg"),
            layout: &self.params_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });
        let texture_bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit-texture-bg"),
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("blit"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &dst.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &params_bg, &[]);
        pass.set_bind_group(1, &texture_bg, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn create_texture(
        &mut self,
        label: &str,
        desc: &TextureDesc,
    ) -> Result<TextureHandle, BackendError> {
        desc.validate()?;
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width > max || desc.height > max {
            return Err(BackendError::InvalidDescriptor {
                reason: format!(
                    "{}x{} exceeds the device limit of {max}",
                    desc.width, desc.height
                ),
            });
        }
        check_budget(desc, self.in_use, self.budget)?;

        // Multisampled textures cannot be copy targets or sampled.
        let usage = if desc.is_multisampled() {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: desc.extent(),
            mip_level_count: 1,
            sample_count: desc.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let handle = self.handles.next();
        self.textures.insert(
            handle,
            GpuTexture {
                desc: *desc,
                texture,
                view,
                imported: false,
            },
        );
        self.in_use += desc.byte_size();
        debug!("Created texture '{}' {:?} as {:?}", label, desc, handle);
        Ok(handle)
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        let Some(texture) = self.textures.remove(&handle) else {
            return;
        };
        if !texture.imported {
            self.in_use = self.in_use.saturating_sub(texture.desc.byte_size());
            texture.texture.destroy();
        }
    }

    fn texture_desc(&self, handle: TextureHandle) -> Option<TextureDesc> {
        self.textures.get(&handle).map(|t| t.desc)
    }

    fn submit(&mut self, commands: CommandBuffer) -> Result<(), BackendError> {
        self.prepare_pipelines(&commands)?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(commands.label()),
            });
        for command in commands.commands() {
            match command {
                Command::PushDebugGroup(label) => encoder.push_debug_group(label),
                Command::PopDebugGroup => encoder.pop_debug_group(),
                Command::Copy {
                    source,
                    destination,
                } => self.encode_copy(&mut encoder, *source, *destination)?,
                Command::Blit {
                    source,
                    destination,
                    material,
                    pass_index,
                    params,
                } => {
                    let desc = self.require(*destination)?.desc;
                    let key = PipelineKey {
                        material: *material,
                        pass_index: *pass_index,
                        format: desc.format,
                        sample_count: desc.sample_count,
                    };
                    self.encode_blit(&mut encoder, *source, *destination, key, params)?;
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

fn fragment_entry(pass_index: u32) -> String {
    if pass_index == 0 {
        "fs_main".to_string()
    } else {
        format!("fs_pass{pass_index}")
    }
}

fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    fragment_entry: &str,
    target_format: wgpu::TextureFormat,
    sample_count: u32,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: sample_count,
            ..Default::default()
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}
