//! Offscreen identity target for GPU picking.
//!
//! [`PickPass`] owns an `Rgba8Unorm` colour target with its own depth buffer,
//! both sized to the surface. Every call of the [`PickTarget`] protocol is
//! submitted on its own, so reading a pixel sees exactly the draws issued
//! before it.

use crate::compositor::Viewport;
use crate::error::SceneError;
use crate::gpu::GpuContext;
use crate::mesh::{Mesh, Vertex3d};
use crate::picking::IdDraw;

const ID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Rows copied to a buffer must be padded to this many bytes.
const READBACK_ROW: u64 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PickUniforms {
    mvp: [[f32; 4]; 4],
    color: [f32; 4],
}

/// Colour-id render target plus the pipeline that fills it.
pub struct PickPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    id_texture: wgpu::Texture,
    id_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    staging_buffer: wgpu::Buffer,
    size: (u32, u32),
    viewport: Viewport,
}

impl PickPass {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Pick Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/pick.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pick Uniforms"),
            size: std::mem::size_of::<PickUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Pick Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Pick Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pick Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Pick Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ID_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pick Readback"),
            size: READBACK_ROW,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let size = (gpu.width(), gpu.height());
        let (id_texture, id_view, depth_view) = Self::create_targets(gpu, size);

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
            id_texture,
            id_view,
            depth_view,
            staging_buffer,
            size,
            viewport: Viewport::full(size.0, size.1),
        }
    }

    fn create_targets(
        gpu: &GpuContext,
        (width, height): (u32, u32),
    ) -> (wgpu::Texture, wgpu::TextureView, wgpu::TextureView) {
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let id_texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Pick Id Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ID_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Pick Depth Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let id_view = id_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        (id_texture, id_view, depth_view)
    }

    /// Recreates the targets if the surface size changed.
    pub fn ensure_size(&mut self, gpu: &GpuContext) {
        let size = (gpu.width(), gpu.height());
        if self.size != size {
            let (id_texture, id_view, depth_view) = Self::create_targets(gpu, size);
            self.id_texture = id_texture;
            self.id_view = id_view;
            self.depth_view = depth_view;
            self.size = size;
        }
    }

    fn submit_pass(
        &self,
        gpu: &GpuContext,
        clear: bool,
        draw: Option<&Mesh>,
    ) {
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Pick Encoder"),
        });
        {
            let (color_load, depth_load) = if clear {
                (wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT), wgpu::LoadOp::Clear(1.0))
            } else {
                (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pick Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.id_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(mesh) = draw {
                let vp = self.viewport;
                render_pass.set_viewport(
                    vp.x as f32,
                    vp.y as f32,
                    vp.width as f32,
                    vp.height as f32,
                    0.0,
                    1.0,
                );
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_bind_group(0, &self.bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Clears ids and depth, and remembers the viewport for later draws.
    pub fn clear(&mut self, gpu: &GpuContext, viewport: Viewport) {
        let (w, h) = self.size;
        let x = viewport.x.min(w);
        let y = viewport.y.min(h);
        self.viewport = Viewport {
            x,
            y,
            width: viewport.width.min(w - x),
            height: viewport.height.min(h - y),
        };
        self.submit_pass(gpu, true, None);
    }

    /// Draws one object in its identity colour.
    pub fn draw(&mut self, gpu: &GpuContext, mesh: &Mesh, draw: &IdDraw) {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return;
        }
        let uniforms = PickUniforms {
            mvp: draw.mvp.to_cols_array_2d(),
            color: draw.color.map(|c| c as f32 / 255.0),
        };
        gpu.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.submit_pass(gpu, false, Some(mesh));
    }

    /// Reads one pixel back, blocking until the GPU is done.
    ///
    /// Pixels outside the target read as zero.
    pub fn read_pixel(&mut self, gpu: &GpuContext, x: u32, y: u32) -> Result<[u8; 4], SceneError> {
        if x >= self.size.0 || y >= self.size.1 {
            return Ok([0; 4]);
        }

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Pick Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.id_texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(READBACK_ROW as u32),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = self.staging_buffer.slice(..4);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        gpu.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| SceneError::Readback(e.to_string()))?;

        receiver
            .recv()
            .map_err(|e| SceneError::Readback(e.to_string()))?
            .map_err(|e| SceneError::Readback(e.to_string()))?;

        let pixel = {
            let data = buffer_slice.get_mapped_range();
            [data[0], data[1], data[2], data[3]]
        };
        self.staging_buffer.unmap();
        Ok(pixel)
    }
}
