//! Lit mesh rendering with depth testing, materials and a skybox.
//!
//! [`MeshPass`] draws the [`EyePass`] lists produced by the compositor into
//! one colour target. All eyes share a single render pass; each eye only sets
//! its viewport and its slot of the frame uniforms.
//!
//! # Architecture
//!
//! The pass uses three bind groups:
//! - **Group 0**: Frame uniforms (view-projection, sky view-projection,
//!   camera and light positions), one dynamic slot per eye
//! - **Group 1**: Model uniforms (model and normal matrices, material), one
//!   dynamic slot per draw
//! - **Group 2**: Diffuse, specular and normal maps with a sampler, or a cube
//!   map and sampler for skyboxes
//!
//! Missing maps are replaced by 1x1 fallbacks: white for diffuse and specular,
//! a flat `(0, 0, 1)` normal for normal maps.
//!
//! # Depth Buffer
//!
//! The pass maintains its own depth buffer. Call
//! [`MeshPass::ensure_depth_size`] after the surface is resized.

use crate::compositor::{DrawCommand, EyePass};
use crate::ecs::{Shading, TextureId};
use crate::error::SceneError;
use crate::gpu::GpuContext;
use crate::math;
use crate::mesh::{Mesh, Vertex3d};
use crate::texture::{ColorSpace, Texture};

/// Dynamic uniform offsets must be multiples of this.
const UNIFORM_SLOT: u64 = 256;

/// Number of eyes the frame buffer has room for.
const MAX_EYES: u64 = 2;

/// Per-eye uniforms.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// Projection times the translation-free view.
    pub sky_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub light_pos: [f32; 4],
}

impl FrameUniforms {
    fn from_eye(eye: &EyePass) -> Self {
        Self {
            view_proj: math::multiply(eye.projection, eye.view).to_cols_array_2d(),
            sky_view_proj: math::multiply(eye.projection, eye.sky_view).to_cols_array_2d(),
            camera_pos: eye.camera_position.extend(1.0).to_array(),
            light_pos: eye.light_position.extend(1.0).to_array(),
        }
    }
}

/// Per-draw uniforms.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    /// Inverse transpose of the model matrix.
    pub normal_matrix: [[f32; 4]; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub ambient: [f32; 4],
    /// Hardness, then the ambient, diffuse and specular switches as 0 or 1.
    pub params: [f32; 4],
}

impl ModelUniforms {
    fn from_draw(draw: &DrawCommand) -> Self {
        let m = &draw.material;
        let switch = |on: bool| if on { 1.0 } else { 0.0 };
        Self {
            model: draw.model.to_cols_array_2d(),
            normal_matrix: math::normal_matrix(draw.model).to_cols_array_2d(),
            diffuse: [m.diffuse[0], m.diffuse[1], m.diffuse[2], 1.0],
            specular: [m.specular[0], m.specular[1], m.specular[2], 1.0],
            ambient: [m.ambient[0], m.ambient[1], m.ambient[2], 1.0],
            params: [
                m.hardness,
                switch(m.use_ambient),
                switch(m.use_diffuse),
                switch(m.use_specular),
            ],
        }
    }
}

/// Handles lit 3D mesh rendering with depth testing.
///
/// # Pipeline Configuration
///
/// - Lit pipelines: back-face culling (counter-clockwise front faces), depth
///   write with Less comparison
/// - Skybox pipeline: no culling, no depth write, always passes the depth test;
///   skyboxes come first in the draw order so everything covers them
pub struct MeshPass {
    phong_pipeline: wgpu::RenderPipeline,
    normal_mapped_pipeline: wgpu::RenderPipeline,
    skybox_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_capacity: u64,
    surface_layout: wgpu::BindGroupLayout,
    sky_layout: wgpu::BindGroupLayout,
    /// The depth texture used for depth testing.
    pub(crate) depth_texture: wgpu::Texture,
    /// View into the depth texture for render pass attachment.
    pub(crate) depth_view: wgpu::TextureView,
    depth_size: (u32, u32),
    white: Texture,
    flat_normal: Texture,
}

fn uniform_entry(dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Binds one slot of `buffer` so it can be moved with a dynamic offset.
fn slot_bind_group<T>(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<T>() as u64),
            }),
        }],
    })
}

struct PipelineDesc<'a> {
    label: &'a str,
    shader: &'a wgpu::ShaderModule,
    fragment: &'a str,
    layout: &'a wgpu::PipelineLayout,
    cull_mode: Option<wgpu::Face>,
    depth_write: bool,
    depth_compare: wgpu::CompareFunction,
}

fn create_pipeline(gpu: &GpuContext, desc: PipelineDesc) -> wgpu::RenderPipeline {
    gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(desc.layout),
        vertex: wgpu::VertexState {
            module: desc.shader,
            entry_point: Some("vs"),
            buffers: &[Vertex3d::LAYOUT],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.shader,
            entry_point: Some(desc.fragment),
            targets: &[Some(wgpu::ColorTargetState {
                format: gpu.config.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: desc.cull_mode,
            front_face: wgpu::FrontFace::Ccw,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: desc.depth_write,
            depth_compare: desc.depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Looks up an optional texture, substituting `fallback` when unset.
fn texture_or<'a>(
    textures: &'a [Texture],
    id: Option<TextureId>,
    fallback: &'a Texture,
) -> Result<&'a Texture, SceneError> {
    match id {
        Some(id) => textures
            .get(id.0)
            .ok_or_else(|| SceneError::MissingResource(format!("texture {}", id.0))),
        None => Ok(fallback),
    }
}

impl MeshPass {
    /// Creates the pipelines, uniform buffers, fallback textures and a depth
    /// buffer sized to the current surface.
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });
        let skybox_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Skybox Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/skybox.wgsl").into()),
        });

        // Frame uniforms (group 0)
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[uniform_entry(true)],
        });
        let frame_buffer = uniform_buffer(device, "Frame Uniforms", UNIFORM_SLOT * MAX_EYES);
        let frame_bind_group = slot_bind_group::<FrameUniforms>(
            device,
            "Frame Bind Group",
            &frame_layout,
            &frame_buffer,
        );

        // Model uniforms (group 1), grown on demand
        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Bind Group Layout"),
            entries: &[uniform_entry(true)],
        });
        let model_capacity = 64;
        let model_buffer = uniform_buffer(device, "Model Uniforms", UNIFORM_SLOT * model_capacity);
        let model_bind_group = slot_bind_group::<ModelUniforms>(
            device,
            "Model Bind Group",
            &model_layout,
            &model_buffer,
        );

        // Surface maps (group 2)
        let surface_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Surface Bind Group Layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                texture_entry(2, wgpu::TextureViewDimension::D2),
                sampler_entry(3),
            ],
        });
        let sky_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sky Bind Group Layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::Cube),
                sampler_entry(1),
            ],
        });

        let lit_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lit Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &model_layout, &surface_layout],
            push_constant_ranges: &[],
        });
        let sky_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skybox Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &model_layout, &sky_layout],
            push_constant_ranges: &[],
        });

        let phong_pipeline = create_pipeline(
            gpu,
            PipelineDesc {
                label: "Phong Pipeline",
                shader: &scene_shader,
                fragment: "fs_phong",
                layout: &lit_layout,
                cull_mode: Some(wgpu::Face::Back),
                depth_write: true,
                depth_compare: wgpu::CompareFunction::Less,
            },
        );
        let normal_mapped_pipeline = create_pipeline(
            gpu,
            PipelineDesc {
                label: "Normal Mapped Pipeline",
                shader: &scene_shader,
                fragment: "fs_normal_mapped",
                layout: &lit_layout,
                cull_mode: Some(wgpu::Face::Back),
                depth_write: true,
                depth_compare: wgpu::CompareFunction::Less,
            },
        );
        let skybox_pipeline = create_pipeline(
            gpu,
            PipelineDesc {
                label: "Skybox Pipeline",
                shader: &skybox_shader,
                fragment: "fs",
                layout: &sky_pipeline_layout,
                cull_mode: None,
                depth_write: false,
                depth_compare: wgpu::CompareFunction::Always,
            },
        );

        let white = Texture::solid(gpu, [255, 255, 255, 255], ColorSpace::Srgb, "White Texture");
        let flat_normal = Texture::solid(gpu, [128, 128, 255, 255], ColorSpace::Linear, "Flat Normal Texture");

        let (depth_texture, depth_view) = Self::create_depth_texture(gpu);

        Self {
            phong_pipeline,
            normal_mapped_pipeline,
            skybox_pipeline,
            frame_buffer,
            frame_bind_group,
            model_layout,
            model_buffer,
            model_bind_group,
            model_capacity,
            surface_layout,
            sky_layout,
            depth_texture,
            depth_view,
            depth_size: (gpu.width(), gpu.height()),
            white,
            flat_normal,
        }
    }

    fn create_depth_texture(gpu: &GpuContext) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: gpu.width(),
                height: gpu.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Recreates the depth buffer if the surface size changed.
    pub fn ensure_depth_size(&mut self, gpu: &GpuContext) {
        if self.depth_size != (gpu.width(), gpu.height()) {
            let (texture, view) = Self::create_depth_texture(gpu);
            self.depth_texture = texture;
            self.depth_view = view;
            self.depth_size = (gpu.width(), gpu.height());
        }
    }

    fn ensure_model_capacity(&mut self, gpu: &GpuContext, draws: u64) {
        if draws <= self.model_capacity {
            return;
        }
        let capacity = draws.next_power_of_two();
        log::debug!("growing model uniforms to {} slots", capacity);
        self.model_buffer = uniform_buffer(&gpu.device, "Model Uniforms", UNIFORM_SLOT * capacity);
        self.model_bind_group = slot_bind_group::<ModelUniforms>(
            &gpu.device,
            "Model Bind Group",
            &self.model_layout,
            &self.model_buffer,
        );
        self.model_capacity = capacity;
    }

    fn surface_bind_group(
        &self,
        gpu: &GpuContext,
        draw: &DrawCommand,
        textures: &[Texture],
    ) -> Result<wgpu::BindGroup, SceneError> {
        let m = &draw.material;
        if draw.shading == Shading::Skybox {
            let sky = texture_or(textures, m.diffuse_texture, &self.white)?;
            if !sky.cube {
                return Err(SceneError::MissingResource("skybox cube texture".into()));
            }
            return Ok(gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Sky Bind Group"),
                layout: &self.sky_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&sky.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sky.sampler),
                    },
                ],
            }));
        }

        let diffuse = texture_or(textures, m.diffuse_texture, &self.white)?;
        let specular = texture_or(textures, m.specular_texture, &self.white)?;
        let normal = texture_or(textures, m.normal_texture, &self.flat_normal)?;
        Ok(gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Surface Bind Group"),
            layout: &self.surface_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&diffuse.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&specular.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&diffuse.sampler),
                },
            ],
        }))
    }

    fn pipeline(&self, shading: Shading) -> &wgpu::RenderPipeline {
        match shading {
            Shading::Phong => &self.phong_pipeline,
            Shading::NormalMapped => &self.normal_mapped_pipeline,
            Shading::Skybox => &self.skybox_pipeline,
        }
    }

    /// Clears `target` and draws every eye into its viewport.
    ///
    /// Uniforms for the whole frame are uploaded up front, so the encoder can
    /// be submitted once. Unknown mesh or texture handles fail the frame.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        clear_color: wgpu::Color,
        eyes: &[EyePass],
        meshes: &[Mesh],
        textures: &[Texture],
    ) -> Result<(), SceneError> {
        let eyes = &eyes[..eyes.len().min(MAX_EYES as usize)];

        let mut frame_bytes = vec![0u8; (UNIFORM_SLOT * MAX_EYES) as usize];
        for (i, eye) in eyes.iter().enumerate() {
            let start = i * UNIFORM_SLOT as usize;
            let uniforms = FrameUniforms::from_eye(eye);
            let bytes = bytemuck::bytes_of(&uniforms);
            frame_bytes[start..start + bytes.len()].copy_from_slice(bytes);
        }
        gpu.queue.write_buffer(&self.frame_buffer, 0, &frame_bytes);

        let draw_count: usize = eyes.iter().map(|eye| eye.draws.len()).sum();
        self.ensure_model_capacity(gpu, draw_count as u64);

        let mut model_bytes = vec![0u8; draw_count * UNIFORM_SLOT as usize];
        let mut bind_groups = Vec::with_capacity(draw_count);
        for (i, draw) in eyes.iter().flat_map(|eye| &eye.draws).enumerate() {
            let start = i * UNIFORM_SLOT as usize;
            let uniforms = ModelUniforms::from_draw(draw);
            let bytes = bytemuck::bytes_of(&uniforms);
            model_bytes[start..start + bytes.len()].copy_from_slice(bytes);
            bind_groups.push(self.surface_bind_group(gpu, draw, textures)?);
        }
        if !model_bytes.is_empty() {
            gpu.queue.write_buffer(&self.model_buffer, 0, &model_bytes);
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let mut slot = 0usize;
        for (e, eye) in eyes.iter().enumerate() {
            let vp = eye.viewport;
            if vp.width == 0 || vp.height == 0 {
                slot += eye.draws.len();
                continue;
            }
            render_pass.set_viewport(
                vp.x as f32,
                vp.y as f32,
                vp.width as f32,
                vp.height as f32,
                0.0,
                1.0,
            );
            render_pass.set_scissor_rect(vp.x, vp.y, vp.width, vp.height);
            render_pass.set_bind_group(0, &self.frame_bind_group, &[(e as u64 * UNIFORM_SLOT) as u32]);

            for draw in &eye.draws {
                let mesh = meshes
                    .get(draw.mesh.0)
                    .ok_or_else(|| SceneError::MissingResource(format!("mesh {}", draw.mesh.0)))?;
                render_pass.set_pipeline(self.pipeline(draw.shading));
                render_pass.set_bind_group(1, &self.model_bind_group, &[(slot as u64 * UNIFORM_SLOT) as u32]);
                render_pass.set_bind_group(2, &bind_groups[slot], &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                slot += 1;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Material, MeshId};
    use glam::{Mat4, Vec3};

    #[test]
    fn uniform_structs_fit_their_slots() {
        assert!(std::mem::size_of::<FrameUniforms>() as u64 <= UNIFORM_SLOT);
        assert!(std::mem::size_of::<ModelUniforms>() as u64 <= UNIFORM_SLOT);
        assert_eq!(std::mem::size_of::<FrameUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<ModelUniforms>() % 16, 0);
    }

    #[test]
    fn material_switches_become_floats() {
        let draw = DrawCommand {
            mesh: MeshId(0),
            shading: Shading::Phong,
            material: Material::default().hardness(12.0).terms(false, true, false),
            model: Mat4::from_translation(Vec3::X),
        };
        let u = ModelUniforms::from_draw(&draw);
        assert_eq!(u.params, [12.0, 0.0, 1.0, 0.0]);
        assert_eq!(u.model[3], [1.0, 0.0, 0.0, 1.0]);
        // Pure translation leaves normals untouched.
        assert_eq!(u.normal_matrix, Mat4::IDENTITY.to_cols_array_2d());
    }
}
