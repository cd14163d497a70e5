//! GPU side of the scene: uploaded resources and the passes that draw them.
//!
//! [`Renderer`] is the concrete [`FrameTarget`] the compositor draws on. It
//! owns every mesh and texture uploaded for the scene and hands out
//! [`MeshId`]/[`TextureId`] handles for them.

use crate::compositor::{EyePass, FrameTarget, Viewport};
use crate::ecs::{MeshId, TextureId};
use crate::error::SceneError;
use crate::geometry::RawGeometry;
use crate::gpu::GpuContext;
use crate::mesh::Mesh;
use crate::mesh_pass::MeshPass;
use crate::pick_pass::PickPass;
use crate::picking::{IdDraw, PickTarget};
use crate::texture::{ColorSpace, Texture};

pub struct Renderer {
    pub gpu: GpuContext,
    meshes: Vec<Mesh>,
    textures: Vec<Texture>,
    mesh_pass: MeshPass,
    pick_pass: PickPass,
    pub clear_color: wgpu::Color,
}

impl Renderer {
    pub fn new(gpu: GpuContext) -> Self {
        let mesh_pass = MeshPass::new(&gpu);
        let pick_pass = PickPass::new(&gpu);
        Self {
            gpu,
            meshes: Vec::new(),
            textures: Vec::new(),
            mesh_pass,
            pick_pass,
            clear_color: wgpu::Color::BLACK,
        }
    }

    /// Uploads geometry and returns its handle.
    pub fn upload_geometry(&mut self, geometry: &RawGeometry) -> MeshId {
        self.meshes.push(Mesh::from_geometry(&self.gpu, geometry));
        log::debug!(
            "uploaded mesh {} ({} vertices, {} indices)",
            self.meshes.len() - 1,
            geometry.vertices.len(),
            geometry.indices.len()
        );
        MeshId(self.meshes.len() - 1)
    }

    /// Uploads a 2D texture and returns its handle.
    pub fn upload_texture(&mut self, image: &image::RgbaImage, color_space: ColorSpace) -> TextureId {
        let label = format!("Texture {}", self.textures.len());
        self.textures
            .push(Texture::from_image(&self.gpu, image, color_space, &label));
        TextureId(self.textures.len() - 1)
    }

    /// Uploads six faces as a cube map and returns its handle.
    pub fn upload_cube_texture(&mut self, faces: &[image::RgbaImage]) -> Result<TextureId, SceneError> {
        let label = format!("Cube Texture {}", self.textures.len());
        self.textures
            .push(Texture::cube_from_rgba(&self.gpu, faces, &label)?);
        Ok(TextureId(self.textures.len() - 1))
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0)
    }
}

impl PickTarget for Renderer {
    fn clear_ids(&mut self, viewport: Viewport) -> Result<(), SceneError> {
        self.pick_pass.clear(&self.gpu, viewport);
        Ok(())
    }

    fn draw_id(&mut self, draw: &IdDraw) -> Result<(), SceneError> {
        let mesh = self
            .meshes
            .get(draw.mesh.0)
            .ok_or_else(|| SceneError::MissingResource(format!("mesh {}", draw.mesh.0)))?;
        self.pick_pass.draw(&self.gpu, mesh, draw);
        Ok(())
    }

    fn read_pixel(&mut self, x: u32, y: u32) -> Result<[u8; 4], SceneError> {
        self.pick_pass.read_pixel(&self.gpu, x, y)
    }
}

impl FrameTarget for Renderer {
    fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        self.mesh_pass.ensure_depth_size(&self.gpu);
        self.pick_pass.ensure_size(&self.gpu);
    }

    fn present(&mut self, eyes: &[EyePass]) -> Result<(), SceneError> {
        let output = match self.gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("surface lost, reconfiguring");
                self.gpu.surface.configure(&self.gpu.device, &self.gpu.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.mesh_pass.render(
            &self.gpu,
            &mut encoder,
            &view,
            self.clear_color,
            eyes,
            &self.meshes,
            &self.textures,
        )?;

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
