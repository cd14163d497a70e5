//! ECS components for scene objects.
//!
//! Scene nodes are `hecs` entities. Every drawable node carries a
//! [`Transform`](crate::Transform), a [`Placement`](crate::Placement) and a
//! [`Renderable`]; pickable nodes add a [`Pickable`](crate::Pickable).
//!
//! # Example
//!
//! ```ignore
//! use lunar_walk::*;
//!
//! let node = SceneNode::new(cube_mesh)
//!     .transform(Transform::from_position(Vec3::new(100.0, 50.0, 0.0)))
//!     .material(Material::default().diffuse_texture(crate_tex));
//! let cube = scene.spawn_pickable(node)?;
//! ```

/// Type-safe handle to a mesh uploaded to the renderer.
///
/// Obtained from [`Renderer::upload_geometry`](crate::Renderer::upload_geometry).
/// This newtype wrapper prevents accidentally passing texture indices where mesh indices are expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

/// Type-safe handle to a texture uploaded to the renderer.
///
/// Obtained from [`Renderer::upload_texture`](crate::Renderer::upload_texture) or
/// [`Renderer::upload_cube_texture`](crate::Renderer::upload_cube_texture).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// Lighting model a renderable is drawn with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shading {
    /// Per-fragment Phong lighting with optional diffuse/specular maps.
    #[default]
    Phong,
    /// Phong lighting with a tangent-space normal map.
    NormalMapped,
    /// Cube texture sampled by view direction, drawn behind everything.
    Skybox,
}

/// Surface parameters for the lit pipelines.
///
/// Colours are RGB in `0..=1`. A colour whose `use_*` switch is off
/// contributes nothing to the final shade.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub ambient: [f32; 3],
    /// Specular exponent.
    pub hardness: f32,
    pub use_ambient: bool,
    pub use_diffuse: bool,
    pub use_specular: bool,
    pub diffuse_texture: Option<TextureId>,
    pub specular_texture: Option<TextureId>,
    pub normal_texture: Option<TextureId>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: [0.7; 3],
            specular: [1.0; 3],
            ambient: [0.1; 3],
            hardness: 300.0,
            use_ambient: true,
            use_diffuse: true,
            use_specular: true,
            diffuse_texture: None,
            specular_texture: None,
            normal_texture: None,
        }
    }
}

impl Material {
    pub fn diffuse(mut self, rgb: [f32; 3]) -> Self {
        self.diffuse = rgb;
        self
    }

    pub fn specular(mut self, rgb: [f32; 3]) -> Self {
        self.specular = rgb;
        self
    }

    pub fn ambient(mut self, rgb: [f32; 3]) -> Self {
        self.ambient = rgb;
        self
    }

    pub fn hardness(mut self, hardness: f32) -> Self {
        self.hardness = hardness;
        self
    }

    /// Turns the ambient, diffuse and specular terms on or off.
    pub fn terms(mut self, ambient: bool, diffuse: bool, specular: bool) -> Self {
        self.use_ambient = ambient;
        self.use_diffuse = diffuse;
        self.use_specular = specular;
        self
    }

    pub fn diffuse_texture(mut self, texture: TextureId) -> Self {
        self.diffuse_texture = Some(texture);
        self
    }

    pub fn specular_texture(mut self, texture: TextureId) -> Self {
        self.specular_texture = Some(texture);
        self
    }

    pub fn normal_texture(mut self, texture: TextureId) -> Self {
        self.normal_texture = Some(texture);
        self
    }
}

/// Component for drawing a mesh on an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Renderable {
    pub mesh: MeshId,
    pub shading: Shading,
    pub material: Material,
}

impl Renderable {
    pub fn new(mesh: MeshId) -> Self {
        Self {
            mesh,
            shading: Shading::Phong,
            material: Material::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_material_matches_lit_defaults() {
        let m = Material::default();
        assert_eq!(m.diffuse, [0.7; 3]);
        assert_eq!(m.hardness, 300.0);
        assert!(m.use_ambient && m.use_diffuse && m.use_specular);
        assert!(m.normal_texture.is_none());
    }

    #[test]
    fn builder_sets_textures_and_terms() {
        let m = Material::default()
            .normal_texture(TextureId(3))
            .terms(false, true, false)
            .hardness(16.0);
        assert_eq!(m.normal_texture, Some(TextureId(3)));
        assert!(!m.use_ambient && m.use_diffuse && !m.use_specular);
        assert_eq!(m.hardness, 16.0);
        assert_eq!(Renderable::new(MeshId(0)).shading, Shading::Phong);
    }
}
