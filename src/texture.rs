use crate::error::SceneError;
use crate::gpu::GpuContext;

/// How texel values are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorSpace {
    /// Colour maps: decoded from sRGB when sampled.
    #[default]
    Srgb,
    /// Data maps such as normal or specular maps: sampled as stored.
    Linear,
}

impl ColorSpace {
    fn format(self) -> wgpu::TextureFormat {
        match self {
            ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

/// A GPU texture that can be bound to shaders.
///
/// Either a plain 2D texture or a six-layer cube map.
#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
    pub cube: bool,
}

impl Texture {
    /// Create a 2D texture from raw RGBA data.
    pub fn from_rgba(
        gpu: &GpuContext,
        data: &[u8],
        width: u32,
        height: u32,
        color_space: ColorSpace,
        label: &str,
    ) -> Self {
        use wgpu::util::DeviceExt;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: color_space.format(),
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Terrain UVs run past 1.0, so the surface tiles
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", label)),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
            cube: false,
        }
    }

    /// Create a cube map from six equally sized square faces in
    /// +X, -X, +Y, -Y, +Z, -Z order.
    pub fn cube_from_rgba(
        gpu: &GpuContext,
        faces: &[image::RgbaImage],
        label: &str,
    ) -> Result<Self, SceneError> {
        use wgpu::util::DeviceExt;

        let [first, ..] = faces else {
            return Err(SceneError::MissingResource(format!("{}: no cube faces", label)));
        };
        let (width, height) = first.dimensions();
        if faces.len() != 6 || faces.iter().any(|f| f.dimensions() != (width, height)) {
            return Err(SceneError::ResourceLoad {
                name: label.to_string(),
                reason: format!("cube map needs 6 faces of {}x{}", width, height),
            });
        }

        let data: Vec<u8> = faces.iter().flat_map(|f| f.as_raw().iter().copied()).collect();
        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 6,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: ColorSpace::Srgb.format(),
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", label)),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            sampler,
            width,
            height,
            cube: true,
        })
    }

    /// Create a 2D texture from a decoded image.
    pub fn from_image(
        gpu: &GpuContext,
        image: &image::RgbaImage,
        color_space: ColorSpace,
        label: &str,
    ) -> Self {
        let (width, height) = image.dimensions();
        Self::from_rgba(gpu, image, width, height, color_space, label)
    }

    /// Load a texture from an image file.
    pub fn from_file(
        gpu: &GpuContext,
        path: &str,
        color_space: ColorSpace,
    ) -> Result<Self, SceneError> {
        let img = image::open(path)?.to_rgba8();
        Ok(Self::from_image(gpu, &img, color_space, path))
    }

    /// 1x1 texture of a single colour, bound where a material has no map.
    pub fn solid(gpu: &GpuContext, rgba: [u8; 4], color_space: ColorSpace, label: &str) -> Self {
        Self::from_rgba(gpu, &rgba, 1, 1, color_space, label)
    }
}
