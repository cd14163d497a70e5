//! `lunar-walk`: walk over a heightfield, look at a crate, pick it up.
//!
//! Usage: `lunar-walk [config.toml]`. Any asset the config leaves out is
//! generated, so the demo runs with no files at all.

use std::f32::consts::PI;

use lunar_walk::*;

const CUBE_POSITION: Vec3 = Vec3::new(100.0, 50.0, 0.0);
const CUBE_SCALE: f32 = 50.0;
const SKYBOX_SCALE: f32 = 100.0;
const PROCEDURAL_TERRAIN_SIZE: u32 = 129;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = try_main() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), SceneError> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    let loader = resource_loader(&config.assets);
    log::info!("loading {} resources", loader.len());
    let resources = loader.load(|progress| {
        log::info!(
            "{} pending ({} images, {} models, {} heightmaps done)",
            progress.pending,
            progress.images,
            progress.models,
            progress.pixels
        );
    })?;

    run_with_config(config, move |ctx| build_scene(ctx, &resources))
}

fn resource_loader(assets: &AssetsConfig) -> ResourceLoader {
    let mut loader = ResourceLoader::new();
    if let Some(path) = &assets.heightmap {
        loader = loader.file("heightmap", ResourceKind::Pixels, path);
    }
    for (i, path) in assets.skybox.iter().enumerate() {
        loader = loader.file(format!("sky.{}", i), ResourceKind::Image, path);
    }
    loader = texture_entries(loader, "terrain", &assets.terrain_textures);
    loader = texture_entries(loader, "cube", &assets.cube_textures);
    if let Some(path) = &assets.cube_model {
        loader = loader.file("cube.model", ResourceKind::Model, path);
    }
    if let Some(path) = &assets.locked_model {
        loader = loader.file("locked.model", ResourceKind::Model, path);
    }
    loader
}

fn texture_entries(mut loader: ResourceLoader, prefix: &str, set: &TextureSet) -> ResourceLoader {
    let maps = [
        ("diffuse", &set.diffuse),
        ("specular", &set.specular),
        ("normal", &set.normal),
    ];
    for (map, path) in maps {
        if let Some(path) = path {
            loader = loader.file(format!("{}.{}", prefix, map), ResourceKind::Image, path);
        }
    }
    loader
}

fn build_scene(ctx: &mut SetupContext, resources: &Resources) -> Result<(), SceneError> {
    let config = ctx.config;
    let assets = &config.assets;

    // Skybox first: it is drawn without depth writes.
    let faces = match (0..6)
        .map(|i| resources.image(&format!("sky.{}", i)).cloned())
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(faces) => faces,
        Err(_) => starfield(64),
    };
    let sky = ctx.renderer.upload_cube_texture(&faces)?;
    let sky_mesh = ctx.mesh_cube();
    ctx.scene.spawn(
        SceneNode::new(sky_mesh)
            .placement(Placement::Skybox)
            .shading(Shading::Skybox)
            .transform(Transform::new().uniform_scale(SKYBOX_SCALE))
            .material(Material::default().diffuse_texture(sky)),
    );

    // Terrain
    let field = match resources.pixels("heightmap") {
        Ok(pixels) => {
            let bit_depth = BitDepth::from_bits(assets.bit_depth).unwrap_or_default();
            log::info!("heightmap {}x{} ({:?})", pixels.width, pixels.height, bit_depth);
            Heightfield::from_samples(pixels.data.clone(), assets.uv_repeat, bit_depth)
        }
        Err(_) => {
            log::info!("no heightmap configured, generating one");
            Heightfield::from_samples(
                rolling_hills(PROCEDURAL_TERRAIN_SIZE),
                assets.uv_repeat,
                BitDepth::Eight,
            )
        }
    };
    let terrain_mesh = ctx.renderer.upload_geometry(field.geometry());
    let mut terrain_material = material(ctx.renderer, resources, "terrain", Material::default().hardness(50.0));
    if terrain_material.diffuse_texture.is_none() {
        let regolith = ctx.renderer.upload_texture(&regolith(128), ColorSpace::Srgb);
        terrain_material = terrain_material.diffuse_texture(regolith);
    }
    let terrain_node = SceneNode::new(terrain_mesh)
        .transform(field.centered(assets.terrain_scale))
        .shading(shading_for(&terrain_material))
        .material(terrain_material);
    ctx.scene.set_terrain(field, terrain_node);

    // Pickable cube
    let cube_geometry = match resources.model("cube.model") {
        Ok(model) => PendingGeometry::from_raw(model.clone())
            .centered()
            .normalized()
            .with_tangents()
            .build()?,
        Err(_) => RawGeometry::cube(),
    };
    let cube_mesh = ctx.renderer.upload_geometry(&cube_geometry);
    let cube_material = material(ctx.renderer, resources, "cube", Material::default().hardness(300.0));
    let cube = ctx.scene.spawn_pickable(
        SceneNode::new(cube_mesh)
            .transform(Transform::from_position(CUBE_POSITION).uniform_scale(CUBE_SCALE))
            .shading(shading_for(&cube_material))
            .material(cube_material),
    )?;
    ctx.scene.set_pick_handlers(
        cube,
        PickHandlers::new()
            .on_pick(|entity| log::info!("picked {:?}", entity))
            .on_unpick(|entity| log::info!("unpicked {:?}", entity)),
    );

    // Marker hovering over the cube, always facing the viewer
    let quad = ctx.mesh_quad();
    ctx.scene.spawn(
        SceneNode::new(quad)
            .placement(Placement::Billboard { target: Some(cube) })
            .transform(
                Transform::from_position(Vec3::new(0.0, 1.2, 0.0)).uniform_scale(0.4),
            )
            .material(
                Material::default()
                    .diffuse([1.0, 0.6, 0.1])
                    .ambient([0.6, 0.3, 0.05])
                    .terms(true, true, false),
            ),
    );

    // Object carried in front of the camera
    let locked_geometry = match resources.model("locked.model") {
        Ok(model) => PendingGeometry::from_raw(model.clone())
            .centered()
            .normalized()
            .build()?,
        Err(_) => RawGeometry::cube(),
    };
    let locked_mesh = ctx.renderer.upload_geometry(&locked_geometry);
    ctx.scene.spawn(
        SceneNode::new(locked_mesh)
            .placement(Placement::Locked)
            .transform(
                Transform::from_position(Vec3::new(2.5, -2.0, -6.0))
                    .euler(0.0, math::deg_to_rad(105.0), math::deg_to_rad(20.0))
                    .scale(Vec3::new(2.0, 0.4, 0.4)),
            )
            .material(Material::default().diffuse([0.8, 0.8, 0.8]).hardness(80.0)),
    );

    log::info!("scene ready: {} nodes", ctx.scene.draw_order().len());
    Ok(())
}

/// Uploads whichever maps of `prefix` were loaded onto `base`.
fn material(renderer: &mut Renderer, resources: &Resources, prefix: &str, base: Material) -> Material {
    let mut material = base;
    if let Ok(image) = resources.image(&format!("{}.diffuse", prefix)) {
        material = material.diffuse_texture(renderer.upload_texture(image, ColorSpace::Srgb));
    }
    if let Ok(image) = resources.image(&format!("{}.specular", prefix)) {
        material = material.specular_texture(renderer.upload_texture(image, ColorSpace::Linear));
    }
    if let Ok(image) = resources.image(&format!("{}.normal", prefix)) {
        material = material.normal_texture(renderer.upload_texture(image, ColorSpace::Linear));
    }
    material
}

fn shading_for(material: &Material) -> Shading {
    if material.normal_texture.is_some() {
        Shading::NormalMapped
    } else {
        Shading::Phong
    }
}

/// Cheap integer hash to `0..1`.
fn noise(x: u32, y: u32, seed: u32) -> f32 {
    let mut h = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263) ^ seed.wrapping_mul(2_246_822_519);
    h = (h ^ (h >> 13)).wrapping_mul(1_274_126_177);
    (h ^ (h >> 16)) as f32 / u32::MAX as f32
}

/// Grey 8-bit heightmap of overlapping sine hills.
fn rolling_hills(size: u32) -> Vec<u8> {
    let mut samples = Vec::with_capacity((size * size * 4) as usize);
    for z in 0..size {
        for x in 0..size {
            let (u, v) = (x as f32 / size as f32, z as f32 / size as f32);
            let h = 0.5
                + 0.25 * (u * 2.0 * PI * 2.0).sin() * (v * 2.0 * PI * 1.5).cos()
                + 0.15 * (u * 2.0 * PI * 5.0 + v * 3.0).sin()
                + 0.05 * (noise(x, z, 7) - 0.5);
            let h = (h.clamp(0.0, 1.0) * 255.0) as u8;
            samples.extend_from_slice(&[h, h, h, 255]);
        }
    }
    samples
}

/// Speckled grey surface texture.
fn regolith(size: u32) -> image::RgbaImage {
    image::RgbaImage::from_fn(size, size, |x, y| {
        let g = (150.0 + 60.0 * (noise(x, y, 1) - 0.5) + 30.0 * (noise(x / 8, y / 8, 2) - 0.5)) as u8;
        image::Rgba([g, g, g, 255])
    })
}

/// Six black faces with scattered stars.
fn starfield(size: u32) -> Vec<image::RgbaImage> {
    (0..6)
        .map(|face| {
            image::RgbaImage::from_fn(size, size, |x, y| {
                let n = noise(x, y, 100 + face);
                if n > 0.995 {
                    let b = (180.0 + 75.0 * noise(y, x, face)) as u8;
                    image::Rgba([b, b, b, 255])
                } else {
                    image::Rgba([2, 2, 6, 255])
                }
            })
        })
        .collect()
}
