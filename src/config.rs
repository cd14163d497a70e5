//! Application configuration.
//!
//! [`AppConfig`] can be built in code with the builder methods or read from a
//! TOML file. Every field has a default, so a config file only needs the keys
//! it changes:
//!
//! ```toml
//! title = "Lunar Walk"
//! fps = 60
//!
//! [stereo]
//! enabled = true
//! eye_separation = 2.0
//!
//! [assets]
//! heightmap = "assets/height16.png"
//! bit_depth = 16
//! ```

use std::path::{Path, PathBuf};

use glam::Vec3;

use crate::compositor::{Projection, StereoConfig};
use crate::error::SceneError;
use crate::scene::DEFAULT_LIGHT_POSITION;

/// Movement and look tuning.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Walking speed in world units per millisecond.
    pub speed_per_ms: f32,
    /// Speed factor while Shift is held.
    pub run_multiplier: f32,
    /// Radians per pixel of pointer motion.
    pub sensitivity: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            speed_per_ms: 0.05,
            run_multiplier: 4.0,
            sensitivity: 0.004,
        }
    }
}

/// Diffuse, specular and normal maps of one material.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct TextureSet {
    pub diffuse: Option<PathBuf>,
    pub specular: Option<PathBuf>,
    pub normal: Option<PathBuf>,
}

/// Files the demo scene is assembled from. Anything left out is generated.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub heightmap: Option<PathBuf>,
    /// 8 or 16.
    pub bit_depth: u8,
    pub uv_repeat: f32,
    pub terrain_scale: f32,
    pub terrain_textures: TextureSet,
    /// Six faces in +X, -X, +Y, -Y, +Z, -Z order.
    pub skybox: Vec<PathBuf>,
    pub cube_model: Option<PathBuf>,
    pub cube_textures: TextureSet,
    pub locked_model: Option<PathBuf>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            heightmap: None,
            bit_depth: 8,
            uv_repeat: 1.0,
            terrain_scale: 2.0,
            terrain_textures: TextureSet::default(),
            skybox: Vec::new(),
            cube_model: None,
            cube_textures: TextureSet::default(),
            locked_model: None,
        }
    }
}

/// Window, timing, projection and scene settings.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Target frame rate of the scheduler.
    pub fps: f64,
    pub projection: Projection,
    pub stereo: StereoConfig,
    pub controls: ControlsConfig,
    /// Eye height above the terrain.
    pub height_offset: f32,
    pub light_position: [f32; 3],
    pub clear_color: [f64; 4],
    pub assets: AssetsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Lunar Walk".to_string(),
            width: 1280,
            height: 720,
            fps: 20.0,
            projection: Projection::default(),
            stereo: StereoConfig::default(),
            controls: ControlsConfig::default(),
            height_offset: crate::camera::DEFAULT_HEIGHT_OFFSET,
            light_position: DEFAULT_LIGHT_POSITION.to_array(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            assets: AssetsConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, SceneError> {
        let config: Self = toml::from_str(text)?;
        config.validate()
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Rejects settings the renderer cannot run with. Builder methods do not
    /// check their arguments; [`run_with_config`](crate::run_with_config)
    /// calls this before opening a window.
    pub fn validate(self) -> Result<Self, SceneError> {
        if !(self.fps > 0.0) {
            return Err(SceneError::Config(format!("fps must be positive, got {}", self.fps)));
        }
        let Projection { fov, near, far } = self.projection;
        if !(fov > 0.0 && fov < 180.0) || !(near > 0.0 && far > near) {
            return Err(SceneError::Config(format!(
                "bad projection: fov {} near {} far {}",
                fov, near, far
            )));
        }
        if !matches!(self.assets.bit_depth, 8 | 16) {
            return Err(SceneError::Config(format!(
                "bit_depth must be 8 or 16, got {}",
                self.assets.bit_depth
            )));
        }
        if !self.assets.skybox.is_empty() && self.assets.skybox.len() != 6 {
            return Err(SceneError::Config(format!(
                "skybox needs 6 faces, got {}",
                self.assets.skybox.len()
            )));
        }
        Ok(self)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    pub fn fov(mut self, degrees: f32) -> Self {
        self.projection.fov = degrees;
        self
    }

    pub fn stereo(mut self, stereo: StereoConfig) -> Self {
        self.stereo = stereo;
        self
    }

    pub fn controls(mut self, controls: ControlsConfig) -> Self {
        self.controls = controls;
        self
    }

    pub fn height_offset(mut self, offset: f32) -> Self {
        self.height_offset = offset;
        self
    }

    pub fn light(mut self, position: Vec3) -> Self {
        self.light_position = position.to_array();
        self
    }

    pub fn light_position(&self) -> Vec3 {
        Vec3::from_array(self.light_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.fps, 20.0);
        assert_eq!(config.projection.far, 7000.0);
        assert_eq!(config.controls.speed_per_ms, 0.05);
        assert_eq!(config.light_position(), Vec3::new(0.0, 2000.0, -2000.0));
    }

    #[test]
    fn tables_override_selected_keys() {
        let text = r#"
            title = "Moon"
            fps = 60

            [stereo]
            enabled = true

            [controls]
            run_multiplier = 2.5

            [assets]
            heightmap = "height.png"
            bit_depth = 16
            skybox = ["px.png", "nx.png", "py.png", "ny.png", "pz.png", "nz.png"]
        "#;
        let config = AppConfig::from_toml_str(text).unwrap();
        assert_eq!(config.title, "Moon");
        assert_eq!(config.fps, 60.0);
        assert!(config.stereo.enabled);
        assert_eq!(config.stereo.convergence, StereoConfig::default().convergence);
        assert_eq!(config.controls.run_multiplier, 2.5);
        assert_eq!(config.controls.sensitivity, 0.004);
        assert_eq!(config.assets.heightmap, Some(PathBuf::from("height.png")));
        assert_eq!(config.assets.bit_depth, 16);
        assert_eq!(config.assets.skybox.len(), 6);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(
            AppConfig::from_toml_str("fps = 0"),
            Err(SceneError::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[assets]\nbit_depth = 12"),
            Err(SceneError::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("title = ["),
            Err(SceneError::Config(_))
        ));
    }

    #[test]
    fn builder_chains() {
        let config = AppConfig::new().title("x").size(640, 480).fps(30.0).fov(75.0);
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.projection.fov, 75.0);
        assert!(config.validate().is_ok());
        assert!(matches!(
            AppConfig::new().fps(0.0).validate(),
            Err(SceneError::Config(_))
        ));
    }
}
