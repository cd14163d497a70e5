//! Crate-wide error type.
//!
//! Everything that can fail while bringing a scene up (window and GPU
//! acquisition, resource loading, configuration parsing) funnels into
//! [`SceneError`]. Failures at scene-setup time are fatal; nothing here is
//! retried. Singular matrices and out-of-range terrain queries are not errors
//! and never surface as a `SceneError`.

use crate::geometry::GeometryError;

/// Errors raised while setting up or running a scene.
#[derive(Debug)]
pub enum SceneError {
    /// No usable GPU adapter, device or surface could be obtained.
    UnsupportedPlatform(String),
    /// A named resource failed to load.
    ResourceLoad {
        /// Resource name as registered with the loader.
        name: String,
        /// What went wrong.
        reason: String,
    },
    /// A resource was looked up that was never loaded, or has another kind.
    MissingResource(String),
    /// Image decoding failed.
    Image(image::ImageError),
    /// Model geometry could not be parsed.
    Geometry(GeometryError),
    /// Filesystem error.
    Io(std::io::Error),
    /// Configuration file could not be parsed.
    Config(String),
    /// The swapchain could not provide a frame.
    Surface(wgpu::SurfaceError),
    /// Reading the pick pixel back from the GPU failed.
    Readback(String),
    /// The 24-bit pick identity space is used up.
    PickIdsExhausted,
    /// The windowing event loop failed.
    EventLoop(String),
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneError::UnsupportedPlatform(msg) => write!(f, "Unsupported platform: {}", msg),
            SceneError::ResourceLoad { name, reason } => {
                write!(f, "Failed to load resource '{}': {}", name, reason)
            }
            SceneError::MissingResource(name) => write!(f, "Missing resource: '{}'", name),
            SceneError::Image(e) => write!(f, "Image error: {}", e),
            SceneError::Geometry(e) => write!(f, "Geometry error: {}", e),
            SceneError::Io(e) => write!(f, "IO error: {}", e),
            SceneError::Config(msg) => write!(f, "Config error: {}", msg),
            SceneError::Surface(e) => write!(f, "Surface error: {}", e),
            SceneError::Readback(msg) => write!(f, "Pick readback failed: {}", msg),
            SceneError::PickIdsExhausted => write!(f, "Pick identities exhausted"),
            SceneError::EventLoop(msg) => write!(f, "Event loop error: {}", msg),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Image(e) => Some(e),
            SceneError::Geometry(e) => Some(e),
            SceneError::Io(e) => Some(e),
            SceneError::Surface(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::ImageError> for SceneError {
    fn from(e: image::ImageError) -> Self {
        SceneError::Image(e)
    }
}

impl From<GeometryError> for SceneError {
    fn from(e: GeometryError) -> Self {
        SceneError::Geometry(e)
    }
}

impl From<std::io::Error> for SceneError {
    fn from(e: std::io::Error) -> Self {
        SceneError::Io(e)
    }
}

impl From<wgpu::SurfaceError> for SceneError {
    fn from(e: wgpu::SurfaceError) -> Self {
        SceneError::Surface(e)
    }
}

impl From<toml::de::Error> for SceneError {
    fn from(e: toml::de::Error) -> Self {
        SceneError::Config(e.to_string())
    }
}

impl From<winit::error::EventLoopError> for SceneError {
    fn from(e: winit::error::EventLoopError) -> Self {
        SceneError::EventLoop(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn resource_load_message_names_resource() {
        let err = SceneError::ResourceLoad {
            name: "terrain".into(),
            reason: "not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load resource 'terrain': not found"
        );
    }

    #[test]
    fn io_errors_keep_their_source() {
        let err: SceneError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
        assert!(SceneError::PickIdsExhausted.source().is_none());
    }
}
