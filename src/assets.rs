//! Named resource loading.
//!
//! A [`ResourceLoader`] collects named entries of three kinds and resolves
//! them all at once on scoped worker threads. Decoding happens off the main
//! thread; uploading to the GPU is left to the caller, which owns the
//! [`Renderer`](crate::Renderer).
//!
//! # Example
//!
//! ```no_run
//! # fn demo() -> Result<(), lunar_walk::SceneError> {
//! use lunar_walk::{ResourceKind, ResourceLoader};
//!
//! let resources = ResourceLoader::new()
//!     .file("crate", ResourceKind::Image, "assets/crate.png")
//!     .file("cube", ResourceKind::Model, "assets/cube.obj")
//!     .file("height", ResourceKind::Pixels, "assets/height.png")
//!     .load(|progress| log::info!("{} resources left", progress.pending))?;
//!
//! let diffuse = resources.image("crate")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use image::RgbaImage;

use crate::error::SceneError;
use crate::geometry::{GeometryError, PendingGeometry, RawGeometry};

/// What a named resource decodes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Decoded RGBA image, for textures.
    Image,
    /// OBJ or STL geometry, chosen by extension.
    Model,
    /// Raw RGBA samples, for heightmaps.
    Pixels,
}

/// Raw RGBA samples with their dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct Pixels {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// A resolved resource.
#[derive(Clone, Debug)]
pub enum ResourceData {
    Image(RgbaImage),
    Model(RawGeometry),
    Pixels(Pixels),
}

impl ResourceData {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceData::Image(_) => ResourceKind::Image,
            ResourceData::Model(_) => ResourceKind::Model,
            ResourceData::Pixels(_) => ResourceKind::Pixels,
        }
    }
}

#[derive(Clone, Debug)]
enum Source {
    File(PathBuf),
    /// In-memory bytes. Models pick their format from the resource name.
    Bytes(Vec<u8>),
}

#[derive(Clone, Debug)]
struct Entry {
    name: String,
    kind: ResourceKind,
    source: Source,
}

/// Progress reported after each resource resolves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadProgress {
    /// Resources still in flight.
    pub pending: usize,
    pub images: usize,
    pub models: usize,
    pub pixels: usize,
}

impl LoadProgress {
    /// Resources of `kind` finished so far.
    pub fn done(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Image => self.images,
            ResourceKind::Model => self.models,
            ResourceKind::Pixels => self.pixels,
        }
    }

    fn record(&mut self, kind: ResourceKind) {
        self.pending = self.pending.saturating_sub(1);
        match kind {
            ResourceKind::Image => self.images += 1,
            ResourceKind::Model => self.models += 1,
            ResourceKind::Pixels => self.pixels += 1,
        }
    }
}

/// Builder for a batch of named resources.
#[derive(Clone, Debug, Default)]
pub struct ResourceLoader {
    entries: Vec<Entry>,
    /// Worker thread cap; 0 uses the available parallelism.
    workers: usize,
}

impl ResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource read from `path`.
    pub fn file(mut self, name: impl Into<String>, kind: ResourceKind, path: impl Into<PathBuf>) -> Self {
        self.entries.push(Entry {
            name: name.into(),
            kind,
            source: Source::File(path.into()),
        });
        self
    }

    /// Adds a resource decoded from bytes already in memory.
    pub fn bytes(mut self, name: impl Into<String>, kind: ResourceKind, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.push(Entry {
            name: name.into(),
            kind,
            source: Source::Bytes(bytes.into()),
        });
        self
    }

    /// Caps the number of worker threads. 0 restores the default.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Threads `load` will spawn for the current entries.
    pub fn worker_count(&self) -> usize {
        let cap = match self.workers {
            0 => thread::available_parallelism().map_or(4, |n| n.get()),
            n => n,
        };
        cap.min(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves every entry, calling `on_progress` after each one finishes.
    ///
    /// Entries are shared out to at most [`worker_count`](Self::worker_count)
    /// threads. After the first failure no new entries are started; the error
    /// is returned once the entries already in flight have finished.
    pub fn load(self, mut on_progress: impl FnMut(&LoadProgress)) -> Result<Resources, SceneError> {
        let mut progress = LoadProgress {
            pending: self.entries.len(),
            ..Default::default()
        };
        let mut loaded = HashMap::with_capacity(self.entries.len());
        let workers = self.worker_count();
        let next = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);

        thread::scope(|scope| {
            let (sender, receiver) = mpsc::channel();
            for _ in 0..workers {
                let sender = sender.clone();
                let (entries, next, failed) = (&self.entries, &next, &failed);
                scope.spawn(move || {
                    while !failed.load(Ordering::Relaxed) {
                        let Some(entry) = entries.get(next.fetch_add(1, Ordering::Relaxed)) else {
                            break;
                        };
                        let result = resolve(entry);
                        if result.is_err() {
                            failed.store(true, Ordering::Relaxed);
                        }
                        if sender.send((entry, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(sender);

            for (entry, result) in receiver {
                let data = result.map_err(|reason| {
                    log::error!("failed to load '{}': {}", entry.name, reason);
                    SceneError::ResourceLoad {
                        name: entry.name.clone(),
                        reason,
                    }
                })?;
                progress.record(entry.kind);
                log::debug!("loaded '{}' ({:?}), {} left", entry.name, entry.kind, progress.pending);
                on_progress(&progress);
                loaded.insert(entry.name.clone(), data);
            }
            Ok::<(), SceneError>(())
        })?;

        log::info!("loaded {} resources", loaded.len());
        Ok(Resources { loaded })
    }
}

fn resolve(entry: &Entry) -> Result<ResourceData, String> {
    match (entry.kind, &entry.source) {
        (ResourceKind::Image, Source::File(path)) => {
            let image = image::open(path).map_err(|e| e.to_string())?;
            Ok(ResourceData::Image(image.to_rgba8()))
        }
        (ResourceKind::Image, Source::Bytes(bytes)) => {
            let image = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
            Ok(ResourceData::Image(image.to_rgba8()))
        }
        (ResourceKind::Pixels, source) => {
            let image = match source {
                Source::File(path) => image::open(path),
                Source::Bytes(bytes) => image::load_from_memory(bytes),
            }
            .map_err(|e| e.to_string())?
            .to_rgba8();
            let (width, height) = image.dimensions();
            Ok(ResourceData::Pixels(Pixels {
                width,
                height,
                data: image.into_raw(),
            }))
        }
        (ResourceKind::Model, Source::File(path)) => PendingGeometry::from_file(path)
            .build()
            .map(ResourceData::Model)
            .map_err(|e| e.to_string()),
        (ResourceKind::Model, Source::Bytes(bytes)) => model_from_bytes(&entry.name, bytes)
            .map(ResourceData::Model)
            .map_err(|e| e.to_string()),
    }
}

fn model_from_bytes(name: &str, bytes: &[u8]) -> Result<RawGeometry, GeometryError> {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("obj") => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| GeometryError::ParseError(format!("OBJ is not UTF-8: {}", e)))?;
            PendingGeometry::from_obj_str(text).build()
        }
        Some("stl") => PendingGeometry::from_stl_bytes(bytes).build(),
        _ => Err(GeometryError::UnknownFormat(name.to_string())),
    }
}

/// Everything a [`ResourceLoader`] resolved, by name.
#[derive(Debug, Default)]
pub struct Resources {
    loaded: HashMap<String, ResourceData>,
}

impl Resources {
    pub fn get(&self, name: &str) -> Option<&ResourceData> {
        self.loaded.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    fn missing(name: &str, kind: ResourceKind) -> SceneError {
        SceneError::MissingResource(format!("{} ({:?})", name, kind))
    }

    pub fn image(&self, name: &str) -> Result<&RgbaImage, SceneError> {
        match self.get(name) {
            Some(ResourceData::Image(image)) => Ok(image),
            _ => Err(Self::missing(name, ResourceKind::Image)),
        }
    }

    pub fn model(&self, name: &str) -> Result<&RawGeometry, SceneError> {
        match self.get(name) {
            Some(ResourceData::Model(model)) => Ok(model),
            _ => Err(Self::missing(name, ResourceKind::Model)),
        }
    }

    pub fn pixels(&self, name: &str) -> Result<&Pixels, SceneError> {
        match self.get(name) {
            Some(ResourceData::Pixels(pixels)) => Ok(pixels),
            _ => Err(Self::missing(name, ResourceKind::Pixels)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    #[test]
    fn loads_every_kind_and_reports_progress() {
        let mut reports = Vec::new();
        let resources = ResourceLoader::new()
            .bytes("crate", ResourceKind::Image, png(2, 2, [255, 0, 0, 255]))
            .bytes("tri.obj", ResourceKind::Model, TRIANGLE.as_bytes())
            .bytes("height", ResourceKind::Pixels, png(3, 3, [7, 7, 7, 255]))
            .load(|p| reports.push(*p))
            .unwrap();

        assert_eq!(reports.len(), 3);
        let last = reports[2];
        assert_eq!(last.pending, 0);
        assert_eq!(last.done(ResourceKind::Image), 1);
        assert_eq!(last.done(ResourceKind::Model), 1);
        assert_eq!(last.done(ResourceKind::Pixels), 1);
        assert!(reports.windows(2).all(|w| w[1].pending + 1 == w[0].pending));

        assert_eq!(resources.image("crate").unwrap().dimensions(), (2, 2));
        assert_eq!(resources.model("tri.obj").unwrap().indices.len(), 3);
        let pixels = resources.pixels("height").unwrap();
        assert_eq!((pixels.width, pixels.height), (3, 3));
        assert_eq!(pixels.data.len(), 36);
        assert_eq!(&pixels.data[..4], &[7, 7, 7, 255]);
    }

    #[test]
    fn first_failure_names_the_resource() {
        let result = ResourceLoader::new()
            .bytes("broken", ResourceKind::Image, vec![1, 2, 3])
            .load(|_| {});
        match result {
            Err(SceneError::ResourceLoad { name, .. }) => assert_eq!(name, "broken"),
            other => panic!("unexpected {:?}", other.map(|r| r.loaded.len())),
        }
    }

    #[test]
    fn workers_are_capped() {
        let mut loader = ResourceLoader::new().workers(2);
        assert_eq!(loader.worker_count(), 0);
        for i in 0..12 {
            loader = loader.bytes(format!("tri{}.obj", i), ResourceKind::Model, TRIANGLE.as_bytes());
        }
        assert_eq!(loader.worker_count(), 2);
        assert!(ResourceLoader::new().workers(0).bytes("a.obj", ResourceKind::Model, "").worker_count() >= 1);

        let mut reports = 0;
        let resources = loader.load(|_| reports += 1).unwrap();
        assert_eq!(reports, 12);
        assert!(resources.contains("tri11.obj"));
    }

    #[test]
    fn failure_stops_later_entries() {
        let mut reports = Vec::new();
        let result = ResourceLoader::new()
            .workers(1)
            .bytes("first.obj", ResourceKind::Model, TRIANGLE.as_bytes())
            .bytes("broken", ResourceKind::Image, vec![1, 2, 3])
            .bytes("last.obj", ResourceKind::Model, TRIANGLE.as_bytes())
            .load(|p| reports.push(*p));
        assert!(matches!(result, Err(SceneError::ResourceLoad { ref name, .. }) if name == "broken"));
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].pending, 2);
    }

    #[test]
    fn missing_files_fail_to_load() {
        let result = ResourceLoader::new()
            .file("nope", ResourceKind::Model, "does/not/exist.obj")
            .load(|_| {});
        assert!(matches!(result, Err(SceneError::ResourceLoad { .. })));
    }

    #[test]
    fn models_need_a_known_extension() {
        let result = ResourceLoader::new()
            .bytes("mystery", ResourceKind::Model, TRIANGLE.as_bytes())
            .load(|_| {});
        assert!(matches!(result, Err(SceneError::ResourceLoad { .. })));
    }

    #[test]
    fn lookups_check_the_kind() {
        let resources = ResourceLoader::new()
            .bytes("tri.obj", ResourceKind::Model, TRIANGLE.as_bytes())
            .load(|_| {})
            .unwrap();
        assert!(resources.contains("tri.obj"));
        assert_eq!(resources.get("tri.obj").map(ResourceData::kind), Some(ResourceKind::Model));
        assert!(matches!(resources.image("tri.obj"), Err(SceneError::MissingResource(_))));
        assert!(matches!(resources.model("other"), Err(SceneError::MissingResource(_))));
    }

    #[test]
    fn empty_loader_resolves_immediately() {
        let mut calls = 0;
        let resources = ResourceLoader::new().load(|_| calls += 1).unwrap();
        assert_eq!(calls, 0);
        assert!(resources.get("anything").is_none());
    }
}
