//! Colour-encoded object picking.
//!
//! Each pickable object owns a [`PickId`] drawn as a flat colour into an
//! offscreen target. After every object is drawn, the pixel under the
//! crosshair is read back and compared with that object's colour:
//!
//! 1. clear the id target (colour zero, depth far)
//! 2. for each candidate: draw it in its id colour, read one pixel, compare
//! 3. the caller turns matches into pick/unpick transitions
//!
//! Objects are drawn with depth testing and never cleared between reads, so
//! when two objects cover the crosshair the nearer one wins once both are
//! drawn. An earlier object may still report a match before a nearer one is
//! drawn over it; that order dependence is accepted.
//!
//! Identities are allocated by a [`PickIdAllocator`] owned by the scene, so
//! ids never repeat while the scene lives.

use glam::Mat4;
use hecs::Entity;

use crate::compositor::Viewport;
use crate::ecs::MeshId;
use crate::error::SceneError;

/// Distance between consecutive identities.
pub const PICK_ID_STRIDE: u32 = 10;

/// Largest identity that fits the 24-bit colour encoding.
pub const MAX_PICK_ID: u32 = 0x00FF_FFFF;

/// Unique identity of a pickable object.
///
/// The value is packed little-endian into the red, green and blue channels.
/// Zero is the cleared background and is never allocated.
///
/// ```
/// use lunar_walk::PickId;
///
/// let id = PickId::from_color([0x2c, 0x01, 0x00, 255]);
/// assert_eq!(id.map(|id| id.value()), Some(300));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PickId(u32);

impl PickId {
    pub fn value(self) -> u32 {
        self.0
    }

    /// RGBA8 colour the id is drawn with.
    pub fn color(self) -> [u8; 4] {
        let [r, g, b, _] = self.0.to_le_bytes();
        [r, g, b, 255]
    }

    /// Decodes a read-back pixel. Background pixels decode to `None`.
    pub fn from_color(pixel: [u8; 4]) -> Option<Self> {
        let value = u32::from_le_bytes([pixel[0], pixel[1], pixel[2], 0]);
        (value != 0).then_some(Self(value))
    }

    /// Whether a read-back pixel carries this id.
    pub fn matches(self, pixel: [u8; 4]) -> bool {
        Self::from_color(pixel) == Some(self)
    }
}

/// Hands out increasing, never-reused pick identities.
#[derive(Debug)]
pub struct PickIdAllocator {
    last: u32,
}

impl Default for PickIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PickIdAllocator {
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Next identity: 10, 20, 30, ...
    pub fn allocate(&mut self) -> Result<PickId, SceneError> {
        let next = self
            .last
            .checked_add(PICK_ID_STRIDE)
            .filter(|&id| id <= MAX_PICK_ID)
            .ok_or(SceneError::PickIdsExhausted)?;
        self.last = next;
        Ok(PickId(next))
    }
}

/// Component marking an entity as pickable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pickable {
    pub id: PickId,
    /// Set while the object is under the crosshair of an armed pick.
    pub picked: bool,
    /// Disabled objects never report a pick.
    pub enabled: bool,
}

impl Pickable {
    pub fn new(id: PickId) -> Self {
        Self {
            id,
            picked: false,
            enabled: true,
        }
    }
}

type PickCallback = Box<dyn FnMut(Entity)>;

/// Callbacks fired by the pick pass for one object.
#[derive(Default)]
pub struct PickHandlers {
    pub(crate) on_pick: Option<PickCallback>,
    pub(crate) on_unpick: Option<PickCallback>,
}

impl PickHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called on every armed frame the object is under the crosshair.
    pub fn on_pick(mut self, f: impl FnMut(Entity) + 'static) -> Self {
        self.on_pick = Some(Box::new(f));
        self
    }

    /// Called once when a picked object stops being under the crosshair.
    pub fn on_unpick(mut self, f: impl FnMut(Entity) + 'static) -> Self {
        self.on_unpick = Some(Box::new(f));
        self
    }
}

/// Outcome of a pick pass for one object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickEvent {
    Picked(Entity),
    Unpicked(Entity),
}

/// One object to draw into the id target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IdDraw {
    pub mesh: MeshId,
    /// `projection · view · model`.
    pub mvp: Mat4,
    pub color: [u8; 4],
}

/// Offscreen target the pick pass draws identities into.
pub trait PickTarget {
    /// Clears colour to zero and depth to far, restricting drawing to `viewport`.
    fn clear_ids(&mut self, viewport: Viewport) -> Result<(), SceneError>;

    /// Draws one object in flat colour with depth testing.
    fn draw_id(&mut self, draw: &IdDraw) -> Result<(), SceneError>;

    /// Reads one RGBA8 pixel, top-left origin. Blocks until the GPU is done.
    fn read_pixel(&mut self, x: u32, y: u32) -> Result<[u8; 4], SceneError>;
}

/// Pixel the pick pass reads: the centre of the first eye's viewport.
pub fn crosshair(width: u32, height: u32, stereo: bool) -> (u32, u32) {
    let x = if stereo { width / 4 } else { width / 2 };
    (x, height / 2)
}

/// Runs the id-draw/read-back protocol.
///
/// Returns, per candidate and in order, whether its colour was under the
/// crosshair right after it was drawn.
pub fn pick_pass<T: PickTarget + ?Sized>(
    target: &mut T,
    viewport: Viewport,
    pixel: (u32, u32),
    candidates: &[(Entity, IdDraw)],
) -> Result<Vec<(Entity, bool)>, SceneError> {
    target.clear_ids(viewport)?;
    let mut hits = Vec::with_capacity(candidates.len());
    for (entity, draw) in candidates {
        target.draw_id(draw)?;
        let read = target.read_pixel(pixel.0, pixel.1)?;
        let hit = PickId::from_color(read).is_some_and(|id| id.color() == draw.color);
        hits.push((*entity, hit));
    }
    Ok(hits)
}

/// Applies one object's pick result, returning the resulting event.
///
/// Picks fire on every match. Unpicks fire only when the object was picked
/// before, so background frames stay quiet.
pub fn resolve(entity: Entity, pickable: &mut Pickable, hit: bool) -> Option<PickEvent> {
    if hit && pickable.enabled {
        pickable.picked = true;
        Some(PickEvent::Picked(entity))
    } else if pickable.picked {
        pickable.picked = false;
        Some(PickEvent::Unpicked(entity))
    } else {
        None
    }
}
