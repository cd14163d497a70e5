//! Scene registry.
//!
//! A [`Scene`] owns the `hecs` world holding every node, the order nodes are
//! drawn in, the camera, the terrain, the light, and the pick identities and
//! callbacks. Everything is mutated from the frame loop's thread only.
//!
//! Nodes are spawned from a [`SceneNode`] description and drawn in spawn
//! order. Entities spawned straight into [`Scene::world`] are not drawn.

use std::collections::HashMap;

use glam::{Mat4, Vec3};
use hecs::{Entity, World};

use crate::camera::{Camera, HeightQuery};
use crate::compositor::{DrawCommand, EyePass, Viewport};
use crate::ecs::{Material, MeshId, Renderable, Shading};
use crate::error::SceneError;
use crate::math;
use crate::picking::{self, IdDraw, PickEvent, PickHandlers, PickIdAllocator, PickTarget, Pickable};
use crate::terrain::{Heightfield, TerrainView};
use crate::transform::{
    Placement, Transform, billboard_matrix, locked_matrix, rotation_only, skybox_matrix,
};

/// Default point light position.
pub const DEFAULT_LIGHT_POSITION: Vec3 = Vec3::new(0.0, 2000.0, -2000.0);

/// Billboards anchored to billboards resolve at most this many links deep.
const MAX_ANCHOR_DEPTH: usize = 8;

/// Description of a drawable node, consumed by [`Scene::spawn`].
///
/// ```
/// use lunar_walk::{Placement, SceneNode, Shading, Transform, Vec3};
/// # fn demo(mesh: lunar_walk::MeshId) {
/// let node = SceneNode::new(mesh)
///     .transform(Transform::from_position(Vec3::new(0.0, 10.0, 0.0)))
///     .placement(Placement::Billboard { target: None })
///     .shading(Shading::Phong);
/// # }
/// ```
#[derive(Clone, Copy, Debug)]
pub struct SceneNode {
    pub transform: Transform,
    pub placement: Placement,
    pub renderable: Renderable,
}

impl SceneNode {
    pub fn new(mesh: MeshId) -> Self {
        Self {
            transform: Transform::new(),
            placement: Placement::Free,
            renderable: Renderable::new(mesh),
        }
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn shading(mut self, shading: Shading) -> Self {
        self.renderable.shading = shading;
        self
    }

    pub fn material(mut self, material: Material) -> Self {
        self.renderable.material = material;
        self
    }
}

/// Everything drawn in a frame.
pub struct Scene {
    /// Node storage. Use [`Scene::spawn`] for anything that should be drawn.
    pub world: World,
    pub camera: Camera,
    pub light_position: Vec3,
    draw_order: Vec<Entity>,
    terrain: Option<Entity>,
    ids: PickIdAllocator,
    pick_handlers: HashMap<Entity, PickHandlers>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            camera: Camera::new(),
            light_position: DEFAULT_LIGHT_POSITION,
            draw_order: Vec::new(),
            terrain: None,
            ids: PickIdAllocator::new(),
            pick_handlers: HashMap::new(),
        }
    }

    /// Adds a node at the end of the draw order.
    pub fn spawn(&mut self, node: SceneNode) -> Entity {
        let entity = self
            .world
            .spawn((node.transform, node.placement, node.renderable));
        self.draw_order.push(entity);
        entity
    }

    /// Adds a node with a freshly allocated pick identity.
    pub fn spawn_pickable(&mut self, node: SceneNode) -> Result<Entity, SceneError> {
        let id = self.ids.allocate()?;
        let entity = self.spawn(node);
        self.world
            .insert_one(entity, Pickable::new(id))
            .map_err(|_| SceneError::MissingResource(format!("entity {:?}", entity)))?;
        log::debug!("pickable {:?} has id {}", entity, id.value());
        Ok(entity)
    }

    /// Registers callbacks for a pickable entity, replacing earlier ones.
    pub fn set_pick_handlers(&mut self, entity: Entity, handlers: PickHandlers) {
        self.pick_handlers.insert(entity, handlers);
    }

    /// Installs the walkable terrain, replacing any previous one, and puts the
    /// camera on it.
    pub fn set_terrain(&mut self, field: Heightfield, node: SceneNode) -> Entity {
        if let Some(old) = self.terrain.take() {
            self.despawn(old);
        }
        let entity = self
            .world
            .spawn((node.transform, node.placement, node.renderable, field));
        self.draw_order.push(entity);
        self.terrain = Some(entity);
        self.with_ground(|camera, ground| {
            if let Some(ground) = ground {
                camera.snap_to(ground);
            }
        });
        entity
    }

    pub fn terrain(&self) -> Option<Entity> {
        self.terrain
    }

    /// Removes a node with its callbacks. Returns false for unknown entities.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.draw_order.retain(|&e| e != entity);
        self.pick_handlers.remove(&entity);
        if self.terrain == Some(entity) {
            self.terrain = None;
        }
        self.world.despawn(entity).is_ok()
    }

    pub fn draw_order(&self) -> &[Entity] {
        &self.draw_order
    }

    /// World matrix of `entity` as seen through `view`.
    pub fn world_matrix(&self, entity: Entity, view: Mat4) -> Option<Mat4> {
        self.world_matrix_at(entity, view, 0)
    }

    fn world_matrix_at(&self, entity: Entity, view: Mat4, depth: usize) -> Option<Mat4> {
        let transform = *self.world.get::<&Transform>(entity).ok()?;
        let placement = self.placement(entity);

        let matrix = match placement {
            Placement::Free => transform.matrix(),
            Placement::Skybox => skybox_matrix(&transform),
            Placement::Locked => locked_matrix(&self.camera, &transform),
            Placement::Billboard { target } => {
                let anchor = target
                    .filter(|_| depth < MAX_ANCHOR_DEPTH)
                    .and_then(|target| self.world_matrix_at(target, view, depth + 1));
                match anchor {
                    Some(anchor) => billboard_matrix(view, anchor, &transform),
                    // Unanchored: face the viewer from its own position.
                    None => billboard_matrix(view, transform.matrix(), &Transform::new()),
                }
            }
        };
        Some(matrix)
    }

    fn placement(&self, entity: Entity) -> Placement {
        self.world
            .get::<&Placement>(entity)
            .map(|p| *p)
            .unwrap_or_default()
    }

    /// World height of the terrain under `(x, z)`, if there is a terrain.
    pub fn terrain_height(&self, x: f32, z: f32) -> Option<f32> {
        let entity = self.terrain?;
        let field = self.world.get::<&Heightfield>(entity).ok()?;
        let transform = self.world.get::<&Transform>(entity).ok()?;
        Some(field.height(&transform, x, z))
    }

    fn with_ground<R>(&mut self, f: impl FnOnce(&mut Camera, Option<&dyn HeightQuery>) -> R) -> R {
        let field = self
            .terrain
            .and_then(|e| self.world.get::<&Heightfield>(e).ok());
        let transform = self.terrain.and_then(|e| self.world.get::<&Transform>(e).ok());
        match (field.as_deref(), transform.as_deref()) {
            (Some(field), Some(transform)) => {
                let view = TerrainView { field, transform };
                f(&mut self.camera, Some(&view))
            }
            _ => f(&mut self.camera, None),
        }
    }

    /// Walks the camera forward over the terrain.
    pub fn advance_camera(&mut self, distance: f32) {
        self.with_ground(|camera, ground| camera.advance(distance, ground));
    }

    /// Walks the camera sideways over the terrain.
    pub fn strafe_camera(&mut self, distance: f32) {
        self.with_ground(|camera, ground| camera.strafe(distance, ground));
    }

    /// Id draws for every pickable node, in draw order.
    fn pick_candidates(&self, projection: Mat4) -> Vec<(Entity, IdDraw)> {
        let view = self.camera.view_matrix();
        let sky_view = rotation_only(view);
        self.draw_order
            .iter()
            .filter_map(|&entity| {
                let pickable = *self.world.get::<&Pickable>(entity).ok()?;
                let renderable = *self.world.get::<&Renderable>(entity).ok()?;
                let eye_view = match self.placement(entity) {
                    Placement::Skybox => sky_view,
                    _ => view,
                };
                let model = self.world_matrix(entity, view)?;
                let mvp = math::multiply(math::multiply(projection, eye_view), model);
                Some((
                    entity,
                    IdDraw {
                        mesh: renderable.mesh,
                        mvp,
                        color: pickable.id.color(),
                    },
                ))
            })
            .collect()
    }

    /// Draws pickables into `target`, reads the crosshair pixel, updates
    /// picked state and fires callbacks.
    pub fn run_pick_pass<T: PickTarget + ?Sized>(
        &mut self,
        target: &mut T,
        viewport: Viewport,
        pixel: (u32, u32),
        projection: Mat4,
    ) -> Result<Vec<PickEvent>, SceneError> {
        let candidates = self.pick_candidates(projection);
        let hits = picking::pick_pass(target, viewport, pixel, &candidates)?;

        let mut events = Vec::new();
        for (entity, hit) in hits {
            let Ok(mut pickable) = self.world.get::<&mut Pickable>(entity) else {
                continue;
            };
            if let Some(event) = picking::resolve(entity, &mut pickable, hit) {
                events.push(event);
            }
        }

        for event in &events {
            log::debug!("{:?}", event);
            let entity = match *event {
                PickEvent::Picked(e) | PickEvent::Unpicked(e) => e,
            };
            let Some(handlers) = self.pick_handlers.get_mut(&entity) else {
                continue;
            };
            let callback = match event {
                PickEvent::Picked(_) => handlers.on_pick.as_mut(),
                PickEvent::Unpicked(_) => handlers.on_unpick.as_mut(),
            };
            if let Some(callback) = callback {
                callback(entity);
            }
        }

        Ok(events)
    }

    /// Draw list for one eye, using the camera as it is right now.
    pub fn eye_pass(&self, viewport: Viewport, projection: Mat4) -> EyePass {
        let view = self.camera.view_matrix();
        let camera_position = math::checked_inverse(view)
            .map(|inv| inv.w_axis.truncate())
            .unwrap_or_else(|| self.camera.eye_position());

        let draws = self
            .draw_order
            .iter()
            .filter_map(|&entity| {
                let renderable = *self.world.get::<&Renderable>(entity).ok()?;
                let model = self.world_matrix(entity, view)?;
                Some(DrawCommand {
                    mesh: renderable.mesh,
                    shading: renderable.shading,
                    material: renderable.material,
                    model,
                })
            })
            .collect();

        EyePass {
            viewport,
            projection,
            view,
            sky_view: rotation_only(view),
            camera_position,
            light_position: self.light_position,
            draws,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picking::tests::SplatTarget;
    use crate::terrain::BitDepth;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn node(mesh: usize) -> SceneNode {
        SceneNode::new(MeshId(mesh))
    }

    #[test]
    fn spawn_and_despawn_track_draw_order() {
        let mut scene = Scene::new();
        let a = scene.spawn(node(0));
        let b = scene.spawn(node(1));
        assert_eq!(scene.draw_order(), &[a, b]);
        assert!(scene.despawn(a));
        assert_eq!(scene.draw_order(), &[b]);
        assert!(!scene.despawn(a));
    }

    #[test]
    fn pickables_get_distinct_ids() {
        let mut scene = Scene::new();
        let a = scene.spawn_pickable(node(0)).unwrap();
        let b = scene.spawn_pickable(node(0)).unwrap();
        let id_a = scene.world.get::<&Pickable>(a).unwrap().id;
        let id_b = scene.world.get::<&Pickable>(b).unwrap().id;
        assert_eq!((id_a.value(), id_b.value()), (10, 20));
    }

    #[test]
    fn billboard_follows_its_anchor() {
        let mut scene = Scene::new();
        let anchor = scene.spawn(
            node(0).transform(Transform::from_position(Vec3::new(100.0, 50.0, 0.0))),
        );
        let board = scene.spawn(node(1).placement(Placement::Billboard {
            target: Some(anchor),
        }));
        let view = scene.camera.view_matrix();
        let m = scene.world_matrix(board, view).unwrap();
        assert!((m.w_axis.truncate() - Vec3::new(100.0, 50.0, 0.0)).length() < 1e-3);

        // Losing the anchor falls back to the board's own position.
        scene.despawn(anchor);
        let m = scene.world_matrix(board, view).unwrap();
        assert!(m.w_axis.truncate().length() < 1e-3);
    }

    #[test]
    fn self_anchored_billboards_terminate() {
        let mut scene = Scene::new();
        let board = scene.spawn(node(0));
        let _ = scene.world.insert_one(
            board,
            Placement::Billboard {
                target: Some(board),
            },
        );
        assert!(scene.world_matrix(board, Mat4::IDENTITY).is_some());
    }

    #[test]
    fn camera_walks_on_terrain() {
        let mut scene = Scene::new();
        let samples: Vec<u8> = (0..16 * 16).flat_map(|i| [(i % 16 * 8) as u8; 4]).collect();
        let field = Heightfield::from_samples(samples, 1.0, BitDepth::Eight);
        scene.set_terrain(field, node(0));

        let eye = scene.camera.eye_position();
        let ground = scene.terrain_height(eye.x, eye.z).unwrap();
        assert!((eye.y - ground - scene.camera.height_offset).abs() < 1e-4);

        scene.camera.set_orientation(std::f32::consts::FRAC_PI_2, 0.0, 0.0);
        scene.advance_camera(3.0);
        scene.strafe_camera(2.0);
        let eye = scene.camera.eye_position();
        let ground = scene.terrain_height(eye.x, eye.z).unwrap();
        assert!((eye.y - ground - scene.camera.height_offset).abs() < 1e-4);
    }

    #[test]
    fn replacing_terrain_keeps_one_field() {
        let mut scene = Scene::new();
        let flat = || Heightfield::from_samples(vec![0u8; 16 * 4], 1.0, BitDepth::Eight);
        let first = scene.set_terrain(flat(), node(0));
        let second = scene.set_terrain(flat(), node(0));

        assert!(!scene.world.contains(first));
        assert_eq!(scene.terrain(), Some(second));
        assert_eq!(scene.draw_order(), &[second]);
        assert!(scene.world.get::<&Heightfield>(second).is_ok());
        assert_eq!(scene.world.query::<&Heightfield>().iter().count(), 1);
    }

    #[test]
    fn pick_pass_fires_only_the_hit_objects_callback() {
        let mut scene = Scene::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let spawn_at = |scene: &mut Scene, x: f32, name: &'static str| {
            let e = scene
                .spawn_pickable(node(0).transform(Transform::from_position(Vec3::new(x, 0.0, -10.0))))
                .unwrap();
            let picked = Rc::clone(&log);
            let unpicked = Rc::clone(&log);
            scene.set_pick_handlers(
                e,
                PickHandlers::new()
                    .on_pick(move |_| picked.borrow_mut().push(format!("pick {}", name)))
                    .on_unpick(move |_| unpicked.borrow_mut().push(format!("unpick {}", name))),
            );
            e
        };
        let a = spawn_at(&mut scene, 0.0, "a");
        let b = spawn_at(&mut scene, 5.0, "b");

        let projection = math::perspective(60f32.to_radians(), 1.0, 1.0, 100.0);
        let mut target = SplatTarget::new(100, 100);
        let vp = Viewport::full(100, 100);

        let events = scene.run_pick_pass(&mut target, vp, (50, 50), projection).unwrap();
        assert_eq!(events, vec![PickEvent::Picked(a)]);

        let events = scene.run_pick_pass(&mut target, vp, (93, 50), projection).unwrap();
        assert_eq!(events, vec![PickEvent::Unpicked(a), PickEvent::Picked(b)]);

        let events = scene.run_pick_pass(&mut target, vp, (5, 5), projection).unwrap();
        assert_eq!(events, vec![PickEvent::Unpicked(b)]);

        assert_eq!(
            *log.borrow(),
            vec!["pick a", "unpick a", "pick b", "unpick b"]
        );
    }

    #[test]
    fn eye_pass_lists_renderables_with_sky_view() {
        let mut scene = Scene::new();
        scene.camera = Camera::new().at(Vec3::new(3.0, 4.0, 5.0));
        scene.spawn(node(7).placement(Placement::Skybox).shading(Shading::Skybox));
        scene.spawn(node(8));
        let pass = scene.eye_pass(Viewport::full(10, 10), Mat4::IDENTITY);
        assert_eq!(pass.draws.len(), 2);
        assert_eq!(pass.draws[0].mesh, MeshId(7));
        assert_eq!(pass.sky_view.w_axis, glam::Vec4::W);
        assert!((pass.camera_position - Vec3::new(3.0, 4.0, 5.0)).length() < 1e-4);
        assert_eq!(pass.light_position, DEFAULT_LIGHT_POSITION);
    }
}
