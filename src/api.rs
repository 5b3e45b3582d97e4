use std::rc::Rc;

use glam::Vec2;

use crate::body::Body;
use crate::collider::Collider;
use crate::error::Result;
use crate::narrowphase::{Resolution, ResolveOptions};
use crate::tiles::Tile;
use crate::types::*;

/// Public API contract for the resolving physics world.
pub trait PhysicsWorldApi {
    /// Construct a new world with the given configuration.
    fn new(cfg: WorldConfig) -> Self
    where
        Self: Sized;

    // --- Bodies ------------------------------------------------------------

    /// Allocate a body for `owner` with its box at `position` (top-left) and `size`.
    fn create_body(&mut self, owner: OwnerId, position: Vec2, size: Vec2) -> BodyHandle;

    /// Remove a body. Stale handles return `None`.
    fn destroy_body(&mut self, handle: BodyHandle) -> Option<Body>;

    fn body(&self, handle: BodyHandle) -> Option<&Body>;

    /// Mutable access between steps (setters validate their input).
    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body>;

    /// Move a body that left the world bounds (grown by `padding`) to the same
    /// offset from the opposite edge. The jump does not count as motion.
    fn wrap(&mut self, body: BodyHandle, padding: f32) -> Result<()>;

    fn wrap_group(&mut self, group: GroupHandle, padding: f32) -> Result<()>;

    // --- Groups ------------------------------------------------------------

    fn create_group(&mut self) -> GroupHandle;

    fn add_to_group(&mut self, group: GroupHandle, body: BodyHandle) -> Result<()>;

    fn remove_from_group(&mut self, group: GroupHandle, body: BodyHandle) -> bool;

    fn destroy_group(&mut self, group: GroupHandle) -> bool;

    // --- Tiles -------------------------------------------------------------

    /// Attach a read-only tile layer; the world never mutates it.
    fn attach_tile_layer(&mut self, layer: Rc<dyn TileSource>) -> TileLayerHandle;

    fn detach_tile_layer(&mut self, handle: TileLayerHandle) -> bool;

    /// Separate a body from an explicit list of tiles right now, outside any
    /// step and without masks or layer callbacks. Returns how many tiles
    /// separated it (or held it in resting contact).
    fn collide_tiles(&mut self, body: BodyHandle, tiles: &[Tile]) -> Result<usize>;

    /// Count the listed tiles the body intersects, whatever their faces, and
    /// set `touching` on colliding faces. Nothing moves.
    fn overlap_tiles(&mut self, body: BodyHandle, tiles: &[Tile]) -> Result<usize>;

    // --- Colliders ---------------------------------------------------------

    /// Register a collider; it is evaluated every step in registration order.
    fn add_collider(&mut self, collider: Collider) -> Result<ColliderHandle>;

    fn remove_collider(&mut self, handle: ColliderHandle) -> bool;

    /// Inactive colliders stay registered but are skipped.
    fn set_collider_active(&mut self, handle: ColliderHandle, active: bool) -> bool;

    // --- Stepping ----------------------------------------------------------

    /// Advance the simulation by exactly `delta` seconds.
    fn step(&mut self, delta: f32) -> Result<()>;

    /// Feed a frame delta to the fixed-step accumulator. Returns the number of steps run.
    fn update(&mut self, frame_delta: f32) -> Result<u32>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Drain and return the events buffered since the last drain.
    fn drain_events(&mut self) -> Vec<WorldEvent>;

    // --- Queries -----------------------------------------------------------

    /// Enabled bodies whose box intersects `region`, in registration order.
    fn bodies_overlapping(&self, region: Aabb) -> impl Iterator<Item = BodyHandle> + '_;

    /// Enabled bodies containing the point `p`.
    fn query_point(&self, p: Vec2) -> Vec<BodyHandle>;

    /// Closest enabled body hit by the ray `origin + t * dir`, `0 <= t <= max_t`.
    fn raycast(&self, origin: Vec2, dir: Vec2, max_t: f32) -> Option<(BodyHandle, RayHit)>;

    /// Enabled body whose centre is nearest to `point`, skipping `except`.
    /// Ties go to the earliest registered body.
    fn closest(&self, point: Vec2, except: Option<BodyHandle>) -> Option<BodyHandle>;

    /// Enabled body whose centre is farthest from `point`, skipping `except`.
    fn furthest(&self, point: Vec2, except: Option<BodyHandle>) -> Option<BodyHandle>;
}

/// Pairwise resolution primitives used by the world.
pub trait SeparationApi {
    /// Resolve an overlapping body pair in place.
    fn separate_bodies(a: &mut Body, b: &mut Body, opts: &ResolveOptions) -> Resolution;

    /// Overlap test that only sets `touching`; positions and velocities are untouched.
    fn overlap_bodies(a: &mut Body, b: &mut Body, opts: &ResolveOptions) -> bool;

    /// Resolve a body against one static tile, honouring the tile's face mask.
    fn separate_tile(body: &mut Body, tile: &Tile, opts: &ResolveOptions) -> Resolution;

    fn overlap_tile(body: &mut Body, tile: &Tile, opts: &ResolveOptions) -> bool;

    /// Push the body back inside `bounds` on the enabled edges; returns the edges hit.
    fn clamp_to_bounds(body: &mut Body, bounds: Aabb, check: Faces) -> Faces;

    fn ray_aabb(origin: Vec2, dir: Vec2, aabb: &Aabb) -> Option<RayHit>;
}

/// Read-only tile query interface provided by a tilemap.
pub trait TileSource {
    /// Append every tile whose cell intersects `region`, in row-major order.
    /// Implementations must visit only the cells under `region`.
    fn tiles_in_region(&self, region: Aabb, out: &mut Vec<Tile>);
}
