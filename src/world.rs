use glam::Vec2;
use log::{debug, trace, warn};
use slotmap::{SecondaryMap, SlotMap};

use std::rc::Rc;
use std::time::Instant;

use crate::api::{PhysicsWorldApi, SeparationApi, TileSource};
use crate::body::Body;
use crate::broadphase::BroadPhase;
use crate::collider::{Collider, ColliderTarget, Contact, Partner, TileHooks};
use crate::error::{PhysicsError, Result};
use crate::narrowphase::{bodies_in_contact, touches_tile, Narrowphase, ResolveOptions};
use crate::tiles::Tile;
use crate::types::*;

/// Called after every completed step with `(time, delta)`.
pub type StepObserver = Box<dyn FnMut(f64, f32)>;

/// Extra reach around a body when asking a layer for tiles, so flush
/// neighbours are found.
const TILE_QUERY_MARGIN: f32 = 1.0;

/// Owns bodies, groups, tile layers and colliders, and advances them in
/// fixed order: integrate, broadphase, colliders, bounds, notify.
pub struct PhysicsWorld {
    pub cfg: WorldConfig,

    bodies: SlotMap<BodyHandle, Body>,
    // Registration order; slotmap iteration order is not insertion order.
    body_order: Vec<BodyHandle>,
    groups: SlotMap<GroupHandle, Vec<BodyHandle>>,
    layers: SlotMap<TileLayerHandle, Rc<dyn TileSource>>,
    tile_hooks: SecondaryMap<TileLayerHandle, TileHooks>,
    colliders: SlotMap<ColliderHandle, Collider>,
    collider_order: Vec<ColliderHandle>,

    // Per-step scratch: enabled bodies and their broadphase index
    broadphase: BroadPhase,
    active: Vec<BodyHandle>,
    slot_of: SecondaryMap<BodyHandle, usize>,
    tiles: Vec<Tile>,

    events: Vec<WorldEvent>,
    observers: Vec<StepObserver>,

    time: f64,
    accumulator: f32,
    paused: bool,

    stats: WorldStats,
    last_timing: Option<StepTiming>,
}

impl PhysicsWorldApi for PhysicsWorld {
    fn new(cfg: WorldConfig) -> Self {
        Self {
            broadphase: BroadPhase::new(cfg.broadphase),
            cfg,
            bodies: SlotMap::with_key(),
            body_order: Vec::new(),
            groups: SlotMap::with_key(),
            layers: SlotMap::with_key(),
            tile_hooks: SecondaryMap::new(),
            colliders: SlotMap::with_key(),
            collider_order: Vec::new(),
            active: Vec::new(),
            slot_of: SecondaryMap::new(),
            tiles: Vec::new(),
            events: Vec::new(),
            observers: Vec::new(),
            time: 0.0,
            accumulator: 0.0,
            paused: false,
            stats: WorldStats::default(),
            last_timing: None,
        }
    }

    fn create_body(&mut self, owner: OwnerId, position: Vec2, size: Vec2) -> BodyHandle {
        let handle = self.bodies.insert(Body::new(owner, position, size));
        self.body_order.push(handle);
        handle
    }

    fn destroy_body(&mut self, handle: BodyHandle) -> Option<Body> {
        let body = self.bodies.remove(handle)?;
        self.body_order.retain(|&h| h != handle);
        for members in self.groups.values_mut() {
            members.retain(|&h| h != handle);
        }
        Some(body)
    }

    fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle)
    }

    fn wrap(&mut self, body: BodyHandle, padding: f32) -> Result<()> {
        let pad = Vec2::splat(if padding.is_finite() { padding } else { 0.0 });
        let area = Aabb::new(self.cfg.bounds.min - pad, self.cfg.bounds.max + pad);
        let b = self.bodies.get_mut(body).ok_or(PhysicsError::StaleBody(body))?;
        let p = b.position;
        b.set_position(Vec2::new(
            wrap_value(p.x, area.min.x, area.max.x),
            wrap_value(p.y, area.min.y, area.max.y),
        ));
        Ok(())
    }

    fn wrap_group(&mut self, group: GroupHandle, padding: f32) -> Result<()> {
        let members = self.groups.get(group).ok_or(PhysicsError::StaleGroup(group))?.clone();
        for h in members {
            self.wrap(h, padding)?;
        }
        Ok(())
    }

    fn create_group(&mut self) -> GroupHandle {
        self.groups.insert(Vec::new())
    }

    fn add_to_group(&mut self, group: GroupHandle, body: BodyHandle) -> Result<()> {
        if !self.bodies.contains_key(body) {
            return Err(PhysicsError::StaleBody(body));
        }
        let members = self.groups.get_mut(group).ok_or(PhysicsError::StaleGroup(group))?;
        if !members.contains(&body) {
            members.push(body);
        }
        Ok(())
    }

    fn remove_from_group(&mut self, group: GroupHandle, body: BodyHandle) -> bool {
        let Some(members) = self.groups.get_mut(group) else {
            return false;
        };
        let before = members.len();
        members.retain(|&h| h != body);
        members.len() != before
    }

    fn destroy_group(&mut self, group: GroupHandle) -> bool {
        self.groups.remove(group).is_some()
    }

    fn attach_tile_layer(&mut self, layer: Rc<dyn TileSource>) -> TileLayerHandle {
        self.layers.insert(layer)
    }

    fn detach_tile_layer(&mut self, handle: TileLayerHandle) -> bool {
        self.tile_hooks.remove(handle);
        self.layers.remove(handle).is_some()
    }

    fn collide_tiles(&mut self, body: BodyHandle, tiles: &[Tile]) -> Result<usize> {
        let opts = ResolveOptions::from(&self.cfg);
        let b = self.bodies.get_mut(body).ok_or(PhysicsError::StaleBody(body))?;
        if !b.enabled {
            return Ok(0);
        }
        Ok(tiles.iter().filter(|tile| Narrowphase::separate_tile(b, tile, &opts).separated()).count())
    }

    fn overlap_tiles(&mut self, body: BodyHandle, tiles: &[Tile]) -> Result<usize> {
        let opts = ResolveOptions::from(&self.cfg);
        let b = self.bodies.get_mut(body).ok_or(PhysicsError::StaleBody(body))?;
        if !b.enabled {
            return Ok(0);
        }
        Ok(tiles.iter().filter(|tile| Narrowphase::overlap_tile(b, tile, &opts)).count())
    }

    fn add_collider(&mut self, collider: Collider) -> Result<ColliderHandle> {
        let collider = collider.normalized()?;
        for side in [collider.source, collider.target] {
            self.check_side(side)?;
        }
        let name = collider.name.clone();
        let handle = self.colliders.insert(collider);
        self.collider_order.push(handle);
        debug!("collider {handle:?} ({}) added", name.as_deref().unwrap_or("unnamed"));
        Ok(handle)
    }

    fn remove_collider(&mut self, handle: ColliderHandle) -> bool {
        if self.colliders.remove(handle).is_none() {
            return false;
        }
        self.collider_order.retain(|&h| h != handle);
        debug!("collider {handle:?} removed");
        true
    }

    fn set_collider_active(&mut self, handle: ColliderHandle, active: bool) -> bool {
        match self.colliders.get_mut(handle) {
            Some(c) => {
                c.active = active;
                true
            }
            None => false,
        }
    }

    fn step(&mut self, delta: f32) -> Result<()> {
        if !delta.is_finite() {
            return Err(PhysicsError::NonFiniteDelta(delta));
        }
        let dt = if delta < 0.0 {
            warn!("negative step delta {delta} clamped to 0");
            0.0
        } else {
            delta
        };

        let timing = self.cfg.enable_timing;
        let t_all = timing.then(Instant::now);

        let t0 = timing.then(Instant::now);
        self.integrate(dt);
        let integrate_ms = elapsed_ms(t0);

        let t1 = timing.then(Instant::now);
        self.build_pairs(dt);
        let broadphase_ms = elapsed_ms(t1);

        let t2 = timing.then(Instant::now);
        let (contacts, stale) = self.run_colliders();
        let colliders_ms = elapsed_ms(t2);

        let t3 = timing.then(Instant::now);
        self.clamp_bounds();
        let bounds_ms = elapsed_ms(t3);

        self.time += dt as f64;
        self.stats = WorldStats {
            bodies: self.bodies.len(),
            active_bodies: self.active.len(),
            colliders: self.colliders.len(),
            candidate_pairs: self.broadphase.pairs().len(),
            contacts,
            stale_colliders_removed: stale,
        };
        self.last_timing = t_all.map(|t| StepTiming {
            integrate_ms,
            broadphase_ms,
            colliders_ms,
            bounds_ms,
            total_ms: t.elapsed().as_secs_f64() * 1000.0,
        });

        push_event(&mut self.events, self.cfg.max_events, WorldEvent::Step { time: self.time, delta: dt });
        let time = self.time;
        for observer in self.observers.iter_mut() {
            observer(time, dt);
        }
        trace!(
            "step t={time:.4} dt={dt} active={} pairs={} contacts={contacts}",
            self.stats.active_bodies, self.stats.candidate_pairs
        );
        Ok(())
    }

    fn update(&mut self, frame_delta: f32) -> Result<u32> {
        if !frame_delta.is_finite() {
            return Err(PhysicsError::NonFiniteDelta(frame_delta));
        }
        if self.paused {
            return Ok(0);
        }
        let frame = frame_delta.max(0.0) * self.cfg.time_scale.max(0.0);
        if !self.cfg.fixed_step {
            self.step(frame)?;
            return Ok(1);
        }

        let fps = if self.cfg.fps.is_finite() && self.cfg.fps > 0.0 {
            self.cfg.fps
        } else {
            warn!("invalid fps {}, using 60", self.cfg.fps);
            60.0
        };
        let fixed = 1.0 / fps;
        self.accumulator += frame;

        let mut steps = 0;
        while self.accumulator >= fixed && steps < self.cfg.max_substeps {
            self.step(fixed)?;
            self.accumulator -= fixed;
            steps += 1;
        }
        if self.accumulator >= fixed {
            debug!("dropping {:.4}s of simulation backlog", self.accumulator);
            self.accumulator %= fixed;
        }
        Ok(steps)
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    fn bodies_overlapping(&self, region: Aabb) -> impl Iterator<Item = BodyHandle> + '_ {
        self.body_order.iter().copied().filter(move |&h| {
            self.bodies.get(h).is_some_and(|b| b.enabled && b.aabb().intersects(&region))
        })
    }

    fn query_point(&self, p: Vec2) -> Vec<BodyHandle> {
        self.body_order
            .iter()
            .copied()
            .filter(|&h| self.bodies.get(h).is_some_and(|b| b.enabled && b.aabb().contains_point(p)))
            .collect()
    }

    fn raycast(&self, origin: Vec2, dir: Vec2, max_t: f32) -> Option<(BodyHandle, RayHit)> {
        if dir.length_squared() == 0.0 || !dir.is_finite() || !origin.is_finite() {
            return None;
        }
        let mut best: Option<(BodyHandle, RayHit)> = None;
        for &h in &self.body_order {
            let Some(body) = self.bodies.get(h) else { continue };
            if !body.enabled {
                continue;
            }
            let Some(hit) = Narrowphase::ray_aabb(origin, dir, &body.aabb()) else { continue };
            if hit.toi > max_t {
                continue;
            }
            match &best {
                Some((_, bh)) if hit.toi >= bh.toi => {}
                _ => best = Some((h, hit)),
            }
        }
        best
    }

    fn closest(&self, point: Vec2, except: Option<BodyHandle>) -> Option<BodyHandle> {
        self.pick_by_distance(point, except, |d, best| d < best)
    }

    fn furthest(&self, point: Vec2, except: Option<BodyHandle>) -> Option<BodyHandle> {
        self.pick_by_distance(point, except, |d, best| d > best)
    }
}

impl PhysicsWorld {
    /// Register an observer run after every completed step.
    pub fn on_step(&mut self, f: impl FnMut(f64, f32) + 'static) {
        self.observers.push(Box::new(f));
    }

    /// Simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// All bodies in registration order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> + '_ {
        self.body_order.iter().filter_map(|&h| self.bodies.get(h).map(|b| (h, b)))
    }

    pub fn group_members(&self, group: GroupHandle) -> Option<&[BodyHandle]> {
        self.groups.get(group).map(|m| m.as_slice())
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle)
    }

    /// Stats for the last completed step.
    pub fn debug_stats(&self) -> WorldStats {
        self.stats
    }

    /// Timing breakdown for the last step (only when `enable_timing`).
    pub fn timing(&self) -> Option<StepTiming> {
        self.last_timing
    }

    /// Consulted before a body resolves against the tile at `(col, row)` of
    /// `layer`; returning `false` skips that tile. Overrides any index callback
    /// for the same tile.
    pub fn set_tile_callback(
        &mut self,
        layer: TileLayerHandle,
        col: i32,
        row: i32,
        f: impl FnMut(&Contact<'_>) -> bool + 'static,
    ) -> Result<()> {
        self.hooks_mut(layer)?.set_cell(col, row, Box::new(f));
        Ok(())
    }

    /// Like [`set_tile_callback`](Self::set_tile_callback), for every tile of `layer` with `index`.
    pub fn set_tile_index_callback(
        &mut self,
        layer: TileLayerHandle,
        index: u32,
        f: impl FnMut(&Contact<'_>) -> bool + 'static,
    ) -> Result<()> {
        self.hooks_mut(layer)?.set_index(index, Box::new(f));
        Ok(())
    }

    pub fn clear_tile_callbacks(&mut self, layer: TileLayerHandle) -> bool {
        self.tile_hooks.remove(layer).is_some()
    }

    fn hooks_mut(&mut self, layer: TileLayerHandle) -> Result<&mut TileHooks> {
        if !self.layers.contains_key(layer) {
            return Err(PhysicsError::StaleTileLayer(layer));
        }
        self.tile_hooks
            .entry(layer)
            .map(|e| e.or_default())
            .ok_or(PhysicsError::StaleTileLayer(layer))
    }

    fn pick_by_distance(
        &self,
        point: Vec2,
        except: Option<BodyHandle>,
        better: impl Fn(f32, f32) -> bool,
    ) -> Option<BodyHandle> {
        let mut best: Option<(BodyHandle, f32)> = None;
        for (h, body) in self.bodies() {
            if Some(h) == except || !body.enabled {
                continue;
            }
            let d = body.center().distance_squared(point);
            match best {
                Some((_, bd)) if !better(d, bd) => {}
                _ => best = Some((h, d)),
            }
        }
        best.map(|(h, _)| h)
    }

    fn check_side(&self, side: ColliderTarget) -> Result<()> {
        match side {
            ColliderTarget::Single(h) if !self.bodies.contains_key(h) => Err(PhysicsError::StaleBody(h)),
            ColliderTarget::Group(g) if !self.groups.contains_key(g) => Err(PhysicsError::StaleGroup(g)),
            ColliderTarget::TileLayer(l) if !self.layers.contains_key(l) => Err(PhysicsError::StaleTileLayer(l)),
            _ => Ok(()),
        }
    }

    fn integrate(&mut self, dt: f32) {
        let gravity = self.cfg.gravity;
        let integrator = self.cfg.integrator;
        for &h in &self.body_order {
            let Some(body) = self.bodies.get_mut(h) else { continue };
            if !body.enabled {
                continue;
            }
            if !body.integrate(dt, gravity, integrator) {
                warn!("body {h:?} (owner {}) went non-finite; rolled back", body.owner);
            }
        }
    }

    fn build_pairs(&mut self, dt: f32) {
        if self.broadphase.kind() != self.cfg.broadphase {
            self.broadphase.set_kind(self.cfg.broadphase);
        }
        self.active.clear();
        self.slot_of.clear();
        for &h in &self.body_order {
            if self.bodies.get(h).is_some_and(|b| b.enabled) {
                self.slot_of.insert(h, self.active.len());
                self.active.push(h);
            }
        }
        let bodies = &self.bodies;
        self.broadphase.rebuild(self.active.iter().map(|&h| {
            let b = &bodies[h];
            b.aabb().inflate(b.velocity * dt)
        }));
    }

    /// Evaluate colliders in registration order. Returns `(contacts, stale removed)`.
    fn run_colliders(&mut self) -> (usize, usize) {
        let mut colliders = std::mem::take(&mut self.colliders);
        let order = std::mem::take(&mut self.collider_order);
        let mut stale = Vec::new();
        let mut contacts = 0;

        for &ch in &order {
            let Some(collider) = colliders.get_mut(ch) else { continue };
            if !collider.active {
                continue;
            }
            if self.check_side(collider.source).is_err() || self.check_side(collider.target).is_err() {
                stale.push(ch);
                continue;
            }
            contacts += match (collider.source, collider.target) {
                (_, ColliderTarget::TileLayer(layer)) => self.run_tile_collider(ch, collider, layer),
                (ColliderTarget::Single(a), ColliderTarget::Single(b)) => {
                    usize::from(self.pass().body_pair(ch, collider, a, b))
                }
                _ => self.collide_pairs(ch, collider),
            };
        }

        self.colliders = colliders;
        self.collider_order = order;
        for &ch in &stale {
            let name = self.colliders.get(ch).and_then(|c| c.name.clone());
            warn!(
                "collider {ch:?} ({}) references a destroyed body, group or tile layer; removed",
                name.as_deref().unwrap_or("unnamed")
            );
            self.remove_collider(ch);
        }
        (contacts, stale.len())
    }

    fn pass(&mut self) -> Pass<'_> {
        Pass::new(&mut self.bodies, &mut self.events, &self.cfg)
    }

    /// Which broadphase slots belong to a collider side.
    fn side_flags(&self, side: ColliderTarget) -> Vec<bool> {
        let mut flags = vec![false; self.active.len()];
        let mut mark = |h: BodyHandle| {
            if let Some(&i) = self.slot_of.get(h) {
                flags[i] = true;
            }
        };
        match side {
            ColliderTarget::Single(h) => mark(h),
            ColliderTarget::Group(g) => {
                for &h in self.groups.get(g).map(|m| m.as_slice()).unwrap_or(&[]) {
                    mark(h);
                }
            }
            ColliderTarget::TileLayer(_) => {}
        }
        flags
    }

    fn collide_pairs(&mut self, ch: ColliderHandle, collider: &mut Collider) -> usize {
        let src = self.side_flags(collider.source);
        let dst = self.side_flags(collider.target);
        let mut pass = Pass::new(&mut self.bodies, &mut self.events, &self.cfg);
        let mut contacts = 0;
        for &(i, j) in self.broadphase.pairs() {
            let (hi, hj) = (self.active[i], self.active[j]);
            let hit = if src[i] && dst[j] {
                pass.body_pair(ch, collider, hi, hj)
            } else if src[j] && dst[i] {
                pass.body_pair(ch, collider, hj, hi)
            } else {
                false
            };
            contacts += usize::from(hit);
        }
        contacts
    }

    fn run_tile_collider(&mut self, ch: ColliderHandle, collider: &mut Collider, layer: TileLayerHandle) -> usize {
        let Some(source) = self.layers.get(layer).cloned() else {
            return 0;
        };
        let members: Vec<BodyHandle> = match collider.source {
            ColliderTarget::Single(h) => vec![h],
            ColliderTarget::Group(g) => self.groups.get(g).cloned().unwrap_or_default(),
            ColliderTarget::TileLayer(_) => Vec::new(),
        };

        let mut tiles = std::mem::take(&mut self.tiles);
        let mut hooks = self.tile_hooks.remove(layer);
        let mut contacts = 0;
        for h in members {
            let Some(body) = self.bodies.get(h) else { continue };
            if !body.enabled {
                continue;
            }
            tiles.clear();
            source.tiles_in_region(body.aabb().inflate(Vec2::splat(TILE_QUERY_MARGIN)), &mut tiles);
            let mut pass = self.pass();
            for tile in &tiles {
                contacts += usize::from(pass.body_tile(ch, collider, h, layer, tile, hooks.as_mut()));
            }
        }
        if let Some(hooks) = hooks {
            self.tile_hooks.insert(layer, hooks);
        }
        self.tiles = tiles;
        contacts
    }

    fn clamp_bounds(&mut self) {
        for &h in &self.body_order {
            let Some(body) = self.bodies.get_mut(h) else { continue };
            if !body.enabled || !body.collide_world_bounds {
                continue;
            }
            let bounds = body.custom_bounds.unwrap_or(self.cfg.bounds);
            let faces = Narrowphase::clamp_to_bounds(body, bounds, self.cfg.bounds_collision);
            if faces.any() {
                let ev = WorldEvent::WorldBounds { body: h, owner: body.owner, faces };
                push_event(&mut self.events, self.cfg.max_events, ev);
            }
        }
    }
}

/// Mutable view of the world used while one collider runs.
struct Pass<'w> {
    bodies: &'w mut SlotMap<BodyHandle, Body>,
    events: &'w mut Vec<WorldEvent>,
    max_events: usize,
    emit: bool,
    mutual: bool,
    opts: ResolveOptions,
}

impl<'w> Pass<'w> {
    fn new(bodies: &'w mut SlotMap<BodyHandle, Body>, events: &'w mut Vec<WorldEvent>, cfg: &WorldConfig) -> Self {
        Self {
            bodies,
            events,
            max_events: cfg.max_events,
            emit: cfg.emit_contact_events,
            mutual: cfg.require_mutual_consent,
            opts: ResolveOptions::from(cfg),
        }
    }

    /// Test and resolve one body pair. Returns true if it counted as a contact.
    fn body_pair(&mut self, ch: ColliderHandle, collider: &mut Collider, a: BodyHandle, b: BodyHandle) -> bool {
        if a == b {
            return false;
        }
        let Some([body_a, body_b]) = self.bodies.get_disjoint_mut([a, b]) else {
            return false;
        };
        if !body_a.enabled || !body_b.enabled {
            return false;
        }
        if !body_a.filter.accepts(body_b.filter, self.mutual) {
            return false;
        }
        let in_contact = if collider.overlap_only {
            body_a.aabb().intersects(&body_b.aabb())
        } else {
            bodies_in_contact(body_a, body_b, &self.opts)
        };
        if !in_contact {
            return false;
        }

        let contact = Contact { collider: ch, a, a_body: body_a, b: Partner::Body { handle: b, body: body_b } };
        if !collider.allows(&contact) {
            return false;
        }

        if collider.overlap_only {
            Narrowphase::overlap_bodies(body_a, body_b, &self.opts);
        } else {
            Narrowphase::separate_bodies(body_a, body_b, &self.opts);
        }

        let contact = Contact { collider: ch, a, a_body: body_a, b: Partner::Body { handle: b, body: body_b } };
        collider.notify(&contact);
        self.report(ch, collider.overlap_only, a, PartnerKey::Body(b));
        true
    }

    fn body_tile(
        &mut self,
        ch: ColliderHandle,
        collider: &mut Collider,
        a: BodyHandle,
        layer: TileLayerHandle,
        tile: &Tile,
        hooks: Option<&mut TileHooks>,
    ) -> bool {
        let Some(body) = self.bodies.get_mut(a) else {
            return false;
        };
        let in_contact = if collider.overlap_only {
            tile.collides() && body.aabb().intersects(&tile.bounds)
        } else {
            touches_tile(body, tile, &self.opts)
        };
        if !in_contact {
            return false;
        }

        let partner = Partner::Tile { layer, tile: *tile };
        if !collider.allows(&Contact { collider: ch, a, a_body: body, b: partner }) {
            return false;
        }
        if let Some(hooks) = hooks {
            if !hooks.allows(&Contact { collider: ch, a, a_body: body, b: partner }) {
                return false;
            }
        }

        if collider.overlap_only {
            Narrowphase::overlap_tile(body, tile, &self.opts);
        } else {
            Narrowphase::separate_tile(body, tile, &self.opts);
        }

        collider.notify(&Contact { collider: ch, a, a_body: body, b: partner });
        self.report(ch, collider.overlap_only, a, partner.key());
        true
    }

    fn report(&mut self, collider: ColliderHandle, overlap_only: bool, a: BodyHandle, b: PartnerKey) {
        if !self.emit {
            return;
        }
        let ev = if overlap_only {
            WorldEvent::Overlap { collider, a, b }
        } else {
            WorldEvent::Collide { collider, a, b }
        };
        push_event(self.events, self.max_events, ev);
    }
}

fn push_event(buf: &mut Vec<WorldEvent>, max: usize, ev: WorldEvent) {
    if buf.len() < max {
        buf.push(ev);
    }
}

/// `v` folded into `[lo, hi)`.
fn wrap_value(v: f32, lo: f32, hi: f32) -> f32 {
    let range = hi - lo;
    if range > 0.0 { lo + (v - lo).rem_euclid(range) } else { v }
}

fn elapsed_ms(t: Option<Instant>) -> f64 {
    t.map(|t| t.elapsed().as_secs_f64() * 1000.0).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::TileGrid;
    use std::cell::{Cell, RefCell};

    fn cfg() -> WorldConfig {
        WorldConfig {
            bounds: Aabb::new(Vec2::splat(-1000.0), Vec2::splat(1000.0)),
            ..WorldConfig::default()
        }
    }

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(cfg())
    }

    #[test]
    fn test_free_fall_euler() {
        let mut w = PhysicsWorld::new(WorldConfig { gravity: Vec2::new(0.0, 100.0), ..cfg() });
        let p = w.create_body(1, Vec2::new(100.0, 0.0), Vec2::splat(10.0));
        w.body_mut(p).unwrap().set_velocity(Vec2::new(0.0, 50.0));
        w.step(1.0).unwrap();
        let b = w.body(p).unwrap();
        assert!((b.velocity().y - 150.0).abs() < 1e-4);
        assert!((b.position().y - 50.0).abs() < 1e-4);
        assert!((b.position().x - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_body_lands_on_tile_layer() {
        let mut grid = TileGrid::new(Vec2::ZERO, Vec2::splat(16.0), 1, 2);
        grid.set_tile(0, 1, 1, Faces::new(true, false, false, false));
        let mut w = world();
        let layer = w.attach_tile_layer(Rc::new(grid));
        let body = w.create_body(1, Vec2::ZERO, Vec2::splat(16.0));
        w.body_mut(body).unwrap().set_velocity(Vec2::new(0.0, 100.0));
        w.add_collider(Collider::new(body, layer)).unwrap();

        w.step(0.1).unwrap();
        let b = w.body(body).unwrap();
        assert!(b.position().y.abs() < 1e-4);
        assert!(b.blocked().down && b.on_floor());
        assert!(b.velocity().y.abs() < 1e-6);
        let evs = w.drain_events();
        assert!(evs.iter().any(|e| matches!(e, WorldEvent::Collide { b: PartnerKey::Tile { col: 0, row: 1, .. }, .. })));
    }

    #[test]
    fn test_head_on_pair_splits_overlap() {
        let mut w = world();
        let a = w.create_body(1, Vec2::new(-5.0, 0.0), Vec2::splat(20.0));
        let b = w.create_body(2, Vec2::new(15.0, 0.0), Vec2::splat(20.0));
        w.body_mut(a).unwrap().set_velocity(Vec2::new(50.0, 0.0));
        w.body_mut(b).unwrap().set_velocity(Vec2::new(-50.0, 0.0));
        w.add_collider(Collider::new(a, b)).unwrap();

        // Integration alone leaves A at 0 and B at 10: 10px of overlap
        w.step(0.1).unwrap();
        let (ba, bb) = (w.body(a).unwrap(), w.body(b).unwrap());
        assert!((ba.position().x - -5.0).abs() < 1e-4);
        assert!((bb.position().x - 15.0).abs() < 1e-4);
        assert!(ba.touching().right && bb.touching().left);
        assert!((ba.velocity().x - bb.velocity().x).abs() < 1e-4);
        assert_eq!(w.debug_stats().contacts, 1);
    }

    #[test]
    fn test_process_veto_skips_resolution() {
        let mut w = world();
        let a = w.create_body(1, Vec2::ZERO, Vec2::splat(10.0));
        let b = w.create_body(2, Vec2::new(5.0, 0.0), Vec2::splat(10.0));
        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        w.add_collider(Collider::new(a, b).on_process(|_| false).on_collide(move |_| seen.set(seen.get() + 1)))
            .unwrap();
        w.step(0.016).unwrap();
        assert_eq!(w.body(a).unwrap().position(), Vec2::ZERO);
        assert_eq!(w.body(b).unwrap().position(), Vec2::new(5.0, 0.0));
        assert_eq!(w.body(a).unwrap().touching(), Faces::NONE);
        assert_eq!(hits.get(), 0);
        assert_eq!(w.debug_stats().contacts, 0);
    }

    #[test]
    fn test_overlap_only_reports_without_moving() {
        let mut w = world();
        let group = w.create_group();
        let a = w.create_body(1, Vec2::ZERO, Vec2::splat(10.0));
        let b = w.create_body(2, Vec2::new(4.0, 0.0), Vec2::splat(10.0));
        w.body_mut(a).unwrap().set_velocity(Vec2::new(10.0, 0.0));
        w.add_to_group(group, b).unwrap();
        let h = w.add_collider(Collider::new(a, group).overlap_only()).unwrap();

        for _ in 0..3 {
            w.step(0.1).unwrap();
        }
        let ba = w.body(a).unwrap();
        assert!((ba.position().x - 3.0).abs() < 1e-4);
        assert_eq!(ba.velocity(), Vec2::new(10.0, 0.0));
        assert_eq!(w.body(b).unwrap().position(), Vec2::new(4.0, 0.0));
        assert!(ba.touching().right);
        let overlaps =
            w.drain_events().iter().filter(|e| matches!(e, WorldEvent::Overlap { collider, .. } if *collider == h)).count();
        assert_eq!(overlaps, 3);
    }

    #[test]
    fn test_stale_collider_removed() {
        let mut w = world();
        let a = w.create_body(1, Vec2::ZERO, Vec2::splat(10.0));
        let b = w.create_body(2, Vec2::new(5.0, 0.0), Vec2::splat(10.0));
        let h = w.add_collider(Collider::new(a, b).named("doomed")).unwrap();
        assert!(w.destroy_body(b).is_some());
        assert!(w.destroy_body(b).is_none());

        w.step(0.016).unwrap();
        assert_eq!(w.debug_stats().stale_colliders_removed, 1);
        assert!(w.collider(h).is_none());
        assert!(!w.remove_collider(h));
        w.step(0.016).unwrap();
        assert_eq!(w.debug_stats().stale_colliders_removed, 0);
    }

    #[test]
    fn test_add_collider_validates_handles() {
        let mut w = world();
        let a = w.create_body(1, Vec2::ZERO, Vec2::ONE);
        let gone = w.create_body(2, Vec2::ZERO, Vec2::ONE);
        w.destroy_body(gone);
        assert_eq!(w.add_collider(Collider::new(a, gone)).unwrap_err(), PhysicsError::StaleBody(gone));

        let g = w.create_group();
        w.destroy_group(g);
        assert_eq!(w.add_collider(Collider::new(g, a)).unwrap_err(), PhysicsError::StaleGroup(g));

        let l0 = w.attach_tile_layer(Rc::new(TileGrid::new(Vec2::ZERO, Vec2::ONE, 1, 1)));
        let l1 = w.attach_tile_layer(Rc::new(TileGrid::new(Vec2::ZERO, Vec2::ONE, 1, 1)));
        assert!(matches!(w.add_collider(Collider::new(l0, l1)), Err(PhysicsError::InvalidCollider(_))));
        // Tile layer on the source side is flipped onto the target
        let h = w.add_collider(Collider::new(l0, a)).unwrap();
        assert_eq!(w.collider(h).unwrap().target(), ColliderTarget::TileLayer(l0));
        assert!(w.detach_tile_layer(l1));
        assert_eq!(w.add_collider(Collider::new(a, l1)).unwrap_err(), PhysicsError::StaleTileLayer(l1));
    }

    #[test]
    fn test_bounds_containment() {
        let bounds = Aabb::new(Vec2::ZERO, Vec2::new(200.0, 100.0));
        let mut w = PhysicsWorld::new(WorldConfig { bounds, gravity: Vec2::new(0.0, 300.0), ..WorldConfig::default() });
        let mut handles = Vec::new();
        for (i, v) in [Vec2::new(-400.0, 0.0), Vec2::new(500.0, -200.0), Vec2::new(0.0, 900.0)].into_iter().enumerate() {
            let h = w.create_body(i as u64, Vec2::new(90.0, 40.0), Vec2::splat(10.0));
            w.body_mut(h).unwrap().set_velocity(v).set_collide_world_bounds(true);
            handles.push(h);
        }
        for _ in 0..20 {
            w.step(1.0 / 30.0).unwrap();
            for &h in &handles {
                assert!(bounds.contains(&w.body(h).unwrap().aabb()));
            }
        }
        let evs = w.drain_events();
        assert!(evs.iter().any(|e| matches!(e, WorldEvent::WorldBounds { faces, .. } if faces.left)));
        assert!(evs.iter().any(|e| matches!(e, WorldEvent::WorldBounds { faces, .. } if faces.down)));
    }

    #[test]
    fn test_custom_bounds_override_world() {
        let mut w = world();
        let h = w.create_body(1, Vec2::new(5.0, 5.0), Vec2::splat(10.0));
        w.body_mut(h)
            .unwrap()
            .set_velocity(Vec2::new(100.0, 0.0))
            .set_collide_world_bounds(true)
            .set_custom_bounds(Some(Aabb::new(Vec2::ZERO, Vec2::new(20.0, 20.0))));
        w.step(0.1).unwrap();
        let b = w.body(h).unwrap();
        assert!((b.position().x - 10.0).abs() < 1e-5);
        assert!(b.blocked().right);
    }

    fn crowd(kind: BroadPhaseKind) -> Vec<Vec2> {
        let mut w = PhysicsWorld::new(WorldConfig {
            gravity: Vec2::new(0.0, 200.0),
            bounds: Aabb::new(Vec2::ZERO, Vec2::new(160.0, 120.0)),
            broadphase: kind,
            ..WorldConfig::default()
        });
        let group = w.create_group();
        let mut handles = Vec::new();
        for i in 0..24 {
            let pos = Vec2::new((i % 6) as f32 * 22.0 + (i / 6) as f32 * 3.0, (i / 6) as f32 * 18.0);
            let h = w.create_body(i, pos, Vec2::new(14.0, 12.0));
            w.body_mut(h)
                .unwrap()
                .set_velocity(Vec2::new(((i * 37) % 11) as f32 * 10.0 - 50.0, 0.0))
                .set_bounce(Vec2::splat(0.2))
                .set_collide_world_bounds(true);
            w.add_to_group(group, h).unwrap();
            handles.push(h);
        }
        w.add_collider(Collider::new(group, group)).unwrap();
        for _ in 0..60 {
            w.step(1.0 / 60.0).unwrap();
        }
        handles.iter().map(|&h| w.body(h).unwrap().position()).collect()
    }

    #[test]
    fn test_runs_are_deterministic() {
        let grid = BroadPhaseKind::UniformGrid { cell_size: 20.0 };
        assert_eq!(crowd(BroadPhaseKind::SweepAndPrune), crowd(BroadPhaseKind::SweepAndPrune));
        assert_eq!(crowd(grid), crowd(grid));
        // Same candidate set, same resolution order
        assert_eq!(crowd(grid), crowd(BroadPhaseKind::SweepAndPrune));
    }

    #[test]
    fn test_groups_membership() {
        let mut w = world();
        let g = w.create_group();
        let a = w.create_body(1, Vec2::ZERO, Vec2::ONE);
        let b = w.create_body(2, Vec2::ZERO, Vec2::ONE);
        w.add_to_group(g, a).unwrap();
        w.add_to_group(g, a).unwrap();
        w.add_to_group(g, b).unwrap();
        assert_eq!(w.group_members(g).unwrap(), &[a, b]);
        assert!(w.remove_from_group(g, a));
        assert!(!w.remove_from_group(g, a));
        w.destroy_body(b);
        assert!(w.group_members(g).unwrap().is_empty());
        assert_eq!(w.add_to_group(g, b).unwrap_err(), PhysicsError::StaleBody(b));
        assert!(w.destroy_group(g));
        assert_eq!(w.add_to_group(g, a).unwrap_err(), PhysicsError::StaleGroup(g));
    }

    #[test]
    fn test_disabled_body_is_skipped() {
        let mut w = PhysicsWorld::new(WorldConfig { gravity: Vec2::new(0.0, 10.0), ..cfg() });
        let a = w.create_body(1, Vec2::ZERO, Vec2::splat(10.0));
        let b = w.create_body(2, Vec2::new(5.0, 0.0), Vec2::splat(10.0));
        w.add_collider(Collider::new(a, b)).unwrap();
        w.body_mut(a).unwrap().disable();
        w.step(1.0).unwrap();
        assert_eq!(w.body(a).unwrap().position(), Vec2::ZERO);
        assert_eq!(w.debug_stats().active_bodies, 1);
        assert_eq!(w.debug_stats().contacts, 0);
        assert!(w.bodies_overlapping(Aabb::new(Vec2::ZERO, Vec2::splat(3.0))).next().is_none());
        w.body_mut(a).unwrap().enable();
        assert_eq!(w.bodies_overlapping(Aabb::new(Vec2::ZERO, Vec2::splat(3.0))).collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_mask_mutual_consent() {
        let mut w = world();
        let a = w.create_body(1, Vec2::ZERO, Vec2::splat(10.0));
        let b = w.create_body(2, Vec2::new(5.0, 0.0), Vec2::splat(10.0));
        w.body_mut(a).unwrap().set_collision_filter(LayerMask::simple(1, 2));
        w.body_mut(b).unwrap().set_collision_filter(LayerMask::simple(2, 0));
        w.add_collider(Collider::new(a, b)).unwrap();
        w.step(0.0).unwrap();
        assert_eq!(w.body(b).unwrap().position(), Vec2::new(5.0, 0.0));

        w.cfg.require_mutual_consent = false;
        w.step(0.0).unwrap();
        assert!(w.body(b).unwrap().position().x > 5.0);
    }

    #[test]
    fn test_step_events_and_observer() {
        let mut w = PhysicsWorld::new(WorldConfig { max_events: 2, ..cfg() });
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        w.on_step(move |t, dt| sink.borrow_mut().push((t, dt)));
        for _ in 0..3 {
            w.step(0.5).unwrap();
        }
        // Buffer is capped; the observer sees every step
        let evs = w.drain_events();
        assert_eq!(evs.len(), 2);
        assert_eq!(evs[1], WorldEvent::Step { time: 1.0, delta: 0.5 });
        assert_eq!(log.borrow().len(), 3);
        assert!((log.borrow()[2].0 - 1.5).abs() < 1e-9);
        assert!(w.drain_events().is_empty());
        assert!((w.time() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_contact_events_can_be_muted() {
        let mut w = PhysicsWorld::new(WorldConfig { emit_contact_events: false, ..cfg() });
        let a = w.create_body(1, Vec2::ZERO, Vec2::splat(10.0));
        let b = w.create_body(2, Vec2::new(5.0, 0.0), Vec2::splat(10.0));
        w.add_collider(Collider::new(a, b)).unwrap();
        w.step(0.0).unwrap();
        let evs = w.drain_events();
        assert_eq!(evs.len(), 1);
        assert!(matches!(evs[0], WorldEvent::Step { .. }));
    }

    #[test]
    fn test_fixed_step_update() {
        let mut w = PhysicsWorld::new(WorldConfig { fps: 10.0, max_substeps: 3, ..cfg() });
        assert_eq!(w.update(0.25).unwrap(), 2);
        assert_eq!(w.update(0.06).unwrap(), 1);
        // Backlog beyond max_substeps is dropped
        assert_eq!(w.update(1.0).unwrap(), 3);
        assert_eq!(w.update(0.0).unwrap(), 0);

        w.pause();
        assert!(w.is_paused());
        assert_eq!(w.update(0.5).unwrap(), 0);
        w.resume();
        assert_eq!(w.update(0.1).unwrap(), 1);

        w.cfg.fixed_step = false;
        let before = w.time();
        assert_eq!(w.update(0.033).unwrap(), 1);
        assert!((w.time() - before - 0.033).abs() < 1e-6);
    }

    #[test]
    fn test_time_scale_slows_update() {
        let mut w = PhysicsWorld::new(WorldConfig { fps: 10.0, time_scale: 0.5, ..cfg() });
        assert_eq!(w.update(0.15).unwrap(), 0);
        assert_eq!(w.update(0.1).unwrap(), 1);
    }

    #[test]
    fn test_non_finite_delta_rejected() {
        let mut w = world();
        assert_eq!(w.step(f32::INFINITY).unwrap_err(), PhysicsError::NonFiniteDelta(f32::INFINITY));
        assert!(matches!(w.step(f32::NAN), Err(PhysicsError::NonFiniteDelta(_))));
        assert!(w.update(f32::NAN).is_err());
        // Negative deltas run as zero
        w.step(-1.0).unwrap();
        assert_eq!(w.time(), 0.0);
    }

    #[test]
    fn test_queries() {
        let mut w = world();
        let a = w.create_body(1, Vec2::new(10.0, -5.0), Vec2::splat(10.0));
        let b = w.create_body(2, Vec2::new(30.0, -5.0), Vec2::splat(10.0));
        let c = w.create_body(3, Vec2::new(-40.0, 40.0), Vec2::splat(5.0));

        assert_eq!(w.query_point(Vec2::new(12.0, 0.0)), vec![a]);
        let hits: Vec<_> = w.bodies_overlapping(Aabb::new(Vec2::new(0.0, -10.0), Vec2::new(35.0, 10.0))).collect();
        assert_eq!(hits, vec![a, b]);

        let (h, hit) = w.raycast(Vec2::ZERO, Vec2::X, 100.0).unwrap();
        assert_eq!(h, a);
        assert!((hit.toi - 10.0).abs() < 1e-5);
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));
        assert!(w.raycast(Vec2::ZERO, Vec2::X, 5.0).is_none());
        assert!(w.raycast(Vec2::ZERO, Vec2::ZERO, 100.0).is_none());

        w.body_mut(a).unwrap().disable();
        assert_eq!(w.raycast(Vec2::ZERO, Vec2::X, 100.0).map(|(h, _)| h), Some(b));
        assert_eq!(w.bodies().map(|(h, _)| h).collect::<Vec<_>>(), vec![a, b, c]);
    }

    #[test]
    fn test_platform_carries_rider() {
        let mut w = world();
        let platform = w.create_body(1, Vec2::new(0.0, 20.0), Vec2::new(60.0, 10.0));
        w.body_mut(platform).unwrap().set_movable(false).set_velocity(Vec2::new(30.0, 0.0));
        let rider = w.create_body(2, Vec2::new(10.0, 9.0), Vec2::splat(10.0));
        w.body_mut(rider).unwrap().set_velocity(Vec2::new(0.0, 20.0));
        w.add_collider(Collider::new(rider, platform)).unwrap();

        w.step(0.1).unwrap();
        let p = w.body(platform).unwrap();
        let r = w.body(rider).unwrap();
        assert!((p.position().x - 3.0).abs() < 1e-5);
        assert!((r.position().y - 10.0).abs() < 1e-5);
        assert!((r.position().x - 13.0).abs() < 1e-5);
        assert!(r.on_floor());
    }

    #[test]
    fn test_timing_when_enabled() {
        let mut w = PhysicsWorld::new(WorldConfig { enable_timing: true, ..cfg() });
        w.create_body(1, Vec2::ZERO, Vec2::ONE);
        w.step(0.016).unwrap();
        let t = w.timing().unwrap();
        assert!(t.total_ms >= 0.0);
        assert!(t.total_ms + 1e-9 >= t.integrate_ms);

        let mut quiet = world();
        quiet.step(0.016).unwrap();
        assert!(quiet.timing().is_none());
    }

    fn floor_world() -> (PhysicsWorld, TileLayerHandle) {
        let solids = [
            0, 0, 0, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0, //
            1, 1, 1, 1,
        ];
        let grid = TileGrid::from_solids(Vec2::ZERO, Vec2::splat(16.0), 4, 4, &solids);
        let mut w = PhysicsWorld::new(WorldConfig { gravity: Vec2::new(0.0, 600.0), ..cfg() });
        let layer = w.attach_tile_layer(Rc::new(grid));
        (w, layer)
    }

    #[test]
    fn test_resting_on_tile_floor_stays_grounded() {
        let (mut w, layer) = floor_world();
        let body = w.create_body(1, Vec2::new(16.0, 32.0), Vec2::splat(16.0));
        w.add_collider(Collider::new(body, layer)).unwrap();

        for _ in 0..10 {
            w.step(1.0 / 60.0).unwrap();
            let b = w.body(body).unwrap();
            assert!(b.on_floor());
            assert!((b.position().y - 32.0).abs() < 1e-4);
            assert!(b.velocity().y.abs() < 1e-6);
        }
    }

    #[test]
    fn test_resting_on_immovable_body_stays_grounded() {
        let mut w = PhysicsWorld::new(WorldConfig { gravity: Vec2::new(0.0, 600.0), ..cfg() });
        let ground = w.create_body(1, Vec2::new(0.0, 48.0), Vec2::new(64.0, 16.0));
        w.body_mut(ground).unwrap().set_movable(false).set_allow_gravity(false);
        let body = w.create_body(2, Vec2::new(16.0, 32.0), Vec2::splat(16.0));
        w.add_collider(Collider::new(body, ground)).unwrap();

        for _ in 0..10 {
            w.step(1.0 / 60.0).unwrap();
            let b = w.body(body).unwrap();
            assert!(b.on_floor());
            assert!((b.position().y - 32.0).abs() < 1e-4);
        }
        assert!(w.body(ground).unwrap().touching().up);
    }

    #[test]
    fn test_tile_callbacks_veto_contacts() {
        let (mut w, layer) = floor_world();
        let body = w.create_body(1, Vec2::new(16.0, 32.0), Vec2::splat(16.0));
        w.add_collider(Collider::new(body, layer)).unwrap();
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        w.set_tile_index_callback(layer, 1, move |_| {
            counter.set(counter.get() + 1);
            false
        })
        .unwrap();

        w.step(1.0 / 60.0).unwrap();
        w.step(1.0 / 60.0).unwrap();
        assert!(seen.get() > 0);
        assert!(!w.body(body).unwrap().on_floor());
        assert!(w.body(body).unwrap().position().y > 32.0);

        // A cell callback wins over the index callback for that cell
        let (mut w, layer) = floor_world();
        let body = w.create_body(1, Vec2::new(16.0, 32.0), Vec2::splat(16.0));
        w.add_collider(Collider::new(body, layer)).unwrap();
        w.set_tile_index_callback(layer, 1, |_| false).unwrap();
        w.set_tile_callback(layer, 1, 3, |_| true).unwrap();
        w.step(1.0 / 60.0).unwrap();
        assert!(w.body(body).unwrap().on_floor());

        assert!(w.clear_tile_callbacks(layer));
        assert!(!w.clear_tile_callbacks(layer));
        assert!(w.detach_tile_layer(layer));
        assert_eq!(w.set_tile_callback(layer, 0, 0, |_| true).unwrap_err(), PhysicsError::StaleTileLayer(layer));
    }

    #[test]
    fn test_collide_and_overlap_explicit_tiles() {
        let mut w = world();
        let body = w.create_body(1, Vec2::new(0.0, 40.0), Vec2::splat(16.0));
        let tile = |x: f32, y: f32, collide: Faces| Tile {
            index: 1,
            col: 0,
            row: 0,
            bounds: Aabb::from_pos_size(Vec2::new(x, y), Vec2::splat(16.0)),
            collide,
        };
        let tiles = [tile(0.0, 48.0, Faces::ALL), tile(0.0, 48.0, Faces::NONE), tile(200.0, 48.0, Faces::ALL)];

        assert_eq!(w.overlap_tiles(body, &tiles).unwrap(), 1);
        assert!((w.body(body).unwrap().position().y - 40.0).abs() < 1e-6);

        assert_eq!(w.collide_tiles(body, &tiles).unwrap(), 1);
        let b = w.body(body).unwrap();
        assert!((b.position().y - 32.0).abs() < 1e-4);
        assert!(b.blocked().down);

        w.body_mut(body).unwrap().disable();
        assert_eq!(w.collide_tiles(body, &tiles).unwrap(), 0);
        w.destroy_body(body);
        assert_eq!(w.collide_tiles(body, &tiles).unwrap_err(), PhysicsError::StaleBody(body));
        assert_eq!(w.overlap_tiles(body, &tiles).unwrap_err(), PhysicsError::StaleBody(body));
    }

    #[test]
    fn test_wrap_folds_into_bounds() {
        let mut w = PhysicsWorld::new(WorldConfig {
            bounds: Aabb::new(Vec2::ZERO, Vec2::splat(100.0)),
            ..WorldConfig::default()
        });
        let a = w.create_body(1, Vec2::new(105.0, -3.0), Vec2::splat(10.0));
        w.wrap(a, 0.0).unwrap();
        let p = w.body(a).unwrap().position();
        assert!((p.x - 5.0).abs() < 1e-4);
        assert!((p.y - 97.0).abs() < 1e-4);

        // Padding widens the wrap area
        w.body_mut(a).unwrap().set_position(Vec2::new(105.0, 50.0));
        w.wrap(a, 10.0).unwrap();
        assert!((w.body(a).unwrap().position().x - 105.0).abs() < 1e-4);

        let g = w.create_group();
        let b = w.create_body(2, Vec2::new(150.0, 0.0), Vec2::ONE);
        let c = w.create_body(3, Vec2::new(-50.0, 0.0), Vec2::ONE);
        w.add_to_group(g, b).unwrap();
        w.add_to_group(g, c).unwrap();
        w.wrap_group(g, 0.0).unwrap();
        assert!((w.body(b).unwrap().position().x - 50.0).abs() < 1e-4);
        assert!((w.body(c).unwrap().position().x - 50.0).abs() < 1e-4);

        w.destroy_group(g);
        assert_eq!(w.wrap_group(g, 0.0).unwrap_err(), PhysicsError::StaleGroup(g));
    }

    #[test]
    fn test_closest_and_furthest() {
        let mut w = world();
        let a = w.create_body(1, Vec2::new(0.0, 0.0), Vec2::splat(10.0));
        let b = w.create_body(2, Vec2::new(20.0, 0.0), Vec2::splat(10.0));
        let c = w.create_body(3, Vec2::new(-30.0, 0.0), Vec2::splat(10.0));
        let p = Vec2::new(0.0, 5.0);

        assert_eq!(w.closest(p, None), Some(a));
        // b and c are equally far; registration order breaks the tie
        assert_eq!(w.closest(p, Some(a)), Some(b));
        assert_eq!(w.furthest(p, None), Some(b));
        assert_eq!(w.furthest(p, Some(b)), Some(c));

        w.body_mut(a).unwrap().disable();
        assert_eq!(w.closest(p, None), Some(b));
        assert_eq!(PhysicsWorld::new(cfg()).closest(p, None), None);
    }

    #[test]
    fn test_overlap_bias_from_config() {
        let mut w = PhysicsWorld::new(WorldConfig { overlap_bias: Some(4.0), ..cfg() });
        let a = w.create_body(1, Vec2::ZERO, Vec2::splat(10.0));
        let b = w.create_body(2, Vec2::new(4.0, 0.0), Vec2::splat(10.0));
        w.add_collider(Collider::new(a, b)).unwrap();

        w.step(1.0 / 60.0).unwrap();
        assert!(w.body(a).unwrap().position().x.abs() < 1e-6);
        assert!((w.body(b).unwrap().position().x - 4.0).abs() < 1e-6);

        let mut w = world();
        let a = w.create_body(1, Vec2::ZERO, Vec2::splat(10.0));
        let b = w.create_body(2, Vec2::new(4.0, 0.0), Vec2::splat(10.0));
        w.add_collider(Collider::new(a, b)).unwrap();
        w.step(1.0 / 60.0).unwrap();
        assert!((w.body(b).unwrap().position().x - w.body(a).unwrap().position().x - 10.0).abs() < 1e-4);
    }
}
