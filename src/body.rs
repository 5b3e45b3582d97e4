use glam::Vec2;
use log::warn;

use crate::types::*;

/// Velocities below this magnitude are snapped to zero by exponential drag.
const DRAG_EPSILON: f32 = 1e-3;
/// Default per-axis velocity cap.
const DEFAULT_MAX_VELOCITY: f32 = 10_000.0;
const DEFAULT_MAX_ANGULAR: f32 = 1_000.0;

/// Kinematic/dynamic state of one simulated AABB.
///
/// `position` is the top-left corner of the box; the owning entity sits at
/// `position - offset`. All setters sanitize their input: a non-finite or
/// out-of-range value is replaced by a safe fallback and reported through
/// `log::warn!`, so a bad value never reaches integration.
#[derive(Clone, Debug)]
pub struct Body {
    pub(crate) owner: OwnerId,
    pub(crate) enabled: bool,

    pub(crate) position: Vec2,
    pub(crate) previous_position: Vec2,
    pub(crate) velocity: Vec2,
    pub(crate) acceleration: Vec2,
    pub(crate) gravity: Vec2,
    pub(crate) drag: Vec2,
    pub(crate) drag_mode: DragMode,
    pub(crate) bounce: Vec2,
    pub(crate) friction: Vec2,
    pub(crate) size: Vec2,
    pub(crate) offset: Vec2,
    pub(crate) mass: f32,
    pub(crate) max_velocity: Vec2,
    pub(crate) max_speed: Option<f32>,

    pub(crate) rotation: f32,
    pub(crate) angular_velocity: f32,
    pub(crate) angular_acceleration: f32,
    pub(crate) angular_drag: f32,
    pub(crate) max_angular: f32,

    pub(crate) allow_gravity: bool,
    pub(crate) allow_drag: bool,
    pub(crate) allow_rotation: bool,
    pub(crate) movable: bool,
    pub(crate) moves: bool,

    pub(crate) collide_world_bounds: bool,
    pub(crate) custom_bounds: Option<Aabb>,
    pub(crate) world_bounce: Option<Vec2>,
    pub(crate) check_collision: Faces,
    pub(crate) filter: LayerMask,

    pub(crate) blocked: Faces,
    pub(crate) touching: Faces,
    pub(crate) was_touching: Faces,
}

impl Body {
    pub fn new(owner: OwnerId, position: Vec2, size: Vec2) -> Self {
        let position = finite_or(position, Vec2::ZERO, "position");
        let size = sanitize_size(size, Vec2::ONE);
        Self {
            owner,
            enabled: true,
            position,
            previous_position: position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            gravity: Vec2::ZERO,
            drag: Vec2::ZERO,
            drag_mode: DragMode::default(),
            bounce: Vec2::ZERO,
            friction: Vec2::new(1.0, 0.0),
            size,
            offset: Vec2::ZERO,
            mass: 1.0,
            max_velocity: Vec2::splat(DEFAULT_MAX_VELOCITY),
            max_speed: None,
            rotation: 0.0,
            angular_velocity: 0.0,
            angular_acceleration: 0.0,
            angular_drag: 0.0,
            max_angular: DEFAULT_MAX_ANGULAR,
            allow_gravity: true,
            allow_drag: true,
            allow_rotation: true,
            movable: true,
            moves: true,
            collide_world_bounds: false,
            custom_bounds: None,
            world_bounce: None,
            check_collision: Faces::ALL,
            filter: LayerMask::default(),
            blocked: Faces::NONE,
            touching: Faces::NONE,
            was_touching: Faces::NONE,
        }
    }

    // --- Derived state -----------------------------------------------------

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Movable and with positive mass. Only movable bodies are pushed by separation.
    pub fn is_movable(&self) -> bool {
        self.movable && self.mass > 0.0
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_pos_size(self.position, self.size)
    }

    pub fn previous_aabb(&self) -> Aabb {
        Aabb::from_pos_size(self.previous_position, self.size)
    }

    pub fn center(&self) -> Vec2 {
        self.position + self.size * 0.5
    }

    /// Distance moved since the start of the current step.
    pub fn delta(&self) -> Vec2 {
        self.position - self.previous_position
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Position of the owning entity (box corner minus offset).
    pub fn entity_position(&self) -> Vec2 {
        self.position - self.offset
    }

    pub fn on_floor(&self) -> bool {
        self.blocked.down
    }

    pub fn on_ceiling(&self) -> bool {
        self.blocked.up
    }

    pub fn on_wall(&self) -> bool {
        self.blocked.left || self.blocked.right
    }

    /// Faces touching now that were not touching on the previous step.
    pub fn touch_started(&self) -> Faces {
        Faces {
            up: self.touching.up && !self.was_touching.up,
            down: self.touching.down && !self.was_touching.down,
            left: self.touching.left && !self.was_touching.left,
            right: self.touching.right && !self.was_touching.right,
        }
    }

    // --- Getters -----------------------------------------------------------

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn previous_position(&self) -> Vec2 {
        self.previous_position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn acceleration(&self) -> Vec2 {
        self.acceleration
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn drag(&self) -> Vec2 {
        self.drag
    }

    pub fn drag_mode(&self) -> DragMode {
        self.drag_mode
    }

    pub fn bounce(&self) -> Vec2 {
        self.bounce
    }

    pub fn friction(&self) -> Vec2 {
        self.friction
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn max_velocity(&self) -> Vec2 {
        self.max_velocity
    }

    pub fn max_speed(&self) -> Option<f32> {
        self.max_speed
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    pub fn moves(&self) -> bool {
        self.moves
    }

    pub fn collide_world_bounds(&self) -> bool {
        self.collide_world_bounds
    }

    pub fn custom_bounds(&self) -> Option<Aabb> {
        self.custom_bounds
    }

    pub fn check_collision(&self) -> Faces {
        self.check_collision
    }

    pub fn collision_filter(&self) -> LayerMask {
        self.filter
    }

    /// Sides pushed by a separation (or bounds clamp) during the last step.
    pub fn blocked(&self) -> Faces {
        self.blocked
    }

    pub fn touching(&self) -> Faces {
        self.touching
    }

    pub fn was_touching(&self) -> Faces {
        self.was_touching
    }

    // --- Setters -----------------------------------------------------------

    pub fn enable(&mut self) -> &mut Self {
        self.enabled = true;
        self
    }

    pub fn disable(&mut self) -> &mut Self {
        self.enabled = false;
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.enabled = enabled;
        self
    }

    /// Teleport: the move does not count as motion for this step.
    pub fn set_position(&mut self, position: Vec2) -> &mut Self {
        self.position = finite_or(position, self.position, "position");
        self.previous_position = self.position;
        self
    }

    pub fn set_velocity(&mut self, velocity: Vec2) -> &mut Self {
        self.velocity = finite_or(velocity, self.velocity, "velocity");
        self
    }

    pub fn set_acceleration(&mut self, acceleration: Vec2) -> &mut Self {
        self.acceleration = finite_or(acceleration, self.acceleration, "acceleration");
        self
    }

    /// Per-body gravity, added to the world's.
    pub fn set_gravity(&mut self, gravity: Vec2) -> &mut Self {
        self.gravity = finite_or(gravity, self.gravity, "gravity");
        self
    }

    pub fn set_drag(&mut self, drag: Vec2) -> &mut Self {
        self.drag = non_negative(drag, self.drag, "drag");
        self
    }

    pub fn set_drag_mode(&mut self, mode: DragMode) -> &mut Self {
        self.drag_mode = mode;
        self
    }

    /// Restitution per axis, clamped to `[0, 1]`.
    pub fn set_bounce(&mut self, bounce: Vec2) -> &mut Self {
        let b = finite_or(bounce, self.bounce, "bounce");
        let clamped = b.clamp(Vec2::ZERO, Vec2::ONE);
        if clamped != b {
            warn!("bounce {b} outside [0, 1], clamped to {clamped}");
        }
        self.bounce = clamped;
        self
    }

    pub fn set_friction(&mut self, friction: Vec2) -> &mut Self {
        self.friction = non_negative(friction, self.friction, "friction");
        self
    }

    /// Resize the box, keeping its top-left corner fixed.
    pub fn set_size(&mut self, size: Vec2) -> &mut Self {
        self.size = sanitize_size(size, self.size);
        self
    }

    /// Change the box offset; the entity origin stays where it is.
    pub fn set_offset(&mut self, offset: Vec2) -> &mut Self {
        let offset = finite_or(offset, self.offset, "offset");
        let shift = offset - self.offset;
        self.position += shift;
        self.previous_position += shift;
        self.offset = offset;
        self
    }

    /// Non-positive mass makes the body immovable.
    pub fn set_mass(&mut self, mass: f32) -> &mut Self {
        if !mass.is_finite() {
            warn!("non-finite mass {mass} ignored");
        } else {
            if mass < 0.0 {
                warn!("negative mass {mass}; body is treated as immovable");
            }
            self.mass = mass;
        }
        self
    }

    pub fn set_max_velocity(&mut self, max: Vec2) -> &mut Self {
        self.max_velocity = non_negative(max, self.max_velocity, "max_velocity");
        self
    }

    pub fn set_max_speed(&mut self, max: Option<f32>) -> &mut Self {
        self.max_speed = match max {
            Some(m) if !m.is_finite() || m < 0.0 => {
                warn!("invalid max_speed {m} ignored");
                self.max_speed
            }
            other => other,
        };
        self
    }

    pub fn set_rotation(&mut self, rotation: f32) -> &mut Self {
        self.rotation = finite_scalar(rotation, self.rotation, "rotation");
        self
    }

    pub fn set_angular_velocity(&mut self, w: f32) -> &mut Self {
        self.angular_velocity = finite_scalar(w, self.angular_velocity, "angular_velocity");
        self
    }

    pub fn set_angular_acceleration(&mut self, a: f32) -> &mut Self {
        self.angular_acceleration = finite_scalar(a, self.angular_acceleration, "angular_acceleration");
        self
    }

    pub fn set_angular_drag(&mut self, drag: f32) -> &mut Self {
        self.angular_drag = finite_scalar(drag, self.angular_drag, "angular_drag").max(0.0);
        self
    }

    pub fn set_max_angular(&mut self, max: f32) -> &mut Self {
        self.max_angular = finite_scalar(max, self.max_angular, "max_angular").abs();
        self
    }

    pub fn set_allow_gravity(&mut self, allow: bool) -> &mut Self {
        self.allow_gravity = allow;
        self
    }

    pub fn set_allow_drag(&mut self, allow: bool) -> &mut Self {
        self.allow_drag = allow;
        self
    }

    pub fn set_allow_rotation(&mut self, allow: bool) -> &mut Self {
        self.allow_rotation = allow;
        self
    }

    /// `false` pins the body against separation (it can still move by its own velocity).
    pub fn set_movable(&mut self, movable: bool) -> &mut Self {
        self.movable = movable;
        self
    }

    /// `false` stops integration entirely; position only changes via setters or separation.
    pub fn set_moves(&mut self, moves: bool) -> &mut Self {
        self.moves = moves;
        self
    }

    pub fn set_collide_world_bounds(&mut self, collide: bool) -> &mut Self {
        self.collide_world_bounds = collide;
        self
    }

    /// Replace the world bounds for this body only.
    pub fn set_custom_bounds(&mut self, bounds: Option<Aabb>) -> &mut Self {
        self.custom_bounds = match bounds {
            Some(b) if !(b.min.is_finite() && b.max.is_finite()) => {
                warn!("non-finite custom bounds ignored");
                self.custom_bounds
            }
            other => other,
        };
        self
    }

    /// Restitution against bounds; `None` uses `bounce`.
    pub fn set_world_bounce(&mut self, bounce: Option<Vec2>) -> &mut Self {
        self.world_bounce = bounce.map(|b| finite_or(b, Vec2::ZERO, "world_bounce").clamp(Vec2::ZERO, Vec2::ONE));
        self
    }

    pub fn set_check_collision(&mut self, faces: Faces) -> &mut Self {
        self.check_collision = faces;
        self
    }

    pub fn set_collision_filter(&mut self, filter: LayerMask) -> &mut Self {
        self.filter = filter;
        self
    }

    // --- Stepping ----------------------------------------------------------

    /// Advance one step. Returns `false` if the result was non-finite and had
    /// to be rolled back to the previous position.
    pub(crate) fn integrate(&mut self, dt: f32, world_gravity: Vec2, integrator: Integrator) -> bool {
        self.previous_position = self.position;
        self.reset_contacts();

        if !self.moves {
            return true;
        }

        let v_old = self.velocity;
        let v_new = if self.is_movable() {
            self.next_velocity(dt, world_gravity)
        } else {
            // Kinematic: own velocity only, no forces.
            v_old
        };
        let v_move = match integrator {
            Integrator::Euler => v_old,
            Integrator::SemiImplicitEuler => v_new,
        };
        self.velocity = v_new;
        self.position += v_move * dt;
        self.integrate_angular(dt);

        if !(self.position.is_finite() && self.velocity.is_finite() && self.rotation.is_finite()) {
            self.position = self.previous_position;
            self.velocity = Vec2::ZERO;
            if !self.rotation.is_finite() {
                self.rotation = 0.0;
            }
            self.angular_velocity = 0.0;
            return false;
        }
        true
    }

    /// Start-of-step bookkeeping for bodies that are not integrated.
    pub(crate) fn begin_step(&mut self) {
        self.previous_position = self.position;
        self.reset_contacts();
    }

    fn reset_contacts(&mut self) {
        self.blocked = Faces::NONE;
        self.was_touching = self.touching;
        self.touching = Faces::NONE;
    }

    fn next_velocity(&self, dt: f32, world_gravity: Vec2) -> Vec2 {
        let mut v = self.velocity;
        if self.allow_gravity {
            v += (world_gravity + self.gravity) * dt;
        }
        v += self.acceleration * dt;
        if self.allow_drag {
            v.x = apply_drag(v.x, self.acceleration.x, self.drag.x, self.drag_mode, dt);
            v.y = apply_drag(v.y, self.acceleration.y, self.drag.y, self.drag_mode, dt);
        }
        v = v.clamp(-self.max_velocity, self.max_velocity);
        if let Some(max) = self.max_speed {
            if v.length() > max {
                v = v.normalize_or_zero() * max;
            }
        }
        v
    }

    fn integrate_angular(&mut self, dt: f32) {
        let mut w = self.angular_velocity + self.angular_acceleration * dt;
        if self.allow_drag {
            w = apply_drag(w, self.angular_acceleration, self.angular_drag, self.drag_mode, dt);
        }
        self.angular_velocity = w.clamp(-self.max_angular, self.max_angular);
        if self.allow_rotation {
            self.rotation += self.angular_velocity * dt;
        }
    }
}

fn apply_drag(v: f32, acceleration: f32, drag: f32, mode: DragMode, dt: f32) -> f32 {
    if acceleration != 0.0 || drag <= 0.0 || v == 0.0 {
        return v;
    }
    match mode {
        DragMode::Exponential => {
            let decayed = v * (-drag * dt).exp();
            if decayed.abs() < DRAG_EPSILON { 0.0 } else { decayed }
        }
        DragMode::Linear => {
            let step = drag * dt;
            if v > step {
                v - step
            } else if v < -step {
                v + step
            } else {
                0.0
            }
        }
    }
}

fn finite_or(v: Vec2, fallback: Vec2, what: &str) -> Vec2 {
    let out = Vec2::new(
        if v.x.is_finite() { v.x } else { fallback.x },
        if v.y.is_finite() { v.y } else { fallback.y },
    );
    if !v.is_finite() {
        warn!("non-finite {what} {v} replaced with {out}");
    }
    out
}

fn finite_scalar(v: f32, fallback: f32, what: &str) -> f32 {
    if v.is_finite() {
        v
    } else {
        warn!("non-finite {what} {v} replaced with {fallback}");
        fallback
    }
}

fn non_negative(v: Vec2, fallback: Vec2, what: &str) -> Vec2 {
    let f = finite_or(v, fallback, what);
    if f.x < 0.0 || f.y < 0.0 {
        warn!("negative {what} {f} mirrored");
    }
    f.abs()
}

fn sanitize_size(size: Vec2, fallback: Vec2) -> Vec2 {
    let s = non_negative(size, fallback, "size");
    let out = s.max(Vec2::splat(MIN_BODY_SIZE));
    if out != s {
        warn!("zero size {s} raised to {out}");
    }
    out
}
