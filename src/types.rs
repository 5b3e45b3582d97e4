use glam::Vec2;
use slotmap::new_key_type;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// User-defined opaque key carried through events/queries (e.g., pack your entity id).
pub type OwnerId = u64;

new_key_type! {
    /// Generational handle to a body owned by the world.
    pub struct BodyHandle;
    /// Handle to a registered collider.
    pub struct ColliderHandle;
    /// Handle to a world-owned group of bodies.
    pub struct GroupHandle;
    /// Handle to an attached (read-only) tile layer.
    pub struct TileLayerHandle;
}

/// Smallest extent a body may have on either axis.
pub const MIN_BODY_SIZE: f32 = 1e-3;

/// One of the two world axes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn of(self, v: Vec2) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
        }
    }

    pub fn of_mut(self, v: &mut Vec2) -> &mut f32 {
        match self {
            Axis::X => &mut v.x,
            Axis::Y => &mut v.y,
        }
    }

    pub fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

/// Four booleans, one per AABB face. Used for `blocked`, `touching`,
/// per-face collision masks and tile faces.
///
/// Y grows downwards: `up` is the face at `min.y`, `down` the face at `max.y`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Faces {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Faces {
    pub const NONE: Faces = Faces { up: false, down: false, left: false, right: false };
    pub const ALL: Faces = Faces { up: true, down: true, left: true, right: true };

    pub fn new(up: bool, down: bool, left: bool, right: bool) -> Self {
        Self { up, down, left, right }
    }

    pub fn any(self) -> bool {
        self.up || self.down || self.left || self.right
    }

    pub fn horizontal(self) -> bool {
        self.left || self.right
    }

    pub fn vertical(self) -> bool {
        self.up || self.down
    }

    /// Face on `axis` at the positive (`right`/`down`) or negative (`left`/`up`) end.
    pub fn get(self, axis: Axis, positive: bool) -> bool {
        match (axis, positive) {
            (Axis::X, true) => self.right,
            (Axis::X, false) => self.left,
            (Axis::Y, true) => self.down,
            (Axis::Y, false) => self.up,
        }
    }

    pub fn set(&mut self, axis: Axis, positive: bool) {
        match (axis, positive) {
            (Axis::X, true) => self.right = true,
            (Axis::X, false) => self.left = true,
            (Axis::Y, true) => self.down = true,
            (Axis::Y, false) => self.up = true,
        }
    }

    pub fn union(self, other: Faces) -> Faces {
        Faces {
            up: self.up || other.up,
            down: self.down || other.down,
            left: self.left || other.left,
            right: self.right || other.right,
        }
    }
}

/// Axis-aligned bounding box in world units (`min` is the top-left corner).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min: min.min(max), max: min.max(max) }
    }

    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self::new(pos, pos + size)
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Signed overlap along `axis` (`<= 0` means separated or touching).
    pub fn overlap(&self, other: &Aabb, axis: Axis) -> f32 {
        axis.of(self.max).min(axis.of(other.max)) - axis.of(self.min).max(axis.of(other.min))
    }

    pub fn overlap_x(&self, other: &Aabb) -> f32 {
        self.overlap(other, Axis::X)
    }

    pub fn overlap_y(&self, other: &Aabb) -> f32 {
        self.overlap(other, Axis::Y)
    }

    /// Strict intersection: boxes sharing only an edge do not intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.overlap_x(other) > 0.0 && self.overlap_y(other) > 0.0
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    /// Grow by `by` on every side (per axis).
    pub fn inflate(&self, by: Vec2) -> Aabb {
        let by = by.abs();
        Aabb { min: self.min - by, max: self.max + by }
    }

    pub fn translate(&self, d: Vec2) -> Aabb {
        Aabb { min: self.min + d, max: self.max + d }
    }
}

/// Bitmask-based filtering.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerMask {
    /// Layer(s) this body belongs to.
    pub layer: u32,
    /// Layers this body wants to collide with.
    pub collides_with: u32,
    /// Extra mask to exclude (applied after `collides_with`).
    pub exclude: u32,
}

impl Default for LayerMask {
    fn default() -> Self {
        Self { layer: 1, collides_with: u32::MAX, exclude: 0 }
    }
}

impl LayerMask {
    /// Convenience constructor.
    pub fn simple(layer: u32, collides_with: u32) -> Self {
        Self { layer, collides_with, exclude: 0 }
    }

    /// A may hit B iff `(A.collides_with & B.layer) != 0` AND `(A.exclude & B.layer) == 0`.
    pub fn allows(self, other: LayerMask) -> bool {
        let hit = (self.collides_with & other.layer) != 0;
        let blocked = (self.exclude & other.layer) != 0;
        hit && !blocked
    }

    /// Pair rule used by the world: one-sided or mutual.
    pub fn accepts(self, other: LayerMask, mutual: bool) -> bool {
        if mutual {
            self.allows(other) && other.allows(self)
        } else {
            self.allows(other) || other.allows(self)
        }
    }
}

/// Order in which the two axes of an overlapping pair are resolved.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AxisOrder {
    /// Minimum translation first: the axis with the smaller overlap.
    #[default]
    SmallerOverlapFirst,
    XThenY,
    YThenX,
}

/// How positions advance from velocities.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Integrator {
    /// `position += v_old * dt`, then velocity is updated.
    #[default]
    Euler,
    /// Velocity is updated first and the new velocity moves the body.
    SemiImplicitEuler,
}

/// Velocity decay applied on an axis with zero acceleration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DragMode {
    /// `v *= exp(-drag * dt)`; `drag` is a rate in 1/s.
    #[default]
    Exponential,
    /// `v -= sign(v) * drag * dt`, stopping at zero; `drag` is in units/s².
    Linear,
}

/// Candidate-pair strategy.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BroadPhaseKind {
    /// Sort by min x, sweep, confirm on y.
    #[default]
    SweepAndPrune,
    /// Hash grid of square cells (world units).
    UniformGrid { cell_size: f32 },
}

/// World-level configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorldConfig {
    /// Acceleration applied to every body with `allow_gravity` (units/s²).
    pub gravity: Vec2,
    /// World rectangle used by bodies with `collide_world_bounds`.
    pub bounds: Aabb,
    /// Which edges of `bounds` block bodies.
    pub bounds_collision: Faces,
    /// Tile penetrations at or below this depth are treated as resting contact,
    /// as are flush contacts with tiles and immovable bodies within this gap.
    pub tile_bias: f32,
    /// When set, a body-pair penetration deeper than this plus both bodies'
    /// motion on the axis is not separated on that axis.
    pub overlap_bias: Option<f32>,
    pub axis_order: AxisOrder,
    pub integrator: Integrator,
    pub broadphase: BroadPhaseKind,
    /// Fixed step rate used by `update` (steps per second).
    pub fps: f32,
    /// If false, `update` runs exactly one step of the frame's delta.
    pub fixed_step: bool,
    /// Multiplier applied to frame deltas fed to `update`.
    pub time_scale: f32,
    /// Cap on fixed steps per `update` call; excess time is dropped.
    pub max_substeps: u32,
    /// Both bodies' masks must accept each other (otherwise either suffices).
    pub require_mutual_consent: bool,
    /// Push `Collide`/`Overlap` events into the buffer as well as calling callbacks.
    pub emit_contact_events: bool,
    /// Maximum number of buffered events; extra are dropped.
    pub max_events: usize,
    /// Enable internal timing instrumentation (adds small overhead when true).
    pub enable_timing: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::ZERO,
            bounds: Aabb::new(Vec2::ZERO, Vec2::new(800.0, 600.0)),
            bounds_collision: Faces::ALL,
            tile_bias: 1e-4,
            overlap_bias: None,
            axis_order: AxisOrder::default(),
            integrator: Integrator::default(),
            broadphase: BroadPhaseKind::default(),
            fps: 60.0,
            fixed_step: true,
            time_scale: 1.0,
            max_substeps: 8,
            require_mutual_consent: true,
            emit_contact_events: true,
            max_events: 1024,
            enable_timing: false,
        }
    }
}

/// Ray hit result.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayHit {
    /// Ray parameter of the entry point (`origin + dir * toi`).
    pub toi: f32,
    /// Face normal at entry; `(0, 0)` when the ray starts inside the box.
    pub normal: Vec2,
    pub contact: Vec2,
}

/// What a body collided with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PartnerKey {
    Body(BodyHandle),
    Tile { layer: TileLayerHandle, index: u32, col: i32, row: i32 },
}

/// Events buffered during a step and drained by the host afterwards.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum WorldEvent {
    /// A step completed; `time` is the simulated time after the step.
    Step { time: f64, delta: f32 },
    /// A separating collider resolved (or vetted) a pair.
    Collide { collider: ColliderHandle, a: BodyHandle, b: PartnerKey },
    /// An overlap-only collider reported a pair.
    Overlap { collider: ColliderHandle, a: BodyHandle, b: PartnerKey },
    /// A body was clamped against the world (or its custom) bounds.
    WorldBounds { body: BodyHandle, owner: OwnerId, faces: Faces },
}

/// Debug statistics for the last completed step.
#[derive(Copy, Clone, Debug, Default)]
pub struct WorldStats {
    pub bodies: usize,
    pub active_bodies: usize,
    pub colliders: usize,
    /// Pairs produced by the broadphase (before narrowphase).
    pub candidate_pairs: usize,
    /// Pairs that actually overlapped and passed filtering.
    pub contacts: usize,
    /// Colliders removed because they referenced destroyed bodies/layers.
    pub stale_colliders_removed: usize,
}

/// Timing breakdown for the last completed step.
#[derive(Copy, Clone, Debug, Default)]
pub struct StepTiming {
    pub integrate_ms: f64,
    pub broadphase_ms: f64,
    pub colliders_ms: f64,
    pub bounds_ms: f64,
    pub total_ms: f64,
}
