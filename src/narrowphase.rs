use glam::Vec2;

use crate::api::SeparationApi;
use crate::body::Body;
use crate::tiles::Tile;
use crate::types::*;

/// Stateless resolver; every call works on the bodies it is handed.
pub struct Narrowphase;

/// Knobs the resolver reads from the world configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResolveOptions {
    pub axis_order: AxisOrder,
    /// Tile penetrations at or below this depth are resting contact. A body
    /// flush with a tile or an immovable body, within this gap and moving
    /// into it, is resting contact too.
    pub tile_bias: f32,
    /// Body-pair penetrations deeper than this plus both bodies' motion on the
    /// axis are left alone instead of being popped apart.
    pub overlap_bias: Option<f32>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { axis_order: AxisOrder::default(), tile_bias: 1e-4, overlap_bias: None }
    }
}

impl From<&WorldConfig> for ResolveOptions {
    fn from(cfg: &WorldConfig) -> Self {
        Self {
            axis_order: cfg.axis_order,
            tile_bias: if cfg.tile_bias.is_finite() { cfg.tile_bias.max(0.0) } else { 0.0 },
            overlap_bias: cfg.overlap_bias.filter(|b| b.is_finite()).map(|b| b.max(0.0)),
        }
    }
}

/// Outcome of a separating call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// The boxes strictly intersected when the call started.
    pub overlapped: bool,
    /// An X separation (or resting contact) was applied.
    pub x: bool,
    pub y: bool,
    /// The pair was flush rather than intersecting; only flags and velocity changed.
    pub resting: bool,
}

impl Resolution {
    pub fn separated(&self) -> bool {
        self.x || self.y
    }

    fn mark(&mut self, axis: Axis) {
        match axis {
            Axis::X => self.x = true,
            Axis::Y => self.y = true,
        }
    }
}

/// Result of resolving one axis. A resolved axis leaves the pair apart (or in
/// resting contact), so the other axis is not visited; anything else moves on
/// to the other axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum AxisOutcome {
    Resolved,
    /// No overlap on this axis.
    Clear,
    /// A face mask, the pass-through guard or the overlap bias rejected the axis.
    Masked,
}

impl SeparationApi for Narrowphase {
    fn separate_bodies(a: &mut Body, b: &mut Body, opts: &ResolveOptions) -> Resolution {
        let (box_a, box_b) = (a.aabb(), b.aabb());
        if !box_a.intersects(&box_b) {
            return rest_bodies(a, b, opts.tile_bias);
        }
        let mut res = Resolution { overlapped: true, ..Resolution::default() };
        let order = axis_sequence(opts.axis_order, &box_a, &box_b);

        if !a.is_movable() && !b.is_movable() {
            mark_touching(a, b, order[0]);
            return res;
        }

        for axis in order {
            if separate_axis(a, b, axis, opts.overlap_bias) == AxisOutcome::Resolved {
                res.mark(axis);
                break;
            }
        }
        res
    }

    fn overlap_bodies(a: &mut Body, b: &mut Body, opts: &ResolveOptions) -> bool {
        let (box_a, box_b) = (a.aabb(), b.aabb());
        if !box_a.intersects(&box_b) {
            return false;
        }
        let axis = axis_sequence(opts.axis_order, &box_a, &box_b)[0];
        mark_touching(a, b, axis);
        true
    }

    fn separate_tile(body: &mut Body, tile: &Tile, opts: &ResolveOptions) -> Resolution {
        if !tile.collides() {
            return Resolution::default();
        }
        if !body.aabb().intersects(&tile.bounds) {
            return rest_on_tile(body, tile, opts.tile_bias);
        }
        let mut res = Resolution { overlapped: true, ..Resolution::default() };
        // Tiles never push kinematic or static bodies.
        if !body.is_movable() {
            return res;
        }

        let order = axis_sequence(opts.axis_order, &body.aabb(), &tile.bounds);
        // Culled or one-way faces fall through to the other axis.
        for axis in order {
            if separate_tile_axis(body, tile, axis, opts.tile_bias) == AxisOutcome::Resolved {
                res.mark(axis);
                break;
            }
        }
        res
    }

    fn overlap_tile(body: &mut Body, tile: &Tile, opts: &ResolveOptions) -> bool {
        let bb = body.aabb();
        if !tile.collides() || !bb.intersects(&tile.bounds) {
            return false;
        }
        let axis = axis_sequence(opts.axis_order, &bb, &tile.bounds)[0];
        let positive = leading_positive(
            &body.previous_aabb(),
            &bb,
            axis.of(body.delta()),
            &tile.bounds,
            &tile.bounds,
            0.0,
            axis,
        );
        if tile.collide.get(axis, !positive) && body.check_collision.get(axis, positive) {
            body.touching.set(axis, positive);
        }
        true
    }

    fn clamp_to_bounds(body: &mut Body, bounds: Aabb, check: Faces) -> Faces {
        let mut hit = Faces::NONE;
        let restitution = body.world_bounce.unwrap_or(body.bounce);

        for axis in [Axis::X, Axis::Y] {
            let size = axis.of(body.size);
            let lo = axis.of(bounds.min);
            let hi = axis.of(bounds.max);
            let pos = axis.of(body.position);
            let r = axis.of(restitution);

            let (positive, target) = if check.get(axis, false) && pos < lo {
                (false, lo)
            } else if check.get(axis, true) && pos + size > hi {
                (true, hi - size)
            } else {
                continue;
            };

            *axis.of_mut(&mut body.position) = target;
            let v = axis.of_mut(&mut body.velocity);
            let outward = if positive { *v > 0.0 } else { *v < 0.0 };
            if outward {
                *v = if r > 0.0 { -*v * r } else { 0.0 };
            }
            hit.set(axis, positive);
        }

        body.blocked = body.blocked.union(hit);
        hit
    }

    fn ray_aabb(origin: Vec2, dir: Vec2, aabb: &Aabb) -> Option<RayHit> {
        // Slab method with normal tracking
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut normal = Vec2::ZERO;

        for axis in [Axis::X, Axis::Y] {
            let o = axis.of(origin);
            let d = axis.of(dir);
            let (lo, hi) = (axis.of(aabb.min), axis.of(aabb.max));
            if d.abs() < f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t1 = (lo - o) * inv;
            let mut t2 = (hi - o) * inv;
            let mut n = -1.0;
            if t1 > t2 {
                core::mem::swap(&mut t1, &mut t2);
                n = 1.0;
            }
            if t1 > t_enter {
                t_enter = t1;
                normal = Vec2::ZERO;
                *axis.of_mut(&mut normal) = n;
            }
            t_exit = t_exit.min(t2);
            if t_enter > t_exit {
                return None;
            }
        }

        if t_exit < 0.0 {
            return None;
        }
        // Origin inside: immediate hit without a face
        let (toi, normal) = if t_enter < 0.0 { (0.0, Vec2::ZERO) } else { (t_enter, normal) };
        Some(RayHit { toi, normal, contact: origin + dir * toi })
    }
}

/// Resolution order for an overlapping pair.
fn axis_sequence(order: AxisOrder, a: &Aabb, b: &Aabb) -> [Axis; 2] {
    match order {
        AxisOrder::XThenY => [Axis::X, Axis::Y],
        AxisOrder::YThenX => [Axis::Y, Axis::X],
        AxisOrder::SmallerOverlapFirst => {
            if a.overlap_x(b) <= a.overlap_y(b) {
                [Axis::X, Axis::Y]
            } else {
                [Axis::Y, Axis::X]
            }
        }
    }
}

/// Whether `a` meets `b` with its positive (right/down) face on `axis`.
///
/// Pairs that came into contact this step are ordered by their relative
/// motion. Pairs that already overlapped on this axis, or did not move,
/// fall back to previous then current centres, then to `a` on the negative side.
fn leading_positive(
    a_prev: &Aabb,
    a_now: &Aabb,
    a_delta: f32,
    b_prev: &Aabb,
    b_now: &Aabb,
    b_delta: f32,
    axis: Axis,
) -> bool {
    if a_prev.overlap(b_prev, axis) <= 0.0 {
        let rel = a_delta - b_delta;
        if rel > 0.0 {
            return true;
        }
        if rel < 0.0 {
            return false;
        }
    }
    let (pa, pb) = (axis.of(a_prev.center()), axis.of(b_prev.center()));
    if pa != pb {
        return pa < pb;
    }
    let (ca, cb) = (axis.of(a_now.center()), axis.of(b_now.center()));
    if ca != cb {
        return ca < cb;
    }
    true
}

fn body_side(a: &Body, b: &Body, axis: Axis) -> bool {
    leading_positive(
        &a.previous_aabb(),
        &a.aabb(),
        axis.of(a.delta()),
        &b.previous_aabb(),
        &b.aabb(),
        axis.of(b.delta()),
        axis,
    )
}

fn mark_touching(a: &mut Body, b: &mut Body, axis: Axis) {
    let positive = body_side(a, b, axis);
    if a.check_collision.get(axis, positive) && b.check_collision.get(axis, !positive) {
        a.touching.set(axis, positive);
        b.touching.set(axis, !positive);
    }
}

/// Mass fractions `(wa, wb)` of a movable pair, summing to 1.
///
/// Scaled by the larger mass first so two huge masses cannot overflow the sum.
fn mass_weights(a: &Body, b: &Body) -> (f32, f32) {
    let scale = a.mass.max(b.mass);
    let (ma, mb) = (a.mass / scale, b.mass / scale);
    let wa = ma / (ma + mb);
    (wa, 1.0 - wa)
}

/// Split `pen` between the pair by inverse mass. Immovable bodies take nothing.
fn shares(a: &Body, b: &Body, pen: f32) -> (f32, f32) {
    match (a.is_movable(), b.is_movable()) {
        (true, true) => {
            let (_, wb) = mass_weights(a, b);
            let share_a = pen * wb;
            (share_a, pen - share_a)
        }
        (true, false) => (pen, 0.0),
        (false, true) => (0.0, pen),
        (false, false) => (0.0, 0.0),
    }
}

fn separate_axis(a: &mut Body, b: &mut Body, axis: Axis, overlap_bias: Option<f32>) -> AxisOutcome {
    let (box_a, box_b) = (a.aabb(), b.aabb());
    if box_a.overlap(&box_b, axis) <= 0.0 {
        return AxisOutcome::Clear;
    }
    let positive = body_side(a, b, axis);
    if !a.check_collision.get(axis, positive) || !b.check_collision.get(axis, !positive) {
        return AxisOutcome::Masked;
    }

    let pen = if positive {
        axis.of(box_a.max) - axis.of(box_b.min)
    } else {
        axis.of(box_b.max) - axis.of(box_a.min)
    };
    if let Some(bias) = overlap_bias {
        // Deeper than this step's motion can explain: leave it to the other axis.
        let reach = axis.of(a.delta()).abs() + axis.of(b.delta()).abs() + bias;
        if pen > reach {
            return AxisOutcome::Masked;
        }
    }
    let (share_a, share_b) = shares(a, b, pen);
    let dir = if positive { 1.0 } else { -1.0 };
    *axis.of_mut(&mut a.position) -= share_a * dir;
    *axis.of_mut(&mut b.position) += share_b * dir;

    a.touching.set(axis, positive);
    b.touching.set(axis, !positive);
    if share_a > 0.0 {
        a.blocked.set(axis, positive);
    }
    if share_b > 0.0 {
        b.blocked.set(axis, !positive);
    }

    exchange_velocity(a, b, axis, positive);

    if axis == Axis::Y {
        carry_rider(a, b, positive);
    }
    AxisOutcome::Resolved
}

/// Restitution about the pair's centre-of-mass velocity, only while approaching.
fn exchange_velocity(a: &mut Body, b: &mut Body, axis: Axis, a_positive: bool) {
    let va = axis.of(a.velocity);
    let vb = axis.of(b.velocity);
    let closing = if a_positive { va - vb } else { vb - va };
    if closing <= 0.0 {
        return;
    }
    let (move_a, move_b) = (a.is_movable(), b.is_movable());
    let v_cm = match (move_a, move_b) {
        (true, true) => {
            let (wa, wb) = mass_weights(a, b);
            wa * va + wb * vb
        }
        (true, false) => vb,
        (false, true) => va,
        (false, false) => return,
    };
    if move_a {
        *axis.of_mut(&mut a.velocity) = v_cm + (v_cm - va) * axis.of(a.bounce);
    }
    if move_b {
        *axis.of_mut(&mut b.velocity) = v_cm + (v_cm - vb) * axis.of(b.bounce);
    }
}

/// A movable body standing on a moving immovable one rides along X.
fn carry_rider(a: &mut Body, b: &mut Body, a_on_top: bool) {
    let (rider, carrier) = if a_on_top { (a, &*b) } else { (b, &*a) };
    if !rider.is_movable() || carrier.is_movable() {
        return;
    }
    let dx = carrier.delta().x * carrier.friction.x;
    if dx != 0.0 {
        rider.position.x += dx;
    }
}

/// Gap still counted as flush near coordinate `at`: `bias` plus a few ulps,
/// so a body pushed out last step is not lost to rounding.
fn flush_tolerance(bias: f32, at: f32) -> f32 {
    bias + 4.0 * f32::EPSILON * at.abs().max(1.0)
}

/// Axis and side on which `bb` sits flush against `other`: the gap is within
/// tolerance, the boxes overlap on the other axis, and `v` carries `bb` into
/// `other`. `true` means `bb` meets `other` with its right/down face.
fn flush_axis(bb: &Aabb, other: &Aabb, v: Vec2, bias: f32) -> Option<(Axis, bool)> {
    [Axis::X, Axis::Y].into_iter().find_map(|axis| {
        let gap = -bb.overlap(other, axis);
        let at = axis.of(other.min).abs().max(axis.of(other.max).abs());
        if gap < 0.0 || gap > flush_tolerance(bias, at) || bb.overlap(other, axis.other()) <= 0.0 {
            return None;
        }
        let positive = axis.of(bb.center()) < axis.of(other.center());
        let into = if positive { axis.of(v) > 0.0 } else { axis.of(v) < 0.0 };
        into.then_some((axis, positive))
    })
}

/// Flush contact between a movable body and an immovable one, both faces enabled.
fn body_rest_axis(a: &Body, b: &Body, bias: f32) -> Option<(Axis, bool)> {
    if a.is_movable() == b.is_movable() {
        return None;
    }
    let (axis, positive) = flush_axis(&a.aabb(), &b.aabb(), a.velocity - b.velocity, bias)?;
    (a.check_collision.get(axis, positive) && b.check_collision.get(axis, !positive)).then_some((axis, positive))
}

fn tile_rest_axis(body: &Body, tile: &Tile, bias: f32) -> Option<(Axis, bool)> {
    if !body.is_movable() || !tile.collides() {
        return None;
    }
    let (axis, positive) = flush_axis(&body.aabb(), &tile.bounds, body.velocity, bias)?;
    (tile.collide.get(axis, !positive) && body.check_collision.get(axis, positive)).then_some((axis, positive))
}

/// The pair intersects, or rests flush against each other.
pub(crate) fn bodies_in_contact(a: &Body, b: &Body, opts: &ResolveOptions) -> bool {
    a.aabb().intersects(&b.aabb()) || body_rest_axis(a, b, opts.tile_bias).is_some()
}

/// The body intersects a colliding tile, or rests flush on one of its faces.
pub(crate) fn touches_tile(body: &Body, tile: &Tile, opts: &ResolveOptions) -> bool {
    tile.collides() && (body.aabb().intersects(&tile.bounds) || tile_rest_axis(body, tile, opts.tile_bias).is_some())
}

/// Keep a flush body in contact with an immovable partner: flags, matched
/// velocity along the axis, and riding. Nothing is moved apart.
fn rest_bodies(a: &mut Body, b: &mut Body, bias: f32) -> Resolution {
    let Some((axis, positive)) = body_rest_axis(a, b, bias) else {
        return Resolution::default();
    };
    a.touching.set(axis, positive);
    b.touching.set(axis, !positive);
    if axis == Axis::Y {
        carry_rider(a, b, positive);
    }
    let (body, other, side) = if a.is_movable() { (a, &*b, positive) } else { (b, &*a, !positive) };
    body.blocked.set(axis, side);
    *axis.of_mut(&mut body.velocity) = axis.of(other.velocity);

    let mut res = Resolution { resting: true, ..Resolution::default() };
    res.mark(axis);
    res
}

fn rest_on_tile(body: &mut Body, tile: &Tile, bias: f32) -> Resolution {
    let Some((axis, positive)) = tile_rest_axis(body, tile, bias) else {
        return Resolution::default();
    };
    body.touching.set(axis, positive);
    body.blocked.set(axis, positive);
    *axis.of_mut(&mut body.velocity) = 0.0;

    let mut res = Resolution { resting: true, ..Resolution::default() };
    res.mark(axis);
    res
}

fn separate_tile_axis(body: &mut Body, tile: &Tile, axis: Axis, bias: f32) -> AxisOutcome {
    let bb = body.aabb();
    if bb.overlap(&tile.bounds, axis) <= 0.0 {
        return AxisOutcome::Clear;
    }
    let prev = body.previous_aabb();
    let positive = leading_positive(&prev, &bb, axis.of(body.delta()), &tile.bounds, &tile.bounds, 0.0, axis);

    // Moving down needs the tile's top face, and so on.
    if !tile.collide.get(axis, !positive) || !body.check_collision.get(axis, positive) {
        return AxisOutcome::Masked;
    }

    // Without a far face to stop it, only a body that started outside the near
    // face may be caught (one-way platforms, culled stacks).
    if !tile.collide.get(axis, positive) {
        let started_outside = if positive {
            axis.of(prev.max) <= axis.of(tile.bounds.min) + bias
        } else {
            axis.of(prev.min) >= axis.of(tile.bounds.max) - bias
        };
        if !started_outside {
            return AxisOutcome::Masked;
        }
    }

    let pen = if positive {
        axis.of(bb.max) - axis.of(tile.bounds.min)
    } else {
        axis.of(tile.bounds.max) - axis.of(bb.min)
    };
    if pen > bias {
        let dir = if positive { 1.0 } else { -1.0 };
        *axis.of_mut(&mut body.position) -= pen * dir;
    }

    body.touching.set(axis, positive);
    body.blocked.set(axis, positive);

    let bounce = axis.of(body.bounce);
    let v = axis.of_mut(&mut body.velocity);
    let approaching = if positive { *v > 0.0 } else { *v < 0.0 };
    if approaching {
        *v = if pen > bias && bounce > 0.0 { -*v * bounce } else { 0.0 };
    }
    AxisOutcome::Resolved
}
