use glam::Vec2;
use std::time::Instant;
use thud::*;

fn lcg(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    *seed
}

fn unit(seed: &mut u32) -> f32 {
    lcg(seed) as f32 / u32::MAX as f32
}

fn run(n: usize, broadphase: BroadPhaseKind) -> std::result::Result<(), PhysicsError> {
    let mut world = PhysicsWorld::new(WorldConfig {
        gravity: Vec2::new(0.0, 50.0),
        bounds: Aabb::new(Vec2::ZERO, Vec2::splat(2000.0)),
        broadphase,
        emit_contact_events: false,
        enable_timing: true,
        ..WorldConfig::default()
    });

    let mut seed = 1u32;
    let group = world.create_group();
    for i in 0..n {
        let pos = Vec2::new(unit(&mut seed) * 1980.0, unit(&mut seed) * 1980.0);
        let vel = Vec2::new(unit(&mut seed) * 80.0 - 40.0, unit(&mut seed) * 80.0 - 40.0);
        let h = world.create_body(i as u64, pos, Vec2::splat(6.0));
        if let Some(b) = world.body_mut(h) {
            b.set_velocity(vel).set_bounce(Vec2::splat(0.5)).set_collide_world_bounds(true);
        }
        world.add_to_group(group, h)?;
    }
    world.add_collider(Collider::new(group, group))?;

    let steps = 60;
    let mut acc = StepTiming::default();
    let t0 = Instant::now();
    for _ in 0..steps {
        world.step(1.0 / 60.0)?;
        if let Some(t) = world.timing() {
            acc.integrate_ms += t.integrate_ms;
            acc.broadphase_ms += t.broadphase_ms;
            acc.colliders_ms += t.colliders_ms;
            acc.bounds_ms += t.bounds_ms;
        }
    }
    let wall = t0.elapsed();
    let stats = world.debug_stats();
    println!(
        "N={} {:?} steps={} wall={:?} per-step: integrate={:.3}ms broadphase={:.3}ms colliders={:.3}ms bounds={:.3}ms pairs={} contacts={}",
        n,
        broadphase,
        steps,
        wall,
        acc.integrate_ms / steps as f64,
        acc.broadphase_ms / steps as f64,
        acc.colliders_ms / steps as f64,
        acc.bounds_ms / steps as f64,
        stats.candidate_pairs,
        stats.contacts
    );
    Ok(())
}

fn main() -> std::result::Result<(), PhysicsError> {
    for n in [1_000usize, 5_000, 20_000] {
        run(n, BroadPhaseKind::SweepAndPrune)?;
        run(n, BroadPhaseKind::UniformGrid { cell_size: 16.0 })?;
    }
    Ok(())
}
