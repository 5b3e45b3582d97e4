use glam::Vec2;
use std::rc::Rc;
use std::time::Instant;
use thud::*;

fn main() -> std::result::Result<(), PhysicsError> {
    let mut world = PhysicsWorld::new(WorldConfig {
        gravity: Vec2::new(0.0, 400.0),
        bounds: Aabb::new(Vec2::ZERO, Vec2::splat(4096.0)),
        emit_contact_events: false,
        enable_timing: true,
        ..WorldConfig::default()
    });

    // 256x256 map of 16px tiles with ~25% solids in a checkerboard-ish pattern
    let (w, h) = (256u32, 256u32);
    let mut solids = vec![0u8; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            if (x ^ y) & 0x3 == 0 {
                solids[(y * w + x) as usize] = 1;
            }
        }
    }
    let map = TileGrid::from_solids(Vec2::ZERO, Vec2::splat(16.0), w, h, &solids);
    let layer = world.attach_tile_layer(Rc::new(map));

    let group = world.create_group();
    let n = 5_000u64;
    for i in 0..n {
        let pos = Vec2::new((i % 100) as f32 * 40.0 + 3.0, (i / 100) as f32 * 80.0 + 2.0);
        let body = world.create_body(i, pos, Vec2::splat(10.0));
        if let Some(b) = world.body_mut(body) {
            b.set_velocity(Vec2::new(((i % 7) as f32 - 3.0) * 30.0, 0.0)).set_collide_world_bounds(true);
        }
        world.add_to_group(group, body)?;
    }
    world.add_collider(Collider::new(group, layer))?;

    let steps = 120;
    let t0 = Instant::now();
    let mut colliders_ms = 0.0;
    for _ in 0..steps {
        world.step(1.0 / 60.0)?;
        colliders_ms += world.timing().map(|t| t.colliders_ms).unwrap_or(0.0);
    }
    let secs = t0.elapsed().as_secs_f64();
    let grounded = world.bodies().filter(|(_, b)| b.on_floor()).count();
    println!(
        "tiles: bodies={} steps={} secs={:.3} colliders/step={:.3}ms contacts={} grounded={}",
        n,
        steps,
        secs,
        colliders_ms / steps as f64,
        world.debug_stats().contacts,
        grounded
    );

    // Ray throughput against the bodies resting on the map
    let origin = Vec2::new(-10.0, 100.5);
    let dir = Vec2::new(1.0, 0.3).normalize();
    let n_rays = 2_000;
    let t1 = Instant::now();
    let mut acc = 0.0f32;
    for i in 0..n_rays {
        let max_t = 4000.0 + (i % 10) as f32;
        if let Some((_, hit)) = world.raycast(origin, dir, max_t) {
            acc += hit.toi;
        }
    }
    let dt = t1.elapsed().as_secs_f64();
    println!("raycast: rays={} secs={:.3} throughput={:.0} rays/s checksum={:.3}", n_rays, dt, n_rays as f64 / dt, acc);
    Ok(())
}
