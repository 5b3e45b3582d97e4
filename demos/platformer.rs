use glam::Vec2;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::cell::Cell;
use std::rc::Rc;
use thud::*;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;

    let mut world = PhysicsWorld::new(WorldConfig {
        gravity: Vec2::new(0.0, 600.0),
        bounds: Aabb::new(Vec2::ZERO, Vec2::new(320.0, 240.0)),
        enable_timing: true,
        ..WorldConfig::default()
    });

    // 20x15 map of 16px tiles: solid floor, a wall, and a one-way ledge
    let mut map = TileGrid::new(Vec2::ZERO, Vec2::splat(16.0), 20, 15);
    for col in 0..20 {
        map.set_solid(col, 14, 1);
    }
    for row in 10..14 {
        map.set_solid(15, row, 2);
    }
    for col in 4..8 {
        map.set_one_way(col, 10, 3);
    }
    let level = world.attach_tile_layer(Rc::new(map));

    let player = world.create_body(1, Vec2::new(40.0, 100.0), Vec2::new(12.0, 20.0));
    world
        .body_mut(player)
        .ok_or("player missing")?
        .set_velocity(Vec2::new(90.0, -200.0))
        .set_drag(Vec2::new(4.0, 0.0))
        .set_collide_world_bounds(true);

    let crates = world.create_group();
    for i in 0..3 {
        let h = world.create_body(10 + i, Vec2::new(120.0 + 18.0 * i as f32, 180.0), Vec2::splat(14.0));
        world.body_mut(h).ok_or("crate missing")?.set_bounce(Vec2::new(0.1, 0.2)).set_mass(2.0);
        world.add_to_group(crates, h)?;
    }

    let lift = world.create_body(99, Vec2::new(200.0, 150.0), Vec2::new(40.0, 8.0));
    world
        .body_mut(lift)
        .ok_or("lift missing")?
        .set_movable(false)
        .set_velocity(Vec2::new(-30.0, 0.0));

    let landings = Rc::new(Cell::new(0u32));
    let counter = landings.clone();
    world.add_collider(
        Collider::new(player, level)
            .on_collide(move |c| {
                if c.a_body.touch_started().down {
                    counter.set(counter.get() + 1);
                }
            })
            .named("player-level"),
    )?;
    world.add_collider(Collider::new(crates, level).named("crates-level"))?;
    world.add_collider(Collider::new(crates, crates).named("crate-stack"))?;
    world.add_collider(Collider::new(player, crates).named("player-crates"))?;
    // Jump through the lift from below, land on it from above
    world.add_collider(
        Collider::new(player, lift).on_process(|c| c.a_body.velocity().y >= 0.0).named("player-lift"),
    )?;
    world.add_collider(Collider::new(player, crates).overlap_only().named("player-near-crate"))?;

    world.on_step(|t, _| {
        if (t * 60.0).round() as u64 % 60 == 0 {
            log::info!("t={t:.2}s");
        }
    });

    for frame in 0..240 {
        world.update(1.0 / 60.0)?;
        for ev in world.drain_events() {
            match ev {
                WorldEvent::WorldBounds { owner, faces, .. } => {
                    log::info!("frame {frame}: owner {owner} hit bounds {faces:?}")
                }
                WorldEvent::Collide { a, b: PartnerKey::Body(b), .. } if a == player => {
                    log::debug!("frame {frame}: player pushed {b:?}")
                }
                _ => {}
            }
        }
    }

    let p = world.body(player).ok_or("player missing")?;
    println!(
        "player at ({:.1},{:.1}) v=({:.1},{:.1}) on_floor={} landings={}",
        p.position().x,
        p.position().y,
        p.velocity().x,
        p.velocity().y,
        p.on_floor(),
        landings.get()
    );
    let stats = world.debug_stats();
    println!(
        "bodies={} pairs={} contacts={} colliders={}",
        stats.bodies, stats.candidate_pairs, stats.contacts, stats.colliders
    );
    if let Some(t) = world.timing() {
        println!(
            "timing: integrate={:.3}ms broadphase={:.3}ms colliders={:.3}ms bounds={:.3}ms total={:.3}ms",
            t.integrate_ms, t.broadphase_ms, t.colliders_ms, t.bounds_ms, t.total_ms
        );
    }
    Ok(())
}
