use glam::Vec2;
use thud::*;

fn main() {
    let mut world = PhysicsWorld::new(WorldConfig::default());

    let near = world.create_body(10, Vec2::new(40.0, -5.0), Vec2::splat(10.0));
    let far = world.create_body(20, Vec2::new(80.0, -5.0), Vec2::splat(10.0));

    for (label, origin, dir) in [
        ("forward", Vec2::ZERO, Vec2::X),
        ("backward", Vec2::ZERO, -Vec2::X),
        ("inside", Vec2::new(85.0, 0.0), Vec2::Y),
    ] {
        match world.raycast(origin, dir, 200.0) {
            Some((h, hit)) => {
                let owner = world.body(h).map(|b| b.owner());
                println!(
                    "{label}: hit {:?} owner={:?} t={:.3} n=({:.2},{:.2}) at ({:.1},{:.1})",
                    h, owner, hit.toi, hit.normal.x, hit.normal.y, hit.contact.x, hit.contact.y
                );
            }
            None => println!("{label}: no hit"),
        }
    }

    if let Some(b) = world.body_mut(near) {
        b.disable();
    }
    let next = world.raycast(Vec2::ZERO, Vec2::X, 200.0).map(|(h, _)| h);
    println!("with near disabled: {:?} (far={:?})", next, far);
    println!("bodies at (45,0): {:?}", world.query_point(Vec2::new(45.0, 0.0)));
}
