//! thud: arcade-style 2D AABB physics (integration, broadphase, body and tile separation)

pub mod types;
pub mod error;
pub mod api;
pub mod body;
pub mod narrowphase;
pub mod broadphase;
pub mod tiles;
pub mod collider;
pub mod world;

pub use crate::types::*;
pub use crate::error::{PhysicsError, Result};
pub use crate::api::*;
pub use crate::body::Body;
pub use crate::narrowphase::{Narrowphase, Resolution, ResolveOptions};
pub use crate::broadphase::BroadPhase;
pub use crate::tiles::{Tile, TileGrid};
pub use crate::collider::{Collider, ColliderTarget, Contact, Partner, TileFn};
pub use crate::world::PhysicsWorld;
