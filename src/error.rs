use thiserror::Error;

use crate::types::{BodyHandle, GroupHandle, TileLayerHandle};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("step delta must be finite, got {0}")]
    NonFiniteDelta(f32),

    #[error("body handle {0:?} refers to a destroyed body")]
    StaleBody(BodyHandle),

    #[error("group handle {0:?} refers to a destroyed group")]
    StaleGroup(GroupHandle),

    #[error("tile layer handle {0:?} is not attached")]
    StaleTileLayer(TileLayerHandle),

    #[error("invalid collider: {0}")]
    InvalidCollider(&'static str),
}

pub type Result<T> = std::result::Result<T, PhysicsError>;
