use std::collections::HashMap;
use std::fmt;

use crate::body::Body;
use crate::error::{PhysicsError, Result};
use crate::tiles::Tile;
use crate::types::*;

/// One side of a collider.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColliderTarget {
    Single(BodyHandle),
    Group(GroupHandle),
    TileLayer(TileLayerHandle),
}

impl From<BodyHandle> for ColliderTarget {
    fn from(h: BodyHandle) -> Self {
        ColliderTarget::Single(h)
    }
}

impl From<GroupHandle> for ColliderTarget {
    fn from(h: GroupHandle) -> Self {
        ColliderTarget::Group(h)
    }
}

impl From<TileLayerHandle> for ColliderTarget {
    fn from(h: TileLayerHandle) -> Self {
        ColliderTarget::TileLayer(h)
    }
}

/// The other half of a contact.
#[derive(Copy, Clone, Debug)]
pub enum Partner<'a> {
    Body { handle: BodyHandle, body: &'a Body },
    Tile { layer: TileLayerHandle, tile: Tile },
}

impl Partner<'_> {
    pub fn key(&self) -> PartnerKey {
        match *self {
            Partner::Body { handle, .. } => PartnerKey::Body(handle),
            Partner::Tile { layer, tile } => PartnerKey::Tile { layer, index: tile.index, col: tile.col, row: tile.row },
        }
    }

    pub fn body(&self) -> Option<&Body> {
        match *self {
            Partner::Body { body, .. } => Some(body),
            Partner::Tile { .. } => None,
        }
    }

    pub fn tile(&self) -> Option<&Tile> {
        match self {
            Partner::Tile { tile, .. } => Some(tile),
            Partner::Body { .. } => None,
        }
    }
}

/// Read-only view handed to collider callbacks.
#[derive(Copy, Clone, Debug)]
pub struct Contact<'a> {
    pub collider: ColliderHandle,
    /// Body drawn from the collider's source side.
    pub a: BodyHandle,
    pub a_body: &'a Body,
    pub b: Partner<'a>,
}

/// Veto hook; returning `false` skips resolution and `on_collide` for the pair.
pub type ProcessFn = Box<dyn FnMut(&Contact<'_>) -> bool>;
pub type CollideFn = Box<dyn FnMut(&Contact<'_>)>;

/// Tile veto; returning `false` leaves that tile out of the contact.
pub type TileFn = Box<dyn FnMut(&Contact<'_>) -> bool>;

/// Callbacks attached to one tile layer, by cell or by tile index.
#[derive(Default)]
pub(crate) struct TileHooks {
    by_cell: HashMap<(i32, i32), TileFn>,
    by_index: HashMap<u32, TileFn>,
}

impl TileHooks {
    pub(crate) fn set_cell(&mut self, col: i32, row: i32, f: TileFn) {
        self.by_cell.insert((col, row), f);
    }

    pub(crate) fn set_index(&mut self, index: u32, f: TileFn) {
        self.by_index.insert(index, f);
    }

    /// A cell callback takes priority over an index callback.
    pub(crate) fn allows(&mut self, contact: &Contact<'_>) -> bool {
        let Partner::Tile { tile, .. } = contact.b else {
            return true;
        };
        if let Some(f) = self.by_cell.get_mut(&(tile.col, tile.row)) {
            return f(contact);
        }
        match self.by_index.get_mut(&tile.index) {
            Some(f) => f(contact),
            None => true,
        }
    }
}

/// A (source, target) registration re-evaluated every step.
///
/// ```ignore
/// let c = Collider::new(player, level)
///     .on_process(|c| c.a_body.velocity().y >= 0.0)
///     .on_collide(|c| println!("landed on {:?}", c.b.key()))
///     .named("player-level");
/// world.add_collider(c)?;
/// ```
pub struct Collider {
    pub(crate) source: ColliderTarget,
    pub(crate) target: ColliderTarget,
    pub(crate) overlap_only: bool,
    pub(crate) active: bool,
    pub(crate) name: Option<String>,
    process: Option<ProcessFn>,
    collide: Option<CollideFn>,
}

impl Collider {
    pub fn new(source: impl Into<ColliderTarget>, target: impl Into<ColliderTarget>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            overlap_only: false,
            active: true,
            name: None,
            process: None,
            collide: None,
        }
    }

    /// Detect and report only; positions and velocities are never changed.
    pub fn overlap_only(mut self) -> Self {
        self.overlap_only = true;
        self
    }

    pub fn on_process(mut self, f: impl FnMut(&Contact<'_>) -> bool + 'static) -> Self {
        self.process = Some(Box::new(f));
        self
    }

    pub fn on_collide(mut self, f: impl FnMut(&Contact<'_>) + 'static) -> Self {
        self.collide = Some(Box::new(f));
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn source(&self) -> ColliderTarget {
        self.source
    }

    pub fn target(&self) -> ColliderTarget {
        self.target
    }

    pub fn is_overlap_only(&self) -> bool {
        self.overlap_only
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Tile layers may only sit on the target side.
    pub(crate) fn normalized(mut self) -> Result<Self> {
        match (self.source, self.target) {
            (ColliderTarget::TileLayer(_), ColliderTarget::TileLayer(_)) => {
                Err(PhysicsError::InvalidCollider("a collider cannot pair two tile layers"))
            }
            (ColliderTarget::TileLayer(_), _) => {
                std::mem::swap(&mut self.source, &mut self.target);
                Ok(self)
            }
            _ => Ok(self),
        }
    }

    pub(crate) fn allows(&mut self, contact: &Contact<'_>) -> bool {
        match self.process.as_mut() {
            Some(f) => f(contact),
            None => true,
        }
    }

    pub(crate) fn notify(&mut self, contact: &Contact<'_>) {
        if let Some(f) = self.collide.as_mut() {
            f(contact);
        }
    }
}

impl fmt::Debug for Collider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collider")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("overlap_only", &self.overlap_only)
            .field("active", &self.active)
            .field("on_process", &self.process.is_some())
            .field("on_collide", &self.collide.is_some())
            .finish()
    }
}
