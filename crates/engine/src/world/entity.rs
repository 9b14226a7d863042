use std::fmt;

use super::geometry::Point;
use super::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl EntityId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How much of the per-tick work an entity takes part in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActivityMode {
    /// No collision scan and no update. Unlinked entities always report this.
    Inert,
    /// Collision scan and callbacks every tick, but no `update()`.
    CollidesOnly,
    /// Collision scan, callbacks, then `update()`.
    #[default]
    Full,
}

impl ActivityMode {
    pub fn scans_collisions(self) -> bool {
        matches!(self, Self::CollidesOnly | Self::Full)
    }

    pub fn runs_updates(self) -> bool {
        matches!(self, Self::Full)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Drawn on a chosen layer, never occupies a grid cell.
    Ordinary,
    /// Occupies exactly one grid cell and excludes other solids.
    Solid,
}

/// Opaque image reference handed back to the canvas while painting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u32);

impl ImageHandle {
    pub const NONE: ImageHandle = ImageHandle(0);
}

pub const COLLISION_SLOTS: usize = 4;

/// Up to four solids overlapping a cell-sized box.
///
/// Four is enough because solids are cell-sized and never overlap each other,
/// so a box can touch at most a 2x2 block of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionSet {
    slots: [Option<EntityId>; COLLISION_SLOTS],
}

impl CollisionSet {
    pub(crate) fn push(&mut self, id: EntityId) -> bool {
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(id);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots[0].is_none()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().take_while(|slot| slot.is_some()).count()
    }

    pub fn first(&self) -> Option<EntityId> {
        self.slots[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().map_while(|slot| *slot)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.iter().any(|hit| hit == id)
    }

    /// Nothing collides, or the only hit is `me` itself.
    pub fn is_free_for(&self, me: EntityId) -> bool {
        self.iter().all(|hit| hit == me)
    }

    pub fn others(&self, me: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.iter().filter(move |hit| *hit != me)
    }
}

/// Per-entity game logic, invoked by the world during ticks and moves.
///
/// Every method receives the world mutably, so a behavior may move, add or
/// remove entities (itself included) from inside its own callback.
pub trait Behavior {
    fn update(&mut self, _world: &mut World, _me: EntityId) {}

    fn collision(&mut self, _world: &mut World, _me: EntityId, _other: EntityId) {}

    /// Stable key used by the map file factory. `None` means "not saved".
    fn type_key(&self) -> Option<i32> {
        None
    }

    /// Free-form text saved next to the type key and fed back to the factory.
    fn description(&self) -> String {
        String::new()
    }
}

pub struct EntityDesc {
    pub(crate) body: BodyKind,
    pub(crate) activity: ActivityMode,
    pub(crate) image: ImageHandle,
    pub(crate) offset: (i32, i32),
    pub(crate) behavior: Option<Box<dyn Behavior>>,
}

impl EntityDesc {
    pub fn ordinary() -> Self {
        Self::with_body(BodyKind::Ordinary)
    }

    pub fn solid() -> Self {
        Self::with_body(BodyKind::Solid)
    }

    fn with_body(body: BodyKind) -> Self {
        Self {
            body,
            activity: ActivityMode::Full,
            image: ImageHandle::NONE,
            offset: (0, 0),
            behavior: None,
        }
    }

    pub fn activity(mut self, activity: ActivityMode) -> Self {
        self.activity = activity;
        self
    }

    pub fn image(mut self, image: ImageHandle) -> Self {
        self.image = image;
        self
    }

    pub fn offset(mut self, off_x: i32, off_y: i32) -> Self {
        self.offset = (off_x, off_y);
        self
    }

    pub fn behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    pub fn body(&self) -> BodyKind {
        self.body
    }
}

impl fmt::Debug for EntityDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDesc")
            .field("body", &self.body)
            .field("activity", &self.activity)
            .field("image", &self.image)
            .field("offset", &self.offset)
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}

/// State record for one entity. Mutated only through [`World`].
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) body: BodyKind,
    pub(crate) mode: ActivityMode,
    pub(crate) linked: bool,
    pub(crate) layer: usize,
    pub(crate) position: Point,
    pub(crate) previous_position: Point,
    pub(crate) image: ImageHandle,
    pub(crate) offset: (i32, i32),
    pub(crate) collisions: CollisionSet,
}

impl Entity {
    pub(crate) fn from_desc(id: EntityId, desc: &EntityDesc) -> Self {
        Self {
            id,
            body: desc.body,
            mode: desc.activity,
            linked: false,
            layer: 0,
            position: Point::ORIGIN,
            previous_position: Point::ORIGIN,
            image: desc.image,
            offset: desc.offset,
            collisions: CollisionSet::default(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn body(&self) -> BodyKind {
        self.body
    }

    pub fn is_solid(&self) -> bool {
        self.body == BodyKind::Solid
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn activity(&self) -> ActivityMode {
        if self.linked {
            self.mode
        } else {
            ActivityMode::Inert
        }
    }

    pub fn configured_activity(&self) -> ActivityMode {
        self.mode
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn previous_position(&self) -> Point {
        self.previous_position
    }

    pub fn image(&self) -> ImageHandle {
        self.image
    }

    pub fn offset(&self) -> (i32, i32) {
        self.offset
    }

    /// Result of the most recent collision query made for this entity.
    pub fn collisions(&self) -> &CollisionSet {
        &self.collisions
    }
}
