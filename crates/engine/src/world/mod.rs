mod collision;
mod draw_order;
mod entity;
mod frame;
mod geometry;
mod grid;
mod map;
mod movement;
#[cfg(test)]
pub(crate) mod test_support;

pub use collision::query as query_collisions;
pub use draw_order::{DrawOrderList, UpdateCursor};
pub use entity::{
    ActivityMode, Behavior, BodyKind, CollisionSet, Entity, EntityDesc, EntityId, ImageHandle,
    COLLISION_SLOTS,
};
pub use frame::{Canvas, DrawCommand, RecordingCanvas, WorldHook};
pub use geometry::{Cell, Clamped, MapDims, MapDimsError, Point};
pub use grid::OccupancyGrid;
pub use map::{PlacementError, World, DEFAULT_Z_WIDTH};
pub use movement::{approximate_slide, fuzz_nudge, MoveRequest, Resolution};
