use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::draw_order::DrawOrderList;
use super::entity::{ActivityMode, Behavior, Entity, EntityDesc, EntityId};
use super::frame::WorldHook;
use super::geometry::{MapDims, Point};
use super::grid::OccupancyGrid;

pub const DEFAULT_Z_WIDTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),
    #[error("entity {0} is already on the map")]
    AlreadyLinked(EntityId),
    #[error("position ({x}, {y}) is outside the map")]
    OutOfBounds { x: i32, y: i32 },
    #[error("layer {layer} is not usable by ordinary entities ({layer_count} layers, solid layer {solid_layer})")]
    InvalidLayer {
        layer: usize,
        layer_count: usize,
        solid_layer: usize,
    },
    #[error("inert entity {0} cannot occupy a cell")]
    InertSolid(EntityId),
    #[error("position ({x}, {y}) overlaps solid {occupant}")]
    CellOccupied { x: i32, y: i32, occupant: EntityId },
    #[error("solid {entity} is not the grid occupant of cell ({cell_x}, {cell_y})")]
    GridMismatch {
        entity: EntityId,
        cell_x: u32,
        cell_y: u32,
    },
}

enum BehaviorSlot {
    Empty,
    Present(Box<dyn Behavior>),
    /// Taken out while one of its methods runs.
    CheckedOut,
}

/// Grid, draw order and entity arena of one map.
///
/// All placement and movement goes through here so the occupancy grid, the
/// draw order and entity positions never disagree.
pub struct World {
    pub(crate) dims: MapDims,
    pub(crate) grid: OccupancyGrid,
    pub(crate) draw: DrawOrderList,
    entities: Vec<Option<Entity>>,
    behaviors: Vec<BehaviorSlot>,
    deferred: VecDeque<(EntityId, EntityId)>,
    pub(crate) camera: Point,
    pub(crate) camera_target: Option<EntityId>,
    pub(crate) updates_enabled: bool,
    pub(crate) world_hook: Option<WorldHook>,
    pub(crate) ticks: u64,
}

impl World {
    pub fn new(dims: MapDims, z_width: usize) -> Self {
        let draw = DrawOrderList::new(z_width, dims.height());
        info!(
            width = dims.width(),
            height = dims.height(),
            cell_width = dims.cell_width(),
            cell_height = dims.cell_height(),
            layers = draw.layer_count(),
            solid_layer = draw.solid_layer(),
            "world_created"
        );
        Self {
            grid: OccupancyGrid::new(dims.width(), dims.height()),
            dims,
            draw,
            entities: Vec::new(),
            behaviors: Vec::new(),
            deferred: VecDeque::new(),
            camera: Point::ORIGIN,
            camera_target: None,
            updates_enabled: true,
            world_hook: None,
            ticks: 0,
        }
    }

    pub fn with_default_layers(dims: MapDims) -> Self {
        Self::new(dims, DEFAULT_Z_WIDTH)
    }

    pub fn dims(&self) -> &MapDims {
        &self.dims
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn layer_count(&self) -> usize {
        self.draw.layer_count()
    }

    pub fn solid_layer(&self) -> usize {
        self.draw.solid_layer()
    }

    /// Layer used by [`World::add_entity_at`] for ordinary entities.
    pub fn default_layer(&self) -> usize {
        self.solid_layer().saturating_sub(1)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Creates an entity that is not yet on the map.
    pub fn spawn(&mut self, mut desc: EntityDesc) -> EntityId {
        let id = EntityId(self.entities.len() as u64);
        let entity = Entity::from_desc(id, &desc);
        self.entities.push(Some(entity));
        self.behaviors.push(match desc.behavior.take() {
            Some(behavior) => BehaviorSlot::Present(behavior),
            None => BehaviorSlot::Empty,
        });
        debug!(entity = id.0, body = ?desc.body, "entity_spawned");
        id
    }

    /// Removes the entity from the map if needed and frees its record. A
    /// behavior that is running right now is dropped once it returns.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if self.entity(id).is_none() {
            return false;
        }
        if self.is_linked(id) && !self.remove_entity(id) {
            return false;
        }
        self.entities[id.index()] = None;
        self.behaviors[id.index()] = BehaviorSlot::Empty;
        debug!(entity = id.0, "entity_despawned");
        true
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub(crate) fn linked(&self, id: EntityId) -> Option<&Entity> {
        self.entity(id).filter(|entity| entity.linked)
    }

    pub fn is_linked(&self, id: EntityId) -> bool {
        self.linked(id).is_some()
    }

    pub fn position(&self, id: EntityId) -> Option<Point> {
        self.entity(id).map(|entity| entity.position)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter().flatten()
    }

    /// Linked entities in paint order.
    pub fn draw_order(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.draw.iter()
    }

    pub fn add_entity_at(&mut self, id: EntityId, x: i32, y: i32) -> Result<(), PlacementError> {
        self.add_entity(id, x, y, self.default_layer())
    }

    /// Puts an entity on the map. Solids ignore `layer` and go to the row of
    /// their cell; ordinary entities may use any layer but the solid one.
    pub fn add_entity(
        &mut self,
        id: EntityId,
        x: i32,
        y: i32,
        layer: usize,
    ) -> Result<(), PlacementError> {
        let entity = self.entity(id).ok_or(PlacementError::UnknownEntity(id))?;
        if entity.linked {
            return Err(PlacementError::AlreadyLinked(id));
        }
        let at = Point::new(x, y);
        if !self.dims.contains(at) {
            return Err(PlacementError::OutOfBounds { x, y });
        }

        let layer = if entity.is_solid() {
            if entity.mode == ActivityMode::Inert {
                return Err(PlacementError::InertSolid(id));
            }
            if let Some(occupant) = self.query_for(id, at).first() {
                return Err(PlacementError::CellOccupied { x, y, occupant });
            }
            let cell = self.dims.cell_of(at);
            if !self.grid.place(id, cell.x, cell.y) {
                warn!(entity = id.0, cell_x = cell.x, cell_y = cell.y, "grid_rejected_free_cell");
                return Err(PlacementError::CellOccupied {
                    x,
                    y,
                    occupant: self.grid.lookup_cell(cell).unwrap_or(id),
                });
            }
            self.draw.insert_solid(id, cell.y);
            self.solid_layer()
        } else {
            if layer >= self.layer_count() || layer == self.solid_layer() {
                return Err(PlacementError::InvalidLayer {
                    layer,
                    layer_count: self.layer_count(),
                    solid_layer: self.solid_layer(),
                });
            }
            self.draw.insert_ordinary(id, layer);
            layer
        };

        if let Some(entity) = self.entity_mut(id) {
            entity.position = at;
            entity.previous_position = at;
            entity.layer = layer;
            entity.linked = true;
        }
        debug!(entity = id.0, x, y, layer, "entity_added");
        Ok(())
    }

    /// Takes an entity off the map. Returns false when it was not on the map,
    /// or when the grid names a different occupant for its cell.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.linked(id) else {
            return false;
        };
        if entity.is_solid() {
            let cell = self.dims.cell_of(entity.position);
            let occupant = self.grid.lookup_cell(cell);
            if occupant != Some(id) {
                warn!(
                    entity = id.0,
                    cell_x = cell.x,
                    cell_y = cell.y,
                    occupant = ?occupant,
                    "remove_grid_mismatch"
                );
                return false;
            }
            self.grid.vacate(id, cell.x, cell.y);
        }
        self.draw.unlink(id);
        if let Some(entity) = self.entity_mut(id) {
            entity.linked = false;
        }
        debug!(entity = id.0, "entity_removed");
        true
    }

    pub fn remove_solid_at(&mut self, cell_x: u32, cell_y: u32) -> bool {
        match self.grid.lookup(cell_x, cell_y) {
            Some(id) => self.remove_entity(id),
            None => false,
        }
    }

    /// Solid whose cell contains the pixel `at`.
    pub fn solid_at(&self, at: Point) -> Option<EntityId> {
        if !self.dims.contains(at) {
            return None;
        }
        self.grid.lookup_cell(self.dims.cell_of(at))
    }

    /// Solid at a pixel offset from an entity's position.
    pub fn solid_near(&self, id: EntityId, dx: i32, dy: i32) -> Option<EntityId> {
        let origin = self.linked(id)?.position;
        self.solid_at(origin.offset(dx, dy))
    }

    /// Re-adds the entity on another layer at its current position. If the
    /// re-add fails the entity stays off the map.
    pub fn change_layer(&mut self, id: EntityId, layer: usize) -> Result<(), PlacementError> {
        let entity = self.entity(id).ok_or(PlacementError::UnknownEntity(id))?;
        let at = entity.position;
        if entity.linked && !self.remove_entity(id) {
            let cell = self.dims.cell_of(at);
            return Err(PlacementError::GridMismatch {
                entity: id,
                cell_x: cell.x,
                cell_y: cell.y,
            });
        }
        self.add_entity(id, at.x, at.y, layer)
    }

    /// Takes every entity off the map and rebuilds the draw order.
    pub fn clear_all(&mut self) {
        let mut removed = 0usize;
        for entity in self.entities.iter_mut().flatten() {
            if entity.linked {
                entity.linked = false;
                removed += 1;
            }
        }
        self.grid.clear();
        self.draw.reset();
        info!(removed, "map_cleared");
    }

    pub fn has_behavior(&self, id: EntityId) -> bool {
        !matches!(
            self.behaviors.get(id.index()),
            None | Some(BehaviorSlot::Empty)
        )
    }

    /// Type key and description of an idle behavior, for saving.
    pub(crate) fn behavior_record(&self, id: EntityId) -> Option<(i32, String)> {
        match self.behaviors.get(id.index()) {
            Some(BehaviorSlot::Present(behavior)) => behavior
                .type_key()
                .map(|key| (key, behavior.description())),
            _ => None,
        }
    }

    /// Runs `call` with the entity's behavior checked out of the arena, so the
    /// behavior can take the world mutably. Returns false when there was no
    /// idle behavior to run.
    pub(crate) fn run_behavior<F>(&mut self, id: EntityId, call: F) -> bool
    where
        F: FnOnce(&mut dyn Behavior, &mut World),
    {
        let Some(slot) = self.behaviors.get_mut(id.index()) else {
            return false;
        };
        let mut behavior = match std::mem::replace(slot, BehaviorSlot::CheckedOut) {
            BehaviorSlot::Present(behavior) => behavior,
            other => {
                *slot = other;
                return false;
            }
        };

        call(behavior.as_mut(), self);

        if self.entity(id).is_some() {
            if let Some(slot) = self.behaviors.get_mut(id.index()) {
                if matches!(slot, BehaviorSlot::CheckedOut) {
                    *slot = BehaviorSlot::Present(behavior);
                }
            }
        }
        self.drain_deferred(id);
        true
    }

    /// Delivers `target.collision(other)`, or queues it while the target's
    /// behavior is busy further up the stack.
    pub(crate) fn notify_collision(&mut self, target: EntityId, other: EntityId) {
        if matches!(
            self.behaviors.get(target.index()),
            Some(BehaviorSlot::CheckedOut)
        ) {
            self.deferred.push_back((target, other));
            return;
        }
        self.run_behavior(target, |behavior, world| {
            behavior.collision(world, target, other)
        });
    }

    fn drain_deferred(&mut self, id: EntityId) {
        while let Some(index) = self.deferred.iter().position(|(target, _)| *target == id) {
            let Some((target, other)) = self.deferred.remove(index) else {
                break;
            };
            self.notify_collision(target, other);
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("dims", &self.dims)
            .field("entities", &self.entities().count())
            .field("linked", &self.draw.iter().count())
            .field("ticks", &self.ticks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::test_support::{grid_world, Event, Recorder};
    use crate::world::BodyKind;

    fn solid(world: &mut World, recorder: &Recorder, x: i32, y: i32) -> EntityId {
        let id = world.spawn(EntityDesc::solid().behavior(recorder.behavior()));
        world.add_entity_at(id, x, y).expect("add solid");
        id
    }

    fn assert_grid_agrees(world: &World) {
        for entity in world.entities().filter(|entity| entity.is_linked() && entity.is_solid()) {
            let cell = world.dims().cell_of(entity.position());
            assert_eq!(world.grid().lookup_cell(cell), Some(entity.id()));
        }
        for (cell, id) in world.grid().occupied() {
            let entity = world.entity(id).expect("occupant exists");
            assert!(entity.is_linked());
            assert_eq!(world.dims().cell_of(entity.position()), cell);
        }
    }

    fn solid_rows(world: &World) -> Vec<u32> {
        world
            .draw_order()
            .filter_map(|id| world.entity(id))
            .filter(|entity| entity.is_solid())
            .map(|entity| world.dims().cell_of(entity.position()).y)
            .collect()
    }

    #[test]
    fn blocked_move_notifies_both_sides_once_and_keeps_position() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 0, 0);
        let b = solid(&mut world, &recorder, 40, 0);

        assert!(!world.move_entity(a, 40, 0, false));
        assert_eq!(world.position(a), Some(Point::new(0, 0)));
        assert_eq!(
            recorder.events(),
            vec![Event::Collision(b, a), Event::Collision(a, b)]
        );
        assert_grid_agrees(&world);
    }

    #[test]
    fn fuzz_move_slides_around_a_corner() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 0, 20);
        solid(&mut world, &recorder, 20, 30);

        assert!(world.move_fuzzy(a, 20, 0, true, 4));
        assert_eq!(world.position(a), Some(Point::new(0, 16)));
        assert!(recorder.events().is_empty());
        assert_eq!(solid_rows(&world), vec![0, 1]);
        assert_grid_agrees(&world);
    }

    #[test]
    fn failed_fuzz_retry_still_reports_the_original_collision() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 0, 20);
        let b = solid(&mut world, &recorder, 20, 30);
        let c = solid(&mut world, &recorder, 0, 0);

        assert!(!world.move_fuzzy(a, 20, 0, true, 4));
        assert_eq!(world.position(a), Some(Point::new(0, 20)));
        assert_eq!(
            recorder.events(),
            vec![Event::Collision(b, a), Event::Collision(a, b)]
        );
        assert!(!recorder.events().contains(&Event::Collision(c, a)));
    }

    #[test]
    fn fuzz_nudge_clamped_onto_the_start_still_reports_the_collision() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 0, 0);
        let b = solid(&mut world, &recorder, 20, 10);

        assert!(!world.move_fuzzy(a, 20, 0, true, 4));
        assert_eq!(world.position(a), Some(Point::ORIGIN));
        assert_eq!(
            recorder.events(),
            vec![Event::Collision(b, a), Event::Collision(a, b)]
        );
        assert_grid_agrees(&world);
    }

    #[test]
    fn blocked_fuzz_move_keeps_the_last_move_cancellable() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let c = solid(&mut world, &recorder, 100, 0);
        let d = solid(&mut world, &recorder, 140, 10);

        assert!(world.move_entity(c, 20, 0, true));
        assert!(!world.move_fuzzy(c, 20, 0, true, 4));
        assert_eq!(world.entity(c).map(Entity::previous_position), Some(Point::new(100, 0)));
        assert_eq!(
            recorder.events(),
            vec![Event::Collision(d, c), Event::Collision(c, d)]
        );

        assert!(world.cancel_move(c));
        assert_eq!(world.position(c), Some(Point::new(100, 0)));
        assert_grid_agrees(&world);
    }

    #[test]
    fn standing_still_keeps_the_previous_position() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 20, 20);

        assert!(world.move_entity(a, 40, 20, false));
        assert!(!world.move_entity(a, 0, 0, true));
        assert_eq!(world.entity(a).map(Entity::previous_position), Some(Point::new(20, 20)));
    }

    #[test]
    fn approximate_move_stops_at_the_obstacle() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 0, 0);
        solid(&mut world, &recorder, 40, 0);

        assert!(world.move_approximate(a, 30, 0, true));
        assert_eq!(world.position(a), Some(Point::new(20, 0)));
        assert_eq!(world.grid().lookup(1, 0), Some(a));
        assert_eq!(world.grid().lookup(0, 0), None);
        assert_grid_agrees(&world);
    }

    #[test]
    fn clamped_move_at_the_origin_reports_no_movement() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 0, 0);
        let marker = world.spawn(EntityDesc::ordinary());
        world.add_entity_at(marker, 0, 0).expect("add marker");

        assert!(!world.move_entity(a, -50, -50, true));
        assert_eq!(world.position(a), Some(Point::ORIGIN));
        assert!(!world.move_entity(marker, -50, -50, true));
        assert_eq!(world.position(marker), Some(Point::ORIGIN));
    }

    #[test]
    fn huge_targets_clamp_to_the_last_cell() {
        let mut world = grid_world();
        let marker = world.spawn(EntityDesc::ordinary());
        world.add_entity_at(marker, 0, 0).expect("add marker");

        assert!(world.move_entity(marker, 10_000, 40, false));
        assert_eq!(world.position(marker), Some(Point::new(180, 40)));

        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 0, 0);
        assert!(world.move_entity(a, 10_000, 10_000, false));
        assert_eq!(world.position(a), Some(Point::new(180, 180)));
        assert_grid_agrees(&world);
    }

    #[test]
    fn cancel_restores_the_previous_position() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 20, 20);
        let marker = world.spawn(EntityDesc::ordinary());
        world.add_entity_at(marker, 50, 50).expect("add marker");

        assert!(world.move_entity(a, 15, 30, true));
        assert!(world.cancel_move(a));
        assert_eq!(world.position(a), Some(Point::new(20, 20)));
        assert_eq!(world.entity(a).map(Entity::previous_position), Some(Point::new(20, 20)));

        assert!(world.move_entity(marker, -7, 3, true));
        assert!(world.cancel_move(marker));
        assert_eq!(world.position(marker), Some(Point::new(50, 50)));
        assert!(!world.cancel_move(marker));
        assert_grid_agrees(&world);
    }

    #[test]
    fn cancel_fails_when_the_old_spot_was_taken() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 0, 0);
        assert!(world.move_entity(a, 60, 0, false));
        let blocker = solid(&mut world, &recorder, 0, 0);

        assert!(!world.cancel_move(a));
        assert_eq!(world.position(a), Some(Point::new(60, 0)));
        assert_eq!(world.grid().lookup(0, 0), Some(blocker));
    }

    #[test]
    fn removing_twice_fails_the_second_time() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 40, 40);

        assert!(world.remove_entity(a));
        assert!(!world.remove_entity(a));
        assert_eq!(world.grid().lookup(2, 2), None);
        assert_eq!(world.entity(a).map(Entity::activity), Some(ActivityMode::Inert));
        assert_eq!(world.draw_order().count(), 0);
    }

    #[test]
    fn solids_paint_in_row_order_whatever_the_insertion_order() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        for (x, y) in [(0, 140), (60, 20), (100, 180), (20, 0), (160, 60), (80, 100)] {
            solid(&mut world, &recorder, x, y);
        }
        assert_eq!(solid_rows(&world), vec![0, 1, 3, 5, 7, 9]);

        let first = world.draw_order().next().expect("first solid");
        assert!(world.move_entity(first, 0, 120, true));
        assert_eq!(solid_rows(&world), vec![1, 3, 5, 6, 7, 9]);
        assert_grid_agrees(&world);
    }

    #[test]
    fn no_two_solids_share_a_cell() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 40, 40);
        let b = world.spawn(EntityDesc::solid());

        assert_eq!(
            world.add_entity_at(b, 50, 45),
            Err(PlacementError::CellOccupied {
                x: 50,
                y: 45,
                occupant: a
            })
        );
        assert_eq!(
            world.add_entity_at(b, 59, 21),
            Err(PlacementError::CellOccupied {
                x: 59,
                y: 21,
                occupant: a
            })
        );
        world.add_entity_at(b, 60, 40).expect("touching is fine");
        assert!(!world.move_entity(b, -5, 0, true));
        assert_grid_agrees(&world);
    }

    #[test]
    fn add_validates_layers_bounds_and_inert_solids() {
        let mut world = grid_world();
        let solid_layer = world.solid_layer();
        let marker = world.spawn(EntityDesc::ordinary());

        assert!(matches!(
            world.add_entity(marker, 0, 0, solid_layer),
            Err(PlacementError::InvalidLayer { .. })
        ));
        assert!(matches!(
            world.add_entity(marker, 0, 0, world.layer_count()),
            Err(PlacementError::InvalidLayer { .. })
        ));
        assert_eq!(
            world.add_entity(marker, -1, 0, 0),
            Err(PlacementError::OutOfBounds { x: -1, y: 0 })
        );
        world.add_entity(marker, 0, 0, 0).expect("layer 0");
        assert_eq!(
            world.add_entity(marker, 0, 0, 0),
            Err(PlacementError::AlreadyLinked(marker))
        );

        let inert = world.spawn(EntityDesc::solid().activity(ActivityMode::Inert));
        assert_eq!(
            world.add_entity_at(inert, 40, 40),
            Err(PlacementError::InertSolid(inert))
        );
        assert_eq!(
            world.add_entity_at(EntityId(999), 0, 0),
            Err(PlacementError::UnknownEntity(EntityId(999)))
        );
    }

    #[test]
    fn solids_always_report_the_solid_layer() {
        let mut world = grid_world();
        let id = world.spawn(EntityDesc::solid());
        world.add_entity(id, 20, 20, 0).expect("add");
        let entity = world.entity(id).expect("entity");
        assert_eq!(entity.layer(), world.solid_layer());
        assert_eq!(entity.body(), BodyKind::Solid);
    }

    #[test]
    fn change_layer_moves_ordinary_entities_and_keeps_failures_unlinked() {
        let mut world = grid_world();
        let low = world.spawn(EntityDesc::ordinary());
        let high = world.spawn(EntityDesc::ordinary());
        world.add_entity(low, 0, 0, 0).expect("low");
        world.add_entity(high, 0, 0, world.layer_count() - 1).expect("high");
        assert_eq!(world.draw_order().collect::<Vec<_>>(), vec![low, high]);

        world.change_layer(low, world.layer_count() - 1).expect("raise");
        assert_eq!(world.draw_order().collect::<Vec<_>>(), vec![low, high]);
        assert_eq!(world.entity(low).map(Entity::layer), Some(world.layer_count() - 1));

        let solid_layer = world.solid_layer();
        assert!(world.change_layer(high, solid_layer).is_err());
        assert!(!world.is_linked(high));
        assert_eq!(world.draw_order().collect::<Vec<_>>(), vec![low]);
    }

    #[test]
    fn change_layer_reports_a_grid_that_lost_track_of_the_solid() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 40, 40);
        assert!(world.grid.vacate(a, 2, 2));

        assert_eq!(
            world.change_layer(a, 0),
            Err(PlacementError::GridMismatch {
                entity: a,
                cell_x: 2,
                cell_y: 2,
            })
        );
        assert!(world.is_linked(a));
        assert_eq!(world.draw_order().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn despawned_ids_are_never_handed_out_again() {
        let mut world = grid_world();
        let first = world.spawn(EntityDesc::ordinary());
        assert!(world.despawn(first));

        let second = world.spawn(EntityDesc::ordinary());
        assert_ne!(first, second);
        assert!(world.entity(first).is_none());
        assert_eq!(world.entity(second).map(Entity::id), Some(second));
    }

    #[test]
    fn solid_lookups_by_pixel_cell_and_offset() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 40, 40);
        let b = solid(&mut world, &recorder, 60, 40);

        assert_eq!(world.solid_at(Point::new(45, 55)), Some(a));
        assert_eq!(world.solid_at(Point::new(-1, 0)), None);
        assert_eq!(world.solid_near(a, 20, 0), Some(b));
        assert_eq!(world.solid_near(a, 0, 20), None);

        assert!(world.remove_solid_at(3, 2));
        assert!(!world.remove_solid_at(3, 2));
        assert!(!world.is_linked(b));
    }

    #[test]
    fn clear_all_unlinks_everything_and_the_map_can_be_refilled() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 40, 40);
        let marker = world.spawn(EntityDesc::ordinary());
        world.add_entity_at(marker, 0, 0).expect("marker");

        world.clear_all();
        assert_eq!(world.draw_order().count(), 0);
        assert_eq!(world.grid().occupied().count(), 0);
        assert!(!world.is_linked(a));

        world.add_entity_at(a, 40, 40).expect("re-add");
        assert_grid_agrees(&world);
    }

    #[test]
    fn despawn_frees_the_record_and_never_reuses_ids() {
        let mut world = grid_world();
        let recorder = Recorder::default();
        let a = solid(&mut world, &recorder, 40, 40);

        assert!(world.despawn(a));
        assert!(!world.despawn(a));
        assert!(world.entity(a).is_none());
        assert_eq!(world.grid().lookup(2, 2), None);

        let next = world.spawn(EntityDesc::ordinary());
        assert_ne!(next, a);
        assert!(!world.move_entity(a, 1, 1, true));
    }

    #[test]
    fn unlinked_entities_do_not_move() {
        let mut world = grid_world();
        let id = world.spawn(EntityDesc::ordinary());
        assert!(!world.move_entity(id, 20, 20, false));
        assert!(!world.cancel_move(id));
        assert_eq!(world.position(id), Some(Point::ORIGIN));
    }
}
