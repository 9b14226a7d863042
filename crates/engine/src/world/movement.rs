use tracing::{debug, trace, warn};

use super::collision;
use super::entity::{CollisionSet, EntityId};
use super::geometry::{MapDims, Point};
use super::World;

/// What a blocked solid move may try before giving up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Resolution {
    #[default]
    Stop,
    /// Nudge around the corner of a single obstacle by at most `fuzz` pixels.
    Fuzz { fuzz: i32 },
    /// Shorten the requested vector so it stops at the obstacle boundary.
    ApproximateSlide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub x: i32,
    pub y: i32,
    pub relative: bool,
    pub resolution: Resolution,
}

impl MoveRequest {
    pub fn to(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            relative: false,
            resolution: Resolution::Stop,
        }
    }

    pub fn by(dx: i32, dy: i32) -> Self {
        Self {
            x: dx,
            y: dy,
            relative: true,
            resolution: Resolution::Stop,
        }
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    fn target_from(&self, current: Point) -> Point {
        if self.relative {
            current.offset(self.x, self.y)
        } else {
            Point::new(self.x, self.y)
        }
    }
}

/// Corner nudge for a move blocked by exactly one obstacle.
///
/// An axis is near when the mover would be at least half a cell clear of the
/// obstacle on it. With exactly one near axis, the mover steps from `current`
/// toward the open side of that axis by `min(fuzz, cell - |d|)`. The nudge is
/// refused when the requested motion on that axis points the other way.
pub fn fuzz_nudge(
    dims: &MapDims,
    current: Point,
    target: Point,
    obstacle: Point,
    fuzz: i32,
) -> Option<Point> {
    if fuzz <= 0 {
        return None;
    }
    let cell_w = dims.cell_width() as i32;
    let cell_h = dims.cell_height() as i32;
    let dx = target.x - obstacle.x;
    let dy = target.y - obstacle.y;
    let near = |d: i32, cell: i32| d != 0 && d.abs() >= cell / 2 && d.abs() < cell;

    let (step, requested) = match (near(dx, cell_w), near(dy, cell_h)) {
        (true, false) => {
            let step = dx.signum() * fuzz.min(cell_w - dx.abs());
            (Point::new(step, 0), target.x - current.x)
        }
        (false, true) => {
            let step = dy.signum() * fuzz.min(cell_h - dy.abs());
            (Point::new(0, step), target.y - current.y)
        }
        _ => return None,
    };
    let nudge = step.x + step.y;
    if requested != 0 && requested.signum() != nudge.signum() {
        return None;
    }
    Some(current.offset(step.x, step.y))
}

/// Longest prefix of the requested vector that stops at every obstacle's
/// boundary, shortening only the axis that penetrates least per obstacle.
///
/// Returns `None` when nothing would change or nothing would be left to move.
pub fn approximate_slide<I>(dims: &MapDims, current: Point, target: Point, obstacles: I) -> Option<Point>
where
    I: IntoIterator<Item = Point>,
{
    let cell_w = dims.cell_width() as i32;
    let cell_h = dims.cell_height() as i32;
    let mx = target.x - current.x;
    let my = target.y - current.y;
    let mut reach_x = mx.abs();
    let mut reach_y = my.abs();

    for obstacle in obstacles {
        let dx = target.x - obstacle.x;
        let dy = target.y - obstacle.y;
        let approach_x = approaching(mx, dx);
        let approach_y = approaching(my, dy);
        let pen_x = cell_w - dx.abs();
        let pen_y = cell_h - dy.abs();

        let shorten_x = match (approach_x, approach_y) {
            (true, true) => pen_x <= pen_y,
            (true, false) => true,
            (false, true) => false,
            (false, false) => continue,
        };
        if shorten_x {
            reach_x = reach_x.min((mx.abs() - pen_x).max(0));
        } else {
            reach_y = reach_y.min((my.abs() - pen_y).max(0));
        }
    }

    let rx = mx.signum() * reach_x;
    let ry = my.signum() * reach_y;
    if (rx == 0 && ry == 0) || (rx == mx && ry == my) {
        return None;
    }
    Some(current.offset(rx, ry))
}

fn approaching(motion: i32, delta: i32) -> bool {
    motion != 0 && (delta == 0 || delta.signum() != motion.signum())
}

impl World {
    /// Moves with [`Resolution::Stop`]. See [`World::move_with`].
    pub fn move_entity(&mut self, id: EntityId, x: i32, y: i32, relative: bool) -> bool {
        let request = MoveRequest {
            x,
            y,
            relative,
            resolution: Resolution::Stop,
        };
        self.move_with(id, request)
    }

    pub fn move_fuzzy(&mut self, id: EntityId, x: i32, y: i32, relative: bool, fuzz: i32) -> bool {
        let request = MoveRequest {
            x,
            y,
            relative,
            resolution: Resolution::Fuzz { fuzz },
        };
        self.move_with(id, request)
    }

    pub fn move_approximate(&mut self, id: EntityId, x: i32, y: i32, relative: bool) -> bool {
        let request = MoveRequest {
            x,
            y,
            relative,
            resolution: Resolution::ApproximateSlide,
        };
        self.move_with(id, request)
    }

    /// Clamps the request into the map and commits it.
    ///
    /// Ordinary entities always move and report whether at least one axis
    /// reached its requested coordinate. Solids only move into free space and
    /// report whether their position changed; a blocked solid notifies every
    /// obstacle of the original attempt and stays put.
    pub fn move_with(&mut self, id: EntityId, request: MoveRequest) -> bool {
        let Some(entity) = self.linked(id) else {
            return false;
        };
        let current = entity.position;
        let solid = entity.is_solid();
        let clamped = self.dims.clamp(request.target_from(current));

        if !solid {
            if let Some(entity) = self.entity_mut(id) {
                entity.previous_position = current;
                entity.position = clamped.point;
            }
            trace!(entity = id.0, x = clamped.point.x, y = clamped.point.y, "entity_moved");
            return clamped.any_axis_reached();
        }

        let target = clamped.point;
        let hits = self.query_for(id, target);
        if hits.is_free_for(id) {
            return self.commit_solid(id, current, target);
        }

        if let Some(retry) = self.retry_target(id, current, target, &hits, request.resolution) {
            // A nudge clamped back onto the start is no retry at all.
            let retry = self.dims.clamp(retry).point;
            if retry != current && self.query_for(id, retry).is_free_for(id) {
                debug!(
                    entity = id.0,
                    x = retry.x,
                    y = retry.y,
                    resolution = ?request.resolution,
                    "move_resolved"
                );
                return self.commit_solid(id, current, retry);
            }
        }

        debug!(entity = id.0, x = target.x, y = target.y, hits = hits.len(), "move_blocked");
        self.dispatch_collisions(id, &hits);
        false
    }

    /// Undoes the last move. Solids go back through the collision check, so
    /// the undo fails if something took their old spot.
    pub fn cancel_move(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.linked(id) else {
            return false;
        };
        let previous = entity.previous_position;
        if !entity.is_solid() {
            let changed = entity.position != previous;
            if let Some(entity) = self.entity_mut(id) {
                entity.position = previous;
            }
            return changed;
        }

        let moved = self.move_with(id, MoveRequest::to(previous.x, previous.y));
        if moved {
            if let Some(entity) = self.entity_mut(id) {
                entity.previous_position = entity.position;
            }
        }
        moved
    }

    /// Runs the collision query for `id` at `at` and keeps the result in the
    /// entity's scratch buffer.
    pub(crate) fn query_for(&mut self, id: EntityId, at: Point) -> CollisionSet {
        let hits = collision::query(&self.grid, &self.dims, at, |other| {
            self.entity(other).map(|entity| entity.position)
        });
        if let Some(entity) = self.entity_mut(id) {
            entity.collisions = hits;
        }
        hits
    }

    /// Symmetric callbacks for every obstacle in `hits` other than `me`.
    pub(crate) fn dispatch_collisions(&mut self, me: EntityId, hits: &CollisionSet) {
        for other in hits.others(me) {
            self.notify_collision(other, me);
            self.notify_collision(me, other);
        }
    }

    fn retry_target(
        &self,
        id: EntityId,
        current: Point,
        target: Point,
        hits: &CollisionSet,
        resolution: Resolution,
    ) -> Option<Point> {
        match resolution {
            Resolution::Stop => None,
            Resolution::Fuzz { fuzz } => {
                let mut others = hits.others(id);
                let only = others.next()?;
                if others.next().is_some() {
                    return None;
                }
                let obstacle = self.entity(only)?.position;
                fuzz_nudge(&self.dims, current, target, obstacle, fuzz)
            }
            Resolution::ApproximateSlide => {
                let obstacles = hits
                    .others(id)
                    .filter_map(|other| self.entity(other).map(|entity| entity.position));
                approximate_slide(&self.dims, current, target, obstacles)
            }
        }
    }

    fn commit_solid(&mut self, id: EntityId, current: Point, target: Point) -> bool {
        if target == current {
            return false;
        }
        let old_cell = self.dims.cell_of(current);
        let new_cell = self.dims.cell_of(target);
        if old_cell != new_cell {
            if !self.grid.place(id, new_cell.x, new_cell.y) {
                warn!(entity = id.0, cell_x = new_cell.x, cell_y = new_cell.y, "move_cell_taken");
                return false;
            }
            self.grid.vacate(id, old_cell.x, old_cell.y);
            if old_cell.y != new_cell.y {
                self.draw.relocate_solid_row(id, new_cell.y);
            }
        }
        if let Some(entity) = self.entity_mut(id) {
            entity.previous_position = current;
            entity.position = target;
        }
        trace!(entity = id.0, x = target.x, y = target.y, "solid_moved");
        true
    }
}
