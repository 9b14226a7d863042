use tracing::debug;

use super::entity::{CollisionSet, EntityId};
use super::geometry::{MapDims, Point};
use super::grid::OccupancyGrid;

/// Solids whose cell-sized box overlaps a cell-sized box at `at`.
///
/// Only the 3x3 neighbourhood around `at`'s cell is scanned, clamped to the
/// grid. Overlap is strict on both axes, so boxes that merely touch along an
/// edge do not collide.
pub fn query<F>(grid: &OccupancyGrid, dims: &MapDims, at: Point, position_of: F) -> CollisionSet
where
    F: Fn(EntityId) -> Option<Point>,
{
    let mut hits = CollisionSet::default();
    let center = dims.cell_of(at);
    let cell_w = dims.cell_width() as i64;
    let cell_h = dims.cell_height() as i64;

    let x_range = center.x.saturating_sub(1)..=(center.x + 1).min(grid.width() - 1);
    for cell_y in center.y.saturating_sub(1)..=(center.y + 1).min(grid.height() - 1) {
        for cell_x in x_range.clone() {
            let Some(occupant) = grid.lookup(cell_x, cell_y) else {
                continue;
            };
            let Some(pos) = position_of(occupant) else {
                continue;
            };
            let dx = (i64::from(at.x) - i64::from(pos.x)).abs();
            let dy = (i64::from(at.y) - i64::from(pos.y)).abs();
            if dx < cell_w && dy < cell_h && !hits.push(occupant) {
                debug!(
                    occupant = occupant.0,
                    x = at.x,
                    y = at.y,
                    "collision_overflow"
                );
            }
        }
    }
    hits
}
