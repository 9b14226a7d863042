use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MapDimsError {
    #[error("map must be at least 1x1 cells, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("cell size must be non-zero, got {cell_width}x{cell_height}")]
    EmptyCell { cell_width: u32, cell_height: u32 },
    #[error("map pixel extent overflows i32 ({width}x{height} cells of {cell_width}x{cell_height})")]
    TooLarge {
        width: u32,
        height: u32,
        cell_width: u32,
        cell_height: u32,
    },
}

/// Grid size in cells plus the pixel size of one cell.
///
/// Positions live in `[0, max_x] x [0, max_y]`, where the maximum is the
/// top-left corner of the last cell on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapDims {
    width: u32,
    height: u32,
    cell_width: u32,
    cell_height: u32,
}

/// Result of clamping a requested position into map bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clamped {
    pub point: Point,
    pub x_reached: bool,
    pub y_reached: bool,
}

impl Clamped {
    pub fn any_axis_reached(&self) -> bool {
        self.x_reached || self.y_reached
    }
}

impl MapDims {
    pub fn new(
        width: u32,
        height: u32,
        cell_width: u32,
        cell_height: u32,
    ) -> Result<Self, MapDimsError> {
        if width == 0 || height == 0 {
            return Err(MapDimsError::EmptyGrid { width, height });
        }
        if cell_width == 0 || cell_height == 0 {
            return Err(MapDimsError::EmptyCell {
                cell_width,
                cell_height,
            });
        }
        let fits = |cells: u32, size: u32| {
            u64::from(cells) * u64::from(size) <= i32::MAX as u64
        };
        if !fits(width, cell_width) || !fits(height, cell_height) {
            return Err(MapDimsError::TooLarge {
                width,
                height,
                cell_width,
                cell_height,
            });
        }
        Ok(Self {
            width,
            height,
            cell_width,
            cell_height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cell_width(&self) -> u32 {
        self.cell_width
    }

    pub fn cell_height(&self) -> u32 {
        self.cell_height
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn max_x(&self) -> i32 {
        (self.cell_width * (self.width - 1)) as i32
    }

    pub fn max_y(&self) -> i32 {
        (self.cell_height * (self.height - 1)) as i32
    }

    pub fn contains(&self, point: Point) -> bool {
        (0..=self.max_x()).contains(&point.x) && (0..=self.max_y()).contains(&point.y)
    }

    /// Cell containing `point`. Callers pass in-bounds points.
    pub fn cell_of(&self, point: Point) -> Cell {
        Cell {
            x: point.x.max(0) as u32 / self.cell_width,
            y: point.y.max(0) as u32 / self.cell_height,
        }
    }

    pub fn clamp(&self, requested: Point) -> Clamped {
        let (x, x_reached) = clamp_axis(requested.x, self.max_x());
        let (y, y_reached) = clamp_axis(requested.y, self.max_y());
        Clamped {
            point: Point { x, y },
            x_reached,
            y_reached,
        }
    }
}

fn clamp_axis(value: i32, max: i32) -> (i32, bool) {
    if value < 0 {
        (0, false)
    } else if value > max {
        (max, false)
    } else {
        (value, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims_10x10() -> MapDims {
        MapDims::new(10, 10, 20, 20).expect("dims")
    }

    #[test]
    fn pixel_bounds_stop_at_last_cell_origin() {
        let dims = dims_10x10();
        assert_eq!(dims.max_x(), 180);
        assert_eq!(dims.max_y(), 180);
        assert_eq!(dims.cell_of(Point::new(180, 180)), Cell { x: 9, y: 9 });
    }

    #[test]
    fn clamp_reports_axes_that_reached_the_request() {
        let dims = dims_10x10();

        let inside = dims.clamp(Point::new(40, 60));
        assert_eq!(inside.point, Point::new(40, 60));
        assert!(inside.x_reached && inside.y_reached);

        let partial = dims.clamp(Point::new(500, 60));
        assert_eq!(partial.point, Point::new(180, 60));
        assert!(!partial.x_reached);
        assert!(partial.any_axis_reached());

        let outside = dims.clamp(Point::new(-50, -50));
        assert_eq!(outside.point, Point::ORIGIN);
        assert!(!outside.any_axis_reached());
    }

    #[test]
    fn zero_sized_maps_are_rejected() {
        assert_eq!(
            MapDims::new(0, 4, 16, 16),
            Err(MapDimsError::EmptyGrid {
                width: 0,
                height: 4
            })
        );
        assert!(matches!(
            MapDims::new(4, 4, 0, 16),
            Err(MapDimsError::EmptyCell { .. })
        ));
    }

    #[test]
    fn cell_of_divides_by_cell_size() {
        let dims = MapDims::new(8, 6, 16, 12).expect("dims");
        assert_eq!(dims.cell_of(Point::new(15, 11)), Cell { x: 0, y: 0 });
        assert_eq!(dims.cell_of(Point::new(16, 12)), Cell { x: 1, y: 1 });
        assert_eq!(dims.cell_of(Point::new(47, 25)), Cell { x: 2, y: 2 });
    }
}
