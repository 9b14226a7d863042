use super::entity::EntityId;
use super::geometry::Cell;

/// Cell-indexed record of which solid owns each cell.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    cells: Vec<Option<EntityId>>,
}

impl OccupancyGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn lookup(&self, cell_x: u32, cell_y: u32) -> Option<EntityId> {
        self.index(cell_x, cell_y).and_then(|index| self.cells[index])
    }

    pub fn lookup_cell(&self, cell: Cell) -> Option<EntityId> {
        self.lookup(cell.x, cell.y)
    }

    /// Records `entity` as the occupant. Fails when another solid already owns
    /// the cell or the cell is off the grid; re-placing the same owner succeeds.
    pub fn place(&mut self, entity: EntityId, cell_x: u32, cell_y: u32) -> bool {
        let Some(index) = self.index(cell_x, cell_y) else {
            return false;
        };
        match self.cells[index] {
            Some(owner) if owner != entity => false,
            _ => {
                self.cells[index] = Some(entity);
                true
            }
        }
    }

    /// Clears the cell only if `entity` is the stored occupant.
    pub fn vacate(&mut self, entity: EntityId, cell_x: u32, cell_y: u32) -> bool {
        let Some(index) = self.index(cell_x, cell_y) else {
            return false;
        };
        if self.cells[index] == Some(entity) {
            self.cells[index] = None;
            true
        } else {
            false
        }
    }

    pub fn occupied(&self) -> impl Iterator<Item = (Cell, EntityId)> + '_ {
        let width = self.width as usize;
        self.cells.iter().enumerate().filter_map(move |(index, slot)| {
            slot.map(|id| {
                (
                    Cell {
                        x: (index % width) as u32,
                        y: (index / width) as u32,
                    },
                    id,
                )
            })
        })
    }

    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    fn index(&self, cell_x: u32, cell_y: u32) -> Option<usize> {
        if cell_x >= self.width || cell_y >= self.height {
            return None;
        }
        Some(cell_y as usize * self.width as usize + cell_x as usize)
    }
}
