use grid_engine::{Canvas, ImageHandle};

use super::actors::glyph_for;

/// Headless canvas that rasterises each frame to one glyph per cell.
#[derive(Debug, Clone)]
pub(crate) struct TextCanvas {
    viewport: (u32, u32),
    cell: (u32, u32),
    rows: Vec<Vec<char>>,
    last_frame: String,
}

impl TextCanvas {
    pub(crate) fn new(viewport: (u32, u32), cell: (u32, u32)) -> Self {
        let cell = (cell.0.max(1), cell.1.max(1));
        let columns = (viewport.0 / cell.0).max(1) as usize;
        let lines = (viewport.1 / cell.1).max(1) as usize;
        Self {
            viewport,
            cell,
            rows: vec![vec!['.'; columns]; lines],
            last_frame: String::new(),
        }
    }

    pub(crate) fn last_frame(&self) -> &str {
        &self.last_frame
    }
}

impl Canvas for TextCanvas {
    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn draw(&mut self, image: ImageHandle, x: i32, y: i32) {
        if x < 0 || y < 0 {
            return;
        }
        let column = (x as u32 / self.cell.0) as usize;
        let line = (y as u32 / self.cell.1) as usize;
        if let Some(slot) = self.rows.get_mut(line).and_then(|row| row.get_mut(column)) {
            *slot = glyph_for(image);
        }
    }

    fn present(&mut self) {
        self.last_frame.clear();
        for row in &mut self.rows {
            self.last_frame.extend(row.iter());
            self.last_frame.push('\n');
            row.fill('.');
        }
    }
}
