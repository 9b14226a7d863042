use grid_engine::{EntityRecord, MapDims};
use thiserror::Error;

use super::actors::{MARKER_KEY, PICKUP_KEY, SLIDER_KEY, WALKER_KEY, WALL_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum LayoutError {
    #[error("layout has {rows} rows but the grid is only {height} cells high")]
    TooManyRows { rows: usize, height: u32 },
    #[error("layout row {row} has {columns} columns but the grid is only {width} cells wide")]
    RowTooWide {
        row: usize,
        columns: usize,
        width: u32,
    },
    #[error("unknown layout glyph {glyph:?} at row {row}, column {column}")]
    UnknownGlyph {
        glyph: char,
        row: usize,
        column: usize,
    },
}

/// Turns ASCII rows into map records, one glyph per cell:
/// `#` wall, `>` `<` `^` `v` walker, `s` slider, `o` marker, `*` pickup,
/// `.` or space for nothing.
pub(crate) fn parse_layout(rows: &[String], dims: &MapDims) -> Result<Vec<EntityRecord>, LayoutError> {
    if rows.len() > dims.height() as usize {
        return Err(LayoutError::TooManyRows {
            rows: rows.len(),
            height: dims.height(),
        });
    }

    let mut records = Vec::new();
    for (row, line) in rows.iter().enumerate() {
        let columns = line.chars().count();
        if columns > dims.width() as usize {
            return Err(LayoutError::RowTooWide {
                row,
                columns,
                width: dims.width(),
            });
        }
        for (column, glyph) in line.chars().enumerate() {
            let (type_key, description) = match glyph {
                '.' | ' ' => continue,
                '#' => (WALL_KEY, String::new()),
                '>' => (WALKER_KEY, "2,0".to_string()),
                '<' => (WALKER_KEY, "-2,0".to_string()),
                '^' => (WALKER_KEY, "0,-2".to_string()),
                'v' => (WALKER_KEY, "0,2".to_string()),
                's' => (SLIDER_KEY, "3,2".to_string()),
                'o' => (MARKER_KEY, format!("marker {column},{row}")),
                '*' => (PICKUP_KEY, "10".to_string()),
                _ => return Err(LayoutError::UnknownGlyph { glyph, row, column }),
            };
            records.push(EntityRecord {
                type_key,
                x: column as i32 * dims.cell_width() as i32,
                y: row as i32 * dims.cell_height() as i32,
                description,
            });
        }
    }
    Ok(records)
}
