use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::world::{MapDims, MapDimsError, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapHeader {
    pub width: u32,
    pub height: u32,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl MapHeader {
    pub fn from_dims(dims: &MapDims) -> Self {
        Self {
            width: dims.width(),
            height: dims.height(),
            cell_width: dims.cell_width(),
            cell_height: dims.cell_height(),
        }
    }

    pub fn dims(&self) -> Result<MapDims, MapDimsError> {
        MapDims::new(self.width, self.height, self.cell_width, self.cell_height)
    }
}

/// One saved entity: factory key, position and the behavior's description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub type_key: i32,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub header: MapHeader,
    #[serde(default)]
    pub records: Vec<EntityRecord>,
}

impl MapSnapshot {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl World {
    /// Saveable state in paint order. Entities without a keyed behavior are
    /// left out, as is any behavior that is running while the snapshot is taken.
    pub fn snapshot(&self) -> MapSnapshot {
        let mut records = Vec::new();
        let mut unkeyed = 0usize;
        for id in self.draw_order() {
            let (Some(entity), Some((type_key, description))) =
                (self.entity(id), self.behavior_record(id))
            else {
                unkeyed += 1;
                continue;
            };
            records.push(EntityRecord {
                type_key,
                x: entity.position().x,
                y: entity.position().y,
                description,
            });
        }
        debug!(records = records.len(), unkeyed, "map_snapshot");
        MapSnapshot {
            header: MapHeader::from_dims(self.dims()),
            records,
        }
    }
}
