use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use super::records::{EntityRecord, MapSnapshot};
use crate::world::{EntityDesc, EntityId, MapDimsError, PlacementError, World};

type Constructor = Box<dyn Fn(&str) -> EntityDesc>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("map header is invalid: {0}")]
    InvalidDims(#[from] MapDimsError),
    #[error("no constructor registered for type key {0}")]
    UnknownKey(i32),
    #[error("record with type key {type_key} could not be placed: {source}")]
    Placement {
        type_key: i32,
        #[source]
        source: PlacementError,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub unknown_keys: usize,
    pub placement_failures: usize,
}

impl LoadReport {
    pub fn skipped(&self) -> usize {
        self.unknown_keys + self.placement_failures
    }
}

/// Registry of entity constructors keyed by the integer saved in map files.
#[derive(Default)]
pub struct EntityFactory {
    constructors: BTreeMap<i32, Constructor>,
}

impl EntityFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `constructor` under `type_key`, replacing any earlier one.
    pub fn register<F>(&mut self, type_key: i32, constructor: F) -> &mut Self
    where
        F: Fn(&str) -> EntityDesc + 'static,
    {
        if self
            .constructors
            .insert(type_key, Box::new(constructor))
            .is_some()
        {
            warn!(type_key, "factory_constructor_replaced");
        }
        self
    }

    pub fn keys(&self) -> Vec<i32> {
        self.constructors.keys().copied().collect()
    }

    pub fn build(&self, type_key: i32, description: &str) -> Option<EntityDesc> {
        self.constructors
            .get(&type_key)
            .map(|constructor| constructor(description))
    }

    /// Spawns the record's entity and puts it on the map at its default layer.
    /// A record that cannot be placed leaves nothing behind.
    pub fn spawn_record(
        &self,
        world: &mut World,
        record: &EntityRecord,
    ) -> Result<EntityId, LoadError> {
        let desc = self
            .build(record.type_key, &record.description)
            .ok_or(LoadError::UnknownKey(record.type_key))?;
        let id = world.spawn(desc);
        if let Err(source) = world.add_entity_at(id, record.x, record.y) {
            world.despawn(id);
            return Err(LoadError::Placement {
                type_key: record.type_key,
                source,
            });
        }
        Ok(id)
    }

    /// Builds a fresh world from a snapshot. Records that fail are skipped
    /// and counted; only an unusable header fails the whole load.
    pub fn load_world(
        &self,
        snapshot: &MapSnapshot,
        z_width: usize,
    ) -> Result<(World, LoadReport), LoadError> {
        let dims = snapshot.header.dims()?;
        let mut world = World::new(dims, z_width);
        let mut report = LoadReport::default();

        for record in &snapshot.records {
            match self.spawn_record(&mut world, record) {
                Ok(_) => report.loaded += 1,
                Err(error) => {
                    warn!(
                        type_key = record.type_key,
                        x = record.x,
                        y = record.y,
                        error = %error,
                        "map_record_skipped"
                    );
                    match error {
                        LoadError::UnknownKey(_) => report.unknown_keys += 1,
                        _ => report.placement_failures += 1,
                    }
                }
            }
        }

        info!(
            loaded = report.loaded,
            skipped = report.skipped(),
            "map_loaded"
        );
        Ok((world, report))
    }
}

impl fmt::Debug for EntityFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityFactory")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::records::MapHeader;
    use crate::world::{ActivityMode, Behavior, BodyKind, ImageHandle, Point};

    struct Tagged {
        key: i32,
        label: String,
    }

    impl Behavior for Tagged {
        fn type_key(&self) -> Option<i32> {
            Some(self.key)
        }

        fn description(&self) -> String {
            self.label.clone()
        }
    }

    fn factory() -> EntityFactory {
        let mut factory = EntityFactory::new();
        factory
            .register(1, |label| {
                EntityDesc::solid()
                    .activity(ActivityMode::CollidesOnly)
                    .image(ImageHandle(1))
                    .behavior(Tagged {
                        key: 1,
                        label: label.to_string(),
                    })
            })
            .register(4, |label| {
                EntityDesc::ordinary().behavior(Tagged {
                    key: 4,
                    label: label.to_string(),
                })
            });
        factory
    }

    fn record(type_key: i32, x: i32, y: i32, description: &str) -> EntityRecord {
        EntityRecord {
            type_key,
            x,
            y,
            description: description.to_string(),
        }
    }

    fn snapshot(records: Vec<EntityRecord>) -> MapSnapshot {
        MapSnapshot {
            header: MapHeader {
                width: 6,
                height: 6,
                cell_width: 10,
                cell_height: 10,
            },
            records,
        }
    }

    #[test]
    fn build_uses_the_registered_constructor() {
        let factory = factory();
        assert_eq!(factory.keys(), vec![1, 4]);
        let desc = factory.build(1, "wall").expect("known key");
        assert_eq!(desc.body(), BodyKind::Solid);
        assert!(factory.build(9, "").is_none());
    }

    #[test]
    fn load_world_places_records_and_skips_bad_ones() {
        let factory = factory();
        let snapshot = snapshot(vec![
            record(1, 0, 0, "a"),
            record(1, 5, 5, "overlaps a"),
            record(7, 20, 20, "unknown"),
            record(4, 30, 30, "flag"),
            record(4, 500, 0, "outside"),
        ]);

        let (world, report) = factory.load_world(&snapshot, 4).expect("load");
        assert_eq!(
            report,
            LoadReport {
                loaded: 2,
                unknown_keys: 1,
                placement_failures: 2
            }
        );
        assert_eq!(world.draw_order().count(), 2);
        assert_eq!(world.solid_at(Point::new(0, 0)).map(|id| id.0), Some(0));
        assert_eq!(world.layer_count(), 5);
    }

    #[test]
    fn a_loaded_world_saves_the_same_records() {
        let factory = factory();
        let original = snapshot(vec![record(4, 30, 30, "flag"), record(1, 10, 0, "w")]);

        let (world, report) = factory.load_world(&original, 4).expect("load");
        assert_eq!(report.skipped(), 0);
        assert_eq!(world.snapshot(), original);
    }

    #[test]
    fn an_invalid_header_fails_the_load() {
        let factory = factory();
        let mut broken = snapshot(Vec::new());
        broken.header.cell_width = 0;
        assert!(matches!(
            factory.load_world(&broken, 4),
            Err(LoadError::InvalidDims(_))
        ));
    }
}
