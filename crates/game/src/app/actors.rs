use std::cell::Cell;
use std::rc::Rc;

use grid_engine::{ActivityMode, Behavior, EntityDesc, EntityFactory, EntityId, ImageHandle, World};
use tracing::{debug, info, warn};

pub(crate) const WALL_KEY: i32 = 1;
pub(crate) const WALKER_KEY: i32 = 2;
pub(crate) const SLIDER_KEY: i32 = 3;
pub(crate) const MARKER_KEY: i32 = 4;
pub(crate) const PICKUP_KEY: i32 = 5;

pub(crate) const WALL_IMAGE: ImageHandle = ImageHandle(1);
pub(crate) const WALKER_IMAGE: ImageHandle = ImageHandle(2);
pub(crate) const SLIDER_IMAGE: ImageHandle = ImageHandle(3);
pub(crate) const MARKER_IMAGE: ImageHandle = ImageHandle(4);
pub(crate) const PICKUP_IMAGE: ImageHandle = ImageHandle(5);

pub(crate) fn glyph_for(image: ImageHandle) -> char {
    match image {
        WALL_IMAGE => '#',
        WALKER_IMAGE => '@',
        SLIDER_IMAGE => '%',
        MARKER_IMAGE => 'o',
        PICKUP_IMAGE => '*',
        _ => '?',
    }
}

/// Running total of collected pickup values, shared by every pickup.
pub(crate) type Score = Rc<Cell<u32>>;

pub(crate) fn build_factory(fuzz: i32, score: &Score) -> EntityFactory {
    let mut factory = EntityFactory::new();
    let pickup_score = Rc::clone(score);
    factory
        .register(WALL_KEY, |_| {
            EntityDesc::solid()
                .activity(ActivityMode::CollidesOnly)
                .image(WALL_IMAGE)
                .behavior(Wall)
        })
        .register(WALKER_KEY, move |description| {
            EntityDesc::solid().image(WALKER_IMAGE).behavior(Walker {
                heading: parse_heading(description),
                fuzz,
            })
        })
        .register(SLIDER_KEY, |description| {
            EntityDesc::solid().image(SLIDER_IMAGE).behavior(Slider {
                heading: parse_heading(description),
            })
        })
        .register(MARKER_KEY, |description| {
            EntityDesc::ordinary()
                .activity(ActivityMode::Inert)
                .image(MARKER_IMAGE)
                .offset(0, -4)
                .behavior(Marker {
                    label: description.to_string(),
                })
        })
        .register(PICKUP_KEY, move |description| {
            let value = description.trim().parse().unwrap_or_else(|_| {
                warn!(description, "pickup_value_invalid");
                1
            });
            EntityDesc::ordinary()
                .activity(ActivityMode::CollidesOnly)
                .image(PICKUP_IMAGE)
                .behavior(Pickup {
                    value,
                    score: Rc::clone(&pickup_score),
                })
        });
    factory
}

/// Parses `"dx,dy"`; anything else means standing still.
fn parse_heading(description: &str) -> (i32, i32) {
    let parsed = description
        .split_once(',')
        .and_then(|(x, y)| Some((x.trim().parse().ok()?, y.trim().parse().ok()?)));
    parsed.unwrap_or_else(|| {
        warn!(description, "heading_invalid");
        (0, 0)
    })
}

fn format_heading((dx, dy): (i32, i32)) -> String {
    format!("{dx},{dy}")
}

struct Wall;

impl Behavior for Wall {
    fn collision(&mut self, _world: &mut World, me: EntityId, other: EntityId) {
        debug!(wall = me.0, other = other.0, "wall_bumped");
    }

    fn type_key(&self) -> Option<i32> {
        Some(WALL_KEY)
    }
}

/// Walks straight, slipping around corners, and turns back when blocked.
struct Walker {
    heading: (i32, i32),
    fuzz: i32,
}

impl Behavior for Walker {
    fn update(&mut self, world: &mut World, me: EntityId) {
        let (dx, dy) = self.heading;
        if !world.move_fuzzy(me, dx, dy, true, self.fuzz) {
            self.heading = (-dx, -dy);
        }
    }

    fn type_key(&self) -> Option<i32> {
        Some(WALKER_KEY)
    }

    fn description(&self) -> String {
        format_heading(self.heading)
    }
}

/// Moves diagonally, shortening steps to stop flush against obstacles.
struct Slider {
    heading: (i32, i32),
}

impl Behavior for Slider {
    fn update(&mut self, world: &mut World, me: EntityId) {
        let (dx, dy) = self.heading;
        if !world.move_approximate(me, dx, dy, true) {
            self.heading = (-dx, -dy);
        }
    }

    fn type_key(&self) -> Option<i32> {
        Some(SLIDER_KEY)
    }

    fn description(&self) -> String {
        format_heading(self.heading)
    }
}

struct Marker {
    label: String,
}

impl Behavior for Marker {
    fn type_key(&self) -> Option<i32> {
        Some(MARKER_KEY)
    }

    fn description(&self) -> String {
        self.label.clone()
    }
}

/// Leaves the map the first time a solid touches it.
struct Pickup {
    value: u32,
    score: Score,
}

impl Behavior for Pickup {
    fn collision(&mut self, world: &mut World, me: EntityId, other: EntityId) {
        if world.remove_entity(me) {
            self.score.set(self.score.get() + self.value);
            info!(pickup = me.0, by = other.0, value = self.value, "pickup_collected");
        }
    }

    fn type_key(&self) -> Option<i32> {
        Some(PICKUP_KEY)
    }

    fn description(&self) -> String {
        self.value.to_string()
    }
}
