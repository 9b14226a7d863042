use std::cell::RefCell;
use std::rc::Rc;

use super::{Behavior, EntityId, MapDims, World};

pub(crate) fn grid_world() -> World {
    World::with_default_layers(MapDims::new(10, 10, 20, 20).expect("dims"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Update(EntityId),
    Collision(EntityId, EntityId),
}

/// Shared log that any number of recording behaviors append to.
#[derive(Debug, Clone, Default)]
pub(crate) struct Recorder {
    log: Rc<RefCell<Vec<Event>>>,
}

impl Recorder {
    pub(crate) fn behavior(&self) -> Recording {
        Recording {
            log: Rc::clone(&self.log),
            on_update: None,
            on_collision: None,
        }
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }

    pub(crate) fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

type Hook = Box<dyn FnMut(&mut World, EntityId)>;
type CollisionHook = Box<dyn FnMut(&mut World, EntityId, EntityId)>;

pub(crate) struct Recording {
    log: Rc<RefCell<Vec<Event>>>,
    on_update: Option<Hook>,
    on_collision: Option<CollisionHook>,
}

impl Recording {
    pub(crate) fn on_update(mut self, hook: impl FnMut(&mut World, EntityId) + 'static) -> Self {
        self.on_update = Some(Box::new(hook));
        self
    }

    pub(crate) fn on_collision(
        mut self,
        hook: impl FnMut(&mut World, EntityId, EntityId) + 'static,
    ) -> Self {
        self.on_collision = Some(Box::new(hook));
        self
    }
}

impl Behavior for Recording {
    fn update(&mut self, world: &mut World, me: EntityId) {
        self.log.borrow_mut().push(Event::Update(me));
        if let Some(hook) = self.on_update.as_mut() {
            hook(world, me);
        }
    }

    fn collision(&mut self, world: &mut World, me: EntityId, other: EntityId) {
        self.log.borrow_mut().push(Event::Collision(me, other));
        if let Some(hook) = self.on_collision.as_mut() {
            hook(world, me, other);
        }
    }
}
