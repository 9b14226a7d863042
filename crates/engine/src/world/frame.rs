use tracing::trace;

use super::entity::{EntityId, ImageHandle};
use super::geometry::Point;
use super::World;

/// Drawing surface fed by the paint pass.
pub trait Canvas {
    /// Visible size in pixels, used to centre a followed entity.
    fn viewport(&self) -> (u32, u32);

    fn draw(&mut self, image: ImageHandle, x: i32, y: i32);

    /// Called once after every entity of a frame has been drawn.
    fn present(&mut self) {}
}

/// Map-wide logic run once per tick, after the entities are drawn and before
/// the frame is presented, so it may also draw an overlay.
pub type WorldHook = Box<dyn FnMut(&mut World, &mut dyn Canvas)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub entity: EntityId,
    pub image: ImageHandle,
    pub x: i32,
    pub y: i32,
}

/// Canvas that keeps the draw calls of the last presented frame.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    viewport: (u32, u32),
    pending: Vec<(ImageHandle, i32, i32)>,
    last_frame: Vec<(ImageHandle, i32, i32)>,
    frames: u64,
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: (width, height),
            ..Self::default()
        }
    }

    pub fn last_frame(&self) -> &[(ImageHandle, i32, i32)] {
        &self.last_frame
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Canvas for RecordingCanvas {
    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn draw(&mut self, image: ImageHandle, x: i32, y: i32) {
        self.pending.push((image, x, y));
    }

    fn present(&mut self) {
        self.last_frame = std::mem::take(&mut self.pending);
        self.frames += 1;
    }
}

impl World {
    /// One frame: camera follow, update pass, paint pass, world hook.
    pub fn tick(&mut self, canvas: &mut dyn Canvas) {
        self.follow_camera(canvas.viewport());
        if self.updates_enabled {
            self.update_pass();
        }
        self.draw_entities(canvas);
        self.run_world_hook(canvas);
        canvas.present();
        self.ticks += 1;
    }

    /// Visits entities in the order captured by the last paint pass. Entities
    /// added since then wait for the next frame; entities removed since then
    /// are skipped.
    pub fn update_pass(&mut self) {
        let mut cursor = self.draw.update_cursor();
        while let Some(id) = self.draw.next_for_update(&mut cursor) {
            let Some(entity) = self.linked(id) else {
                continue;
            };
            let mode = entity.activity();
            let at = entity.position;
            if mode.scans_collisions() {
                let hits = self.query_for(id, at);
                self.dispatch_collisions(id, &hits);
            }
            let still_active = self.linked(id).is_some_and(|entity| entity.activity().runs_updates());
            if still_active {
                self.run_behavior(id, |behavior, world| behavior.update(world, id));
            }
        }
    }

    /// Draws every linked entity back to front and captures that order for
    /// the next update pass.
    pub fn paint(&mut self, canvas: &mut dyn Canvas) {
        self.draw_entities(canvas);
        canvas.present();
    }

    fn draw_entities(&mut self, canvas: &mut dyn Canvas) {
        let mut drawn = 0usize;
        for command in self.draw_commands() {
            canvas.draw(command.image, command.x, command.y);
            drawn += 1;
        }
        self.draw.snapshot_update_order();
        trace!(tick = self.ticks, drawn, "frame_painted");
    }

    /// Installs the map-wide hook run by every [`World::tick`], replacing any
    /// previous one.
    pub fn set_world_hook(&mut self, hook: impl FnMut(&mut World, &mut dyn Canvas) + 'static) {
        self.world_hook = Some(Box::new(hook));
    }

    pub fn clear_world_hook(&mut self) -> bool {
        self.world_hook.take().is_some()
    }

    pub fn has_world_hook(&self) -> bool {
        self.world_hook.is_some()
    }

    fn run_world_hook(&mut self, canvas: &mut dyn Canvas) {
        let Some(mut hook) = self.world_hook.take() else {
            return;
        };
        hook(self, canvas);
        // A replacement installed by the hook itself wins.
        if self.world_hook.is_none() {
            self.world_hook = Some(hook);
        }
    }

    /// Screen-space draw calls in paint order for the current camera.
    pub fn draw_commands(&self) -> Vec<DrawCommand> {
        self.draw
            .iter()
            .filter_map(|id| self.entity(id))
            .map(|entity| DrawCommand {
                entity: entity.id,
                image: entity.image,
                x: entity.position.x + entity.offset.0 - self.camera.x,
                y: entity.position.y + entity.offset.1 - self.camera.y,
            })
            .collect()
    }

    pub fn camera(&self) -> Point {
        self.camera
    }

    pub fn set_camera(&mut self, camera: Point) {
        self.camera = camera;
    }

    /// Entity the camera keeps centred at the start of every tick.
    pub fn set_camera_target(&mut self, target: Option<EntityId>) {
        self.camera_target = target;
    }

    pub fn camera_target(&self) -> Option<EntityId> {
        self.camera_target
    }

    pub fn set_updates_enabled(&mut self, enabled: bool) {
        self.updates_enabled = enabled;
    }

    pub fn updates_enabled(&self) -> bool {
        self.updates_enabled
    }

    fn follow_camera(&mut self, viewport: (u32, u32)) {
        let Some(target) = self.camera_target.and_then(|id| self.position(id)) else {
            return;
        };
        let cell_w = self.dims.cell_width() as i32;
        let cell_h = self.dims.cell_height() as i32;
        let (view_w, view_h) = (viewport.0 as i32, viewport.1 as i32);
        self.camera = Point::new(
            follow_axis(target.x, view_w, cell_w, self.dims.max_x()),
            follow_axis(target.y, view_h, cell_h, self.dims.max_y()),
        );
    }
}

/// Centres `pos` in the view, then keeps the view inside the map. A map smaller
/// than the view pins the camera to the far edge.
fn follow_axis(pos: i32, view: i32, cell: i32, max: i32) -> i32 {
    let camera = pos - (view - cell) / 2;
    if camera < 0 {
        0
    } else {
        camera.min(max - view + cell)
    }
}
