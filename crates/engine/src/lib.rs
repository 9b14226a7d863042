pub mod persist;
pub mod runtime;
pub mod world;

pub use persist::{
    read_map_file, write_map_file, EntityFactory, EntityRecord, LoadError, LoadReport, MapFileError,
    MapHeader, MapSnapshot,
};
pub use runtime::{
    run_loop, LoopConfig, LoopMetricsSnapshot, LoopSummary, MetricsHandle, StopHandle, StopReason,
    SLOW_FRAME_ENV_VAR,
};
pub use world::{
    ActivityMode, Behavior, BodyKind, Canvas, Cell, CollisionSet, DrawCommand, Entity, EntityDesc,
    EntityId, ImageHandle, MapDims, MapDimsError, MoveRequest, PlacementError, Point,
    RecordingCanvas, Resolution, World, WorldHook, DEFAULT_Z_WIDTH,
};
