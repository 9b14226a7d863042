use std::cell::Cell;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use grid_engine::{
    read_map_file, run_loop, write_map_file, EntityId, LoadError, MapDimsError, MapFileError,
    MapHeader, MapSnapshot, MetricsHandle, StopHandle, World,
};
use thiserror::Error;
use tracing::{debug, error, info};

use super::actors::{build_factory, WALKER_IMAGE};
use super::bootstrap::AppWiring;
use super::canvas::TextCanvas;
use super::config::{ConfigError, DemoConfig};
use super::layout::{parse_layout, LayoutError};

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid grid size: {0}")]
    Dims(#[from] MapDimsError),
    #[error("invalid layout: {0}")]
    Layout(#[from] LayoutError),
    #[error("failed to build world: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    MapFile(#[from] MapFileError),
    #[error("failed to export snapshot json to {path}: {source}")]
    JsonExport {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode snapshot json: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error("failed to spawn world thread: {0}")]
    SpawnThread(#[source] io::Error),
    #[error("world thread panicked")]
    WorldThreadPanicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DemoOutcome {
    pub(crate) ticks: u64,
    pub(crate) score: u32,
    pub(crate) saved_records: usize,
    pub(crate) reloaded_entities: usize,
    pub(crate) last_frame: String,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_demo(app.config) {
        Ok(outcome) => {
            info!(
                ticks = outcome.ticks,
                score = outcome.score,
                saved_records = outcome.saved_records,
                reloaded_entities = outcome.reloaded_entities,
                "demo_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "demo_failed");
            ExitCode::FAILURE
        }
    }
}

/// Runs the world on its own thread. The world never leaves that thread; the
/// main thread only holds the stop flag and the metrics handle.
fn run_demo(config: DemoConfig) -> Result<DemoOutcome, AppError> {
    let stop = StopHandle::default();
    let metrics = MetricsHandle::default();
    let time_limit = config.time_limit_ms.map(Duration::from_millis);

    let handle = thread::Builder::new()
        .name("world-tick".to_string())
        .spawn({
            let stop = stop.clone();
            let metrics = metrics.clone();
            move || simulate(&config, &stop, &metrics)
        })
        .map_err(AppError::SpawnThread)?;

    if let Some(limit) = time_limit {
        let deadline = Instant::now() + limit;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if !handle.is_finished() {
            info!(limit_ms = limit.as_millis() as u64, "time_limit_reached");
            stop.stop();
        }
    }

    let outcome = handle
        .join()
        .map_err(|_| AppError::WorldThreadPanicked)??;
    let last = metrics.snapshot();
    info!(
        tps = last.tps,
        tick_time_ms = last.tick_time_ms,
        overrun_ticks = last.overrun_ticks,
        "final_metrics"
    );
    Ok(outcome)
}

pub(crate) fn simulate(
    config: &DemoConfig,
    stop: &StopHandle,
    metrics: &MetricsHandle,
) -> Result<DemoOutcome, AppError> {
    let dims = config.dims()?;
    let score = Rc::new(Cell::new(0));
    let factory = build_factory(config.fuzz, &score);

    let layout = MapSnapshot {
        header: MapHeader::from_dims(&dims),
        records: parse_layout(&config.layout, &dims)?,
    };
    let (mut world, report) = factory.load_world(&layout, config.z_width)?;
    info!(
        loaded = report.loaded,
        skipped = report.skipped(),
        "layout_loaded"
    );
    world.set_camera_target(first_walker(&world));

    let mut canvas = TextCanvas::new(
        (config.viewport_width, config.viewport_height),
        (config.cell_width, config.cell_height),
    );
    let summary = run_loop(&mut world, &mut canvas, &config.loop_config(), stop, metrics);
    debug!(frame = canvas.last_frame(), "last_frame");

    let saved = world.snapshot();
    write_map_file(&config.save_path, &saved)?;
    if let Some(path) = &config.json_export_path {
        let json = saved.to_json_pretty().map_err(AppError::JsonEncode)?;
        fs::write(path, json).map_err(|source| AppError::JsonExport {
            path: path.clone(),
            source,
        })?;
    }

    let reloaded = read_map_file(&config.save_path)?;
    let (reloaded_world, reload_report) = factory.load_world(&reloaded, config.z_width)?;
    info!(
        path = %config.save_path.display(),
        records = saved.records.len(),
        reloaded = reload_report.loaded,
        skipped = reload_report.skipped(),
        "map_round_trip"
    );

    Ok(DemoOutcome {
        ticks: summary.ticks,
        score: score.get(),
        saved_records: saved.records.len(),
        reloaded_entities: reloaded_world.draw_order().count(),
        last_frame: canvas.last_frame().to_string(),
    })
}

fn first_walker(world: &World) -> Option<EntityId> {
    world
        .draw_order()
        .find(|id| world.entity(*id).is_some_and(|entity| entity.image() == WALKER_IMAGE))
}
