use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::world::{Canvas, World};

use super::metrics::MetricsAccumulator;
use super::MetricsHandle;

pub const SLOW_FRAME_ENV_VAR: &str = "GRIDCORE_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    /// Stop after this many ticks; `None` runs until stopped.
    pub max_ticks: Option<u64>,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 20,
            max_ticks: None,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
        }
    }
}

/// Cloneable flag that ends [`run_loop`] before its next tick.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Stopped,
    TickLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub overrun_ticks: u64,
    pub elapsed: Duration,
    pub reason: StopReason,
}

/// Ticks the world at a fixed rate on the calling thread.
///
/// Each tick sleeps away what is left of its frame budget. A tick that runs
/// over is logged and the next one starts immediately; missed frames are not
/// caught up.
pub fn run_loop(
    world: &mut World,
    canvas: &mut dyn Canvas,
    config: &LoopConfig,
    stop: &StopHandle,
    metrics: &MetricsHandle,
) -> LoopSummary {
    let target_tps = config.target_tps.max(1);
    let frame_budget = target_frame_duration(target_tps);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let mut accumulator = MetricsAccumulator::new(metrics_log_interval);
    info!(
        target_tps,
        max_ticks = ?config.max_ticks,
        frame_budget_ms = frame_budget.as_secs_f32() * 1000.0,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        "loop_started"
    );

    let started = Instant::now();
    let mut ticks = 0u64;
    let mut overrun_ticks = 0u64;
    let reason = loop {
        if stop.is_stopped() {
            break StopReason::Stopped;
        }
        if config.max_ticks.is_some_and(|max| ticks >= max) {
            break StopReason::TickLimit;
        }

        let tick_start = Instant::now();
        if slow_frame_delay > Duration::ZERO {
            // Explicit debug perturbation only; not part of pacing.
            thread::sleep(slow_frame_delay);
        }
        world.tick(canvas);
        ticks += 1;

        let tick_time = tick_start.elapsed();
        let overran = tick_time > frame_budget;
        if overran {
            overrun_ticks += 1;
            warn!(
                tick = world.ticks(),
                tick_time_ms = tick_time.as_secs_f32() * 1000.0,
                frame_budget_ms = frame_budget.as_secs_f32() * 1000.0,
                "frame_budget_exceeded"
            );
        }
        accumulator.record_tick(tick_time, overran);
        if let Some(snapshot) = accumulator.maybe_snapshot(Instant::now()) {
            metrics.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                overrun_ticks = snapshot.overrun_ticks,
                entity_count = world.draw_order().count(),
                "loop_metrics"
            );
        }

        let sleep = compute_frame_sleep(tick_time, frame_budget);
        if sleep > Duration::ZERO {
            thread::sleep(sleep);
        }
    };

    let summary = LoopSummary {
        ticks,
        overrun_ticks,
        elapsed: started.elapsed(),
        reason,
    };
    info!(
        ticks = summary.ticks,
        overrun_ticks = summary.overrun_ticks,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        reason = ?summary.reason,
        "loop_stopped"
    );
    summary
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn target_frame_duration(target_tps: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(target_tps.max(1)))
}

fn compute_frame_sleep(elapsed: Duration, budget: Duration) -> Duration {
    budget.saturating_sub(elapsed)
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    slow_frame_delay_from(env::var(SLOW_FRAME_ENV_VAR), config_slow_frame_ms)
}

fn slow_frame_delay_from(
    value: Result<String, env::VarError>,
    config_slow_frame_ms: u64,
) -> Duration {
    match value {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}
