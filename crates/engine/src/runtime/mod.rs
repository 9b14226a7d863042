mod loop_runner;
mod metrics;

pub use loop_runner::{
    run_loop, LoopConfig, LoopSummary, StopHandle, StopReason, SLOW_FRAME_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
