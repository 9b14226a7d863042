mod actors;
mod bootstrap;
mod canvas;
mod config;
mod layout;
mod loop_runner;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
