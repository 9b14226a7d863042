use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use grid_engine::{LoopConfig, MapDims, MapDimsError, DEFAULT_Z_WIDTH};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub(crate) const CONFIG_ENV_VAR: &str = "GRIDCORE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "gridcore.json";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct DemoConfig {
    pub(crate) grid_width: u32,
    pub(crate) grid_height: u32,
    pub(crate) cell_width: u32,
    pub(crate) cell_height: u32,
    pub(crate) z_width: usize,
    pub(crate) target_tps: u32,
    pub(crate) max_ticks: u64,
    /// Wall-clock cap enforced from the main thread through the stop handle.
    pub(crate) time_limit_ms: Option<u64>,
    pub(crate) fuzz: i32,
    pub(crate) viewport_width: u32,
    pub(crate) viewport_height: u32,
    pub(crate) layout: Vec<String>,
    pub(crate) save_path: PathBuf,
    pub(crate) json_export_path: Option<PathBuf>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            grid_width: 20,
            grid_height: 10,
            cell_width: 16,
            cell_height: 16,
            z_width: DEFAULT_Z_WIDTH,
            target_tps: 20,
            max_ticks: 100,
            time_limit_ms: None,
            fuzz: 4,
            viewport_width: 192,
            viewport_height: 128,
            layout: [
                "####################",
                "#..................#",
                "#..>.......#.......#",
                "#......*...#...o...#",
                "#..........#.......#",
                "#...####.......*...#",
                "#.........v........#",
                "#..*.........s.....#",
                "#..................#",
                "####################",
            ]
            .iter()
            .map(|row| row.to_string())
            .collect(),
            save_path: PathBuf::from("target/gridcore-demo.gmap"),
            json_export_path: None,
        }
    }
}

impl DemoConfig {
    pub(crate) fn dims(&self) -> Result<MapDims, MapDimsError> {
        MapDims::new(
            self.grid_width,
            self.grid_height,
            self.cell_width,
            self.cell_height,
        )
    }

    pub(crate) fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            target_tps: self.target_tps,
            max_ticks: Some(self.max_ticks),
            metrics_log_interval: Duration::from_secs(1),
            ..LoopConfig::default()
        }
    }
}

/// Reads the config named by `GRIDCORE_CONFIG`, or `gridcore.json` in the
/// working directory. A missing file means defaults.
pub(crate) fn load_config() -> Result<DemoConfig, ConfigError> {
    let path = std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    load_config_from(&path)
}

pub(crate) fn load_config_from(path: &Path) -> Result<DemoConfig, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "config_missing_using_defaults");
            return Ok(DemoConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let config = parse_config(&raw, path)?;
    info!(path = %path.display(), "config_loaded");
    Ok(config)
}

pub(crate) fn parse_config(raw: &str, path: &Path) -> Result<DemoConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, DemoConfig>(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        let source = error.into_inner();
        let message = if field.is_empty() || field == "." {
            source.to_string()
        } else {
            format!("at {field}: {source}")
        };
        ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        }
    })
}
