use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::discretize::{DiscretizeLimits, StepResolution};
use crate::export::ExportOptions;
use crate::render::PlotOptions;

#[derive(Deserialize, Clone, Serialize, Debug)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "ListenAddr")]
    pub listen_addr: String,

    #[serde(rename = "ServerUrl")]
    pub server_url: String,

    #[serde(rename = "OutputDir")]
    pub output_dir: PathBuf,

    #[serde(rename = "DevicePrefix")]
    pub device_prefix: String,

    #[serde(rename = "DefaultStepAngle")]
    pub default_step_angle: f64,

    #[serde(rename = "DefaultMicrosteps")]
    pub default_microsteps: u32,

    #[serde(rename = "InitialSamples")]
    pub initial_samples: usize,

    #[serde(rename = "MaxSamples")]
    pub max_samples: usize,

    #[serde(rename = "PlotSamples")]
    pub plot_samples: usize,

    #[serde(rename = "PlotWidth")]
    pub plot_width: u32,

    #[serde(rename = "PlotHeight")]
    pub plot_height: u32,

    #[serde(rename = "AngleScale")]
    pub angle_scale: u32,

    #[serde(rename = "DebounceMs")]
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_owned(),
            server_url: "http://127.0.0.1:3000".to_owned(),
            output_dir: PathBuf::from("traj"),
            device_prefix: "/gimbal".to_owned(),
            default_step_angle: 1.8,
            default_microsteps: 16,
            initial_samples: 1000,
            max_samples: 2_000_000,
            plot_samples: 1000,
            plot_width: 800,
            plot_height: 500,
            angle_scale: 1_000_000,
            debounce_ms: 500,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to get config directory!")]
    NoConfigDir,

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Config {
    /// Default location: `<config dir>/gimbal-trajectory/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        directories::BaseDirs::new()
            .map(|base_dirs| {
                base_dirs
                    .config_dir()
                    .join(Path::new("gimbal-trajectory"))
                    .join(Path::new("config.json"))
            })
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from `path` or from the default location.
    /// A missing file is not an error, defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let config = serde_json::from_str::<Config>(&contents).map_err(|source| {
                    ConfigError::Parse {
                        path: path.clone(),
                        source,
                    }
                })?;
                Ok((config, path))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Config file {:?} not found, using defaults", path);
                Ok((Self::default(), path))
            }
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn default_resolution(&self) -> StepResolution {
        StepResolution {
            step_angle: self.default_step_angle,
            microsteps: self.default_microsteps,
        }
    }

    pub fn limits(&self) -> DiscretizeLimits {
        DiscretizeLimits {
            initial_samples: self.initial_samples,
            max_samples: self.max_samples,
        }
    }

    pub fn plot_options(&self) -> PlotOptions {
        PlotOptions {
            width: self.plot_width,
            height: self.plot_height,
            samples: self.plot_samples,
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            output_dir: self.output_dir.clone(),
            device_prefix: self.device_prefix.clone(),
            angle_scale: self.angle_scale,
            limits: self.limits(),
        }
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ListenAddr: {}", self.listen_addr)?;
        writeln!(f, "ServerUrl: {}", self.server_url)?;
        writeln!(f, "OutputDir: {:?}", self.output_dir)?;
        writeln!(f, "DevicePrefix: {}", self.device_prefix)?;

        writeln!(f, "Stepper:")?;
        writeln!(f, "  DefaultStepAngle: {}", self.default_step_angle)?;
        writeln!(f, "  DefaultMicrosteps: {}", self.default_microsteps)?;

        writeln!(f, "Discretization:")?;
        writeln!(f, "  InitialSamples: {}", self.initial_samples)?;
        writeln!(f, "  MaxSamples: {}", self.max_samples)?;
        writeln!(f, "  AngleScale: {}", self.angle_scale)?;

        writeln!(f, "Plot:")?;
        writeln!(f, "  PlotSamples: {}", self.plot_samples)?;
        writeln!(f, "  Size: {}x{}", self.plot_width, self.plot_height)?;

        writeln!(f, "DebounceMs: {}", self.debounce_ms)
    }
}
