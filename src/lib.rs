mod config;
mod error;

pub mod api;
pub mod client;
pub mod controller;
pub mod discretize;
pub mod export;
pub mod expression;
pub mod manifest;
pub mod piecewise;
pub mod render;
pub mod traj_file;

pub use config::{Config, ConfigError};
pub use discretize::{DiscretizeLimits, Segment, StepResolution};
pub use error::{Error, Result};
pub use export::ExportOptions;
pub use piecewise::Piecewise;
pub use render::PlotOptions;
pub use traj_file::{TrajFileError, TrajHeader, Trajectory};
