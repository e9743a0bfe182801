use thiserror::Error;

use crate::expression::ParseError;
use crate::traj_file::TrajFileError;

#[derive(Debug, Error)]
pub enum Error {
    /// Problem with user input, message is shown as is
    #[error("{0}")]
    Validation(String),

    #[error("Failed to parse expression: {0}")]
    Expression(#[from] ParseError),

    #[error("Trajectory file: {0}")]
    TrajFile(#[from] TrajFileError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to render image: {0}")]
    Render(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An existing `commands.json` that cannot be merged safely
    #[error("Refusing to overwrite {path}: {reason}")]
    Manifest { path: String, reason: String },
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Prefix a validation message, other kinds are left untouched
    pub fn context(self, prefix: &str) -> Self {
        match self {
            Self::Validation(msg) => Self::Validation(format!("{prefix}{msg}")),
            other => other,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
