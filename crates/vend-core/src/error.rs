use std::path::PathBuf;
use thiserror::Error;

/// Core error type for vend operations outside the resolver and builder.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config at {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No package.json found from {}", start.display())]
    ProjectNotFound { start: PathBuf },
}

impl Error {
    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigRead { .. } => "VEND_CONFIG_READ_FAILED",
            Self::ConfigParse { .. } => "VEND_CONFIG_INVALID",
            Self::ProjectNotFound { .. } => "PROJECT_NOT_FOUND",
        }
    }
}
