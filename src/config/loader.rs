//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::HarnessConfig;
use crate::config::validation::ValidationError;

/// Fatal problem found before the loop starts.
#[derive(Debug, Error)]
pub enum StartupConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid command line: {0}")]
    Args(String),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Read a TOML configuration file. Validation happens after CLI overrides.
pub fn load_config(path: &Path) -> Result<HarnessConfig, StartupConfigError> {
    let content = fs::read_to_string(path).map_err(|source| StartupConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: HarnessConfig = toml::from_str(&content)?;
    Ok(config)
}
