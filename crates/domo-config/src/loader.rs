//! YAML file loading

use crate::app::AppConfig;
use crate::document::ScheduleDocument;
use crate::error::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::debug;

fn load_yaml<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    debug!(path = %path.display(), "loading YAML file");

    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseYaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the application configuration from a YAML file.
pub fn load_app_config(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    load_yaml(path.as_ref())
}

/// Load a schedule document from a YAML file.
///
/// Used at startup and again on hot reload; a parse failure here leaves the
/// previously installed document untouched.
pub fn load_schedule_document(path: impl AsRef<Path>) -> ConfigResult<ScheduleDocument> {
    load_yaml(path.as_ref())
}
