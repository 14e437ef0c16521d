//! Compiler configuration.
//!
//! A [`Config`] is handed to each compiler session; there is no process-wide
//! store. It can be built in code, or loaded from a JSON document with the
//! same keys (lower-case) as the fields below.

use scssc_shared::errors::{ScssError, ScssResult};
use serde::Deserialize;

/// Directories probed for `@import` resolution, in order.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LoadPaths {
    /// A single directory, or a comma-separated list of directories.
    Joined(String),
    /// An explicit list of directories.
    List(Vec<String>),
}

impl LoadPaths {
    /// Flattens either form into the ordered directory list.
    #[must_use]
    pub fn directories(&self) -> Vec<String> {
        match self {
            LoadPaths::Joined(s) => s
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect(),
            LoadPaths::List(v) => v.clone(),
        }
    }
}

impl Default for LoadPaths {
    fn default() -> Self {
        LoadPaths::List(Vec::new())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Sass `@import` load paths.
    pub load_paths: LoadPaths,
    /// Where static source assets (sprite source images) live.
    pub static_root: String,
    /// Where generated assets (sprite sheets and their caches) are written.
    pub assets_root: String,
    /// Public URL prefix for `static_root`.
    pub static_url: String,
    /// Public URL prefix for `assets_root`.
    pub assets_url: String,
    /// When true, expression parse errors are fatal instead of logged.
    pub debug: bool,
    /// Verbosity of the generated CSS comments and of the logging.
    pub verbosity: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            load_paths: LoadPaths::default(),
            static_root: "static/".to_string(),
            assets_root: "static/assets/".to_string(),
            static_url: "/static/".to_string(),
            assets_url: "/static/assets/".to_string(),
            debug: false,
            verbosity: 1,
        }
    }
}

impl Config {
    /// Loads a configuration from a JSON document.
    pub fn from_json(data: &str) -> ScssResult<Config> {
        serde_json::from_str(data).map_err(|e| ScssError::Config(e.to_string()))
    }

    /// Loads a configuration from a JSON file on disk.
    pub fn from_file(path: &str) -> ScssResult<Config> {
        let data = std::fs::read_to_string(path)?;
        Config::from_json(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, LoadPaths};

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.verbosity, 1);
        assert!(!config.debug);
        assert!(config.load_paths.directories().is_empty());
    }

    #[test]
    fn load_paths_joined() {
        let paths = LoadPaths::Joined("sass/, frameworks".to_string());
        assert_eq!(paths.directories(), vec!["sass/", "frameworks"]);
    }

    #[test]
    fn from_json() {
        let config = Config::from_json(
            r#"{"load_paths": ["a", "b"], "debug": true, "verbosity": 2}"#,
        )
        .unwrap();
        assert_eq!(config.load_paths.directories(), vec!["a", "b"]);
        assert!(config.debug);
        assert_eq!(config.verbosity, 2);
    }

    #[test]
    fn bad_json_is_a_config_error() {
        assert!(Config::from_json("{nope").is_err());
    }
}
