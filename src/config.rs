// Parser configuration - loadable from JSON like the grammar files

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// How environments store their bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentImpl {
    /// Every `declare` pushes a frame linked to its parent
    #[default]
    Frames,
    /// Every `declare` copies the visible bindings into one flat frame
    Flat,
}

/// Order in which pending descriptors are taken from the worklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheduling {
    #[default]
    Fifo,
    Lifo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub environment: EnvironmentImpl,
    pub scheduling: Scheduling,
    /// Run the descriptor produced by a single-edge pop (or a single popped
    /// element replay) right away instead of queueing it
    pub shortcut: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            environment: EnvironmentImpl::default(),
            scheduling: Scheduling::default(),
            shortcut: true,
        }
    }
}

impl Configuration {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn with_environment(mut self, environment: EnvironmentImpl) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_scheduling(mut self, scheduling: Scheduling) -> Self {
        self.scheduling = scheduling;
        self
    }

    pub fn with_shortcut(mut self, shortcut: bool) -> Self {
        self.shortcut = shortcut;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = Configuration::from_json_str("{}").unwrap();
        assert_eq!(config, Configuration::default());
        assert!(config.shortcut);
    }

    #[test]
    fn test_partial_json() {
        let config =
            Configuration::from_json_str(r#"{"environment": "flat", "scheduling": "lifo"}"#)
                .unwrap();
        assert_eq!(config.environment, EnvironmentImpl::Flat);
        assert_eq!(config.scheduling, Scheduling::Lifo);
        assert!(config.shortcut);
    }

    #[test]
    fn test_bad_json() {
        assert!(Configuration::from_json_str(r#"{"scheduling": "random"}"#).is_err());
    }
}
