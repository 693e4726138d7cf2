//! Configuration file handling for argot

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commands::option::OptionDefinition;
use crate::commands::registry::DefinitionError;
use crate::plan::validation::PlanError;

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No config file found in current directory or its parents: {0}")]
    ConfigNotFound(PathBuf),
    #[error("Unknown working directory: {0}")]
    UnknownWorkingDirectory(String),
    #[error("Unable to parse YAML config file {path}: {source}")]
    Yaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("Unable to parse JSON config file {path}: {source}")]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("Invalid config: {0}")]
    Validation(String),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Configuration for a single option
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConfigOption {
    pub name: String,
    pub aliases: Option<Vec<String>>,
    pub description: Option<String>,
    /// The option takes a value
    pub value: Option<bool>,
    pub global: Option<bool>,
}

impl From<ConfigOption> for OptionDefinition {
    fn from(config: ConfigOption) -> Self {
        OptionDefinition {
            name: config.name,
            aliases: config.aliases.unwrap_or_default(),
            description: config.description.unwrap_or_default(),
            expects_value: config.value.unwrap_or(false),
            is_global: config.global.unwrap_or(false),
        }
    }
}

/// Shell fragments attached to a command or task
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct ConfigHooks {
    /// Main command
    pub run: Option<String>,
    /// Skips the unit when this command succeeds
    pub skip_if: Option<String>,
    pub after: Option<String>,
    /// Runs once after everything else has finished
    pub after_all: Option<String>,
}

impl ConfigHooks {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.run.is_none()
            && self.skip_if.is_none()
            && self.after.is_none()
            && self.after_all.is_none()
    }
}

/// Configuration for a command, possibly with subcommands
#[derive(Debug, Deserialize, Serialize)]
pub struct ConfigCommand {
    pub name: String,
    pub description: Option<String>,
    /// Only groups subcommands; not invocable itself
    pub topic: Option<bool>,
    pub private: Option<bool>,
    pub options: Option<Vec<ConfigOption>>,
    pub depends_on: Option<Vec<String>>,
    #[serde(flatten)]
    pub hooks: ConfigHooks,
    pub commands: Option<Vec<ConfigCommand>>,
}

/// Configuration for a task, only reachable through `depends_on`
#[derive(Debug, Deserialize, Serialize)]
pub struct ConfigTask {
    pub name: String,
    pub description: Option<String>,
    pub depends_on: Option<Vec<String>>,
    #[serde(flatten)]
    pub hooks: ConfigHooks,
}

/// Root configuration structure for argot
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub argot_version: String,
    #[serde(flatten)]
    pub root: ConfigCommand,
    pub tasks: Option<Vec<ConfigTask>>,
}

/// List of supported configuration file names
const FILENAMES: [&str; 3] = [".argot.json", ".argot.yaml", ".argot.yml"];

impl Config {
    /// Loads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if the file cannot be read, or
    /// `ConfigError::Yaml`/`ConfigError::Json` if parsing fails.
    pub fn from_file(file: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(file)
            .map_err(|_| ConfigError::ConfigNotFound(file.to_path_buf()))?;
        let config: Config = if file.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Json {
                source: e,
                path: file.to_path_buf(),
            })?
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml {
                source: e,
                path: file.to_path_buf(),
            })?
        };
        Ok(config)
    }

    /// Searches for a configuration file in the current directory and its parents.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownWorkingDirectory` if the cwd cannot be determined,
    /// or `ConfigError::ConfigNotFound` if no config file is found.
    pub fn find_config() -> Result<PathBuf, ConfigError> {
        let cwd = std::env::current_dir()
            .map_err(|e| ConfigError::UnknownWorkingDirectory(e.to_string()))?;
        Self::find_config_from(&cwd)
    }

    /// Searches for a configuration file in `start` and its parents.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if no config file is found.
    pub fn find_config_from(start: &Path) -> Result<PathBuf, ConfigError> {
        let mut path = start.to_path_buf();
        debug!("Searching for config file in {}", start.display());
        loop {
            for file in &FILENAMES {
                let config_path = path.join(file);
                if config_path.exists() {
                    info!("Found config file: {}", config_path.display());
                    return Ok(config_path);
                }
            }
            if !path.pop() {
                return Err(ConfigError::ConfigNotFound(start.to_path_buf()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".argot.json");
        std::fs::write(
            &path,
            r#"{
                "argot_version": "0.1.0",
                "name": "app",
                "commands": [{"name": "build", "run": "echo hello"}]
            }"#,
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.root.name, "app");
        let build = &config.root.commands.as_ref().unwrap()[0];
        assert_eq!(build.hooks.run.as_deref(), Some("echo hello"));
    }

    #[test]
    fn test_from_file_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".argot.yaml");
        std::fs::write(
            &path,
            r#"
argot_version: '0.1.0'
name: app
options:
  - name: verbose
    aliases: [v]
    global: true
tasks:
  - name: lint
    run: 'true'
"#,
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        let option: OptionDefinition = config.root.options.unwrap()[0].clone().into();
        assert_eq!(option.spellings(), vec!["--verbose", "-v"]);
        assert!(option.is_global);
        assert_eq!(config.tasks.unwrap()[0].name, "lint");
    }

    #[test]
    fn test_invalid_yaml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".argot.yaml");
        std::fs::write(&path, "name: [unclosed\n").unwrap();
        match Config::from_file(&path) {
            Err(ConfigError::Yaml { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected Yaml error, got: {other:?}"),
        }
    }

    #[test]
    fn test_find_config_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".argot.yml"), "argot_version: '0.1.0'\nname: app\n")
            .unwrap();
        let found = Config::find_config_from(&nested).unwrap();
        assert_eq!(found, dir.path().join(".argot.yml"));
    }
}
