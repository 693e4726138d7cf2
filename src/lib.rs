//! Command resolution and dependency-ordered task running
//!
//! argot interprets a command line against a tree of named, optionally nested commands
//! and runs the selected commands after their dependencies. The pipeline is:
//!
//! 1. [`tokenizer::tokenize`] splits raw arguments into option and value tokens.
//! 2. [`plan::ValidationPlan::build`] compiles a [`commands::tree::CommandTree`] into a
//!    lookup structure.
//! 3. [`plan::ExecutionPlan::resolve`] matches the tokens, recording matched commands and
//!    their options as well as unknown commands and options.
//! 4. [`runner::Runner`] runs a unit's dependency graph with its lifecycle hooks.
//!
//! Command trees can be built in code or loaded from a configuration file with
//! [`load_config`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::commands::definition::{Definition, Hooks, Kind};
use crate::commands::registry::{DefinitionError, Registry, UnitId};
use crate::commands::tree::CommandTree;
use crate::config_file::{Config, ConfigCommand, ConfigError, ConfigHooks, ConfigTask};
use crate::plan::{ExecutionPlan, ValidationPlan};

pub mod commands;
pub mod config_file;
pub mod logger;
pub mod plan;
pub mod runner;
pub mod tokenizer;

/// Everything the hook factory passed to [`load_config`] knows about a unit
#[derive(Debug, Clone)]
pub struct UnitConfig {
    pub name: String,
    pub kind: Kind,
    pub hooks: ConfigHooks,
    /// Directory containing the config file
    pub cwd: PathBuf,
}

/// A loaded configuration: the registered units and the compiled command tree
#[derive(Debug)]
pub struct Project {
    pub registry: Registry,
    pub tree: CommandTree,
    pub plan: ValidationPlan,
    pub cwd: PathBuf,
    pub config_path: PathBuf,
}

impl Project {
    /// Tokenize `args` and resolve them against the command tree
    #[must_use]
    pub fn resolve<S: AsRef<str>>(&self, args: &[S]) -> ExecutionPlan {
        let tokens = tokenizer::tokenize(args);
        debug!("Resolving {} tokens", tokens.len());
        ExecutionPlan::resolve(&tokens, &self.plan)
    }
}

/// Load configuration from a file (or auto-detect) and register every command and task.
///
/// `hooks` is called once per unit to build its lifecycle hooks from the shell
/// fragments in the config.
///
/// # Errors
///
/// Returns `ConfigError` if the config file is not found, cannot be parsed, contains
/// empty names, a private root, duplicate names, unknown or circular dependencies.
pub fn load_config<F>(config_file: Option<&str>, mut hooks: F) -> Result<Project, ConfigError>
where
    F: FnMut(&UnitConfig) -> Hooks,
{
    let config_path = match config_file {
        Some(file) => {
            let config_path = PathBuf::from(file);
            if !config_path.exists() {
                return Err(ConfigError::ConfigNotFound(config_path));
            }
            config_path
        }
        None => Config::find_config()?,
    };
    let cwd = config_dir(&config_path)?;
    debug!(
        "Loading config file: {} (cwd: {})",
        config_path.display(),
        cwd.display()
    );
    let parsed = Config::from_file(&config_path)?;
    validate_version(&parsed.argot_version);
    validate_names(&parsed)?;

    let mut registry = Registry::new();
    let mut builder = Builder {
        registry: &mut registry,
        hooks: &mut hooks,
        cwd: &cwd,
    };
    for task in parsed.tasks.unwrap_or_default() {
        builder.task(task)?;
    }
    let tree = builder.command(parsed.root)?;

    // Resolves every deferred dependency list, so unknown names and cycles surface here
    registry.validate()?;
    let plan = ValidationPlan::build(&tree, &registry)?;

    Ok(Project {
        registry,
        tree,
        plan,
        cwd,
        config_path,
    })
}

/// Absolute directory containing `config_path`; a bare file name lives in the cwd
fn config_dir(config_path: &Path) -> Result<PathBuf, ConfigError> {
    let parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    parent
        .canonicalize()
        .map_err(|e| ConfigError::UnknownWorkingDirectory(e.to_string()))
}

/// Warn if the config's `argot_version` doesn't match the binary version
fn validate_version(config_version: &str) {
    let binary_version = env!("CARGO_PKG_VERSION");
    if config_version != binary_version {
        warn!(
            "Config argot_version '{config_version}' differs from binary version '{binary_version}'"
        );
    }
}

fn validate_names(config: &Config) -> Result<(), ConfigError> {
    check_empty_names(&config.root)?;
    if config.root.private.unwrap_or(false) {
        return Err(ConfigError::Validation(format!(
            "Root command '{}' cannot be private",
            config.root.name
        )));
    }
    let mut seen = HashSet::new();
    for task in config.tasks.iter().flatten() {
        if task.name.trim().is_empty() {
            return Err(ConfigError::Validation("Task with an empty name".to_string()));
        }
        if !seen.insert(task.name.as_str()) {
            return Err(DefinitionError::DuplicateTask(task.name.clone()).into());
        }
    }
    Ok(())
}

fn check_empty_names(command: &ConfigCommand) -> Result<(), ConfigError> {
    if command.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "Command with an empty name".to_string(),
        ));
    }
    for option in command.options.iter().flatten() {
        if option.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Command '{}' has an option with an empty name",
                command.name
            )));
        }
    }
    for child in command.commands.iter().flatten() {
        check_empty_names(child)?;
    }
    Ok(())
}

struct Builder<'a, F> {
    registry: &'a mut Registry,
    hooks: &'a mut F,
    cwd: &'a Path,
}

impl<F> Builder<'_, F>
where
    F: FnMut(&UnitConfig) -> Hooks,
{
    fn unit_hooks(&mut self, name: &str, kind: Kind, hooks: ConfigHooks) -> Hooks {
        (self.hooks)(&UnitConfig {
            name: name.to_string(),
            kind,
            hooks,
            cwd: self.cwd.to_path_buf(),
        })
    }

    fn task(&mut self, task: ConfigTask) -> Result<UnitId, ConfigError> {
        let hooks = self.unit_hooks(&task.name, Kind::Task, task.hooks);
        let definition = Definition::task(&task.name)
            .describe(task.description.unwrap_or_default())
            .hooks(hooks);
        let definition = with_named_dependencies(definition, task.depends_on);
        Ok(self.registry.add(definition)?)
    }

    fn command(&mut self, command: ConfigCommand) -> Result<CommandTree, ConfigError> {
        let mut tree = if command.topic.unwrap_or(false) {
            if command.options.as_ref().is_some_and(|o| !o.is_empty())
                || command.depends_on.as_ref().is_some_and(|d| !d.is_empty())
                || !command.hooks.is_empty()
            {
                return Err(ConfigError::Validation(format!(
                    "Topic '{}' cannot declare options, dependencies or hooks",
                    command.name
                )));
            }
            CommandTree::topic(&command.name)
        } else {
            let hooks = self.unit_hooks(&command.name, Kind::Command, command.hooks);
            let mut definition = Definition::command(&command.name)
                .describe(command.description.unwrap_or_default())
                .hooks(hooks);
            definition.is_private = command.private.unwrap_or(false);
            definition.options = command
                .options
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect();
            let definition = with_named_dependencies(definition, command.depends_on);
            CommandTree::command(&command.name, self.registry.add(definition)?)
        };

        for child in command.commands.unwrap_or_default() {
            tree.children.push(self.command(child)?);
        }
        Ok(tree)
    }
}

/// Attach `depends_on` task names, looked up when the dependencies are first needed
fn with_named_dependencies(definition: Definition, names: Option<Vec<String>>) -> Definition {
    let names = names.unwrap_or_default();
    if names.is_empty() {
        return definition;
    }
    let unit = definition.name.clone();
    definition.depends_on_deferred(move |registry| {
        names
            .iter()
            .map(|name| {
                registry
                    .find_task(name)
                    .ok_or_else(|| DefinitionError::MissingDependency {
                        unit: unit.clone(),
                        dependency: name.clone(),
                    })
            })
            .collect()
    })
}
