use std::collections::HashSet;
use std::fmt;

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::commands::definition::{Definition, Dependencies, Kind};

/// Errors in the shape of a definition graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Unit '{unit}' depends on '{dependency}' which does not exist")]
    MissingDependency { unit: String, dependency: String },
    #[error("Unit '{0}' depends on itself")]
    SelfDependency(String),
    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    /// The resolver of this unit panicked, leaving its dependencies unknown
    #[error("Dependency resolver of '{0}' panicked")]
    PoisonedResolution(String),
    #[error("Unknown unit {0}")]
    UnknownUnit(UnitId),
}

/// Handle to a unit stored in a [`Registry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UnitId(usize);

impl UnitId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Record {
    definition: Definition,
    executed: bool,
}

/// Arena owning every command and task definition, plus each unit's run state
#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<Record>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, validating its resolved dependencies.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError::DuplicateTask` if a task with the same name exists,
    /// `SelfDependency` or `MissingDependency` if a dependency handle is invalid.
    pub fn add(&mut self, definition: Definition) -> Result<UnitId, DefinitionError> {
        let id = UnitId(self.records.len());
        if definition.kind == Kind::Task && self.find_task(&definition.name).is_some() {
            return Err(DefinitionError::DuplicateTask(definition.name));
        }
        if let Dependencies::Resolved(ids) = &definition.dependencies {
            self.check_dependencies(id, &definition.name, ids)?;
        }
        debug!("Registered {:?} '{}' as {id}", definition.kind, definition.name);
        self.records.push(Record {
            definition,
            executed: false,
        });
        Ok(id)
    }

    fn check_dependencies(
        &self,
        id: UnitId,
        name: &str,
        dependencies: &[UnitId],
    ) -> Result<(), DefinitionError> {
        for dep in dependencies {
            if *dep == id {
                return Err(DefinitionError::SelfDependency(name.to_string()));
            }
            if dep.0 >= self.records.len() {
                return Err(DefinitionError::MissingDependency {
                    unit: name.to_string(),
                    dependency: dep.to_string(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Definition> {
        self.records.get(id.0).map(|r| &r.definition)
    }

    /// # Errors
    ///
    /// Returns `DefinitionError::UnknownUnit` if the handle is not from this registry.
    pub fn definition(&self, id: UnitId) -> Result<&Definition, DefinitionError> {
        self.get(id).ok_or(DefinitionError::UnknownUnit(id))
    }

    #[must_use]
    pub fn find_task(&self, name: &str) -> Option<UnitId> {
        self.records
            .iter()
            .position(|r| r.definition.kind == Kind::Task && r.definition.name == name)
            .map(UnitId)
    }

    pub fn ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        (0..self.records.len()).map(UnitId)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dependencies of a unit if they have already been resolved
    #[must_use]
    pub fn resolved_dependencies(&self, id: UnitId) -> Option<&[UnitId]> {
        match &self.records.get(id.0)?.definition.dependencies {
            Dependencies::Resolved(ids) => Some(ids),
            _ => None,
        }
    }

    /// Dependencies of a unit, running its deferred resolver on first access.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error (also on every later call), `MissingDependency` or
    /// `SelfDependency` for invalid handles, and `PoisonedResolution` if an earlier call
    /// panicked inside the resolver.
    pub fn dependencies(&mut self, id: UnitId) -> Result<Vec<UnitId>, DefinitionError> {
        let record = self
            .records
            .get_mut(id.0)
            .ok_or(DefinitionError::UnknownUnit(id))?;
        let name = record.definition.name.clone();
        let current =
            std::mem::replace(&mut record.definition.dependencies, Dependencies::Resolving);

        let resolved = match current {
            Dependencies::Resolved(ids) => Ok(ids),
            Dependencies::Deferred(resolver) => {
                debug!("Resolving deferred dependencies of '{name}'");
                resolver(&*self).and_then(|ids| {
                    self.check_dependencies(id, &name, &ids)?;
                    Ok(ids)
                })
            }
            // Resolvers only see `&Registry`, so the marker outlives a call only on panic
            Dependencies::Resolving => return Err(DefinitionError::PoisonedResolution(name)),
            Dependencies::Failed(e) => Err(e),
        };

        let record = &mut self.records[id.0];
        match resolved {
            Ok(ids) => {
                record.definition.dependencies = Dependencies::Resolved(ids.clone());
                Ok(ids)
            }
            Err(e) => {
                record.definition.dependencies = Dependencies::Failed(e.clone());
                Err(e)
            }
        }
    }

    /// Resolve every unit reachable from `root` and reject dependency cycles.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError::Cycle` with the offending path, or any resolution error.
    pub fn resolve_graph(&mut self, root: UnitId) -> Result<(), DefinitionError> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        self.detect_cycle(root, &mut visited, &mut stack)
    }

    /// Resolve and check every registered unit
    ///
    /// # Errors
    ///
    /// Returns the first error found by [`Registry::resolve_graph`].
    pub fn validate(&mut self) -> Result<(), DefinitionError> {
        let mut visited = HashSet::new();
        for id in 0..self.records.len() {
            let id = UnitId(id);
            if !visited.contains(&id) {
                let mut stack = Vec::new();
                self.detect_cycle(id, &mut visited, &mut stack)?;
            }
        }
        Ok(())
    }

    fn detect_cycle(
        &mut self,
        id: UnitId,
        visited: &mut HashSet<UnitId>,
        stack: &mut Vec<UnitId>,
    ) -> Result<(), DefinitionError> {
        visited.insert(id);
        stack.push(id);

        for dep in self.dependencies(id)? {
            if let Some(start) = stack.iter().position(|s| *s == dep) {
                let path = stack[start..]
                    .iter()
                    .chain(std::iter::once(&dep))
                    .map(|s| self.records[s.0].definition.name.clone())
                    .collect();
                return Err(DefinitionError::Cycle(path));
            }
            if !visited.contains(&dep) {
                self.detect_cycle(dep, visited, stack)?;
            }
        }

        stack.pop();
        Ok(())
    }

    pub(crate) fn is_executed(&self, id: UnitId) -> bool {
        self.records.get(id.0).is_some_and(|r| r.executed)
    }

    pub(crate) fn mark_executed(&mut self, id: UnitId) {
        if let Some(record) = self.records.get_mut(id.0) {
            record.executed = true;
        }
    }
}
