//! Dependency-ordered execution of units
//!
//! [`Runner::run`] walks a unit's dependency graph depth-first, dependencies before
//! dependents, and runs each unit at most once for the lifetime of its [`Registry`].
//! For every unit it emits [`UnitEvent::Start`], then calls the `before`, `exec` and
//! `after` hooks in order and emits [`UnitEvent::Stop`]. A `before` hook returning
//! [`BeforeOutcome::Skip`] ends the unit early with [`UnitEvent::Skipped`].
//!
//! `after_all` hooks are collected while running and fired together by
//! [`Runner::run_after_all`]. Their failures are logged, never returned.

use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use log::{debug, error};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::commands::definition::{BeforeOutcome, HookContext, HookError, HookFn};
use crate::commands::option::Options;
use crate::commands::registry::{DefinitionError, Registry, UnitId};

/// Hook that failed during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Before,
    Exec,
    After,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Before => "before",
            Stage::Exec => "exec",
            Stage::After => "after",
        })
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("{stage} hook of '{unit}' failed: {source}")]
    Hook {
        unit: String,
        stage: Stage,
        #[source]
        source: HookError,
    },
}

/// Lifecycle transitions, sent as they happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitEvent {
    Start(UnitId),
    Skipped(UnitId),
    Stop(UnitId),
}

impl UnitEvent {
    #[must_use]
    pub fn unit(self) -> UnitId {
        match self {
            UnitEvent::Start(id) | UnitEvent::Skipped(id) | UnitEvent::Stop(id) => id,
        }
    }
}

pub struct Runner<'r> {
    registry: &'r mut Registry,
    subscribers: Vec<mpsc::UnboundedSender<UnitEvent>>,
    after_all: Vec<(HookContext, HookFn<()>)>,
}

impl fmt::Debug for Runner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("subscribers", &self.subscribers.len())
            .field("after_all", &self.after_all.len())
            .finish_non_exhaustive()
    }
}

impl<'r> Runner<'r> {
    pub fn new(registry: &'r mut Registry) -> Self {
        Runner {
            registry,
            subscribers: Vec::new(),
            after_all: Vec::new(),
        }
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<UnitEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: UnitEvent) {
        // Dropped receivers unsubscribe
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Number of `after_all` hooks waiting for [`Runner::run_after_all`]
    #[must_use]
    pub fn pending_after_all(&self) -> usize {
        self.after_all.len()
    }

    /// Run `root` and its dependency graph.
    ///
    /// The whole reachable graph is resolved and checked for cycles before any hook
    /// runs. Units executed by an earlier run are not run again.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Definition` for a broken graph and `RunError::Hook` for the
    /// first failing `before`, `exec` or `after` hook.
    pub async fn run(&mut self, root: UnitId, options: Options) -> Result<(), RunError> {
        self.registry.resolve_graph(root)?;
        let options = Arc::new(options);
        self.run_unit(root, &options).await
    }

    fn run_unit<'a>(
        &'a mut self,
        id: UnitId,
        options: &'a Arc<Options>,
    ) -> BoxFuture<'a, Result<(), RunError>> {
        Box::pin(async move {
            if self.registry.is_executed(id) {
                debug!("Unit {id} already executed");
                return Ok(());
            }
            for dep in self.registry.dependencies(id)? {
                self.run_unit(dep, options).await?;
            }

            // Marked before any hook so a unit is never entered twice
            self.registry.mark_executed(id);
            let definition = self.registry.definition(id)?;
            let hooks = definition.hooks.clone();
            let ctx = HookContext {
                unit: id,
                name: definition.name.clone(),
                options: Arc::clone(options),
            };
            debug!("Starting '{}'", ctx.name);
            self.emit(UnitEvent::Start(id));

            if let Some(hook) = hooks.after_all {
                self.after_all.push((ctx.clone(), hook));
            }

            let fail = |stage: Stage| {
                let unit = ctx.name.clone();
                move |source: HookError| RunError::Hook {
                    unit,
                    stage,
                    source,
                }
            };

            if let Some(before) = &hooks.before {
                let outcome = before(ctx.clone()).await.map_err(fail(Stage::Before))?;
                if outcome == BeforeOutcome::Skip {
                    debug!("Skipping '{}'", ctx.name);
                    self.emit(UnitEvent::Skipped(id));
                    return Ok(());
                }
            }
            if let Some(exec) = &hooks.exec {
                exec(ctx.clone()).await.map_err(fail(Stage::Exec))?;
            }
            if let Some(after) = &hooks.after {
                after(ctx.clone()).await.map_err(fail(Stage::After))?;
            }

            debug!("Finished '{}'", ctx.name);
            self.emit(UnitEvent::Stop(id));
            Ok(())
        })
    }

    /// Fire every collected `after_all` hook concurrently.
    ///
    /// Each hook fires once; failures are logged and counted. Returns the number of
    /// failed hooks.
    pub async fn run_after_all(&mut self) -> usize {
        let hooks = std::mem::take(&mut self.after_all);
        if hooks.is_empty() {
            return 0;
        }
        debug!("Running {} after_all hooks", hooks.len());
        let results = join_all(hooks.into_iter().map(|(ctx, hook)| async move {
            let name = ctx.name.clone();
            (name, hook(ctx).await)
        }))
        .await;

        let mut failures = 0;
        for (name, result) in results {
            if let Err(e) = result {
                error!("after_all hook of '{name}' failed: {e}");
                failures += 1;
            }
        }
        failures
    }

    /// [`Runner::run`] followed by [`Runner::run_after_all`], whatever the run's outcome.
    ///
    /// # Errors
    ///
    /// Returns the error of the run; `after_all` failures are only logged.
    pub async fn execute(&mut self, root: UnitId, options: Options) -> Result<(), RunError> {
        let result = self.run(root, options).await;
        self.run_after_all().await;
        result
    }
}
